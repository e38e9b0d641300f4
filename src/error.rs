//! Error types for label rendering and printer operations.
//!
//! Every failure in the pipeline is terminal for the current invocation. The
//! single exception, a busy USB resource during configuration, never reaches
//! this type: it is reported as [`crate::transport::Activation::AlreadyConfigured`].

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for label rendering and printing.
#[derive(Error, Debug)]
pub enum Error {
    /// A font or picture path given by the user does not exist.
    #[error("file '{}' not found", .0.display())]
    FileNotFound(PathBuf),

    /// The font file exists but could not be parsed.
    #[error("'{}' is not a usable font file", .0.display())]
    InvalidFont(PathBuf),

    #[error("can not print both QR and Barcode on the same label (yet)")]
    QrAndBarcode,

    /// The request produced no content bitmap at all.
    #[error("nothing to print, give some text, a code or a picture")]
    NothingToPrint,

    /// The picture could not be read or decoded.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error("QR code generation failed: {0}")]
    QrCode(#[from] qrcode::types::QrError),

    #[error("barcode generation failed: {0}")]
    Barcode(String),

    /// QR modules would be smaller than a single print-head dot.
    #[error("too much information to store in the QR code, points are smaller than the device resolution")]
    SymbolTooFine,

    /// The packed label did not split into one row per label column.
    ///
    /// This is an internal defect, never a user error.
    #[error("an internal problem was encountered while processing the label bitmap ({bytes} bytes, {row_length} bytes per row, {rows} rows expected)")]
    MatrixConsistency {
        bytes: usize,
        row_length: usize,
        rows: usize,
    },

    /// No printer, or a printer without usable endpoints.
    #[error("the device '{0}' could not be found on this system")]
    DeviceNotFound(String),

    /// Permission failure while configuring or opening the device.
    #[error("access denied to '{0}', check that your user may use the device (e.g. a member of the 'plugdev' group, or an udev rule)")]
    AccessDenied(String),

    /// USB communication error.
    ///
    /// Wraps underlying rusb errors for device communication issues
    /// and timeouts.
    #[error(transparent)]
    UsbError(#[from] rusb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The printer answered a status request with a short reply.
    #[error("Received invalid response from printer")]
    InvalidResponse(usize),
}
