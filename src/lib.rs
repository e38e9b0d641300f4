//! DYMO LabelManager Driver
//!
//! This crate renders text, QR codes, barcodes and pictures into a label,
//! converts the label into the printer's bit matrix and sends it to a DYMO
//! LabelManager, either through its hidraw node or over raw USB.
//!
//! # Example
//!
//! ```rust,no_run
//! use dymo_label::{
//!     compose, select_transport, to_matrix, DeviceConfig, LabelRequest, LibUsb, PrintSession,
//!     TrueTypeFace,
//! };
//! use std::path::Path;
//!
//! let config = DeviceConfig::default();
//! let request = LabelRequest {
//!     text: vec!["Hello".to_string()],
//!     ..Default::default()
//! };
//! let bitmaps = request
//!     .render(config.label_height(), || {
//!         TrueTypeFace::open(Path::new("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"))
//!     })
//!     .unwrap();
//! let matrix = to_matrix(&compose(bitmaps).unwrap()).unwrap();
//!
//! let transport = select_transport(&config, &LibUsb).unwrap();
//! PrintSession::new(transport).print(&matrix, None).unwrap();
//! ```

mod bitmap;
mod device;
mod error;
mod font;
pub mod preview;
mod printer;
mod render;
pub mod transport;

pub use crate::{
    bitmap::{compose, pack, partition, rotate, to_matrix},
    device::{DeviceConfig, DEV_NODE_ENV},
    error::Error,
    font::{font_path, FontStyle, TextFace, TrueTypeFace},
    printer::{DymoLabeler, LabelEncoder, Port, PrintSession},
    render::{
        render_barcode, render_picture, render_qr, render_qr_modules, render_text, LabelRequest,
        Symbology, MAX_FRAME,
    },
    transport::{select_transport, LibUsb, Transport},
};

/// A monochrome raster, one byte per pixel: [`INK`] or [`PAPER`].
pub type Bitmap = image::GrayImage;

/// The printer's native label representation.
///
/// One inner `Vec<u8>` per label column (print position along the tape),
/// each byte eight vertically stacked print-head dots, MSB at the bottom.
pub type Matrix = Vec<Vec<u8>>;

/// Pixel value of a printed dot.
pub const INK: u8 = 0xFF;

/// Pixel value of a blank dot.
pub const PAPER: u8 = 0x00;

/// Blank pixels between two content bitmaps on one label.
pub const PADDING: u32 = 4;

/// Font size relative to the height available per text line.
pub const FONT_SIZE_RATIO: f32 = 7.0 / 8.0;

/// Base feed, in printer ticks, before and after a label.
pub const MARGIN_BASE: u32 = 56;

/// Blank rows fed after a label unless overridden.
pub const DEFAULT_MARGIN: u32 = MARGIN_BASE * 2;
