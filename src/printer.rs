use log::{debug, info};
use std::io::{self, Read, Write};

use crate::{error::Error, transport::Transport, Matrix, DEFAULT_MARGIN};

const ESC: u8 = 0x1B;
const SYN: u8 = 0x16;

/// Length of a status reply.
const STATUS_LENGTH: usize = 8;

/// Anything a label can be written to and a status read back from.
pub trait Port: Read + Write {}

impl<T: Read + Write + ?Sized> Port for T {}

/// Turns a bit matrix into printer commands.
pub trait LabelEncoder {
    /// Print `matrix` followed by `margin` blank rows.
    fn print_label(
        &mut self,
        port: &mut dyn Port,
        matrix: &Matrix,
        margin: u32,
    ) -> Result<(), Error>;
}

/// Command encoder of the DYMO LabelManager family.
///
/// Each matrix row is sent as one raster line. With `synwait` set, a status
/// round-trip is made every `synwait` lines so the printer is never overrun.
#[derive(Debug, Default)]
pub struct DymoLabeler {
    synwait: Option<usize>,
    bytes_per_line: Option<u8>,
}

impl DymoLabeler {
    pub fn new(synwait: Option<usize>) -> Self {
        DymoLabeler {
            synwait,
            bytes_per_line: None,
        }
    }

    fn tape_color(&self, buf: &mut Vec<u8>, value: u8) {
        buf.extend_from_slice(&[ESC, b'C', value]);
    }

    fn set_bytes_per_line(&mut self, buf: &mut Vec<u8>, value: u8) {
        if self.bytes_per_line == Some(value) {
            return;
        }
        buf.extend_from_slice(&[ESC, b'D', value]);
        self.bytes_per_line = Some(value);
    }

    fn line(&mut self, buf: &mut Vec<u8>, row: &[u8]) {
        self.set_bytes_per_line(buf, row.len() as u8);
        buf.push(SYN);
        buf.extend_from_slice(row);
    }

    fn skip_lines(&mut self, buf: &mut Vec<u8>, count: u32) {
        self.set_bytes_per_line(buf, 0);
        buf.extend(std::iter::repeat(SYN).take(count as usize));
    }

    /// Send `buf` with a trailing status request and wait for the reply.
    fn sync(&self, port: &mut dyn Port, buf: &mut Vec<u8>) -> Result<u8, Error> {
        buf.extend_from_slice(&[ESC, b'A']);
        port.write_all(&buf[..])?;
        port.flush()?;
        buf.clear();

        let mut reply = [0u8; STATUS_LENGTH];
        let n = port.read(&mut reply)?;
        if n == 0 {
            return Err(Error::InvalidResponse(n));
        }
        debug!("Raw status code: {:X?}", &reply[..n]);
        Ok(reply[0])
    }
}

impl LabelEncoder for DymoLabeler {
    fn print_label(
        &mut self,
        port: &mut dyn Port,
        matrix: &Matrix,
        margin: u32,
    ) -> Result<(), Error> {
        let mut buf: Vec<u8> = Vec::new();
        self.tape_color(&mut buf, 0);

        for (i, row) in matrix.iter().enumerate() {
            self.line(&mut buf, row);
            if let Some(synwait) = self.synwait {
                if synwait > 0 && (i + 1) % synwait == 0 {
                    self.sync(port, &mut buf)?;
                }
            }
        }

        self.skip_lines(&mut buf, margin);
        let status = self.sync(port, &mut buf)?;
        debug!("Final status {:#04x}", status);
        Ok(())
    }
}

/// One print job on an exclusively owned transport.
///
/// The transport is closed when the session ends, whatever the outcome.
pub struct PrintSession {
    transport: Transport,
}

impl PrintSession {
    pub fn new(transport: Transport) -> Self {
        PrintSession { transport }
    }

    /// Print with the LabelManager encoder, paced for the selected transport.
    pub fn print(mut self, matrix: &Matrix, margin: Option<u32>) -> Result<(), Error> {
        let mut encoder = DymoLabeler::new(self.transport.synwait());
        self.print_with(&mut encoder, matrix, margin)
    }

    /// Print with any encoder. `margin` defaults to [`DEFAULT_MARGIN`].
    pub fn print_with<E: LabelEncoder + ?Sized>(
        &mut self,
        encoder: &mut E,
        matrix: &Matrix,
        margin: Option<u32>,
    ) -> Result<(), Error> {
        let margin = margin.unwrap_or(DEFAULT_MARGIN);
        info!(
            "Printing {} rows with margin {} on {}",
            matrix.len(),
            margin,
            self.transport.describe()
        );

        match encoder.print_label(&mut self.transport, matrix, margin) {
            Err(Error::Io(err)) if err.kind() == io::ErrorKind::PermissionDenied => {
                Err(Error::AccessDenied(self.transport.describe()))
            }
            result => result,
        }
    }
}
