//! Label composition and conversion to the printer's bit matrix.

use image::{imageops, GrayImage, Luma};
use log::debug;

use crate::{error::Error, Bitmap, Matrix, PADDING, PAPER};

/// Concatenate content bitmaps left to right with [`PADDING`] pixels between them.
///
/// A single bitmap is returned unchanged.
pub fn compose(mut bitmaps: Vec<Bitmap>) -> Result<Bitmap, Error> {
    if bitmaps.len() == 1 {
        return bitmaps.pop().ok_or(Error::NothingToPrint);
    }
    if bitmaps.is_empty() {
        return Err(Error::NothingToPrint);
    }

    let width =
        bitmaps.iter().map(|b| b.width()).sum::<u32>() + PADDING * (bitmaps.len() as u32 - 1);
    let height = bitmaps.iter().map(|b| b.height()).max().unwrap_or(0);

    let mut label = GrayImage::from_pixel(width, height, Luma([PAPER]));
    let mut offset = 0;
    for bitmap in &bitmaps {
        imageops::replace(&mut label, bitmap, offset as i64, 0);
        offset += bitmap.width() + PADDING;
    }
    debug!("composed {} bitmaps into {}x{}", bitmaps.len(), width, height);
    Ok(label)
}

/// Turn the label so that its length runs along the feed direction.
///
/// This is a 270° counter-clockwise turn: column `x` of the label becomes
/// row `x`, read from the bottom of the label to the top.
pub fn rotate(label: &Bitmap) -> Bitmap {
    imageops::rotate90(label)
}

/// Pack a bitmap row by row, MSB first, each row padded to whole bytes.
pub fn pack(bitmap: &Bitmap) -> Vec<u8> {
    let row_length = row_length(bitmap.width());
    let mut bytes = vec![0u8; row_length * bitmap.height() as usize];

    for (x, y, pixel) in bitmap.enumerate_pixels() {
        if pixel[0] >= 0x80 {
            let index = y as usize * row_length + x as usize / 8;
            bytes[index] |= 0x80 >> (x % 8);
        }
    }
    bytes
}

fn row_length(pixels: u32) -> usize {
    (pixels as usize + 7) / 8
}

/// Split a packed stream into rows, which must come out to exactly `rows`.
pub fn partition(bytes: &[u8], row_length: usize, rows: usize) -> Result<Matrix, Error> {
    let consistent = if row_length == 0 {
        bytes.is_empty() && rows == 0
    } else {
        bytes.len() % row_length == 0 && bytes.len() / row_length == rows
    };
    if !consistent {
        return Err(Error::MatrixConsistency {
            bytes: bytes.len(),
            row_length,
            rows,
        });
    }
    if row_length == 0 {
        return Ok(Matrix::new());
    }
    Ok(bytes.chunks(row_length).map(|row| row.to_vec()).collect())
}

/// Convert a composed label into one byte row per label column.
///
/// Each row holds `ceil(height / 8)` bytes, every byte eight vertically
/// stacked print-head dots.
pub fn to_matrix(label: &Bitmap) -> Result<Matrix, Error> {
    let rotated = rotate(label);
    let stream = pack(&rotated);
    let matrix = partition(&stream, row_length(label.height()), label.width() as usize)?;
    debug!(
        "matrix: {} rows of {} bytes",
        matrix.len(),
        row_length(label.height())
    );
    Ok(matrix)
}
