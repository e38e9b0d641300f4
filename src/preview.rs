//! Label previews that never touch the printer.

use image::{imageops, GrayImage, Luma};
use log::debug;
use std::path::PathBuf;
use std::process::Command;

use crate::{error::Error, Bitmap, INK, PAPER};

/// Blank feed added before and after the label in the image preview.
const FEED: u32 = 56;

const VIEWER: &str = "display";

/// Render a bitmap with half-block characters, two pixel rows per text line.
pub fn to_unicode(bitmap: &Bitmap, invert: bool) -> String {
    // Rows past the bottom edge are blank in both modes.
    let on = |x: u32, y: u32| -> bool {
        y < bitmap.height() && (bitmap.get_pixel(x, y)[0] == INK) != invert
    };

    let mut out = String::new();
    for y in (0..bitmap.height()).step_by(2) {
        for x in 0..bitmap.width() {
            out.push(match (on(x, y), on(x, y + 1)) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        out.push('\n');
    }
    out
}

/// The label as it comes out of the printer: with feed margins, ink dark.
pub fn printed_image(label: &Bitmap) -> GrayImage {
    let mut image =
        GrayImage::from_pixel(label.width() + FEED * 2, label.height(), Luma([PAPER]));
    imageops::replace(&mut image, label, FEED as i64, 0);
    imageops::invert(&mut image);
    image
}

/// Save the printed image to the temp directory and open it in ImageMagick.
pub fn show_with_imagemagick(label: &Bitmap) -> Result<PathBuf, Error> {
    let path = std::env::temp_dir().join(format!("dymoprint-{}.png", std::process::id()));
    printed_image(label).save(&path)?;
    debug!("Preview written to {}", path.display());
    Command::new(VIEWER).arg(&path).spawn()?;
    Ok(path)
}
