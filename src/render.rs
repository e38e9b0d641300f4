//! Content rendering.
//!
//! Each requested item (text block, QR code, barcode, picture) becomes an
//! independent [`Bitmap`] whose height is the label height. Ink is stored as
//! [`INK`], paper as [`PAPER`].

use barcoders::sym::{code128::Code128, code39::Code39, ean13::EAN13, ean8::EAN8};
use image::{imageops, imageops::FilterType, GrayImage, Luma};
use log::debug;
use qrcode::{Color, EcLevel, QrCode};
use std::path::{Path, PathBuf};

use crate::{error::Error, font::TextFace, Bitmap, FONT_SIZE_RATIO, INK, PAPER};

/// Blank space above and below the bars of a barcode.
const BARCODE_MARGIN: u32 = 8;

/// Pixels per barcode module.
const BARCODE_MODULE_WIDTH: u32 = 2;

/// Highest accepted frame thickness.
pub const MAX_FRAME: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbology {
    Code39,
    Code128,
    Ean,
    Ean13,
    Ean8,
    Jan,
    Gtin,
    Upc,
    Upca,
    /// ISBN-13, printed as its EAN-13 (Bookland) code.
    Isbn,
    Isbn13,
    Gs1,
    /// ISBN-10, converted to the `978` Bookland EAN-13.
    Isbn10,
    /// ISSN, converted to the `977` EAN-13 with issue number `00`.
    Issn,
    /// German pharmaceutical number, a Code 39 of `-`, six digits and a check digit.
    Pzn,
}

impl Symbology {
    /// Encode `payload` into modules, `1` meaning a bar.
    fn encode(self, payload: &str) -> Result<Vec<u8>, Error> {
        let result = match self {
            Self::Code39 => Code39::new(payload).map(|c| c.encode()),
            // Character set B covers the printable ASCII range.
            Self::Code128 => Code128::new(&format!("\u{0181}{}", payload)).map(|c| c.encode()),
            Self::Ean | Self::Ean13 | Self::Jan | Self::Gtin => {
                EAN13::new(without_check_digit(payload, 12)).map(|c| c.encode())
            }
            Self::Ean8 => EAN8::new(without_check_digit(payload, 7)).map(|c| c.encode()),
            Self::Upc | Self::Upca => {
                EAN13::new(&format!("0{}", without_check_digit(payload, 11))).map(|c| c.encode())
            }
            Self::Isbn | Self::Isbn13 | Self::Gs1 => {
                let digits = payload.replace('-', "");
                if !digits.starts_with("978") && !digits.starts_with("979") {
                    return Err(Error::Barcode(format!(
                        "ISBN-13 must start with 978 or 979, got {:?}",
                        payload
                    )));
                }
                EAN13::new(without_check_digit(&digits, 12)).map(|c| c.encode())
            }
            Self::Isbn10 => {
                let digits = payload.replace('-', "");
                let data = digits.get(..9).unwrap_or(&digits);
                EAN13::new(&format!("978{}", data)).map(|c| c.encode())
            }
            Self::Issn => {
                let digits = payload.replace('-', "");
                let data = digits.get(..7).unwrap_or(&digits);
                EAN13::new(&format!("977{}00", data)).map(|c| c.encode())
            }
            Self::Pzn => Code39::new(&pzn_data(payload)?).map(|c| c.encode()),
        };
        result.map_err(|err| Error::Barcode(format!("{:?} for {:?}", err, payload)))
    }
}

/// Digits without the trailing check digit, which the encoder computes itself.
///
/// Anything that is not `data_digits` ASCII digits plus one is passed through
/// untouched for the encoder to reject.
fn without_check_digit(payload: &str, data_digits: usize) -> &str {
    if payload.len() == data_digits + 1 {
        payload.get(..data_digits).unwrap_or(payload)
    } else {
        payload
    }
}

/// Code 39 data of a seven digit PZN: `-`, the first six digits, the check digit.
fn pzn_data(payload: &str) -> Result<String, Error> {
    let digits: String = payload.chars().take(6).collect();
    let values = digits
        .chars()
        .map(|c| c.to_digit(10))
        .collect::<Option<Vec<u32>>>()
        .filter(|v| v.len() == 6)
        .ok_or_else(|| Error::Barcode(format!("PZN needs six digits, got {:?}", payload)))?;

    let check = values.iter().zip(2u32..).map(|(d, w)| d * w).sum::<u32>() % 11;
    if check == 10 {
        return Err(Error::Barcode(format!(
            "{:?} has no valid PZN check digit",
            payload
        )));
    }
    Ok(format!("-{}{}", digits, check))
}

/// Everything the user asked to put on one label.
#[derive(Debug, Clone, Default)]
pub struct LabelRequest {
    /// Text lines. With a QR code or barcode, the first one is the payload.
    pub text: Vec<String>,
    /// Frame thickness around the text, 0 for none.
    pub frame: u8,
    pub qr: bool,
    pub barcode: Option<Symbology>,
    pub picture: Option<PathBuf>,
}

impl LabelRequest {
    /// Reject combinations that can not be rendered, before any work is done.
    pub fn validate(&self) -> Result<(), Error> {
        if self.qr && self.barcode.is_some() {
            return Err(Error::QrAndBarcode);
        }
        if self.text.is_empty() && self.picture.is_none() {
            return Err(Error::NothingToPrint);
        }
        if (self.qr || self.barcode.is_some()) && self.text.is_empty() {
            return Err(Error::NothingToPrint);
        }
        Ok(())
    }

    /// Render every item in label order: symbol, text, picture.
    ///
    /// `load_face` is only called when there are text lines left to draw.
    pub fn render<F, L>(&self, label_height: u32, load_face: L) -> Result<Vec<Bitmap>, Error>
    where
        F: TextFace,
        L: FnOnce() -> Result<F, Error>,
    {
        self.validate()?;

        let mut bitmaps = Vec::new();
        let mut lines = self.text.as_slice();

        if self.qr {
            bitmaps.push(render_qr(&lines[0], label_height)?);
            lines = &lines[1..];
        } else if let Some(symbology) = self.barcode {
            bitmaps.push(render_barcode(symbology, &lines[0], label_height)?);
            lines = &lines[1..];
        }

        if !lines.is_empty() {
            let face = load_face()?;
            bitmaps.push(render_text(&face, lines, self.frame, label_height));
        }

        if let Some(picture) = &self.picture {
            bitmaps.push(render_picture(picture, label_height)?);
        }

        if bitmaps.is_empty() {
            return Err(Error::NothingToPrint);
        }
        Ok(bitmaps)
    }
}

/// Draw text lines top to bottom, optionally inside a hollow frame.
pub fn render_text<F: TextFace + ?Sized>(
    face: &F,
    lines: &[String],
    frame: u8,
    label_height: u32,
) -> Bitmap {
    let offset = frame.min(MAX_FRAME) as u32;
    let line_height = label_height as f32 / lines.len().max(1) as f32;
    let font_size = (line_height * FONT_SIZE_RATIO).round();

    let widest = lines
        .iter()
        .map(|line| face.line_width(line, font_size))
        .max()
        .unwrap_or(0);
    let width = widest + offset * 2;

    let mut bitmap = GrayImage::from_pixel(width, label_height, Luma([PAPER]));

    if offset > 0 {
        fill_rect(&mut bitmap, 0, 0, width, label_height, INK);
        fill_rect(
            &mut bitmap,
            offset,
            offset,
            width.saturating_sub(offset * 2),
            label_height.saturating_sub(offset * 2),
            PAPER,
        );
    }

    for (i, line) in lines.iter().enumerate() {
        let y = (i as f32 * line_height).round() as u32;
        face.draw_line(&mut bitmap, line, font_size, offset, y);
    }

    debug!(
        "text: {} lines, font size {}, bitmap {}x{}",
        lines.len(),
        font_size,
        width,
        label_height
    );
    bitmap
}

fn fill_rect(bitmap: &mut Bitmap, x: u32, y: u32, width: u32, height: u32, value: u8) {
    let x_end = (x + width).min(bitmap.width());
    let y_end = (y + height).min(bitmap.height());
    for py in y..y_end {
        for px in x..x_end {
            bitmap.put_pixel(px, py, Luma([value]));
        }
    }
}

/// Encode `payload` as a QR code (error correction level M) and scale it to the label.
pub fn render_qr(payload: &str, label_height: u32) -> Result<Bitmap, Error> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)?;
    let width = code.width();
    let modules: Vec<Vec<bool>> = code
        .to_colors()
        .chunks(width)
        .map(|row| row.iter().map(|c| *c == Color::Dark).collect())
        .collect();
    render_qr_modules(&modules, label_height)
}

/// Scale a module matrix by the largest integer factor that fits the label height.
pub fn render_qr_modules(modules: &[Vec<bool>], label_height: u32) -> Result<Bitmap, Error> {
    let rows = modules.len() as u32;
    let scale = if rows == 0 { 0 } else { label_height / rows };
    if scale == 0 {
        return Err(Error::SymbolTooFine);
    }
    let offset = (label_height - rows * scale) / 2;
    debug!("qr: {} modules, scale {}, offset {}", rows, scale, offset);

    let mut bitmap = GrayImage::from_pixel(label_height, label_height, Luma([PAPER]));
    for (row, line) in modules.iter().enumerate() {
        for (col, dark) in line.iter().enumerate() {
            if *dark {
                fill_rect(
                    &mut bitmap,
                    col as u32 * scale,
                    row as u32 * scale + offset,
                    scale,
                    scale,
                    INK,
                );
            }
        }
    }
    Ok(bitmap)
}

/// Draw a one-dimensional barcode with bars as ink, no human readable text.
pub fn render_barcode(
    symbology: Symbology,
    payload: &str,
    label_height: u32,
) -> Result<Bitmap, Error> {
    let modules = symbology.encode(payload)?;
    let bar_height = label_height.saturating_sub(BARCODE_MARGIN * 2);
    let width = modules.len() as u32 * BARCODE_MODULE_WIDTH;

    let mut bitmap = GrayImage::from_pixel(width, label_height, Luma([PAPER]));
    for (i, module) in modules.iter().enumerate() {
        if *module == 1 {
            fill_rect(
                &mut bitmap,
                i as u32 * BARCODE_MODULE_WIDTH,
                BARCODE_MARGIN,
                BARCODE_MODULE_WIDTH,
                bar_height,
                INK,
            );
        }
    }
    Ok(bitmap)
}

/// Load a picture, shrink it to the label height if needed and binarise it.
///
/// Dark source pixels become ink. Downscaling uses a Lanczos3 filter and
/// binarisation Floyd-Steinberg error diffusion.
pub fn render_picture(path: &Path, label_height: u32) -> Result<Bitmap, Error> {
    if !path.is_file() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    let mut picture = image::open(path)?.to_luma8();

    if picture.height() > label_height {
        let ratio = label_height as f64 / picture.height() as f64;
        let width = (picture.width() as f64 * ratio).ceil() as u32;
        debug!(
            "picture: scaling {}x{} down to {}x{}",
            picture.width(),
            picture.height(),
            width,
            label_height
        );
        picture = imageops::resize(&picture, width.max(1), label_height, FilterType::Lanczos3);
    }

    imageops::invert(&mut picture);
    imageops::dither(&mut picture, &imageops::BiLevel);
    Ok(picture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Draws every character as a solid block `size / 2` wide and `size` high.
    struct BlockFace;

    impl TextFace for BlockFace {
        fn line_width(&self, text: &str, size: f32) -> u32 {
            text.chars().count() as u32 * (size as u32 / 2)
        }

        fn draw_line(&self, canvas: &mut Bitmap, text: &str, size: f32, x: u32, y: u32) {
            let width = self.line_width(text, size);
            fill_rect(canvas, x, y, width, size as u32, INK);
        }
    }

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|s| s.to_string()).collect()
    }

    fn is_ink(bitmap: &Bitmap, x: u32, y: u32) -> bool {
        bitmap.get_pixel(x, y)[0] == INK
    }

    #[test]
    fn text_width_follows_widest_line() {
        let bitmap = render_text(&BlockFace, &lines(&["A", "BB", "CCC"]), 0, 64);
        // 64 / 3 lines * 7/8 rounds to 19, each char 9 px wide
        assert_eq!(bitmap.dimensions(), (27, 64));
        assert!(is_ink(&bitmap, 0, 0));
        assert!(!is_ink(&bitmap, 9, 0));
        assert!(is_ink(&bitmap, 26, 43));
    }

    #[test]
    fn frame_is_a_hollow_border() {
        for thickness in 1..=3u32 {
            let bitmap = render_text(&BlockFace, &lines(&[""]), thickness as u8, 64);
            let (w, h) = bitmap.dimensions();
            assert_eq!(w, thickness * 2);

            let bitmap = render_text(&BlockFace, &lines(&["   "]), thickness as u8, 64);
            let (w, h2) = bitmap.dimensions();
            assert_eq!(h, h2);
            for t in 0..thickness {
                assert!(is_ink(&bitmap, t, h / 2));
                assert!(is_ink(&bitmap, w - 1 - t, h / 2));
                assert!(is_ink(&bitmap, w / 2, t));
                assert!(is_ink(&bitmap, w / 2, h - 1 - t));
            }
            // the text block ends at y = 55, the inner area below it is paper
            assert!(!is_ink(&bitmap, thickness, h - 1 - thickness));
            assert!(!is_ink(&bitmap, w - 1 - thickness, h - 1 - thickness));
        }
    }

    #[test]
    fn frame_thickness_is_clamped() {
        let bitmap = render_text(&BlockFace, &lines(&[""]), 9, 64);
        assert_eq!(bitmap.width(), 6);
    }

    #[test]
    fn qr_modules_scale_to_label_height() {
        let modules = vec![vec![true; 21]; 21];
        let bitmap = render_qr_modules(&modules, 128).unwrap();
        // 128 / 21 = 6, centred with (128 - 126) / 2 = 1 px offset
        assert_eq!(bitmap.dimensions(), (128, 128));
        assert!(!is_ink(&bitmap, 0, 0));
        assert!(is_ink(&bitmap, 0, 1));
        assert!(is_ink(&bitmap, 125, 126));
        assert!(!is_ink(&bitmap, 126, 1));
        assert!(!is_ink(&bitmap, 0, 127));
    }

    #[test]
    fn qr_single_module_is_a_filled_square() {
        let mut modules = vec![vec![false; 4]; 4];
        modules[2][1] = true;
        let bitmap = render_qr_modules(&modules, 64).unwrap();
        let ink: Vec<(u32, u32)> = bitmap
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] == INK)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(ink.len(), 16 * 16);
        assert_eq!(ink.first(), Some(&(16, 32)));
        assert_eq!(ink.last(), Some(&(31, 47)));
    }

    #[test]
    fn qr_finer_than_resolution_fails() {
        let modules = vec![vec![true; 65]; 65];
        assert!(matches!(
            render_qr_modules(&modules, 64),
            Err(Error::SymbolTooFine)
        ));
    }

    #[test]
    fn qr_test_payload_fits_128_dots() {
        let bitmap = render_qr("TEST", 128).unwrap();
        assert_eq!(bitmap.height(), 128);
        assert!(bitmap.pixels().any(|p| p[0] == INK));
    }

    #[test]
    fn barcode_bars_leave_vertical_margin() {
        let bitmap = render_barcode(Symbology::Code128, "Hello", 64).unwrap();
        assert_eq!(bitmap.height(), 64);
        assert_eq!(bitmap.width() % BARCODE_MODULE_WIDTH, 0);
        // Code 128 always starts with a bar
        assert!(is_ink(&bitmap, 0, BARCODE_MARGIN));
        assert!(is_ink(&bitmap, 0, 64 - BARCODE_MARGIN - 1));
        assert!(!is_ink(&bitmap, 0, BARCODE_MARGIN - 1));
        assert!(!is_ink(&bitmap, 0, 64 - BARCODE_MARGIN));
    }

    #[test]
    fn ean13_accepts_check_digit() {
        let with = render_barcode(Symbology::Ean13, "4006381333931", 64).unwrap();
        let without = render_barcode(Symbology::Ean13, "400638133393", 64).unwrap();
        assert_eq!(with.dimensions(), without.dimensions());
    }

    #[test]
    fn invalid_barcode_payload_fails() {
        assert!(matches!(
            render_barcode(Symbology::Ean8, "not digits", 64),
            Err(Error::Barcode(_))
        ));
    }

    #[test]
    fn non_ascii_barcode_payload_fails() {
        assert!(matches!(
            render_barcode(Symbology::Ean8, "123456é", 64),
            Err(Error::Barcode(_))
        ));
        assert!(matches!(
            render_barcode(Symbology::Ean13, "12345678901é", 64),
            Err(Error::Barcode(_))
        ));
        assert!(matches!(
            render_barcode(Symbology::Upc, "1234567890é", 64),
            Err(Error::Barcode(_))
        ));
    }

    #[test]
    fn isbn_is_a_bookland_ean13() {
        let ean = render_barcode(Symbology::Ean13, "978316148410", 64).unwrap();
        for symbology in &[Symbology::Isbn, Symbology::Isbn13, Symbology::Gs1] {
            assert_eq!(
                render_barcode(*symbology, "978-3-16-148410-0", 64).unwrap(),
                ean
            );
        }
        assert_eq!(
            render_barcode(Symbology::Isbn10, "3-16-148410-X", 64).unwrap(),
            ean
        );
    }

    #[test]
    fn isbn13_needs_bookland_prefix() {
        assert!(matches!(
            render_barcode(Symbology::Isbn13, "4006381333931", 64),
            Err(Error::Barcode(_))
        ));
    }

    #[test]
    fn issn_becomes_977_ean13() {
        assert_eq!(
            render_barcode(Symbology::Issn, "0317-8471", 64).unwrap(),
            render_barcode(Symbology::Ean13, "977031784700", 64).unwrap()
        );
    }

    #[test]
    fn pzn_gets_dash_and_check_digit() {
        assert_eq!(pzn_data("123456").unwrap(), "-1234562");
        // the seventh digit is recomputed
        assert_eq!(pzn_data("1234569").unwrap(), "-1234562");
        assert_eq!(
            render_barcode(Symbology::Pzn, "123456", 64).unwrap(),
            render_barcode(Symbology::Code39, "-1234562", 64).unwrap()
        );
    }

    #[test]
    fn pzn_rejects_bad_input() {
        // 3 * 7 = 21, check digit 10
        assert!(matches!(pzn_data("000003"), Err(Error::Barcode(_))));
        assert!(matches!(pzn_data("12a456"), Err(Error::Barcode(_))));
        assert!(matches!(pzn_data("123"), Err(Error::Barcode(_))));
    }

    #[test]
    fn qr_and_barcode_are_exclusive() {
        let request = LabelRequest {
            text: lines(&["payload"]),
            qr: true,
            barcode: Some(Symbology::Code39),
            ..Default::default()
        };
        let result = request.render(64, || -> Result<BlockFace, Error> {
            panic!("nothing may be rendered")
        });
        assert!(matches!(result, Err(Error::QrAndBarcode)));
    }

    #[test]
    fn symbol_payload_is_taken_from_first_line() {
        let request = LabelRequest {
            text: lines(&["https://example.com", "label"]),
            qr: true,
            ..Default::default()
        };
        let bitmaps = request.render(64, || Ok(BlockFace)).unwrap();
        assert_eq!(bitmaps.len(), 2);
        assert_eq!(bitmaps[0].width(), 64);
    }

    #[test]
    fn symbol_only_never_loads_a_font() {
        let request = LabelRequest {
            text: lines(&["CODE39"]),
            barcode: Some(Symbology::Code39),
            ..Default::default()
        };
        let bitmaps = request
            .render(64, || -> Result<BlockFace, Error> {
                Err(Error::FileNotFound(PathBuf::from("font")))
            })
            .unwrap();
        assert_eq!(bitmaps.len(), 1);
    }

    #[test]
    fn empty_request_is_rejected() {
        let request = LabelRequest::default();
        assert!(matches!(request.validate(), Err(Error::NothingToPrint)));
    }

    #[test]
    fn picture_is_scaled_and_inverted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("picture.png");
        // Black left half, white right half
        let source =
            GrayImage::from_fn(200, 128, |x, _| if x < 100 { Luma([0]) } else { Luma([255]) });
        source.save(&path).unwrap();

        let bitmap = render_picture(&path, 64).unwrap();
        assert_eq!(bitmap.dimensions(), (100, 64));
        assert!(is_ink(&bitmap, 10, 32));
        assert!(!is_ink(&bitmap, 90, 32));
    }

    #[test]
    fn small_picture_keeps_its_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.png");
        GrayImage::from_pixel(10, 20, Luma([0])).save(&path).unwrap();

        let bitmap = render_picture(&path, 64).unwrap();
        assert_eq!(bitmap.dimensions(), (10, 20));
        assert!(bitmap.pixels().all(|p| p[0] == INK));
    }

    #[test]
    fn missing_picture_is_reported() {
        assert!(matches!(
            render_picture(Path::new("/nonexistent.png"), 64),
            Err(Error::FileNotFound(_))
        ));
    }
}
