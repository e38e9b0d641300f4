use dymo_label::{
    compose, to_matrix, Bitmap, DeviceConfig, DymoLabeler, Error, LabelEncoder, LabelRequest,
    Symbology, TextFace, INK, PADDING,
};
use image::Luma;
use pretty_assertions::assert_eq;
use std::io::{self, Read, Write};

/// Every character is a solid block half the font size wide.
struct BlockFace;

impl TextFace for BlockFace {
    fn line_width(&self, text: &str, size: f32) -> u32 {
        text.chars().count() as u32 * (size as u32 / 2)
    }

    fn draw_line(&self, canvas: &mut Bitmap, text: &str, size: f32, x: u32, y: u32) {
        let x_end = (x + self.line_width(text, size)).min(canvas.width());
        let y_end = (y + size as u32).min(canvas.height());
        for py in y..y_end {
            for px in x..x_end {
                canvas.put_pixel(px, py, Luma([INK]));
            }
        }
    }
}

fn lines(text: &[&str]) -> Vec<String> {
    text.iter().map(|s| s.to_string()).collect()
}

#[test]
fn three_text_lines_become_one_matrix() {
    let config = DeviceConfig::default();
    let request = LabelRequest {
        text: lines(&["A", "BB", "CCC"]),
        ..Default::default()
    };

    let bitmaps = request.render(config.label_height(), || Ok(BlockFace)).unwrap();
    assert_eq!(bitmaps.len(), 1);

    let widest = BlockFace.line_width("CCC", (64.0f32 / 3.0 * 7.0 / 8.0).round());
    assert_eq!(bitmaps[0].dimensions(), (widest, 64));

    let label = compose(bitmaps).unwrap();
    let matrix = to_matrix(&label).unwrap();
    assert_eq!(matrix.len(), widest as usize);
    assert!(matrix.iter().all(|row| row.len() == 8));
    // the first column carries ink from all three lines
    assert_ne!(matrix[0], vec![0u8; 8]);
}

#[test]
fn qr_fits_a_128_dot_head() {
    let config = DeviceConfig::default().bytes_per_line(16);
    let request = LabelRequest {
        text: lines(&["TEST"]),
        qr: true,
        ..Default::default()
    };

    let bitmaps = request
        .render(config.label_height(), || -> Result<BlockFace, Error> {
            panic!("no text left to draw")
        })
        .unwrap();
    let label = compose(bitmaps).unwrap();
    assert_eq!(label.dimensions(), (128, 128));

    let matrix = to_matrix(&label).unwrap();
    assert_eq!(matrix.len(), 128);
    assert!(matrix.iter().all(|row| row.len() == 16));
}

#[test]
fn mixed_label_width_adds_padding() {
    let request = LabelRequest {
        text: lines(&["ABC-123", "caption"]),
        barcode: Some(Symbology::Code128),
        frame: 2,
        ..Default::default()
    };

    let bitmaps = request.render(64, || Ok(BlockFace)).unwrap();
    assert_eq!(bitmaps.len(), 2);
    let expected = bitmaps.iter().map(|b| b.width()).sum::<u32>() + PADDING;

    let label = compose(bitmaps).unwrap();
    assert_eq!(label.dimensions(), (expected, 64));
    assert_eq!(to_matrix(&label).unwrap().len(), expected as usize);
}

struct Printer {
    received: Vec<u8>,
}

impl Write for Printer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.received.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for Printer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        buf[0] = 0x14;
        Ok(1)
    }
}

#[test]
fn matrix_is_sent_as_raster_lines() {
    let request = LabelRequest {
        text: lines(&["Hi"]),
        frame: 1,
        ..Default::default()
    };
    let label = compose(request.render(64, || Ok(BlockFace)).unwrap()).unwrap();
    let matrix = to_matrix(&label).unwrap();

    let mut printer = Printer { received: vec![] };
    DymoLabeler::new(None)
        .print_label(&mut printer, &matrix, 112)
        .unwrap();

    // tape colour, bytes per line, rows, bytes per line 0, margin, status request
    let expected_len = 3 + 3 + matrix.len() * 9 + 3 + 112 + 2;
    assert_eq!(printer.received.len(), expected_len);
    assert_eq!(&printer.received[..6], &[0x1B, b'C', 0, 0x1B, b'D', 8]);
    assert_eq!(&printer.received[expected_len - 2..], &[0x1B, b'A']);
}
