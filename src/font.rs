//! Font resolution and text rasterisation.
//!
//! Text is drawn through the [`TextFace`] trait so that layout does not care
//! where glyphs come from. [`TrueTypeFace`] is the real implementation backed
//! by `ab_glyph`.

use ab_glyph::{point, Font, FontVec, PxScale, ScaleFont};
use image::Luma;
use log::debug;
use std::path::{Path, PathBuf};

use crate::{error::Error, Bitmap};

const FONT_DIR: &str = "/usr/share/fonts/truetype/ubuntu-font-family";

/// Coverage above which an anti-aliased glyph pixel is printed.
const COVERAGE_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Regular,
    Bold,
    Italic,
    Narrow,
}

impl FontStyle {
    fn env_var(self) -> &'static str {
        match self {
            Self::Regular => "DYMOPRINT_FONT_REGULAR",
            Self::Bold => "DYMOPRINT_FONT_BOLD",
            Self::Italic => "DYMOPRINT_FONT_ITALIC",
            Self::Narrow => "DYMOPRINT_FONT_NARROW",
        }
    }

    fn default_file(self) -> &'static str {
        match self {
            Self::Regular => "Ubuntu-R.ttf",
            Self::Bold => "Ubuntu-B.ttf",
            Self::Italic => "Ubuntu-RI.ttf",
            Self::Narrow => "UbuntuCondensed-Regular.ttf",
        }
    }

    /// Configured font file for this style.
    pub fn path(self) -> PathBuf {
        match std::env::var_os(self.env_var()) {
            Some(p) if !p.is_empty() => PathBuf::from(p),
            _ => Path::new(FONT_DIR).join(self.default_file()),
        }
    }
}

/// Resolve the font file to use. A user font overrides the style and must exist.
pub fn font_path(style: FontStyle, user_font: Option<&Path>) -> Result<PathBuf, Error> {
    match user_font {
        Some(path) if path.is_file() => Ok(path.to_path_buf()),
        Some(path) => Err(Error::FileNotFound(path.to_path_buf())),
        None => Ok(style.path()),
    }
}

/// Something that can measure and draw a single line of text.
pub trait TextFace {
    /// Width in pixels of `text` rendered at `size` pixels per em.
    fn line_width(&self, text: &str, size: f32) -> u32;

    /// Draw `text` with the top of its line box at `(x, y)`, marking ink "on".
    fn draw_line(&self, canvas: &mut Bitmap, text: &str, size: f32, x: u32, y: u32);
}

/// A TrueType/OpenType font loaded from disk.
pub struct TrueTypeFace {
    font: FontVec,
}

impl TrueTypeFace {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let data = std::fs::read(path).map_err(|err| {
            debug!("Failed to read font {}: {:?}", path.display(), err);
            Error::FileNotFound(path.to_path_buf())
        })?;
        let font =
            FontVec::try_from_vec(data).map_err(|_| Error::InvalidFont(path.to_path_buf()))?;
        Ok(TrueTypeFace { font })
    }

    /// `PxScale` is the ascent-to-descent height, `size` is pixels per em.
    fn scale(&self, size: f32) -> PxScale {
        let units_per_em = self.font.units_per_em().unwrap_or(1000.0);
        PxScale::from(size * self.font.height_unscaled() / units_per_em)
    }

    /// Glyph ids and their caret positions along the line.
    fn layout(&self, text: &str, scale: PxScale) -> (Vec<(ab_glyph::GlyphId, f32)>, f32) {
        let scaled = self.font.as_scaled(scale);
        let mut glyphs = Vec::new();
        let mut caret = 0.0f32;
        let mut previous = None;

        for ch in text.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(prev) = previous {
                caret += scaled.kern(prev, id);
            }
            glyphs.push((id, caret));
            caret += scaled.h_advance(id);
            previous = Some(id);
        }
        (glyphs, caret)
    }
}

impl TextFace for TrueTypeFace {
    fn line_width(&self, text: &str, size: f32) -> u32 {
        let (_, width) = self.layout(text, self.scale(size));
        width.ceil() as u32
    }

    fn draw_line(&self, canvas: &mut Bitmap, text: &str, size: f32, x: u32, y: u32) {
        let scale = self.scale(size);
        let ascent = self.font.as_scaled(scale).ascent();
        let (glyphs, _) = self.layout(text, scale);
        let (width, height) = canvas.dimensions();

        for (id, caret) in glyphs {
            let position = point(x as f32 + caret, y as f32 + ascent);
            let glyph = id.with_scale_and_position(scale, position);
            if let Some(outlined) = self.font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|gx, gy, coverage| {
                    let px = gx as i64 + bounds.min.x as i64;
                    let py = gy as i64 + bounds.min.y as i64;
                    if coverage > COVERAGE_THRESHOLD
                        && px >= 0
                        && py >= 0
                        && px < width as i64
                        && py < height as i64
                    {
                        canvas.put_pixel(px as u32, py as u32, Luma([crate::INK]));
                    }
                });
            }
        }
    }
}
