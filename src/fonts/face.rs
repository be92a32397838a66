use fontdue::{Font, FontSettings};

use super::{CellMetrics, GlyphBitmap, GlyphBounds, GlyphProvider};
use crate::error::{Error, Result};

/// A single TrueType/OpenType font rasterized at a fixed pixel size.
pub struct FontFace {
    name: String,
    font: Font,
    px: f32,
    metrics: CellMetrics,
}

impl FontFace {
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>, px: f32) -> Result<Self> {
        let name = name.into();
        let settings = FontSettings {
            scale: px,
            ..FontSettings::default()
        };
        let font = Font::from_bytes(bytes, settings)
            .map_err(|error| Error::font_load(name.as_str(), error))?;
        let metrics = cell_metrics(&font, px);
        Ok(Self {
            name,
            font,
            px,
            metrics,
        })
    }

    fn glyph_index(&self, ch: char) -> Option<u16> {
        match self.font.lookup_glyph_index(ch) {
            0 => None,
            index => Some(index),
        }
    }
}

// Proportional fonts are forced onto a grid sized by the advance of 'M'.
fn cell_metrics(font: &Font, px: f32) -> CellMetrics {
    let cell_width = font.metrics('M', px).advance_width.ceil().max(1.0) as u32;
    let (ascent, line_height) = match font.horizontal_line_metrics(px) {
        Some(line) => (line.ascent.ceil(), line.new_line_size.ceil()),
        None => (px.ceil(), (px * 1.45).round()),
    };
    let cell_height = line_height.max(1.0) as u32;
    CellMetrics {
        cell_width,
        cell_height,
        ascent: (ascent.max(0.0) as u32).min(cell_height),
    }
}

impl GlyphProvider for FontFace {
    fn name(&self) -> &str {
        &self.name
    }

    fn metrics(&self) -> CellMetrics {
        self.metrics
    }

    fn glyph(&self, ch: char) -> Option<GlyphBitmap> {
        let index = self.glyph_index(ch)?;
        let (metrics, coverage) = self.font.rasterize_indexed(index, self.px);
        Some(GlyphBitmap {
            width: metrics.width,
            height: metrics.height,
            xmin: metrics.xmin,
            ymin: metrics.ymin,
            advance: metrics.advance_width,
            coverage,
        })
    }

    fn glyph_bounds(&self, ch: char) -> Option<(GlyphBounds, f32)> {
        let index = self.glyph_index(ch)?;
        let metrics = self.font.metrics_indexed(index, self.px);
        let bounds = GlyphBounds {
            xmin: metrics.bounds.xmin,
            ymin: metrics.bounds.ymin,
            width: metrics.bounds.width,
            height: metrics.bounds.height,
        };
        Some((bounds, metrics.advance_width))
    }

    fn glyph_advance(&self, ch: char) -> Option<f32> {
        let index = self.glyph_index(ch)?;
        Some(self.font.metrics_indexed(index, self.px).advance_width)
    }

    fn kern(&self, left: char, right: char) -> f32 {
        self.font.horizontal_kern(left, right, self.px).unwrap_or(0.0)
    }
}
