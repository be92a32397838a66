//! Glyph sources used by the screen renderer.
//!
//! The renderer only ever talks to a [`GlyphProvider`]. A provider is either a
//! single font ([`FontFace`], [`BuiltinFace`]) or a [`FallbackFontFace`] that
//! chains a primary font with any number of fallbacks.

mod builtin;
mod face;
mod fallback;
mod loader;

pub use builtin::{BuiltinFace, BUILTIN_ASCENT, BUILTIN_CELL_HEIGHT, BUILTIN_CELL_WIDTH};
pub use face::FontFace;
pub use fallback::FallbackFontFace;
pub use loader::{
    load_fallback_fonts, load_font, load_fonts_from_directory, load_glyph_provider,
    load_primary_font, FALLBACK_FONT_DIRECTORY, PRIMARY_FONT_DIRECTORY,
};

use crate::error::Result;

/// Size of one terminal cell, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellMetrics {
    pub cell_width: u32,
    pub cell_height: u32,
    /// Distance from the top of a cell down to the baseline.
    pub ascent: u32,
}

/// Coverage bitmap of one rasterized glyph, positioned relative to the pen.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphBitmap {
    pub width: usize,
    pub height: usize,
    /// Horizontal offset of the bitmap's left edge from the pen position.
    pub xmin: i32,
    /// Offset of the bitmap's bottom edge above the baseline.
    pub ymin: i32,
    pub advance: f32,
    pub coverage: Vec<u8>,
}

impl GlyphBitmap {
    pub fn is_blank(&self) -> bool {
        self.coverage.iter().all(|&value| value == 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphBounds {
    pub xmin: f32,
    pub ymin: f32,
    pub width: f32,
    pub height: f32,
}

/// A source of glyphs and the metrics needed to lay them out on a grid.
///
/// Lookups return `None` when the character is not present in the font.
pub trait GlyphProvider: Send + Sync {
    fn name(&self) -> &str;

    fn metrics(&self) -> CellMetrics;

    fn glyph(&self, ch: char) -> Option<GlyphBitmap>;

    /// Bounds of the glyph outline together with its advance width.
    fn glyph_bounds(&self, ch: char) -> Option<(GlyphBounds, f32)>;

    fn glyph_advance(&self, ch: char) -> Option<f32>;

    /// Horizontal kerning between two characters; zero when there is none.
    fn kern(&self, left: char, right: char) -> f32;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
