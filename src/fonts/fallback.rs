use super::{CellMetrics, GlyphBitmap, GlyphBounds, GlyphProvider};
use crate::error::Result;

/// A primary font backed by fallback fonts, tried in registration order.
///
/// Cell metrics always come from the primary so a screen keeps one grid no
/// matter which font ends up drawing a given character.
pub struct FallbackFontFace {
    primary: Box<dyn GlyphProvider>,
    fallbacks: Vec<Box<dyn GlyphProvider>>,
}

impl FallbackFontFace {
    pub fn new(primary: Box<dyn GlyphProvider>) -> Self {
        Self {
            primary,
            fallbacks: Vec::new(),
        }
    }

    pub fn add_fallback_font(&mut self, font: Box<dyn GlyphProvider>) {
        self.fallbacks.push(font);
    }

    pub fn with_fallback_font(mut self, font: Box<dyn GlyphProvider>) -> Self {
        self.add_fallback_font(font);
        self
    }

    pub fn fallback_count(&self) -> usize {
        self.fallbacks.len()
    }

    fn first_found<T>(&self, lookup: impl Fn(&dyn GlyphProvider) -> Option<T>) -> Option<T> {
        lookup(self.primary.as_ref()).or_else(|| {
            self.fallbacks
                .iter()
                .find_map(|font| lookup(font.as_ref()))
        })
    }
}

impl GlyphProvider for FallbackFontFace {
    fn name(&self) -> &str {
        self.primary.name()
    }

    fn metrics(&self) -> CellMetrics {
        self.primary.metrics()
    }

    fn glyph(&self, ch: char) -> Option<GlyphBitmap> {
        self.first_found(|font| font.glyph(ch))
    }

    fn glyph_bounds(&self, ch: char) -> Option<(GlyphBounds, f32)> {
        self.first_found(|font| font.glyph_bounds(ch))
    }

    fn glyph_advance(&self, ch: char) -> Option<f32> {
        self.first_found(|font| font.glyph_advance(ch))
    }

    fn kern(&self, left: char, right: char) -> f32 {
        let kern = self.primary.kern(left, right);
        if kern != 0.0 {
            return kern;
        }
        self.fallbacks
            .iter()
            .map(|font| font.kern(left, right))
            .find(|&kern| kern != 0.0)
            .unwrap_or(kern)
    }

    fn close(&mut self) -> Result<()> {
        let mut first_error = self.primary.close().err();
        for font in &mut self.fallbacks {
            if let Err(error) = font.close() {
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
