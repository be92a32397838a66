use tracing::{debug, warn};

use super::{BuiltinFace, FallbackFontFace, FontFace, GlyphProvider};
use crate::error::{Error, Result};
use crate::resources::{join_resource_path, ResourceProvider};

pub const PRIMARY_FONT_DIRECTORY: &str = "primary";
pub const FALLBACK_FONT_DIRECTORY: &str = "fallbacks";

const FONT_EXTENSIONS: [&str; 3] = ["ttf", "otf", "ttc"];

fn is_font_file(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| FONT_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

pub fn load_font(resources: &dyn ResourceProvider, path: &str, px: f32) -> Result<FontFace> {
    let bytes = resources
        .read_file(path)
        .map_err(|error| Error::font_load(path, error))?;
    FontFace::from_bytes(path, bytes, px)
}

/// Loads every font file directly inside `dir`, in name order.
///
/// The first font that fails to parse aborts the whole directory.
pub fn load_fonts_from_directory(
    resources: &dyn ResourceProvider,
    dir: &str,
    px: f32,
) -> Result<Vec<FontFace>> {
    let entries = resources
        .read_dir(dir)
        .map_err(|error| Error::font_load(dir, error))?;

    let mut fonts = Vec::new();
    for entry in entries {
        if entry.is_dir || !is_font_file(&entry.name) {
            continue;
        }
        let path = join_resource_path(resources.path_separator(), dir, &entry.name);
        fonts.push(load_font(resources, &path, px)?);
    }
    Ok(fonts)
}

/// First font of the primary directory, or the builtin bitmap face.
pub fn load_primary_font(resources: &dyn ResourceProvider, px: f32) -> Box<dyn GlyphProvider> {
    match load_fonts_from_directory(resources, PRIMARY_FONT_DIRECTORY, px) {
        Ok(fonts) => match fonts.into_iter().next() {
            Some(font) => {
                debug!(font = font.name(), px, "loaded primary font");
                Box::new(font)
            }
            None => {
                warn!("no primary font found, using builtin 7x13 face");
                Box::new(BuiltinFace::new())
            }
        },
        Err(error) => {
            warn!(code = error.code(), "{error}; using builtin 7x13 face");
            Box::new(BuiltinFace::new())
        }
    }
}

pub fn load_fallback_fonts(resources: &dyn ResourceProvider, px: f32) -> Vec<FontFace> {
    match load_fonts_from_directory(resources, FALLBACK_FONT_DIRECTORY, px) {
        Ok(fonts) => fonts,
        Err(error) => {
            warn!(code = error.code(), "{error}; rendering without fallback fonts");
            Vec::new()
        }
    }
}

pub fn load_glyph_provider(resources: &dyn ResourceProvider, px: f32) -> FallbackFontFace {
    let mut face = FallbackFontFace::new(load_primary_font(resources, px));
    for font in load_fallback_fonts(resources, px) {
        debug!(font = font.name(), "registered fallback font");
        face.add_fallback_font(Box::new(font));
    }
    face
}
