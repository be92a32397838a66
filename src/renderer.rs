//! Rasterizes terminal screens onto a fixed character grid.

use std::io::Cursor;

use image::error::{ImageError, LimitError, LimitErrorKind, ParameterError, ParameterErrorKind};
use image::{ImageFormat, Rgba, RgbaImage};
use tracing::{debug, warn};

use crate::capture::{image_file_name, parse_capture, ColorCode, Field, Screen, ScreenSize};
use crate::error::{Error, Result};
use crate::fonts::{
    load_glyph_provider, BuiltinFace, CellMetrics, FallbackFontFace, GlyphBitmap, GlyphProvider,
};
use crate::resources::ResourceProvider;
use crate::writer::ImageSink;

const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);
const STATUS_LINE_ROWS: u32 = 2;
/// Largest RGBA canvas a single screen may allocate.
pub const MAX_CANVAS_BYTES: u64 = 1 << 30;

/// Turns a serialized capture into one image per screen.
pub trait ImageRenderer: Send + Sync {
    fn render_json_bytes_to_image_files(
        &self,
        json_bytes: &[u8],
        sink: &mut dyn ImageSink,
    ) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Adds two rows below the grid describing the screen.
    pub status_line: bool,
}

/// One character placed on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPlacement {
    pub row: u32,
    pub column: u32,
    pub ch: char,
}

/// Grid cells covered by a field's text.
///
/// Text runs to the end of the row and continues at column 0 of the next row,
/// wrapping from the last row back to row 0.
pub fn layout_field(field: &Field, size: ScreenSize) -> Vec<CellPlacement> {
    if size.rows == 0 || size.columns == 0 {
        return Vec::new();
    }
    let mut row = field.row % size.rows;
    let mut column = field.column;
    let mut placements = Vec::new();
    for ch in field.characters() {
        if column >= size.columns {
            column = 0;
            row = (row + 1) % size.rows;
        }
        placements.push(CellPlacement { row, column, ch });
        column += 1;
    }
    placements
}

pub fn status_text(screen: &Screen) -> String {
    let ScreenSize { rows, columns } = screen.image_size;
    if screen.inbound {
        format!("{} - {columns}x{rows} - Inbound ", screen.id)
    } else {
        format!(
            "{} - {columns}x{rows} - Outbound - {}",
            screen.id,
            screen.aid.as_deref().unwrap_or_default()
        )
    }
}

pub struct ScreenRenderer {
    face: FallbackFontFace,
    options: RenderOptions,
}

impl ScreenRenderer {
    pub fn new(face: FallbackFontFace, options: RenderOptions) -> Self {
        Self { face, options }
    }

    /// Loads fonts from `resources`, degrading to the builtin face.
    pub fn from_resources(
        resources: &dyn ResourceProvider,
        font_size: f32,
        options: RenderOptions,
    ) -> Self {
        Self::new(load_glyph_provider(resources, font_size), options)
    }

    pub fn builtin(options: RenderOptions) -> Self {
        Self::new(FallbackFontFace::new(Box::new(BuiltinFace::new())), options)
    }

    pub fn metrics(&self) -> CellMetrics {
        self.face.metrics()
    }

    pub fn close(&mut self) -> Result<()> {
        self.face.close()
    }

    /// Pixel size of the canvas for `size`.
    ///
    /// Empty canvases and canvases over [`MAX_CANVAS_BYTES`] are rejected as
    /// encoding errors before anything is allocated.
    pub fn canvas_dimensions(&self, size: ScreenSize, name: &str) -> Result<(u32, u32)> {
        let metrics = self.face.metrics();
        let mut grid_rows = u64::from(size.rows);
        if self.options.status_line {
            grid_rows += u64::from(STATUS_LINE_ROWS);
        }
        let width = u64::from(size.columns) * u64::from(metrics.cell_width);
        let canvas = grid_rows
            .checked_mul(u64::from(metrics.cell_height))
            .and_then(|height| {
                let bytes = height.checked_mul(width)?.checked_mul(4)?;
                Some((height, bytes))
            });
        match canvas {
            Some((_, 0)) => Err(encoding_error(
                name,
                ImageError::Parameter(ParameterError::from_kind(
                    ParameterErrorKind::DimensionMismatch,
                )),
            )),
            Some((height, bytes)) if bytes <= MAX_CANVAS_BYTES => Ok((width as u32, height as u32)),
            _ => Err(encoding_error(
                name,
                ImageError::Limits(LimitError::from_kind(LimitErrorKind::DimensionError)),
            )),
        }
    }

    pub fn render_screen(&self, screen: &Screen, name: &str) -> Result<RgbaImage> {
        let metrics = self.face.metrics();
        let size = screen.image_size;
        let (width, height) = self.canvas_dimensions(size, name)?;
        let mut canvas = RgbaImage::from_pixel(width, height, BACKGROUND);

        for field in &screen.fields {
            let color = field.color().rgba();
            for cell in layout_field(field, size) {
                self.draw_cell(&mut canvas, &metrics, cell, color);
            }
        }

        if self.options.status_line {
            let color = ColorCode::Default.rgba();
            for (column, ch) in status_text(screen).chars().enumerate() {
                let column = column as u32;
                if column >= size.columns {
                    break;
                }
                let cell = CellPlacement {
                    row: size.rows,
                    column,
                    ch,
                };
                self.draw_cell(&mut canvas, &metrics, cell, color);
            }
        }

        Ok(canvas)
    }

    pub fn render_screen_png(&self, screen: &Screen, name: &str) -> Result<Vec<u8>> {
        encode_png(&self.render_screen(screen, name)?, name)
    }

    fn draw_cell(
        &self,
        canvas: &mut RgbaImage,
        metrics: &CellMetrics,
        cell: CellPlacement,
        color: [u8; 4],
    ) {
        let x = cell.column.saturating_mul(metrics.cell_width);
        let y = cell.row.saturating_mul(metrics.cell_height);
        clear_cell(canvas, x, y, metrics);

        let Some(glyph) = self.face.glyph(cell.ch) else {
            return;
        };
        if glyph.is_blank() {
            return;
        }
        let (width, height) = canvas.dimensions();
        let baseline = y as i32 + metrics.ascent as i32;
        blend_glyph(
            canvas,
            width,
            height,
            x as i32 + glyph.xmin,
            baseline - glyph.ymin - glyph.height as i32,
            &glyph,
            color,
        );
    }
}

impl ImageRenderer for ScreenRenderer {
    fn render_json_bytes_to_image_files(
        &self,
        json_bytes: &[u8],
        sink: &mut dyn ImageSink,
    ) -> Result<()> {
        let capture = parse_capture(json_bytes)?;
        for screen in &capture.images {
            let name = image_file_name(&capture.id, screen.sequence);
            if !sink.is_image_file_writable(&name) {
                debug!(image = %name, "image already present, not rendering");
                continue;
            }
            match self.render_screen_png(screen, &name) {
                Ok(png) => sink.write_image_file(&name, &png)?,
                Err(error) => warn!(code = error.code(), "{error}"),
            }
        }
        Ok(())
    }
}

fn encoding_error(name: &str, source: ImageError) -> Error {
    Error::Encoding {
        name: name.to_owned(),
        source,
    }
}

pub fn encode_png(image: &RgbaImage, name: &str) -> Result<Vec<u8>> {
    if image.width() == 0 || image.height() == 0 {
        return Err(encoding_error(
            name,
            ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::DimensionMismatch,
            )),
        ));
    }
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .map_err(|source| encoding_error(name, source))?;
    Ok(bytes.into_inner())
}

fn clear_cell(canvas: &mut RgbaImage, x: u32, y: u32, metrics: &CellMetrics) {
    let (width, height) = canvas.dimensions();
    let right = x.saturating_add(metrics.cell_width).min(width);
    let bottom = y.saturating_add(metrics.cell_height).min(height);
    for py in y..bottom {
        for px in x..right {
            canvas.put_pixel(px, py, BACKGROUND);
        }
    }
}

fn blend_glyph(
    frame: &mut [u8],
    frame_width: u32,
    frame_height: u32,
    x: i32,
    y: i32,
    glyph: &GlyphBitmap,
    color: [u8; 4],
) {
    for row in 0..glyph.height {
        let py = y + row as i32;
        if py < 0 || py >= frame_height as i32 {
            continue;
        }
        for col in 0..glyph.width {
            let px = x + col as i32;
            if px < 0 || px >= frame_width as i32 {
                continue;
            }
            let mask = glyph.coverage[row * glyph.width + col];
            if mask == 0 {
                continue;
            }
            let alpha = ((u16::from(mask) * u16::from(color[3])) / 255) as u8;
            let idx = (py as usize * frame_width as usize + px as usize) * 4;
            blend_pixel(frame, idx, [color[0], color[1], color[2], alpha]);
        }
    }
}

fn blend_pixel(frame: &mut [u8], idx: usize, src: [u8; 4]) {
    let alpha = u16::from(src[3]);
    if alpha == 0 {
        return;
    }
    let inv_alpha = 255_u16.saturating_sub(alpha);
    for channel in 0..3 {
        let dst = u16::from(frame[idx + channel]);
        let src_c = u16::from(src[channel]);
        frame[idx + channel] = ((src_c * alpha + dst * inv_alpha + 127) / 255) as u8;
    }
    frame[idx + 3] = 255;
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use super::*;
    use crate::capture::{Capture, FieldContents};
    use crate::fonts::{GlyphBounds, BUILTIN_CELL_HEIGHT, BUILTIN_CELL_WIDTH};
    use crate::fs::{FileSystem, MemoryFileSystem};
    use crate::resources::MemoryResources;
    use crate::writer::ImageFileWriter;

    const GREEN: [u8; 4] = [0, 255, 0, 255];
    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    /// Fills the whole cell for the characters it covers.
    struct SolidBlockFont {
        covers: char,
    }

    impl GlyphProvider for SolidBlockFont {
        fn name(&self) -> &str {
            "solid-block"
        }

        fn metrics(&self) -> CellMetrics {
            CellMetrics {
                cell_width: 30,
                cell_height: 30,
                ascent: 25,
            }
        }

        fn glyph(&self, ch: char) -> Option<GlyphBitmap> {
            (ch == self.covers).then(|| GlyphBitmap {
                width: 5,
                height: 9,
                xmin: 1,
                ymin: 0,
                advance: 7.0,
                coverage: vec![255; 45],
            })
        }

        fn glyph_bounds(&self, ch: char) -> Option<(GlyphBounds, f32)> {
            self.glyph(ch).map(|glyph| {
                let bounds = GlyphBounds {
                    xmin: 1.0,
                    ymin: 0.0,
                    width: glyph.width as f32,
                    height: glyph.height as f32,
                };
                (bounds, glyph.advance)
            })
        }

        fn glyph_advance(&self, ch: char) -> Option<f32> {
            self.glyph(ch).map(|glyph| glyph.advance)
        }

        fn kern(&self, _left: char, _right: char) -> f32 {
            0.0
        }
    }

    fn text_field(row: u32, column: u32, text: &str, color: &str) -> Field {
        Field {
            row,
            column,
            foreground_color: color.to_owned(),
            contents: vec![FieldContents::text(text)],
            ..Field::default()
        }
    }

    fn screen(rows: u32, columns: u32, fields: Vec<Field>) -> Screen {
        Screen {
            id: "term1-1".to_owned(),
            sequence: 1,
            inbound: true,
            image_size: ScreenSize { rows, columns },
            fields,
            ..Screen::default()
        }
    }

    fn cell_pixels(image: &RgbaImage, row: u32, column: u32) -> Vec<[u8; 4]> {
        let mut pixels = Vec::new();
        for y in row * BUILTIN_CELL_HEIGHT..(row + 1) * BUILTIN_CELL_HEIGHT {
            for x in column * BUILTIN_CELL_WIDTH..(column + 1) * BUILTIN_CELL_WIDTH {
                pixels.push(image.get_pixel(x, y).0);
            }
        }
        pixels
    }

    fn cell_has(image: &RgbaImage, row: u32, column: u32, color: [u8; 4]) -> bool {
        cell_pixels(image, row, column).contains(&color)
    }

    fn cell_is_blank(image: &RgbaImage, row: u32, column: u32) -> bool {
        cell_pixels(image, row, column)
            .iter()
            .all(|pixel| *pixel == BACKGROUND.0)
    }

    fn render(renderer: &ScreenRenderer, screen: &Screen) -> RgbaImage {
        renderer
            .render_screen(screen, "term1-00001.png")
            .expect("screen should render")
    }

    fn grid(rows: u32, columns: u32) -> ScreenSize {
        ScreenSize { rows, columns }
    }

    fn capture_of(screens: Vec<Screen>) -> Vec<u8> {
        let capture = Capture {
            id: "term1".to_owned(),
            images: screens,
            ..Capture::default()
        };
        serde_json::to_vec(&capture).unwrap()
    }

    #[test]
    fn long_field_wraps_onto_next_row_from_column_zero() {
        let text = "X".repeat(70);
        let placements = layout_field(&text_field(11, 20, &text, "d"), grid(24, 80));
        assert_eq!(placements.len(), 70);
        assert_eq!((placements[59].row, placements[59].column), (11, 79));
        assert_eq!((placements[60].row, placements[60].column), (12, 0));
        assert_eq!((placements[69].row, placements[69].column), (12, 9));
    }

    #[test]
    fn wrapping_past_the_last_row_lands_on_row_zero() {
        let placements = layout_field(&text_field(23, 78, "ABC", "d"), grid(24, 80));
        let cells = placements
            .iter()
            .map(|cell| (cell.row, cell.column, cell.ch))
            .collect::<Vec<_>>();
        assert_eq!(cells, vec![(23, 78, 'A'), (23, 79, 'B'), (0, 0, 'C')]);
    }

    #[test]
    fn start_row_outside_grid_is_reduced_modulo_rows() {
        let placements = layout_field(&text_field(30, 0, "A", "d"), grid(24, 80));
        assert_eq!(placements[0].row, 6);
        assert!(layout_field(&text_field(0, 0, "A", "d"), grid(0, 80)).is_empty());
    }

    #[test]
    fn canvas_is_grid_of_cells_on_black() {
        let renderer = ScreenRenderer::builtin(RenderOptions::default());
        let image = render(&renderer, &screen(24, 80, Vec::new()));
        assert_eq!(
            image.dimensions(),
            (80 * BUILTIN_CELL_WIDTH, 24 * BUILTIN_CELL_HEIGHT)
        );
        assert!(image.pixels().all(|pixel| *pixel == BACKGROUND));
    }

    #[test]
    fn field_is_drawn_in_its_colour_at_its_cell() {
        let renderer = ScreenRenderer::builtin(RenderOptions::default());
        let image = render(&renderer, &screen(24, 80, vec![text_field(2, 5, "AB", "r")]));
        assert!(cell_has(&image, 2, 5, RED));
        assert!(cell_has(&image, 2, 6, RED));
        assert!(cell_is_blank(&image, 2, 4));
        assert!(cell_is_blank(&image, 2, 7));
    }

    #[test]
    fn unknown_colour_code_renders_in_default_colour() {
        let renderer = ScreenRenderer::builtin(RenderOptions::default());
        let image = render(&renderer, &screen(24, 80, vec![text_field(0, 0, "A", "?")]));
        assert!(cell_has(&image, 0, 0, GREEN));
    }

    #[test]
    fn later_fields_overwrite_earlier_ones() {
        let renderer = ScreenRenderer::builtin(RenderOptions::default());
        let fields = vec![text_field(0, 0, "W", "r"), text_field(0, 0, "M", "b")];
        let image = render(&renderer, &screen(24, 80, fields));
        assert!(cell_has(&image, 0, 0, BLUE));
        assert!(!cell_has(&image, 0, 0, RED));
    }

    #[test]
    fn chars_runs_render_like_text() {
        let renderer = ScreenRenderer::builtin(RenderOptions::default());
        let as_text = screen(24, 80, vec![text_field(3, 3, "LOGON", "t")]);
        let mut as_chars = as_text.clone();
        as_chars.fields[0].contents = vec![FieldContents {
            characters: Some(vec!["L".to_owned(), "OG".to_owned(), "ON".to_owned()]),
            text: String::new(),
        }];
        assert_eq!(render(&renderer, &as_text), render(&renderer, &as_chars));
    }

    #[test]
    fn character_missing_from_primary_is_drawn_from_fallback() {
        let face = FallbackFontFace::new(Box::new(BuiltinFace::new()))
            .with_fallback_font(Box::new(SolidBlockFont { covers: 'λ' }));
        let renderer = ScreenRenderer::new(face, RenderOptions::default());

        let image = render(&renderer, &screen(24, 80, vec![text_field(1, 1, "λ", "n")]));
        assert!(cell_has(&image, 1, 1, [255, 255, 255, 255]));

        let builtin_only = ScreenRenderer::builtin(RenderOptions::default());
        let without_fallback = render(
            &builtin_only,
            &screen(24, 80, vec![text_field(1, 1, "λ", "n")]),
        );
        assert!(cell_is_blank(&without_fallback, 1, 1));
    }

    #[test]
    fn status_line_adds_two_rows_with_screen_summary() {
        let renderer = ScreenRenderer::builtin(RenderOptions { status_line: true });
        let image = render(&renderer, &screen(24, 80, Vec::new()));
        assert_eq!(image.height(), 26 * BUILTIN_CELL_HEIGHT);
        assert!(cell_has(&image, 24, 0, GREEN));
        assert!(cell_is_blank(&image, 25, 0));
    }

    #[test]
    fn status_text_describes_direction() {
        let mut inbound = screen(24, 80, Vec::new());
        assert_eq!(status_text(&inbound), "term1-1 - 80x24 - Inbound ");
        inbound.inbound = false;
        inbound.aid = Some("ENTER".to_owned());
        assert_eq!(status_text(&inbound), "term1-1 - 80x24 - Outbound - ENTER");
    }

    #[test]
    fn every_screen_becomes_a_png_file() {
        let fs = Arc::new(MemoryFileSystem::new());
        let json = capture_of(
            (1..=3)
                .map(|sequence| Screen {
                    sequence,
                    ..screen(24, 80, vec![text_field(0, 0, "HELLO", "y")])
                })
                .collect(),
        );

        let mut writer = ImageFileWriter::new(fs.clone(), "/out", false);
        let renderer = ScreenRenderer::builtin(RenderOptions::default());
        renderer
            .render_json_bytes_to_image_files(&json, &mut writer)
            .unwrap();

        assert_eq!(writer.image_files_written_count(), 3);
        let png = fs
            .read_binary_file(Path::new("/out/term1-00003.png"))
            .unwrap();
        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
        assert_eq!(decoded.width(), 80 * BUILTIN_CELL_WIDTH);
    }

    #[test]
    fn malformed_json_is_reported_as_parse_error() {
        let fs = Arc::new(MemoryFileSystem::new());
        let mut writer = ImageFileWriter::new(fs, "/out", false);
        let renderer = ScreenRenderer::builtin(RenderOptions::default());
        let err = renderer
            .render_json_bytes_to_image_files(b"{\"id\":", &mut writer)
            .unwrap_err();
        assert_eq!(err.code(), "BAD_TERMINAL_JSON_FORMAT");
    }

    #[test]
    fn unencodable_screen_is_skipped_without_failing_the_batch() {
        let fs = Arc::new(MemoryFileSystem::new());
        let json = capture_of(vec![
            Screen {
                sequence: 1,
                ..screen(0, 0, Vec::new())
            },
            Screen {
                sequence: 2,
                ..screen(24, 80, Vec::new())
            },
        ]);
        let mut writer = ImageFileWriter::new(fs.clone(), "/out", false);
        ScreenRenderer::builtin(RenderOptions::default())
            .render_json_bytes_to_image_files(&json, &mut writer)
            .unwrap();

        assert_eq!(writer.image_files_written_count(), 1);
        assert!(!fs.exists(Path::new("/out/term1-00001.png")));
        assert!(fs.exists(Path::new("/out/term1-00002.png")));
    }

    #[test]
    fn oversized_screen_is_skipped_and_later_screens_still_render() {
        let fs = Arc::new(MemoryFileSystem::new());
        let json = capture_of(vec![
            Screen {
                sequence: 1,
                ..screen(u32::MAX, u32::MAX, vec![text_field(0, 0, "A", "g")])
            },
            Screen {
                sequence: 2,
                ..screen(100_000, 100_000, Vec::new())
            },
            Screen {
                sequence: 3,
                ..screen(24, 80, vec![text_field(0, 0, "A", "g")])
            },
        ]);
        let mut writer = ImageFileWriter::new(fs.clone(), "/out", false);
        ScreenRenderer::builtin(RenderOptions { status_line: true })
            .render_json_bytes_to_image_files(&json, &mut writer)
            .unwrap();

        assert_eq!(writer.image_files_written_count(), 1);
        assert!(!fs.exists(Path::new("/out/term1-00001.png")));
        assert!(!fs.exists(Path::new("/out/term1-00002.png")));
        assert!(fs.exists(Path::new("/out/term1-00003.png")));
    }

    #[test]
    fn canvas_size_is_bounded_before_allocation() {
        let renderer = ScreenRenderer::builtin(RenderOptions::default());
        assert_eq!(
            renderer.canvas_dimensions(grid(24, 80), "ok.png").unwrap(),
            (80 * BUILTIN_CELL_WIDTH, 24 * BUILTIN_CELL_HEIGHT)
        );

        for size in [grid(0, 80), grid(24, 0), grid(u32::MAX, u32::MAX), grid(50_000, 50_000)] {
            let err = renderer.canvas_dimensions(size, "big.png").unwrap_err();
            assert_eq!(err.code(), "PNG_ENCODING_FAILED");
            assert!(err.to_string().contains("big.png"));
        }

        let err = renderer
            .render_screen(&screen(u32::MAX, 1, Vec::new()), "tall.png")
            .unwrap_err();
        assert_eq!(err.code(), "PNG_ENCODING_FAILED");
    }

    #[test]
    fn renderer_without_font_resources_uses_builtin_grid() {
        let resources = MemoryResources::new();
        let mut renderer =
            ScreenRenderer::from_resources(&resources, 14.0, RenderOptions::default());
        assert_eq!(renderer.metrics(), BuiltinFace::new().metrics());
        renderer.close().unwrap();
    }

    #[test]
    fn zero_sized_image_is_an_encoding_error() {
        let err = encode_png(&RgbaImage::new(0, 0), "empty.png").unwrap_err();
        assert_eq!(err.code(), "PNG_ENCODING_FAILED");
    }
}
