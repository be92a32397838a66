//! Renders recorded 3270 terminal screens into PNG images.
//!
//! Capture archives (`terminals/<id>/<id>-<n>.gz`) are found under a results
//! folder, decompressed, and every screen they hold is drawn onto a fixed
//! character grid and written to the matching `images/<id>/` folder.

pub mod capture;
pub mod config;
pub mod error;
pub mod expander;
pub mod fonts;
pub mod fs;
pub mod polling;
pub mod renderer;
pub mod resources;
pub mod writer;

pub use capture::{Capture, ColorCode, Field, FieldContents, Screen, ScreenSize};
pub use config::Config;
pub use error::{Error, Result};
pub use expander::{
    calculate_target_image_paths, CaptureArchiveExpander, ImageExpander, NullImageExpander,
};
pub use fonts::{BuiltinFace, FallbackFontFace, FontFace, GlyphProvider};
pub use fs::{FileSystem, MemoryFileSystem, OsFileSystem};
pub use polling::{PeriodicJob, DEFAULT_MILLISECS_BETWEEN_POLLS};
pub use renderer::{ImageRenderer, RenderOptions, ScreenRenderer};
pub use resources::{DiskResources, MemoryResources, ResourceProvider};
pub use writer::{ImageFileWriter, ImageSink};
