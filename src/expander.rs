//! Finds capture archives under a results folder and expands them into images.
//!
//! Archives live at `.../terminals/<terminal>/<terminal>-<n>.gz`; the images
//! for them are written to `.../images/<terminal>/`.

use std::ffi::OsStr;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use flate2::read::GzDecoder;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::renderer::ImageRenderer;
use crate::writer::{ImageFileWriter, ImageSink};

pub const ARCHIVE_EXTENSION: &str = "gz";
pub const ARCHIVE_FOLDER: &str = "terminals";
pub const IMAGE_FOLDER: &str = "images";

pub trait ImageExpander: Send + Sync {
    /// Expands every archive below `root`, stopping at the first failure.
    fn expand_images(&self, root: &Path) -> Result<()>;

    fn expand_image(&self, archive_path: &Path) -> Result<()>;

    fn expanded_image_file_count(&self) -> usize;
}

/// Expander used when rendering is switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullImageExpander;

impl NullImageExpander {
    pub fn new() -> Self {
        Self
    }
}

impl ImageExpander for NullImageExpander {
    fn expand_images(&self, _root: &Path) -> Result<()> {
        Ok(())
    }

    fn expand_image(&self, _archive_path: &Path) -> Result<()> {
        Ok(())
    }

    fn expanded_image_file_count(&self) -> usize {
        0
    }
}

pub struct CaptureArchiveExpander {
    fs: Arc<dyn FileSystem>,
    renderer: Arc<dyn ImageRenderer>,
    force_overwrite: bool,
    expanded: AtomicUsize,
}

impl CaptureArchiveExpander {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        renderer: Arc<dyn ImageRenderer>,
        force_overwrite: bool,
    ) -> Self {
        Self {
            fs,
            renderer,
            force_overwrite,
            expanded: AtomicUsize::new(0),
        }
    }
}

impl ImageExpander for CaptureArchiveExpander {
    fn expand_images(&self, root: &Path) -> Result<()> {
        info!(root = %root.display(), "expanding terminal captures into images");
        let before = self.expanded_image_file_count();
        for path in self.fs.all_file_paths(root)? {
            self.expand_image(&path)?;
        }
        info!(
            root = %root.display(),
            written = self.expanded_image_file_count() - before,
            "finished expanding terminal captures"
        );
        Ok(())
    }

    fn expand_image(&self, archive_path: &Path) -> Result<()> {
        if archive_path.extension() != Some(OsStr::new(ARCHIVE_EXTENSION)) {
            return Ok(());
        }
        let Some(target_dir) = calculate_target_image_paths(archive_path) else {
            debug!(
                path = %archive_path.display(),
                "archive is not inside a terminals folder, ignoring"
            );
            return Ok(());
        };

        let compressed = self.fs.read_binary_file(archive_path)?;
        let json = gunzip(archive_path, &compressed)?;
        self.fs.mkdir_all(&target_dir)?;

        let mut writer =
            ImageFileWriter::new(Arc::clone(&self.fs), &target_dir, self.force_overwrite);
        let rendered = self.renderer.render_json_bytes_to_image_files(&json, &mut writer);
        let written = writer.image_files_written_count();
        self.expanded.fetch_add(written, Ordering::SeqCst);
        debug!(
            archive = %archive_path.display(),
            target = %target_dir.display(),
            written,
            "expanded archive"
        );
        rendered
    }

    fn expanded_image_file_count(&self) -> usize {
        self.expanded.load(Ordering::SeqCst)
    }
}

/// Folder that images for `archive_path` belong in.
///
/// The last `terminals` component that has something after it is swapped
/// for `images` and the file name is dropped. `None` when there is no such
/// component.
pub fn calculate_target_image_paths(archive_path: &Path) -> Option<PathBuf> {
    let components = archive_path.components().collect::<Vec<_>>();
    if components.len() < 2 {
        return None;
    }
    let parent_len = components.len() - 1;
    let archive_folder = components[..parent_len]
        .iter()
        .rposition(|component| *component == Component::Normal(OsStr::new(ARCHIVE_FOLDER)))?;

    let mut target = PathBuf::new();
    for (index, component) in components[..parent_len].iter().enumerate() {
        if index == archive_folder {
            target.push(IMAGE_FOLDER);
        } else {
            target.push(component);
        }
    }
    Some(target)
}

fn gunzip(archive_path: &Path, compressed: &[u8]) -> Result<Vec<u8>> {
    let mut json = Vec::new();
    GzDecoder::new(compressed)
        .read_to_end(&mut json)
        .map_err(|source| Error::Decompression {
            path: archive_path.to_path_buf(),
            source,
        })?;
    Ok(json)
}
