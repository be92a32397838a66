use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::fs::FileSystem;

/// Destination for rendered screens.
pub trait ImageSink {
    fn write_image_file(&mut self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Whether `write_image_file(name, ..)` would actually write.
    fn is_image_file_writable(&self, name: &str) -> bool;

    fn image_files_written_count(&self) -> usize;
}

/// Writes images into one directory.
///
/// Existing files are left alone unless `force_overwrite` is set. The writer
/// is not synchronized; share it across threads behind a lock.
pub struct ImageFileWriter {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
    force_overwrite: bool,
    written: usize,
}

impl ImageFileWriter {
    pub fn new(fs: Arc<dyn FileSystem>, dir: impl Into<PathBuf>, force_overwrite: bool) -> Self {
        Self {
            fs,
            dir: dir.into(),
            force_overwrite,
            written: 0,
        }
    }
}

impl ImageSink for ImageFileWriter {
    fn write_image_file(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.dir.join(name);
        if !self.force_overwrite && self.fs.exists(&path) {
            debug!(path = %path.display(), "image exists, skipping");
            return Ok(());
        }
        self.fs.write_binary_file(&path, bytes)?;
        self.written += 1;
        Ok(())
    }

    fn is_image_file_writable(&self, name: &str) -> bool {
        self.force_overwrite || !self.fs.exists(&self.dir.join(name))
    }

    fn image_files_written_count(&self) -> usize {
        self.written
    }
}
