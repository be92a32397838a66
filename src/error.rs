use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading fonts, expanding archives and writing images.
#[derive(Debug, Error)]
pub enum Error {
    /// The archive is not a readable gzip stream.
    #[error("could not decompress '{}': {source}", path.display())]
    Decompression {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The decompressed bytes are not a terminal capture document.
    #[error("bad terminal JSON format: {0}")]
    Parse(#[from] serde_json::Error),

    /// A font resource is missing or could not be parsed.
    #[error("could not load font '{path}': {reason}")]
    FontLoad { path: String, reason: String },

    /// A rendered screen could not be encoded as PNG.
    #[error("PNG encoding failed for '{name}': {source}")]
    Encoding {
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("file system error on '{}': {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A periodic job was driven through an invalid state transition.
    #[error("job '{name}' {reason}")]
    Job { name: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn file_system(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }

    pub fn font_load(path: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::FontLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable, machine readable identifier for this kind of failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decompression { .. } => "BAD_GZIP_ARCHIVE",
            Self::Parse(_) => "BAD_TERMINAL_JSON_FORMAT",
            Self::FontLoad { .. } => "FONT_LOAD_FAILED",
            Self::Encoding { .. } => "PNG_ENCODING_FAILED",
            Self::FileSystem { .. } => "FILE_SYSTEM_ERROR",
            Self::Job { .. } => "JOB_STATE",
            Self::Config(_) => "BAD_CONFIG",
        }
    }
}

/// Finds the first library error in an `anyhow` chain.
pub fn find_termsnap_error(error: &anyhow::Error) -> Option<&Error> {
    error.chain().find_map(|cause| cause.downcast_ref::<Error>())
}
