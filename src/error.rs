//! Error types for the copy engine, filters and the archive builder.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a copy operation. Every variant names the path it failed on.
#[derive(Debug, Error)]
pub enum CopyError {
    #[error("open '{}': {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("create '{}': {source}", path.display())]
    Create { path: PathBuf, source: io::Error },

    #[error("copy '{}' → '{}': {source}", src.display(), dst.display())]
    Stream {
        src: PathBuf,
        dst: PathBuf,
        source: io::Error,
    },

    #[error("metadata '{}': {source}", path.display())]
    Metadata { path: PathBuf, source: io::Error },

    #[error("create directory '{}': {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("read directory '{}': {source}", path.display())]
    ReadDir { path: PathBuf, source: io::Error },

    #[error("copy irregular file '{}'", path.display())]
    Irregular { path: PathBuf },

    #[error("destination '{}' lies inside source '{}'", dst.display(), src.display())]
    Nested { src: PathBuf, dst: PathBuf },
}

impl CopyError {
    /// Path the failure refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            CopyError::Open { path, .. }
            | CopyError::Create { path, .. }
            | CopyError::Metadata { path, .. }
            | CopyError::CreateDir { path, .. }
            | CopyError::ReadDir { path, .. }
            | CopyError::Irregular { path } => path,
            CopyError::Stream { dst, .. } | CopyError::Nested { dst, .. } => dst,
        }
    }
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("invalid distribution name '{0}'")]
    InvalidDistName(String),

    #[error("distribution directory '{}' is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error(transparent)]
    Copy(#[from] CopyError),

    #[error("walk '{}': {source}", path.display())]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("zip entry '{name}': {source}")]
    Zip {
        name: String,
        source: zip::result::ZipError,
    },

    #[error("finalize archive '{}': {source}", path.display())]
    Finish {
        path: PathBuf,
        source: zip::result::ZipError,
    },
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },
}
