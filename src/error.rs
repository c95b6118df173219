use std::io;

use thiserror::Error;

/// Library error type for list and slideshow operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Startup produced an empty list; there is nothing to show.
    #[error("no loadable images found")]
    EmptyList,

    /// Every remaining entry failed to load.
    #[error("no more slides in show")]
    NoMoreSlides,

    /// Persisting the filelist to stdin makes no sense.
    #[error("cannot write filelist to stdin")]
    StdinFilelist,

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),
}

/// Why one image could not be loaded.
///
/// Navigation treats every kind the same way (skip and continue); the kind
/// only matters for what the user is told.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("decode error: {0}")]
    Decode(String),

    #[error("file not found")]
    NotFound,

    #[error("permission denied")]
    Permission,

    #[error("unsupported format")]
    Unsupported,

    #[error("external converter failed: {0}")]
    ExternalTool(String),

    #[error("file does not look like an image")]
    MagicMismatch,
}

impl LoadError {
    /// Short label used in verbose reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::NotFound => "not-found",
            Self::Permission => "permission",
            Self::Unsupported => "unsupported",
            Self::ExternalTool(_) => "external-tool",
            Self::MagicMismatch => "magic",
        }
    }

    /// One-character status mark for the verbose progress line.
    pub fn mark(&self) -> char {
        match self {
            Self::Decode(_) => 'x',
            Self::NotFound => '?',
            Self::Permission => '!',
            Self::Unsupported => 'u',
            Self::ExternalTool(_) => 'c',
            Self::MagicMismatch => 'm',
        }
    }
}

impl From<io::Error> for LoadError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::Permission,
            _ => Self::Decode(err.to_string()),
        }
    }
}

impl From<image::ImageError> for LoadError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(io) => io.into(),
            image::ImageError::Unsupported(_) => Self::Unsupported,
            other => Self::Decode(other.to_string()),
        }
    }
}
