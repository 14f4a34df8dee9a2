use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error taxonomy. Every variant is user-facing: `main` prints
/// it after the program name and exits 1. Transient cache conditions are
/// deliberately not represented here; they are handled inside the cache
/// as misses and never reach the user.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Bad or missing command-line value. Carries the offending token in
    /// its message.
    #[error("{0}")]
    Argument(String),

    /// Missing or unusable environment configuration.
    #[error("{var}: {message}")]
    Environment { var: &'static str, message: String },

    /// Failure while reading or parsing the source file.
    #[error("{}: {message}", path.display())]
    SourceInput { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Renderer-internal failure surfaced through the report dispatcher.
    #[error(transparent)]
    Report(#[from] anyhow::Error),
}

impl Error {
    pub fn argument(message: impl Into<String>) -> Self {
        Error::Argument(message.into())
    }

    pub fn environment(var: &'static str, message: impl Into<String>) -> Self {
        Error::Environment {
            var,
            message: message.into(),
        }
    }

    pub fn source_input(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::SourceInput {
            path: path.into(),
            message: message.into(),
        }
    }
}
