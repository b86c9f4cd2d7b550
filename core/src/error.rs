use std::path::PathBuf;

/// Errors produced anywhere in the point cloud workspace.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file extension is not one of the recognized point cloud formats.
    #[error("Unsupported point cloud format: {0}")]
    UnsupportedFormat(String),

    /// Reading or decoding an input file failed.
    #[error("Failed to load {}: {reason}", path.display())]
    LoadFailure { path: PathBuf, reason: String },

    /// A stage ran without the state it depends on.
    #[error("Stage '{stage}' requires {requirement}")]
    MissingPrerequisite {
        stage: &'static str,
        requirement: &'static str,
    },

    /// Creating the output directory or writing an output file failed.
    #[error("Failed to write {}: {source}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wraps any lower-level failure into a [`Error::LoadFailure`] for `path`.
    ///
    /// `UnsupportedFormat` and existing load failures pass through unchanged.
    pub fn into_load_failure(self, path: impl Into<PathBuf>) -> Self {
        match self {
            err @ (Error::UnsupportedFormat(_) | Error::LoadFailure { .. }) => err,
            other => Error::LoadFailure {
                path: path.into(),
                reason: other.to_string(),
            },
        }
    }

    pub fn write_failure(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::WriteFailure {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
