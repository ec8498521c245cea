//! Error taxonomy shared by both pipelines.

use std::path::PathBuf;

/// Every way a pipeline run can fail. Nothing is recovered locally: the
/// binaries surface the error and exit without writing output.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("failed to parse {what}: {reason}")]
    Parse { what: String, reason: String },

    #[error("coordinate reference system is unknown or undefined")]
    UnknownCrs,

    #[error("reprojection failed: {0}")]
    Projection(String),

    #[error("network request failed: {0}")]
    Network(String),

    #[error("place could not be resolved to a boundary polygon: {0}")]
    PlaceNotFound(String),

    #[error("nothing to process: {0}")]
    EmptyInput(&'static str),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn parse(what: impl Into<String>, reason: impl ToString) -> Self {
        PipelineError::Parse {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::Network(err.to_string())
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
