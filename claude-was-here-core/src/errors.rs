use std::fmt;

/// Component-boundary errors. Hooks map every variant to a warning so the
/// user's commit or push is never blocked by provenance tracking.
#[derive(Debug)]
pub enum TrackError {
    /// A tool event that cannot be parsed or lacks required fields.
    InvalidEvent(String),
    /// Read/write failure on the staging directory.
    StagingIo(std::io::Error),
    /// A diff could not be computed; the affected file is not attributed.
    DiffFailure(String),
    /// The metadata ref update lost a compare-and-swap race after retries.
    RefUpdateConflict(String),
    /// Push/fetch of the metadata ref failed.
    NetworkFailure(String),
    /// A stored annotation failed schema validation on read.
    CorruptAnnotation { commit: String, reason: String },
    Git(git2::Error),
    Json(serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TrackError>;

impl fmt::Display for TrackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackError::InvalidEvent(msg) => write!(f, "invalid tool event: {msg}"),
            TrackError::StagingIo(err) => write!(f, "staging store I/O error: {err}"),
            TrackError::DiffFailure(msg) => write!(f, "diff failed: {msg}"),
            TrackError::RefUpdateConflict(msg) => {
                write!(f, "metadata ref update conflict: {msg}")
            }
            TrackError::NetworkFailure(msg) => write!(f, "metadata sync failed: {msg}"),
            TrackError::CorruptAnnotation { commit, reason } => {
                write!(f, "corrupt annotation on {commit}: {reason}")
            }
            TrackError::Git(err) => write!(f, "git operation failed: {err}"),
            TrackError::Json(err) => write!(f, "JSON error: {err}"),
        }
    }
}

impl std::error::Error for TrackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrackError::StagingIo(err) => Some(err),
            TrackError::Git(err) => Some(err),
            TrackError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<git2::Error> for TrackError {
    fn from(err: git2::Error) -> Self {
        TrackError::Git(err)
    }
}

impl From<std::io::Error> for TrackError {
    fn from(err: std::io::Error) -> Self {
        TrackError::StagingIo(err)
    }
}

impl From<serde_json::Error> for TrackError {
    fn from(err: serde_json::Error) -> Self {
        TrackError::Json(err)
    }
}
