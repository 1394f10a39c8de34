use thiserror::Error;

/// Failures scoped to a single category, record or blob.
///
/// None of these abort a run; stages convert them into report issues and
/// keep going with the next unit of work.
#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("remote store unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("sidecar missing or unreadable in {dir}: {reason}")]
    MalformedSidecar { dir: String, reason: String },
    #[error("blob reference does not match storage layout: {0}")]
    InvalidBlobReference(String),
    #[error("unknown category `{0}`")]
    UnknownCategory(String),
    #[error("record {id} is not pending and not already {target}")]
    TransitionRefused { id: String, target: String },
    #[error("record {id} has invalid creation timestamp `{raw}`")]
    InvalidTimestamp { id: String, raw: String },
    #[error("staging write failed for {dir}: {reason}")]
    Staging { dir: String, reason: String },
}

impl ModerationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::RemoteUnavailable(_) => "REMOTE_UNAVAILABLE",
            Self::MalformedSidecar { .. } => "MALFORMED_SIDECAR",
            Self::InvalidBlobReference(_) => "INVALID_BLOB_REFERENCE",
            Self::UnknownCategory(_) => "UNKNOWN_CATEGORY",
            Self::TransitionRefused { .. } => "TRANSITION_REFUSED",
            Self::InvalidTimestamp { .. } => "INVALID_TIMESTAMP",
            Self::Staging { .. } => "STAGING_WRITE",
        }
    }
}

impl From<reqwest::Error> for ModerationError {
    fn from(err: reqwest::Error) -> Self {
        Self::RemoteUnavailable(err.to_string())
    }
}
