use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which of the two remote datasets a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    Education,
    Counties,
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dataset::Education => write!(f, "education dataset"),
            Dataset::Counties => write!(f, "county topology"),
        }
    }
}

/// Underlying reason a retrieval failed.
#[derive(Debug, Error)]
pub enum FetchCause {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to fetch {dataset} from {url}")]
    Fetch {
        dataset: Dataset,
        url: String,
        #[source]
        source: FetchCause,
    },

    #[error("failed to decode boundary topology: {0}")]
    Decode(String),

    #[error("education dataset contains no values to build a color scale from")]
    EmptyDomain,

    #[error("color palette must contain at least one color")]
    EmptyPalette,

    #[error("map generation was cancelled before it completed")]
    Cancelled,

    #[error("map session result was already taken")]
    AlreadyFinished,

    #[error("failed to write rendered map to {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MapError {
    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        MapError::Decode(reason.into())
    }
}
