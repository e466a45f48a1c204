//! Error types

use std::path::PathBuf;

use crate::types::PageNumber;

/// Errors from the page render primitive
#[derive(Debug, thiserror::Error)]
pub enum RenderFault {
    #[error("page {page} is outside the document (1..={page_count})")]
    PageOutOfRange { page: PageNumber, page_count: usize },

    #[error("failed to decode page {page}: {detail}")]
    Decode { page: PageNumber, detail: String },

    #[error("{detail}")]
    Generic { detail: String },
}

impl RenderFault {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }
}

/// Errors acquiring a document. Fatal to the session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("could not resolve document {id}: {detail}")]
    Resolve { id: String, detail: String },

    #[error("could not open {url}: {detail}")]
    Open { url: String, detail: String },

    #[error("document {url} has no pages")]
    Empty { url: String },
}

/// Errors loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
