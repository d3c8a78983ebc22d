// src/error.rs
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Connection failure, timeout, or a non-2xx status on any request.
    #[error("network error: {url}: {reason}")]
    Network { url: String, reason: String },

    /// Cookie bootstrap did not produce a usable session.
    #[error("session bootstrap failed: {0}")]
    Auth(String),

    /// Missing/duplicate key column or a response shape we cannot read.
    #[error("schema error: {0}")]
    Schema(String),

    /// One or more per-key detail fetches failed. The dataset is still usable.
    #[error("enrichment incomplete: {} key(s) failed: {}", failed.len(), failed.join(", "))]
    PartialEnrichment { failed: Vec<String> },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
        Error::Network { url: url.into(), reason: reason.to_string() }
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Error::Schema(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    /// Errors that must abort a run. Partial enrichment is reported, not fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::PartialEnrichment { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_enrichment_lists_keys_and_is_not_fatal() {
        let e = Error::PartialEnrichment { failed: vec!["H4".into(), "H9".into()] };
        assert_eq!(e.to_string(), "enrichment incomplete: 2 key(s) failed: H4, H9");
        assert!(!e.is_fatal());
        assert!(Error::schema("x").is_fatal());
    }
}
