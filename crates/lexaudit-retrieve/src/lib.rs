//! Source Retriever: canonical reference → official text
//!
//! Retrieval is keyed by instrument identity only (locators are resolved
//! later by the segmenter), so every citation pointing at the same statute
//! shares one fetch. Guarantees:
//!
//! - **At-most-one concurrent fetch per instrument key**: concurrent
//!   requests subscribe to the single in-flight fetch (single-flight cache).
//! - **Bounded retries** with exponential backoff on transient failures;
//!   exhaustion surfaces as `NotFound` only when the search collaborator
//!   also reported no candidate sources, otherwise as a hard `Transient`.
//! - **Trust policy**: candidate URLs are tried in the official-publisher
//!   allowlist's priority order; non-allowlisted sources are accepted but
//!   marked `TrustLevel::Low`, which caps downstream confidence.
//!
//! The search/fetch collaborator is opaque behind [`SearchService`]; a
//! `reqwest`-backed implementation is feature-gated behind `http`.

pub mod cache;
pub mod markers;
pub mod retriever;

#[cfg(feature = "http")]
pub mod http;

use async_trait::async_trait;
use lexaudit_core::InstrumentKey;
use thiserror::Error;

pub use cache::RetrievalCache;
pub use retriever::SourceRetriever;

/// Errors surfaced to the retriever's caller.
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    /// Transient failure that survived the retry budget.
    #[error("transient retrieval failure: {0}")]
    Transient(String),
    /// The search collaborator reported no candidate sources.
    #[error("no official source found for {0}")]
    NotFound(String),
}

/// Errors from the search/fetch collaborator.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("no results")]
    NotFound,
    #[error("transient search failure: {0}")]
    Transient(String),
}

/// One candidate source URL from the search collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCandidate {
    pub url: String,
}

impl SourceCandidate {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// External retrieval/search collaborator.
#[async_trait]
pub trait SearchService: Send + Sync {
    /// Locate candidate source URLs for an instrument.
    async fn find_official_source(
        &self,
        key: &InstrumentKey,
    ) -> Result<Vec<SourceCandidate>, SearchError>;

    /// Fetch the raw text behind a URL.
    async fn fetch(&self, url: &str) -> Result<String, SearchError>;
}
