//! Reference Normalizer: raw citation text → canonical reference
//!
//! Two layers, deterministic first:
//!
//! 1. A regex grammar over Brazilian legal terminology parses instrument
//!    keywords (lei, decreto, constituição, medida provisória, súmula,
//!    court-case patterns) and locator keywords (artigo, parágrafo, inciso,
//!    alínea). Case-law identifiers (CNJ process numbers, court acronyms)
//!    are extracted separately from legislative identifiers.
//! 2. Only when the grammar cannot pin a unique instrument (a number/year
//!    without an instrument keyword, or several keywords competing) is the
//!    external [`ResolutionService`] consulted for a ranked candidate list.
//!
//! Confidence below the configured threshold yields
//! `ResolutionResult::Unresolved { reason: "ambiguous" }`, which the
//! coordinator maps to a `Nonexistent` verdict. Spans lacking any locator
//! are still normalized (instrument-only) with `low_confidence` set; they
//! are never fatal.

pub mod grammar;
pub mod normalizer;

use async_trait::async_trait;
use lexaudit_core::RankedCandidate;
use thiserror::Error;

pub use grammar::{CitationGrammar, GrammarOutcome};
pub use normalizer::ReferenceNormalizer;

/// Errors from the external resolution collaborator.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("resolution service unavailable: {0}")]
    Unavailable(String),
    #[error("resolution service timed out")]
    Timeout,
    #[error("resolution service returned an unusable response: {0}")]
    Malformed(String),
}

/// External disambiguation service (a language-model call in production).
///
/// Opaque: it may fail or time out, which the normalizer maps to
/// `Unresolved`.
#[async_trait]
pub trait ResolutionService: Send + Sync {
    /// Rank candidate readings of a citation, returning confidences.
    async fn resolve(
        &self,
        citation_text: &str,
        candidates: &[RankedCandidate],
    ) -> Result<Vec<RankedCandidate>, ResolveError>;
}
