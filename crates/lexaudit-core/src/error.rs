//! Closed error taxonomy for the audit engine.
//!
//! Every error arising from an external collaborator folds into a terminal
//! verdict for its citation; only `Infrastructure` aborts the whole run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    /// Malformed span (e.g. no locator). Non-fatal; the reference is still
    /// normalized with `low_confidence`.
    #[error("extraction gap: {0}")]
    ExtractionGap(String),

    /// Resolution produced candidates but none above the confidence
    /// threshold.
    #[error("resolution ambiguous: {0}")]
    ResolutionAmbiguous(String),

    /// The resolution service failed or timed out.
    #[error("resolution failed: {0}")]
    ResolutionFailed(String),

    /// Transient retrieval failure, already retried to exhaustion.
    #[error("retrieval transient failure: {0}")]
    RetrievalTransient(String),

    /// The search collaborator reported no candidate sources.
    #[error("no official source found for {0}")]
    RetrievalNotFound(String),

    /// The instrument was retrieved but carries no evidence for the locator.
    #[error("evidence missing: {0}")]
    EvidenceMissing(String),

    /// The debate reached the round cap without a majority.
    #[error("debate did not converge: {0}")]
    DebateNonConvergent(String),

    /// An external service stayed unreachable past its retry budget.
    #[error("service timeout: {0}")]
    ServiceTimeout(String),

    /// Run-fatal failure (cache corruption, worker-pool initialization).
    #[error("infrastructure failure: {0}")]
    Infrastructure(String),
}

impl AuditError {
    /// Whether this error aborts the whole run instead of folding into a
    /// per-citation verdict.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AuditError::Infrastructure(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_infrastructure_is_fatal() {
        assert!(AuditError::Infrastructure("cache corrupt".into()).is_fatal());
        assert!(!AuditError::RetrievalNotFound("urn".into()).is_fatal());
        assert!(!AuditError::ServiceTimeout("invoker".into()).is_fatal());
        assert!(!AuditError::DebateNonConvergent("2/4".into()).is_fatal());
    }
}
