//! Run configuration surface.
//!
//! Every tunable of the audit engine is here, with serde support so a run can
//! be configured from JSON. Defaults are tuned for polite use of external
//! services, not normative.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for one audit run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Citations processed in parallel.
    pub worker_concurrency: usize,
    /// Shared permit budget across retrieval and agent-invocation calls.
    pub request_rate_permits: usize,
    /// Budget per citation before its verdict degrades to `Timeout`.
    pub citation_timeout: Duration,
    /// Minimum resolution-service confidence to accept a single candidate.
    pub resolution_confidence_threshold: f64,
    /// Confidence ceiling for verdicts grounded in a low-trust source.
    pub low_trust_confidence_cap: f64,
    /// Evidence snippet sizing when units are exported to the debate.
    pub snippet_min_chars: usize,
    pub snippet_max_chars: usize,
    pub retrieval: RetrievalConfig,
    pub debate: DebateConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            worker_concurrency: 4,
            request_rate_permits: 8,
            citation_timeout: Duration::from_secs(90),
            resolution_confidence_threshold: 0.6,
            low_trust_confidence_cap: 0.75,
            snippet_min_chars: 120,
            snippet_max_chars: 600,
            retrieval: RetrievalConfig::default(),
            debate: DebateConfig::default(),
        }
    }
}

/// Retrieval retry, cache, and trust policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Attempts per candidate URL before escalating a transient failure.
    pub max_attempts: u32,
    /// First backoff delay; doubles per attempt up to `backoff_cap`.
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    /// Cache entries older than this are refetched.
    pub cache_ttl: Duration,
    /// Fetched texts shorter than this are rejected as extraction noise.
    pub min_content_chars: usize,
    /// Official publishers, in priority order. Non-allowlisted sources are
    /// accepted with `TrustLevel::Low`.
    pub official_domains: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(250),
            backoff_cap: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(60 * 60),
            min_content_chars: 500,
            official_domains: vec![
                "planalto.gov.br".to_string(),
                "normas.leg.br".to_string(),
                "lexml.gov.br".to_string(),
                "in.gov.br".to_string(),
                "camara.leg.br".to_string(),
                "senado.leg.br".to_string(),
            ],
        }
    }
}

/// Debate protocol bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateConfig {
    /// Independent verifier agents K. Values below 2 are clamped to 2.
    pub agent_count: usize,
    /// Total debate rounds, the initial proposal round included. The
    /// transcript never exceeds this length. Values below 1 are treated as 1.
    pub round_cap: usize,
    /// Transport retries per agent invocation before the citation degrades
    /// to `Timeout`.
    pub invoke_retries: u32,
}

impl DebateConfig {
    /// Effective K: the configured count, never below the protocol minimum.
    pub fn effective_agent_count(&self) -> usize {
        self.agent_count.max(2)
    }
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            agent_count: 3,
            round_cap: 2,
            invoke_retries: 2,
        }
    }
}
