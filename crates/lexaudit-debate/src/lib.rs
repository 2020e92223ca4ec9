//! Verifier Debate Orchestrator: evidence + assertion → adjudicated verdict
//!
//! K independent verifier agents (K ≥ 2) debate whether a citation's
//! assertion is supported by the located evidence:
//!
//! 1. Round 0: every agent proposes `{verdict, rationale, quoted spans}`
//!    independently. Quotes must be verbatim substrings of the evidence;
//!    an agent that fails the check is retried once, then discarded.
//! 2. Later rounds: each surviving agent sees its peers' prior-round
//!    proposals and may revise.
//! 3. The debate terminates early on unanimity, otherwise at the round cap.
//! 4. Majority vote over the final round; tie or no majority is `Ambiguous`
//!    with confidence = largest agreeing group / surviving agents.
//!
//! Agents are assigned rotating analysis perspectives so the panel does not
//! collapse into one reading of the evidence. The invoker transport is
//! opaque behind [`AgentInvoker`]; exhausting its retry budget fails the
//! debate (the coordinator degrades that citation to a timeout verdict).

pub mod orchestrator;

use async_trait::async_trait;
use lexaudit_core::{AgentProposal, VerdictStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use orchestrator::{DebateOrchestrator, DebateOutcome};

/// Analysis perspective assigned to a verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Perspective {
    /// Does the asserted wording correspond to the official text?
    TextualCorrespondence,
    /// Is the cited provision still in force as of today?
    TemporalValidity,
    /// Does the provision actually mean what the author claims?
    LegalInterpretation,
}

impl Perspective {
    pub const ALL: [Perspective; 3] = [
        Perspective::TextualCorrespondence,
        Perspective::TemporalValidity,
        Perspective::LegalInterpretation,
    ];
}

impl fmt::Display for Perspective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Perspective::TextualCorrespondence => "textual_correspondence",
            Perspective::TemporalValidity => "temporal_validity",
            Perspective::LegalInterpretation => "legal_interpretation",
        };
        f.write_str(s)
    }
}

/// Everything the segmenter and retriever learned about one citation,
/// packaged for the panel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceContext {
    /// The citation exactly as written by the author.
    pub citation_text: String,
    /// Canonical identifier of the instrument the evidence came from.
    pub instrument_urn: String,
    /// Evidence snippets, already sized for the panel.
    pub evidence: Vec<String>,
    /// The cited locator was not found; the evidence is surrounding context.
    pub locator_missing: bool,
    /// The evidence was found under shifted numbering.
    pub renumbered: bool,
    /// At least one evidence unit carries a revocation marker.
    pub revoked: bool,
}

/// What the orchestrator hands the invoker for one agent in one round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierContext {
    pub agent_id: String,
    pub perspective: Perspective,
    /// 0-based round number.
    pub round: usize,
    pub evidence: EvidenceContext,
    /// Peers' prior-round proposals; empty in round 0.
    pub peers: Vec<AgentProposal>,
}

/// One verifier's raw output, before quote grounding is checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifierFinding {
    pub verdict_candidate: VerdictStatus,
    pub rationale: String,
    pub quoted_spans: Vec<String>,
}

/// Transport failure from the invoker.
#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    #[error("verifier transport failure: {0}")]
    Transient(String),
    #[error("verifier returned malformed output: {0}")]
    Malformed(String),
}

/// Debate-level failures surfaced to the coordinator.
#[derive(Debug, Clone, Error)]
pub enum DebateError {
    /// The invoker stayed unreachable (or unusable) past the retry budget.
    #[error("verifier panel unavailable: {0}")]
    Exhausted(String),
    #[error("debate cancelled")]
    Cancelled,
}

/// Opaque verifier transport (an LLM call in production).
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke_verifier(
        &self,
        context: &VerifierContext,
    ) -> Result<VerifierFinding, InvokeError>;
}
