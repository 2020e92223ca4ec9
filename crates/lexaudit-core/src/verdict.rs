//! Verdict taxonomy, debate transcript, and the audit report.

use crate::CanonicalReference;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of verdict categories.
///
/// A closed union rather than open strings so tie-break and exhaustiveness
/// logic is checked at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    /// Assertion matches the official text.
    Correct,
    /// The cited provision exists but its wording or numbering changed.
    Altered,
    /// The cited provision was revoked.
    Revoked,
    /// Verifiers could not reach a majority.
    Ambiguous,
    /// The instrument or article does not exist.
    Nonexistent,
    /// The provision exists but does not support the author's assertion.
    OutOfContext,
    /// An external dependency stayed unavailable past its retry budget.
    Timeout,
}

impl VerdictStatus {
    /// Whether a verdict with this status must carry verbatim evidence
    /// quotes. Only `Nonexistent` and `Timeout` are exempt.
    pub fn requires_evidence(&self) -> bool {
        !matches!(self, VerdictStatus::Nonexistent | VerdictStatus::Timeout)
    }
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerdictStatus::Correct => "correct",
            VerdictStatus::Altered => "altered",
            VerdictStatus::Revoked => "revoked",
            VerdictStatus::Ambiguous => "ambiguous",
            VerdictStatus::Nonexistent => "nonexistent",
            VerdictStatus::OutOfContext => "out_of_context",
            VerdictStatus::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Debate Transcript
// ============================================================================

/// One verifier's output in one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProposal {
    pub agent_id: String,
    pub verdict_candidate: VerdictStatus,
    pub rationale: String,
    /// Verbatim substrings of the supplied evidence text.
    pub cited_spans: Vec<String>,
}

/// All surviving agents' proposals for one round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebateRound {
    pub proposals: Vec<AgentProposal>,
}

/// Ordered rounds of a debate; length is bounded by the round cap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebateTranscript {
    pub rounds: Vec<DebateRound>,
}

impl DebateTranscript {
    pub fn push_round(&mut self, round: DebateRound) {
        self.rounds.push(round);
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn final_round(&self) -> Option<&DebateRound> {
        self.rounds.last()
    }
}

// ============================================================================
// Verdicts & Report
// ============================================================================

/// Final, auditable verdict for one citation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    /// The citation exactly as it appeared in the document.
    pub citation_text: String,
    /// Resolved canonical reference, absent when resolution failed.
    pub reference: Option<CanonicalReference>,
    pub status: VerdictStatus,
    /// Agreement-derived confidence in `[0, 1]`.
    pub confidence: f64,
    pub justification: String,
    /// Literal substrings of evidence units from the retrieval used.
    pub evidence_quotes: Vec<String>,
    pub source_urls: Vec<String>,
}

impl ValidationVerdict {
    /// Terminal verdict carrying no evidence (resolution/retrieval failures,
    /// timeouts).
    pub fn terminal(
        citation_text: impl Into<String>,
        reference: Option<CanonicalReference>,
        status: VerdictStatus,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            citation_text: citation_text.into(),
            reference,
            status,
            confidence: if status == VerdictStatus::Timeout { 0.0 } else { 1.0 },
            justification: justification.into(),
            evidence_quotes: Vec::new(),
            source_urls: Vec::new(),
        }
    }
}

/// Ordered audit result: exactly one verdict per input span, input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub verdicts: Vec<ValidationVerdict>,
}

impl AuditReport {
    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }

    /// Count of verdicts with the given status.
    pub fn count(&self, status: VerdictStatus) -> usize {
        self.verdicts.iter().filter(|v| v.status == status).count()
    }
}
