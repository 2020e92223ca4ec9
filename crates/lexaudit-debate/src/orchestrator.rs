//! The debate protocol itself.

use crate::{
    AgentInvoker, DebateError, EvidenceContext, InvokeError, Perspective, VerifierContext,
    VerifierFinding,
};
use lexaudit_core::{AgentProposal, DebateConfig, DebateRound, DebateTranscript, VerdictStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Adjudicated result of one debate, ready to fold into a verdict.
#[derive(Debug, Clone)]
pub struct DebateOutcome {
    pub status: VerdictStatus,
    /// Largest agreeing group / surviving agents.
    pub confidence: f64,
    pub justification: String,
    /// Verbatim spans cited by the agreeing agents.
    pub evidence_quotes: Vec<String>,
    pub transcript: DebateTranscript,
}

struct Seat {
    agent_id: String,
    perspective: Perspective,
}

pub struct DebateOrchestrator {
    invoker: Arc<dyn AgentInvoker>,
    config: DebateConfig,
    cancel: Option<watch::Receiver<bool>>,
}

impl DebateOrchestrator {
    pub fn new(invoker: Arc<dyn AgentInvoker>, config: DebateConfig) -> Self {
        Self {
            invoker,
            config,
            cancel: None,
        }
    }

    /// Attach the run-level cancellation signal, checked between rounds.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Run the full protocol over one citation's evidence.
    pub async fn adjudicate(
        &self,
        evidence: &EvidenceContext,
    ) -> Result<DebateOutcome, DebateError> {
        let round_cap = self.config.round_cap.max(1);
        let mut seats: Vec<Seat> = (0..self.config.effective_agent_count())
            .map(|i| Seat {
                agent_id: format!("verifier-{}", i + 1),
                perspective: Perspective::ALL[i % Perspective::ALL.len()],
            })
            .collect();

        let mut transcript = DebateTranscript::default();
        let mut prior: Vec<AgentProposal> = Vec::new();

        for round in 0..round_cap {
            self.check_cancelled()?;

            let mut proposals = Vec::new();
            let mut surviving = Vec::new();
            for seat in seats {
                let peers: Vec<AgentProposal> = prior
                    .iter()
                    .filter(|p| p.agent_id != seat.agent_id)
                    .cloned()
                    .collect();
                match self.grounded_finding(&seat, round, evidence, peers).await? {
                    Some(finding) => {
                        proposals.push(AgentProposal {
                            agent_id: seat.agent_id.clone(),
                            verdict_candidate: finding.verdict_candidate,
                            rationale: finding.rationale,
                            cited_spans: finding.quoted_spans,
                        });
                        surviving.push(seat);
                    }
                    None => {
                        warn!(agent = %seat.agent_id, round, "verifier discarded for ungrounded quotes");
                    }
                }
            }
            if proposals.is_empty() {
                return Err(DebateError::Exhausted(
                    "every verifier was discarded for ungrounded quotes".to_string(),
                ));
            }

            let unanimous = proposals
                .iter()
                .all(|p| p.verdict_candidate == proposals[0].verdict_candidate);
            transcript.push_round(DebateRound {
                proposals: proposals.clone(),
            });
            seats = surviving;
            prior = proposals;

            if unanimous {
                debug!(round, "verifiers unanimous, terminating debate early");
                break;
            }
        }

        Ok(tally(transcript))
    }

    /// Invoke one seat, enforcing quote grounding with a single retry.
    /// `Ok(None)` means the seat is discarded from the vote.
    async fn grounded_finding(
        &self,
        seat: &Seat,
        round: usize,
        evidence: &EvidenceContext,
        peers: Vec<AgentProposal>,
    ) -> Result<Option<VerifierFinding>, DebateError> {
        let context = VerifierContext {
            agent_id: seat.agent_id.clone(),
            perspective: seat.perspective,
            round,
            evidence: evidence.clone(),
            peers,
        };
        for _ in 0..2 {
            let finding = self.invoke_with_retry(&context).await?;
            if grounded(&finding, evidence) {
                return Ok(Some(finding));
            }
            warn!(agent = %seat.agent_id, round, "quotes not verbatim in evidence, retrying once");
        }
        Ok(None)
    }

    async fn invoke_with_retry(
        &self,
        context: &VerifierContext,
    ) -> Result<VerifierFinding, DebateError> {
        let attempts = self.config.invoke_retries + 1;
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            self.check_cancelled()?;
            match self.invoker.invoke_verifier(context).await {
                Ok(finding) => return Ok(finding),
                Err(InvokeError::Transient(reason)) | Err(InvokeError::Malformed(reason)) => {
                    warn!(agent = %context.agent_id, attempt, %reason, "verifier invocation failed");
                    last_error = reason;
                }
            }
        }
        Err(DebateError::Exhausted(last_error))
    }

    fn check_cancelled(&self) -> Result<(), DebateError> {
        let cancelled = self.cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false);
        if cancelled {
            Err(DebateError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A finding is grounded when every quoted span appears verbatim in some
/// evidence snippet, and it quotes at all whenever there is evidence.
fn grounded(finding: &VerifierFinding, evidence: &EvidenceContext) -> bool {
    if evidence.evidence.is_empty() {
        return true;
    }
    !finding.quoted_spans.is_empty()
        && finding.quoted_spans.iter().all(|span| {
            evidence
                .evidence
                .iter()
                .any(|snippet| snippet.contains(span.as_str()))
        })
}

/// Majority vote over the final round.
fn tally(transcript: DebateTranscript) -> DebateOutcome {
    let final_round = transcript
        .final_round()
        .expect("transcript has at least one round");
    let surviving = final_round.proposals.len();

    let mut counts: HashMap<VerdictStatus, usize> = HashMap::new();
    for proposal in &final_round.proposals {
        *counts.entry(proposal.verdict_candidate).or_default() += 1;
    }
    let top_count = counts.values().copied().max().unwrap_or(0);
    // Deterministic winner: first proposal (in seat order) of the largest
    // group. A tie between groups means no majority anyway.
    let top_status = final_round
        .proposals
        .iter()
        .map(|p| p.verdict_candidate)
        .find(|s| counts[s] == top_count)
        .expect("at least one proposal");

    let confidence = top_count as f64 / surviving as f64;

    if top_count * 2 > surviving {
        let agreeing: Vec<&AgentProposal> = final_round
            .proposals
            .iter()
            .filter(|p| p.verdict_candidate == top_status)
            .collect();
        let justification = format!(
            "{top_count} of {surviving} verifiers concluded {top_status} after {} round(s): {}",
            transcript.len(),
            agreeing[0].rationale
        );
        let evidence_quotes = dedup_spans(agreeing.iter().flat_map(|p| p.cited_spans.iter()));
        info!(status = %top_status, confidence, "debate reached a majority");
        DebateOutcome {
            status: top_status,
            confidence,
            justification,
            evidence_quotes,
            transcript,
        }
    } else {
        let mut split: Vec<(VerdictStatus, usize)> = counts.into_iter().collect();
        split.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.to_string().cmp(&b.0.to_string())));
        let split = split
            .iter()
            .map(|(status, count)| format!("{status}={count}"))
            .collect::<Vec<_>>()
            .join(", ");
        let justification = format!(
            "verifiers did not reach a majority after {} round(s) (split: {split})",
            transcript.len()
        );
        let evidence_quotes =
            dedup_spans(final_round.proposals.iter().flat_map(|p| p.cited_spans.iter()));
        info!(confidence, %split, "debate deadlocked");
        DebateOutcome {
            status: VerdictStatus::Ambiguous,
            confidence,
            justification,
            evidence_quotes,
            transcript,
        }
    }
}

fn dedup_spans<'a>(spans: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for span in spans {
        if !out.contains(span) {
            out.push(span.clone());
        }
    }
    out
}
