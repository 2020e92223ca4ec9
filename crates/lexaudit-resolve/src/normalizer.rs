//! Normalizer: grammar first, resolution service only for ambiguity.

use crate::grammar::{CitationGrammar, GrammarOutcome};
use crate::{ResolutionService, ResolveError};
use lexaudit_core::{
    CanonicalReference, InstrumentType, RankedCandidate, RawCitationSpan, ResolutionResult,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Confidence assigned to unambiguous grammar parses. Deterministic parses
/// are near-certain; only the external service returns graded scores.
const GRAMMAR_CONFIDENCE: f64 = 0.95;
/// Confidence for instrument-only parses (span lacked any locator).
const INSTRUMENT_ONLY_CONFIDENCE: f64 = 0.8;

/// Turns raw citation spans into canonical references.
pub struct ReferenceNormalizer {
    grammar: CitationGrammar,
    resolver: Arc<dyn ResolutionService>,
    confidence_threshold: f64,
}

impl ReferenceNormalizer {
    pub fn new(resolver: Arc<dyn ResolutionService>, confidence_threshold: f64) -> Self {
        Self {
            grammar: CitationGrammar::new(),
            resolver,
            confidence_threshold,
        }
    }

    /// Normalize one span. Never fails: collaborator errors fold into
    /// `Unresolved`.
    pub async fn normalize(&self, span: &RawCitationSpan) -> ResolutionResult {
        match self.grammar.parse(&span.text) {
            GrammarOutcome::Instrument(reference) => {
                let low_confidence = reference.locator_path.is_empty();
                if low_confidence {
                    debug!(citation = %span.text, "span lacks locator, flagging low confidence");
                }
                ResolutionResult::Resolved {
                    confidence: if low_confidence {
                        INSTRUMENT_ONLY_CONFIDENCE
                    } else {
                        GRAMMAR_CONFIDENCE
                    },
                    low_confidence,
                    reference,
                }
            }
            GrammarOutcome::AmbiguousNumber {
                number,
                year,
                locator_path,
            } => {
                let candidates = candidate_readings(&number, year, &locator_path);
                self.disambiguate(span, candidates).await
            }
            GrammarOutcome::NoMatch => {
                // No instrument keyword and no number: hand the raw text to
                // the service, it may still recognize an aliased instrument
                // ("Estatuto do Servidor", "CLT").
                self.disambiguate(span, Vec::new()).await
            }
        }
    }

    async fn disambiguate(
        &self,
        span: &RawCitationSpan,
        candidates: Vec<RankedCandidate>,
    ) -> ResolutionResult {
        info!(citation = %span.text, candidates = candidates.len(), "delegating to resolution service");
        let ranked = match self.resolver.resolve(&span.text, &candidates).await {
            Ok(ranked) => ranked,
            Err(ResolveError::Timeout) => {
                warn!(citation = %span.text, "resolution service timed out");
                return ResolutionResult::Unresolved {
                    reason: "resolution service timed out".to_string(),
                };
            }
            Err(err) => {
                warn!(citation = %span.text, error = %err, "resolution service failed");
                return ResolutionResult::Unresolved {
                    reason: err.to_string(),
                };
            }
        };

        let Some(best) = ranked
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .cloned()
        else {
            return ResolutionResult::Unresolved {
                reason: "no candidate instrument".to_string(),
            };
        };

        if best.confidence < self.confidence_threshold {
            debug!(
                citation = %span.text,
                confidence = best.confidence,
                threshold = self.confidence_threshold,
                "best candidate below threshold"
            );
            return ResolutionResult::Unresolved {
                reason: "ambiguous".to_string(),
            };
        }

        // A clear winner: single reference. A near-tie stays ambiguous so
        // the caller sees the full ranking.
        let runner_up = ranked
            .iter()
            .filter(|c| c.reference != best.reference)
            .map(|c| c.confidence)
            .fold(0.0_f64, f64::max);
        if best.confidence - runner_up < 0.05 {
            return ResolutionResult::Ambiguous { candidates: ranked };
        }

        ResolutionResult::Resolved {
            low_confidence: best.reference.locator_path.is_empty(),
            confidence: best.confidence,
            reference: best.reference,
        }
    }
}

/// Plausible readings of a bare number/year citation, unranked (confidence
/// zero until the service scores them).
fn candidate_readings(
    number: &str,
    year: Option<u16>,
    locator_path: &[lexaudit_core::LocatorStep],
) -> Vec<RankedCandidate> {
    [
        InstrumentType::Law,
        InstrumentType::Decree,
        InstrumentType::ProvisionalMeasure,
    ]
    .into_iter()
    .map(|instrument_type| RankedCandidate {
        reference: CanonicalReference {
            instrument_type,
            number: number.to_string(),
            year,
            locator_path: locator_path.to_vec(),
            version_hint: None,
        },
        confidence: 0.0,
    })
    .collect()
}
