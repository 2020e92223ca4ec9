//! LexAudit Core: shared data model for the citation audit engine
//!
//! The engine turns a raw citation string into a grounded verdict:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                      CITATION AUDIT PIPELINE                         │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                                                                      │
//! │  RawCitationSpan                                                     │
//! │        │                                                             │
//! │   ┌────▼─────┐   ┌───────────┐   ┌───────────┐   ┌──────────────┐    │
//! │   │Normalizer│──►│ Retriever │──►│ Segmenter │──►│ Debate       │    │
//! │   └──────────┘   └─────┬─────┘   └───────────┘   │ Orchestrator │    │
//! │                        │ shared cache            └──────┬───────┘    │
//! │                        ▼ (one fetch per                 │            │
//! │                   RetrievalRecord  instrument)          ▼            │
//! │                                                 ValidationVerdict    │
//! │                                                                      │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This crate holds the types that cross component boundaries:
//!
//! - canonical references and instrument keys (the retrieval/cache key)
//! - retrieval records and evidence units
//! - the closed verdict taxonomy and debate transcript
//! - the error taxonomy and the run configuration surface
//!
//! The components themselves live in their own crates (`lexaudit-resolve`,
//! `lexaudit-retrieve`, `lexaudit-segment`, `lexaudit-debate`,
//! `lexaudit-pipeline`).

pub mod config;
pub mod error;
pub mod verdict;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use config::{AuditConfig, DebateConfig, RetrievalConfig};
pub use error::AuditError;
pub use verdict::{
    AgentProposal, AuditReport, DebateRound, DebateTranscript, ValidationVerdict, VerdictStatus,
};

// ============================================================================
// Citation Spans
// ============================================================================

/// A citation span as produced by the external extractor.
///
/// Immutable input to the pipeline; consumed once by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCitationSpan {
    /// The citation exactly as it appears in the source document.
    pub text: String,
    /// Start offset in the source document.
    pub start_offset: usize,
    /// End offset in the source document.
    pub end_offset: usize,
}

impl RawCitationSpan {
    pub fn new(text: impl Into<String>, start_offset: usize, end_offset: usize) -> Self {
        Self {
            text: text.into(),
            start_offset,
            end_offset,
        }
    }
}

// ============================================================================
// Canonical References
// ============================================================================

/// Kind of legal instrument a citation points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentType {
    Constitution,
    Law,
    ComplementaryLaw,
    Decree,
    ProvisionalMeasure,
    Sumula,
    CourtRuling,
}

impl InstrumentType {
    /// URN:LEX document-kind segment, following the form the original
    /// resolution service emits (`urn:lex:br:federal:lei:1990;8112`).
    pub fn urn_kind(&self) -> &'static str {
        match self {
            InstrumentType::Constitution => "constituicao",
            InstrumentType::Law => "lei",
            InstrumentType::ComplementaryLaw => "lei.complementar",
            InstrumentType::Decree => "decreto",
            InstrumentType::ProvisionalMeasure => "medida.provisoria",
            InstrumentType::Sumula => "sumula",
            InstrumentType::CourtRuling => "acordao",
        }
    }
}

/// Subdivision level inside an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    Title,
    Chapter,
    Section,
    Article,
    Paragraph,
    Item,
    Clause,
}

/// One step of a locator path, e.g. `Article "5"` or `Item "XI"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocatorStep {
    pub unit: UnitType,
    pub value: String,
}

impl LocatorStep {
    pub fn new(unit: UnitType, value: impl Into<String>) -> Self {
        Self {
            unit,
            value: value.into(),
        }
    }
}

impl fmt::Display for LocatorStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.unit {
            UnitType::Title => "tit",
            UnitType::Chapter => "cap",
            UnitType::Section => "sec",
            UnitType::Article => "art",
            UnitType::Paragraph => "par",
            UnitType::Item => "inc",
            UnitType::Clause => "ali",
        };
        write!(f, "{label}_{}", self.value)
    }
}

/// Identity of an instrument independent of the cited subdivision.
///
/// This is the retrieval/cache key: two references that differ only in
/// locator path share one retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentKey {
    pub instrument_type: InstrumentType,
    pub number: String,
    pub year: Option<u16>,
}

impl InstrumentKey {
    pub fn new(instrument_type: InstrumentType, number: impl Into<String>, year: Option<u16>) -> Self {
        Self {
            instrument_type,
            number: number.into(),
            year,
        }
    }

    /// Render the URN:LEX canonical identifier for this instrument.
    pub fn urn(&self) -> String {
        match self.year {
            Some(year) => format!(
                "urn:lex:br:federal:{}:{};{}",
                self.instrument_type.urn_kind(),
                year,
                self.number
            ),
            None => format!(
                "urn:lex:br:federal:{}:{}",
                self.instrument_type.urn_kind(),
                self.number
            ),
        }
    }
}

impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.urn())
    }
}

/// Normalized, structured pointer to an instrument and a locator within it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalReference {
    pub instrument_type: InstrumentType,
    /// Instrument number ("8112"), or a process number for case law.
    pub number: String,
    /// Promulgation year when the citation names one.
    pub year: Option<u16>,
    /// Ordered subdivision path; empty for instrument-only references.
    pub locator_path: Vec<LocatorStep>,
    /// Free-form version hint ("redação dada pela EC 45/2004").
    pub version_hint: Option<String>,
}

impl CanonicalReference {
    /// Project out the locator: the retrieval cache key.
    pub fn instrument_key(&self) -> InstrumentKey {
        InstrumentKey {
            instrument_type: self.instrument_type,
            number: self.number.clone(),
            year: self.year,
        }
    }
}

/// One candidate from the disambiguation service, with its confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub reference: CanonicalReference,
    pub confidence: f64,
}

/// Outcome of normalizing a raw citation span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionResult {
    /// A single canonical reference.
    Resolved {
        reference: CanonicalReference,
        confidence: f64,
        /// Set for malformed spans normalized without any locator.
        low_confidence: bool,
    },
    /// Multiple plausible instruments, ranked by the resolution service.
    Ambiguous { candidates: Vec<RankedCandidate> },
    /// No unique instrument could be determined.
    Unresolved { reason: String },
}

// ============================================================================
// Retrieval
// ============================================================================

/// How much we trust the source the text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    /// Allowlisted official publisher.
    Official,
    /// Accepted, but caps downstream confidence.
    Low,
}

/// An official text fetched for one instrument; immutable once created and
/// shared by every citation pointing at the same instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRecord {
    pub instrument_key: InstrumentKey,
    pub source_url: String,
    pub fetched_text: String,
    pub fetched_at: DateTime<Utc>,
    /// SHA-256 of `fetched_text`, hex-encoded.
    pub checksum: String,
    pub trust_level: TrustLevel,
}

// ============================================================================
// Evidence
// ============================================================================

/// Smallest addressable excerpt of an official text usable as grounding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceUnit {
    pub locator_path: Vec<LocatorStep>,
    pub text: String,
    /// Byte offset of the unit in the fetched text.
    pub position_in_source: usize,
    /// The unit carries a revocation marker in the official text.
    pub revoked: bool,
}
