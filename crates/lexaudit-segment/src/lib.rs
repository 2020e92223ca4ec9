//! Evidence Segmenter: official text → addressable evidence units
//!
//! Brazilian statutes are line-structured (TÍTULO > CAPÍTULO > Seção as
//! headings; Art. > § > inciso > alínea as dispositive units). The segmenter
//! parses a retrieved text once into that hierarchy and indexes every
//! dispositive unit as an [`EvidenceUnit`] addressable by locator path.
//!
//! Lookup is exact first, then a bounded structural fallback for texts whose
//! numbering shifted since the citation was written (reported with
//! `renumbered = true`). Total absence reports the nearest and highest real
//! article numbers so callers can justify a nonexistence finding.
//!
//! Everything here is synchronous and deterministic; indexes are memoized
//! per text checksum by [`SegmentCache`].
//!
//! [`EvidenceUnit`]: lexaudit_core::EvidenceUnit

pub mod grammar;
pub mod index;

pub use index::{LocateOutcome, SegmentCache, SegmentIndex};
