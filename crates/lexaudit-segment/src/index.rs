//! Structural index over one retrieved text.

use crate::grammar::{self, LineKind};
use dashmap::DashMap;
use lexaudit_core::{EvidenceUnit, LocatorStep, RetrievalRecord, UnitType};
use lexaudit_retrieve::markers;
use std::sync::Arc;
use tracing::debug;

/// Result of resolving a locator path against the index.
#[derive(Debug, Clone, PartialEq)]
pub enum LocateOutcome {
    Located {
        units: Vec<EvidenceUnit>,
        /// The units were found under shifted numbering, not at the cited
        /// locator itself.
        renumbered: bool,
    },
    Missing {
        /// Existing article numerically closest to the cited one.
        nearest_article: Option<String>,
        /// Highest article number present in the text.
        highest_article: Option<String>,
    },
}

/// Parsed, addressable view of one `RetrievalRecord`. Immutable; built once
/// per text checksum and shared.
pub struct SegmentIndex {
    checksum: String,
    source: String,
    units: Vec<EvidenceUnit>,
}

impl SegmentIndex {
    /// Parse a retrieved text into evidence units. Deterministic, CPU-bound.
    pub fn build(record: &RetrievalRecord) -> Self {
        let mut builder = Builder::default();
        let mut offset = 0usize;
        for line in record.fetched_text.split_inclusive('\n') {
            builder.push_line(line, offset);
            offset += line.len();
        }
        builder.flush();
        debug!(
            key = %record.instrument_key,
            units = builder.units.len(),
            "segmented official text"
        );
        Self {
            checksum: record.checksum.clone(),
            source: record.fetched_text.clone(),
            units: builder.units,
        }
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn units(&self) -> &[EvidenceUnit] {
        &self.units
    }

    /// Resolve a locator path. Exact lookup first, then a bounded structural
    /// fallback for renumbered texts.
    pub fn locate(&self, path: &[LocatorStep]) -> LocateOutcome {
        let exact = self.subtree(path);
        if !exact.is_empty() {
            return LocateOutcome::Located {
                units: exact,
                renumbered: false,
            };
        }

        // Paragraph shifted within the cited article.
        if let Some(shifted) = self.shifted_paragraph(path) {
            return LocateOutcome::Located {
                units: shifted,
                renumbered: true,
            };
        }
        // Same sub-path under a neighboring article.
        if let Some(shifted) = self.shifted_article(path) {
            return LocateOutcome::Located {
                units: shifted,
                renumbered: true,
            };
        }

        let requested = path
            .first()
            .filter(|step| step.unit == UnitType::Article)
            .and_then(|step| article_number(&step.value));
        LocateOutcome::Missing {
            nearest_article: self.nearest_article(requested),
            highest_article: self.highest_article(),
        }
    }

    /// A unit's text sized for the debate: truncated to `max_chars`, widened
    /// from the surrounding source when shorter than `min_chars`.
    pub fn snippet(&self, unit: &EvidenceUnit, min_chars: usize, max_chars: usize) -> String {
        if unit.text.len() > max_chars {
            let end = floor_boundary(&unit.text, max_chars);
            return unit.text[..end].trim_end().to_string();
        }
        if unit.text.len() >= min_chars {
            return unit.text.clone();
        }
        let start = unit.position_in_source.min(self.source.len());
        let start = floor_boundary(&self.source, start);
        let end = floor_boundary(&self.source, (start + min_chars).min(self.source.len()));
        let window = grammar::without_markers(&self.source[start..end]);
        window.trim().to_string()
    }

    fn subtree(&self, path: &[LocatorStep]) -> Vec<EvidenceUnit> {
        self.units
            .iter()
            .filter(|unit| unit.locator_path.starts_with(path))
            .cloned()
            .collect()
    }

    fn shifted_paragraph(&self, path: &[LocatorStep]) -> Option<Vec<EvidenceUnit>> {
        let pos = path
            .iter()
            .position(|step| step.unit == UnitType::Paragraph)?;
        if !self.article_exists(path) {
            return None;
        }
        let number = article_number(&path[pos].value)?;
        for delta in [1i64, -1] {
            let shifted = number as i64 + delta;
            if shifted < 1 {
                continue;
            }
            let mut candidate = path.to_vec();
            candidate[pos].value = shifted.to_string();
            let units = self.subtree(&candidate);
            if !units.is_empty() {
                return Some(units);
            }
        }
        // Numbered paragraph cited, text carries a sole paragraph (or the
        // reverse).
        let mut candidate = path.to_vec();
        candidate[pos].value = if path[pos].value == "unico" {
            "1".to_string()
        } else {
            "unico".to_string()
        };
        let units = self.subtree(&candidate);
        (!units.is_empty()).then_some(units)
    }

    fn shifted_article(&self, path: &[LocatorStep]) -> Option<Vec<EvidenceUnit>> {
        if path.len() < 2 || path[0].unit != UnitType::Article {
            return None;
        }
        let number = article_number(&path[0].value)?;
        for delta in [1i64, -1, 2, -2] {
            let shifted = number as i64 + delta;
            if shifted < 1 {
                continue;
            }
            let mut candidate = path.to_vec();
            candidate[0].value = shifted.to_string();
            let units = self.subtree(&candidate);
            if !units.is_empty() {
                return Some(units);
            }
        }
        None
    }

    fn article_exists(&self, path: &[LocatorStep]) -> bool {
        path.first()
            .filter(|step| step.unit == UnitType::Article)
            .map(|step| !self.subtree(std::slice::from_ref(step)).is_empty())
            .unwrap_or(false)
    }

    fn article_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.units
            .iter()
            .filter_map(|unit| unit.locator_path.first())
            .filter(|step| step.unit == UnitType::Article)
            .filter_map(|step| article_number(&step.value))
    }

    fn nearest_article(&self, requested: Option<u32>) -> Option<String> {
        let requested = requested?;
        self.article_numbers()
            .min_by_key(|n| n.abs_diff(requested))
            .map(|n| n.to_string())
    }

    fn highest_article(&self) -> Option<String> {
        self.article_numbers().max().map(|n| n.to_string())
    }
}

/// Per-run memoization of built indexes, keyed by text checksum.
#[derive(Default)]
pub struct SegmentCache {
    indexes: DashMap<String, Arc<SegmentIndex>>,
}

impl SegmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index_for(&self, record: &RetrievalRecord) -> Arc<SegmentIndex> {
        self.indexes
            .entry(record.checksum.clone())
            .or_insert_with(|| Arc::new(SegmentIndex::build(record)))
            .clone()
    }
}

#[derive(Default)]
struct Builder {
    units: Vec<EvidenceUnit>,
    path: Vec<LocatorStep>,
    open_raw: String,
    open_offset: usize,
}

impl Builder {
    fn push_line(&mut self, line: &str, offset: usize) {
        match grammar::classify(line) {
            LineKind::Title(_) | LineKind::Chapter(_) | LineKind::Section(_) => {
                self.flush();
                self.path.clear();
            }
            LineKind::Article(value) => {
                self.open(vec![LocatorStep::new(UnitType::Article, value)], line, offset);
            }
            LineKind::Paragraph(value) => {
                let mut path = self.parent_path(&[UnitType::Article]);
                if path.is_empty() {
                    self.append(line);
                    return;
                }
                path.push(LocatorStep::new(UnitType::Paragraph, value));
                self.open(path, line, offset);
            }
            LineKind::Item(value) => {
                let mut path = self.parent_path(&[UnitType::Article, UnitType::Paragraph]);
                if path.is_empty() {
                    self.append(line);
                    return;
                }
                path.push(LocatorStep::new(UnitType::Item, value));
                self.open(path, line, offset);
            }
            LineKind::Clause(value) => {
                let mut path =
                    self.parent_path(&[UnitType::Item, UnitType::Paragraph, UnitType::Article]);
                if path.is_empty() {
                    self.append(line);
                    return;
                }
                path.push(LocatorStep::new(UnitType::Clause, value));
                self.open(path, line, offset);
            }
            LineKind::Text => self.append(line),
        }
    }

    /// Truncate the open path to the deepest step whose unit is in `levels`,
    /// keeping everything above it.
    fn parent_path(&self, levels: &[UnitType]) -> Vec<LocatorStep> {
        let cut = self
            .path
            .iter()
            .rposition(|step| levels.contains(&step.unit));
        match cut {
            Some(i) => self.path[..=i].to_vec(),
            None => Vec::new(),
        }
    }

    fn open(&mut self, path: Vec<LocatorStep>, line: &str, offset: usize) {
        self.flush();
        self.path = path;
        self.open_raw = line.to_string();
        self.open_offset = offset;
    }

    fn append(&mut self, line: &str) {
        if !self.path.is_empty() {
            self.open_raw.push_str(line);
        }
    }

    fn flush(&mut self) {
        if self.path.is_empty() || self.open_raw.trim().is_empty() {
            self.open_raw.clear();
            return;
        }
        let raw = std::mem::take(&mut self.open_raw);
        self.units.push(EvidenceUnit {
            locator_path: self.path.clone(),
            text: grammar::without_markers(&raw).trim().to_string(),
            position_in_source: self.open_offset,
            revoked: markers::is_revoked_text(&raw),
        });
    }
}

fn article_number(value: &str) -> Option<u32> {
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn floor_boundary(s: &str, mut i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
