//! Regex grammar over Brazilian legal citation terminology.
//!
//! The grammar is deterministic: the same span always parses to the same
//! outcome. Ambiguity is reported, never guessed at.

use lexaudit_core::{CanonicalReference, InstrumentType, LocatorStep, UnitType};
use regex::Regex;

/// Deterministic parse outcome for one span.
#[derive(Debug, Clone, PartialEq)]
pub enum GrammarOutcome {
    /// A unique instrument keyword matched.
    Instrument(CanonicalReference),
    /// A number (and maybe year) matched with no instrument keyword; the
    /// resolution service must rank plausible instrument types.
    AmbiguousNumber {
        number: String,
        year: Option<u16>,
        locator_path: Vec<LocatorStep>,
    },
    /// Nothing recognizable as a citation.
    NoMatch,
}

/// Compiled pattern tables for instruments and locators.
pub struct CitationGrammar {
    constitution: Regex,
    complementary_law: Regex,
    law: Regex,
    decree: Regex,
    provisional_measure: Regex,
    sumula: Regex,
    process_number: Regex,
    court_acronym: Regex,
    bare_number: Regex,
    year: Regex,
    article: Regex,
    paragraph: Regex,
    sole_paragraph: Regex,
    item: Regex,
    clause: Regex,
    version_hint: Regex,
}

impl CitationGrammar {
    pub fn new() -> Self {
        // Number markers appear as "nº", "n.", "no" or nothing at all.
        const NUM: &str = r"(?:n\s*[ºo°]?\.?\s*)?([\d.]+)";
        Self {
            constitution: Regex::new(r"(?i)constitui[çc][ãa]o(?:\s+federal)?|(?-i)\bCF(?:/88)?\b")
                .expect("constitution pattern"),
            complementary_law: Regex::new(&format!(r"(?i)lei\s+complementar\s*{NUM}"))
                .expect("complementary law pattern"),
            law: Regex::new(&format!(r"(?i)\blei\s*{NUM}")).expect("law pattern"),
            decree: Regex::new(&format!(r"(?i)decreto(?:-lei)?\s*{NUM}"))
                .expect("decree pattern"),
            provisional_measure: Regex::new(&format!(r"(?i)medida\s+provis[óo]ria\s*{NUM}"))
                .expect("provisional measure pattern"),
            sumula: Regex::new(&format!(r"(?i)s[úu]mula(?:\s+vinculante)?\s*{NUM}"))
                .expect("sumula pattern"),
            // CNJ unified numbering: NNNNNNN-DD.AAAA.J.TR.OOOO
            process_number: Regex::new(r"(\d{7})-(\d{2})\.(\d{4})\.(\d)\.(\d{2})\.(\d{4})")
                .expect("process number pattern"),
            court_acronym: Regex::new(r"\b(STF|STJ|TST|TSE|STM|TRF\d?)\b")
                .expect("court acronym pattern"),
            bare_number: Regex::new(r"(?i)n\s*[ºo°]\.?\s*([\d.]+)").expect("bare number pattern"),
            year: Regex::new(r"(?i)(?:de\s+|/)(\d{4})\b").expect("year pattern"),
            article: Regex::new(r"(?i)art(?:igo)?\.?\s*(\d+)\s*[ºo°]?")
                .expect("article pattern"),
            paragraph: Regex::new(r"(?i)(?:§|par[áa]grafo)\s*(\d+)\s*[ºo°]?")
                .expect("paragraph pattern"),
            sole_paragraph: Regex::new(r"(?i)par[áa]grafo\s+[úu]nico")
                .expect("sole paragraph pattern"),
            item: Regex::new(r"(?i)inc(?:iso)?\.?\s+([IVXLCDM]+)\b|,\s*([IVXLCDM]{1,6})\b")
                .expect("item pattern"),
            clause: Regex::new(r"(?i)al[íi]nea\s+[\x22']?([a-z])[\x22']?")
                .expect("clause pattern"),
            version_hint: Regex::new(r"(?i)reda[çc][ãa]o\s+dada\s+pela\s+([^,;.]+)")
                .expect("version hint pattern"),
        }
    }

    /// Parse one span. Case-law identifiers are checked before legislative
    /// keywords: a process number is unambiguous on its own.
    pub fn parse(&self, text: &str) -> GrammarOutcome {
        if let Some(reference) = self.parse_case_law(text) {
            return GrammarOutcome::Instrument(reference);
        }

        let locator_path = self.parse_locator(text);
        let year = self.parse_year(text);
        let version_hint = self
            .version_hint
            .captures(text)
            .map(|c| c[1].trim().to_string());

        if let Some((instrument_type, number)) = self.parse_legislative(text) {
            return GrammarOutcome::Instrument(CanonicalReference {
                instrument_type,
                number,
                year,
                locator_path,
                version_hint,
            });
        }

        if let Some(caps) = self.bare_number.captures(text) {
            return GrammarOutcome::AmbiguousNumber {
                number: normalize_number(&caps[1]),
                year,
                locator_path,
            };
        }

        GrammarOutcome::NoMatch
    }

    fn parse_case_law(&self, text: &str) -> Option<CanonicalReference> {
        let caps = self.process_number.captures(text)?;
        let process = caps[0].to_string();
        let year: u16 = caps[3].parse().ok()?;
        // The issuing court rides in version_hint: it selects the search
        // endpoint but is not part of the CNJ number itself.
        Some(CanonicalReference {
            instrument_type: InstrumentType::CourtRuling,
            number: process,
            year: Some(year),
            locator_path: Vec::new(),
            version_hint: self
                .court_acronym
                .captures(text)
                .map(|c| c[1].to_string()),
        })
    }

    fn parse_legislative(&self, text: &str) -> Option<(InstrumentType, String)> {
        // Order matters: "lei complementar" must win over "lei".
        if let Some(caps) = self.complementary_law.captures(text) {
            return Some((
                InstrumentType::ComplementaryLaw,
                normalize_number(&caps[1]),
            ));
        }
        if let Some(caps) = self.decree.captures(text) {
            return Some((InstrumentType::Decree, normalize_number(&caps[1])));
        }
        if let Some(caps) = self.provisional_measure.captures(text) {
            return Some((
                InstrumentType::ProvisionalMeasure,
                normalize_number(&caps[1]),
            ));
        }
        if let Some(caps) = self.sumula.captures(text) {
            return Some((InstrumentType::Sumula, normalize_number(&caps[1])));
        }
        if let Some(caps) = self.law.captures(text) {
            return Some((InstrumentType::Law, normalize_number(&caps[1])));
        }
        if self.constitution.is_match(text) {
            return Some((InstrumentType::Constitution, "1988".to_string()));
        }
        None
    }

    /// Extract the ordered locator path (article > paragraph > item >
    /// clause). Order in the path is structural, not textual: citations
    /// frequently name the item before the article.
    pub fn parse_locator(&self, text: &str) -> Vec<LocatorStep> {
        let mut path = Vec::new();
        if let Some(caps) = self.article.captures(text) {
            path.push(LocatorStep::new(UnitType::Article, &caps[1]));
        }
        if self.sole_paragraph.is_match(text) {
            path.push(LocatorStep::new(UnitType::Paragraph, "unico"));
        } else if let Some(caps) = self.paragraph.captures(text) {
            path.push(LocatorStep::new(UnitType::Paragraph, &caps[1]));
        }
        if let Some(caps) = self.item.captures(text) {
            let value = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().to_uppercase());
            if let Some(value) = value {
                if is_roman(&value) {
                    path.push(LocatorStep::new(UnitType::Item, value));
                }
            }
        }
        if let Some(caps) = self.clause.captures(text) {
            path.push(LocatorStep::new(UnitType::Clause, caps[1].to_lowercase()));
        }
        path
    }

    fn parse_year(&self, text: &str) -> Option<u16> {
        self.year
            .captures(text)
            .and_then(|c| c[1].parse::<u16>().ok())
            .filter(|y| (1500..=2100).contains(y))
    }
}

impl Default for CitationGrammar {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip thousands separators: "8.112" → "8112".
fn normalize_number(raw: &str) -> String {
    raw.trim_end_matches('.').replace('.', "")
}

fn is_roman(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| "IVXLCDM".contains(c))
}
