//! Line grammar for Brazilian legislative drafting conventions.
//!
//! Official texts are line-oriented: structural headings (TÍTULO, CAPÍTULO,
//! Seção) and dispositive openers (Art., §, Parágrafo único, incisos,
//! alíneas) each start a line. Classification works on a marker-free view of
//! the line; revocation markers are handled by the index.

use lexaudit_retrieve::markers::{REVOKED_CLOSE, REVOKED_OPEN};
use regex::Regex;
use std::sync::OnceLock;

/// What a single line opens, if anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Title(String),
    Chapter(String),
    Section(String),
    /// Article number, dots stripped, letter suffix kept ("19-A").
    Article(String),
    /// Paragraph number, or "unico".
    Paragraph(String),
    /// Inciso, uppercase roman.
    Item(String),
    /// Alínea letter.
    Clause(String),
    /// Continuation of the enclosing unit.
    Text,
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*T[ÍI]TULO\s+([IVXLCDM]+)").expect("title pattern"))
}

fn chapter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*CAP[ÍI]TULO\s+([IVXLCDM]+)").expect("chapter pattern"))
}

fn section_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*SE[ÇC][ÃA]O\s+([IVXLCDM]+)|^\s*Se[çc][ãa]o\s+([IVXLCDM]+)").expect("section pattern"))
}

fn article_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*Art\.?\s*([\d.]+)\s*[ºo°]?\s*(?:-\s*([A-Z]))?").expect("article pattern")
    })
}

fn paragraph_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*§\s*(\d+)").expect("paragraph pattern"))
}

fn sole_paragraph_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*par[áa]grafo\s+[úu]nico").expect("sole-paragraph pattern")
    })
}

fn item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([IVXLCDM]+)\s*[-–—]\s+").expect("item pattern"))
}

fn clause_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([a-z])\)\s+").expect("clause pattern"))
}

/// Strip revocation markers so struck-through headings still classify.
pub fn without_markers(line: &str) -> String {
    line.replace(REVOKED_OPEN, "").replace(REVOKED_CLOSE, "")
}

/// Classify one line of an official text.
pub fn classify(line: &str) -> LineKind {
    let clean = without_markers(line);

    if let Some(caps) = title_re().captures(&clean) {
        return LineKind::Title(caps[1].to_string());
    }
    if let Some(caps) = chapter_re().captures(&clean) {
        return LineKind::Chapter(caps[1].to_string());
    }
    if let Some(caps) = section_re().captures(&clean) {
        let roman = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
        if let Some(roman) = roman {
            return LineKind::Section(roman.to_string());
        }
    }
    if let Some(caps) = article_re().captures(&clean) {
        let number = caps[1].trim_end_matches('.').replace('.', "");
        let value = match caps.get(2) {
            Some(suffix) => format!("{number}-{}", suffix.as_str()),
            None => number,
        };
        return LineKind::Article(value);
    }
    if let Some(caps) = paragraph_re().captures(&clean) {
        return LineKind::Paragraph(caps[1].to_string());
    }
    if sole_paragraph_re().is_match(&clean) {
        return LineKind::Paragraph("unico".to_string());
    }
    if let Some(caps) = clause_re().captures(&clean) {
        return LineKind::Clause(caps[1].to_string());
    }
    if let Some(caps) = item_re().captures(&clean) {
        return LineKind::Item(caps[1].to_string());
    }
    LineKind::Text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifies_article_openers() {
        assert_eq!(classify("Art. 5º Todos são iguais"), LineKind::Article("5".to_string()));
        assert_eq!(classify("Art. 19-A.  O disposto"), LineKind::Article("19-A".to_string()));
        assert_eq!(classify("Art. 1.048. Fica"), LineKind::Article("1048".to_string()));
    }

    #[test]
    fn test_classifies_paragraphs() {
        assert_eq!(classify("§ 1º O disposto"), LineKind::Paragraph("1".to_string()));
        assert_eq!(
            classify("Parágrafo único. A lei"),
            LineKind::Paragraph("unico".to_string())
        );
    }

    #[test]
    fn test_classifies_items_and_clauses() {
        assert_eq!(classify("XI - a casa é asilo"), LineKind::Item("XI".to_string()));
        assert_eq!(classify("a) quando o titular"), LineKind::Clause("a".to_string()));
    }

    #[test]
    fn test_classifies_structural_headings() {
        assert_eq!(classify("TÍTULO II"), LineKind::Title("II".to_string()));
        assert_eq!(classify("CAPÍTULO I"), LineKind::Chapter("I".to_string()));
        assert_eq!(classify("Seção III"), LineKind::Section("III".to_string()));
    }

    #[test]
    fn test_revoked_marker_does_not_hide_structure() {
        assert_eq!(
            classify("<REVOGADO_INICIO>Art. 3º O texto<REVOGADO_FIM>"),
            LineKind::Article("3".to_string())
        );
    }

    #[test]
    fn test_plain_prose_is_continuation() {
        assert_eq!(classify("em razão de sua natureza."), LineKind::Text);
    }
}
