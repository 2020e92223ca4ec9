//! Revocation-marker normalization.
//!
//! Upstream extraction wraps struck-through passages of official pages in
//! `<REVOGADO_INICIO>` / `<REVOGADO_FIM>` markers. Publishers often break a
//! single revoked block into many adjacent struck-through fragments; before
//! segmentation, fragments separated only by trivial content (whitespace,
//! bullets, a stray character or two) are merged into one block.

use regex::Regex;
use std::sync::OnceLock;

pub const REVOKED_OPEN: &str = "<REVOGADO_INICIO>";
pub const REVOKED_CLOSE: &str = "<REVOGADO_FIM>";

fn adjacent_blocks() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<REVOGADO_FIM>([^<]{0,20})<REVOGADO_INICIO>")
            .expect("adjacent revoked-block pattern")
    })
}

/// Merge adjacent revoked blocks separated by trivial content.
pub fn merge_adjacent_revoked(text: &str) -> String {
    adjacent_blocks()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let separator = caps[1].trim().trim_start_matches(['-', '*', '•']);
            if separator.len() < 4 {
                "\n".to_string()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Whether a unit of text sits inside (or carries) a revocation marker.
pub fn is_revoked_text(text: &str) -> bool {
    text.contains(REVOKED_OPEN)
        || text.contains("(Revogado")
        || text.contains("(Revogada")
        || text.contains("(REVOGADO")
}
