// src/normalize.rs
//! Text canonicalization shared by the scanned defect text and every keyword.
//!
//! Steps, in order:
//! 1) lower-case
//! 2) NFD decomposition with combining marks dropped ("é" -> "e", "ç" -> "c")
//! 3) anything that is not a letter, digit or whitespace becomes a space
//! 4) whitespace runs collapse to one space, then trim
//!
//! Service-order text is Portuguese with inconsistent accent usage, so
//! "Óleo", "oleo" and "OLEO!!" must all compare equal after this pass.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

static RE_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s]").expect("punctuation regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Canonical comparable form of `text`.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let lowered = text.to_lowercase();

    let folded: String = lowered.nfd().filter(|c| !is_combining_mark(*c)).collect();

    let spaced = RE_PUNCT.replace_all(&folded, " ");
    let collapsed = RE_WS.replace_all(&spaced, " ");
    collapsed.trim().to_string()
}

/// True when nothing comparable is left after normalization
/// (empty, whitespace-only or punctuation-only input).
pub fn is_blank(text: &str) -> bool {
    normalize(text).is_empty()
}
