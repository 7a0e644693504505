//! Post-processing: deterministic cleanup of LLM-generated translations.
//!
//! Even a well-prompted model occasionally wraps its answer in code fences,
//! prefixes it with "Translation:", quotes it, or leaves zero-width
//! characters behind. These rules fix those quirks without touching the
//! translated content itself. Each rule is independently testable.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so the fence and preamble patterns only
//! ever see `\n`; invisible characters go before the final trim so a
//! trailing BOM does not shield trailing whitespace.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to the raw model output.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip outer code fences, unless the source is itself fenced
/// 3. Strip a leading "Translation:" style preamble, unless the source
///    itself opens with a `label:`
/// 4. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 5. Strip one pair of wrapping quotes the source did not have
/// 6. Trim surrounding whitespace
///
/// The result may be empty; the dispatcher treats that as a failed unit.
pub fn clean_translation(source: &str, raw: &str) -> String {
    let s = normalise_line_endings(raw);
    let s = strip_outer_fences(source, &s);
    let s = strip_preamble(source, &s);
    let s = remove_invisible_chars(&s);
    let s = strip_wrapping_quotes(source, &s);
    s.trim().to_string()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\n(.*)\n```\s*$").unwrap());

fn strip_outer_fences(source: &str, input: &str) -> String {
    if source.trim_start().starts_with("```") {
        return input.to_string();
    }
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 3: Strip preamble ───────────────────────────────────────────────────

static RE_PREAMBLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:here is the translation|translated text|translation)\s*(?:\([^)\n]*\))?\s*:\s*")
        .unwrap()
});

/// A short leading label such as "Nota:" or "Traducción (2020):".
static RE_SOURCE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\p{L}[\p{L}\p{M} ]{0,39}(?:\([^)\n]*\))?\s*:(?:\s|$)").unwrap()
});

fn strip_preamble(source: &str, input: &str) -> String {
    // A labelled source translates to a labelled result; the label is content.
    if RE_SOURCE_LABEL.is_match(source) {
        return input.to_string();
    }
    RE_PREAMBLE.replace(input, "").to_string()
}

// ── Rule 4: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 5: Strip wrapping quotes ────────────────────────────────────────────

const QUOTE_PAIRS: [(char, char); 4] = [('"', '"'), ('“', '”'), ('«', '»'), ('\'', '\'')];

fn strip_wrapping_quotes(source: &str, input: &str) -> String {
    let trimmed = input.trim();
    let src = source.trim();
    for (open, close) in QUOTE_PAIRS {
        if src.starts_with(open) {
            continue;
        }
        if let Some(inner) = trimmed
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            if !inner.contains(open) && !inner.contains(close) {
                return inner.to_string();
            }
        }
    }
    input.to_string()
}
