//! Canonicalisation: deterministic cleanup of raw OCR text.
//!
//! Tesseract output of a résumé is noisy in predictable ways: bullet glyphs
//! read as a lone `e`, `S1` misread as `$1`, e-mail dots read as spaces,
//! phone numbers in four different national layouts, page footers, and
//! date ranges joined by `~`, `=` or `_`. This module rewrites those into one
//! lowercase line the extraction prompt can consume.
//!
//! ## Rule Order
//!
//! The rules run in a fixed order and later rules assume the form produced by
//! earlier ones: separators are collapsed (rule 4) before page markers are
//! matched (rule 6), e-mails are repaired before phones so `@` handling cannot
//! touch digits, and phone numbers are first compacted to `+62…` (rule 8)
//! and then localised to `0…` (rule 9). New rules are inserted relative to the
//! rules they depend on; existing rules are never reordered.
//!
//! [`canonicalize`] applies the whole chain until the text stops changing, so
//! the result is a fixed point: canonicalising canonical text is a no-op.
//! Nested input such as `page page 1 2` loses one marker per pass, so the
//! number of passes is not fixed.
//!
//! The loop terminates. Rules 7, 8, 10 and 11 can keep or grow the length,
//! but each rewrite consumes something no rule produces: separators inside a
//! phone number, `~`/`=`/`_` after a year, whitespace after `https`, or an
//! unrepaired `@gmail` domain. Every other rule only deletes or replaces in place.

use crate::document::{CanonicalText, RawText};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// One named rewrite rule. Every rule is total: no match means no change.
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub apply: fn(&str) -> String,
}

/// The canonicalisation rules, in application order.
pub static RULES: &[Rule] = &[
    Rule { name: "lowercase_trim", apply: lowercase_trim },
    Rule { name: "remove_bullet_e", apply: remove_bullet_e },
    Rule { name: "strip_quotes", apply: strip_quotes },
    Rule { name: "collapse_separators", apply: collapse_separators },
    Rule { name: "repair_s1", apply: repair_s1 },
    Rule { name: "remove_page_markers", apply: remove_page_markers },
    Rule { name: "repair_emails", apply: repair_emails },
    Rule { name: "compact_phone_numbers", apply: compact_phone_numbers },
    Rule { name: "localise_phone_numbers", apply: localise_phone_numbers },
    Rule { name: "repair_urls", apply: repair_urls },
    Rule { name: "normalise_date_ranges", apply: normalise_date_ranges },
    Rule { name: "collapse_whitespace", apply: collapse_whitespace },
];

/// Canonicalise raw OCR text into a single normalised line.
pub fn canonicalize(raw: &RawText) -> CanonicalText {
    let mut text = apply_rules(raw.as_str());
    let mut passes = 1;
    loop {
        let next = apply_rules(&text);
        if next == text {
            break;
        }
        passes += 1;
        text = next;
    }
    if passes > 1 {
        debug!("Canonicalisation needed {} passes", passes);
    }
    CanonicalText::from_normalised(text)
}

/// Run every rule exactly once, in order.
pub fn apply_rules(input: &str) -> String {
    RULES
        .iter()
        .fold(input.to_string(), |text, rule| (rule.apply)(&text))
}

// ── Rule 1: Lowercase and trim ───────────────────────────────────────────────

fn lowercase_trim(input: &str) -> String {
    input.to_lowercase().trim().to_string()
}

// ── Rule 2: Remove bullet glyphs read as a lone "e" ─────────────────────────

static RE_BULLET_E: Lazy<Regex> = Lazy::new(|| Regex::new(r"\be\b").unwrap());

fn remove_bullet_e(input: &str) -> String {
    RE_BULLET_E.replace_all(input, "").into_owned()
}

// ── Rule 3: Strip quote characters ───────────────────────────────────────────

fn strip_quotes(input: &str) -> String {
    input.replace(['\'', '"'], "")
}

// ── Rule 4: Newlines, semicolons, commas and pipes become spaces ─────────────

static RE_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\n;,|]").unwrap());

fn collapse_separators(input: &str) -> String {
    RE_SEPARATORS.replace_all(input, " ").into_owned()
}

// ── Rule 5: "$1" misread ─────────────────────────────────────────────────────
//
// Emits "S1"; the next pass of rule 1 lowercases it, so canonical text
// carries "s1".

fn repair_s1(input: &str) -> String {
    input.replace("$1", "S1")
}

// ── Rule 6: Page-number footers ──────────────────────────────────────────────

static RE_PAGE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bpage\s\d+\b").unwrap());

fn remove_page_markers(input: &str) -> String {
    RE_PAGE_MARKER.replace_all(input, "").into_owned()
}

// ── Rule 7: E-mail addresses ─────────────────────────────────────────────────

static RE_GMAIL_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"@gmail\s?com").unwrap());
static RE_SPACE_BEFORE_AT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+@").unwrap());
static RE_GMAIL_CO: Lazy<Regex> = Lazy::new(|| Regex::new(r"@gmail\.co\b").unwrap());

fn repair_emails(input: &str) -> String {
    let s = RE_GMAIL_DOT.replace_all(input, "@gmail.com");
    let s = RE_SPACE_BEFORE_AT.replace_all(&s, "@");
    RE_GMAIL_CO.replace_all(&s, "@gmail.com").into_owned()
}

// ── Rule 8: Indonesian phone numbers → "+62<digits>" ─────────────────────────

static RE_PHONE_INTL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\+62\s?(\d{2,3})[ -]?(\d{3,4})[ -]?(\d{4,5})").unwrap()
});
static RE_PHONE_LOCAL_DASHED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"08(\d{2})-(\d{4})-(\d{4})").unwrap());
static RE_PHONE_PAREN_PLUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(\+62\)\s?(\d{2,3})[ -]?(\d{3,4})[ -]?(\d{4,5})").unwrap()
});
static RE_PHONE_PAREN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(62\)\s?(\d{2,3})[ -]?(\d{3,4})[ -]?(\d{4,5})").unwrap()
});

fn compact_phone_numbers(input: &str) -> String {
    let s = RE_PHONE_INTL.replace_all(input, "+62${1}${2}${3}");
    let s = RE_PHONE_LOCAL_DASHED.replace_all(&s, "+628${1}${2}${3}");
    let s = RE_PHONE_PAREN_PLUS.replace_all(&s, "+62${1}${2}${3}");
    RE_PHONE_PAREN.replace_all(&s, "+62${1}${2}${3}").into_owned()
}

// ── Rule 9: "+62<digits>" → local "0<digits>" ────────────────────────────────
//
// Rule 8 deliberately funnels every layout into "+62…" and this rule
// immediately rewrites it to the local trunk form ("+62812…" → "0812…").
// The round trip looks redundant but is what makes all four input layouts
// converge on one representation. Keep 8 before 9: swapping them leaves
// the rule-8 output in "+62" form.

static RE_PHONE_COUNTRY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\+62(\d+)").unwrap());

fn localise_phone_numbers(input: &str) -> String {
    RE_PHONE_COUNTRY.replace_all(input, "0${1}").into_owned()
}

// ── Rule 10: "https <word> com" → "https://<word>.com" ───────────────────────

static RE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https\s+(\w+)\s+com").unwrap());

fn repair_urls(input: &str) -> String {
    RE_URL.replace_all(input, "https://${1}.com").into_owned()
}

// ── Rule 11: Date ranges ─────────────────────────────────────────────────────

static RE_RANGE_PRESENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})\s*[~=_]\s*(present)").unwrap());
static RE_RANGE_WORD_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})\s*[~=_]\s*(\w+)\s*(\d{4})?").unwrap());
static RE_RANGE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})\s*[_=]\s*(\w+)").unwrap());

fn normalise_date_ranges(input: &str) -> String {
    let s = RE_RANGE_PRESENT.replace_all(input, "${1} - ${2}");
    let s = RE_RANGE_WORD_YEAR.replace_all(&s, "${1} - ${2} ${3}");
    RE_RANGE_WORD.replace_all(&s, "${1} - ${2}").into_owned()
}

// ── Rule 12: Collapse whitespace ─────────────────────────────────────────────

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Tests ────────────────────────────────────────────────────────────────────
