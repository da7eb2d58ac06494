//! Derived text signals: query phrase count and currency mentions.

use std::sync::OnceLock;

use regex::Regex;

/// `$<digits>(,<3 digits>)*(.<1-2 digits>)?`
fn dollar_amount() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\d+(?:,\d{3})*(?:\.\d{1,2})?").expect("dollar pattern is valid")
    })
}

/// `<digits> dollars` or `<digits> USD`
fn spelled_amount() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+ (?:dollars|USD)").expect("amount pattern is valid"))
}

/// Non-overlapping, case-sensitive occurrences of `query` in `text`.
/// `phrase_count("aaa", "aa")` is 1. An empty query counts nothing.
pub fn phrase_count(text: &str, query: &str) -> usize {
    if query.is_empty() {
        return 0;
    }
    text.matches(query).count()
}

/// Whether `text` mentions an amount of money.
///
/// A `$` amount only counts when it ends where the grammar ends: it may not
/// run straight into another digit or into a separator followed by a digit,
/// so `$1,2.5.6` is not an amount.
pub fn has_currency_mention(text: &str) -> bool {
    if spelled_amount().is_match(text) {
        return true;
    }
    dollar_amount()
        .find_iter(text)
        .any(|m| ends_cleanly(&text[m.end()..]))
}

fn ends_cleanly(rest: &str) -> bool {
    let mut chars = rest.chars();
    match chars.next() {
        None => true,
        Some(c) if c.is_ascii_digit() => false,
        Some(',') | Some('.') => !chars.next().is_some_and(|c| c.is_ascii_digit()),
        Some(_) => true,
    }
}
