//! Small text normalizations shared by the adapters

use std::cmp::Ordering;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

/// Strip inline formatting tags (`<i>`, `<sup>`, ...) from XML content
///
/// These show up inside `AbstractText` and `ArticleTitle` and would otherwise
/// split a text node into pieces.
pub(crate) fn strip_inline_html_tags(xml: &str) -> String {
    static INLINE_TAG_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = INLINE_TAG_REGEX.get_or_init(|| {
        Regex::new(r"</?(?:i|b|u|sup|sub|em|strong|italic|bold)>")
            .expect("Failed to compile inline tag regex")
    });

    let cleaned = re.replace_all(xml, "");
    if cleaned.len() != xml.len() {
        debug!(
            "Stripped inline HTML tags: removed {} bytes",
            xml.len() - cleaned.len()
        );
    }
    cleaned.into_owned()
}

/// Put a line break before every section-title-like token
///
/// A token is one to three capitalized words followed by a colon, such as
/// `METHODS:` or `Study Design:`. The first token of the text is left alone.
pub fn insert_section_breaks(text: &str) -> String {
    static SECTION_TITLE_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = SECTION_TITLE_REGEX.get_or_init(|| {
        Regex::new(r"\s+((?:[A-Z][A-Za-z]*\s){0,2}[A-Z][A-Za-z]*:)")
            .expect("Failed to compile section title regex")
    });

    re.replace_all(text, "\n$1").into_owned()
}

/// Insert a newline wherever a lowercase letter directly precedes an uppercase one
///
/// Best-effort cosmetic repair for markup that drops whitespace between
/// block elements. Mixed-case words such as `mRNA` get split too, so the
/// result is not an exact transcription.
pub fn reflow_case_boundaries(text: &str) -> String {
    static CASE_BOUNDARY_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = CASE_BOUNDARY_REGEX.get_or_init(|| {
        Regex::new(r"([a-z])([A-Z])").expect("Failed to compile case boundary regex")
    });

    re.replace_all(text, "$1\n$2").into_owned()
}

/// Publication year from the `Year` element, else the first four-digit run
/// of `MedlineDate` (`"2020 Jan-Mar"` gives 2020, `"1998-1999"` gives 1998)
pub fn extract_year(year: Option<&str>, medline_date: Option<&str>) -> Option<i32> {
    static YEAR_REGEX: OnceLock<Regex> = OnceLock::new();

    if let Some(parsed) = year.and_then(|y| y.trim().parse::<i32>().ok()) {
        return Some(parsed);
    }

    let re = YEAR_REGEX.get_or_init(|| Regex::new(r"\d{4}").expect("Failed to compile year regex"));
    medline_date
        .and_then(|date| re.find(date))
        .and_then(|m| m.as_str().parse().ok())
}

/// Convert an `"offset,length"` location into `(start, end)` with `end = start + length`
///
/// Anything other than digits and commas is discarded first, so `"[12, 5]"`
/// parses like `"12,5"`. An end past `i64::MAX` yields `None`.
pub fn parse_location(raw: &str) -> Option<(i64, i64)> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',')
        .collect();

    let mut parts = cleaned.split(',');
    let start: i64 = parts.next()?.parse().ok()?;
    let length: i64 = parts.next()?.parse().ok()?;
    Some((start, start.checked_add(length)?))
}

/// Whitespace-separated tokens of `text`
pub fn split_tokens(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

/// `Some(trimmed)` unless the value is blank
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Collapse runs of whitespace to single spaces and trim
pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Identifier ordering: numeric when both sides are numeric, textual otherwise
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
