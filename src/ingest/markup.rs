// src/ingest/markup.rs
//! Parsers for the feed's descriptor micro-format.
//!
//! Descriptors look like `@@testlandia@@ was founded in %%the_west_pacific%%.`:
//! the nation sits between `@@` markers and the region between `%%` markers.
//! Both the validator and the formatter go through [`delimited`], so the two
//! can never disagree on what the subject is.

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::ingest::types::Verb;

pub const SUBJECT_MARKER: &str = "@@";
pub const REGION_MARKER: &str = "%%";

pub const SITE_ORIGIN: &str = "https://www.nationstates.net";
pub const DEFAULT_FLAG_URL: &str = "https://www.nationstates.net/images/flags/Default.png";

/// First span enclosed by two occurrences of `marker`.
///
/// Mirrors a lazy `marker(.*?)marker` match: the leftmost opening marker whose
/// closing marker is reached without crossing a line break wins. The span may be
/// empty (`@@@@`).
pub fn delimited<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    if marker.is_empty() {
        return None;
    }
    let mut from = 0;
    while let Some(rel) = text[from..].find(marker) {
        let open = from + rel;
        let body_start = open + marker.len();
        if let Some(len) = text[body_start..].find(marker) {
            let body = &text[body_start..body_start + len];
            if !body.contains('\n') {
                return Some(body);
            }
        } else {
            // no closing marker anywhere after this point
            return None;
        }
        from = open + next_char_len(&text[open..]);
    }
    None
}

fn next_char_len(s: &str) -> usize {
    s.chars().next().map(char::len_utf8).unwrap_or(1)
}

pub fn extract_subject_name(text: &str) -> Option<&str> {
    delimited(text, SUBJECT_MARKER)
}

/// Region in display form (`the_west_pacific` -> `The West Pacific`).
pub fn extract_region(text: &str) -> Option<String> {
    delimited(text, REGION_MARKER).map(display_case)
}

/// Underscores become spaces; every alphabetic run starts upper-case and
/// continues lower-case. Applying it twice is the same as once.
pub fn display_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_alpha = false;
    for ch in raw.chars() {
        let ch = if ch == '_' { ' ' } else { ch };
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

pub fn determine_verb(text: &str) -> Verb {
    if text.contains("refounded") {
        Verb::Refounded
    } else {
        Verb::Founded
    }
}

/// Raster flag URL from the event's HTML, or [`DEFAULT_FLAG_URL`].
pub fn extract_flag_url(html: Option<&str>) -> String {
    static RE_FLAG: OnceCell<Option<Regex>> = OnceCell::new();
    let re = RE_FLAG.get_or_init(|| Regex::new(r#"<img src="(/images/flags/[^"]+)""#).ok());

    html.zip(re.as_ref())
        .and_then(|(html, re)| re.captures(html))
        .and_then(|caps| caps.get(1))
        .map(|path| format!("{SITE_ORIGIN}{}", path.as_str().replace(".svg", ".png")))
        .unwrap_or_else(|| DEFAULT_FLAG_URL.to_string())
}

pub fn profile_url(subject: &str) -> String {
    format!("{SITE_ORIGIN}/nation={subject}")
}
