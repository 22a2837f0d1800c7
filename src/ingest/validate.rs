// src/ingest/validate.rs
use tracing::debug;

use crate::ingest::markup::{self, REGION_MARKER};
use crate::ingest::types::{RawEvent, Rejection};

/// Normalize a region name into the feed's identifier form
/// (`The West Pacific` -> `the_west_pacific`).
pub fn normalize_region(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Decide whether an event should be forwarded. On success returns the subject name.
///
/// Exclusions are expected in normalized form; comparison is case-insensitive anyway.
pub fn check<'a>(event: &'a RawEvent, exclusions: &[String]) -> Result<&'a str, Rejection> {
    let text = event.text.as_deref().ok_or(Rejection::MissingText)?;

    let subject = match markup::extract_subject_name(text) {
        Some(s) if !s.is_empty() => s,
        _ => return Err(Rejection::MissingSubject),
    };
    // Any Unicode digit counts (`puppet٣`, `puppet３`), not only ASCII.
    if subject.chars().last().is_some_and(char::is_numeric) {
        return Err(Rejection::AutomatedSubject(subject.to_string()));
    }

    let lowered = text.to_lowercase();
    for region in exclusions {
        let region = region.trim().to_lowercase();
        if region.is_empty() {
            continue;
        }
        let needle = format!("{REGION_MARKER}{region}{REGION_MARKER}");
        if lowered.contains(&needle) {
            return Err(Rejection::ExcludedRegion(region));
        }
    }

    Ok(subject)
}

/// Boolean form of [`check`]; logs the rejection reason at debug level.
pub fn is_valid(event: &RawEvent, exclusions: &[String]) -> bool {
    match check(event, exclusions) {
        Ok(_) => true,
        Err(reason) => {
            debug!(target: "vigil", reason = reason.reason(), "{reason}");
            false
        }
    }
}
