// src/ingest/types.rs
use serde::Deserialize;
use std::fmt;

use crate::ingest::markup;

/// One decoded `message` frame from the founding feed.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RawEvent {
    /// Templated descriptor, e.g. `@@name@@ was founded in %%region%%.`
    #[serde(rename = "str", default)]
    pub text: Option<String>,
    /// Rendered HTML of the same event; carries the flag `<img>`.
    #[serde(rename = "htmlStr", default)]
    pub html: Option<String>,
}

impl RawEvent {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            html: None,
        }
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Founded,
    Refounded,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Founded => "founded",
            Verb::Refounded => "refounded",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields pulled out of an accepted event, ready for formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEvent {
    pub subject_name: String,
    pub region_name: String,
    pub verb: Verb,
    pub flag_url: String,
    pub profile_url: String,
}

pub const UNKNOWN_REGION: &str = "an unknown region";

impl ExtractedEvent {
    /// Returns `None` only when the descriptor has no subject.
    pub fn from_raw(event: &RawEvent) -> Option<Self> {
        let text = event.text.as_deref()?;
        let subject = markup::extract_subject_name(text)?;
        let region_name =
            markup::extract_region(text).unwrap_or_else(|| UNKNOWN_REGION.to_string());

        Some(Self {
            subject_name: subject.to_string(),
            region_name,
            verb: markup::determine_verb(text),
            flag_url: markup::extract_flag_url(event.html.as_deref()),
            profile_url: markup::profile_url(subject),
        })
    }
}

/// Why the validator dropped an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    MissingText,
    MissingSubject,
    AutomatedSubject(String),
    ExcludedRegion(String),
}

impl Rejection {
    /// Stable label for the rejection metric.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::MissingText => "missing_text",
            Rejection::MissingSubject => "missing_subject",
            Rejection::AutomatedSubject(_) => "automated_subject",
            Rejection::ExcludedRegion(_) => "excluded_region",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MissingText => f.write_str("no descriptor text in event"),
            Rejection::MissingSubject => f.write_str("no @@subject@@ in descriptor"),
            Rejection::AutomatedSubject(name) => write!(f, "ignoring puppet nation {name}"),
            Rejection::ExcludedRegion(region) => {
                write!(f, "ignoring founding in excluded region {region}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_event_reads_feed_field_names() {
        let ev: RawEvent = serde_json::from_str(
            r#"{"id":"1","str":"@@a@@ was founded in %%b%%.","htmlStr":"<img src=\"/images/flags/x.svg\">","time":0}"#,
        )
        .unwrap();
        assert_eq!(ev.text.as_deref(), Some("@@a@@ was founded in %%b%%."));
        assert!(ev.html.is_some());
    }

    #[test]
    fn raw_event_without_text_still_decodes() {
        let ev: RawEvent = serde_json::from_str(r#"{"htmlStr":"x"}"#).unwrap();
        assert!(ev.text.is_none());
    }

    #[test]
    fn extracted_event_falls_back_for_missing_region_and_flag() {
        let ev = RawEvent::new("@@nowhere_land@@ was refounded.");
        let out = ExtractedEvent::from_raw(&ev).unwrap();
        assert_eq!(out.subject_name, "nowhere_land");
        assert_eq!(out.region_name, UNKNOWN_REGION);
        assert_eq!(out.verb, Verb::Refounded);
        assert_eq!(out.flag_url, markup::DEFAULT_FLAG_URL);
        assert_eq!(
            out.profile_url,
            "https://www.nationstates.net/nation=nowhere_land"
        );
    }

    #[test]
    fn extracted_event_needs_subject() {
        assert!(ExtractedEvent::from_raw(&RawEvent::new("was founded in %%x%%")).is_none());
        assert!(ExtractedEvent::from_raw(&RawEvent::default()).is_none());
    }
}
