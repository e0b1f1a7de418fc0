//! Free-text extraction helpers
//!
//! Council exports often carry their data inside an HTML-ish `description`
//! blob such as `"Hours: Mon-Fri 8am-6pm<br>Type: Disabled"`. Everything here
//! works on that raw text; [`clean_text`] is the single place where markup is
//! stripped so that every rule set trims and strips the same way.

use cpz_common::geojson::coerce_count;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("static regex"));

static LEADING_PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<p>([^<]+)<br").expect("static regex"));

static BAY_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*bays?\b").expect("static regex"));

/// Strip inline markup tags and surrounding whitespace
///
/// Idempotent: cleaning already-clean text returns it unchanged.
pub fn clean_text(text: &str) -> String {
    MARKUP_TAG.replace_all(text, "").trim().to_string()
}

/// Compiled extractor for one label
///
/// Matches `label` (case-insensitive) followed by `:` or `-`, and captures up
/// to the next `<br`, newline or end of text. A `:` match anywhere in the
/// text wins over a `-` match.
#[derive(Debug, Clone)]
pub struct LabelPattern {
    label: String,
    colon: Regex,
    dash: Regex,
}

impl LabelPattern {
    pub fn new(label: &str) -> Self {
        let escaped = regex::escape(label);
        let build = |separator: &str| {
            Regex::new(&format!(
                r"(?i){escaped}\s*{separator}\s*(.*?)(?:<br|\n|$)"
            ))
            .expect("escaped label always compiles")
        };

        Self {
            label: label.to_string(),
            colon: build(":"),
            dash: build("-"),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Extracted value, empty string when the label is absent
    pub fn extract(&self, description: &str) -> String {
        for pattern in [&self.colon, &self.dash] {
            if let Some(value) = pattern
                .captures(description)
                .and_then(|caps| caps.get(1))
                .map(|m| clean_text(m.as_str()))
            {
                if !value.is_empty() {
                    return value;
                }
            }
        }
        String::new()
    }
}

/// One-off labeled extraction (compiles the pattern on every call)
pub fn extract_labeled(description: &str, label: &str) -> String {
    LabelPattern::new(label).extract(description)
}

/// Text of a leading `<p>text<br>` paragraph, empty when there is none
pub fn leading_paragraph(description: &str) -> String {
    LEADING_PARAGRAPH
        .captures(description)
        .and_then(|caps| caps.get(1))
        .map(|m| clean_text(m.as_str()))
        .unwrap_or_default()
}

/// Bay count from a `"<N> bay(s)"` pattern in a zone name
///
/// The last occurrence wins, so `"Car Park 2 - 14 bays"` yields 14.
pub fn bay_count_from_name(name: &str) -> Option<u32> {
    BAY_COUNT
        .captures_iter(name)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Numeric coercion of extracted text
pub fn count_from_text(text: &str) -> Option<u32> {
    if text.trim().is_empty() {
        return None;
    }
    coerce_count(&Value::String(text.to_string()))
}
