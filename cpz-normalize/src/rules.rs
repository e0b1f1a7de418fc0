//! Council rule sets
//!
//! A rule set lists, for every canonical field, the candidate sources to try
//! in priority order. The first source yielding a non-empty value wins;
//! structured properties are always listed before description labels so a
//! present property is never overridden by free text.

use crate::extract::{bay_count_from_name, clean_text, count_from_text, leading_paragraph, LabelPattern};
use cpz_common::geojson::coerce_count;
use serde_json::{Map, Value};

/// Name used when no source resolves one
pub const UNKNOWN_NAME: &str = "Unknown";

/// Candidate source for a canonical text field
#[derive(Debug, Clone)]
pub enum Source {
    /// Structured property looked up by exact key
    Property(&'static str),
    /// Structured property rendered with a fixed prefix, e.g. `"Zone 12"`
    PrefixedProperty {
        prefix: &'static str,
        key: &'static str,
    },
    /// Labeled value inside the description text
    Label(LabelPattern),
    /// First `<p>...<br>` line of the description
    LeadingParagraph,
    /// Fixed value
    Literal(&'static str),
}

/// Candidate source for the bay count
#[derive(Debug, Clone)]
pub enum BaySource {
    /// Numeric property
    Property(&'static str),
    /// `"<N> bays"` pattern in the resolved name
    NamePattern,
    /// Labeled number inside the description text
    Label(LabelPattern),
}

/// Council-specific field copied next to the canonical ones
#[derive(Debug, Clone)]
pub struct ExtensionRule {
    /// Key in the canonical record
    pub key: &'static str,
    /// Raw property it is copied from
    pub property: &'static str,
}

/// Extraction rules for one council
#[derive(Debug, Clone)]
pub struct RuleSet {
    /// Canonical council identifier
    pub id: &'static str,
    /// Alternative identifiers, matched case-insensitively like `id`
    pub aliases: Vec<&'static str>,
    pub name: Vec<Source>,
    /// Resolved names that carry no information and trigger `placeholder_fallback`
    pub name_placeholders: Vec<&'static str>,
    pub placeholder_fallback: Vec<Source>,
    pub zone_type: Vec<Source>,
    pub address: Vec<Source>,
    pub hours: Vec<Source>,
    pub hours_monday_friday: Option<Vec<Source>>,
    pub hours_saturday: Option<Vec<Source>>,
    pub hours_sunday: Option<Vec<Source>>,
    pub restriction: Vec<Source>,
    pub tariff: Vec<Source>,
    pub bays: Vec<BaySource>,
    pub extensions: Vec<ExtensionRule>,
}

impl RuleSet {
    /// Rule set that resolves every field to its default
    pub fn new(id: &'static str) -> Self {
        Self {
            id,
            aliases: Vec::new(),
            name: Vec::new(),
            name_placeholders: Vec::new(),
            placeholder_fallback: Vec::new(),
            zone_type: Vec::new(),
            address: Vec::new(),
            hours: Vec::new(),
            hours_monday_friday: None,
            hours_saturday: None,
            hours_sunday: None,
            restriction: Vec::new(),
            tariff: Vec::new(),
            bays: Vec::new(),
            extensions: Vec::new(),
        }
    }

    /// True when `council` names this rule set (case-insensitive, trimmed)
    pub fn matches(&self, council: &str) -> bool {
        let council = council.trim();
        self.id.eq_ignore_ascii_case(council)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(council))
    }
}

/// Structured property shorthand
pub fn prop(key: &'static str) -> Source {
    Source::Property(key)
}

/// Description label shorthand
pub fn label(text: &str) -> Source {
    Source::Label(LabelPattern::new(text))
}

/// Extension copied from a property of the same name
pub fn same(key: &'static str) -> ExtensionRule {
    ExtensionRule { key, property: key }
}

/// Extension copied from a differently named property
pub fn renamed(key: &'static str, property: &'static str) -> ExtensionRule {
    ExtensionRule { key, property }
}

/// Properties and description of the feature being normalized
pub struct FeatureContext<'a> {
    properties: &'a Map<String, Value>,
    description: &'a str,
}

impl<'a> FeatureContext<'a> {
    pub fn new(properties: &'a Map<String, Value>, description: &'a str) -> Self {
        Self {
            properties,
            description,
        }
    }

    /// Property rendered as text, None for absent/null/empty/non-scalar values
    pub fn property_text(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            Value::String(s) => Some(clean_text(s)).filter(|s| !s.is_empty()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Raw scalar property value for extension fields
    pub fn property_value(&self, key: &str) -> Option<Value> {
        match self.properties.get(key)? {
            Value::String(s) if s.trim().is_empty() => None,
            v @ (Value::String(_) | Value::Number(_) | Value::Bool(_)) => Some(v.clone()),
            _ => None,
        }
    }

    fn source_text(&self, source: &Source) -> Option<String> {
        let text = match source {
            Source::Property(key) => self.property_text(key)?,
            Source::PrefixedProperty { prefix, key } => format!("{}{}", prefix, self.property_text(key)?),
            Source::Label(pattern) => pattern.extract(self.description),
            Source::LeadingParagraph => leading_paragraph(self.description),
            Source::Literal(value) => (*value).to_string(),
        };
        Some(text).filter(|t| !t.is_empty())
    }

    /// First non-empty value among `sources`
    pub fn resolve(&self, sources: &[Source]) -> Option<String> {
        sources.iter().find_map(|source| self.source_text(source))
    }

    /// Text field resolved to empty string when no source yields a value
    pub fn resolve_or_empty(&self, sources: &[Source]) -> String {
        self.resolve(sources).unwrap_or_default()
    }

    /// Zone name, applying placeholder replacement and the `"Unknown"` default
    pub fn resolve_name(&self, rules: &RuleSet) -> String {
        let name = match self.resolve(&rules.name) {
            Some(name) => name,
            None => return UNKNOWN_NAME.to_string(),
        };

        if rules.name_placeholders.iter().any(|p| *p == name) {
            return self.resolve(&rules.placeholder_fallback).unwrap_or(name);
        }

        name
    }

    /// Bay count from the first source that yields a number, else 0
    pub fn resolve_bays(&self, sources: &[BaySource], name: &str) -> u32 {
        sources
            .iter()
            .find_map(|source| match source {
                BaySource::Property(key) => self.properties.get(*key).and_then(coerce_count),
                BaySource::NamePattern => bay_count_from_name(name),
                BaySource::Label(pattern) => count_from_text(&pattern.extract(self.description)),
            })
            .unwrap_or(0)
    }
}
