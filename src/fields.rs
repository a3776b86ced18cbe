//! Regex field scraping over flat slide text.
//!
//! Extraction is a pluggable strategy ([`FieldExtractor`]); every strategy returns a
//! [`FieldMap`] holding all of its declared keys, with [`FieldValue::NotFound`] for
//! the ones the text does not contain.

use crate::links::strip_illegal;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::sync::LazyLock;

/// Rendering of a field that did not match.
pub const NOT_FOUND: &str = "N/A";

pub const ZONE_KEY: &str = "Zone";
pub const MARKET_KEY: &str = "Market";
pub const LATITUDE_KEY: &str = "LAT";
pub const LONGITUDE_KEY: &str = "LON";

/// Keys scraped from a deck's "Commercial Terms" slide.
pub const COMMERCIAL_TERM_KEYS: &[&str] = &[
    "Catchment Name :",
    "Store Size",
    "Rent per Sq.ft",
    "Total Rent + Maintenance",
    "PROTO (in lakhs)",
    "GeoIQ Revenue Projection 2025 (in lakhs)",
];

static IMAGE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\[Image \d+\]\s*").expect("valid placeholder pattern"));

static ZONE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)ZONE\s*:\s*(.*?)(?:\s*STATE|\s*CITY|\s*PIN CODE|\n|$)").expect("valid zone pattern")
});

static LATITUDE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)LAT:\s*([\d.-]+)").expect("valid latitude pattern"));

static LONGITUDE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)LON:\s*([\d.-]+)").expect("valid longitude pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Found(String),
    NotFound,
}

impl FieldValue {
    /// Cleans a raw capture; an empty result counts as not found.
    pub fn from_capture(raw: &str) -> Self {
        let cleaned = strip_placeholders(raw);
        if cleaned.is_empty() {
            FieldValue::NotFound
        } else {
            FieldValue::Found(cleaned)
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            FieldValue::Found(v) => Some(v),
            FieldValue::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, FieldValue::Found(_))
    }

    pub fn as_str(&self) -> &str {
        self.value().unwrap_or(NOT_FOUND)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Ordered key → value mapping. Keys are never dropped.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FieldMap {
    entries: Vec<(String, FieldValue)>,
}

impl FieldMap {
    /// A map with every key present and not found.
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: keys.into_iter().map(|k| (k.into(), FieldValue::NotFound)).collect(),
        }
    }

    /// Sets a value, adding the key if it is new.
    pub fn set(&mut self, key: &str, value: FieldValue) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// The found value for `key`, `None` if missing or not found.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn all_found(&self) -> bool {
        self.entries.iter().all(|(_, v)| v.is_found())
    }

    /// Fills keys that are still not found from `other`; new keys are appended.
    pub fn fill_missing(&mut self, other: &FieldMap) {
        for (key, value) in other.iter() {
            match self.get(key) {
                Some(existing) if existing.is_found() => {}
                _ => self.set(key, value.clone()),
            }
        }
    }
}

/// A text → field map strategy.
pub trait FieldExtractor: Send + Sync {
    /// The keys every result of [`FieldExtractor::extract`] contains.
    fn keys(&self) -> Vec<String>;

    fn extract(&self, text: &str) -> FieldMap;
}

/// Removes `[Image N]` placeholders and surrounding whitespace.
pub fn strip_placeholders(value: &str) -> String {
    IMAGE_PLACEHOLDER.replace_all(value, "").trim().to_string()
}

/// Normalises a declared key: trimmed, trailing colon dropped.
pub fn normalize_key(key: &str) -> String {
    key.trim().trim_end_matches(':').trim().to_string()
}

/// Matches `<key> [:] value` pairs, the value running to the next newline, pipe
/// or the end of the text.
#[derive(Debug, Clone)]
pub struct KeyValueExtractor {
    fields: Vec<(String, Regex)>,
}

impl KeyValueExtractor {
    pub fn new<I, S>(keys: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields = keys
            .into_iter()
            .map(|key| {
                let key = normalize_key(key.as_ref());
                let key_pattern = key
                    .split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s*");
                let pattern = format!(r"(?is){key_pattern}(?:\s*:?\s*)(.*?)(?:\n|\||$)");
                Regex::new(&pattern).map(|re| (key, re))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { fields })
    }

    pub fn commercial_terms() -> Result<Self, regex::Error> {
        Self::new(COMMERCIAL_TERM_KEYS.iter().copied())
    }
}

impl FieldExtractor for KeyValueExtractor {
    fn keys(&self) -> Vec<String> {
        self.fields.iter().map(|(k, _)| k.clone()).collect()
    }

    fn extract(&self, text: &str) -> FieldMap {
        let mut map = FieldMap::with_keys(self.keys());
        for (key, pattern) in &self.fields {
            if let Some(caps) = pattern.captures(text) {
                map.set(key, FieldValue::from_capture(&caps[1]));
            }
        }
        map
    }
}

/// Two-stage zone then market extraction from a deck's first slide.
///
/// The market line starts with the zone text followed by a digit and at least two
/// underscore-separated segments (`North 1_Delhi_Market`), or uses one of the
/// `BD-` / `Add_` prefixes. No zone means no market.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZoneMarketExtractor;

impl ZoneMarketExtractor {
    pub fn zone(&self, text: &str) -> FieldValue {
        ZONE_PATTERN
            .captures(text)
            .map(|caps| FieldValue::from_capture(&caps[1]))
            .unwrap_or(FieldValue::NotFound)
    }

    pub fn market(&self, text: &str, zone: &str) -> FieldValue {
        let pattern = format!(r"(?im)^(?:{}\s*\d_.*?_.*|BD-.*|Add_.*)$", regex::escape(zone));
        match Regex::new(&pattern) {
            Ok(re) => re
                .find(text)
                .map(|m| FieldValue::from_capture(m.as_str()))
                .unwrap_or(FieldValue::NotFound),
            Err(e) => {
                tracing::warn!(zone, error = %e, "market pattern rejected");
                FieldValue::NotFound
            }
        }
    }
}

impl FieldExtractor for ZoneMarketExtractor {
    fn keys(&self) -> Vec<String> {
        vec![ZONE_KEY.to_string(), MARKET_KEY.to_string()]
    }

    fn extract(&self, text: &str) -> FieldMap {
        let mut map = FieldMap::with_keys(self.keys());
        let zone = self.zone(text);
        if let Some(zone_name) = zone.value() {
            map.set(MARKET_KEY, self.market(text, zone_name));
        }
        map.set(ZONE_KEY, zone);
        map
    }
}

/// `LAT: <number>` / `LON: <number>` pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateExtractor;

impl FieldExtractor for CoordinateExtractor {
    fn keys(&self) -> Vec<String> {
        vec![LATITUDE_KEY.to_string(), LONGITUDE_KEY.to_string()]
    }

    fn extract(&self, text: &str) -> FieldMap {
        let mut map = FieldMap::with_keys(self.keys());
        for (key, pattern) in [(LATITUDE_KEY, &*LATITUDE_PATTERN), (LONGITUDE_KEY, &*LONGITUDE_PATTERN)] {
            if let Some(caps) = pattern.captures(text) {
                map.set(key, FieldValue::from_capture(&caps[1]));
            }
        }
        map
    }
}

/// File-name prefix derived from a market name: the segment after the last `_`,
/// with path-illegal characters removed, followed by a space. Empty when there is
/// nothing usable.
pub fn market_prefix(market: Option<&str>) -> String {
    let Some(market) = market else {
        return String::new();
    };
    let segment = market.rsplit_once('_').map(|(_, tail)| tail).unwrap_or(market);
    let cleaned = strip_illegal(segment);
    if cleaned.is_empty() {
        String::new()
    } else {
        format!("{cleaned} ")
    }
}
