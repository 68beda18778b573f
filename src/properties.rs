//! Property reading and parsing
//!
//! Host applications hand settings over as flat name/value string pairs.
//! `PropertyReader` provides typed getters with explicit defaults; an
//! unparsable value logs a warning and falls back to the default.

use crate::colors::{parse_hex_color, Rgb};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One name/value setting as the host stores it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub name: String,
    pub value: String,
}

impl PropertyValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        PropertyValue {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Reads host properties with type-safe conversions
#[derive(Debug, Clone, Default)]
pub struct PropertyReader {
    properties: Vec<PropertyValue>,
}

impl PropertyReader {
    pub fn new(properties: Vec<PropertyValue>) -> Self {
        log::debug!("PropertyReader: {} properties", properties.len());
        for prop in &properties {
            log::debug!("  '{}' = '{}'", prop.name, prop.value);
        }
        Self { properties }
    }

    /// Get raw property value (None if not set or empty)
    fn get_raw(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.trim())
            .filter(|v| !v.is_empty())
    }

    /// Parse with `FromStr`, warning on invalid input
    fn get_parsed<T>(&self, name: &str, default: T) -> T
    where
        T: FromStr + std::fmt::Display,
    {
        match self.get_raw(name) {
            Some(raw) => raw.parse::<T>().unwrap_or_else(|_| {
                log::warn!(
                    "Invalid value for '{}': '{}', using default: {}",
                    name,
                    raw,
                    default
                );
                default
            }),
            None => default,
        }
    }

    pub fn get_usize(&self, name: &str, default: usize) -> usize {
        self.get_parsed(name, default)
    }

    pub fn get_f64(&self, name: &str, default: f64) -> f64 {
        self.get_parsed(name, default)
    }

    /// Get a `#RRGGBB` color property
    pub fn get_color(&self, name: &str, default: Rgb) -> Rgb {
        match self.get_raw(name) {
            Some(raw) => parse_hex_color(raw).unwrap_or_else(|| {
                log::warn!(
                    "Invalid color for '{}': '{}', using default: {:?}",
                    name,
                    raw,
                    default
                );
                default
            }),
            None => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(pairs: &[(&str, &str)]) -> PropertyReader {
        PropertyReader::new(
            pairs
                .iter()
                .map(|(name, value)| PropertyValue::new(*name, *value))
                .collect(),
        )
    }

    #[test]
    fn test_property_reader_empty() {
        let reader = PropertyReader::default();
        assert_eq!(reader.get_usize("bar", 42), 42);
        assert_eq!(reader.get_f64("baz", 0.25), 0.25);
        assert_eq!(reader.get_color("foo", [9, 9, 9]), [9, 9, 9]);
    }

    #[test]
    fn test_empty_value_means_unset() {
        let reader = reader(&[("bins", ""), ("color", "  ")]);
        assert_eq!(reader.get_usize("bins", 7), 7);
        assert_eq!(reader.get_color("color", [1, 1, 1]), [1, 1, 1]);
    }

    #[test]
    fn test_typed_values() {
        let reader = reader(&[
            ("bins", "64"),
            ("eps", "0.5"),
            ("color", "#ff8000"),
        ]);
        assert_eq!(reader.get_usize("bins", 1), 64);
        assert_eq!(reader.get_f64("eps", 1.0), 0.5);
        assert_eq!(reader.get_color("color", [0, 0, 0]), [255, 128, 0]);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let reader = reader(&[("bins", "many"), ("eps", "tiny"), ("color", "#zz")]);
        assert_eq!(reader.get_usize("bins", 3), 3);
        assert_eq!(reader.get_f64("eps", 1e-9), 1e-9);
        assert_eq!(reader.get_color("color", [1, 2, 3]), [1, 2, 3]);
    }
}
