//! Engine configuration
//!
//! Every field has a default, so an empty JSON object or an empty property
//! list yields a working configuration. Loaded either from JSON or from host
//! properties (see `PropertyReader`).

use crate::colors::{parse_hex_color, to_hex, Rgb};
use crate::error::{MatrixError, Result};
use crate::properties::PropertyReader;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    /// Number of color bins for continuous coloring
    pub color_bins: usize,

    /// Polygons with an area below this are treated as empty selections
    pub polygon_area_epsilon: f64,

    /// Color of every row when no color mode is active
    #[serde(with = "hex_rgb")]
    pub default_color: Rgb,

    /// Color of rows whose value is NaN or infinite
    #[serde(with = "hex_rgb")]
    pub non_finite_color: Rgb,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        MatrixConfig {
            color_bins: 100,
            polygon_area_epsilon: 1e-9,
            default_color: [128, 128, 128],
            non_finite_color: [204, 204, 204],
        }
    }
}

impl MatrixConfig {
    /// Parse and validate from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: MatrixConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Create config from host properties
    ///
    /// Invalid values fall back to the defaults (with a warning), so this
    /// never fails. Values that parse but make no sense are caught by
    /// `validate`.
    pub fn from_properties(props: &PropertyReader) -> Self {
        let defaults = MatrixConfig::default();
        let config = MatrixConfig {
            color_bins: props.get_usize("color.bins", defaults.color_bins),
            polygon_area_epsilon: props
                .get_f64("selection.polygon.epsilon", defaults.polygon_area_epsilon),
            default_color: props.get_color("color.default", defaults.default_color),
            non_finite_color: props.get_color("color.nonFinite", defaults.non_finite_color),
        };
        log::debug!("MatrixConfig from properties: {:?}", config);
        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.color_bins == 0 {
            return Err(MatrixError::Config("color_bins must be at least 1".to_string()));
        }
        if !self.polygon_area_epsilon.is_finite() || self.polygon_area_epsilon < 0.0 {
            return Err(MatrixError::Config(format!(
                "polygon_area_epsilon must be a non-negative number, got {}",
                self.polygon_area_epsilon
            )));
        }
        Ok(())
    }
}

/// `#RRGGBB` strings on the wire, RGB triples in memory
mod hex_rgb {
    use super::{parse_hex_color, to_hex, Rgb};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(color: &Rgb, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_hex(*color))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Rgb, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_hex_color(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid color '{}'", raw)))
    }
}
