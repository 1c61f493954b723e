//! Session-level tunables that govern *how* a calibration session runs,
//! distinct from [`crate::data::Data`] (what a session *learns*).
//!
//! Deserialized from TOML via `serde`, the way `helix-core::config` and
//! `helix-loader` materialize a user-facing config struct rather than a
//! bespoke parser: a plain struct, `#[serde(default)]` fields, and a
//! `Default` impl that matches the behaviour described in spec §4.1.1.

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Maximum characters per barcode; `None` means a single barcode
    /// carries the whole probe payload (spec §4.1.5 is skipped).
    pub max_barcode_chars: Option<usize>,

    /// Gates the optional End-of-Transmission probe (spec §4.1.1 item 8,
    /// the "FormatSupport flag").
    pub enable_eot_probe: bool,

    /// Search order for the temporary-delimiter candidate (spec §4.1.1).
    /// Space is first because it is, by construction, the only ASCII
    /// character absent from both the invariant and additional-ASCII
    /// alphabets.
    pub temporary_delimiter_candidates: Vec<char>,

    /// Overrides automatic prefix detection (spec §6): required only when
    /// a configured scanner prefix contains two or more consecutive
    /// spaces, which would otherwise be indistinguishable from the
    /// temporary delimiter.
    pub reported_prefix: Option<String>,

    /// Small-barcode sequence-marker prefix (spec §4.1.5).
    pub small_barcode_marker_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_barcode_chars: None,
            enable_eot_probe: true,
            temporary_delimiter_candidates: vec![' '],
            reported_prefix: None,
            small_barcode_marker_prefix: "SB".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self).map_err(|e| crate::error::Error::CalibrationFailed(e.to_string()))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.temporary_delimiter_candidates, vec![' ']);
        assert!(config.enable_eot_probe);
        assert_eq!(config.max_barcode_chars, None);
    }

    #[test]
    fn round_trips_through_toml() {
        let config = Config {
            max_barcode_chars: Some(40),
            reported_prefix: Some("  ".to_string()),
            ..Config::default()
        };
        let toml = config.to_toml().unwrap();
        let back = Config::from_toml(&toml).unwrap();
        assert_eq!(config, back);
    }
}
