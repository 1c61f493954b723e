//! [`Data`]: the calibration artifact produced by a completed session and
//! later handed to [`crate::remap::Remapper`].
//!
//! JSON field names are fixed by spec §6 and must not be renamed; this is
//! the one part of the crate where wire compatibility outranks Rust-side
//! naming taste, mirroring how `helix-lsp-types`/`helix-dap-types` pin
//! their field names to an external protocol rather than local convention.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A reported dead-key sequence: the indicator character the host layout
/// treats as "dead", followed by the character(s) the following keystroke
/// produced. Stored as a plain string (no embedded NUL) — see spec §9's
/// design note that the historical `'\0'`-prefixed key is a serialization
/// artifact, not a domain concept worth carrying into a reimplementation.
pub type DeadKeySeq = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerKeyboardPerformance {
    Low,
    Medium,
    High,
}

impl ScannerKeyboardPerformance {
    /// Buckets a measured inter-character transmission rate: `>=60` chars/s
    /// is High, `>=20` is Medium, anything slower is Low (spec §4.1.4).
    pub fn from_chars_per_second(cps: f64) -> Self {
        if cps >= 60.0 {
            ScannerKeyboardPerformance::High
        } else if cps >= 20.0 {
            ScannerKeyboardPerformance::Medium
        } else {
            ScannerKeyboardPerformance::Low
        }
    }
}

impl fmt::Display for ScannerKeyboardPerformance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScannerKeyboardPerformance::Low => f.write_str("low"),
            ScannerKeyboardPerformance::Medium => f.write_str("medium"),
            ScannerKeyboardPerformance::High => f.write_str("high"),
        }
    }
}

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// The calibration artifact: every fact `CalibrationEngine` inferred about
/// how this host reinterprets the scanner's keystrokes.
///
/// Immutable once a session seals it (spec §3 "Lifecycle"); multiple
/// threads may hand the same `Data` to independent `Remapper` calls with
/// no coordination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Data {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub aim_flag_character_sequence: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub character_map: BTreeMap<char, char>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dead_keys_map: BTreeMap<DeadKeySeq, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dead_key_character_map: BTreeMap<DeadKeySeq, char>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ligature_map: BTreeMap<String, char>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scanner_dead_keys_map: BTreeMap<char, char>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scanner_unassigned_keys: Vec<char>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prefix: String,

    /// Scanner-injected code-identifier substring between `prefix` and the
    /// probe payload proper, when one is configured. Distinct from the AIM
    /// identifier: a scanner may add both its own static code id *and*
    /// dynamically transmit an AIM flag.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub suffix: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reported_characters: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub keyboard_script: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scanner_keyboard_performance: Option<ScannerKeyboardPerformance>,

    #[serde(default, skip_serializing_if = "is_default")]
    pub scanner_characters_per_second: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_feed_character: Option<char>,
}

impl Data {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds [`Data::reported_characters`] as a regex character class
    /// covering the union of `character_map`'s domain and the first
    /// character of every `dead_keys_map` key (spec §3 invariant).
    pub fn recompute_reported_characters(&mut self) {
        let mut chars: Vec<char> = self.character_map.keys().copied().collect();
        for seq in self.dead_keys_map.keys() {
            if let Some(first) = seq.chars().next() {
                chars.push(first);
            }
        }
        chars.sort_unstable();
        chars.dedup();

        let mut pattern = String::from("[");
        for c in chars {
            if "\\]^-".contains(c) {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push(']');
        self.reported_characters = pattern;
    }

    /// Compiles [`Data::reported_characters`] into a [`Regex`] for
    /// tokenising live input. Returns `None` when no characters have been
    /// recorded yet (an empty character class is not valid regex).
    pub fn reported_characters_regex(&self) -> Option<Regex> {
        if self.reported_characters == "[]" || self.reported_characters.is_empty() {
            return None;
        }
        Regex::new(&self.reported_characters).ok()
    }

    /// Invariant check used by tests and by the engine after each mutation:
    /// no reported character is simultaneously a direct `character_map` key
    /// and the indicator of a `dead_keys_map` entry.
    pub fn character_map_and_dead_keys_disjoint(&self) -> bool {
        self.character_map.keys().all(|reported| {
            !self
                .dead_keys_map
                .keys()
                .any(|seq| seq.chars().next() == Some(*reported))
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let mut data = Data::new();
        data.character_map.insert('&', '1');
        data.dead_keys_map
            .insert("^a".to_string(), "a".to_string());
        data.recompute_reported_characters();
        let json = data.to_json().unwrap();
        let back = Data::from_json(&json).unwrap();
        assert_eq!(data, back);
    }

    #[test]
    fn empty_enumerables_are_omitted() {
        let data = Data::new();
        let json = data.to_json().unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn reported_characters_covers_map_domains() {
        let mut data = Data::new();
        data.character_map.insert('&', '1');
        data.dead_keys_map
            .insert("^a".to_string(), "a".to_string());
        data.recompute_reported_characters();
        let re = data.reported_characters_regex().unwrap();
        assert!(re.is_match("&"));
        assert!(re.is_match("^"));
        assert!(!re.is_match("q"));
    }

    quickcheck::quickcheck! {
        // spec §8 Law: Data == fromJson(toJson(Data)) for any character_map
        // a session could have produced.
        fn character_map_round_trips_through_json(pairs: Vec<(char, char)>) -> bool {
            let mut data = Data::new();
            for (k, v) in pairs {
                if k != v {
                    data.character_map.insert(k, v);
                }
            }
            data.recompute_reported_characters();
            let json = data.to_json().unwrap();
            Data::from_json(&json).unwrap() == data
        }
    }

    #[test]
    fn performance_buckets() {
        assert_eq!(
            ScannerKeyboardPerformance::from_chars_per_second(61.0),
            ScannerKeyboardPerformance::High
        );
        assert_eq!(
            ScannerKeyboardPerformance::from_chars_per_second(25.0),
            ScannerKeyboardPerformance::Medium
        );
        assert_eq!(
            ScannerKeyboardPerformance::from_chars_per_second(5.0),
            ScannerKeyboardPerformance::Low
        );
    }
}
