//! ScriptResolver: heuristically names the host keyboard script from
//! reported upper/lower-case samples (spec §2).
//!
//! Uses `unicode-general-category`'s Unicode-block groupings the same way
//! `helix-core::chars` reaches for `unicode-general-category` to classify
//! punctuation, rather than hand-rolling a code-point range table.

use unicode_general_category::{get_general_category, GeneralCategory};

/// Minimum fraction of classifiable samples that must agree on a script
/// before [`resolve`] will name it; below this threshold the script is
/// reported as `None` (unknown).
pub const AGREEMENT_THRESHOLD: f64 = 0.65;

/// Coarse Unicode-block-derived script buckets. Not exhaustive of
/// Unicode's script property — only what calibration needs to distinguish
/// for case-conversion and advice purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Script {
    Latin,
    Greek,
    Cyrillic,
    Coptic,
    Armenian,
    Adlam,
    WarangCiti,
    Cherokee,
    Osage,
    Glagolitic,
    Deseret,
    Other,
}

impl Script {
    pub fn name(self) -> &'static str {
        match self {
            Script::Latin => "Latin",
            Script::Greek => "Greek",
            Script::Cyrillic => "Cyrillic",
            Script::Coptic => "Coptic",
            Script::Armenian => "Armenian",
            Script::Adlam => "Adlam",
            Script::WarangCiti => "Warang Citi",
            Script::Cherokee => "Cherokee",
            Script::Osage => "Osage",
            Script::Glagolitic => "Glagolitic",
            Script::Deseret => "Deseret",
            Script::Other => "Other",
        }
    }

    /// The closed list of scripts that distinguish upper/lower case (spec
    /// §4.2 step 3). Everything else is treated as caseless.
    pub fn supports_case(self) -> bool {
        !matches!(self, Script::Other)
    }

    /// Inverse of [`Script::name`], used to recover a `Script` from the
    /// string stored in [`crate::data::Data::keyboard_script`].
    pub fn from_name(name: &str) -> Option<Script> {
        match name {
            "Latin" => Some(Script::Latin),
            "Greek" => Some(Script::Greek),
            "Cyrillic" => Some(Script::Cyrillic),
            "Coptic" => Some(Script::Coptic),
            "Armenian" => Some(Script::Armenian),
            "Adlam" => Some(Script::Adlam),
            "Warang Citi" => Some(Script::WarangCiti),
            "Cherokee" => Some(Script::Cherokee),
            "Osage" => Some(Script::Osage),
            "Glagolitic" => Some(Script::Glagolitic),
            "Deseret" => Some(Script::Deseret),
            "Other" => Some(Script::Other),
            _ => None,
        }
    }

    fn from_char(ch: char) -> Option<Script> {
        match ch as u32 {
            0x0041..=0x024F => Some(Script::Latin),
            0x0370..=0x03FF | 0x1F00..=0x1FFF => Some(Script::Greek),
            0x0400..=0x04FF | 0x0500..=0x052F => Some(Script::Cyrillic),
            0x03E2..=0x03EF | 0x2C80..=0x2CFF => Some(Script::Coptic),
            0x0530..=0x058F => Some(Script::Armenian),
            0x1E900..=0x1E95F => Some(Script::Adlam),
            0x118A0..=0x118FF => Some(Script::WarangCiti),
            0x13A0..=0x13FF | 0xAB70..=0xABBF => Some(Script::Cherokee),
            0x104B0..=0x104FF => Some(Script::Osage),
            0x2C00..=0x2C5F => Some(Script::Glagolitic),
            0x10400..=0x1044F => Some(Script::Deseret),
            _ if get_general_category(ch) == GeneralCategory::UppercaseLetter
                || get_general_category(ch) == GeneralCategory::LowercaseLetter =>
            {
                Some(Script::Other)
            }
            _ => None,
        }
    }
}

/// Resolves the keyboard script from the characters a baseline probe's
/// upper-case and lower-case slots actually reported. Returns `None` when
/// no single script reaches [`AGREEMENT_THRESHOLD`] among classifiable
/// samples.
pub fn resolve<'a>(samples: impl Iterator<Item = &'a char>) -> Option<Script> {
    let mut counts: std::collections::HashMap<Script, usize> = std::collections::HashMap::new();
    let mut total = 0usize;

    for ch in samples {
        if let Some(script) = Script::from_char(*ch) {
            *counts.entry(script).or_insert(0) += 1;
            total += 1;
        }
    }

    if total == 0 {
        return None;
    }

    counts
        .into_iter()
        .max_by_key(|(_, n)| *n)
        .filter(|(_, n)| (*n as f64) / (total as f64) >= AGREEMENT_THRESHOLD)
        .map(|(script, _)| script)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_latin_from_mostly_latin_samples() {
        let samples: Vec<char> = "abcdefgABCDEFG".chars().collect();
        assert_eq!(resolve(samples.iter()), Some(Script::Latin));
    }

    #[test]
    fn resolves_cyrillic() {
        let samples: Vec<char> = "абвгдежзАБВГДЕЖЗ".chars().collect();
        assert_eq!(resolve(samples.iter()), Some(Script::Cyrillic));
    }

    #[test]
    fn returns_none_below_threshold() {
        let samples: Vec<char> = "aаbбcвdгeдfежgз".chars().collect();
        assert_eq!(resolve(samples.iter()), None);
    }

    #[test]
    fn closed_list_supports_case() {
        assert!(Script::Latin.supports_case());
        assert!(Script::Deseret.supports_case());
        assert!(!Script::Other.supports_case());
    }
}
