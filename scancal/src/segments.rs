//! Segmenter: splits reported baseline text into the ordered segments the
//! probe barcode emitted (spec §4.1.1, §4.1.2).

use std::collections::HashMap;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::payload::{BaselineLayout, AIM_IDENTIFIER_PREFIX, SUFFIX_SENTINEL};

/// The result of splitting a reported baseline string into its constituent
/// segments, ready for alignment against the canonical invariant sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentedBaseline {
    /// Scanner-added noise preceding the AIM identifier's reported form.
    pub prefix: String,
    /// What the reported text decoded the AIM identifier prefix to.
    pub aim_reported: String,
    /// One reported string per invariant slot, in canonical order. A slot
    /// may be more than one character (a dead-key pair, or a ligature).
    pub invariant_tokens: Vec<String>,
    /// One reported string per additional-ASCII slot.
    pub additional_ascii_tokens: Vec<String>,
    pub gs_probe: Option<String>,
    pub fs_probe: Option<String>,
    pub rs_probe: Option<String>,
    pub us_probe: Option<String>,
    pub eot_probe: Option<String>,
    /// What the reported text decoded the suffix sentinel to.
    pub suffix_sentinel_reported: String,
    /// Scanner-added noise following the suffix sentinel's reported form.
    pub suffix: String,
    /// Trailing CR/LF run, if any.
    pub eol: String,
    /// True when fewer slots were present than the layout expects.
    pub partial: bool,
}

/// Finds the character that best explains the reported delimiter: the one
/// whose occurrence count matches the number of delimiters the layout
/// expects. The literal delimiter we asked the probe to use is tried
/// first; only if it doesn't appear with the right cardinality do we fall
/// back to scanning every distinct character in the text (spec §4.1.2
/// step 1: the delimiter "may itself have been remapped").
pub fn locate_delimiter(reported: &str, layout: &BaselineLayout) -> Result<char> {
    let expected_delimiter_count = layout.slot_count() + 1; // + AIM + suffix tokens - 1 separators
    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in reported.chars() {
        *counts.entry(c).or_insert(0) += 1;
    }

    if counts.get(&layout.delimiter).copied().unwrap_or(0) == expected_delimiter_count {
        return Ok(layout.delimiter);
    }

    counts
        .into_iter()
        .filter(|(c, n)| *n == expected_delimiter_count && !c.is_alphanumeric())
        .map(|(c, _)| c)
        .min()
        .ok_or(Error::NoDelimiters)
}

/// Splits `reported` into its ordered segments per the baseline layout.
pub fn split(reported: &str, layout: &BaselineLayout, config: &Config) -> Result<SegmentedBaseline> {
    let delimiter = locate_delimiter(reported, layout)?;
    let stripped = reported.trim_end_matches(['\r', '\n']);
    let eol = reported[stripped.len()..].to_string();

    let tokens: Vec<String> = stripped.split(delimiter).map(str::to_string).collect();
    if tokens.is_empty() || tokens.iter().all(String::is_empty) {
        return Err(Error::NoDelimiters);
    }

    let expected_total = layout.slot_count() + 2; // + AIM token + suffix token
    let partial = tokens.len() < expected_total;

    let mut it = tokens.into_iter();
    let first = it.next().unwrap_or_default();
    let (prefix, aim_reported) = split_known_tail(&first, config.reported_prefix.as_deref(), AIM_IDENTIFIER_PREFIX);

    let n_inv = layout.invariants.len();
    let n_ascii = layout.additional_ascii.len();

    let invariant_tokens: Vec<String> = (&mut it).take(n_inv).collect();
    let additional_ascii_tokens: Vec<String> = (&mut it).take(n_ascii).collect();
    let gs_probe = it.next();
    let fs_probe = it.next();
    let rs_probe = it.next();
    let us_probe = it.next();
    let eot_probe = if layout.include_eot { it.next() } else { None };
    let last = it.next().unwrap_or_default();

    let (suffix_sentinel_reported, suffix) = split_known_head(&last, SUFFIX_SENTINEL);

    Ok(SegmentedBaseline {
        prefix,
        aim_reported,
        invariant_tokens,
        additional_ascii_tokens,
        gs_probe,
        fs_probe,
        rs_probe,
        us_probe,
        eot_probe,
        suffix_sentinel_reported,
        suffix,
        eol,
        partial,
    })
}

/// Splits `token` into a leading noise prefix and a trailing portion
/// assumed to be the reported decoding of `known`. When `override_prefix`
/// is given (spec §6 `set_reported_prefix`), it is used verbatim instead
/// of the length-based heuristic.
fn split_known_tail(token: &str, override_prefix: Option<&str>, known: &str) -> (String, String) {
    if let Some(prefix) = override_prefix {
        if let Some(rest) = token.strip_prefix(prefix) {
            return (prefix.to_string(), rest.to_string());
        }
    }
    let known_len = known.chars().count();
    let total_len = token.chars().count();
    if total_len <= known_len {
        return (String::new(), token.to_string());
    }
    let split_at = total_len - known_len;
    let prefix: String = token.chars().take(split_at).collect();
    let rest: String = token.chars().skip(split_at).collect();
    (prefix, rest)
}

/// Splits `token` into a leading portion assumed to be the reported
/// decoding of `known` and trailing scanner-added noise.
fn split_known_head(token: &str, known: &str) -> (String, String) {
    let known_len = known.chars().count();
    let total_len = token.chars().count();
    let split_at = known_len.min(total_len);
    let head: String = token.chars().take(split_at).collect();
    let tail: String = token.chars().skip(split_at).collect();
    (head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_clean_us_layout_baseline() {
        let config = Config::default();
        let layout = BaselineLayout::new(' ', true);
        let payload = layout.build();
        let segmented = split(&payload, &layout, &config).unwrap();
        assert_eq!(segmented.prefix, "");
        assert_eq!(segmented.aim_reported, AIM_IDENTIFIER_PREFIX);
        assert_eq!(segmented.invariant_tokens.len(), layout.invariants.len());
        assert_eq!(
            segmented.additional_ascii_tokens.len(),
            layout.additional_ascii.len()
        );
        assert!(!segmented.partial);
        assert_eq!(segmented.suffix_sentinel_reported, SUFFIX_SENTINEL);
        assert_eq!(segmented.suffix, "");
    }

    #[test]
    fn detects_scanner_prefix_and_suffix_noise() {
        let config = Config::default();
        let layout = BaselineLayout::new(' ', false);
        let payload = layout.build();
        let noisy = format!("PRE{payload}TAIL\r\n");
        let segmented = split(&noisy, &layout, &config).unwrap();
        assert_eq!(segmented.prefix, "PRE");
        assert_eq!(segmented.suffix, "TAIL");
        assert_eq!(segmented.eol, "\r\n");
    }

    #[test]
    fn detects_remapped_delimiter() {
        let layout = BaselineLayout::new(' ', false);
        let payload = layout.build();
        let remapped = payload.replace(' ', "~");
        let config = Config::default();
        let delim = locate_delimiter(&remapped, &layout).unwrap();
        assert_eq!(delim, '~');
    }
}
