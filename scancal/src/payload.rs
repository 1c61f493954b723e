//! Probe payload construction (spec §4.1.1, §4.1.3) and small-barcode
//! segmentation (spec §4.1.5).

use crate::char_cat::{additional_ascii_characters, invariant_sequence};
use crate::config::Config;
use crate::error::{Error, Result};

/// The three-character AIM identifier this crate embeds in every baseline
/// probe so the reported text can be compared against it (spec §4.1.2
/// step 2). Chosen arbitrarily from the AIM symbology-identifier space;
/// any scanner-specific real AIM transmission is detected independently
/// from the scanner's own prefix noise.
pub const AIM_IDENTIFIER_PREFIX: &str = "]Q1";

/// Marks the end of the payload proper; anything the scanner appends after
/// the reported decoding of this sentinel (before the line ending) is
/// recorded as the scanner-added suffix.
pub const SUFFIX_SENTINEL: &str = "##";

pub const ASCII_GROUP_SEPARATOR: char = '\u{1D}';
pub const ASCII_FILE_SEPARATOR: char = '\u{1C}';
pub const ASCII_RECORD_SEPARATOR: char = '\u{1E}';
pub const ASCII_UNIT_SEPARATOR: char = '\u{1F}';
pub const ASCII_END_OF_TRANSMISSION: char = '\u{04}';

/// Chooses the temporary delimiter: the first candidate (in configured
/// order) that appears in neither the invariant nor the additional-ASCII
/// alphabet. Spec §4.1.1: with the default alphabet, space is the unique
/// such character.
pub fn choose_temporary_delimiter(config: &Config) -> Result<char> {
    let invariants = invariant_sequence();
    let additional = additional_ascii_characters();
    config
        .temporary_delimiter_candidates
        .iter()
        .copied()
        .find(|c| !invariants.contains(c) && !additional.contains(c))
        .ok_or(Error::NoTemporaryDelimiterCandidate)
}

/// Describes, in order, the content segments of a baseline probe payload
/// (spec §4.1.1 items 2-8, excluding the conceptual prefix slot which never
/// appears as a delimited segment of its own).
pub struct BaselineLayout {
    pub invariants: Vec<char>,
    pub additional_ascii: Vec<char>,
    pub delimiter: char,
    pub include_eot: bool,
}

impl BaselineLayout {
    pub fn new(delimiter: char, include_eot: bool) -> Self {
        Self {
            invariants: invariant_sequence(),
            additional_ascii: additional_ascii_characters(),
            delimiter,
            include_eot,
        }
    }

    /// The number of whitespace-delimited slots the baseline payload emits
    /// after the AIM prefix and before the suffix sentinel.
    pub fn slot_count(&self) -> usize {
        self.invariants.len() + self.additional_ascii.len() + if self.include_eot { 5 } else { 4 }
    }

    fn push_joined(&self, out: &mut String, chars: &[char]) {
        for (i, c) in chars.iter().enumerate() {
            if i > 0 {
                out.push(self.delimiter);
            }
            out.push(*c);
        }
    }

    /// Builds the full baseline probe payload: AIM prefix, invariant
    /// segment, additional-ASCII segment, the four (or three) separator
    /// probes each flanked by invariants, and the suffix sentinel.
    pub fn build(&self) -> String {
        let mut out = String::new();
        out.push_str(AIM_IDENTIFIER_PREFIX);
        out.push(self.delimiter);
        self.push_joined(&mut out, &self.invariants);
        out.push(self.delimiter);
        self.push_joined(&mut out, &self.additional_ascii);
        out.push(self.delimiter);

        let flank = self.invariants[0];
        let mut separator_probe = |out: &mut String, sep: char| {
            out.push(flank);
            out.push(sep);
            out.push(flank);
        };
        separator_probe(&mut out, ASCII_GROUP_SEPARATOR);
        out.push(self.delimiter);
        separator_probe(&mut out, ASCII_FILE_SEPARATOR);
        out.push(self.delimiter);
        separator_probe(&mut out, ASCII_RECORD_SEPARATOR);
        out.push(self.delimiter);
        separator_probe(&mut out, ASCII_UNIT_SEPARATOR);
        if self.include_eot {
            out.push(self.delimiter);
            separator_probe(&mut out, ASCII_END_OF_TRANSMISSION);
        }
        out.push(self.delimiter);
        out.push_str(SUFFIX_SENTINEL);
        out
    }
}

/// Builds the dead-key probe payload for host dead-key indicator `indicator`:
/// `indicator` immediately followed by each invariant in turn, each
/// `(indicator, invariant)` pair separated from the next by `delimiter`
/// (spec §4.1.3).
pub fn dead_key_probe_payload(indicator: char, delimiter: char) -> String {
    let invariants = invariant_sequence();
    let mut out = String::new();
    for (i, inv) in invariants.iter().enumerate() {
        if i > 0 {
            out.push(delimiter);
        }
        out.push(indicator);
        out.push(*inv);
    }
    out
}

/// Splits a fixed probe payload into multiple smaller barcodes when a
/// maximum character count applies (spec §4.1.5). Each chunk is prefixed
/// with `"{index},{count},{prefix}"` so the far end can reassemble the
/// reported halves. Never splits on the delimiter itself: if the naive
/// split point lands there, the chunker backs off to a shorter chunk.
pub struct BarcodeChunker {
    pub max_chars: usize,
    pub prefix: String,
}

impl BarcodeChunker {
    pub fn new(max_chars: usize, prefix: impl Into<String>) -> Self {
        Self {
            max_chars,
            prefix: prefix.into(),
        }
    }

    pub fn chunk(&self, payload: &str, delimiter: char) -> Result<Vec<String>> {
        let chars: Vec<char> = payload.chars().collect();
        if chars.is_empty() {
            return Ok(Vec::new());
        }

        // First pass: figure out how many chunks we need at the configured
        // cap so markers can report an accurate sequence count up front.
        let marker_len = |index: usize, count: usize| {
            format!("{},{},{}", index, count, self.prefix).len()
        };

        let mut body_cap = self.max_chars.saturating_sub(marker_len(0, 1) + 1);
        if body_cap == 0 {
            return Err(Error::CalibrationFailed(
                "max_chars too small to fit a small-barcode marker".into(),
            ));
        }

        loop {
            let count = chars.len().div_ceil(body_cap);
            let mut chunks = Vec::with_capacity(count);
            let mut pos = 0usize;
            let mut backoff = false;

            for index in 0..count {
                let mut end = (pos + body_cap).min(chars.len());
                // Never split exactly on the delimiter: pull the boundary
                // back one character until it doesn't, or give up and
                // retry the whole chunking with a smaller cap.
                while end < chars.len() && end > pos && chars[end - 1] == delimiter {
                    end -= 1;
                }
                if end == pos {
                    backoff = true;
                    break;
                }
                let marker = format!("{},{},{}", index, count, self.prefix);
                let mut chunk = marker;
                chunk.extend(&chars[pos..end]);
                chunks.push(chunk);
                pos = end;
            }

            if !backoff && pos == chars.len() {
                return Ok(chunks);
            }

            if body_cap <= 1 {
                return Err(Error::CalibrationFailed(
                    "cannot chunk payload without splitting on the delimiter".into(),
                ));
            }
            body_cap -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_delimiter_is_space() {
        let config = Config::default();
        assert_eq!(choose_temporary_delimiter(&config).unwrap(), ' ');
    }

    #[test]
    fn no_candidate_left_is_an_error() {
        let config = Config {
            temporary_delimiter_candidates: vec!['a', '1', '!'],
            ..Config::default()
        };
        assert!(matches!(
            choose_temporary_delimiter(&config),
            Err(Error::NoTemporaryDelimiterCandidate)
        ));
    }

    #[test]
    fn baseline_layout_round_trips_slot_count() {
        let layout = BaselineLayout::new(' ', true);
        let payload = layout.build();
        let body = payload
            .strip_prefix(AIM_IDENTIFIER_PREFIX)
            .unwrap()
            .strip_prefix(' ')
            .unwrap()
            .strip_suffix(SUFFIX_SENTINEL)
            .unwrap();
        let body = body.strip_suffix(' ').unwrap();
        assert_eq!(body.split(' ').count(), layout.slot_count());
    }

    #[test]
    fn dead_key_probe_has_one_slot_per_invariant() {
        let payload = dead_key_probe_payload('^', ' ');
        assert_eq!(payload.split(' ').count(), invariant_sequence().len());
        assert!(payload.starts_with("^0"));
    }

    #[test]
    fn chunker_never_splits_on_delimiter() {
        let layout = BaselineLayout::new(' ', false);
        let payload = layout.build();
        let chunker = BarcodeChunker::new(20, "SB");
        let chunks = chunker.chunk(&payload, ' ').unwrap();
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 20);
        }
        let reassembled: String = chunks
            .iter()
            .map(|c| {
                let mut parts = c.splitn(3, ',');
                parts.next();
                parts.next();
                let rest = parts.next().unwrap();
                rest.strip_prefix(&chunker.prefix).unwrap()
            })
            .collect();
        assert_eq!(reassembled, payload);
    }
}
