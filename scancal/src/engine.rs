//! CalibrationEngine: the probe state machine (spec §4.1).
//!
//! Session state is carried entirely in [`Token`] so the facade can be used
//! statelessly (spec §5): every public method takes the previous token by
//! value and returns the next one, the way `helix-dap`'s request/response
//! pairs thread a session id through instead of holding it server-side.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::capabilities::SystemCapabilities;
use crate::char_cat::{self, invariant_sequence};
use crate::config::Config;
use crate::data::{Data, ScannerKeyboardPerformance};
use crate::diagnostic::{DiagnosticCode, DiagnosticStreams};
use crate::error::{Error, Result};
use crate::payload::{BarcodeChunker, BaselineLayout};
use crate::platform::{Assumption, Platform};
use crate::script;
use crate::segments::{self, SegmentedBaseline};

/// Which probe a [`Token`] currently carries the answer for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeKind {
    Baseline,
    DeadKey(char),
}

/// Internal bookkeeping a stateless caller round-trips alongside [`Token`]
/// so a turn can be resumed on any process (spec §5 "stateless facade").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedData {
    pub delimiter: char,
    pub include_eot: bool,
    pub assumption: Assumption,
    pub dead_key_queue: VecDeque<char>,
    pub probed_dead_keys: Vec<char>,
    pub min_chars_per_second: Option<f64>,
    #[serde(default)]
    pub pending_small_barcode_chunks: BTreeMap<usize, String>,
    pub expected_small_barcode_count: Option<usize>,
    /// Whether the invariant/additional-ASCII segments, respectively, came
    /// back with every slot matching its expected character (no
    /// character-map or dead-key entries). Tracked separately per segment
    /// so `SystemCapabilities::keyboard_layouts_correspond_for_*` can be
    /// derived independently for each (spec §3).
    #[serde(default = "default_true")]
    pub invariants_correspond: bool,
    #[serde(default = "default_true")]
    pub non_invariants_correspond: bool,
}

fn default_true() -> bool {
    true
}

/// The single reported character flanked on both sides, for a probe slot
/// expected to come back as exactly three reported characters (invariant,
/// separator, invariant). `None` if the slot doesn't have that shape.
fn flanked_middle_char(probe: &str) -> Option<char> {
    let mut chars = probe.chars();
    let (Some(_first), Some(middle), Some(_last), None) =
        (chars.next(), chars.next(), chars.next(), chars.next())
    else {
        return None;
    };
    Some(middle)
}

impl ExtendedData {
    fn new(assumption: Assumption, config: &Config) -> Self {
        Self {
            delimiter: ' ',
            include_eot: config.enable_eot_probe,
            assumption,
            dead_key_queue: VecDeque::new(),
            probed_dead_keys: Vec::new(),
            min_chars_per_second: None,
            pending_small_barcode_chunks: BTreeMap::new(),
            expected_small_barcode_count: None,
            invariants_correspond: true,
            non_invariants_correspond: true,
        }
    }
}

/// The value record threaded through a calibration session (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub payload: String,
    pub probe_kind: ProbeKind,
    pub remaining: usize,
    pub small_barcode_index: Option<usize>,
    pub small_barcode_count: Option<usize>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub keyboard_match: Option<bool>,
    pub data: Data,
    pub capabilities: SystemCapabilities,
    pub extended: ExtendedData,
    pub streams: DiagnosticStreams,
    pub calibration_session_abandoned: bool,
}

impl Token {
    /// Builds the token for a fresh baseline probe (spec §6 `new_session`).
    pub fn baseline(assumption: Assumption, config: &Config) -> Result<Self> {
        let extended = ExtendedData::new(assumption, config);
        let delimiter = crate::payload::choose_temporary_delimiter(config)?;
        let layout = BaselineLayout::new(delimiter, extended.include_eot);
        let payload = layout.build();
        Ok(Self {
            payload,
            probe_kind: ProbeKind::Baseline,
            remaining: 1,
            small_barcode_index: None,
            small_barcode_count: None,
            prefix: None,
            suffix: None,
            keyboard_match: None,
            data: Data::new(),
            capabilities: SystemCapabilities::default(),
            extended: ExtendedData { delimiter, ..extended },
            streams: DiagnosticStreams::default(),
            calibration_session_abandoned: false,
        })
    }

    /// Builds the token for a fresh session seeded with prior calibration
    /// data (spec §6 `new_session_with_prior`); re-probes from scratch but
    /// keeps the prior `Data` as a starting point for prefix/suffix reuse.
    pub fn baseline_with_prior(data: Data, assumption: Assumption, config: &Config) -> Result<Self> {
        let mut token = Self::baseline(assumption, config)?;
        token.data = data;
        Ok(token)
    }

    /// Marks the session as abandoned (spec §5 "Cancellation"). The engine
    /// treats this as terminal and performs no further processing.
    pub fn abandon(mut self) -> Self {
        self.calibration_session_abandoned = true;
        self.remaining = 0;
        self
    }

    /// Overrides automatic prefix detection (spec §6 `set_reported_prefix`).
    pub fn set_reported_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = Some(prefix.into());
    }
}

/// External collaborator for rendering a probe payload into a scannable
/// image (spec §1 "barcode image rendering" is explicitly out of scope;
/// spec §6 `next_barcode(..., generate_image?)`). This crate never
/// implements one: a host that wants a rendered barcode supplies its own
/// `DataMatrixRenderer`, the way `helix-term` supplies its own terminal
/// backend behind a trait `helix-view` only calls through.
pub trait DataMatrixRenderer {
    type Image;
    type Error;

    fn render(&self, payload: &str) -> std::result::Result<Self::Image, Self::Error>;
}

/// Drives a session's probe sequence: baseline first, then one dead-key
/// probe per discovered host dead key (spec §4.1.2, §4.1.3).
pub struct CalibrationEngine;

impl CalibrationEngine {
    pub fn new_session(assumption: Assumption, config: &Config) -> Result<Token> {
        Token::baseline(assumption, config)
    }

    pub fn new_session_with_prior(data: Data, assumption: Assumption, config: &Config) -> Result<Token> {
        Token::baseline_with_prior(data, assumption, config)
    }

    /// Returns the barcode payload(s) the caller should display/scan next,
    /// split into small-barcode chunks when `config.max_barcode_chars` is
    /// set (spec §4.1.5).
    pub fn next_barcode(token: &Token, config: &Config) -> Result<Vec<String>> {
        match config.max_barcode_chars {
            Some(max) if max < token.payload.chars().count() => {
                let chunker = BarcodeChunker::new(max, config.small_barcode_marker_prefix.clone());
                chunker.chunk(&token.payload, token.extended.delimiter)
            }
            _ => Ok(vec![token.payload.clone()]),
        }
    }

    /// Like [`Self::next_barcode`], but also renders each chunk through a
    /// caller-supplied [`DataMatrixRenderer`] (spec §6 `generate_image?`).
    /// Image generation is never attempted by this crate directly.
    pub fn next_barcode_with_image<R: DataMatrixRenderer>(
        token: &Token,
        config: &Config,
        renderer: &R,
    ) -> Result<Vec<(String, R::Image)>> {
        let chunks = Self::next_barcode(token, config)?;
        chunks
            .into_iter()
            .map(|payload| {
                renderer
                    .render(&payload)
                    .map(|image| (payload, image))
                    .map_err(|_| Error::CalibrationFailed("barcode image rendering failed".into()))
            })
            .collect()
    }

    /// Advances the state machine by one turn (spec §6 `calibrate`).
    pub fn calibrate(
        mut token: Token,
        reported: &str,
        caps_lock: Option<bool>,
        platform: Platform,
        data_entry_span_secs: f64,
        config: &Config,
    ) -> Result<Token> {
        if token.calibration_session_abandoned {
            return Ok(token);
        }

        let reported = match Self::reassemble_small_barcode(&mut token, reported)? {
            Some(full) => full,
            None => return Ok(token), // waiting on more chunks
        };

        if reported.is_empty() {
            token.streams.push(crate::diagnostic::DiagnosticEntry::new(
                DiagnosticCode::NoCalibrationDataReported,
            ));
            return Err(Error::NoCalibrationDataReported);
        }

        let cps = (reported.chars().count() as f64) / data_entry_span_secs.max(f64::EPSILON);
        token.extended.min_chars_per_second = Some(
            token
                .extended
                .min_chars_per_second
                .map_or(cps, |prev| prev.min(cps)),
        );

        match token.probe_kind {
            ProbeKind::Baseline => Self::process_baseline(&mut token, &reported, config)?,
            ProbeKind::DeadKey(indicator) => Self::process_dead_key_probe(&mut token, indicator, &reported)?,
        }

        if token.remaining == 0 {
            Self::finalize(&mut token, caps_lock, platform);
        } else {
            Self::emit_next_dead_key_probe(&mut token, config);
        }

        Ok(token)
    }

    fn reassemble_small_barcode(token: &mut Token, reported: &str) -> Result<Option<String>> {
        let Some(count) = token.small_barcode_count else {
            return Ok(Some(reported.to_string()));
        };
        let index = token.small_barcode_index.unwrap_or(0);
        token
            .extended
            .pending_small_barcode_chunks
            .insert(index, reported.to_string());

        if token.extended.pending_small_barcode_chunks.len() < count {
            return Ok(None);
        }

        let mut whole = String::new();
        for i in 0..count {
            let chunk = token
                .extended
                .pending_small_barcode_chunks
                .get(&i)
                .ok_or_else(|| Error::CalibrationFailed("missing small-barcode chunk".into()))?;
            whole.push_str(chunk);
        }
        token.extended.pending_small_barcode_chunks.clear();
        Ok(Some(whole))
    }

    fn process_baseline(token: &mut Token, reported: &str, config: &Config) -> Result<()> {
        let layout = BaselineLayout::new(token.extended.delimiter, token.extended.include_eot);
        let delimiter = match segments::locate_delimiter(reported, &layout) {
            Ok(d) => d,
            Err(e) => {
                token
                    .streams
                    .push(crate::diagnostic::DiagnosticEntry::new(DiagnosticCode::NoDelimiters));
                return Err(e);
            }
        };
        token.keyboard_match = Some(delimiter == token.extended.delimiter);
        token.extended.delimiter = delimiter;

        let segmented = segments::split(reported, &layout, config)?;
        if segmented.partial {
            token
                .streams
                .push(crate::diagnostic::DiagnosticEntry::new(
                    DiagnosticCode::PartialCalibrationDataReported,
                ));
        }

        token.prefix = Some(segmented.prefix.clone());
        token.suffix = Some(segmented.suffix.clone());
        token.data.prefix = segmented.prefix.clone();
        token.data.suffix = segmented.suffix.clone();
        if !segmented.prefix.is_empty() {
            token
                .streams
                .push(crate::diagnostic::DiagnosticEntry::new(DiagnosticCode::DetectedPrefix));
        }
        if !segmented.suffix.is_empty() {
            token
                .streams
                .push(crate::diagnostic::DiagnosticEntry::new(DiagnosticCode::DetectedSuffix));
        }
        if !segmented.eol.is_empty() {
            token
                .streams
                .push(crate::diagnostic::DiagnosticEntry::new(
                    DiagnosticCode::DetectedEndOfLine,
                ));
        }

        token.data.aim_flag_character_sequence = segmented.aim_reported.clone();
        if segmented.aim_reported == crate::payload::AIM_IDENTIFIER_PREFIX {
            token
                .streams
                .push(crate::diagnostic::DiagnosticEntry::new(
                    DiagnosticCode::DetectedAimIdentifierPrefix,
                ));
        }

        let mut reverse: BTreeMap<char, Vec<char>> = BTreeMap::new();
        let invariants = invariant_sequence();
        let additional = crate::char_cat::additional_ascii_characters();

        let invariants_corresponded = Self::align_segment(token, &segmented.invariant_tokens, &invariants, &mut reverse);
        let additional_corresponded =
            Self::align_segment(token, &segmented.additional_ascii_tokens, &additional, &mut reverse);
        token.extended.invariants_correspond = invariants_corresponded;
        token.extended.non_invariants_correspond = additional_corresponded;

        if !token.data.scanner_dead_keys_map.is_empty() {
            token
                .streams
                .push(crate::diagnostic::DiagnosticEntry::new(DiagnosticCode::DetectedScannerDeadKey));
        }
        if !token.data.ligature_map.is_empty() {
            token
                .streams
                .push(crate::diagnostic::DiagnosticEntry::new(DiagnosticCode::DetectedLigature));
        }

        Self::detect_ambiguities(token, &reverse, &segmented.aim_reported);
        Self::detect_case_anomalies(token, &invariants);
        Self::check_separators(token, &segmented, &reverse);
        Self::detect_line_feed_character(token, &segmented);

        let script_samples: Vec<char> = segmented
            .invariant_tokens
            .iter()
            .filter(|t| t.chars().count() == 1)
            .filter_map(|t| t.chars().next())
            .collect();
        if let Some(resolved) = script::resolve(script_samples.iter()) {
            token.data.keyboard_script = resolved.name().to_string();
            token
                .streams
                .push(crate::diagnostic::DiagnosticEntry::new(
                    DiagnosticCode::DetectedKeyboardScript,
                ));
        }
        token
            .streams
            .push(crate::diagnostic::DiagnosticEntry::new(DiagnosticCode::DetectedPlatform));

        token.data.recompute_reported_characters();

        let mut queued: Vec<char> = token.extended.dead_key_queue.iter().copied().collect();
        queued.sort_unstable();
        queued.dedup();
        token.extended.dead_key_queue = queued.into_iter().collect();
        token.remaining = token.extended.dead_key_queue.len();
        Ok(())
    }

    /// Aligns one probe segment's reported tokens against its canonical
    /// expected sequence, populating `CharacterMap`/`DeadKeysMap`/
    /// `LigatureMap`/`ScannerUnassignedKeys`/`ScannerDeadKeysMap` and
    /// collecting the reverse (reported -> expected) mapping used for
    /// ambiguity detection. Returns whether every slot in this segment
    /// matched its expected character (used to derive
    /// `keyboard_layouts_correspond_for_*` independently per segment).
    ///
    /// Empty reported string, 0 chars means the token never arrived at all;
    /// a genuinely absent trailing slot (reported_tokens shorter than
    /// expected, spec §4.1.2 step 5 "slot is absent") is treated the same
    /// way rather than silently dropped from alignment.
    fn align_segment(
        token: &mut Token,
        reported_tokens: &[String],
        expected: &[char],
        reverse: &mut BTreeMap<char, Vec<char>>,
    ) -> bool {
        static EMPTY: String = String::new();
        let mut corresponds = true;
        // Tracks the expected char of the immediately preceding slot when
        // it reported nothing, so a following 2-char slot can be recognised
        // as a scanner-side dead-key merger rather than a host dead key
        // (spec §4.1.2 step 5: "merger pattern... two expected characters
        // producing one reported one"). This crate's reading of that
        // under-specified rule: the merger is a *scanner* dead key,
        // distinct from a *host* dead key, exactly when it immediately
        // follows a slot the scanner itself swallowed outright.
        let mut pending_swallowed: Option<char> = None;

        for i in 0..expected.len() {
            let expected_char = expected[i];
            let reported_tok = reported_tokens.get(i).unwrap_or(&EMPTY);
            match reported_tok.chars().count() {
                0 => {
                    token.data.scanner_unassigned_keys.push(expected_char);
                    pending_swallowed = Some(expected_char);
                    corresponds = false;
                }
                1 => {
                    let reported_char = reported_tok.chars().next().unwrap();
                    if reported_char != expected_char {
                        token.data.character_map.insert(reported_char, expected_char);
                        reverse.entry(reported_char).or_default().push(expected_char);
                        log::debug!("calibration: {reported_char:?} reported for expected {expected_char:?}");
                        corresponds = false;
                    }
                    pending_swallowed = None;
                }
                2 if pending_swallowed.is_some() => {
                    let swallowed = pending_swallowed.take().unwrap();
                    let mut chars = reported_tok.chars();
                    let leaked = chars.next().unwrap();
                    let follower = chars.next().unwrap();
                    token.data.scanner_dead_keys_map.insert(leaked, swallowed);
                    log::debug!("calibration: scanner dead key {leaked:?} swallowed {swallowed:?}");
                    if follower != expected_char {
                        token.data.character_map.insert(follower, expected_char);
                        reverse.entry(follower).or_default().push(expected_char);
                    }
                    corresponds = false;
                }
                2 => {
                    // Dead-key candidate (spec §9 "prefer dead-key detection first").
                    let mut chars = reported_tok.chars();
                    let indicator = chars.next().unwrap();
                    let follower = chars.next().unwrap();
                    let key: String = [indicator, follower].into_iter().collect();
                    token.data.dead_keys_map.insert(key.clone(), expected_char.to_string());
                    reverse.entry(indicator).or_default().push(expected_char);
                    corresponds = false;
                    if !token.extended.probed_dead_keys.contains(&indicator)
                        && !token.extended.dead_key_queue.contains(&indicator)
                    {
                        token.extended.dead_key_queue.push_back(indicator);
                        token
                            .streams
                            .push(crate::diagnostic::DiagnosticEntry::new(DiagnosticCode::DetectedDeadKey));
                        log::debug!("calibration: discovered host dead key {indicator:?}");
                    }
                }
                _ => {
                    // Ligature: more keystrokes reported than expected, not a dead key.
                    token.data.ligature_map.insert(reported_tok.clone(), expected_char);
                    log::debug!("calibration: ligature {reported_tok:?} -> {expected_char:?}");
                    pending_swallowed = None;
                    corresponds = false;
                }
            }
        }
        corresponds
    }

    fn detect_ambiguities(token: &mut Token, reverse: &BTreeMap<char, Vec<char>>, aim_reported: &str) {
        for (&reported_char, expected_chars) in reverse {
            if expected_chars.len() <= 1 {
                continue;
            }
            let both_invariant = expected_chars.iter().all(|c| char_cat::is_invariant(*c));
            if both_invariant {
                token
                    .capabilities
                    .invariant_gs1_ambiguities
                    .insert(reported_char, expected_chars.clone());
                token
                    .streams
                    .push(crate::diagnostic::DiagnosticEntry::new(DiagnosticCode::InvariantGs1Ambiguities));
            } else {
                token
                    .capabilities
                    .non_invariant_ambiguities
                    .insert(reported_char, expected_chars.clone());
                token
                    .streams
                    .push(crate::diagnostic::DiagnosticEntry::new(DiagnosticCode::NonInvariantAmbiguities));
            }
            token
                .streams
                .push(crate::diagnostic::DiagnosticEntry::new(DiagnosticCode::MultipleKeys));

            if aim_reported.contains(reported_char) {
                token
                    .streams
                    .push(crate::diagnostic::DiagnosticEntry::new(
                        DiagnosticCode::MultipleKeysAimFlagCharacter,
                    ));
            }
        }
    }

    fn detect_case_anomalies(token: &mut Token, invariants: &[char]) {
        // Invariant layout is digits(10) + upper(26) + lower(26) + punctuation(20).
        let upper_start = 10;
        let lower_start = 36;
        let mut inverted = 0usize;
        let mut to_upper = 0usize;
        let mut to_lower = 0usize;
        let mut total = 0usize;

        for i in 0..26 {
            let upper = invariants[upper_start + i];
            let lower = invariants[lower_start + i];
            total += 1;

            // `character_map` is keyed by *reported* char; we need the reverse
            // question ("what did the host report for this expected char?"),
            // which we get by scanning `character_map` for values.
            let reported_char_for_upper = token
                .data
                .character_map
                .iter()
                .find(|(_, &v)| v == upper)
                .map(|(&k, _)| k);
            let reported_char_for_lower = token
                .data
                .character_map
                .iter()
                .find(|(_, &v)| v == lower)
                .map(|(&k, _)| k);

            if reported_char_for_upper == Some(lower) && reported_char_for_lower == Some(upper) {
                inverted += 1;
            } else if reported_char_for_lower == Some(upper) && reported_char_for_upper.is_none() {
                to_upper += 1;
            } else if reported_char_for_upper == Some(lower) && reported_char_for_lower.is_none() {
                to_lower += 1;
            }
        }

        if total > 0 && inverted == total {
            token
                .streams
                .push(crate::diagnostic::DiagnosticEntry::new(DiagnosticCode::ScannerMayInvertCase));
        } else if total > 0 && to_upper == total {
            token
                .streams
                .push(crate::diagnostic::DiagnosticEntry::new(
                    DiagnosticCode::ScannerMayConvertToUpperCase,
                ));
        } else if total > 0 && to_lower == total {
            token
                .streams
                .push(crate::diagnostic::DiagnosticEntry::new(
                    DiagnosticCode::ScannerMayConvertToLowerCase,
                ));
        }
    }

    fn check_separators(token: &mut Token, segmented: &SegmentedBaseline, reverse: &BTreeMap<char, Vec<char>>) {
        let flank = invariant_sequence()[0];
        let probes = [
            (&segmented.gs_probe, crate::payload::ASCII_GROUP_SEPARATOR),
            (&segmented.fs_probe, crate::payload::ASCII_FILE_SEPARATOR),
            (&segmented.rs_probe, crate::payload::ASCII_RECORD_SEPARATOR),
            (&segmented.us_probe, crate::payload::ASCII_UNIT_SEPARATOR),
        ];
        let mut any_unrepresentable = false;
        for (probe, sep) in probes {
            let representable = probe
                .as_ref()
                .map(|p| p.chars().eq([flank, sep, flank]))
                .unwrap_or(false);
            if !representable {
                any_unrepresentable = true;
            }
        }
        if any_unrepresentable {
            let code = match token.extended.assumption {
                Assumption::NoCalibration => DiagnosticCode::HiddenCharactersNotReportedCorrectlyNoCalibration,
                _ => DiagnosticCode::HiddenCharactersNotReportedCorrectly,
            };
            token
                .streams
                .push(crate::diagnostic::DiagnosticEntry::with_detail(
                    code,
                    "one or more GS1/EDI separator probes did not round-trip",
                ));
        }

        // EOT is optional (spec §4.1.1 item 8, gated on config) and tracked
        // by its own capability field, so it gets its own diagnostic rather
        // than folding into the GS1/EDI block above.
        if let Some(eot_probe) = &segmented.eot_probe {
            let representable = eot_probe
                .chars()
                .eq([flank, crate::payload::ASCII_END_OF_TRANSMISSION, flank]);
            if !representable {
                token.streams.push(crate::diagnostic::DiagnosticEntry::new(
                    DiagnosticCode::EndOfTransmissionNotRepresented,
                ));
            }
        }

        // spec §4.1.2 step 6: an ambiguity on a GS1 separator, an EDI
        // separator, or EOT is its own diagnostic, distinct from outright
        // unrepresentability above — it fires when the character the host
        // reports for the separator is the same one already claimed by a
        // different expected invariant in this baseline.
        let ambiguity_probes = [
            (&segmented.gs_probe, DiagnosticCode::GroupSeparatorAmbiguous),
            (&segmented.fs_probe, DiagnosticCode::FileSeparatorAmbiguous),
            (&segmented.rs_probe, DiagnosticCode::RecordSeparatorAmbiguous),
            (&segmented.eot_probe, DiagnosticCode::EndOfTransmissionAmbiguous),
        ];
        for (probe, code) in ambiguity_probes {
            if let Some(middle) = probe.as_deref().and_then(flanked_middle_char) {
                if reverse.contains_key(&middle) {
                    token.streams.push(crate::diagnostic::DiagnosticEntry::new(code));
                }
            }
        }
    }

    /// Records which reported character, if any, stands in for LF in this
    /// host's line ending (spec §3 `LineFeedCharacter`: "reported char that
    /// maps to LF when discovered"). The literal CR/LF run is trimmed off
    /// into `segmented.eol` during segmentation (spec §4.1.2 step 2), so
    /// its presence means the host reported LF unremapped. Only when no
    /// literal CR/LF was found *and* exactly one character trails the
    /// suffix sentinel do we record that character as standing in for the
    /// scanner's own Enter/LF keystroke under this layout.
    fn detect_line_feed_character(token: &mut Token, segmented: &SegmentedBaseline) {
        if !segmented.eol.is_empty() {
            return;
        }
        let mut suffix_chars = segmented.suffix.chars();
        if let (Some(c), None) = (suffix_chars.next(), suffix_chars.next()) {
            token.data.line_feed_character = Some(c);
            token
                .streams
                .push(crate::diagnostic::DiagnosticEntry::new(
                    DiagnosticCode::DetectedLineFeedCharacter,
                ));
        }
    }

    fn emit_next_dead_key_probe(token: &mut Token, config: &Config) {
        if let Some(&indicator) = token.extended.dead_key_queue.front() {
            token.payload = crate::payload::dead_key_probe_payload(indicator, token.extended.delimiter);
            token.probe_kind = ProbeKind::DeadKey(indicator);
            let _ = config;
        }
    }

    fn process_dead_key_probe(token: &mut Token, indicator: char, reported: &str) -> Result<()> {
        let invariants = invariant_sequence();
        let slots: Vec<&str> = reported.split(token.extended.delimiter).collect();

        for (slot, &expected) in slots.iter().zip(invariants.iter()) {
            let resolved = if let Some(rest) = slot.strip_prefix(indicator) {
                if rest.chars().count() == 1 {
                    rest.chars().next()
                } else if rest == indicator.to_string() {
                    Some(indicator) // repeated-indicator quirk (spec §4.1.3 case c)
                } else {
                    None
                }
            } else if slot.chars().count() == 1 {
                slot.chars().next() // already-precomposed single character
            } else {
                None
            };

            match resolved {
                Some(resolved_char) => {
                    let key: String = [indicator, resolved_char].into_iter().collect();
                    if let Some(existing) = token.data.dead_key_character_map.get(&key) {
                        if *existing != expected {
                            token
                                .streams
                                .push(crate::diagnostic::DiagnosticEntry::new(DiagnosticCode::DeadKeyMultiMapping));
                            continue;
                        }
                    }
                    token.data.dead_key_character_map.insert(key.clone(), expected);
                    token.data.dead_keys_map.insert(key, expected.to_string());
                }
                None => {
                    token
                        .streams
                        .push(crate::diagnostic::DiagnosticEntry::new(
                            DiagnosticCode::SomeDeadKeyCombinationsUnrecognisedForInvariants,
                        ));
                }
            }
        }

        token.extended.dead_key_queue.pop_front();
        token.extended.probed_dead_keys.push(indicator);
        token.remaining = token.extended.dead_key_queue.len();
        token.data.recompute_reported_characters();
        Ok(())
    }

    fn finalize(token: &mut Token, caps_lock: Option<bool>, platform: Platform) {
        let _ = platform;
        if let Some(cps) = token.extended.min_chars_per_second {
            token.data.scanner_characters_per_second = cps;
            token.data.scanner_keyboard_performance = Some(ScannerKeyboardPerformance::from_chars_per_second(cps));
        }

        let resolved_script = crate::script::Script::from_name(&token.data.keyboard_script);
        token.capabilities = SystemCapabilities::derive(
            &token.streams,
            token.extended.invariants_correspond,
            token.extended.non_invariants_correspond,
            caps_lock,
            resolved_script,
        );
        if token.capabilities.can_read_invariants_reliably.is_none() {
            token.capabilities.can_read_invariants_reliably = Some(!token.streams.has_errors());
        }
        if token.capabilities.can_read_non_invariants_reliably.is_none() {
            token.capabilities.can_read_non_invariants_reliably = Some(!token.streams.has_errors());
        }
    }

    pub fn system_capabilities(token: &Token, caps_lock: Option<bool>) -> SystemCapabilities {
        let mut caps = token.capabilities.clone();
        if let Some(cl) = caps_lock {
            caps.merge_caps_lock(cl);
        }
        caps
    }
}
