//! SystemCapabilities: a purely derived read model over the three
//! diagnostic streams (spec §3, §4.2).
//!
//! Every flag is three-valued (`Option<bool>`) rather than collapsed to
//! `bool`: spec §9's design note is explicit that "unknown" must never be
//! conflated with "false", because [`crate::advice::AdviceReasoner`] rules
//! distinguish them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::diagnostic::{DiagnosticCode, DiagnosticStreams};
use crate::script::Script;

/// Triple-valued capability flag. `None` means "unknown", never "false".
pub type Tri = Option<bool>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemCapabilities {
    pub can_read_invariants_reliably: Tri,
    pub can_read_non_invariants_reliably: Tri,
    pub can_read_format_05_reliably: Tri,
    pub can_read_format_06_reliably: Tri,
    pub can_read_aim_identifier: Tri,
    pub keyboard_layouts_correspond_for_invariants: Tri,
    pub keyboard_layouts_correspond_for_non_invariants: Tri,
    pub keyboard_layouts_can_represent_group_separator: Tri,
    pub keyboard_layouts_can_represent_file_separator: Tri,
    pub keyboard_layouts_can_represent_record_separator: Tri,
    pub keyboard_layouts_can_represent_unit_separator: Tri,
    pub keyboard_layouts_can_represent_end_of_transmission: Tri,

    pub scanner_may_invert_case: Tri,
    pub scanner_may_convert_to_upper_case: Tri,
    pub scanner_may_convert_to_lower_case: Tri,
    pub scanner_may_compensate_for_caps_lock: Tri,
    pub caps_lock_probably_on: Tri,
    /// The one field a host may mutate post-derivation, via
    /// [`SystemCapabilities::merge_caps_lock`] (spec §3).
    pub caps_lock: Tri,
    pub keyboard_script_does_not_support_case: Tri,

    pub scanner_transmits_aim_identifier: Tri,
    pub scanner_dead_keys_detected: Tri,

    pub aim_identifier_ambiguous: Tri,
    pub group_separator_ambiguous: Tri,
    pub file_separator_ambiguous: Tri,
    pub record_separator_ambiguous: Tri,
    pub end_of_transmission_ambiguous: Tri,
    pub invariant_gs1_ambiguities_present: Tri,
    pub non_invariant_ambiguities_present: Tri,

    pub prefix_detected: Tri,
    pub suffix_detected: Tri,

    pub no_data_reported: Tri,
    pub partial_data_reported: Tri,
    pub dead_key_sequence_error: Tri,
    pub test_failed: Tri,

    pub keyboard_script: Option<String>,
    pub scanner_keyboard_performance: Option<crate::data::ScannerKeyboardPerformance>,

    pub invariant_gs1_ambiguities: BTreeMap<char, Vec<char>>,
    pub non_invariant_ambiguities: BTreeMap<char, Vec<char>>,
}

/// Diagnostic code groups reset to `None` (unknown), not `false`, when a
/// truly fatal "no useful data at all" error is present (spec §4.2: "a
/// partial report does not prove incorrectness, only ignorance").
const FATAL_NO_DATA_CODES: &[DiagnosticCode] = &[
    DiagnosticCode::NoCalibrationDataReported,
    DiagnosticCode::NoDelimiters,
    DiagnosticCode::NoTemporaryDelimiterCandidate,
    DiagnosticCode::CalibrationFailed,
    DiagnosticCode::CalibrationFailedUnexpectedly,
];

impl SystemCapabilities {
    /// Builds a capability record from the engine's diagnostic streams,
    /// the per-segment correspondence facts the engine observed while
    /// aligning the baseline probe, the host-supplied CapsLock state (late,
    /// out-of-band ground truth), and the resolved keyboard script. Steps
    /// follow spec §4.2 in order.
    ///
    /// `invariants_correspond`/`non_invariants_correspond` are set as plain
    /// facts first; the fatal-error reset and CapsLock case-mangling steps
    /// below may still null them back out to "unknown" — they run last so
    /// they always have the final word, the same way they already override
    /// any `apply_code` result.
    pub fn derive(
        streams: &DiagnosticStreams,
        invariants_correspond: bool,
        non_invariants_correspond: bool,
        caps_lock: Tri,
        keyboard_script: Option<Script>,
    ) -> Self {
        let mut caps = SystemCapabilities {
            keyboard_script: keyboard_script.map(|s| s.name().to_string()),
            keyboard_layouts_correspond_for_invariants: Some(invariants_correspond),
            keyboard_layouts_correspond_for_non_invariants: Some(non_invariants_correspond),
            ..Default::default()
        };

        for entry in streams.all() {
            apply_code(&mut caps, entry.code);
        }
        caps.resolve_aim_identifier_reliability();

        let fatal_no_data = streams
            .error
            .iter()
            .any(|e| FATAL_NO_DATA_CODES.contains(&e.code));
        if fatal_no_data {
            reset_broad_groups_to_unknown(&mut caps);
        }

        caps.caps_lock = caps_lock;
        caps.apply_caps_lock_normalisation();
        caps.resolve_script_case_support(keyboard_script);
        caps
    }

    /// Re-runs the CapsLock-dependent normalisation steps (spec §4.2 steps
    /// 1-2) after the host supplies CapsLock ground truth late.
    pub fn merge_caps_lock(&mut self, caps_lock: bool) {
        self.caps_lock = Some(caps_lock);
        self.apply_caps_lock_normalisation();
    }

    fn apply_caps_lock_normalisation(&mut self) {
        // Step 1: with CapsLock on, upper<->lower conversion inverts.
        if self.caps_lock == Some(true) {
            std::mem::swap(
                &mut self.scanner_may_convert_to_upper_case,
                &mut self.scanner_may_convert_to_lower_case,
            );
        }

        // CapsLock being on only explains away inverted case if the scanner
        // itself isn't already reporting inverted case independently of it;
        // the two causes are not both benign at once.
        self.scanner_may_compensate_for_caps_lock = match self.caps_lock {
            Some(true) => Some(self.scanner_may_invert_case != Some(true)),
            Some(false) => Some(false),
            None => None,
        };

        // Step 2: either case-conversion flag set makes correspondence
        // undeterminable.
        let case_mangled = self.scanner_may_convert_to_upper_case == Some(true)
            || self.scanner_may_convert_to_lower_case == Some(true)
            || self.scanner_may_invert_case == Some(true);
        if case_mangled {
            self.keyboard_layouts_correspond_for_invariants = None;
            self.keyboard_layouts_correspond_for_non_invariants = None;

            // Without host-supplied ground truth, case mangling is the best
            // signal that CapsLock itself is the cause (spec §4.3 scenario
            // 4: capsLock=null still yields a Medium `CapsLockProbablyOn`).
            if self.caps_lock.is_none() {
                self.caps_lock_probably_on = Some(true);
            }
        }
    }

    fn resolve_script_case_support(&mut self, script: Option<Script>) {
        // Step 3: resolve against the closed list of case-supporting
        // scripts (spec §4.2 step 3).
        self.keyboard_script_does_not_support_case =
            script.map(|s| !s.supports_case());
    }

    /// Only meaningful once the scanner is known to transmit an AIM
    /// identifier at all; an ambiguous AIM flag character is the one thing
    /// that makes reading it unreliable (spec §4.1.2 step 6).
    fn resolve_aim_identifier_reliability(&mut self) {
        if self.scanner_transmits_aim_identifier == Some(true) {
            self.can_read_aim_identifier = Some(self.aim_identifier_ambiguous != Some(true));
        }
    }
}

fn reset_broad_groups_to_unknown(caps: &mut SystemCapabilities) {
    caps.can_read_invariants_reliably = None;
    caps.can_read_non_invariants_reliably = None;
    caps.can_read_format_05_reliably = None;
    caps.can_read_format_06_reliably = None;
    caps.can_read_aim_identifier = None;
    caps.keyboard_layouts_correspond_for_invariants = None;
    caps.keyboard_layouts_correspond_for_non_invariants = None;
    caps.keyboard_layouts_can_represent_group_separator = None;
    caps.keyboard_layouts_can_represent_file_separator = None;
    caps.keyboard_layouts_can_represent_record_separator = None;
    caps.keyboard_layouts_can_represent_unit_separator = None;
    caps.keyboard_layouts_can_represent_end_of_transmission = None;
}

/// The deterministic diagnostic-code -> capability-field table (spec §4.2:
/// "one diagnostic -> at most one field; many-to-one is allowed").
fn apply_code(caps: &mut SystemCapabilities, code: DiagnosticCode) {
    use DiagnosticCode::*;
    match code {
        DetectedPrefix => caps.prefix_detected = Some(true),
        DetectedSuffix => caps.suffix_detected = Some(true),
        ScannerMayInvertCase => caps.scanner_may_invert_case = Some(true),
        ScannerMayConvertToUpperCase => caps.scanner_may_convert_to_upper_case = Some(true),
        ScannerMayConvertToLowerCase => caps.scanner_may_convert_to_lower_case = Some(true),
        CapsLockProbablyOn => caps.caps_lock_probably_on = Some(true),
        DetectedDeadKey | DetectedScannerDeadKey => caps.scanner_dead_keys_detected = Some(true),
        ScannerKeyboardPerformanceMeasured => {}
        DetectedAimIdentifierPrefix => caps.scanner_transmits_aim_identifier = Some(true),

        PartialCalibrationDataReported => {
            caps.partial_data_reported = Some(true);
            caps.keyboard_layouts_correspond_for_invariants = None;
            caps.keyboard_layouts_correspond_for_non_invariants = None;
        }
        IncorrectCalibrationDataReported => caps.partial_data_reported = Some(true),
        SomeDeadKeyCombinationsUnrecognisedForInvariants => {
            caps.dead_key_sequence_error = Some(true)
        }
        NonInvariantAmbiguities => caps.non_invariant_ambiguities_present = Some(true),
        MultipleKeysAimFlagCharacter => caps.aim_identifier_ambiguous = Some(true),
        ScannerMayNotTransmitAim => caps.scanner_transmits_aim_identifier = Some(false),
        ScannerUnassignedKeysPresent => {}
        PreProcessorWarning => {}
        GroupSeparatorAmbiguous => caps.group_separator_ambiguous = Some(true),
        FileSeparatorAmbiguous => caps.file_separator_ambiguous = Some(true),
        RecordSeparatorAmbiguous => caps.record_separator_ambiguous = Some(true),
        EndOfTransmissionAmbiguous => caps.end_of_transmission_ambiguous = Some(true),
        EndOfTransmissionNotRepresented => caps.keyboard_layouts_can_represent_end_of_transmission = Some(false),

        NoCalibrationDataReported => {
            caps.no_data_reported = Some(true);
            caps.can_read_invariants_reliably = Some(false);
        }
        NoDelimiters | NoTemporaryDelimiterCandidate | CalibrationFailed
        | CalibrationFailedUnexpectedly => {
            caps.test_failed = Some(true);
        }
        DeadKeyMultiMapping => {
            caps.dead_key_sequence_error = Some(true);
            caps.can_read_invariants_reliably = Some(false);
        }
        InvariantGs1Ambiguities => {
            caps.invariant_gs1_ambiguities_present = Some(true);
            caps.can_read_invariants_reliably = Some(false);
        }
        MultipleKeys => {
            caps.non_invariant_ambiguities_present = Some(true);
            caps.can_read_invariants_reliably = Some(false);
        }
        HiddenCharactersNotReportedCorrectly
        | HiddenCharactersNotReportedCorrectlyNoCalibration => {
            caps.can_read_format_05_reliably = Some(false);
            caps.can_read_format_06_reliably = Some(false);
            caps.keyboard_layouts_can_represent_group_separator = Some(false);
            caps.keyboard_layouts_can_represent_file_separator = Some(false);
            caps.keyboard_layouts_can_represent_record_separator = Some(false);
            caps.keyboard_layouts_can_represent_unit_separator = Some(false);
        }
        CapsLockOn => caps.caps_lock = Some(true),
        PreProcessorError => {}
        NoCalibrationTokenProvided => caps.test_failed = Some(true),

        DetectedEndOfLine | DetectedKeyboardScript | DetectedPlatform | DetectedLineFeedCharacter
        | DetectedLigature => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticEntry;

    #[test]
    fn caps_lock_true_flips_case_conversion_meaning() {
        let mut streams = DiagnosticStreams::default();
        streams.push(DiagnosticEntry::new(DiagnosticCode::ScannerMayConvertToUpperCase));
        let caps = SystemCapabilities::derive(&streams, true, true, Some(true), Some(Script::Latin));
        assert_eq!(caps.scanner_may_convert_to_lower_case, Some(true));
        assert_eq!(caps.scanner_may_convert_to_upper_case, None);
    }

    #[test]
    fn case_mangling_nulls_correspondence() {
        let mut streams = DiagnosticStreams::default();
        streams.push(DiagnosticEntry::new(DiagnosticCode::ScannerMayInvertCase));
        let caps = SystemCapabilities::derive(&streams, true, true, None, Some(Script::Latin));
        assert_eq!(caps.keyboard_layouts_correspond_for_invariants, None);
        assert_eq!(caps.keyboard_layouts_correspond_for_non_invariants, None);
    }

    #[test]
    fn clean_correspondence_survives_when_nothing_mangles_it() {
        let streams = DiagnosticStreams::default();
        let caps = SystemCapabilities::derive(&streams, true, true, Some(false), Some(Script::Latin));
        assert_eq!(caps.keyboard_layouts_correspond_for_invariants, Some(true));
        assert_eq!(caps.keyboard_layouts_correspond_for_non_invariants, Some(true));

        let caps = SystemCapabilities::derive(&streams, false, true, Some(false), Some(Script::Latin));
        assert_eq!(caps.keyboard_layouts_correspond_for_invariants, Some(false));
        assert_eq!(caps.keyboard_layouts_correspond_for_non_invariants, Some(true));
    }

    #[test]
    fn fatal_error_resets_broad_groups_to_unknown_not_false() {
        let mut streams = DiagnosticStreams::default();
        streams.push(DiagnosticEntry::new(DiagnosticCode::NoDelimiters));
        let caps = SystemCapabilities::derive(&streams, true, true, None, None);
        assert_eq!(caps.can_read_invariants_reliably, None);
        assert_ne!(caps.can_read_invariants_reliably, Some(false));
        assert_eq!(caps.keyboard_layouts_correspond_for_invariants, None);
    }

    #[test]
    fn script_closed_list_resolves_case_support() {
        let streams = DiagnosticStreams::default();
        let caps = SystemCapabilities::derive(&streams, true, true, None, Some(Script::Other));
        assert_eq!(caps.keyboard_script_does_not_support_case, Some(true));
        let caps = SystemCapabilities::derive(&streams, true, true, None, Some(Script::Greek));
        assert_eq!(caps.keyboard_script_does_not_support_case, Some(false));
    }

    #[test]
    fn aim_identifier_reliability_tracks_its_own_ambiguity() {
        let mut streams = DiagnosticStreams::default();
        streams.push(DiagnosticEntry::new(DiagnosticCode::DetectedAimIdentifierPrefix));
        let caps = SystemCapabilities::derive(&streams, true, true, None, Some(Script::Latin));
        assert_eq!(caps.can_read_aim_identifier, Some(true));

        let mut streams = DiagnosticStreams::default();
        streams.push(DiagnosticEntry::new(DiagnosticCode::DetectedAimIdentifierPrefix));
        streams.push(DiagnosticEntry::new(DiagnosticCode::MultipleKeysAimFlagCharacter));
        let caps = SystemCapabilities::derive(&streams, true, true, None, Some(Script::Latin));
        assert_eq!(caps.can_read_aim_identifier, Some(false));

        // Never transmitted at all: stays unknown rather than collapsing
        // to either true or false.
        let streams = DiagnosticStreams::default();
        let caps = SystemCapabilities::derive(&streams, true, true, None, Some(Script::Latin));
        assert_eq!(caps.can_read_aim_identifier, None);
    }

    #[test]
    fn merge_caps_lock_is_idempotent_with_derive() {
        let mut streams = DiagnosticStreams::default();
        streams.push(DiagnosticEntry::new(DiagnosticCode::ScannerMayConvertToUpperCase));
        let mut caps = SystemCapabilities::derive(&streams, true, true, None, Some(Script::Latin));
        assert_eq!(caps.scanner_may_convert_to_upper_case, Some(true));
        caps.merge_caps_lock(true);
        assert_eq!(caps.scanner_may_convert_to_lower_case, Some(true));
    }
}
