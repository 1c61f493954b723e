//! AdviceReasoner: turns a [`SystemCapabilities`] record into an ordered,
//! de-duplicated list of severity-ranked [`AdviceItem`]s (spec §4.3).
//!
//! Three phases, each a pure, independently testable transform rather than
//! one imperative pass, per spec §9's design note:
//!   1. emit   — a decision cascade appends items to their severity bucket
//!   2. dedup  — six named cross-bucket subsumption rewrites, in order
//!   3. order  — High-first-or-Low-first selection, with Low annotation

use crate::capabilities::SystemCapabilities;
use crate::data::ScannerKeyboardPerformance;
use crate::platform::Assumption;

macro_rules! advice_codes {
    ($( $variant:ident = $value:expr ),+ $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[repr(u16)]
        pub enum AdviceCode {
            $( $variant = $value ),+
        }

        impl AdviceCode {
            pub fn code(self) -> u16 {
                self as u16
            }

            pub fn name(self) -> &'static str {
                match self {
                    $( AdviceCode::$variant => stringify!($variant) ),+
                }
            }
        }
    };
}

advice_codes! {
    // --- 100-199: Low (positive outcomes) -------------------------------
    ReadsInvariantCharactersReliably = 101,
    ReadsAdditionalAsciiReliably = 102,
    ReadsFormat0506Reliably = 103,
    TransmitsAimIdentifier = 104,
    KeyboardLayoutsCorrespond = 105,
    ReadsGs1SeparatorsReliably = 106,
    Format0506LimitationNoted = 107,

    // --- 200-299: Medium (structural warnings) ---------------------------
    MayNotReadAim = 201,
    MayNotReadFormat0506 = 202,
    MayNotReadInvariantCharacters = 203,
    MayNotReadNonInvariantCharacters = 204,
    CapsLockCompensation = 205,
    PrefixDetected = 206,
    SuffixDetected = 207,
    Gs1OnlyTestWasRun = 208,
    CapsLockProbablyOnAdvice = 209,
    TestFailed = 210,
    MayNotReadGs1Separators = 211,
    ScannerPerformanceLow = 212,

    // --- 300+: High (fatal reading problems) -----------------------------
    CannotReadBarcodesReliably = 301,
    CannotReadInvariantsReliably = 302,
    CannotReadNonInvariantsReliably = 303,
    CannotReadAim = 304,
    CannotReadAimNoCalibration = 305,
    CannotReadFormat0506 = 306,
    Format0506HiddenCharactersWrong = 307,
    MultipleKeys = 308,
    ScannerMayInvertCaseAdvice = 309,
    ScannerMayConvertToUpperCaseAdvice = 310,
    ScannerMayConvertToLowerCaseAdvice = 311,
    CapsLockOn = 312,
    NoDataReported = 313,
    PartialDataReported = 314,
    DeadKeySequenceError = 315,
    HiddenCharactersNotReportedCorrectly = 316,
    HiddenCharactersNotReportedCorrectlyNoCalibration = 317,
    NotTransmittingAim = 318,
    CannotDetermineKeyboardScript = 319,
    CapsLockOnPreservationMacintosh = 320,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl AdviceCode {
    /// Severity is derived from the code's numeric bucket alone: 100-199
    /// Low, 200-299 Medium, 300+ High (spec §3).
    pub fn severity(self) -> Severity {
        match self.code() / 100 {
            1 => Severity::Low,
            2 => Severity::Medium,
            _ => Severity::High,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AdviceItem {
    pub advice_type: AdviceCode,
    pub condition: String,
    pub description: String,
    pub advice: Vec<String>,
    pub severity: Severity,
}

impl AdviceItem {
    fn new(code: AdviceCode, condition: impl Into<String>, description: impl Into<String>, advice: Vec<String>) -> Self {
        Self {
            advice_type: code,
            condition: condition.into(),
            description: description.into(),
            advice,
            severity: code.severity(),
        }
    }
}

#[derive(Default)]
struct Buckets {
    low: Vec<AdviceItem>,
    medium: Vec<AdviceItem>,
    high: Vec<AdviceItem>,
}

impl Buckets {
    fn push(&mut self, bucket_severity: Severity, item: AdviceItem) {
        let bucket = match bucket_severity {
            Severity::Low => &mut self.low,
            Severity::Medium => &mut self.medium,
            Severity::High => &mut self.high,
        };
        if !bucket.iter().any(|i| i.advice_type == item.advice_type) {
            bucket.push(item);
        }
    }
}

fn contains(bucket: &[AdviceItem], code: AdviceCode) -> bool {
    bucket.iter().any(|i| i.advice_type == code)
}

fn remove(bucket: &mut Vec<AdviceItem>, code: AdviceCode) {
    bucket.retain(|i| i.advice_type != code);
}

/// Emits severity-bucketed [`AdviceItem`]s from calibration capabilities
/// and returns them fully ordered per spec §4.3's three phases.
pub struct AdviceReasoner;

impl AdviceReasoner {
    pub fn generate(
        caps: &SystemCapabilities,
        assumption: Assumption,
        platform: crate::platform::Platform,
    ) -> Vec<AdviceItem> {
        let mut buckets = Self::emit(caps, assumption, platform);
        Self::deduplicate(&mut buckets);
        Self::order(buckets)
    }

    // ---- Phase 1: emit --------------------------------------------------

    fn emit(caps: &SystemCapabilities, assumption: Assumption, platform: crate::platform::Platform) -> Buckets {
        let mut b = Buckets::default();

        // Low: positive outcomes.
        if caps.can_read_invariants_reliably == Some(true) {
            b.push(
                Severity::Low,
                AdviceItem::new(
                    AdviceCode::ReadsInvariantCharactersReliably,
                    "invariant characters map onto the host layout",
                    "Barcodes containing only GS1 invariant characters will be read reliably.",
                    vec!["No action required for GS1 invariant-only symbologies.".into()],
                ),
            );
        }
        if caps.can_read_non_invariants_reliably == Some(true) {
            b.push(
                Severity::Low,
                AdviceItem::new(
                    AdviceCode::ReadsAdditionalAsciiReliably,
                    "additional ASCII characters map onto the host layout",
                    "Barcodes containing non-invariant printable ASCII will be read reliably.",
                    vec!["No action required.".into()],
                ),
            );
        }
        if caps.can_read_format_05_reliably == Some(true) && caps.can_read_format_06_reliably == Some(true) {
            b.push(
                Severity::Low,
                AdviceItem::new(
                    AdviceCode::ReadsFormat0506Reliably,
                    "ISO/IEC 15434 Format 05/06 envelopes decode correctly",
                    "Structured (EDI) data will be read reliably.",
                    vec!["No action required.".into()],
                ),
            );
        }
        if caps.scanner_transmits_aim_identifier == Some(true) && caps.can_read_aim_identifier != Some(false) {
            b.push(
                Severity::Low,
                AdviceItem::new(
                    AdviceCode::TransmitsAimIdentifier,
                    "scanner transmits a recognisable AIM identifier",
                    "The application can distinguish barcode symbologies by their AIM identifier.",
                    vec!["No action required.".into()],
                ),
            );
        }
        if caps.keyboard_layouts_correspond_for_invariants == Some(true)
            && caps.keyboard_layouts_correspond_for_non_invariants == Some(true)
        {
            b.push(
                Severity::Low,
                AdviceItem::new(
                    AdviceCode::KeyboardLayoutsCorrespond,
                    "scanner and host keyboard layouts correspond",
                    "No remapping is required: the scanner and host agree on every probed character.",
                    vec!["No action required.".into()],
                ),
            );
        }
        let gs1_separators_ok = [
            caps.keyboard_layouts_can_represent_group_separator,
            caps.keyboard_layouts_can_represent_file_separator,
            caps.keyboard_layouts_can_represent_record_separator,
            caps.keyboard_layouts_can_represent_unit_separator,
        ];
        if gs1_separators_ok.iter().all(|f| *f == Some(true)) {
            b.push(
                Severity::Low,
                AdviceItem::new(
                    AdviceCode::ReadsGs1SeparatorsReliably,
                    "all GS1/EDI separator characters are representable",
                    "Group, file, record, and unit separators will be read reliably.",
                    vec!["No action required.".into()],
                ),
            );
        }
        if caps.can_read_format_05_reliably == Some(false) || caps.can_read_format_06_reliably == Some(false) {
            b.push(
                Severity::Low,
                AdviceItem::new(
                    AdviceCode::Format0506LimitationNoted,
                    "Format 05/06 reliability is limited",
                    "Structured (EDI) data may not be read reliably under this layout.",
                    vec!["Avoid relying on ISO/IEC 15434 Format 05/06 payloads.".into()],
                ),
            );
        }

        // Medium: structural warnings.
        if caps.keyboard_layouts_can_represent_group_separator == Some(false) {
            // handled as High (HiddenCharactersNotReportedCorrectly) below;
            // no separate Medium item is needed once the fatal case fires.
        } else if gs1_separators_ok.iter().any(|f| *f == Some(false)) {
            b.push(
                Severity::Medium,
                AdviceItem::new(
                    AdviceCode::MayNotReadGs1Separators,
                    "one or more GS1/EDI separators may not be representable",
                    "Some structured-data payloads may not be read correctly.",
                    vec!["Test with the specific separators your payloads use.".into()],
                ),
            );
        }
        if caps.scanner_transmits_aim_identifier == Some(true)
            && (caps.aim_identifier_ambiguous == Some(true)
                || caps.keyboard_layouts_correspond_for_invariants == Some(false))
            && caps.can_read_aim_identifier != Some(false)
        {
            b.push(
                Severity::Medium,
                AdviceItem::new(
                    AdviceCode::MayNotReadAim,
                    "the AIM identifier may be misread under this layout",
                    "Symbology identification via the AIM flag may be unreliable.",
                    vec!["Verify symbology identification against a known-good sample.".into()],
                ),
            );
        }
        if caps.can_read_format_05_reliably == Some(false) && caps.can_read_format_06_reliably != Some(false) {
            b.push(
                Severity::Medium,
                AdviceItem::new(
                    AdviceCode::MayNotReadFormat0506,
                    "Format 05 may not be read reliably",
                    "Some structured (EDI) data may be misread.",
                    vec!["Test with representative Format 05 payloads.".into()],
                ),
            );
        }
        if caps.keyboard_layouts_correspond_for_invariants == Some(false)
            && caps.can_read_invariants_reliably != Some(false)
        {
            b.push(
                Severity::Medium,
                AdviceItem::new(
                    AdviceCode::MayNotReadInvariantCharacters,
                    "invariant characters require remapping",
                    "Invariant characters are readable only via the calibrated character map.",
                    vec!["Apply the calibrated character map at runtime.".into()],
                ),
            );
        }
        if caps.keyboard_layouts_correspond_for_non_invariants == Some(false)
            && caps.can_read_non_invariants_reliably != Some(false)
        {
            b.push(
                Severity::Medium,
                AdviceItem::new(
                    AdviceCode::MayNotReadNonInvariantCharacters,
                    "non-invariant ASCII characters require remapping",
                    "Additional ASCII characters are readable only via the calibrated character map.",
                    vec!["Apply the calibrated character map at runtime.".into()],
                ),
            );
        }
        if let Some(comp) = caps.scanner_may_compensate_for_caps_lock {
            if comp {
                b.push(
                    Severity::Medium,
                    AdviceItem::new(
                        AdviceCode::CapsLockCompensation,
                        "CapsLock is on but the scanner's own case reporting compensates for it",
                        "Text case should still come through as expected despite CapsLock being on.",
                        vec!["No corrective action required; CapsLock state is self-compensating here.".into()],
                    ),
                );
            }
        }
        if caps.prefix_detected == Some(true) {
            b.push(
                Severity::Medium,
                AdviceItem::new(
                    AdviceCode::PrefixDetected,
                    "the scanner adds a prefix before the payload",
                    "Reported text will contain scanner-added prefix noise.",
                    vec!["Strip the calibrated prefix before parsing payloads.".into()],
                ),
            );
        }
        if caps.suffix_detected == Some(true) {
            b.push(
                Severity::Medium,
                AdviceItem::new(
                    AdviceCode::SuffixDetected,
                    "the scanner adds a suffix after the payload",
                    "Reported text will contain scanner-added suffix noise.",
                    vec!["Strip the calibrated suffix before parsing payloads.".into()],
                ),
            );
        }
        if caps.keyboard_layouts_can_represent_group_separator == Some(true)
            && (caps.can_read_format_05_reliably != Some(true) || caps.can_read_format_06_reliably != Some(true))
        {
            b.push(
                Severity::Medium,
                AdviceItem::new(
                    AdviceCode::Gs1OnlyTestWasRun,
                    "only GS1 invariant-level calibration was exercised",
                    "Format 05/06 structured-data reliability was not fully established.",
                    vec!["Run a Format 05/06-specific calibration pass if EDI payloads are expected.".into()],
                ),
            );
        }
        if caps.caps_lock_probably_on == Some(true) && caps.caps_lock.is_none() {
            b.push(
                Severity::Medium,
                AdviceItem::new(
                    AdviceCode::CapsLockProbablyOnAdvice,
                    "reported letter case looks inverted, consistent with CapsLock being on",
                    "CapsLock may be on; host-reported state was not available to confirm.",
                    vec!["Ask the host to confirm CapsLock state and re-run calibration.".into()],
                ),
            );
        }
        if caps.test_failed == Some(true) {
            b.push(
                Severity::Medium,
                AdviceItem::new(
                    AdviceCode::TestFailed,
                    "calibration could not complete",
                    "The calibration session did not produce usable data.",
                    vec!["Restart the calibration session.".into()],
                ),
            );
        }
        if caps.scanner_keyboard_performance == Some(ScannerKeyboardPerformance::Low) {
            b.push(
                Severity::Medium,
                AdviceItem::new(
                    AdviceCode::ScannerPerformanceLow,
                    "the scanner transmits keystrokes slowly",
                    "Slow transmission increases the risk of dropped or merged characters.",
                    vec!["Prefer a scanner/host pairing with higher transmission throughput.".into()],
                ),
            );
        }

        // High: fatal reading problems.
        if caps.can_read_invariants_reliably == Some(false) && caps.can_read_non_invariants_reliably == Some(false) {
            b.push(
                Severity::High,
                AdviceItem::new(
                    AdviceCode::CannotReadBarcodesReliably,
                    "neither invariant nor non-invariant characters can be read reliably",
                    "Barcodes scanned through this layout cannot be read reliably.",
                    vec!["Recalibrate with a host layout matching the scanner, or reconfigure the scanner's layout.".into()],
                ),
            );
        }
        if caps.can_read_invariants_reliably == Some(false) {
            b.push(
                Severity::High,
                AdviceItem::new(
                    AdviceCode::CannotReadInvariantsReliably,
                    "invariant characters cannot be read reliably",
                    "GS1 invariant-only barcodes cannot be read reliably through this layout.",
                    vec!["Recalibrate with a host layout matching the scanner, or reconfigure the scanner's layout.".into()],
                ),
            );
        }
        if caps.can_read_non_invariants_reliably == Some(false) {
            b.push(
                Severity::High,
                AdviceItem::new(
                    AdviceCode::CannotReadNonInvariantsReliably,
                    "non-invariant ASCII characters cannot be read reliably",
                    "Barcodes using additional ASCII characters cannot be read reliably.",
                    vec!["Recalibrate with a host layout matching the scanner, or reconfigure the scanner's layout.".into()],
                ),
            );
        }
        if caps.aim_identifier_ambiguous == Some(true) && caps.scanner_transmits_aim_identifier == Some(true) {
            match assumption {
                Assumption::NoCalibration => b.push(
                    Severity::High,
                    AdviceItem::new(
                        AdviceCode::CannotReadAimNoCalibration,
                        "AIM identifier is ambiguous under this layout and no calibration will be applied",
                        "Symbology identification via the AIM flag cannot be read reliably.",
                        vec!["Apply the calibrated character map at runtime, or disable AIM identification.".into()],
                    ),
                ),
                _ => b.push(
                    Severity::High,
                    AdviceItem::new(
                        AdviceCode::CannotReadAim,
                        "AIM identifier is ambiguous under this layout",
                        "Symbology identification via the AIM flag cannot be read reliably without remapping.",
                        vec!["Apply the calibrated character map at runtime.".into()],
                    ),
                ),
            }
        }
        if caps.keyboard_layouts_can_represent_group_separator == Some(false) {
            let code = match assumption {
                Assumption::NoCalibration => AdviceCode::HiddenCharactersNotReportedCorrectlyNoCalibration,
                _ => AdviceCode::HiddenCharactersNotReportedCorrectly,
            };
            b.push(
                Severity::High,
                AdviceItem::new(
                    code,
                    "the Group Separator character cannot be represented on this host layout",
                    "Hidden (non-printing) characters in structured data will not be reported correctly.",
                    vec!["Scanning Format 05/06 structured data is not reliable under this layout.".into()],
                ),
            );
        } else if caps.can_read_format_05_reliably == Some(false) && caps.can_read_format_06_reliably == Some(false) {
            b.push(
                Severity::High,
                AdviceItem::new(
                    AdviceCode::CannotReadFormat0506,
                    "Format 05 and Format 06 cannot be read reliably",
                    "Structured (EDI) data cannot be read reliably.",
                    vec!["Do not rely on ISO/IEC 15434 Format 05/06 under this layout.".into()],
                ),
            );
        }
        if caps.scanner_dead_keys_detected == Some(true) && caps.can_read_format_05_reliably == Some(false) {
            b.push(
                Severity::High,
                AdviceItem::new(
                    AdviceCode::Format0506HiddenCharactersWrong,
                    "hidden characters inside Format 05/06 envelopes are mis-reported by a scanner dead key",
                    "Structured (EDI) data will contain corrupted hidden characters.",
                    vec!["Do not rely on ISO/IEC 15434 Format 05/06 under this layout.".into()],
                ),
            );
        }
        if caps.invariant_gs1_ambiguities_present == Some(true) || caps.non_invariant_ambiguities_present == Some(true) {
            b.push(
                Severity::High,
                AdviceItem::new(
                    AdviceCode::MultipleKeys,
                    "a reported character corresponds to more than one expected character",
                    "At least one reported character is ambiguous and cannot be remapped reliably.",
                    vec!["Reconfigure the scanner or host layout to remove the collision.".into()],
                ),
            );
        }
        if caps.scanner_may_invert_case == Some(true) {
            b.push(
                Severity::High,
                AdviceItem::new(
                    AdviceCode::ScannerMayInvertCaseAdvice,
                    "upper- and lower-case letters are swapped under this layout",
                    "Letter case will be systematically inverted.",
                    vec!["Correct the scanner's configured layout so case is not inverted.".into()],
                ),
            );
        }
        if caps.scanner_may_convert_to_upper_case == Some(true) {
            b.push(
                Severity::High,
                AdviceItem::new(
                    AdviceCode::ScannerMayConvertToUpperCaseAdvice,
                    "lower-case letters are reported as upper-case under this layout",
                    "Letter case will be systematically converted to upper case.",
                    vec!["Correct the scanner's configured layout so case is preserved.".into()],
                ),
            );
        }
        if caps.scanner_may_convert_to_lower_case == Some(true) {
            b.push(
                Severity::High,
                AdviceItem::new(
                    AdviceCode::ScannerMayConvertToLowerCaseAdvice,
                    "upper-case letters are reported as lower-case under this layout",
                    "Letter case will be systematically converted to lower case.",
                    vec!["Correct the scanner's configured layout so case is preserved.".into()],
                ),
            );
        }
        if caps.caps_lock == Some(true) {
            b.push(
                Severity::High,
                AdviceItem::new(
                    AdviceCode::CapsLockOn,
                    "CapsLock is on",
                    "Letter case will be inverted for as long as CapsLock remains on.",
                    vec!["Ask the user to turn CapsLock off.".into()],
                ),
            );
            // Advice-only branch (spec §9 open question): macOS is reported
            // to preserve letter case under CapsLock differently from other
            // platforms in some scanner/layout pairings. This is not an
            // independently verified capability, so it is surfaced only as
            // additional advice text, never as its own capability flag.
            if platform == crate::platform::Platform::Macintosh {
                b.push(
                    Severity::High,
                    AdviceItem::new(
                        AdviceCode::CapsLockOnPreservationMacintosh,
                        "CapsLock is on and the host platform is Macintosh",
                        "On macOS, some scanner/layout pairings preserve letter case under CapsLock differently from other platforms.",
                        vec!["Verify case handling empirically on the target macOS host before relying on the CapsLock advice alone.".into()],
                    ),
                );
            }
        }
        if caps.no_data_reported == Some(true) {
            b.push(
                Severity::High,
                AdviceItem::new(
                    AdviceCode::NoDataReported,
                    "no calibration data was reported",
                    "Calibration could not establish any mapping.",
                    vec!["Check the scanner is configured to scan and transmit, then restart calibration.".into()],
                ),
            );
        }
        if caps.partial_data_reported == Some(true) {
            b.push(
                Severity::High,
                AdviceItem::new(
                    AdviceCode::PartialDataReported,
                    "only part of the calibration barcode was reported",
                    "Calibration data is incomplete and may be unreliable.",
                    vec!["Re-scan the calibration barcode in full and retry.".into()],
                ),
            );
        }
        if caps.dead_key_sequence_error == Some(true) {
            b.push(
                Severity::High,
                AdviceItem::new(
                    AdviceCode::DeadKeySequenceError,
                    "a dead-key combination could not be resolved consistently",
                    "Some dead-key sequences map ambiguously or not at all.",
                    vec!["Disable the affected dead key on the host layout, or choose a non-dead-key layout.".into()],
                ),
            );
        }
        if caps.scanner_transmits_aim_identifier == Some(false) && assumption != Assumption::NoCalibration {
            b.push(
                Severity::High,
                AdviceItem::new(
                    AdviceCode::NotTransmittingAim,
                    "the scanner is not configured to transmit an AIM identifier",
                    "Symbology identification via the AIM flag is unavailable.",
                    vec!["Enable AIM identifier transmission on the scanner.".into()],
                ),
            );
        }
        if caps.keyboard_script.is_none() {
            b.push(
                Severity::High,
                AdviceItem::new(
                    AdviceCode::CannotDetermineKeyboardScript,
                    "the host keyboard script could not be determined",
                    "Case-sensitivity behaviour cannot be predicted for this layout.",
                    vec!["Re-run calibration; ensure upper- and lower-case probes are both legible.".into()],
                ),
            );
        }

        b
    }

    // ---- Phase 2: de-duplication (six named rewrites, in order) --------

    fn deduplicate(b: &mut Buckets) {
        // Rule 1.
        if contains(&b.high, AdviceCode::CannotReadFormat0506) || contains(&b.low, AdviceCode::Format0506LimitationNoted) {
            remove(&mut b.medium, AdviceCode::Gs1OnlyTestWasRun);
        }
        // Rule 2.
        if contains(&b.high, AdviceCode::CannotReadFormat0506)
            || contains(&b.high, AdviceCode::Format0506HiddenCharactersWrong)
        {
            remove(&mut b.medium, AdviceCode::MayNotReadFormat0506);
        }
        // Rule 3.
        let case_conversion_high = contains(&b.high, AdviceCode::ScannerMayInvertCaseAdvice)
            || contains(&b.high, AdviceCode::ScannerMayConvertToUpperCaseAdvice)
            || contains(&b.high, AdviceCode::ScannerMayConvertToLowerCaseAdvice);
        if case_conversion_high {
            remove(&mut b.medium, AdviceCode::CapsLockCompensation);
            remove(&mut b.medium, AdviceCode::MayNotReadAim);
            remove(&mut b.medium, AdviceCode::MayNotReadFormat0506);
            remove(&mut b.medium, AdviceCode::MayNotReadInvariantCharacters);
            remove(&mut b.medium, AdviceCode::MayNotReadNonInvariantCharacters);
            remove(&mut b.high, AdviceCode::CannotReadBarcodesReliably);
        }
        // Rule 4.
        if contains(&b.high, AdviceCode::CapsLockOn) && contains(&b.medium, AdviceCode::CapsLockCompensation) {
            remove(&mut b.high, AdviceCode::CapsLockOn);
            remove(&mut b.high, AdviceCode::CapsLockOnPreservationMacintosh);
        }
        // Rule 5.
        let drop_test_failed = contains(&b.high, AdviceCode::NoDataReported)
            || contains(&b.high, AdviceCode::PartialDataReported)
            || contains(&b.high, AdviceCode::DeadKeySequenceError)
            || case_conversion_high;
        if drop_test_failed {
            remove(&mut b.medium, AdviceCode::TestFailed);
        }
        // Rule 6.
        if contains(&b.high, AdviceCode::CannotReadAimNoCalibration) {
            remove(&mut b.high, AdviceCode::NotTransmittingAim);
        }
    }

    // ---- Phase 3: ordering ------------------------------------------------

    fn order(mut b: Buckets) -> Vec<AdviceItem> {
        b.high.sort_by_key(|i| i.advice_type.code());
        b.medium.sort_by_key(|i| i.advice_type.code());
        b.low.sort_by_key(|i| i.advice_type.code());

        if !b.high.is_empty() {
            let mut out = b.high;
            out.extend(b.medium);
            out
        } else {
            if !b.medium.is_empty() {
                let suffix = if b.medium.len() == 1 {
                    " There is also an additional issue."
                } else {
                    " There are also some additional issues."
                };
                for item in &mut b.low {
                    item.description.push_str(suffix);
                }
            }
            let mut out = b.low;
            out.extend(b.medium);
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;

    fn base_caps() -> SystemCapabilities {
        SystemCapabilities::default()
    }

    #[test]
    fn clean_layout_emits_low_only() {
        let mut caps = base_caps();
        caps.can_read_invariants_reliably = Some(true);
        let items = AdviceReasoner::generate(&caps, Assumption::Calibration, Platform::Windows);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].advice_type, AdviceCode::ReadsInvariantCharactersReliably);
        assert_eq!(items[0].severity, Severity::Low);
    }

    #[test]
    fn high_presence_withholds_low_items() {
        let mut caps = base_caps();
        caps.can_read_invariants_reliably = Some(true);
        caps.can_read_non_invariants_reliably = Some(false);
        let items = AdviceReasoner::generate(&caps, Assumption::Calibration, Platform::Windows);
        assert!(items.iter().all(|i| i.severity != Severity::Low));
        assert!(items.iter().any(|i| i.advice_type == AdviceCode::CannotReadNonInvariantsReliably));
    }

    #[test]
    fn caps_lock_on_alone_survives_without_compensation() {
        let mut caps = base_caps();
        caps.caps_lock = Some(true);
        let items = AdviceReasoner::generate(&caps, Assumption::Calibration, Platform::Windows);
        assert!(items.iter().any(|i| i.advice_type == AdviceCode::CapsLockOn));
    }

    #[test]
    fn caps_lock_on_is_dropped_when_compensation_present() {
        let mut caps = base_caps();
        caps.caps_lock = Some(true);
        caps.scanner_may_compensate_for_caps_lock = Some(true);
        let items = AdviceReasoner::generate(&caps, Assumption::Calibration, Platform::Windows);
        assert!(!items.iter().any(|i| i.advice_type == AdviceCode::CapsLockOn));
        assert!(items.iter().any(|i| i.advice_type == AdviceCode::CapsLockCompensation));
    }

    #[test]
    fn case_conversion_high_suppresses_downstream_noise() {
        let mut caps = base_caps();
        caps.scanner_may_invert_case = Some(true);
        caps.keyboard_layouts_correspond_for_invariants = Some(false);
        caps.can_read_invariants_reliably = Some(false);
        caps.can_read_non_invariants_reliably = Some(false);
        let items = AdviceReasoner::generate(&caps, Assumption::Calibration, Platform::Windows);
        assert!(items.iter().any(|i| i.advice_type == AdviceCode::ScannerMayInvertCaseAdvice));
        assert!(!items.iter().any(|i| i.advice_type == AdviceCode::CannotReadBarcodesReliably));
        assert!(!items.iter().any(|i| i.advice_type == AdviceCode::MayNotReadInvariantCharacters));
    }

    #[test]
    fn macintosh_adds_caps_lock_preservation_note() {
        let mut caps = base_caps();
        caps.caps_lock = Some(true);
        let items = AdviceReasoner::generate(&caps, Assumption::Calibration, Platform::Macintosh);
        assert!(items.iter().any(|i| i.advice_type == AdviceCode::CapsLockOn));
        assert!(items
            .iter()
            .any(|i| i.advice_type == AdviceCode::CapsLockOnPreservationMacintosh));

        let windows_items = AdviceReasoner::generate(&caps, Assumption::Calibration, Platform::Windows);
        assert!(!windows_items
            .iter()
            .any(|i| i.advice_type == AdviceCode::CapsLockOnPreservationMacintosh));
    }

    #[test]
    fn no_duplicate_advice_type_across_buckets() {
        let mut caps = base_caps();
        caps.can_read_invariants_reliably = Some(false);
        caps.can_read_non_invariants_reliably = Some(false);
        caps.caps_lock = Some(true);
        let items = AdviceReasoner::generate(&caps, Assumption::Calibration, Platform::Windows);
        let mut seen = std::collections::HashSet::new();
        for item in &items {
            assert!(seen.insert(item.advice_type), "duplicate {:?}", item.advice_type);
        }
    }

    #[test]
    fn severity_matches_bucket_for_every_item() {
        let mut caps = base_caps();
        caps.can_read_invariants_reliably = Some(false);
        caps.scanner_may_invert_case = Some(true);
        let items = AdviceReasoner::generate(&caps, Assumption::Calibration, Platform::Windows);
        for item in &items {
            assert_eq!(item.severity, item.advice_type.severity());
        }
    }
}
