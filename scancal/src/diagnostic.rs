//! The three-stream diagnostic model (spec §7): neutral `Information`,
//! degrading-but-usable `Warning`, and operation-impossible `Error`.
//!
//! Grounded on `helix-core::diagnostic`'s minimal `Severity`/`Diagnostic`
//! pair, generalized here to a numbered-code table whose band (100s/200s/
//! 300s) is authoritative for which stream a code belongs to — the code
//! value alone tells you the severity, exactly as spec §7 requires.

use std::fmt;

/// Which of the three streams a [`DiagnosticCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Information,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Information => f.write_str("information"),
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

macro_rules! diagnostic_codes {
    ($( $variant:ident = $value:expr ),+ $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[repr(u16)]
        pub enum DiagnosticCode {
            $( $variant = $value ),+
        }

        impl DiagnosticCode {
            pub fn code(self) -> u16 {
                self as u16
            }

            pub fn name(self) -> &'static str {
                match self {
                    $( DiagnosticCode::$variant => stringify!($variant) ),+
                }
            }
        }
    };
}

diagnostic_codes! {
    // --- 100-199: Information -------------------------------------------
    DetectedAimIdentifierPrefix = 101,
    DetectedEndOfLine = 102,
    DetectedKeyboardScript = 103,
    DetectedPlatform = 104,
    DetectedPrefix = 105,
    DetectedSuffix = 106,
    DetectedLineFeedCharacter = 107,
    DetectedDeadKey = 108,
    ScannerMayInvertCase = 109,
    ScannerMayConvertToUpperCase = 110,
    ScannerMayConvertToLowerCase = 111,
    CapsLockProbablyOn = 112,
    ScannerKeyboardPerformanceMeasured = 113,
    DetectedLigature = 114,
    DetectedScannerDeadKey = 115,

    // --- 200-299: Warning -------------------------------------------------
    PartialCalibrationDataReported = 201,
    IncorrectCalibrationDataReported = 202,
    SomeDeadKeyCombinationsUnrecognisedForInvariants = 203,
    NonInvariantAmbiguities = 204,
    MultipleKeysAimFlagCharacter = 205,
    ScannerMayNotTransmitAim = 206,
    PreProcessorWarning = 207,
    ScannerUnassignedKeysPresent = 208,
    GroupSeparatorAmbiguous = 209,
    FileSeparatorAmbiguous = 210,
    RecordSeparatorAmbiguous = 211,
    EndOfTransmissionAmbiguous = 212,
    EndOfTransmissionNotRepresented = 213,

    // --- 300-399: Error -----------------------------------------------
    NoCalibrationDataReported = 301,
    NoDelimiters = 302,
    NoTemporaryDelimiterCandidate = 303,
    CalibrationFailed = 304,
    CalibrationFailedUnexpectedly = 305,
    DeadKeyMultiMapping = 306,
    InvariantGs1Ambiguities = 307,
    MultipleKeys = 308,
    HiddenCharactersNotReportedCorrectly = 309,
    HiddenCharactersNotReportedCorrectlyNoCalibration = 310,
    CapsLockOn = 311,
    PreProcessorError = 312,
    NoCalibrationTokenProvided = 313,
}

impl DiagnosticCode {
    /// The numeric band (100/200/300) authoritative for this code's stream.
    pub fn severity(self) -> Severity {
        match self.code() / 100 {
            1 => Severity::Information,
            2 => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// One entry in a diagnostic stream: a code plus whatever free-text context
/// helps the host (or a log line) explain it, and the original exception
/// payload when the entry came from a preprocessor failure.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DiagnosticEntry {
    pub code: DiagnosticCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DiagnosticEntry {
    pub fn new(code: DiagnosticCode) -> Self {
        Self { code, detail: None }
    }

    pub fn with_detail(code: DiagnosticCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: Some(detail.into()),
        }
    }
}

impl fmt::Display for DiagnosticEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} ({}): {detail}", self.code.name(), self.code.code()),
            None => write!(f, "{} ({})", self.code.name(), self.code.code()),
        }
    }
}

/// The three severity-tagged streams a [`crate::engine::Token`] carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DiagnosticStreams {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub information: Vec<DiagnosticEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warning: Vec<DiagnosticEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error: Vec<DiagnosticEntry>,
}

impl DiagnosticStreams {
    pub fn push(&mut self, entry: DiagnosticEntry) {
        match entry.code.severity() {
            Severity::Information => {
                log::debug!("calibration information: {entry}");
                self.information.push(entry);
            }
            Severity::Warning => {
                log::warn!("calibration warning: {entry}");
                self.warning.push(entry);
            }
            Severity::Error => {
                log::error!("calibration error: {entry}");
                self.error.push(entry);
            }
        }
    }

    pub fn info(&mut self, code: DiagnosticCode) {
        self.push(DiagnosticEntry::new(code));
    }

    pub fn info_with(&mut self, code: DiagnosticCode, detail: impl Into<String>) {
        self.push(DiagnosticEntry::with_detail(code, detail));
    }

    pub fn has_errors(&self) -> bool {
        !self.error.is_empty()
    }

    pub fn all(&self) -> impl Iterator<Item = &DiagnosticEntry> {
        self.information
            .iter()
            .chain(self.warning.iter())
            .chain(self.error.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_is_authoritative() {
        assert_eq!(
            DiagnosticCode::DetectedPrefix.severity(),
            Severity::Information
        );
        assert_eq!(
            DiagnosticCode::NonInvariantAmbiguities.severity(),
            Severity::Warning
        );
        assert_eq!(DiagnosticCode::NoDelimiters.severity(), Severity::Error);
    }

    #[test]
    fn push_routes_to_matching_stream() {
        let mut streams = DiagnosticStreams::default();
        streams.info(DiagnosticCode::DetectedPrefix);
        streams.info(DiagnosticCode::NonInvariantAmbiguities);
        streams.info(DiagnosticCode::NoDelimiters);
        assert_eq!(streams.information.len(), 1);
        assert_eq!(streams.warning.len(), 1);
        assert_eq!(streams.error.len(), 1);
        assert!(streams.has_errors());
    }
}
