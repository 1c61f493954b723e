//! Crate-wide error type.
//!
//! Mirrors the fatal list in spec §4.1.6: these are the failure states a
//! session cannot recover [`crate::engine::CalibrationEngine`] from without
//! the host restarting the whole session (as opposed to `Warning`
//! [`crate::diagnostic::DiagnosticCode`]s, which still yield usable data).

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no calibration data was reported for this probe")]
    NoCalibrationDataReported,

    #[error("temporary delimiter not found in reported baseline text")]
    NoDelimiters,

    #[error("no ASCII character is absent from the probe alphabet to use as a temporary delimiter")]
    NoTemporaryDelimiterCandidate,

    #[error("calibration failed: {0}")]
    CalibrationFailed(String),

    #[error("calibration failed unexpectedly: {0}")]
    CalibrationFailedUnexpectedly(String),

    #[error("no calibration token was provided")]
    NoCalibrationTokenProvided,

    #[error("failed to (de)serialize calibration data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse configuration: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
