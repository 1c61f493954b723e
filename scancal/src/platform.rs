//! Host platform and calibration-assumption enums.
//!
//! Only [`Platform::Macintosh`] and [`Platform::Windows`] branch behaviour
//! materially (see [`crate::advice`]); the remaining variants exist so a
//! host can record what it ran on without lossy coercion to "Unknown".

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Platform {
    Windows,
    Macintosh,
    Linux,
    ChromeOs,
    Unix,
    Android,
    Ios,
    Unknown,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Platform::Windows => "Windows",
            Platform::Macintosh => "Macintosh",
            Platform::Linux => "Linux",
            Platform::ChromeOs => "Chrome OS",
            Platform::Unix => "Unix",
            Platform::Android => "Android",
            Platform::Ios => "iOS",
            Platform::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

impl Default for Platform {
    fn default() -> Self {
        Platform::Unknown
    }
}

/// Whether the application will apply the learned [`crate::data::Data`] at
/// runtime. Modulates advice text only — never calibration mechanics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Assumption {
    Calibration,
    NoCalibration,
    Agnostic,
}

impl fmt::Display for Assumption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Assumption::Calibration => "calibration",
            Assumption::NoCalibration => "no-calibration",
            Assumption::Agnostic => "agnostic",
        };
        f.write_str(s)
    }
}
