//! Calibrates an application to reliably interpret barcode-scanner
//! keystrokes under an arbitrary host-OS keyboard layout.
//!
//! A scanner emulates a USB HID keyboard: it encodes characters as key
//! codes for its own configured layout, and the host OS translates those
//! key codes to Unicode according to *its* layout. When the two disagree,
//! the application sees mis-translated text. [`engine::CalibrationEngine`]
//! runs a short probe-barcode exchange to infer the mapping; [`remap::Remapper`]
//! applies it to later live scans.

pub mod advice;
pub mod capabilities;
pub mod char_cat;
pub mod config;
pub mod data;
pub mod diagnostic;
pub mod engine;
pub mod error;
pub mod payload;
pub mod platform;
pub mod remap;
pub mod script;
pub mod segments;

pub use advice::{AdviceCode, AdviceItem, AdviceReasoner, Severity as AdviceSeverity};
pub use capabilities::SystemCapabilities;
pub use config::Config;
pub use data::Data;
pub use engine::{CalibrationEngine, DataMatrixRenderer, Token};
pub use error::{Error, Result};
pub use platform::{Assumption, Platform};
pub use remap::{PreprocessorException, Remapper};

/// Convenience free function mirroring spec §6's `process_input(reported,
/// data) -> (normalized, exceptions)`; equivalent to [`Remapper::process`].
pub fn process_input(reported: &str, data: &Data) -> (String, remap::Exceptions) {
    Remapper::process(reported, data)
}
