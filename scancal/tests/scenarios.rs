//! End-to-end calibration scenarios (spec §8), one `#[test]` per named
//! scenario, fixture-built from the probe payload the engine itself emits
//! rather than hand-typed strings.

use scancal::engine::{CalibrationEngine, ProbeKind};
use scancal::platform::{Assumption, Platform};
use scancal::remap::Remapper;
use scancal::{AdviceReasoner, Config};

fn run_baseline(mutate: impl FnOnce(&str) -> String) -> scancal::engine::Token {
    let config = Config::default();
    let token = CalibrationEngine::new_session(Assumption::Calibration, &config).unwrap();
    let payload = token.payload.clone();
    let mutated = mutate(&payload);
    CalibrationEngine::calibrate(token, &mutated, Some(false), Platform::Windows, 1.0, &config).unwrap()
}

/// Scenario 1: clean US layout, matching scanner.
#[test]
fn clean_us_layout_matching_scanner() {
    let token = run_baseline(|payload| payload.to_string());

    assert!(token.data.character_map.is_empty());
    assert!(token.data.dead_keys_map.is_empty());
    assert_eq!(token.capabilities.can_read_invariants_reliably, Some(true));
    assert_eq!(
        token.capabilities.keyboard_layouts_correspond_for_invariants,
        Some(true)
    );
    assert_eq!(
        token.capabilities.keyboard_layouts_correspond_for_non_invariants,
        Some(true)
    );

    let advice = AdviceReasoner::generate(&token.capabilities, Assumption::Calibration, Platform::Windows);
    assert!(advice
        .iter()
        .any(|a| a.advice_type == scancal::advice::AdviceCode::ReadsInvariantCharactersReliably));
    assert!(advice
        .iter()
        .any(|a| a.advice_type == scancal::advice::AdviceCode::KeyboardLayoutsCorrespond));
    assert!(advice.iter().all(|a| a.severity != scancal::AdviceSeverity::Medium));
    assert!(advice.iter().all(|a| a.severity != scancal::AdviceSeverity::High));
}

/// Scenario 2: French AZERTY host, US-layout scanner — the ten digit
/// slots come back as the AZERTY "shifted number row" characters.
#[test]
fn french_azerty_host_remaps_digits() {
    let azerty_digits = ['&', 'é', '"', '\'', '(', '-', 'è', '_', 'ç', 'à'];
    let token = run_baseline(|payload| {
        let mut out = payload.to_string();
        for (i, azerty) in azerty_digits.iter().enumerate() {
            let digit = char::from_digit(i as u32, 10).unwrap();
            let needle = format!(" {digit} ");
            let replacement = format!(" {azerty} ");
            out = out.replacen(&needle, &replacement, 1);
        }
        out
    });

    assert_eq!(token.data.character_map.len(), 10);
    assert_eq!(
        token.capabilities.keyboard_layouts_correspond_for_invariants,
        Some(false)
    );
    assert_eq!(token.capabilities.can_read_invariants_reliably, Some(true));
}

/// Scenario 3: host layout with `^` as a dead key over `a`/`e`.
#[test]
fn circumflex_dead_key_schedules_and_resolves() {
    let config = Config::default();
    let token = CalibrationEngine::new_session(Assumption::Calibration, &config).unwrap();
    let payload = token.payload.clone();
    let mutated = payload.replacen(" a ", " ^a ", 1).replacen(" e ", " ^e ", 1);
    let token = CalibrationEngine::calibrate(token, &mutated, Some(false), Platform::Windows, 1.0, &config).unwrap();

    assert_eq!(token.remaining, 1);
    assert_eq!(token.probe_kind, ProbeKind::DeadKey('^'));

    // Host reports the dead key precomposing correctly against every
    // invariant in the follow-up probe.
    let dead_key_payload = token.payload.clone();
    let token = CalibrationEngine::calibrate(token, &dead_key_payload, Some(false), Platform::Windows, 1.0, &config)
        .unwrap();

    assert_eq!(token.remaining, 0);
    assert_eq!(
        token.data.dead_keys_map.get("^a"),
        Some(&"a".to_string())
    );
    assert_eq!(
        token.data.dead_keys_map.get("^e"),
        Some(&"e".to_string())
    );
}

/// Scenario 4: CapsLock accidentally on, case inverted.
#[test]
fn caps_lock_accidentally_on_inverts_case() {
    let token = run_baseline(|payload| {
        payload
            .chars()
            .map(|c| {
                if c.is_ascii_uppercase() {
                    c.to_ascii_lowercase()
                } else if c.is_ascii_lowercase() {
                    c.to_ascii_uppercase()
                } else {
                    c
                }
            })
            .collect()
    });

    // Without host-supplied ground truth, the deriver can only infer
    // "probably on".
    let caps_unknown = scancal::SystemCapabilities::derive(
        &token.streams,
        token.extended.invariants_correspond,
        token.extended.non_invariants_correspond,
        None,
        None,
    );
    assert_eq!(caps_unknown.caps_lock_probably_on, Some(true));

    let caps_confirmed = scancal::SystemCapabilities::derive(
        &token.streams,
        token.extended.invariants_correspond,
        token.extended.non_invariants_correspond,
        Some(true),
        None,
    );
    assert_eq!(caps_confirmed.caps_lock, Some(true));
}

/// Scenario 5: Group-Separator probe slot comes back empty.
#[test]
fn group_separator_unrepresentable_is_fatal() {
    let token = run_baseline(|payload| payload.replacen(&format!(" 0{}0 ", '\u{1D}'), "  ", 1));

    assert_eq!(
        token.capabilities.keyboard_layouts_can_represent_group_separator,
        Some(false)
    );
    assert_eq!(token.capabilities.can_read_format_05_reliably, Some(false));

    let advice = AdviceReasoner::generate(&token.capabilities, Assumption::Calibration, Platform::Windows);
    assert!(advice
        .iter()
        .any(|a| a.advice_type == scancal::advice::AdviceCode::HiddenCharactersNotReportedCorrectly
            && a.severity == scancal::AdviceSeverity::High));
}

/// Scenario 6: two distinct invariant slots (`-` and `,`) both come back
/// reported as `_`, so `_` is ambiguous between two expected characters.
#[test]
fn ambiguous_underscore_collision_is_fatal() {
    let token = run_baseline(|payload| {
        payload
            .replacen(" - ", " _ ", 1)
            .replacen(" , ", " _ ", 1)
    });

    assert_eq!(token.capabilities.invariant_gs1_ambiguities_present, Some(true));
    assert_eq!(token.capabilities.can_read_invariants_reliably, Some(false));

    let advice = AdviceReasoner::generate(&token.capabilities, Assumption::Calibration, Platform::Windows);
    assert!(advice
        .iter()
        .any(|a| a.advice_type == scancal::advice::AdviceCode::MultipleKeys
            && a.severity == scancal::AdviceSeverity::High));
}

/// Invariant (spec §8): remapping the canonical baseline reported text
/// reconstructs the canonical baseline expected text exactly.
#[test]
fn remapper_round_trips_calibration_training_data() {
    let azerty_digits = ['&', 'é', '"', '\'', '(', '-', 'è', '_', 'ç', 'à'];
    let config = Config::default();
    let token = CalibrationEngine::new_session(Assumption::Calibration, &config).unwrap();
    let expected_payload = token.payload.clone();
    let mut reported_payload = expected_payload.clone();
    for (i, azerty) in azerty_digits.iter().enumerate() {
        let digit = char::from_digit(i as u32, 10).unwrap();
        reported_payload = reported_payload.replacen(&format!(" {digit} "), &format!(" {azerty} "), 1);
    }
    let token =
        CalibrationEngine::calibrate(token, &reported_payload, Some(false), Platform::Windows, 1.0, &config).unwrap();

    let (normalized, exceptions) = Remapper::process(&reported_payload, &token.data);
    assert!(exceptions.is_empty());
    assert_eq!(normalized, expected_payload);
}
