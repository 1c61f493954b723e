//! Utility functions to categorize a reported or expected `char` against the
//! GS1 invariant character set (ISO/IEC 646).

/// The twenty invariant punctuation marks, excluding space. Space is never
/// itself an invariant payload character: it is reserved as the default
/// temporary delimiter (see [`crate::payload`]).
pub const GS1_INVARIANT_PUNCTUATION: &[char] = &[
    '!', '"', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/', ':', ';', '<', '=', '>',
    '?', '_',
];

/// Classification of a character relative to the GS1 invariant subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharCat {
    /// Digit, upper/lower-case ASCII letter, or one of the twenty invariant
    /// punctuation marks.
    Invariant,
    /// Printable ASCII (0x20-0x7E) that is not invariant.
    Ascii,
    /// An ASCII control character (0x00-0x1F or 0x7F), including the GS1/EDI
    /// separators and EOT.
    Control,
    /// Anything outside the 7-bit ASCII range.
    None,
}

/// Classifies `ch` per the four-way GS1 invariant taxonomy.
#[inline]
pub fn categorize_char(ch: char) -> CharCat {
    if is_invariant(ch) {
        CharCat::Invariant
    } else if is_ascii_control(ch) {
        CharCat::Control
    } else if ch.is_ascii() && is_ascii_printable(ch) {
        CharCat::Ascii
    } else {
        CharCat::None
    }
}

#[inline]
pub fn is_invariant(ch: char) -> bool {
    ch.is_ascii_digit() || ch.is_ascii_alphabetic() || GS1_INVARIANT_PUNCTUATION.contains(&ch)
}

#[inline]
pub fn is_ascii_printable(ch: char) -> bool {
    matches!(ch as u32, 0x20..=0x7E)
}

#[inline]
pub fn is_ascii_control(ch: char) -> bool {
    matches!(ch as u32, 0x00..=0x1F | 0x7F)
}

/// The thirty-three additional-ASCII characters: printable 7-bit ASCII that
/// is neither an invariant character nor the space delimiter itself.
///
/// Computed rather than hard-coded so the segment stays self-consistent with
/// [`GS1_INVARIANT_PUNCTUATION`] regardless of exact character-count
/// terminology drift between documentation and implementation.
pub fn additional_ascii_characters() -> Vec<char> {
    (0x20u32..=0x7E)
        .filter_map(char::from_u32)
        .filter(|&c| c != ' ' && !is_invariant(c))
        .collect()
}

/// The canonical ordered sequence of all 82 GS1 invariant characters:
/// digits, then upper-case letters, then lower-case letters, then the
/// twenty invariant punctuation marks, matching the order the baseline
/// probe lays them out in.
pub fn invariant_sequence() -> Vec<char> {
    let mut seq: Vec<char> = ('0'..='9').collect();
    seq.extend('A'..='Z');
    seq.extend('a'..='z');
    seq.extend(GS1_INVARIANT_PUNCTUATION.iter().copied());
    seq
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_count_is_eighty_two() {
        assert_eq!(invariant_sequence().len(), 82);
    }

    #[test]
    fn additional_ascii_excludes_invariants_and_space() {
        let extra = additional_ascii_characters();
        assert!(!extra.contains(&' '));
        for c in &extra {
            assert!(!is_invariant(*c));
        }
        assert_eq!(extra.len() + invariant_sequence().len() + 1, 95);
    }

    #[test]
    fn control_chars_include_separators() {
        for c in ['\u{1D}', '\u{1C}', '\u{1E}', '\u{1F}', '\u{04}'] {
            assert_eq!(categorize_char(c), CharCat::Control);
        }
    }

    #[test]
    fn categorizes_unicode_as_none() {
        assert_eq!(categorize_char('é'), CharCat::None);
        assert_eq!(categorize_char('â'), CharCat::None);
    }
}
