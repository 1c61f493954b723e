//! Remapper: the stateless runtime transform (spec §4.4).
//!
//! Pure, allocation-light, O(n); safe to call concurrently from many
//! threads against the same [`Data`], since `Data` never changes after a
//! session seals it.

use smallvec::SmallVec;

use crate::data::Data;

/// A character that could not be resolved against a calibrated map while
/// remapping live input. Collected rather than raised, so a single unknown
/// key never aborts an otherwise-good scan (spec §4.4 step 3).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PreprocessorException {
    pub position: usize,
    pub reported: char,
}

/// Short, usually-empty-or-one exception list returned from the hot
/// [`Remapper::process`] path.
pub type Exceptions = SmallVec<[PreprocessorException; 2]>;

pub struct Remapper;

impl Remapper {
    /// Applies `data`'s calibrated maps to `reported`, returning the
    /// normalized (expected-alphabet) text plus any unresolved characters.
    pub fn process(reported: &str, data: &Data) -> (String, Exceptions) {
        let stripped = Self::strip_prefix_suffix_eol(reported, data);
        let chars: Vec<char> = stripped.chars().collect();

        let mut out = String::with_capacity(chars.len());
        let mut exceptions = Exceptions::new();
        let mut i = 0usize;

        while i < chars.len() {
            // spec §4.4 step 2: the dead-key window wins ties over a
            // ligature match, consistent with baseline alignment's own
            // dead-key-first preference (see DESIGN.md decision 2).
            if i + 1 < chars.len() {
                let pair: String = [chars[i], chars[i + 1]].into_iter().collect();
                if let Some(expected) = data.dead_keys_map.get(&pair) {
                    out.push_str(expected);
                    i += 2;
                    continue;
                }
            }
            if let Some(resolved) = Self::longest_ligature_match(&chars[i..], data) {
                out.push(resolved.1);
                i += resolved.0;
                continue;
            }
            let c = chars[i];
            if let Some(&expected) = data.character_map.get(&c) {
                out.push(expected);
            } else if data.scanner_unassigned_keys.contains(&c) {
                exceptions.push(PreprocessorException {
                    position: i,
                    reported: c,
                });
                out.push(c);
            } else {
                out.push(c);
            }
            i += 1;
        }

        (out, exceptions)
    }

    fn strip_prefix_suffix_eol<'a>(reported: &'a str, data: &Data) -> &'a str {
        let mut s = reported;
        if !data.prefix.is_empty() {
            s = s.strip_prefix(data.prefix.as_str()).unwrap_or(s);
        }
        if !data.suffix.is_empty() {
            s = s.strip_suffix(data.suffix.as_str()).unwrap_or(s);
        }
        s.trim_end_matches(['\r', '\n'])
    }

    /// Tries every ligature key that starts at this position, preferring the
    /// longest match, so `"ae"` does not shadow a longer `"aes"` entry.
    fn longest_ligature_match(remaining: &[char], data: &Data) -> Option<(usize, char)> {
        data.ligature_map
            .iter()
            .filter(|(seq, _)| {
                let seq_len = seq.chars().count();
                seq_len <= remaining.len() && seq.chars().eq(remaining[..seq_len].iter().copied())
            })
            .map(|(seq, &expected)| (seq.chars().count(), expected))
            .max_by_key(|(len, _)| *len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_with_char_map() -> Data {
        let mut data = Data::new();
        data.character_map.insert('&', '1');
        data.character_map.insert('@', '2');
        data
    }

    #[test]
    fn unmapped_characters_pass_through() {
        let data = Data::new();
        let (out, exceptions) = Remapper::process("hello", &data);
        assert_eq!(out, "hello");
        assert!(exceptions.is_empty());
    }

    #[test]
    fn character_map_substitutes_reported_for_expected() {
        let data = data_with_char_map();
        let (out, _) = Remapper::process("&@x", &data);
        assert_eq!(out, "12x");
    }

    #[test]
    fn dead_key_pair_resolves_to_single_expected_char() {
        let mut data = Data::new();
        data.dead_keys_map.insert("^a".to_string(), "a".to_string());
        let (out, _) = Remapper::process("b^ac", &data);
        assert_eq!(out, "bac");
    }

    #[test]
    fn ligature_prefers_longest_match() {
        let mut data = Data::new();
        data.ligature_map.insert("ae".to_string(), 'æ');
        data.ligature_map.insert("aes".to_string(), '§');
        let (out, _) = Remapper::process("aes", &data);
        assert_eq!(out, "§");
    }

    #[test]
    fn unassigned_key_yields_exception_but_does_not_abort() {
        let mut data = Data::new();
        data.scanner_unassigned_keys.push('~');
        let (out, exceptions) = Remapper::process("a~b", &data);
        assert_eq!(out, "a~b");
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].reported, '~');
    }

    #[test]
    fn prefix_and_suffix_are_stripped_before_remapping() {
        let mut data = data_with_char_map();
        data.prefix = "PRE".to_string();
        data.suffix = "POST".to_string();
        let (out, _) = Remapper::process("PRE&@POST", &data);
        assert_eq!(out, "12");
    }

    #[test]
    fn idempotent_on_already_canonical_text() {
        let data = data_with_char_map();
        let (once, _) = Remapper::process("abc", &data);
        let (twice, _) = Remapper::process(&once, &data);
        assert_eq!(once, twice);
    }

    quickcheck::quickcheck! {
        // spec §8 Law: Remapper is idempotent once the output alphabet is a
        // subset of the input alphabet, which holds trivially for any text
        // drawn only from characters `data` never remaps.
        fn unmapped_text_is_always_idempotent(text: String) -> bool {
            let data = data_with_char_map();
            let filtered: String = text.chars().filter(|c| !data.character_map.contains_key(c)).collect();
            let (once, _) = Remapper::process(&filtered, &data);
            let (twice, _) = Remapper::process(&once, &data);
            once == twice
        }

        // spec §8 Invariant: every exception position reported back names a
        // character that really is in `scanner_unassigned_keys`, for any
        // arbitrary input text.
        fn exceptions_only_name_unassigned_keys(text: String) -> bool {
            let mut data = Data::new();
            data.scanner_unassigned_keys.push('~');
            let (_, exceptions) = Remapper::process(&text, &data);
            exceptions.iter().all(|e| data.scanner_unassigned_keys.contains(&e.reported))
        }
    }
}
