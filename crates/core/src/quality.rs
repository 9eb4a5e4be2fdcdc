//! Text-quality heuristic for free-form address lines.
//!
//! Flags input that looks like keyboard mashing so that it can be reviewed
//! later. The result is stored alongside the address and never rejects a
//! write.

use crate::types::ValidationFlag;

/// A run of this many identical characters marks the text as suspect.
const REPEAT_THRESHOLD: usize = 4;

/// Longest token (between separators) a real address line contains.
const MAX_TOKEN_LEN: usize = 20;

const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u', 'y'];

/// Score `text` as [`ValidationFlag::Clean`] or [`ValidationFlag::Suspect`].
///
/// Text is suspect when any of these hold:
/// - a character repeats four or more times in a row
/// - it contains no whitespace
/// - it contains no vowel (`y` counts)
/// - a token delimited by space, `-`, `,` or newline is longer than
///   20 characters
#[must_use]
pub fn score(text: &str) -> ValidationFlag {
    let clean = !has_long_run(text)
        && text.chars().any(char::is_whitespace)
        && text
            .chars()
            .any(|c| VOWELS.contains(&c.to_ascii_lowercase()))
        && text
            .split([' ', '-', ',', '\n'])
            .all(|token| token.chars().count() <= MAX_TOKEN_LEN);

    if clean {
        ValidationFlag::Clean
    } else {
        ValidationFlag::Suspect
    }
}

fn has_long_run(text: &str) -> bool {
    let mut run = 0;
    let mut last = None;
    for c in text.chars() {
        if last == Some(c) {
            run += 1;
            if run >= REPEAT_THRESHOLD {
                return true;
            }
        } else {
            run = 1;
            last = Some(c);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinary_address_is_clean() {
        assert_eq!(score("221B Baker Street, Marylebone"), ValidationFlag::Clean);
    }

    #[test]
    fn test_repeated_characters() {
        assert_eq!(score("Flat 7 Baaak Road"), ValidationFlag::Clean);
        assert_eq!(score("Flat 7 Baaaak Road"), ValidationFlag::Suspect);
    }

    #[test]
    fn test_requires_whitespace() {
        assert_eq!(score("Bakerstreet"), ValidationFlag::Suspect);
    }

    #[test]
    fn test_requires_vowel() {
        assert_eq!(score("12 BKR ST"), ValidationFlag::Suspect);
        assert_eq!(score("12 BYR ST"), ValidationFlag::Clean);
    }

    #[test]
    fn test_long_token() {
        assert_eq!(
            score("House abcdefghijklmnopqrstu road"),
            ValidationFlag::Suspect
        );
        assert_eq!(
            score("House abcdefghij-klmnopqrstu road"),
            ValidationFlag::Clean
        );
    }

    #[test]
    fn test_empty_is_suspect() {
        assert_eq!(score(""), ValidationFlag::Suspect);
    }
}
