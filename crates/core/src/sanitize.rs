//! Transliteration and character whitelisting for user-entered text.
//!
//! Accented Latin letters are folded to ASCII, joining characters
//! (`&`, `_`, `=`, `+`, `:`) become spaces, anything outside the whitelist
//! becomes a space, and runs of whitespace collapse to a single space. The
//! result may be empty; callers decide whether that is acceptable.

/// Characters treated as word separators.
const SEPARATORS: &[char] = &[' ', '&', '_', '=', '+', ':'];

/// Sanitize a person's name: ASCII letters, `-` and `.` survive.
#[must_use]
pub fn name(input: &str) -> String {
    clean(input, |c| c.is_ascii_alphabetic() || matches!(c, '-' | '.'))
}

/// Sanitize an address line or city: ASCII alphanumerics and `-.,/` survive.
#[must_use]
pub fn text(input: &str) -> String {
    clean(input, |c| {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | ',' | '/')
    })
}

/// Replace accented characters with their ASCII spelling.
#[must_use]
pub fn transliterate(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match fold(c) {
            Some(ascii) => out.push_str(ascii),
            None => out.push(c),
        }
    }
    out
}

fn clean(input: &str, allowed: impl Fn(char) -> bool) -> String {
    let folded = transliterate(input.trim());
    let mut out = String::with_capacity(folded.len());
    let mut pending_space = false;

    for c in folded.chars() {
        if SEPARATORS.contains(&c) || c.is_whitespace() || !allowed(c) {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }
    out
}

const fn fold(c: char) -> Option<&'static str> {
    let ascii = match c {
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' => "A",
        'Å' => "AA",
        'Æ' => "AE",
        'Ç' => "C",
        'È' | 'É' | 'Ê' | 'Ë' => "E",
        'Ì' | 'Í' | 'Î' | 'Ï' => "I",
        'Ð' => "D",
        'Ł' => "L",
        'Ñ' => "N",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => "O",
        'Ø' | 'Œ' => "OE",
        'Ù' | 'Ú' | 'Û' | 'Ü' => "U",
        'Ý' => "Y",
        'Þ' => "Th",
        'ß' => "ss",
        'à' | 'á' | 'â' | 'ã' | 'ä' => "a",
        'å' => "aa",
        'æ' => "ae",
        'ç' => "c",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ð' => "d",
        'ł' => "l",
        'ñ' | 'ń' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ō' | 'ö' => "o",
        'ø' | 'œ' => "oe",
        'ś' => "s",
        'ù' | 'ú' | 'û' | 'ū' | 'ü' => "u",
        'ý' | 'ÿ' => "y",
        'þ' => "th",
        'ż' => "z",
        _ => return None,
    };
    Some(ascii)
}
