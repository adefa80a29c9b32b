//! Script and casing helpers shared by the barcode and text parsers.

pub fn is_cyrillic(c: char) -> bool {
    matches!(c, '\u{0400}'..='\u{04FF}')
}

pub fn has_cyrillic(s: &str) -> bool {
    s.chars().any(is_cyrillic)
}

/// True when `s` has at least two letters and none of them is lowercase.
pub fn is_all_caps(s: &str) -> bool {
    let letters: Vec<char> = s.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 2 && letters.iter().all(|c| !c.is_lowercase())
}

/// ALL-CAPS text becomes title case; mixed-case text passes through.
///
/// A letter is capitalised when it follows a non-letter, so `"EPS SNABDEVANJE D.O.O."`
/// becomes `"Eps Snabdevanje D.O.O."`.
pub fn normalize_casing(s: &str) -> String {
    let trimmed = s.trim();
    if !is_all_caps(trimmed) {
        return trimmed.to_string();
    }
    let mut out = String::with_capacity(trimmed.len());
    let mut prev_letter = false;
    for c in trimmed.chars() {
        if c.is_alphabetic() {
            if prev_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_letter = true;
        } else {
            out.push(c);
            prev_letter = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shouting_names_become_title_case() {
        assert_eq!(normalize_casing("EPS SNABDEVANJE"), "Eps Snabdevanje");
        assert_eq!(normalize_casing("ЈКП ИНФОСТАН ТЕХНОЛОГИЈЕ"), "Јкп Инфостан Технологије");
    }

    #[test]
    fn mixed_case_passes_through() {
        assert_eq!(normalize_casing("  Telekom Srbija a.d. "), "Telekom Srbija a.d.");
    }

    #[test]
    fn all_caps_needs_two_letters() {
        assert!(!is_all_caps("A 123"));
        assert!(is_all_caps("VT: 150"));
        assert!(!is_all_caps("VT: 150 kWh"));
    }

    #[test]
    fn detects_cyrillic() {
        assert!(has_cyrillic("Рачун"));
        assert!(has_cyrillic("PAЧУН"));
        assert!(!has_cyrillic("Racun"));
    }
}
