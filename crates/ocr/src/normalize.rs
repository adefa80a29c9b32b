//! Script repair for OCR output from mixed Latin/Cyrillic documents.

use racun_core::text::{has_cyrillic, is_all_caps, is_cyrillic};

/// Known garbles and their corrected form, applied literally.
const GARBLES: &[(&str, &str)] = &[
    // UTF-8 text decoded as Windows-1252
    ("Ä\u{8d}", "č"),
    ("ÄŒ", "Č"),
    ("Ä‡", "ć"),
    ("Ä†", "Ć"),
    ("Å¡", "š"),
    ("Å\u{a0}", "Š"),
    ("Å¾", "ž"),
    ("Å½", "Ž"),
    ("Ä‘", "đ"),
    ("Ä\u{90}", "Đ"),
    // Cyrillic read with Latin glyphs or digits
    ("3A ПЛАЋАЊЕ", "ЗА ПЛАЋАЊЕ"),
    ("3a плаћање", "за плаћање"),
    ("3A УПЛАТУ", "ЗА УПЛАТУ"),
    ("3a уплату", "за уплату"),
    ("6рој", "број"),
    ("6poj", "број"),
    ("Бpoj", "Број"),
    ("CTOPHO", "СТОРНО"),
    ("STORN0", "STORNO"),
    ("Hапомена", "Напомена"),
    // Energy unit
    ("kVVh", "kWh"),
    ("kWn", "kWh"),
    ("KWh", "kWh"),
    ("KWH", "kWh"),
    ("kwh", "kWh"),
    ("кWh", "kWh"),
    ("кВх", "kWh"),
    ("кВч", "kWh"),
];

/// Latin letters with a Cyrillic twin of identical shape.
fn cyrillic_twin(c: char) -> Option<char> {
    Some(match c {
        'A' => 'А',
        'B' => 'В',
        'C' => 'С',
        'E' => 'Е',
        'H' => 'Н',
        'J' => 'Ј',
        'K' => 'К',
        'M' => 'М',
        'O' => 'О',
        'P' => 'Р',
        'T' => 'Т',
        'X' => 'Х',
        'a' => 'а',
        'c' => 'с',
        'e' => 'е',
        'j' => 'ј',
        'o' => 'о',
        'p' => 'р',
        'x' => 'х',
        'y' => 'у',
        _ => return None,
    })
}

/// Repair OCR script confusions. Idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let mut current = text.to_string();
    // Both passes only ever move text toward corrected form, so this settles quickly.
    for _ in 0..4 {
        let next = fix_scripts(&replace_garbles(&current));
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn replace_garbles(text: &str) -> String {
    GARBLES
        .iter()
        .fold(text.to_string(), |acc, (from, to)| {
            if acc.contains(from) {
                acc.replace(from, to)
            } else {
                acc
            }
        })
}

fn fix_scripts(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let caps = is_all_caps(line);
        if caps || has_cyrillic(line) {
            fix_line(line, caps, &mut out);
        } else {
            out.push_str(line);
        }
    }
    out
}

/// Latin acronyms that print in capitals on bills and are spelled only with
/// confusable letters.
const LATIN_ACRONYMS: &[&str] = &["ATM", "ECO", "EKO", "JKP", "JP", "MAX", "MB", "OK", "PTT", "TAX"];

/// Maps confusable Latin letters inside words that already contain Cyrillic.
/// On ALL-CAPS lines, words spelled only with confusable capitals (e.g. `HT`
/// for НТ) are taken to be Cyrillic too, unless they are known acronyms.
fn fix_line(line: &str, caps_line: bool, out: &mut String) {
    let mut word = String::new();
    for c in line.chars() {
        if c.is_alphabetic() {
            word.push(c);
        } else {
            flush_word(&mut word, caps_line, out);
            out.push(c);
        }
    }
    flush_word(&mut word, caps_line, out);
}

fn flush_word(word: &mut String, caps_line: bool, out: &mut String) {
    if word.is_empty() {
        return;
    }
    let mixed = word.chars().any(is_cyrillic);
    let disguised = caps_line
        && word.chars().count() >= 2
        && word.chars().all(|c| c.is_uppercase() && cyrillic_twin(c).is_some())
        && !LATIN_ACRONYMS.contains(&word.as_str());
    if mixed || disguised {
        out.extend(word.chars().map(|c| cyrillic_twin(c).unwrap_or(c)));
    } else {
        out.push_str(word);
    }
    word.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_script_words_become_cyrillic() {
        assert_eq!(normalize("PAЧУН за oктобар"), "РАЧУН за октобар");
    }

    #[test]
    fn latin_lines_pass_through() {
        let text = "VT: 150 kWh\nEPS Snabdevanje d.o.o.\nRačun broj 123";
        assert_eq!(normalize(text), text);
    }

    #[test]
    fn latin_words_on_cyrillic_lines_survive() {
        assert_eq!(normalize("Виша тарифа VT: 150 kWh"), "Виша тарифа VT: 150 kWh");
    }

    #[test]
    fn disguised_words_on_caps_cyrillic_lines() {
        assert_eq!(normalize("НИЖА ТАРИФА HT: 80"), "НИЖА ТАРИФА НТ: 80");
        // Not on a mixed-case line.
        assert_eq!(normalize("Нижа тарифа HT: 80"), "Нижа тарифа HT: 80");
    }

    #[test]
    fn caps_latin_lines_map_confusable_words() {
        assert_eq!(normalize("TOPAK HOBAK"), "ТОРАК НОВАК");
        // Words with a letter that has no Cyrillic twin stay Latin.
        assert_eq!(normalize("EPS SNABDEVANJE VT NT"), "EPS SNABDEVANJE VT NT");
        assert_eq!(normalize("JKP TOPAK"), "JKP ТОРАК");
        // Mixed-case lines are left alone.
        assert_eq!(normalize("Topak HOBAK"), "Topak HOBAK");
    }

    #[test]
    fn garble_table_applies() {
        assert_eq!(normalize("RaÄ\u{8d}un za plaÄ‡anje"), "Račun za plaćanje");
        assert_eq!(normalize("Potrošnja 230 KWH"), "Potrošnja 230 kWh");
        assert_eq!(normalize("3A УПЛАТУ"), "ЗА УПЛАТУ");
    }

    #[test]
    fn idempotent_on_assorted_input() {
        let samples = [
            "",
            "PAЧУН 6poj 12345678\nПEPИOД 05.10.2025 - 01.11.2025",
            "CTOPHO\n3a уплату 1.234,56 RSD",
            "Mixed Latin line\nВТ: 150 kWh\nHT 80 KWH",
            "ЈKП ИНФОСТАН\n\n  trailing  ",
            "TOPAK HOBAK\nJKP ATM 24H",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
        }
    }
}
