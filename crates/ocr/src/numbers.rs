//! Number, amount and date grammars for Serbian-formatted documents.

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::OnceLock;

macro_rules! re {
    ($name:ident, $pat:expr) => {
        pub(crate) fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}
pub(crate) use re;

re!(re_numeric_token, r"\d[\d.,]*\d|\d");
re!(re_thousands_comma, r"^\d{1,3}(?:\.\d{3})+,\d{2}$");
re!(re_comma_decimal, r"^\d+,\d{2}$");
re!(re_dot_decimal, r"^\d+\.\d{2}$");
re!(re_thousands_only, r"^\d{1,3}(?:\.\d{3})+$");
re!(re_date, r"\b(\d{1,2})\s?[./-]\s?(\d{1,2})\s?[./-]\s?(\d{4})\b");

pub const MIN_YEAR: i32 = 2020;
pub const MAX_YEAR: i32 = 2030;

/// Parse one amount token: `1.234,56`, `1234,56` or `1234.56`, tried in that order.
pub fn parse_amount_token(token: &str) -> Option<Decimal> {
    let normalized = if re_thousands_comma().is_match(token) {
        token.replace('.', "").replace(',', ".")
    } else if re_comma_decimal().is_match(token) {
        token.replace(',', ".")
    } else if re_dot_decimal().is_match(token) {
        token.to_string()
    } else {
        return None;
    };
    Decimal::from_str(&normalized).ok()
}

/// Every decimal amount on the line, in order of appearance.
pub fn amounts_in_line(line: &str) -> Vec<Decimal> {
    re_numeric_token()
        .find_iter(line)
        .filter_map(|m| parse_amount_token(m.as_str()))
        .collect()
}

pub fn largest_amount(line: &str) -> Option<Decimal> {
    amounts_in_line(line).into_iter().max()
}

/// Parse a quantity that may or may not carry decimals (`150`, `1.234`, `80,5`).
pub fn parse_quantity(token: &str) -> Option<Decimal> {
    let token = token.trim();
    let normalized = if token.contains(',') {
        token.replace('.', "").replace(',', ".")
    } else if re_thousands_only().is_match(token) {
        token.replace('.', "")
    } else {
        token.to_string()
    };
    Decimal::from_str(&normalized).ok()
}

/// The first `d.m.yyyy` date in `s` within plausible bill years.
pub fn first_date(s: &str) -> Option<NaiveDate> {
    dates_in(s).into_iter().next()
}

pub fn dates_in(s: &str) -> Vec<NaiveDate> {
    re_date()
        .captures_iter(s)
        .filter_map(|c| {
            let day: u32 = c.get(1)?.as_str().parse().ok()?;
            let month: u32 = c.get(2)?.as_str().parse().ok()?;
            let year: i32 = c.get(3)?.as_str().parse().ok()?;
            plausible_date(year, month, day)
        })
        .collect()
}

pub fn plausible_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Month number from a Latin or Cyrillic month name (any inflection).
pub fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take(3).flat_map(char::to_lowercase).collect();
    let n = match prefix.as_str() {
        "jan" | "јан" => 1,
        "feb" | "феб" => 2,
        "mar" | "мар" => 3,
        "apr" | "апр" => 4,
        "maj" | "мај" | "may" => 5,
        "jun" | "јун" => 6,
        "jul" | "јул" => 7,
        "avg" | "aug" | "авг" => 8,
        "sep" | "сеп" => 9,
        "okt" | "oct" | "окт" => 10,
        "nov" | "нов" => 11,
        "dec" | "дец" => 12,
        _ => return None,
    };
    Some(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn amount_grammars() {
        assert_eq!(parse_amount_token("1.234,56"), Some(dec("1234.56")));
        assert_eq!(parse_amount_token("3456,78"), Some(dec("3456.78")));
        assert_eq!(parse_amount_token("12.50"), Some(dec("12.50")));
        assert_eq!(parse_amount_token("1234"), None);
        assert_eq!(parse_amount_token("05.10.2025"), None);
    }

    #[test]
    fn dates_are_not_amounts() {
        assert!(amounts_in_line("Datum: 05.10.2025").is_empty());
    }

    #[test]
    fn largest_amount_on_line() {
        assert_eq!(largest_amount("Osnovica 1.000,00 PDV 200,00 Ukupno 1.200,00"), Some(dec("1200.00")));
    }

    #[test]
    fn quantities() {
        assert_eq!(parse_quantity("150"), Some(dec("150")));
        assert_eq!(parse_quantity("1.234"), Some(dec("1234")));
        assert_eq!(parse_quantity("80,5"), Some(dec("80.5")));
        assert_eq!(parse_quantity("2.5"), Some(dec("2.5")));
    }

    #[test]
    fn dates_respect_year_window() {
        assert_eq!(first_date("izdat 05.10.2025."), NaiveDate::from_ymd_opt(2025, 10, 5));
        assert_eq!(first_date("rođen 05.10.1985"), None);
        assert_eq!(first_date("31.02.2025"), None);
        assert_eq!(dates_in("05.10.2025 - 01.11.2025").len(), 2);
    }

    #[test]
    fn month_names_in_both_scripts() {
        assert_eq!(month_number("oktobar"), Some(10));
        assert_eq!(month_number("ОКТОБАР"), Some(10));
        assert_eq!(month_number("Jul"), Some(7));
        assert_eq!(month_number("јун"), Some(6));
        assert_eq!(month_number("foo"), None);
    }
}
