//! Electricity and utility bill extraction: billing account, billing period,
//! tariff consumption and the correction (STORNO) marker.

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use std::sync::OnceLock;

use racun_core::period::first_of_next_month;
use racun_core::UtilityBillCandidate;

use crate::extract::{extract_due_date, extract_invoice_number};
use crate::normalize::normalize;
use crate::numbers::{dates_in, month_number, parse_quantity, plausible_date, re};

re!(re_account,
    r"(?i)\b(?:broj\s+kupca|[sš]ifra\s+kupca|naplatni\s+broj|(?:ed|ед)\s+(?:broj|број)|број\s+купца|шифра\s+купца|наплатни\s+број)\s*[:.]?\s*(\d+(?:-\d+)*)");
re!(re_storno, r"(?i)(?:^|[^\p{L}])(?:storno|сторно)(?:[^\p{L}]|$)");
re!(re_summary_line, r"(?i)ukupn|укупн|total|zbir|збир|svega|свега");
re!(re_vt_alias,
    r"(?i)(?:^|[^\p{L}])(vt|вт|bt|v\.t\.|vis[aš]a\s+tarifa|viša\s+tarifa|виша\s+тарифа|ve[cć]a\s+tarifa|dnevna\s+tarifa|дневна\s+тарифа)(?:[^\p{L}]|$)");
re!(re_nt_alias,
    r"(?i)(?:^|[^\p{L}])(nt|нт|ht|n\.t\.|ni[zž]a\s+tarifa|нижа\s+тарифа|manja\s+tarifa|no[cć]na\s+tarifa|ноћна\s+тарифа)(?:[^\p{L}]|$)");
re!(re_kwh_value, r"(\d[\d.,]*)\s*kWh");
re!(re_total_consumption,
    r"(?i)ukupna\s+potro[sš]nja|укупна\s+потрошња|ukupno\s+utro[sš]eno|укупно\s+утрошено|utro[sš]ak|утрошак|potro[sš]nja|потрошња");
re!(re_adjacent_range,
    r"(\d{1,2}\.\d{1,2}\.\d{4})\.?\s*(?:-|–|—|do|до)\s*(\d{1,2}\.\d{1,2}\.\d{4})");
re!(re_period_label,
    r"(?i)obra[cč]unski\s+period|обрачунски\s+период|period\s+obra[cč]una|период\s+обрачуна|za\s+period|за\s+период|period|период");
re!(re_header_month,
    r"(?i)\b(januar|februar|mart|april|maj|jun|jul|avgust|septembar|oktobar|novembar|decembar|јануар|фебруар|март|април|мај|јун|јул|август|септембар|октобар|новембар|децембар)\p{L}*\s+(\d{4})\b");

/// Characters after a period label searched for the two dates.
const PERIOD_WINDOW_CHARS: usize = 120;
const HEADER_LINES: usize = 15;

pub struct UtilityExtractor;

impl UtilityExtractor {
    /// Parses utility-bill fields from raw OCR text. The text is normalized first.
    pub fn extract(raw: &str) -> UtilityBillCandidate {
        let text = normalize(raw);
        let lines: Vec<&str> = text.lines().map(str::trim).collect();

        let mut c = UtilityBillCandidate {
            billing_account_number: extract_account(&text),
            is_correction: re_storno().is_match(&text),
            ..Default::default()
        };
        c.bill.invoice_number = extract_invoice_number(&text);
        c.bill.due_date = extract_due_date(&lines);

        c.consumption_vt = tariff_consumption(&lines, re_vt_alias());
        c.consumption_nt = tariff_consumption(&lines, re_nt_alias());
        c.consumption_total = match (c.consumption_vt, c.consumption_nt) {
            (None, None) => labelled_total_consumption(&lines),
            (vt, nt) => Some(vt.unwrap_or_default() + nt.unwrap_or_default()),
        };

        let (strict_start, strict_end) = adjacent_range(&text);
        let header_end = header_period_end(&lines);
        let (wide_start, wide_end) = labelled_range(&text, header_end);
        c.period_start = strict_start.or(wide_start);
        c.period_end = strict_end.or(wide_end).or(header_end);
        if matches!((c.period_start, c.period_end), (Some(start), Some(end)) if start > end) {
            c.period_start = None;
        }
        c.record_date = c.period_end.or(header_end).or(c.bill.due_date);

        c.refresh_identity();
        if c.payment_identity.is_none() {
            tracing::warn!(
                account = ?c.billing_account_number,
                start = ?c.period_start,
                end = ?c.period_end,
                "Payment identity unavailable, duplicate detection degraded"
            );
        }
        c
    }
}

fn extract_account(text: &str) -> Option<String> {
    let c = re_account().captures(text)?;
    let digits: String = c.get(1)?.as_str().chars().filter(char::is_ascii_digit).collect();
    (!digits.is_empty()).then_some(digits)
}

/// The value right before `kWh` following a tariff alias, skipping summary lines.
fn tariff_consumption(lines: &[&str], alias: &Regex) -> Option<Decimal> {
    lines
        .iter()
        .filter(|l| !re_summary_line().is_match(l))
        .find_map(|l| {
            let name = alias.captures(l)?.get(1)?;
            kwh_after(&l[name.end()..])
        })
}

fn labelled_total_consumption(lines: &[&str]) -> Option<Decimal> {
    lines.iter().find_map(|l| {
        let m = re_total_consumption().find(l)?;
        kwh_after(&l[m.end()..])
    })
}

fn kwh_after(rest: &str) -> Option<Decimal> {
    let c = re_kwh_value().captures(rest)?;
    let token = c.get(1)?.as_str().trim_end_matches(['.', ',']);
    parse_quantity(token)
}

fn adjacent_range(text: &str) -> (Option<NaiveDate>, Option<NaiveDate>) {
    re_adjacent_range()
        .captures_iter(text)
        .find_map(|c| {
            let start = dates_in(c.get(1)?.as_str()).into_iter().next()?;
            let end = dates_in(c.get(2)?.as_str()).into_iter().next()?;
            (start <= end).then_some((Some(start), Some(end)))
        })
        .unwrap_or((None, None))
}

/// Dates found within a window after a period label, tolerating noise between
/// them. A start later than the window's end, or than `fallback_end` when the
/// window has a single date, is some other date and the label is skipped.
fn labelled_range(text: &str, fallback_end: Option<NaiveDate>) -> (Option<NaiveDate>, Option<NaiveDate>) {
    for m in re_period_label().find_iter(text) {
        let window: String = text[m.end()..].chars().take(PERIOD_WINDOW_CHARS).collect();
        let dates = dates_in(&window);
        let Some(&start) = dates.first() else { continue };
        let end = dates.get(1).copied();
        if end.or(fallback_end).is_some_and(|e| start > e) {
            continue;
        }
        return (Some(start), end);
    }
    (None, None)
}

/// "October 2025" in the header implies a period ending 1 November 2025.
fn header_period_end(lines: &[&str]) -> Option<NaiveDate> {
    lines.iter().take(HEADER_LINES).find_map(|l| {
        let c = re_header_month().captures(l)?;
        let month = month_number(c.get(1)?.as_str())?;
        let year: i32 = c.get(2)?.as_str().parse().ok()?;
        plausible_date(year, month, 1)?;
        first_of_next_month(year, month)
    })
}
