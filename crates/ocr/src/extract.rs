use regex::Regex;
use rust_decimal::Decimal;
use std::sync::OnceLock;

use chrono::NaiveDate;
use racun_core::text::normalize_casing;
use racun_core::{BillCandidate, LineItem, Money};

use crate::numbers::{
    amounts_in_line, dates_in, first_date, largest_amount, parse_amount_token, parse_quantity, re,
};

// ── Compiled regex cache ─────────────────────────────────────────────────────

re!(re_legal_form,
    r"(?i)(?:^|[^\p{L}])(?:d\.\s?o\.\s?o|doo|д\.\s?о\.\s?о|доо|a\.\s?d|а\.\s?д|jkp|јкп|jp|јп)(?:[^\p{L}]|$)");
re!(re_customer_line,
    r"(?i)kupac|купац|korisnik|корисник|platilac|платилац|potrošač|потрошач");
re!(re_seller_label,
    r"(?i)^\s*(?:prodavac|продавац|izdavalac(?:\s+računa)?|издавалац(?:\s+рачуна)?|dobavljač|добављач|isporučilac|испоручилац)\s*:?\s*(.*)$");
re!(re_header_word,
    r"(?i)račun|рачун|faktura|фактура|invoice|datum|датум|strana|страна|broj|број|tel|fax|www|@|pib|пиб|matični|матични|tekući|текући");
re!(re_address_marker,
    r"(?i)\s(?:ul\.|ulica|улица|ул\.|bul\.|bulevar|бул\.|булевар|trg|трг)\s");
re!(re_postal_code, r"\b\d{5}\b");
re!(re_tax_id, r"(?i)\bpib\b|\bпиб\b|\b\d{9}\b");

re!(re_date_keyword, r"(?i)datum|датум|izdat|издат|izdavanja|издавања");
re!(re_due_keyword, r"(?i)rok|рок|dospe|доспе|platiti\s+do|платити\s+до|valuta|валута");
re!(re_due_label,
    r"(?i)rok\s+pla[cć]anja|рок\s+плаћања|datum\s+dospe[cć]a|датум\s+доспећа|dospeva|доспева|platiti\s+do|платити\s+до|valuta\s+pla[cć]anja|валута\s+плаћања");

re!(re_strong_total,
    r"(?i)za\s+uplatu|за\s+уплату|za\s+pla[cć]anje|за\s+плаћање|iznos\s+duga|износ\s+дуга");
re!(re_currency_unit, r"(?i)\b(?:rsd|din|dinara)\b|дин");
re!(re_weak_total, r"(?i)ukupno|укупно|total|iznos|износ");
re!(re_eur, r"(?i)\beur\b|€");

re!(re_recipient_label,
    r"(?i)^\s*(?:primalac(?:\s+pla[cć]anja)?|прималац(?:\s+плаћања)?|korisnik\s+uplate|корисник\s+уплате)\s*:?\s*(.*)$");
re!(re_municipality,
    r"(?i)\b\d{5}\s+(?:novi\s+beograd|beograd|zemun|novi\s+sad|niš|nis|kragujevac|subotica|zrenjanin|pančevo|pancevo|čačak|cacak|kraljevo|novi\s+pazar|smederevo|leskovac|valjevo|kruševac|krusevac|vranje|šabac|sabac|užice|uzice|sombor|požarevac|pozarevac|pirot|нови\s+београд|београд|земун|нови\s+сад|ниш|крагујевац|суботица|зрењанин|панчево|чачак|краљево|нови\s+пазар|смедерево|лесковац|ваљево|крушевац|врање|шабац|ужице|сомбор|пожаревац|пирот)\b");

re!(re_item_price_qty_total,
    r"^(.*?)\s*(\d{1,3}(?:\.\d{3})+,\d{2}|\d+,\d{2}|\d+\.\d{2})\s+(\d+(?:[.,]\d{1,3})?)\s+(\d{1,3}(?:\.\d{3})+,\d{2}|\d+,\d{2}|\d+\.\d{2})\s*(?:rsd|din\.?)?\s*$");
re!(re_item_qty_x_price_total,
    r"(?i)^(.*?)\s*(\d+(?:[.,]\d{1,3})?)\s*[x×*]\s*(\d{1,3}(?:\.\d{3})+,\d{2}|\d+,\d{2}|\d+\.\d{2})\s+(\d{1,3}(?:\.\d{3})+,\d{2}|\d+,\d{2}|\d+\.\d{2})\s*(?:rsd|din\.?)?\s*$");

/// Merchants recognised by name, lowercase needle first.
const KNOWN_MERCHANTS: &[(&str, &str)] = &[
    ("eps snabdevanje", "EPS Snabdevanje"),
    ("епс снабдевање", "ЕПС Снабдевање"),
    ("elektroprivreda srbije", "Elektroprivreda Srbije"),
    ("електропривреда србије", "Електропривреда Србије"),
    ("infostan", "Infostan tehnologije"),
    ("инфостан", "Инфостан технологије"),
    ("telekom srbija", "Telekom Srbija"),
    ("телеком србија", "Телеком Србија"),
    ("yettel", "Yettel"),
    ("a1 srbija", "A1 Srbija"),
    ("sbb d.o.o", "SBB"),
    ("srbijagas", "Srbijagas"),
    ("србијагас", "Србијагас"),
    ("beogradske elektrane", "Beogradske elektrane"),
    ("београдске електране", "Београдске електране"),
    ("beogradski vodovod", "JKP Beogradski vodovod i kanalizacija"),
    ("београдски водовод", "ЈКП Београдски водовод и канализација"),
    ("gradska čistoća", "JKP Gradska čistoća"),
    ("градска чистоћа", "ЈКП Градска чистоћа"),
    ("orion telekom", "Orion telekom"),
];

/// Invoice-number labels in priority order. The billing-account labels
/// (`broj kupca`, `naplatni broj`) are deliberately absent.
const INVOICE_LABELS: &[&str] = &[
    r"broj\s+ra[cč]una",
    r"ra[cč]un\s+broj",
    r"ra[cč]un\s+br\.?",
    r"br\.?\s+ra[cč]una",
    r"broj\s+fakture",
    r"faktura\s+broj",
    r"faktura\s+br\.?",
    r"br\.?\s+fakture",
    r"ra[cč]un-otpremnica\s+br\.?",
    r"broj\s+dokumenta",
    r"invoice\s+(?:no\.?|number|#)",
    r"број\s+рачуна",
    r"рачун\s+број",
    r"рачун\s+бр\.?",
    r"бр\.?\s+рачуна",
    r"број\s+фактуре",
    r"фактура\s+број",
    r"фактура\s+бр\.?",
    r"бр\.?\s+фактуре",
    r"рачун-отпремница\s+бр\.?",
    r"број\s+документа",
    r"poziv\s+na\s+broj",
    r"позив\s+на\s+број",
];

const MIN_INVOICE_DIGITS: usize = 7;
const MERCHANT_SCAN_LINES: usize = 20;
const WEAK_TOTAL_FLOOR: Decimal = Decimal::from_parts(100, 0, 0, false, 0);
const TAIL_TOTAL_FLOOR: Decimal = Decimal::from_parts(50, 0, 0, false, 0);
/// Line items are accepted when price × quantity lands within this many
/// currency units of the printed total. Rounding heuristic, not a rule.
const LINE_ITEM_TOLERANCE: Decimal = Decimal::ONE;

fn invoice_patterns() -> &'static [Regex] {
    static R: OnceLock<Vec<Regex>> = OnceLock::new();
    R.get_or_init(|| {
        INVOICE_LABELS
            .iter()
            .map(|label| {
                let pat = format!(
                    r"(?i)(?:^|[^\p{{L}}]){label}\s*(?:\([^)]*\))?\s*[:#.]?\s*([0-9]+(?:[-/][0-9]+)*)"
                );
                Regex::new(&pat).expect("invalid regex")
            })
            .collect()
    })
}

// ── Public extraction API ─────────────────────────────────────────────────────

/// Field-by-field extraction from OCR text of an arbitrary bill.
pub struct BillExtractor;

impl BillExtractor {
    /// Every field is searched independently; a miss leaves it `None`.
    pub fn extract(text: &str) -> BillCandidate {
        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        let (recipient_name, recipient_address) = Self::extract_recipient(&lines);
        BillCandidate {
            merchant: Self::extract_merchant(&lines),
            issue_date: Self::extract_issue_date(&lines),
            total: Self::extract_total(&lines),
            currency: Self::extract_currency(text),
            invoice_number: extract_invoice_number(text),
            due_date: extract_due_date(&lines),
            recipient_name,
            recipient_address,
            source_document_id: None,
            line_items: Self::extract_line_items(&lines),
        }
    }

    // ── Merchant ──────────────────────────────────────────────────────────────

    fn extract_merchant(lines: &[&str]) -> Option<String> {
        let head = &lines[..lines.len().min(MERCHANT_SCAN_LINES)];

        for line in head {
            let lower = line.to_lowercase();
            if let Some((_, name)) = KNOWN_MERCHANTS.iter().find(|(needle, _)| lower.contains(needle)) {
                return Some((*name).to_string());
            }
        }

        let raw = head
            .iter()
            .find(|l| re_legal_form().is_match(l) && !re_customer_line().is_match(l))
            .map(|l| l.to_string())
            .or_else(|| Self::seller_labelled(lines))
            .or_else(|| {
                head.iter()
                    .find(|l| {
                        let len = l.chars().count();
                        (3..=40).contains(&len)
                            && l.chars().any(char::is_alphabetic)
                            && !l.starts_with(|c: char| c.is_ascii_digit())
                            && !re_header_word().is_match(l)
                            && !re_customer_line().is_match(l)
                    })
                    .map(|l| l.to_string())
            })?;

        let name = normalize_casing(truncate_merchant(&raw));
        (!name.is_empty()).then_some(name)
    }

    fn seller_labelled(lines: &[&str]) -> Option<String> {
        lines.iter().enumerate().find_map(|(i, l)| {
            let c = re_seller_label().captures(l)?;
            let inline = c.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            if !inline.is_empty() {
                return Some(inline.to_string());
            }
            lines[i + 1..]
                .iter()
                .find(|next| !next.is_empty())
                .map(|next| next.to_string())
        })
    }

    // ── Issue date ────────────────────────────────────────────────────────────

    fn extract_issue_date(lines: &[&str]) -> Option<NaiveDate> {
        let preferred = lines
            .iter()
            .filter(|l| re_date_keyword().is_match(l) && !re_due_keyword().is_match(l))
            .find_map(|l| first_date(l));
        preferred.or_else(|| lines.iter().find_map(|l| first_date(l)))
    }

    // ── Total ─────────────────────────────────────────────────────────────────

    fn extract_total(lines: &[&str]) -> Option<Money> {
        // 1. strong keyword with the amount on the same line
        let total = lines
            .iter()
            .filter(|l| is_strong_total(l))
            .find_map(|l| largest_amount(l))
            // 2. strong keyword with the amount on the following line
            .or_else(|| {
                lines.iter().enumerate().filter(|(_, l)| is_strong_total(l)).find_map(|(i, _)| {
                    lines.get(i + 1).and_then(|next| largest_amount(next))
                })
            })
            // 3. any line carrying a currency unit
            .or_else(|| {
                lines
                    .iter()
                    .filter(|l| re_currency_unit().is_match(l))
                    .filter_map(|l| largest_amount(l))
                    .max()
            })
            // 4. weak "total" keyword with a plausible value
            .or_else(|| {
                lines
                    .iter()
                    .filter(|l| re_weak_total().is_match(l))
                    .filter_map(|l| largest_amount(l))
                    .filter(|a| *a > WEAK_TOTAL_FLOOR)
                    .max()
            })
            // 5. largest decimal in the bottom fifth of the page
            .or_else(|| {
                let tail_start = lines.len() * 4 / 5;
                lines[tail_start..]
                    .iter()
                    .flat_map(|l| amounts_in_line(l))
                    .filter(|a| *a > TAIL_TOTAL_FLOOR)
                    .max()
            })?;
        Money::from_decimal(total)
    }

    fn extract_currency(text: &str) -> Option<String> {
        if re_currency_unit().is_match(text) {
            Some("RSD".to_string())
        } else if re_eur().is_match(text) {
            Some("EUR".to_string())
        } else {
            None
        }
    }

    // ── Recipient ─────────────────────────────────────────────────────────────

    fn extract_recipient(lines: &[&str]) -> (Option<String>, Option<String>) {
        for (i, line) in lines.iter().enumerate() {
            let Some(c) = re_recipient_label().captures(line) else { continue };
            let inline = c.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            let mut rest = lines[i + 1..].iter().filter(|l| !l.is_empty());
            let name = if inline.is_empty() { rest.next().copied() } else { Some(inline) };
            let Some(name) = name.filter(|n| n.chars().any(char::is_alphabetic)) else { continue };
            let address = rest
                .next()
                .filter(|l| l.chars().any(|c| c.is_ascii_digit()) && l.chars().any(char::is_alphabetic))
                .map(|l| l.to_string());
            return (Some(normalize_casing(name)), address);
        }

        // Postal code + municipality implies a name/address block just above.
        let top = &lines[..lines.len().div_ceil(2)];
        for (i, line) in top.iter().enumerate() {
            let Some(m) = re_municipality().find(line) else { continue };
            if i == 0 {
                continue;
            }
            let city = m.as_str().trim();
            let (name, street) = if i >= 2 {
                (lines[i - 2], Some(lines[i - 1]))
            } else {
                (lines[i - 1], None)
            };
            if name.is_empty() || !name.chars().any(char::is_alphabetic) {
                continue;
            }
            let address = match street.filter(|s| !s.is_empty()) {
                Some(street) => format!("{street}, {city}"),
                None => city.to_string(),
            };
            return (Some(normalize_casing(name)), Some(address));
        }
        (None, None)
    }

    // ── Line items ────────────────────────────────────────────────────────────

    fn extract_line_items(lines: &[&str]) -> Vec<LineItem> {
        lines
            .iter()
            .enumerate()
            .filter_map(|(i, line)| {
                let (name, qty, price, total) = match_line_item(line)?;
                let diff = (price * qty - total).abs();
                if diff >= LINE_ITEM_TOLERANCE {
                    return None;
                }
                let name = if name.chars().filter(|c| c.is_alphabetic()).count() >= 3 {
                    name
                } else {
                    lines[..i].iter().rev().find(|l| !l.is_empty())?.to_string()
                };
                Some(LineItem {
                    name,
                    quantity: qty,
                    unit_price: Money::from_decimal(price)?,
                    total: Money::from_decimal(total)?,
                })
            })
            .collect()
    }
}

/// Labelled invoice number with at least seven digits once separators go.
pub fn extract_invoice_number(text: &str) -> Option<String> {
    invoice_patterns().iter().find_map(|re| {
        re.captures_iter(text).find_map(|c| {
            let digits: String = c.get(1)?.as_str().chars().filter(char::is_ascii_digit).collect();
            (digits.len() >= MIN_INVOICE_DIGITS).then_some(digits)
        })
    })
}

/// First date after a due-date label, on the same line or the next one.
pub fn extract_due_date(lines: &[&str]) -> Option<NaiveDate> {
    lines.iter().enumerate().find_map(|(i, line)| {
        let m = re_due_label().find(line)?;
        dates_in(&line[m.end()..])
            .into_iter()
            .next()
            .or_else(|| lines.get(i + 1).and_then(|next| first_date(next)))
    })
}

fn is_strong_total(line: &str) -> bool {
    re_strong_total().is_match(line)
}

fn truncate_merchant(raw: &str) -> &str {
    let mut cut = raw.len();
    if let Some(i) = raw.find(',') {
        cut = cut.min(i);
    }
    for re in [re_address_marker(), re_postal_code(), re_tax_id()] {
        if let Some(m) = re.find(raw) {
            cut = cut.min(m.start());
        }
    }
    raw[..cut].trim_end_matches(|c: char| c.is_whitespace() || matches!(c, '-' | ':' | ';' | ','))
}

fn match_line_item(line: &str) -> Option<(String, Decimal, Decimal, Decimal)> {
    if let Some(c) = re_item_qty_x_price_total().captures(line) {
        let qty = parse_quantity(c.get(2)?.as_str())?;
        let price = parse_amount_token(c.get(3)?.as_str())?;
        let total = parse_amount_token(c.get(4)?.as_str())?;
        return Some((clean_item_name(c.get(1)?.as_str()), qty, price, total));
    }
    let c = re_item_price_qty_total().captures(line)?;
    let price = parse_amount_token(c.get(2)?.as_str())?;
    let qty = parse_quantity(c.get(3)?.as_str())?;
    let total = parse_amount_token(c.get(4)?.as_str())?;
    Some((clean_item_name(c.get(1)?.as_str()), qty, price, total))
}

fn clean_item_name(s: &str) -> String {
    s.trim()
        .trim_end_matches(|c: char| matches!(c, ':' | '-' | '|'))
        .trim()
        .to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
