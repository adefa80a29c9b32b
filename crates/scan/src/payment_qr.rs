//! Parser for payment barcodes: `K:PR|V:01|C:1|R:…|N:…|I:RSD1234,56|…`.

use racun_core::text::normalize_casing;
use racun_core::{Money, PaymentQrPayload};
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::OnceLock;

/// The first segment of every payment payload.
pub const MARKER: &str = "K:PR";

fn re_amount() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"^([A-Z]{3})(\d+)(?:,(\d+))?$").expect("invalid regex"))
}

/// True when `text` carries the payment marker.
pub fn is_payment_payload(text: &str) -> bool {
    first_segment(text) == Some(MARKER)
}

/// Parse a payment payload. Anything without the leading marker is not a
/// payment barcode and yields `None`; a malformed amount only drops the amount.
pub fn parse(text: &str) -> Option<PaymentQrPayload> {
    if !is_payment_payload(text) {
        return None;
    }

    let mut payload = PaymentQrPayload::default();
    for segment in clean(text).split('|').skip(1) {
        let Some((key, value)) = segment.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "V" => payload.version = Some(value.to_string()),
            "C" => payload.charset = Some(value.to_string()),
            "R" => payload.recipient_account = Some(value.chars().filter(|c| !c.is_whitespace()).collect()),
            "N" => {
                let mut lines = value.lines().map(str::trim).filter(|l| !l.is_empty());
                payload.recipient_name = lines.next().map(normalize_casing);
                let address: Vec<&str> = lines.collect();
                if !address.is_empty() {
                    payload.recipient_address = Some(address.join(", "));
                }
            }
            "I" => {
                if let Some((currency, amount)) = parse_amount(value) {
                    payload.currency = Some(currency);
                    payload.amount = Some(amount);
                }
            }
            "P" => payload.payer_name = value.lines().next().map(normalize_casing),
            "SF" => payload.purpose_code = Some(value.to_string()),
            "S" => payload.purpose_description = Some(value.to_string()),
            "RO" => payload.reference = Some(value.to_string()),
            _ => {}
        }
    }
    Some(payload)
}

fn clean(text: &str) -> &str {
    text.trim_start_matches('\u{feff}').trim()
}

fn first_segment(text: &str) -> Option<&str> {
    clean(text).split('|').next().map(str::trim)
}

fn parse_amount(value: &str) -> Option<(String, Money)> {
    let c = re_amount().captures(value)?;
    let units = c.get(2)?.as_str();
    let cents = c.get(3).map_or("0", |m| m.as_str());
    let decimal = Decimal::from_str(&format!("{units}.{cents}")).ok()?;
    Some((c.get(1)?.as_str().to_string(), Money::from_decimal(decimal)?))
}
