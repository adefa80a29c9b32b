use racun_core::text::is_cyrillic;

/// Comparison key for invoice numbers: Latin and Cyrillic letters plus digits,
/// lowercased. `None` when nothing survives.
pub fn invoice_key(raw: &str) -> Option<String> {
    let key: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() && (is_latin(*c) || is_cyrillic(*c)))
        .flat_map(char::to_lowercase)
        .collect();
    (!key.is_empty()).then_some(key)
}

/// Trimmed billing-account number, `None` when blank.
pub fn account_key(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|a| !a.is_empty())
}

fn is_latin(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '\u{00C0}'..='\u{024F}')
}
