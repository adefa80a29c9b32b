/// Recognises barcode payloads of receipts for purchases already paid.
pub trait PaidReceiptDetector: Send + Sync {
    fn is_paid_receipt(&self, payload: &str) -> bool;
}

/// Matches payloads against configured URL prefixes (fiscal receipt
/// verification links).
pub struct ReceiptUrlDetector {
    prefixes: Vec<String>,
}

impl ReceiptUrlDetector {
    pub fn new(prefixes: Vec<String>) -> Self {
        let prefixes = prefixes
            .into_iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { prefixes }
    }
}

impl PaidReceiptDetector for ReceiptUrlDetector {
    fn is_paid_receipt(&self, payload: &str) -> bool {
        let payload = payload.trim().to_lowercase();
        self.prefixes.iter().any(|p| payload.starts_with(p.as_str()))
    }
}

/// Phrases that identify bank statements.
pub struct BankStatementFilter {
    markers: Vec<String>,
}

impl BankStatementFilter {
    pub fn new(markers: &[String]) -> Self {
        let markers = markers
            .iter()
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        Self { markers }
    }

    pub fn is_bank_statement(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.markers.iter().any(|m| text.contains(m.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_urls_match_by_prefix() {
        let d = ReceiptUrlDetector::new(vec!["https://suf.purs.gov.rs/v/".into(), "  ".into()]);
        assert!(d.is_paid_receipt("HTTPS://SUF.PURS.GOV.RS/v/?vl=A0NYWUxQWVFB"));
        assert!(!d.is_paid_receipt("K:PR|V:01"));
        assert!(!d.is_paid_receipt(""));
    }

    #[test]
    fn statements_match_in_either_script() {
        let f = BankStatementFilter::new(&["izvod broj".into(), "промет по рачуну".into()]);
        assert!(f.is_bank_statement("BANKA INTESA\nIZVOD BROJ 12"));
        assert!(f.is_bank_statement("ПРОМЕТ ПО РАЧУНУ за октобар"));
        assert!(!f.is_bank_statement("Račun za električnu energiju"));
    }
}
