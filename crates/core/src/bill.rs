use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;
use crate::payment::PaymentQrPayload;
use crate::period;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BillId(pub i64);

impl fmt::Display for BillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Unpaid => write!(f, "unpaid"),
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(PaymentStatus::Paid),
            "unpaid" => Ok(PaymentStatus::Unpaid),
            other => Err(format!("Unknown payment status: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    pub total: Money,
}

/// Fields recovered from one document by the generic text parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillCandidate {
    pub merchant: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub total: Option<Money>,
    pub currency: Option<String>,
    pub invoice_number: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub recipient_name: Option<String>,
    pub recipient_address: Option<String>,
    pub source_document_id: Option<String>,
    pub line_items: Vec<LineItem>,
}

/// Deterministic key for "the same billing event":
/// `{billing account}-{YYYYMMDD start}-{YYYYMMDD end}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentIdentity(String);

impl PaymentIdentity {
    /// `None` when any component is missing or the account is blank.
    pub fn derive(
        billing_account: Option<&str>,
        period_start: Option<NaiveDate>,
        period_end: Option<NaiveDate>,
    ) -> Option<Self> {
        let account = billing_account.map(str::trim).filter(|a| !a.is_empty())?;
        let start = period_start?;
        let end = period_end?;
        Some(PaymentIdentity(format!(
            "{account}-{}-{}",
            period::compact(start),
            period::compact(end)
        )))
    }

    /// Wraps an identity read back from storage.
    pub fn from_stored(raw: String) -> Self {
        PaymentIdentity(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UtilityBillCandidate {
    pub bill: BillCandidate,
    pub billing_account_number: Option<String>,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    /// Higher-tariff (VT) consumption in kWh.
    pub consumption_vt: Option<Decimal>,
    /// Lower-tariff (NT) consumption in kWh.
    pub consumption_nt: Option<Decimal>,
    pub consumption_total: Option<Decimal>,
    pub is_correction: bool,
    pub record_date: Option<NaiveDate>,
    pub payment_identity: Option<PaymentIdentity>,
}

impl UtilityBillCandidate {
    /// Recomputes the identity from the current account and period fields.
    pub fn refresh_identity(&mut self) {
        self.payment_identity = PaymentIdentity::derive(
            self.billing_account_number.as_deref(),
            self.period_start,
            self.period_end,
        );
    }
}

/// A bill as persisted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredBill {
    pub id: BillId,
    pub status: PaymentStatus,
    pub visible: bool,
    pub merchant: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub total: Option<Money>,
    pub invoice_number: Option<String>,
    pub billing_account_number: Option<String>,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub payment_identity: Option<PaymentIdentity>,
    pub is_correction: bool,
    pub has_qr_payload: bool,
    pub created_at: DateTime<Utc>,
}

impl StoredBill {
    pub fn has_invoice_number(&self) -> bool {
        self.invoice_number.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    pub fn has_payment_identity(&self) -> bool {
        self.payment_identity.is_some()
    }

    pub fn has_billing_account_number(&self) -> bool {
        self.billing_account_number
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }
}

/// The merged record handed to the store for insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBill {
    pub candidate: UtilityBillCandidate,
    pub qr_payload: Option<PaymentQrPayload>,
    pub status: PaymentStatus,
    pub visible: bool,
    pub external_id: Option<String>,
    pub storage_path: Option<String>,
}
