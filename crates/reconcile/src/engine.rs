use std::fmt;

use racun_core::{PaymentStatus, StoredBill, UtilityBillCandidate};

use crate::util::{account_key, invoice_key};

/// Which tier linked a candidate to an existing bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    PaymentIdentity,
    InvoiceNumber,
    AccountAndAmount,
}

impl fmt::Display for MatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchReason::PaymentIdentity => write!(f, "payment identity"),
            MatchReason::InvoiceNumber => write!(f, "invoice number"),
            MatchReason::AccountAndAmount => write!(f, "billing account and amount"),
        }
    }
}

/// Outcome of classifying one candidate against nearby stored bills.
/// Borrows the matched record from the caller's pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReconciliationVerdict<'a> {
    NoDuplicate,
    DuplicateOfPaidBill(&'a StoredBill),
    DuplicateOfUnpaidBill(&'a StoredBill, MatchReason),
    /// A correction for a bill that is already paid. Never applied automatically.
    CorrectionOfPaidBill(&'a StoredBill),
    ReplaceExisting(&'a StoredBill, MatchReason),
}

impl<'a> ReconciliationVerdict<'a> {
    /// Blocking verdicts forbid inserting the candidate.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            ReconciliationVerdict::DuplicateOfPaidBill(_)
                | ReconciliationVerdict::DuplicateOfUnpaidBill(..)
                | ReconciliationVerdict::CorrectionOfPaidBill(_)
        )
    }

    pub fn existing(&self) -> Option<&'a StoredBill> {
        match *self {
            ReconciliationVerdict::NoDuplicate => None,
            ReconciliationVerdict::DuplicateOfPaidBill(e)
            | ReconciliationVerdict::DuplicateOfUnpaidBill(e, _)
            | ReconciliationVerdict::CorrectionOfPaidBill(e)
            | ReconciliationVerdict::ReplaceExisting(e, _) => Some(e),
        }
    }
}

impl fmt::Display for ReconciliationVerdict<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconciliationVerdict::NoDuplicate => write!(f, "new bill"),
            ReconciliationVerdict::DuplicateOfPaidBill(e) => {
                write!(f, "duplicate of paid bill #{}", e.id)
            }
            ReconciliationVerdict::DuplicateOfUnpaidBill(e, reason) => {
                write!(f, "duplicate of unpaid bill #{} (same {reason})", e.id)
            }
            ReconciliationVerdict::CorrectionOfPaidBill(e) => {
                write!(f, "correction of already paid bill #{}", e.id)
            }
            ReconciliationVerdict::ReplaceExisting(e, reason) => {
                write!(f, "replaces bill #{} (same {reason})", e.id)
            }
        }
    }
}

pub struct ReconciliationEngine;

impl ReconciliationEngine {
    /// Classify `candidate` against `pool`, the caller's snapshot of bills near
    /// its record date or amount. Tiers are tried in order and the first match
    /// decides; within a tier visible bills win over hidden ones.
    pub fn classify<'a>(
        candidate: &UtilityBillCandidate,
        pool: &'a [StoredBill],
    ) -> ReconciliationVerdict<'a> {
        match Self::find_match(candidate, pool) {
            Some((existing, reason)) => Self::outcome(candidate, existing, reason),
            None => ReconciliationVerdict::NoDuplicate,
        }
    }

    fn find_match<'a>(
        candidate: &UtilityBillCandidate,
        pool: &'a [StoredBill],
    ) -> Option<(&'a StoredBill, MatchReason)> {
        if let Some(identity) = &candidate.payment_identity {
            if let Some(e) = preferred(pool, |e| e.payment_identity.as_ref() == Some(identity)) {
                return Some((e, MatchReason::PaymentIdentity));
            }
        }

        if let Some(key) = candidate.bill.invoice_number.as_deref().and_then(invoice_key) {
            let same_invoice =
                |e: &StoredBill| e.invoice_number.as_deref().and_then(invoice_key).as_deref() == Some(key.as_str());
            if let Some(e) = preferred(pool, same_invoice) {
                return Some((e, MatchReason::InvoiceNumber));
            }
        }

        // Account + amount is only meaningful when neither side has an identity.
        if candidate.payment_identity.is_some() {
            return None;
        }
        let account = account_key(candidate.billing_account_number.as_deref())?;
        let total = candidate.bill.total?;
        preferred(pool, |e| {
            e.payment_identity.is_none()
                && account_key(e.billing_account_number.as_deref()) == Some(account)
                && e.total == Some(total)
        })
        .map(|e| (e, MatchReason::AccountAndAmount))
    }

    fn outcome<'a>(
        candidate: &UtilityBillCandidate,
        existing: &'a StoredBill,
        reason: MatchReason,
    ) -> ReconciliationVerdict<'a> {
        use ReconciliationVerdict::*;

        match (candidate.is_correction, existing.is_correction, existing.status) {
            (false, true, _) => ReplaceExisting(existing, reason),
            (true, _, PaymentStatus::Paid) => CorrectionOfPaidBill(existing),
            (true, false, PaymentStatus::Unpaid) => ReplaceExisting(existing, reason),
            (_, _, PaymentStatus::Paid) => DuplicateOfPaidBill(existing),
            (_, _, PaymentStatus::Unpaid) => DuplicateOfUnpaidBill(existing, reason),
        }
    }
}

fn preferred<'a>(
    pool: &'a [StoredBill],
    matches: impl Fn(&StoredBill) -> bool,
) -> Option<&'a StoredBill> {
    pool.iter()
        .find(|e| e.visible && matches(*e))
        .or_else(|| pool.iter().find(|e| matches(*e)))
}
