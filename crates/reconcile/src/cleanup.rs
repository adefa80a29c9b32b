//! Batch cleanup of duplicates that are already in the store.

use std::cmp::{Ordering, Reverse};
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use racun_core::{BillId, Money, PaymentStatus, StoredBill};

use crate::util::{account_key, invoice_key};

const PAID_SCORE: i64 = 100;
const QR_SCORE: i64 = 10;
const INVOICE_SCORE: i64 = 5;
const IDENTITY_SCORE: i64 = 5;
const ACCOUNT_SCORE: i64 = 3;
/// One point lost per week of age, down to zero after ten weeks.
const RECENCY_BONUS_MAX: i64 = 10;

/// How well-documented a stored bill is. Used only to pick the survivor of a
/// duplicate group; classification of new candidates never looks at it.
pub fn completeness_score(bill: &StoredBill, now: DateTime<Utc>) -> i64 {
    let mut score = 0;
    if bill.status == PaymentStatus::Paid {
        score += PAID_SCORE;
    }
    if bill.has_qr_payload {
        score += QR_SCORE;
    }
    if bill.has_invoice_number() {
        score += INVOICE_SCORE;
    }
    if bill.has_payment_identity() {
        score += IDENTITY_SCORE;
    }
    if bill.has_billing_account_number() {
        score += ACCOUNT_SCORE;
    }
    let age_weeks = (now - bill.created_at).num_days().max(0) / 7;
    score + RECENCY_BONUS_MAX - age_weeks.min(RECENCY_BONUS_MAX)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum GroupKey {
    Identity(String),
    Invoice(String),
    AccountAndAmount(String, Money),
}

impl GroupKey {
    fn of(bill: &StoredBill) -> Option<Self> {
        if let Some(identity) = &bill.payment_identity {
            return Some(GroupKey::Identity(identity.as_str().to_string()));
        }
        if let Some(key) = bill.invoice_number.as_deref().and_then(invoice_key) {
            return Some(GroupKey::Invoice(key));
        }
        let account = account_key(bill.billing_account_number.as_deref())?;
        Some(GroupKey::AccountAndAmount(account.to_string(), bill.total?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    pub key: GroupKey,
    pub keep: BillId,
    pub hide: Vec<BillId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanupPlan {
    pub groups: Vec<DuplicateGroup>,
}

impl CleanupPlan {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Every bill the plan hides, in group order.
    pub fn hidden(&self) -> impl Iterator<Item = BillId> + '_ {
        self.groups.iter().flat_map(|g| g.hide.iter().copied())
    }
}

/// Group visible bills by identity, else invoice number, else account and
/// amount, and keep the best-scored bill of every group with more than one
/// member. Ties go to the newer bill, then the lower id.
pub fn plan_cleanup(bills: &[StoredBill], now: DateTime<Utc>) -> CleanupPlan {
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut grouped: Vec<(GroupKey, Vec<&StoredBill>)> = Vec::new();

    for bill in bills.iter().filter(|b| b.visible) {
        let Some(key) = GroupKey::of(bill) else { continue };
        match index.get(&key) {
            Some(&i) => grouped[i].1.push(bill),
            None => {
                index.insert(key.clone(), grouped.len());
                grouped.push((key, vec![bill]));
            }
        }
    }

    let groups = grouped
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .filter_map(|(key, members)| {
            let winner = members.iter().copied().max_by(|a, b| rank(a, b, now))?;
            let hide = members
                .iter()
                .filter(|b| b.id != winner.id)
                .map(|b| b.id)
                .collect();
            Some(DuplicateGroup { key, keep: winner.id, hide })
        })
        .collect();

    CleanupPlan { groups }
}

fn rank(a: &StoredBill, b: &StoredBill, now: DateTime<Utc>) -> Ordering {
    let key = |bill: &StoredBill| (completeness_score(bill, now), bill.created_at, Reverse(bill.id));
    key(a).cmp(&key(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use racun_core::PaymentIdentity;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 1, 12, 0, 0).unwrap()
    }

    fn bill(id: i64) -> StoredBill {
        StoredBill {
            id: BillId(id),
            status: PaymentStatus::Unpaid,
            visible: true,
            merchant: None,
            issue_date: None,
            due_date: None,
            total: Some(Money::from_cents(120_000)),
            invoice_number: None,
            billing_account_number: None,
            period_start: None,
            period_end: None,
            payment_identity: None,
            is_correction: false,
            has_qr_payload: false,
            created_at: now(),
        }
    }

    fn with_identity(mut b: StoredBill) -> StoredBill {
        let d = |m, day| NaiveDate::from_ymd_opt(2025, m, day);
        b.billing_account_number = Some("2004158536".into());
        b.payment_identity = PaymentIdentity::derive(Some("2004158536"), d(10, 5), d(11, 1));
        b
    }

    #[test]
    fn score_components() {
        let mut b = bill(1);
        assert_eq!(completeness_score(&b, now()), 10);
        b.status = PaymentStatus::Paid;
        b.has_qr_payload = true;
        b.invoice_number = Some("123".into());
        let b = with_identity(b);
        assert_eq!(completeness_score(&b, now()), 100 + 10 + 5 + 5 + 3 + 10);
    }

    #[test]
    fn recency_bonus_decays_weekly() {
        let mut b = bill(1);
        b.created_at = now() - Duration::days(15);
        assert_eq!(completeness_score(&b, now()), 8);
        b.created_at = now() - Duration::days(400);
        assert_eq!(completeness_score(&b, now()), 0);
    }

    #[test]
    fn paid_record_survives() {
        let unpaid = with_identity(bill(1));
        let mut paid = with_identity(bill(2));
        paid.status = PaymentStatus::Paid;
        paid.created_at = now() - Duration::days(60);
        let plan = plan_cleanup(&[unpaid, paid], now());
        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.groups[0].keep, BillId(2));
        assert_eq!(plan.hidden().collect::<Vec<_>>(), vec![BillId(1)]);
    }

    #[test]
    fn ties_prefer_newer_then_lower_id() {
        let mut older = with_identity(bill(1));
        older.created_at = now() - Duration::hours(1);
        let newer = with_identity(bill(2));
        let plan = plan_cleanup(&[older, newer], now());
        assert_eq!(plan.groups[0].keep, BillId(2));

        let plan = plan_cleanup(&[with_identity(bill(9)), with_identity(bill(4))], now());
        assert_eq!(plan.groups[0].keep, BillId(4));
    }

    #[test]
    fn grouping_falls_back_to_invoice_then_account_amount() {
        let mut a = bill(1);
        a.invoice_number = Some("RN-77".into());
        let mut b = bill(2);
        b.invoice_number = Some("rn 77".into());
        let mut c = bill(3);
        c.billing_account_number = Some("555".into());
        let mut d = bill(4);
        d.billing_account_number = Some(" 555 ".into());
        let plan = plan_cleanup(&[a, b, c, d], now());
        assert_eq!(plan.groups.len(), 2);
        assert_eq!(plan.groups[0].key, GroupKey::Invoice("rn77".into()));
        assert_eq!(
            plan.groups[1].key,
            GroupKey::AccountAndAmount("555".into(), Money::from_cents(120_000))
        );
    }

    #[test]
    fn hidden_and_keyless_bills_are_left_alone() {
        let mut hidden = with_identity(bill(1));
        hidden.visible = false;
        let plan = plan_cleanup(&[hidden, with_identity(bill(2)), bill(3), bill(4)], now());
        assert!(plan.is_empty());
    }
}
