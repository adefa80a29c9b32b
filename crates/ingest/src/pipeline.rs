use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use racun_core::{
    BillCandidate, BillId, DateRange, NewBill, PaymentQrPayload, PaymentStatus, StoredBill,
    UtilityBillCandidate,
};
use racun_ocr::{normalize, BillExtractor, OcrEngine, UtilityExtractor};
use racun_reconcile::{plan_cleanup, CleanupPlan, ReconciliationEngine, ReconciliationVerdict};
use racun_scan::{payment_qr, DecodeCascade};
use racun_storage::{BillStore, StorageError};

use crate::config::IngestConfig;
use crate::detector::{BankStatementFilter, PaidReceiptDetector, ReceiptUrlDetector};
use crate::document::Document;
use crate::error::{DuplicateBlocked, IngestError};

/// What happened to a single document that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentOutcome {
    AlreadySeen,
    /// No payment barcode and not a paid receipt.
    NotPayable,
    BankStatement,
    Inserted(BillId),
    Replaced { removed: BillId, inserted: BillId },
}

/// Per-batch counters. Blocked duplicates and failures never stop a batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub inserted: usize,
    pub replaced: usize,
    pub duplicates_blocked: usize,
    pub skipped_seen: usize,
    pub not_payable: usize,
    pub bank_statements: usize,
    pub failed: usize,
    pub blocked: Vec<DuplicateBlocked>,
    pub errors: Vec<String>,
}

impl BatchReport {
    fn record(&mut self, outcome: DocumentOutcome) {
        match outcome {
            DocumentOutcome::AlreadySeen => self.skipped_seen += 1,
            DocumentOutcome::NotPayable => self.not_payable += 1,
            DocumentOutcome::BankStatement => self.bank_statements += 1,
            DocumentOutcome::Inserted(_) => self.inserted += 1,
            DocumentOutcome::Replaced { .. } => self.replaced += 1,
        }
    }
}

/// Turns documents into stored bills: barcode, OCR, both text parsers,
/// reconciliation against nearby bills, then insert/replace/reject.
pub struct IngestPipeline {
    cascade: DecodeCascade,
    ocr: Arc<dyn OcrEngine>,
    store: Arc<dyn BillStore>,
    receipts: Box<dyn PaidReceiptDetector>,
    statements: BankStatementFilter,
    window_days: u64,
}

impl IngestPipeline {
    pub fn new(
        cascade: DecodeCascade,
        ocr: Arc<dyn OcrEngine>,
        store: Arc<dyn BillStore>,
        config: &IngestConfig,
    ) -> Self {
        Self {
            cascade,
            ocr,
            store,
            receipts: Box::new(ReceiptUrlDetector::new(config.paid_receipt_url_prefixes.clone())),
            statements: BankStatementFilter::new(&config.bank_statement_markers),
            window_days: config.duplicate_window_days,
        }
    }

    pub fn with_receipt_detector(mut self, detector: Box<dyn PaidReceiptDetector>) -> Self {
        self.receipts = detector;
        self
    }

    /// Documents are handled one at a time, in order.
    pub async fn ingest_batch(&self, documents: Vec<Document>) -> BatchReport {
        let mut report = BatchReport::default();

        for doc in &documents {
            report.processed += 1;
            match self.ingest_document(doc).await {
                Ok(outcome) => {
                    tracing::info!("Document {}: {:?}", doc.external_id, outcome);
                    report.record(outcome);
                }
                Err(IngestError::DuplicateBlocked(blocked)) => {
                    tracing::info!("{blocked}");
                    report.duplicates_blocked += 1;
                    report.blocked.push(blocked);
                }
                Err(e) => {
                    tracing::warn!("Ingest failed for {}: {e}", doc.external_id);
                    report.failed += 1;
                    report.errors.push(format!("{}: {e}", doc.external_id));
                }
            }
        }

        tracing::info!(
            processed = report.processed,
            inserted = report.inserted,
            replaced = report.replaced,
            blocked = report.duplicates_blocked,
            failed = report.failed,
            "Batch finished"
        );
        report
    }

    pub async fn ingest_document(&self, doc: &Document) -> Result<DocumentOutcome, IngestError> {
        let id = doc.external_id.as_str();
        let path = doc.storage_path.as_deref();

        if self.store.is_document_seen(id, path).await? {
            return Ok(DocumentOutcome::AlreadySeen);
        }

        let Some(payload) = self.cascade.decode_bytes(&doc.bytes, doc.origin) else {
            return self.finish(doc, DocumentOutcome::NotPayable).await;
        };
        let (qr, status) = match payment_qr::parse(&payload) {
            Some(qr) => (Some(qr), PaymentStatus::Unpaid),
            None if self.receipts.is_paid_receipt(&payload) => (None, PaymentStatus::Paid),
            None => return self.finish(doc, DocumentOutcome::NotPayable).await,
        };

        let text = self.ocr.recognize(&doc.bytes)?;
        if self.statements.is_bank_statement(&text) {
            return self.finish(doc, DocumentOutcome::BankStatement).await;
        }

        let text = normalize(&text);
        let candidate = merge_candidates(
            qr.as_ref(),
            UtilityExtractor::extract(&text),
            BillExtractor::extract(&text),
            id,
        );

        let pool = self.candidate_pool(&candidate).await?;
        let verdict = ReconciliationEngine::classify(&candidate, &pool);
        let replaced = match verdict {
            ReconciliationVerdict::NoDuplicate => None,
            ReconciliationVerdict::ReplaceExisting(existing, _) => Some(existing.id),
            ReconciliationVerdict::DuplicateOfPaidBill(existing)
            | ReconciliationVerdict::DuplicateOfUnpaidBill(existing, _)
            | ReconciliationVerdict::CorrectionOfPaidBill(existing) => {
                let blocked = DuplicateBlocked {
                    document: id.to_string(),
                    existing: existing.id,
                    verdict: verdict.to_string(),
                };
                self.store.mark_document_seen(id, path).await?;
                return Err(blocked.into());
            }
        };

        let bill = NewBill {
            visible: !candidate.is_correction,
            candidate,
            qr_payload: qr,
            status,
            external_id: Some(id.to_string()),
            storage_path: doc.storage_path.clone(),
        };
        let outcome = match replaced {
            Some(removed) => {
                let inserted = self.store.replace_bill(removed, &bill).await?;
                DocumentOutcome::Replaced { removed, inserted }
            }
            None => DocumentOutcome::Inserted(self.store.insert_bill(&bill).await?),
        };
        self.finish(doc, outcome).await
    }

    /// Hide every stored duplicate except the best-documented bill of its group.
    pub async fn cleanup_duplicates(&self) -> Result<CleanupPlan, StorageError> {
        let bills = self.store.visible_bills().await?;
        let plan = plan_cleanup(&bills, Utc::now());
        for id in plan.hidden() {
            self.store.set_visibility(id, false).await?;
        }
        tracing::info!("Duplicate cleanup hid {} bills", plan.hidden().count());
        Ok(plan)
    }

    async fn finish(&self, doc: &Document, outcome: DocumentOutcome) -> Result<DocumentOutcome, IngestError> {
        self.store
            .mark_document_seen(&doc.external_id, doc.storage_path.as_deref())
            .await?;
        Ok(outcome)
    }

    /// Bills near the candidate's date plus bills with the same amount, in
    /// insertion order.
    async fn candidate_pool(&self, candidate: &UtilityBillCandidate) -> Result<Vec<StoredBill>, StorageError> {
        let anchor = candidate
            .record_date
            .or(candidate.bill.issue_date)
            .or(candidate.bill.due_date)
            .unwrap_or_else(|| Utc::now().date_naive());
        let mut pool = self
            .store
            .bills_in_window(DateRange::around(anchor, self.window_days))
            .await?;

        if let Some(total) = candidate.bill.total {
            let mut seen: HashSet<BillId> = pool.iter().map(|b| b.id).collect();
            for bill in self.store.bills_with_amount(total).await? {
                if seen.insert(bill.id) {
                    pool.push(bill);
                }
            }
            pool.sort_by_key(|b| b.id);
        }
        Ok(pool)
    }
}

/// Combine both parsers and the payment barcode. Amount, merchant, date and
/// recipient come from the barcode first, then the utility parser, then the
/// generic parser.
pub fn merge_candidates(
    qr: Option<&PaymentQrPayload>,
    utility: UtilityBillCandidate,
    generic: BillCandidate,
    source_document_id: &str,
) -> UtilityBillCandidate {
    let mut merged = utility;
    let bill = &mut merged.bill;

    bill.merchant = bill.merchant.take().or(generic.merchant);
    bill.issue_date = bill.issue_date.or(generic.issue_date);
    bill.total = bill.total.or(generic.total);
    bill.currency = bill.currency.take().or(generic.currency);
    bill.invoice_number = bill.invoice_number.take().or(generic.invoice_number);
    bill.due_date = bill.due_date.or(generic.due_date);
    bill.recipient_name = bill.recipient_name.take().or(generic.recipient_name);
    bill.recipient_address = bill.recipient_address.take().or(generic.recipient_address);
    if bill.line_items.is_empty() {
        bill.line_items = generic.line_items;
    }

    if let Some(qr) = qr {
        if let Some(amount) = qr.amount {
            bill.total = Some(amount);
            bill.currency = qr.currency.clone().or(bill.currency.take());
        }
        if let Some(name) = &qr.recipient_name {
            bill.merchant = Some(name.clone());
            bill.recipient_name = Some(name.clone());
        }
        if qr.recipient_address.is_some() {
            bill.recipient_address = qr.recipient_address.clone();
        }
    }

    bill.source_document_id = Some(source_document_id.to_string());
    merged.record_date = merged.record_date.or(merged.bill.issue_date);
    merged.refresh_identity();
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
    use racun_core::Money;
    use racun_ocr::{MockRecognizer, UnavailableRecognizer};
    use racun_scan::{BarcodeReader, Binarizer, FormatSet, ImageOrigin};
    use racun_storage::{create_db, SqliteBillStore};
    use std::io::Cursor;
    use tempfile::TempDir;

    const EPS_QR: &str = "K:PR|V:01|C:1|R:265000000009164816|N:JP EPS SNABDEVANJE\nBalkanska 13, Beograd|I:RSD3456,78|SF:189|S:Račun za električnu energiju";
    const RECEIPT_URL: &str = "https://suf.purs.gov.rs/v/?vl=A0hWNkJBSzRNSFY2QkFLNE0";

    const EPS_TEXT: &str = "EPS SNABDEVANJE d.o.o.\n\
        Broj kupca: 2004158536\n\
        Broj računa: 2025100012345\n\
        Obračunski period: 05.10.2025 - 01.11.2025\n\
        VT: 150 kWh\n\
        NT: 80 kWh\n\
        Ukupno za uplatu: 3.456,78\n\
        Rok plaćanja: 20.11.2025";

    /// Returns the same payload for every image.
    struct FixedReader(Option<String>);

    impl BarcodeReader for FixedReader {
        fn read(&self, _image: &GrayImage, _formats: FormatSet, _binarizer: Binarizer) -> Option<String> {
            self.0.clone()
        }
    }

    fn tiny_png() -> Vec<u8> {
        let img: GrayImage = ImageBuffer::from_fn(4, 4, |_, _| Luma([200u8]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn doc(id: &str) -> Document {
        Document::new(id, tiny_png(), ImageOrigin::Captured)
    }

    async fn store() -> (Arc<SqliteBillStore>, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_db(&dir.path().join("bills.db")).await.unwrap();
        (Arc::new(SqliteBillStore::new(pool)), dir)
    }

    fn pipeline(store: &Arc<SqliteBillStore>, payload: Option<&str>, ocr: Arc<dyn OcrEngine>) -> IngestPipeline {
        let reader = Arc::new(FixedReader(payload.map(String::from)));
        let cascade = DecodeCascade::new(reader.clone(), reader);
        IngestPipeline::new(cascade, ocr, store.clone(), &IngestConfig::default())
    }

    fn mock(text: &str) -> Arc<dyn OcrEngine> {
        Arc::new(MockRecognizer::new(text))
    }

    #[tokio::test]
    async fn new_bill_is_inserted_once() {
        let (store, _dir) = store().await;
        let p = pipeline(&store, Some(EPS_QR), mock(EPS_TEXT));

        let report = p.ingest_batch(vec![doc("mail-1")]).await;
        assert_eq!(report.inserted, 1);

        let bills = store.visible_bills().await.unwrap();
        assert_eq!(bills.len(), 1);
        assert_eq!(bills[0].status, PaymentStatus::Unpaid);
        assert_eq!(bills[0].total, Some(Money::from_cents(345_678)));
        assert_eq!(
            bills[0].payment_identity.as_ref().map(|p| p.as_str()),
            Some("2004158536-20251005-20251101")
        );
        assert!(bills[0].has_qr_payload);

        let again = p.ingest_batch(vec![doc("mail-1")]).await;
        assert_eq!(again.skipped_seen, 1);
        assert_eq!(store.visible_bills().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn same_bill_from_another_source_is_blocked() {
        let (store, _dir) = store().await;
        let p = pipeline(&store, Some(EPS_QR), mock(EPS_TEXT));

        let report = p.ingest_batch(vec![doc("mail-1"), doc("gallery-7")]).await;
        assert_eq!(report.processed, 2);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.duplicates_blocked, 1);
        assert_eq!(report.blocked[0].document, "gallery-7");
        assert!(report.blocked[0].verdict.contains("unpaid"));
        assert_eq!(store.visible_bills().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn correction_replaces_unpaid_original_and_stays_hidden() {
        let (store, _dir) = store().await;
        pipeline(&store, Some(EPS_QR), mock(EPS_TEXT))
            .ingest_batch(vec![doc("original")])
            .await;

        let storno = format!("RAČUN - STORNO\n{EPS_TEXT}");
        let p = pipeline(&store, Some(EPS_QR), mock(&storno));
        let outcome = p.ingest_document(&doc("correction")).await.unwrap();
        let DocumentOutcome::Replaced { removed, inserted } = outcome else {
            panic!("expected a replacement, got {outcome:?}");
        };
        assert_ne!(removed, inserted);

        let window = DateRange::around(NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(), 10);
        let all = store.bills_in_window(window).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, inserted);
        assert!(all[0].is_correction);
        assert!(!all[0].visible);
    }

    /// Reads go to SQLite; every bill write fails as if the disk were full.
    struct ReadOnlyBills(Arc<SqliteBillStore>);

    fn write_failure() -> StorageError {
        StorageError::CorruptRow { table: "bills", reason: "disk full".into() }
    }

    #[async_trait]
    impl BillStore for ReadOnlyBills {
        async fn bills_in_window(&self, window: DateRange) -> Result<Vec<StoredBill>, StorageError> {
            self.0.bills_in_window(window).await
        }
        async fn bills_with_amount(&self, amount: Money) -> Result<Vec<StoredBill>, StorageError> {
            self.0.bills_with_amount(amount).await
        }
        async fn visible_bills(&self) -> Result<Vec<StoredBill>, StorageError> {
            self.0.visible_bills().await
        }
        async fn insert_bill(&self, _bill: &NewBill) -> Result<BillId, StorageError> {
            Err(write_failure())
        }
        async fn delete_bill(&self, _id: BillId) -> Result<(), StorageError> {
            Err(write_failure())
        }
        async fn replace_bill(&self, _old: BillId, _bill: &NewBill) -> Result<BillId, StorageError> {
            Err(write_failure())
        }
        async fn set_visibility(&self, _id: BillId, _visible: bool) -> Result<(), StorageError> {
            Err(write_failure())
        }
        async fn is_document_seen(&self, external_id: &str, storage_path: Option<&str>) -> Result<bool, StorageError> {
            self.0.is_document_seen(external_id, storage_path).await
        }
        async fn mark_document_seen(&self, external_id: &str, storage_path: Option<&str>) -> Result<(), StorageError> {
            self.0.mark_document_seen(external_id, storage_path).await
        }
    }

    #[tokio::test]
    async fn failed_replacement_keeps_original_and_retries() {
        let (store, _dir) = store().await;
        pipeline(&store, Some(EPS_QR), mock(EPS_TEXT))
            .ingest_batch(vec![doc("original")])
            .await;
        let original = store.visible_bills().await.unwrap()[0].id;

        let storno = format!("RAČUN - STORNO\n{EPS_TEXT}");
        let reader = Arc::new(FixedReader(Some(EPS_QR.to_string())));
        let failing = IngestPipeline::new(
            DecodeCascade::new(reader.clone(), reader),
            mock(&storno),
            Arc::new(ReadOnlyBills(store.clone())),
            &IngestConfig::default(),
        );
        let report = failing.ingest_batch(vec![doc("correction")]).await;
        assert_eq!(report.failed, 1);
        assert!(report.errors[0].contains("disk full"));

        let visible = store.visible_bills().await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, original);
        assert!(!store.is_document_seen("correction", None).await.unwrap());

        let outcome = pipeline(&store, Some(EPS_QR), mock(&storno))
            .ingest_document(&doc("correction"))
            .await
            .unwrap();
        assert!(matches!(outcome, DocumentOutcome::Replaced { removed, .. } if removed == original));
    }

    #[tokio::test]
    async fn paid_receipt_blocks_later_payment_slip() {
        let (store, _dir) = store().await;
        let text = "MAXI\nBroj računa: 2025100099999\nUkupno: 1.250,00";
        let report = pipeline(&store, Some(RECEIPT_URL), mock(text))
            .ingest_batch(vec![doc("receipt")])
            .await;
        assert_eq!(report.inserted, 1);
        assert_eq!(store.visible_bills().await.unwrap()[0].status, PaymentStatus::Paid);

        let report = pipeline(&store, Some(EPS_QR), mock(text))
            .ingest_batch(vec![doc("slip")])
            .await;
        assert_eq!(report.duplicates_blocked, 1);
        assert!(report.blocked[0].verdict.contains("paid bill"));
    }

    #[tokio::test]
    async fn documents_without_payment_codes_are_skipped_quietly() {
        let (store, _dir) = store().await;
        let report = pipeline(&store, None, mock(EPS_TEXT))
            .ingest_batch(vec![doc("photo")])
            .await;
        assert_eq!(report.not_payable, 1);

        let report = pipeline(&store, Some("EAN 8600000000000"), mock(EPS_TEXT))
            .ingest_batch(vec![doc("box")])
            .await;
        assert_eq!(report.not_payable, 1);
        assert_eq!(report.failed, 0);
        assert!(store.is_document_seen("photo", None).await.unwrap());
        assert!(store.visible_bills().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bank_statements_are_rejected() {
        let (store, _dir) = store().await;
        let text = "BANCA INTESA\nIZVOD BROJ 10\nPrethodno stanje 12.000,00";
        let report = pipeline(&store, Some(EPS_QR), mock(text))
            .ingest_batch(vec![doc("statement")])
            .await;
        assert_eq!(report.bank_statements, 1);
        assert!(store.visible_bills().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ocr_failure_is_counted_and_batch_continues() {
        let (store, _dir) = store().await;
        let p = pipeline(&store, Some(EPS_QR), Arc::new(UnavailableRecognizer));
        let report = p.ingest_batch(vec![doc("a"), doc("b")]).await;
        assert_eq!(report.failed, 2);
        assert_eq!(report.errors.len(), 2);
        assert!(!store.is_document_seen("a", None).await.unwrap());
    }

    #[tokio::test]
    async fn cleanup_hides_weaker_duplicates() {
        let (store, _dir) = store().await;
        let bill = |paid: bool| NewBill {
            candidate: UtilityBillCandidate {
                bill: BillCandidate {
                    invoice_number: Some("RN-2025-0042".into()),
                    total: Some(Money::from_cents(99_000)),
                    ..Default::default()
                },
                ..Default::default()
            },
            qr_payload: None,
            status: if paid { PaymentStatus::Paid } else { PaymentStatus::Unpaid },
            visible: true,
            external_id: None,
            storage_path: None,
        };
        let unpaid = store.insert_bill(&bill(false)).await.unwrap();
        let paid = store.insert_bill(&bill(true)).await.unwrap();

        let p = pipeline(&store, None, mock(""));
        let plan = p.cleanup_duplicates().await.unwrap();
        assert_eq!(plan.groups[0].keep, paid);
        assert_eq!(plan.hidden().collect::<Vec<_>>(), vec![unpaid]);

        let visible = store.visible_bills().await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, paid);
    }

    #[test]
    fn barcode_fields_take_priority() {
        let qr = payment_qr::parse(EPS_QR).unwrap();
        let text = normalize(EPS_TEXT);
        let merged = merge_candidates(
            Some(&qr),
            UtilityExtractor::extract(&text),
            BillExtractor::extract(&text),
            "doc-1",
        );
        assert_eq!(merged.bill.total, Some(Money::from_cents(345_678)));
        assert_eq!(merged.bill.currency.as_deref(), Some("RSD"));
        assert_eq!(merged.bill.merchant, qr.recipient_name);
        assert_eq!(merged.bill.recipient_address.as_deref(), Some("Balkanska 13, Beograd"));
        assert_eq!(merged.bill.invoice_number.as_deref(), Some("2025100012345"));
        assert_eq!(merged.billing_account_number.as_deref(), Some("2004158536"));
        assert_eq!(merged.bill.source_document_id.as_deref(), Some("doc-1"));
    }

    #[test]
    fn generic_fields_fill_gaps() {
        let utility = UtilityBillCandidate::default();
        let generic = BillCandidate {
            merchant: Some("Maxi".into()),
            issue_date: NaiveDate::from_ymd_opt(2025, 3, 4),
            ..Default::default()
        };
        let merged = merge_candidates(None, utility, generic, "x");
        assert_eq!(merged.bill.merchant.as_deref(), Some("Maxi"));
        assert_eq!(merged.record_date, NaiveDate::from_ymd_opt(2025, 3, 4));
        assert_eq!(merged.payment_identity, None);
    }
}
