use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};

use racun_core::{
    BillId, DateRange, Money, NewBill, PaymentIdentity, PaymentStatus, StoredBill,
};

use crate::db::DbPool;
use crate::error::StorageError;

/// Persistence used by ingestion and cleanup. Queries return bills in
/// insertion order.
#[async_trait]
pub trait BillStore: Send + Sync {
    /// Bills whose record date (else issue date, else creation day) lies in `window`.
    async fn bills_in_window(&self, window: DateRange) -> Result<Vec<StoredBill>, StorageError>;
    async fn bills_with_amount(&self, amount: Money) -> Result<Vec<StoredBill>, StorageError>;
    async fn visible_bills(&self) -> Result<Vec<StoredBill>, StorageError>;
    async fn insert_bill(&self, bill: &NewBill) -> Result<BillId, StorageError>;
    async fn delete_bill(&self, id: BillId) -> Result<(), StorageError>;
    /// Delete `old` and insert `bill` as one unit: either both happen or neither.
    async fn replace_bill(&self, old: BillId, bill: &NewBill) -> Result<BillId, StorageError>;
    async fn set_visibility(&self, id: BillId, visible: bool) -> Result<(), StorageError>;
    async fn is_document_seen(
        &self,
        external_id: &str,
        storage_path: Option<&str>,
    ) -> Result<bool, StorageError>;
    async fn mark_document_seen(
        &self,
        external_id: &str,
        storage_path: Option<&str>,
    ) -> Result<(), StorageError>;
}

const BILL_COLUMNS: &str = "id, status, visible, merchant, issue_date, due_date, total_cents, \
     invoice_number, billing_account_number, period_start, period_end, payment_identity, \
     is_correction, qr_payload IS NOT NULL AS has_qr_payload, created_at";

pub struct SqliteBillStore {
    pool: DbPool,
}

impl SqliteBillStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl BillStore for SqliteBillStore {
    async fn bills_in_window(&self, window: DateRange) -> Result<Vec<StoredBill>, StorageError> {
        let sql = format!(
            "SELECT {BILL_COLUMNS} FROM bills \
             WHERE COALESCE(record_date, issue_date, substr(created_at, 1, 10)) BETWEEN ? AND ? \
             ORDER BY id"
        );
        let rows = sqlx::query(&sql)
            .bind(window.start)
            .bind(window.end)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(bill_from_row).collect()
    }

    async fn bills_with_amount(&self, amount: Money) -> Result<Vec<StoredBill>, StorageError> {
        let Some(cents) = amount.to_cents() else {
            return Ok(Vec::new());
        };
        let sql = format!("SELECT {BILL_COLUMNS} FROM bills WHERE total_cents = ? ORDER BY id");
        let rows = sqlx::query(&sql).bind(cents).fetch_all(&self.pool).await?;
        rows.iter().map(bill_from_row).collect()
    }

    async fn visible_bills(&self) -> Result<Vec<StoredBill>, StorageError> {
        let sql = format!("SELECT {BILL_COLUMNS} FROM bills WHERE visible = 1 ORDER BY id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(bill_from_row).collect()
    }

    async fn insert_bill(&self, bill: &NewBill) -> Result<BillId, StorageError> {
        insert_with(&self.pool, bill).await
    }

    async fn delete_bill(&self, id: BillId) -> Result<(), StorageError> {
        delete_with(&self.pool, id).await
    }

    async fn replace_bill(&self, old: BillId, bill: &NewBill) -> Result<BillId, StorageError> {
        let mut tx = self.pool.begin().await?;
        delete_with(&mut *tx, old).await?;
        let id = insert_with(&mut *tx, bill).await?;
        tx.commit().await?;
        Ok(id)
    }

    async fn set_visibility(&self, id: BillId, visible: bool) -> Result<(), StorageError> {
        let done = sqlx::query("UPDATE bills SET visible = ? WHERE id = ?")
            .bind(visible)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(StorageError::NotFound(id));
        }
        Ok(())
    }

    async fn is_document_seen(
        &self,
        external_id: &str,
        storage_path: Option<&str>,
    ) -> Result<bool, StorageError> {
        let seen: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM ingested_documents \
             WHERE external_id = ? OR (? IS NOT NULL AND storage_path = ?))",
        )
        .bind(external_id)
        .bind(storage_path)
        .bind(storage_path)
        .fetch_one(&self.pool)
        .await?;
        Ok(seen)
    }

    async fn mark_document_seen(
        &self,
        external_id: &str,
        storage_path: Option<&str>,
    ) -> Result<(), StorageError> {
        sqlx::query("INSERT OR IGNORE INTO ingested_documents (external_id, storage_path) VALUES (?, ?)")
            .bind(external_id)
            .bind(storage_path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

async fn insert_with<'e, E: SqliteExecutor<'e>>(executor: E, bill: &NewBill) -> Result<BillId, StorageError> {
    let c = &bill.candidate;
    let qr_payload = bill.qr_payload.as_ref().map(serde_json::to_string).transpose()?;
    let identity = c.payment_identity.as_ref().map(|p| p.as_str().to_string());

    let result = sqlx::query(
        r#"
        INSERT INTO bills (
            status, visible, merchant, issue_date, due_date, record_date, total_cents,
            currency, invoice_number, billing_account_number, period_start, period_end,
            payment_identity, is_correction, recipient_name, recipient_address,
            consumption_vt, consumption_nt, consumption_total, qr_payload,
            external_id, storage_path, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(bill.status.to_string())
    .bind(bill.visible)
    .bind(&c.bill.merchant)
    .bind(c.bill.issue_date)
    .bind(c.bill.due_date)
    .bind(c.record_date)
    .bind(c.bill.total.and_then(Money::to_cents))
    .bind(&c.bill.currency)
    .bind(&c.bill.invoice_number)
    .bind(&c.billing_account_number)
    .bind(c.period_start)
    .bind(c.period_end)
    .bind(&identity)
    .bind(c.is_correction)
    .bind(&c.bill.recipient_name)
    .bind(&c.bill.recipient_address)
    .bind(c.consumption_vt.map(|d| d.to_string()))
    .bind(c.consumption_nt.map(|d| d.to_string()))
    .bind(c.consumption_total.map(|d| d.to_string()))
    .bind(qr_payload)
    .bind(&bill.external_id)
    .bind(&bill.storage_path)
    .bind(Utc::now())
    .execute(executor)
    .await;

    match result {
        Ok(done) => Ok(BillId(done.last_insert_rowid())),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(StorageError::DuplicateIdentity(identity.unwrap_or_default()))
        }
        Err(e) => Err(e.into()),
    }
}

async fn delete_with<'e, E: SqliteExecutor<'e>>(executor: E, id: BillId) -> Result<(), StorageError> {
    let done = sqlx::query("DELETE FROM bills WHERE id = ?")
        .bind(id.0)
        .execute(executor)
        .await?;
    if done.rows_affected() == 0 {
        return Err(StorageError::NotFound(id));
    }
    Ok(())
}

fn bill_from_row(row: &SqliteRow) -> Result<StoredBill, StorageError> {
    let status: String = row.try_get("status")?;
    let status: PaymentStatus = status
        .parse()
        .map_err(|reason| StorageError::CorruptRow { table: "bills", reason })?;

    let total = match row.try_get::<Option<i64>, _>("total_cents")? {
        Some(cents) => Some(Money::try_from_cents(cents).ok_or_else(|| StorageError::CorruptRow {
            table: "bills",
            reason: format!("negative total_cents {cents}"),
        })?),
        None => None,
    };

    Ok(StoredBill {
        id: BillId(row.try_get("id")?),
        status,
        visible: row.try_get("visible")?,
        merchant: row.try_get("merchant")?,
        issue_date: row.try_get::<Option<NaiveDate>, _>("issue_date")?,
        due_date: row.try_get::<Option<NaiveDate>, _>("due_date")?,
        total,
        invoice_number: row.try_get("invoice_number")?,
        billing_account_number: row.try_get("billing_account_number")?,
        period_start: row.try_get::<Option<NaiveDate>, _>("period_start")?,
        period_end: row.try_get::<Option<NaiveDate>, _>("period_end")?,
        payment_identity: row
            .try_get::<Option<String>, _>("payment_identity")?
            .map(PaymentIdentity::from_stored),
        is_correction: row.try_get("is_correction")?,
        has_qr_payload: row.try_get("has_qr_payload")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}
