use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;

use crate::error::StorageError;

pub type DbPool = Pool<Sqlite>;

/// Open (creating if needed) the bill database at `path` and bring the schema up to date.
pub async fn create_db(path: &Path) -> Result<DbPool, StorageError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA cache_size = -32000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;
    tracing::info!("Bill database ready: {}", path.display());

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bills (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            status TEXT NOT NULL,
            visible INTEGER NOT NULL DEFAULT 1,
            merchant TEXT,
            issue_date TEXT,
            due_date TEXT,
            record_date TEXT,
            total_cents INTEGER,
            currency TEXT,
            invoice_number TEXT,
            billing_account_number TEXT,
            period_start TEXT,
            period_end TEXT,
            payment_identity TEXT,
            is_correction INTEGER NOT NULL DEFAULT 0,
            recipient_name TEXT,
            recipient_address TEXT,
            consumption_vt TEXT,
            consumption_nt TEXT,
            consumption_total TEXT,
            qr_payload TEXT,
            external_id TEXT,
            storage_path TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Backstop for the reconciliation engine: one visible bill per identity.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_bills_visible_identity
            ON bills (payment_identity)
            WHERE visible = 1 AND payment_identity IS NOT NULL
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_bills_record_date ON bills (record_date)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_bills_total ON bills (total_cents)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ingested_documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id TEXT NOT NULL UNIQUE,
            storage_path TEXT,
            ingested_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_ingested_documents_path ON ingested_documents (storage_path)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
