//! SQLite Storage
//!
//! One database backs both stores: `recipients` maps a chat id to its
//! locale code, `alerts` keeps every completed alert dialog.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_feeds::CoinRef;
use planner_core::{
    AlertRecord, AlertStore, CoreError, Locale, Recipient, RecipientId, RecipientStore, Result,
};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS recipients (
        id          INTEGER PRIMARY KEY,
        locale      TEXT NOT NULL,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS alerts (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        recipient_id  INTEGER NOT NULL,
        coin          TEXT NOT NULL,
        target_price  TEXT NOT NULL,
        created_at    TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_alerts_recipient ON alerts (recipient_id)",
];

/// SQLite-backed recipient and alert store
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    default_locale: Locale,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `url` and apply the schema
    pub async fn connect(url: &str, default_locale: Locale) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(storage)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(storage)?;

        Self::with_pool(pool, default_locale).await
    }

    /// Private in-memory database; a single pinned connection keeps it alive
    pub async fn in_memory(default_locale: Locale) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(storage)?;

        Self::with_pool(pool, default_locale).await
    }

    async fn with_pool(pool: SqlitePool, default_locale: Locale) -> Result<Self> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await.map_err(storage)?;
        }
        tracing::debug!("sqlite schema ready");
        Ok(Self { pool, default_locale })
    }

    /// Health probe used by the HTTP surface
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    fn locale_or_default(&self, id: i64, code: &str) -> Locale {
        Locale::from_code(code).unwrap_or_else(|| {
            tracing::warn!(recipient = id, code, "unknown stored locale, using default");
            self.default_locale
        })
    }
}

fn storage(err: sqlx::Error) -> CoreError {
    CoreError::Storage(err.to_string())
}

#[async_trait]
impl RecipientStore for SqliteStore {
    async fn upsert_locale(&self, id: RecipientId, locale: Locale) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO recipients (id, locale, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(id) DO UPDATE SET locale = excluded.locale, updated_at = excluded.updated_at",
        )
        .bind(id.get())
        .bind(locale.code())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn get_locale(&self, id: RecipientId) -> Result<Locale> {
        let row: Option<(String,)> = sqlx::query_as("SELECT locale FROM recipients WHERE id = ?1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        Ok(row.map_or(self.default_locale, |(code,)| self.locale_or_default(id.get(), &code)))
    }

    async fn ensure(&self, id: RecipientId) -> Result<Locale> {
        let now = Utc::now().to_rfc3339();
        let inserted = sqlx::query(
            "INSERT INTO recipients (id, locale, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(id.get())
        .bind(self.default_locale.code())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(storage)?
        .rows_affected();

        if inserted > 0 {
            tracing::info!(recipient = %id, "new recipient registered");
        }
        self.get_locale(id).await
    }

    async fn list_all(&self) -> Result<Vec<Recipient>> {
        let rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, locale FROM recipients ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        Ok(rows
            .into_iter()
            .map(|(id, code)| Recipient {
                id: RecipientId::new(id),
                locale: self.locale_or_default(id, &code),
            })
            .collect())
    }
}

#[async_trait]
impl AlertStore for SqliteStore {
    async fn save(&self, alert: &AlertRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO alerts (recipient_id, coin, target_price, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(alert.recipient.get())
        .bind(alert.coin.symbol)
        .bind(alert.target_price.to_string())
        .bind(alert.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn list_for(&self, recipient: RecipientId) -> Result<Vec<AlertRecord>> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT coin, target_price, created_at FROM alerts WHERE recipient_id = ?1 ORDER BY id",
        )
        .bind(recipient.get())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.into_iter()
            .filter_map(|(symbol, price, created_at)| {
                let Some(coin) = CoinRef::find(&symbol) else {
                    tracing::warn!(recipient = %recipient, symbol = %symbol, "skipping alert for unsupported coin");
                    return None;
                };
                Some(decode_alert(recipient, coin, &price, &created_at))
            })
            .collect()
    }
}

fn decode_alert(
    recipient: RecipientId,
    coin: CoinRef,
    price: &str,
    created_at: &str,
) -> Result<AlertRecord> {
    let target_price = Decimal::from_str(price)
        .map_err(|e| CoreError::Storage(format!("bad target price {price:?}: {e}")))?;
    let created_at = DateTime::parse_from_rfc3339(created_at)
        .map_err(|e| CoreError::Storage(format!("bad timestamp {created_at:?}: {e}")))?
        .with_timezone(&Utc);

    Ok(AlertRecord { recipient, coin, target_price, created_at })
}
