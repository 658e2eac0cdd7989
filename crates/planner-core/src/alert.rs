//! Alert Records
//!
//! A completed alert dialog produces an [`AlertRecord`]. Records are only
//! stored; evaluating them against live prices is not part of this crate.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_feeds::{CoinRef, KNOWN_COINS};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{DialogInputError, Result};
use crate::recipient::RecipientId;

/// A desired price alert
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AlertRecord {
    pub recipient: RecipientId,
    pub coin: CoinRef,
    /// Always strictly positive
    pub target_price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl AlertRecord {
    pub fn new(recipient: RecipientId, coin: CoinRef, target_price: Decimal) -> Self {
        Self {
            recipient,
            coin,
            target_price,
            created_at: Utc::now(),
        }
    }
}

/// Alert persistence
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn save(&self, alert: &AlertRecord) -> Result<()>;

    /// Alerts of one recipient, oldest first
    async fn list_for(&self, recipient: RecipientId) -> Result<Vec<AlertRecord>>;
}

/// In-memory alert store (for development/testing)
#[derive(Default)]
pub struct MemoryAlertStore {
    alerts: RwLock<HashMap<RecipientId, Vec<AlertRecord>>>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AlertStore for MemoryAlertStore {
    async fn save(&self, alert: &AlertRecord) -> Result<()> {
        self.alerts
            .write()
            .await
            .entry(alert.recipient)
            .or_default()
            .push(alert.clone());
        Ok(())
    }

    async fn list_for(&self, recipient: RecipientId) -> Result<Vec<AlertRecord>> {
        Ok(self
            .alerts
            .read()
            .await
            .get(&recipient)
            .cloned()
            .unwrap_or_default())
    }
}

/// Comma separated tickers accepted by [`parse_coin`]
pub fn supported_symbols() -> String {
    KNOWN_COINS.iter().map(|c| c.symbol).collect::<Vec<_>>().join(", ")
}

/// Match free text against the fixed coin set, ignoring case
pub fn parse_coin(text: &str) -> std::result::Result<CoinRef, DialogInputError> {
    CoinRef::find(text).ok_or_else(|| DialogInputError::UnknownCoin(text.trim().to_string()))
}

/// Parse a strictly positive decimal. Either `.` or `,` may be the decimal
/// separator; thousands separators, signs and exponents are rejected.
pub fn parse_target_price(text: &str) -> std::result::Result<Decimal, DialogInputError> {
    let invalid = || DialogInputError::InvalidPrice(text.trim().to_string());

    let normalized = text.trim().replace(',', ".");
    let well_formed = !normalized.is_empty()
        && normalized.chars().all(|c| c.is_ascii_digit() || c == '.')
        && normalized.chars().filter(|c| *c == '.').count() <= 1
        && normalized.chars().any(|c| c.is_ascii_digit());
    if !well_formed {
        return Err(invalid());
    }

    let price: Decimal = normalized.parse().map_err(|_| invalid())?;
    if price <= Decimal::ZERO {
        return Err(invalid());
    }
    Ok(price.normalize())
}
