//! Domain Models
//!
//! Ephemeral values produced by the feed clients. Quotes are fetched fresh
//! for every report and never cached. Uses `rust_decimal` for all monetary
//! values.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A coin known to the planner, with its market-data provider id
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CoinRef {
    /// Provider id (e.g., "bitcoin")
    pub id: &'static str,

    /// Ticker symbol (e.g., "BTC")
    pub symbol: &'static str,

    /// Display name
    pub name: &'static str,
}

impl CoinRef {
    pub const BITCOIN: CoinRef = CoinRef { id: "bitcoin", symbol: "BTC", name: "Bitcoin" };
    pub const ETHEREUM: CoinRef = CoinRef { id: "ethereum", symbol: "ETH", name: "Ethereum" };

    /// Look up a known coin by ticker, ignoring case and surrounding whitespace
    pub fn find(symbol: &str) -> Option<CoinRef> {
        let symbol = symbol.trim();
        KNOWN_COINS
            .iter()
            .find(|c| c.symbol.eq_ignore_ascii_case(symbol))
            .copied()
    }
}

/// Coins accepted by alert dialogs and served by the mock source
pub const KNOWN_COINS: &[CoinRef] = &[
    CoinRef::BITCOIN,
    CoinRef::ETHEREUM,
    CoinRef { id: "solana", symbol: "SOL", name: "Solana" },
    CoinRef { id: "binancecoin", symbol: "BNB", name: "BNB" },
    CoinRef { id: "ripple", symbol: "XRP", name: "XRP" },
    CoinRef { id: "cardano", symbol: "ADA", name: "Cardano" },
    CoinRef { id: "dogecoin", symbol: "DOGE", name: "Dogecoin" },
    CoinRef { id: "polkadot", symbol: "DOT", name: "Polkadot" },
    CoinRef { id: "chainlink", symbol: "LINK", name: "Chainlink" },
    CoinRef { id: "avalanche-2", symbol: "AVAX", name: "Avalanche" },
    CoinRef { id: "litecoin", symbol: "LTC", name: "Litecoin" },
];

/// Quote currency (`vs_currency` on the provider side)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fiat(String);

impl Fiat {
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_lowercase())
    }

    pub fn eur() -> Self {
        Self::new("eur")
    }

    /// Lowercase provider code
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Currency sign used when rendering prices
    pub fn sign(&self) -> String {
        match self.0.as_str() {
            "eur" => "€".into(),
            "usd" => "$".into(),
            "gbp" => "£".into(),
            "jpy" => "¥".into(),
            other => format!("{} ", other.to_uppercase()),
        }
    }
}

impl Default for Fiat {
    fn default() -> Self {
        Self::eur()
    }
}

impl std::fmt::Display for Fiat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_uppercase())
    }
}

/// Spot price for a single asset
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PriceQuote {
    /// Provider id
    pub id: String,

    /// Ticker symbol, uppercase
    pub symbol: String,

    /// Display name
    pub name: String,

    /// Price in the requested fiat currency
    pub fiat_price: Decimal,

    /// 24-hour change in percent (0 when upstream omits it)
    pub change_24h_pct: Decimal,

    /// Upstream market-cap rank, if reported
    pub market_cap_rank: Option<u32>,
}

impl PriceQuote {
    pub fn new(coin: &CoinRef, fiat_price: Decimal) -> Self {
        Self {
            id: coin.id.into(),
            symbol: coin.symbol.into(),
            name: coin.name.into(),
            fiat_price,
            change_24h_pct: Decimal::ZERO,
            market_cap_rank: None,
        }
    }

    pub fn with_change(mut self, change_24h_pct: Decimal) -> Self {
        self.change_24h_pct = change_24h_pct;
        self
    }

    pub fn with_rank(mut self, rank: u32) -> Self {
        self.market_cap_rank = Some(rank);
        self
    }
}

/// A quote at a fixed position inside a [`MarketSnapshot`]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedQuote {
    pub rank: u32,
    pub quote: PriceQuote,
}

/// Top-N assets by market cap.
///
/// Ranks are always `1..=len`, contiguous and without duplicate assets,
/// regardless of gaps or repeats in the upstream ordering.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MarketSnapshot {
    entries: Vec<RankedQuote>,
}

impl MarketSnapshot {
    /// Order by upstream rank (unranked last, stable), drop repeated ids and
    /// keep at most `limit` entries.
    pub fn from_ranked(mut quotes: Vec<PriceQuote>, limit: usize) -> Self {
        quotes.sort_by_key(|q| q.market_cap_rank.unwrap_or(u32::MAX));

        let mut seen = HashSet::new();
        let entries = quotes
            .into_iter()
            .filter(|q| seen.insert(q.id.clone()))
            .take(limit)
            .zip(1u32..)
            .map(|(quote, rank)| RankedQuote { rank, quote })
            .collect();

        Self { entries }
    }

    pub fn entries(&self) -> &[RankedQuote] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Bucketed market mood
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SentimentClass {
    ExtremeFear,
    Fear,
    Neutral,
    Greed,
    ExtremeGreed,
}

impl SentimentClass {
    /// Buckets: 0-24, 25-44, 45-55, 56-75, 76-100
    pub fn from_value(value: u8) -> Self {
        match value {
            0..=24 => SentimentClass::ExtremeFear,
            25..=44 => SentimentClass::Fear,
            45..=55 => SentimentClass::Neutral,
            56..=75 => SentimentClass::Greed,
            _ => SentimentClass::ExtremeGreed,
        }
    }
}

/// Fear & greed style index reading
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SentimentReading {
    /// Index value, 0..=100
    pub value: u8,
    pub classification: SentimentClass,
    pub observed_at: DateTime<Utc>,
}

impl SentimentReading {
    /// Returns `None` when `value` is outside 0..=100
    pub fn new(value: u8, observed_at: DateTime<Utc>) -> Option<Self> {
        (value <= 100).then(|| Self {
            value,
            classification: SentimentClass::from_value(value),
            observed_at,
        })
    }
}

/// A headline from the news provider
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewsItem {
    pub title: String,
    pub source_url: String,
    pub source_title: Option<String>,
    pub published_at: DateTime<Utc>,
}

/// Convert a JSON float into a decimal without binary noise
pub(crate) fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    value.to_string().parse().ok()
}
