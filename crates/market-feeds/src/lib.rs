//! # market-feeds
//!
//! Clients for the three upstream providers behind the daily crypto report.
//!
//! ```text
//! ┌──────────────────────┐   ┌──────────────────────┐   ┌──────────────────────┐
//! │  MarketDataSource    │   │  SentimentSource     │   │  NewsSource          │
//! │  (CoinGecko)         │   │  (Fear & Greed)      │   │  (CryptoPanic)       │
//! └──────────┬───────────┘   └──────────┬───────────┘   └──────────┬───────────┘
//!            │ spot quotes, top-N       │ index 0..100             │ headlines
//!            └──────────────────────────┴──────────────────────────┘
//!                                       ▼
//!                          Result<T, FetchError>  (never panics)
//! ```
//!
//! Every fetch is attempted exactly once with a fixed timeout. Failures are
//! reported as [`FetchError`] values; retry policy is left to the caller.

pub mod config;
pub mod error;
pub mod model;
pub mod source;

pub use config::FeedsConfig;
pub use error::{FetchError, Result};
pub use model::{
    CoinRef, Fiat, MarketSnapshot, NewsItem, PriceQuote, RankedQuote, SentimentClass,
    SentimentReading, KNOWN_COINS,
};
pub use source::{
    CoinGeckoClient, CryptoPanicClient, FearGreedClient, MarketDataSource, MockMarketData,
    MockNews, MockSentiment, NewsSource, SentimentSource,
};
