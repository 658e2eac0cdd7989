//! Upstream Sources
//!
//! One trait per provider kind (Strategy pattern), each with a live HTTP
//! client and a static mock.

mod coingecko;
mod cryptopanic;
mod fear_greed;
mod mock;

pub use coingecko::CoinGeckoClient;
pub use cryptopanic::CryptoPanicClient;
pub use fear_greed::FearGreedClient;
pub use mock::{MockMarketData, MockNews, MockSentiment};

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::{FetchError, Result};
use crate::model::{CoinRef, Fiat, MarketSnapshot, NewsItem, PriceQuote, SentimentReading};

/// Spot prices and market-cap rankings
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Current price and 24h change for each requested coin, in request order
    async fn spot_quotes(&self, coins: &[CoinRef], fiat: &Fiat) -> Result<Vec<PriceQuote>>;

    /// Top `limit` assets by market cap
    async fn top_by_market_cap(&self, limit: usize, fiat: &Fiat) -> Result<MarketSnapshot>;

    fn name(&self) -> &str;
}

/// Single scalar market sentiment index
#[async_trait]
pub trait SentimentSource: Send + Sync {
    async fn current(&self) -> Result<SentimentReading>;

    fn name(&self) -> &str;
}

/// Recent headlines, optionally filtered by provider category
#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn latest(&self, category: Option<&str>, limit: usize) -> Result<Vec<NewsItem>>;

    fn name(&self) -> &str;
}

/// Send a request once and decode a JSON body, mapping every failure mode
/// to [`FetchError`].
pub(crate) async fn get_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        tracing::debug!(status = status.as_u16(), "upstream rejected request");
        return Err(FetchError::Http(status.as_u16()));
    }

    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}
