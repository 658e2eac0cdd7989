//! Mock Sources
//!
//! For testing and offline demo runs. Return realistic static data, can
//! simulate latency, and can be switched into a failing state.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::{MarketDataSource, NewsSource, SentimentSource};
use crate::error::{FetchError, Result};
use crate::model::{
    CoinRef, Fiat, MarketSnapshot, NewsItem, PriceQuote, SentimentReading, KNOWN_COINS,
};

/// Shared knobs for every mock source
#[derive(Clone, Debug, Default)]
struct Behaviour {
    latency: Option<Duration>,
    failure: Option<FetchError>,
}

impl Behaviour {
    async fn run(&self) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// Mock market data with static EUR-ish prices
#[derive(Clone, Debug, Default)]
pub struct MockMarketData {
    behaviour: Behaviour,
    /// Fail only the ranking call
    rankings_failure: Option<FetchError>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with `err`
    pub fn failing(err: FetchError) -> Self {
        Self {
            behaviour: Behaviour { latency: None, failure: Some(err) },
            rankings_failure: None,
        }
    }

    /// Spot quotes succeed, rankings fail with `err`
    pub fn failing_rankings(err: FetchError) -> Self {
        Self { rankings_failure: Some(err), ..Self::default() }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.behaviour.latency = Some(latency);
        self
    }

    /// (price, 24h change, market cap rank)
    fn base_price(symbol: &str) -> Option<(Decimal, Decimal, u32)> {
        match symbol {
            "BTC" => Some((dec!(97500), dec!(2.5), 1)),
            "ETH" => Some((dec!(3450), dec!(-1.8), 2)),
            "XRP" => Some((dec!(2.35), dec!(0.9), 3)),
            "BNB" => Some((dec!(690), dec!(0.4), 4)),
            "SOL" => Some((dec!(195), dec!(4.2), 5)),
            "DOGE" => Some((dec!(0.38), dec!(12.0), 6)),
            "ADA" => Some((dec!(0.95), dec!(-1.2), 7)),
            "AVAX" => Some((dec!(42.00), dec!(5.5), 8)),
            "LINK" => Some((dec!(24.50), dec!(3.1), 9)),
            "DOT" => Some((dec!(7.20), dec!(0.8), 10)),
            "LTC" => Some((dec!(105), dec!(1.5), 11)),
            _ => None,
        }
    }

    fn quote(coin: &CoinRef) -> Option<PriceQuote> {
        let (price, change, rank) = Self::base_price(coin.symbol)?;
        Some(PriceQuote::new(coin, price).with_change(change).with_rank(rank))
    }
}

#[async_trait]
impl MarketDataSource for MockMarketData {
    async fn spot_quotes(&self, coins: &[CoinRef], _fiat: &Fiat) -> Result<Vec<PriceQuote>> {
        self.behaviour.run().await?;
        coins
            .iter()
            .map(|coin| {
                Self::quote(coin)
                    .ok_or_else(|| FetchError::Malformed(format!("no quote for {}", coin.id)))
            })
            .collect()
    }

    async fn top_by_market_cap(&self, limit: usize, _fiat: &Fiat) -> Result<MarketSnapshot> {
        self.behaviour.run().await?;
        if let Some(err) = &self.rankings_failure {
            return Err(err.clone());
        }
        let quotes = KNOWN_COINS.iter().filter_map(Self::quote).collect();
        Ok(MarketSnapshot::from_ranked(quotes, limit))
    }

    fn name(&self) -> &str {
        "MockMarketData"
    }
}

/// Mock sentiment index
#[derive(Clone, Debug)]
pub struct MockSentiment {
    behaviour: Behaviour,
    value: u8,
}

impl Default for MockSentiment {
    fn default() -> Self {
        Self::new(62)
    }
}

impl MockSentiment {
    /// Values above 100 are clamped
    pub fn new(value: u8) -> Self {
        Self { behaviour: Behaviour::default(), value: value.min(100) }
    }

    pub fn failing(err: FetchError) -> Self {
        Self {
            behaviour: Behaviour { latency: None, failure: Some(err) },
            value: 0,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.behaviour.latency = Some(latency);
        self
    }
}

#[async_trait]
impl SentimentSource for MockSentiment {
    async fn current(&self) -> Result<SentimentReading> {
        self.behaviour.run().await?;
        SentimentReading::new(self.value, Utc::now())
            .ok_or_else(|| FetchError::Malformed("value out of range".into()))
    }

    fn name(&self) -> &str {
        "MockSentiment"
    }
}

/// Mock headlines
#[derive(Clone, Debug, Default)]
pub struct MockNews {
    behaviour: Behaviour,
}

impl MockNews {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(err: FetchError) -> Self {
        Self { behaviour: Behaviour { latency: None, failure: Some(err) } }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.behaviour.latency = Some(latency);
        self
    }
}

#[async_trait]
impl NewsSource for MockNews {
    async fn latest(&self, _category: Option<&str>, limit: usize) -> Result<Vec<NewsItem>> {
        self.behaviour.run().await?;
        let headlines = [
            ("Bitcoin holds above key support", "https://example.com/news/btc-support"),
            ("Ethereum developers confirm upgrade date", "https://example.com/news/eth-upgrade"),
            ("Stablecoin supply reaches new high", "https://example.com/news/stablecoins"),
        ];
        let published_at = Utc.with_ymd_and_hms(2024, 12, 5, 8, 0, 0).single().unwrap_or_else(Utc::now);

        Ok(headlines
            .iter()
            .take(limit)
            .map(|(title, url)| NewsItem {
                title: (*title).into(),
                source_url: (*url).into(),
                source_title: Some("Example Wire".into()),
                published_at,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "MockNews"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_market_data() {
        let source = MockMarketData::new();

        let quotes = source
            .spot_quotes(&[CoinRef::BITCOIN, CoinRef::ETHEREUM], &Fiat::eur())
            .await
            .unwrap();
        assert_eq!(quotes[0].symbol, "BTC");
        assert!(quotes[0].fiat_price > Decimal::ZERO);

        let top = source.top_by_market_cap(5, &Fiat::eur()).await.unwrap();
        let symbols: Vec<_> = top.entries().iter().map(|e| e.quote.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC", "ETH", "XRP", "BNB", "SOL"]);
    }

    #[tokio::test]
    async fn test_failing_sources() {
        let market = MockMarketData::failing(FetchError::Timeout);
        assert_eq!(
            market.spot_quotes(&[CoinRef::BITCOIN], &Fiat::eur()).await,
            Err(FetchError::Timeout)
        );

        let rankings = MockMarketData::failing_rankings(FetchError::Http(429));
        assert!(rankings.spot_quotes(&[CoinRef::BITCOIN], &Fiat::eur()).await.is_ok());
        assert!(rankings.top_by_market_cap(5, &Fiat::eur()).await.is_err());

        assert!(MockSentiment::failing(FetchError::Http(500)).current().await.is_err());
        assert!(MockNews::failing(FetchError::Timeout).latest(None, 5).await.is_err());
    }
}
