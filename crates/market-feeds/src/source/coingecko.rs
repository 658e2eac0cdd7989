//! CoinGecko Market Data Client

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{get_json, MarketDataSource};
use crate::config::FeedsConfig;
use crate::error::{FetchError, Result};
use crate::model::{decimal_from_f64, CoinRef, Fiat, MarketSnapshot, PriceQuote};

/// `/simple/price` body: coin id -> { "<fiat>": price, "<fiat>_24h_change": pct }
type SimplePriceResponse = HashMap<String, HashMap<String, Option<f64>>>;

/// One element of the `/coins/markets` array
#[derive(Debug, Deserialize)]
struct MarketEntry {
    id: String,
    symbol: String,
    name: String,
    current_price: Option<f64>,
    market_cap_rank: Option<u32>,
    price_change_percentage_24h: Option<f64>,
}

/// Live client for the CoinGecko public API
pub struct CoinGeckoClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn from_config(config: &FeedsConfig) -> Result<Self> {
        Ok(Self::new(
            config.http_client()?,
            config.coingecko_base_url.clone(),
            config.coingecko_api_key.clone(),
        ))
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.http.get(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.header("x-cg-demo-api-key", key),
            None => request,
        }
    }
}

#[async_trait]
impl MarketDataSource for CoinGeckoClient {
    #[tracing::instrument(skip_all, fields(fiat = %fiat, coins = coins.len()))]
    async fn spot_quotes(&self, coins: &[CoinRef], fiat: &Fiat) -> Result<Vec<PriceQuote>> {
        let ids = coins.iter().map(|c| c.id).collect::<Vec<_>>().join(",");
        let request = self.get("/simple/price").query(&[
            ("ids", ids.as_str()),
            ("vs_currencies", fiat.code()),
            ("include_24hr_change", "true"),
        ]);

        let body: SimplePriceResponse = get_json(request).await?;
        parse_simple_price(&body, coins, fiat)
    }

    #[tracing::instrument(skip_all, fields(fiat = %fiat, limit = limit))]
    async fn top_by_market_cap(&self, limit: usize, fiat: &Fiat) -> Result<MarketSnapshot> {
        let per_page = limit.to_string();
        let request = self.get("/coins/markets").query(&[
            ("vs_currency", fiat.code()),
            ("order", "market_cap_desc"),
            ("per_page", per_page.as_str()),
            ("page", "1"),
            ("price_change_percentage", "24h"),
        ]);

        let entries: Vec<MarketEntry> = get_json(request).await?;
        Ok(parse_markets(entries, limit))
    }

    fn name(&self) -> &str {
        "CoinGecko"
    }
}

fn parse_simple_price(
    body: &SimplePriceResponse,
    coins: &[CoinRef],
    fiat: &Fiat,
) -> Result<Vec<PriceQuote>> {
    let change_key = format!("{}_24h_change", fiat.code());

    coins
        .iter()
        .map(|coin| {
            let fields = body
                .get(coin.id)
                .ok_or_else(|| FetchError::Malformed(format!("no quote for {}", coin.id)))?;

            let price = fields
                .get(fiat.code())
                .copied()
                .flatten()
                .and_then(decimal_from_f64)
                .ok_or_else(|| FetchError::Malformed(format!("no {} price for {}", fiat.code(), coin.id)))?;

            let change = fields
                .get(&change_key)
                .copied()
                .flatten()
                .and_then(decimal_from_f64)
                .unwrap_or(Decimal::ZERO);

            Ok(PriceQuote::new(coin, price).with_change(change))
        })
        .collect()
}

fn parse_markets(entries: Vec<MarketEntry>, limit: usize) -> MarketSnapshot {
    let quotes = entries
        .into_iter()
        .filter_map(|entry| {
            let Some(price) = entry.current_price.and_then(decimal_from_f64) else {
                tracing::debug!(id = %entry.id, "skipping market entry without price");
                return None;
            };
            Some(PriceQuote {
                id: entry.id,
                symbol: entry.symbol.to_uppercase(),
                name: entry.name,
                fiat_price: price,
                change_24h_pct: entry
                    .price_change_percentage_24h
                    .and_then(decimal_from_f64)
                    .unwrap_or(Decimal::ZERO),
                market_cap_rank: entry.market_cap_rank,
            })
        })
        .collect();

    MarketSnapshot::from_ranked(quotes, limit)
}
