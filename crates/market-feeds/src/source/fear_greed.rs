//! Fear & Greed Index Client (alternative.me)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{get_json, SentimentSource};
use crate::config::FeedsConfig;
use crate::error::{FetchError, Result};
use crate::model::SentimentReading;

#[derive(Debug, Deserialize)]
struct FngResponse {
    data: Vec<FngEntry>,
}

/// The provider encodes every field as a string. Its own
/// `value_classification` label is ignored.
#[derive(Debug, Deserialize)]
struct FngEntry {
    value: String,
    timestamp: String,
}

pub struct FearGreedClient {
    http: reqwest::Client,
    url: String,
}

impl FearGreedClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self { http, url: url.into() }
    }

    pub fn from_config(config: &FeedsConfig) -> Result<Self> {
        Ok(Self::new(config.http_client()?, config.fear_greed_url.clone()))
    }
}

#[async_trait]
impl SentimentSource for FearGreedClient {
    #[tracing::instrument(skip_all)]
    async fn current(&self) -> Result<SentimentReading> {
        let request = self.http.get(&self.url).query(&[("limit", "1")]);
        let body: FngResponse = get_json(request).await?;
        parse_reading(body)
    }

    fn name(&self) -> &str {
        "Fear & Greed"
    }
}

/// Classification is re-derived from the value rather than trusting the
/// provider label.
fn parse_reading(body: FngResponse) -> Result<SentimentReading> {
    let entry = body
        .data
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::Malformed("empty data array".into()))?;

    let value: u8 = entry
        .value
        .trim()
        .parse()
        .map_err(|_| FetchError::Malformed(format!("bad index value {:?}", entry.value)))?;

    let observed_at = entry
        .timestamp
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .ok_or_else(|| FetchError::Malformed(format!("bad timestamp {:?}", entry.timestamp)))?;

    SentimentReading::new(value, observed_at)
        .ok_or_else(|| FetchError::Malformed(format!("index value {value} out of range")))
}
