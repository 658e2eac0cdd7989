//! Feed Configuration

use std::time::Duration;

use crate::model::Fiat;

/// Endpoints, keys and limits for the upstream providers
#[derive(Clone, Debug)]
pub struct FeedsConfig {
    /// CoinGecko API root
    pub coingecko_base_url: String,

    /// Optional CoinGecko demo key
    pub coingecko_api_key: Option<String>,

    /// Fear & Greed endpoint
    pub fear_greed_url: String,

    /// CryptoPanic API root
    pub cryptopanic_base_url: String,

    /// CryptoPanic token; news is unavailable without it
    pub cryptopanic_token: Option<String>,

    /// CryptoPanic `filter` value
    pub news_filter: Option<String>,

    /// Quote currency
    pub fiat: Fiat,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            coingecko_base_url: "https://api.coingecko.com/api/v3".into(),
            coingecko_api_key: None,
            fear_greed_url: "https://api.alternative.me/fng/".into(),
            cryptopanic_base_url: "https://cryptopanic.com/api/v1".into(),
            cryptopanic_token: None,
            news_filter: Some("hot".into()),
            fiat: Fiat::eur(),
            timeout_secs: 15,
        }
    }
}

impl FeedsConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            coingecko_base_url: get("COINGECKO_BASE_URL").unwrap_or(defaults.coingecko_base_url),
            coingecko_api_key: get("COINGECKO_API_KEY"),
            fear_greed_url: get("FEAR_GREED_URL").unwrap_or(defaults.fear_greed_url),
            cryptopanic_base_url: get("CRYPTOPANIC_BASE_URL")
                .unwrap_or(defaults.cryptopanic_base_url),
            cryptopanic_token: get("CRYPTOPANIC_TOKEN"),
            news_filter: get("NEWS_FILTER").or(defaults.news_filter),
            fiat: get("VS_CURRENCY").map_or(defaults.fiat, Fiat::new),
            timeout_secs: get("FETCH_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.timeout_secs),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Shared HTTP client carrying the fetch timeout
    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout())
            .user_agent(concat!("crypto-planner/", env!("CARGO_PKG_VERSION")))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_defaults() {
        let config = FeedsConfig::from_lookup(|_| None);
        assert_eq!(config.fiat, Fiat::eur());
        assert_eq!(config.timeout_secs, 15);
        assert!(config.cryptopanic_token.is_none());
    }

    #[test]
    fn test_config_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("VS_CURRENCY", "USD"),
            ("FETCH_TIMEOUT_SECS", "5"),
            ("CRYPTOPANIC_TOKEN", "abc"),
            ("COINGECKO_API_KEY", "  "),
        ]);
        let config = FeedsConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_string()));

        assert_eq!(config.fiat.code(), "usd");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.cryptopanic_token.as_deref(), Some("abc"));
        assert!(config.coingecko_api_key.is_none());
    }
}
