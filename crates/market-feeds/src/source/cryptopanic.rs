//! CryptoPanic News Client

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{get_json, NewsSource};
use crate::config::FeedsConfig;
use crate::error::{FetchError, Result};
use crate::model::NewsItem;

#[derive(Debug, Deserialize)]
struct PostsResponse {
    results: Vec<Post>,
}

#[derive(Debug, Deserialize)]
struct Post {
    title: String,
    url: String,
    source: Option<PostSource>,
    published_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct PostSource {
    title: Option<String>,
}

pub struct CryptoPanicClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    default_filter: Option<String>,
}

impl CryptoPanicClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        token: Option<String>,
        default_filter: Option<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            default_filter,
        }
    }

    pub fn from_config(config: &FeedsConfig) -> Result<Self> {
        Ok(Self::new(
            config.http_client()?,
            config.cryptopanic_base_url.clone(),
            config.cryptopanic_token.clone(),
            config.news_filter.clone(),
        ))
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }
}

#[async_trait]
impl NewsSource for CryptoPanicClient {
    #[tracing::instrument(skip_all, fields(category = ?category, limit = limit))]
    async fn latest(&self, category: Option<&str>, limit: usize) -> Result<Vec<NewsItem>> {
        let token = self
            .token
            .as_deref()
            .ok_or(FetchError::NotConfigured("CRYPTOPANIC_TOKEN"))?;

        let mut query = vec![("auth_token", token), ("public", "true")];
        if let Some(filter) = category.or(self.default_filter.as_deref()) {
            query.push(("filter", filter));
        }

        let request = self
            .http
            .get(format!("{}/posts/", self.base_url))
            .query(&query);

        let body: PostsResponse = get_json(request).await?;
        Ok(into_items(body, limit))
    }

    fn name(&self) -> &str {
        "CryptoPanic"
    }
}

/// Provider order is kept as-is; it is not guaranteed to be newest first.
fn into_items(body: PostsResponse, limit: usize) -> Vec<NewsItem> {
    body.results
        .into_iter()
        .filter(|post| !post.title.trim().is_empty())
        .take(limit)
        .map(|post| NewsItem {
            title: post.title.trim().to_string(),
            source_url: post.url,
            source_title: post.source.and_then(|s| s.title),
            published_at: post.published_at,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "count": 3,
        "results": [
            {"kind": "news", "title": "Bitcoin tops 100k",
             "url": "https://cryptopanic.com/news/1", "source": {"title": "CoinDesk"},
             "published_at": "2024-12-05T08:00:00Z"},
            {"kind": "news", "title": "  ",
             "url": "https://cryptopanic.com/news/2", "source": null,
             "published_at": "2024-12-05T07:00:00Z"},
            {"kind": "news", "title": "ETH upgrade scheduled",
             "url": "https://cryptopanic.com/news/3",
             "published_at": "2024-12-05T09:30:00Z"}
        ]
    }"#;

    #[test]
    fn test_into_items() {
        let body: PostsResponse = serde_json::from_str(SAMPLE).unwrap();
        let items = into_items(body, 5);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Bitcoin tops 100k");
        assert_eq!(items[0].source_title.as_deref(), Some("CoinDesk"));
        assert_eq!(items[1].source_title, None);
    }

    #[test]
    fn test_into_items_respects_limit() {
        let body: PostsResponse = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(into_items(body, 1).len(), 1);
    }

    #[tokio::test]
    async fn test_missing_token_is_not_configured() {
        let client = CryptoPanicClient::new(reqwest::Client::new(), "http://localhost", None, None);
        assert!(!client.is_configured());

        let result = client.latest(None, 5).await;
        assert_eq!(result, Err(FetchError::NotConfigured("CRYPTOPANIC_TOKEN")));
    }
}
