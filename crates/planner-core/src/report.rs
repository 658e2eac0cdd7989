//! Report Aggregation
//!
//! Fetches every upstream source concurrently, degrades failed optional
//! sources to omitted sections, and renders one localized document:
//!
//! ```text
//! header ─ prices (mandatory) ─ top-N ─ sentiment ─ news ─ footer
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use market_feeds::{
    CoinRef, FetchError, Fiat, MarketDataSource, MarketSnapshot, NewsItem, NewsSource,
    PriceQuote, SentimentClass, SentimentReading, SentimentSource,
};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::AggregationError;
use crate::locale::{Locale, Localizer, MessageId};
use crate::transport::OutboundMessage;

/// Coins shown in the mandatory price section
const HEADLINE_COINS: [CoinRef; 2] = [CoinRef::BITCOIN, CoinRef::ETHEREUM];

#[derive(Clone, Debug)]
pub struct ReportConfig {
    pub fiat: Fiat,
    /// Zone used for the header timestamp
    pub timezone: Tz,
    pub top_n: usize,
    pub news_limit: usize,
    pub news_category: Option<String>,
    /// Upper bound for each source, on top of the client's own timeout
    pub fetch_timeout: Duration,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            fiat: Fiat::eur(),
            timezone: chrono_tz::Europe::Madrid,
            top_n: 5,
            news_limit: 5,
            news_category: None,
            fetch_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SectionKind {
    Header,
    Prices,
    TopMarket,
    Sentiment,
    News,
    Footer,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Section {
    pub kind: SectionKind,
    pub body: String,
}

/// Rendered, localized report (HTML formatted)
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub locale: Locale,
    pub generated_at: DateTime<Utc>,
    sections: Vec<Section>,
}

impl Report {
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn kinds(&self) -> Vec<SectionKind> {
        self.sections.iter().map(|s| s.kind).collect()
    }

    pub fn section(&self, kind: SectionKind) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.kind == kind)
            .map(|s| s.body.as_str())
    }

    pub fn text(&self) -> String {
        self.sections
            .iter()
            .map(|s| s.body.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn to_message(&self) -> OutboundMessage {
        OutboundMessage::html(self.text())
    }
}

pub struct ReportAggregator {
    market: Arc<dyn MarketDataSource>,
    sentiment: Arc<dyn SentimentSource>,
    news: Arc<dyn NewsSource>,
    localizer: Arc<dyn Localizer>,
    config: ReportConfig,
}

impl ReportAggregator {
    pub fn new(
        market: Arc<dyn MarketDataSource>,
        sentiment: Arc<dyn SentimentSource>,
        news: Arc<dyn NewsSource>,
        localizer: Arc<dyn Localizer>,
        config: ReportConfig,
    ) -> Self {
        Self { market, sentiment, news, localizer, config }
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Build the full report for `locale`
    pub async fn build(&self, locale: Locale) -> Result<Report, AggregationError> {
        self.build_at(locale, Utc::now()).await
    }

    #[tracing::instrument(skip_all, fields(locale = %locale))]
    pub async fn build_at(
        &self,
        locale: Locale,
        now: DateTime<Utc>,
    ) -> Result<Report, AggregationError> {
        let (spot, top, sentiment, news) = tokio::join!(
            self.fetch_spot(),
            self.fetch_top(),
            self.fetch_sentiment(),
            self.fetch_news(),
        );

        let spot = spot.map_err(AggregationError::PrimaryDataUnavailable)?;

        let mut sections = vec![
            Section { kind: SectionKind::Header, body: self.render_header(locale, now) },
            Section { kind: SectionKind::Prices, body: self.render_prices(locale, &spot) },
        ];
        if let Some(snapshot) = top.ok().filter(|s| !s.is_empty()) {
            sections.push(Section {
                kind: SectionKind::TopMarket,
                body: self.render_top(locale, &snapshot),
            });
        }
        if let Ok(reading) = sentiment {
            sections.push(Section {
                kind: SectionKind::Sentiment,
                body: self.render_sentiment(locale, &reading),
            });
        }
        if let Some(items) = news.ok().filter(|items| !items.is_empty()) {
            sections.push(Section {
                kind: SectionKind::News,
                body: self.render_news(locale, &items),
            });
        }
        sections.push(Section {
            kind: SectionKind::Footer,
            body: self.localizer.text(locale, MessageId::ReportFooter),
        });

        tracing::debug!(sections = sections.len(), "report assembled");
        Ok(Report { locale, generated_at: now, sections })
    }

    /// BTC/ETH section on its own; fails like the full report does
    pub async fn prices_block(&self, locale: Locale) -> Result<String, AggregationError> {
        let spot = self
            .fetch_spot()
            .await
            .map_err(AggregationError::PrimaryDataUnavailable)?;
        Ok(self.render_prices(locale, &spot))
    }

    pub async fn top_block(&self, locale: Locale) -> Result<String, FetchError> {
        let snapshot = self.fetch_top().await?;
        if snapshot.is_empty() {
            return Err(FetchError::Malformed("empty ranking".into()));
        }
        Ok(self.render_top(locale, &snapshot))
    }

    pub async fn sentiment_block(&self, locale: Locale) -> Result<String, FetchError> {
        let reading = self.fetch_sentiment().await?;
        Ok(self.render_sentiment(locale, &reading))
    }

    pub async fn news_block(&self, locale: Locale) -> Result<String, FetchError> {
        let items = self.fetch_news().await?;
        if items.is_empty() {
            return Err(FetchError::Malformed("no headlines".into()));
        }
        Ok(self.render_news(locale, &items))
    }

    // ------------------------------------------------------------------
    // Fetching
    // ------------------------------------------------------------------

    async fn fetch_spot(&self) -> Result<Vec<PriceQuote>, FetchError> {
        let fut = self.market.spot_quotes(&HEADLINE_COINS, &self.config.fiat);
        self.guarded(self.market.name(), fut).await
    }

    async fn fetch_top(&self) -> Result<MarketSnapshot, FetchError> {
        let fut = self.market.top_by_market_cap(self.config.top_n, &self.config.fiat);
        self.guarded(self.market.name(), fut).await
    }

    async fn fetch_sentiment(&self) -> Result<SentimentReading, FetchError> {
        self.guarded(self.sentiment.name(), self.sentiment.current()).await
    }

    async fn fetch_news(&self) -> Result<Vec<NewsItem>, FetchError> {
        let fut = self
            .news
            .latest(self.config.news_category.as_deref(), self.config.news_limit);
        self.guarded(self.news.name(), fut).await
    }

    /// Apply the per-source deadline and log failures. A failed fetch is
    /// not retried within the same aggregation.
    async fn guarded<T>(
        &self,
        source: &str,
        fut: impl Future<Output = Result<T, FetchError>>,
    ) -> Result<T, FetchError> {
        let result = tokio::time::timeout(self.config.fetch_timeout, fut)
            .await
            .unwrap_or(Err(FetchError::Timeout));

        if let Err(err) = &result {
            tracing::warn!(source, kind = err.kind(), error = %err, "source fetch failed");
        }
        result
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    fn render_header(&self, locale: Locale, now: DateTime<Utc>) -> String {
        let local = now.with_timezone(&self.config.timezone);
        let date = local.format("%d.%m.%Y %H:%M %Z").to_string();
        self.localizer
            .resolve(locale, MessageId::ReportHeader, &[("date", date.as_str())])
    }

    fn render_prices(&self, locale: Locale, quotes: &[PriceQuote]) -> String {
        let fiat = self.config.fiat.to_string();
        let mut out = self
            .localizer
            .resolve(locale, MessageId::PricesTitle, &[("fiat", fiat.as_str())]);

        for quote in quotes {
            out.push_str(&format!(
                "\n• <b>{}</b>: {} ({})",
                escape_html(&quote.symbol),
                format_price(&self.config.fiat, quote.fiat_price),
                format_change(quote.change_24h_pct),
            ));
        }
        out
    }

    fn render_top(&self, locale: Locale, snapshot: &MarketSnapshot) -> String {
        let n = snapshot.len().to_string();
        let mut out = self
            .localizer
            .resolve(locale, MessageId::TopTitle, &[("n", n.as_str())]);

        for entry in snapshot.entries() {
            out.push_str(&format!(
                "\n{}. <b>{}</b> {}: {} ({})",
                entry.rank,
                escape_html(&entry.quote.symbol),
                escape_html(&entry.quote.name),
                format_price(&self.config.fiat, entry.quote.fiat_price),
                format_change(entry.quote.change_24h_pct),
            ));
        }
        out
    }

    fn render_sentiment(&self, locale: Locale, reading: &SentimentReading) -> String {
        let label = self.localizer.text(locale, sentiment_label(reading.classification));
        let value = reading.value.to_string();
        format!(
            "{}\n{} {}",
            self.localizer.text(locale, MessageId::SentimentTitle),
            sentiment_emoji(reading.classification),
            self.localizer.resolve(
                locale,
                MessageId::SentimentLine,
                &[("value", value.as_str()), ("label", label.as_str())],
            ),
        )
    }

    fn render_news(&self, locale: Locale, items: &[NewsItem]) -> String {
        let mut out = self.localizer.text(locale, MessageId::NewsTitle);
        for item in items {
            out.push_str(&format!(
                "\n• <a href=\"{}\">{}</a>",
                escape_html(&item.source_url),
                escape_html(&item.title),
            ));
            if let Some(source) = &item.source_title {
                out.push_str(&format!(" · <i>{}</i>", escape_html(source)));
            }
        }
        out
    }
}

fn sentiment_label(class: SentimentClass) -> MessageId {
    match class {
        SentimentClass::ExtremeFear => MessageId::SentimentExtremeFear,
        SentimentClass::Fear => MessageId::SentimentFear,
        SentimentClass::Neutral => MessageId::SentimentNeutral,
        SentimentClass::Greed => MessageId::SentimentGreed,
        SentimentClass::ExtremeGreed => MessageId::SentimentExtremeGreed,
    }
}

fn sentiment_emoji(class: SentimentClass) -> &'static str {
    match class {
        SentimentClass::ExtremeFear => "😱",
        SentimentClass::Fear => "😟",
        SentimentClass::Neutral => "😐",
        SentimentClass::Greed => "🙂",
        SentimentClass::ExtremeGreed => "🤑",
    }
}

/// Price with currency sign and exactly two decimals
pub fn format_price(fiat: &Fiat, price: Decimal) -> String {
    format!("{}{:.2}", fiat.sign(), price.round_dp(2))
}

/// Percentage with explicit sign and exactly two decimals
pub fn format_change(pct: Decimal) -> String {
    let rounded = pct.round_dp(2);
    if rounded.is_zero() {
        "+0.00%".into()
    } else if rounded.is_sign_negative() {
        format!("-{:.2}%", rounded.abs())
    } else {
        format!("+{rounded:.2}%")
    }
}

/// Escape text for the gateway's HTML parse mode
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
