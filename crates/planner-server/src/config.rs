//! Process Configuration

use std::time::Duration;

use market_feeds::FeedsConfig;
use planner_core::{CoreError, DailySchedule, Locale, ReportConfig, Result};

/// Everything the process reads from the environment
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub telegram_token: String,
    pub database_url: String,
    pub bind_addr: String,
    pub feeds: FeedsConfig,
    pub schedule: DailySchedule,
    pub broadcast_concurrency: usize,
    pub default_locale: Locale,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; blank values count as unset and
    /// malformed ones are rejected
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let telegram_token = get("TELEGRAM_BOT_TOKEN")
            .ok_or_else(|| CoreError::Config("TELEGRAM_BOT_TOKEN is required".into()))?;

        if let Some(raw) = get("FETCH_TIMEOUT_SECS") {
            parse_positive("FETCH_TIMEOUT_SECS", &raw)?;
        }

        let schedule = DailySchedule::parse(
            &get("BROADCAST_TIME").unwrap_or_else(|| "09:00".into()),
            &get("BROADCAST_TZ").unwrap_or_else(|| "Europe/Madrid".into()),
        )?;

        let broadcast_concurrency = match get("BROADCAST_CONCURRENCY") {
            Some(raw) => parse_positive("BROADCAST_CONCURRENCY", &raw)?,
            None => 4,
        };

        let default_locale = match get("DEFAULT_LOCALE") {
            Some(code) => Locale::from_code(&code)
                .ok_or_else(|| CoreError::Config(format!("unsupported DEFAULT_LOCALE {code:?}")))?,
            None => Locale::default(),
        };

        Ok(Self {
            telegram_token,
            database_url: get("DATABASE_URL").unwrap_or_else(|| "sqlite://crypto_planner.db".into()),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into()),
            feeds: FeedsConfig::from_lookup(&lookup),
            schedule,
            broadcast_concurrency,
            default_locale,
        })
    }

    pub fn report_config(&self) -> ReportConfig {
        ReportConfig {
            fiat: self.feeds.fiat.clone(),
            timezone: self.schedule.tz,
            news_category: self.feeds.news_filter.clone(),
            // clients time out first; this only catches a stuck connection
            fetch_timeout: self.feeds.timeout() + Duration::from_secs(1),
            ..ReportConfig::default()
        }
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| CoreError::Config(format!("{key} must be a positive integer, got {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        AppConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("TELEGRAM_BOT_TOKEN", "123:abc")]).unwrap();
        assert_eq!(config.database_url, "sqlite://crypto_planner.db");
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.broadcast_concurrency, 4);
        assert_eq!(config.default_locale, Locale::Es);
        assert_eq!(config.schedule.tz, chrono_tz::Europe::Madrid);
        assert_eq!(config.report_config().fetch_timeout, Duration::from_secs(16));
    }

    #[test]
    fn test_token_is_required() {
        assert!(matches!(config(&[]), Err(CoreError::Config(_))));
        assert!(matches!(config(&[("TELEGRAM_BOT_TOKEN", "  ")]), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_invalid_values_fail_fast() {
        for (key, value) in [
            ("BROADCAST_TIME", "9am"),
            ("BROADCAST_TZ", "Nowhere/Special"),
            ("BROADCAST_CONCURRENCY", "0"),
            ("DEFAULT_LOCALE", "fr"),
            ("FETCH_TIMEOUT_SECS", "soon"),
        ] {
            let result = config(&[("TELEGRAM_BOT_TOKEN", "123:abc"), (key, value)]);
            assert!(matches!(result, Err(CoreError::Config(_))), "{key}={value} accepted");
        }
    }

    #[test]
    fn test_overrides_reach_report_config() {
        let config = config(&[
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("VS_CURRENCY", "usd"),
            ("BROADCAST_TZ", "America/New_York"),
            ("DEFAULT_LOCALE", "en"),
        ])
        .unwrap();

        let report = config.report_config();
        assert_eq!(report.fiat.code(), "usd");
        assert_eq!(report.timezone.name(), "America/New_York");
        assert_eq!(config.default_locale, Locale::En);
    }
}
