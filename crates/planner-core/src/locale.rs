//! Localization
//!
//! Rendering code never branches on language; it asks a [`Localizer`] for a
//! message id and passes named parameters.

use serde::{Deserialize, Serialize};

/// Supported chat languages
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Es,
    En,
}

impl Locale {
    pub const ALL: [Locale; 2] = [Locale::Es, Locale::En];

    pub fn code(&self) -> &'static str {
        match self {
            Locale::Es => "es",
            Locale::En => "en",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "es" => Some(Locale::Es),
            "en" => Some(Locale::En),
            _ => None,
        }
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Every user-visible string the service emits
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageId {
    ChooseLanguage,
    LanguageButton,
    LanguageSaved,
    Welcome,
    MainMenuTitle,
    Help,
    SettingsTitle,
    UnknownCommand,
    TryLater,
    SourceUnavailable,
    GenericError,

    BtnOverview,
    BtnPrices,
    BtnTop,
    BtnSentiment,
    BtnNews,
    BtnCreateAlert,
    BtnMyAlerts,
    BtnSettings,

    ReportHeader,
    PricesTitle,
    TopTitle,
    SentimentTitle,
    SentimentLine,
    NewsTitle,
    ReportFooter,

    SentimentExtremeFear,
    SentimentFear,
    SentimentNeutral,
    SentimentGreed,
    SentimentExtremeGreed,

    AlertAskCoin,
    AlertUnknownCoin,
    AlertAskPrice,
    AlertInvalidPrice,
    AlertSaved,
    AlertCancelled,
    NothingToCancel,
    AlertsTitle,
    NoAlerts,
}

/// Resolves message ids to text for a locale
pub trait Localizer: Send + Sync {
    /// Look up `id` for `locale` and substitute `{name}` placeholders
    fn resolve(&self, locale: Locale, id: MessageId, params: &[(&str, &str)]) -> String;

    /// Lookup without parameters
    fn text(&self, locale: Locale, id: MessageId) -> String {
        self.resolve(locale, id, &[])
    }
}

/// Built-in Spanish and English tables
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticLocalizer;

impl StaticLocalizer {
    pub fn new() -> Self {
        Self
    }

    fn template(locale: Locale, id: MessageId) -> &'static str {
        use MessageId as M;

        match (locale, id) {
            // Shown before a language is known, so both languages at once
            (_, M::ChooseLanguage) => "🌐 Choose language / Elige idioma:",
            (_, M::Help) => {
                "Use /start to choose language and open the main menu.\n\
                 Usa /start para elegir idioma y abrir el menú principal.\n\n\
                 /today /prices /top /sentiment /news /alert /alerts /cancel"
            }

            (Locale::En, M::LanguageButton) => "🇬🇧 English",
            (Locale::Es, M::LanguageButton) => "🇪🇸 Español",

            (Locale::En, M::LanguageSaved) => "✅ Language saved: English.",
            (Locale::Es, M::LanguageSaved) => "✅ Idioma guardado: Español.",
            (Locale::En, M::Welcome) => {
                "👋 Welcome to <b>Crypto Planner</b>!\n\n\
                 I will help you track the crypto market and plan your buys."
            }
            (Locale::Es, M::Welcome) => {
                "👋 ¡Bienvenido a <b>Crypto Planner</b>!\n\n\
                 Te ayudaré a seguir el mercado cripto y planificar tus compras."
            }
            (Locale::En, M::MainMenuTitle) => "📋 Main menu:",
            (Locale::Es, M::MainMenuTitle) => "📋 Menú principal:",
            (Locale::En, M::SettingsTitle) => "⚙️ Settings. Choose your language:",
            (Locale::Es, M::SettingsTitle) => "⚙️ Ajustes. Elige tu idioma:",
            (Locale::En, M::UnknownCommand) => {
                "I don’t understand this yet. Please use the menu buttons."
            }
            (Locale::Es, M::UnknownCommand) => {
                "Todavía no entiendo este mensaje. Usa los botones del menú."
            }
            (Locale::En, M::TryLater) => "⚠️ Market data is unavailable right now. Please try again later.",
            (Locale::Es, M::TryLater) => {
                "⚠️ Los datos de mercado no están disponibles ahora. Inténtalo más tarde."
            }
            (Locale::En, M::SourceUnavailable) => "⚠️ This data source is unavailable right now.",
            (Locale::Es, M::SourceUnavailable) => "⚠️ Esta fuente de datos no está disponible ahora.",
            (Locale::En, M::GenericError) => "⚠️ Something went wrong. Please try again later.",
            (Locale::Es, M::GenericError) => "⚠️ Algo salió mal. Inténtalo más tarde.",

            (Locale::En, M::BtnOverview) => "📊 Today's crypto overview",
            (Locale::Es, M::BtnOverview) => "📊 Resumen cripto de hoy",
            (Locale::En, M::BtnPrices) => "💰 BTC / ETH prices",
            (Locale::Es, M::BtnPrices) => "💰 Precios BTC / ETH",
            (Locale::En, M::BtnTop) => "🏆 Top 5 coins",
            (Locale::Es, M::BtnTop) => "🏆 Top 5 monedas",
            (Locale::En, M::BtnSentiment) => "🧭 Market sentiment",
            (Locale::Es, M::BtnSentiment) => "🧭 Sentimiento del mercado",
            (Locale::En, M::BtnNews) => "📰 News",
            (Locale::Es, M::BtnNews) => "📰 Noticias",
            (Locale::En, M::BtnCreateAlert) => "🔔 Create alert",
            (Locale::Es, M::BtnCreateAlert) => "🔔 Crear alerta",
            (Locale::En, M::BtnMyAlerts) => "📝 My alerts",
            (Locale::Es, M::BtnMyAlerts) => "📝 Mis alertas",
            (Locale::En, M::BtnSettings) => "⚙️ Settings",
            (Locale::Es, M::BtnSettings) => "⚙️ Ajustes",

            (Locale::En, M::ReportHeader) => "📊 <b>Crypto overview</b> · {date}",
            (Locale::Es, M::ReportHeader) => "📊 <b>Resumen cripto</b> · {date}",
            (Locale::En, M::PricesTitle) => "💰 <b>Prices ({fiat})</b>",
            (Locale::Es, M::PricesTitle) => "💰 <b>Precios ({fiat})</b>",
            (Locale::En, M::TopTitle) => "🏆 <b>Top {n} by market cap</b>",
            (Locale::Es, M::TopTitle) => "🏆 <b>Top {n} por capitalización</b>",
            (Locale::En, M::SentimentTitle) => "🧭 <b>Market sentiment</b>",
            (Locale::Es, M::SentimentTitle) => "🧭 <b>Sentimiento del mercado</b>",
            (_, M::SentimentLine) => "Fear &amp; Greed: {value}/100 · {label}",
            (Locale::En, M::NewsTitle) => "📰 <b>News</b>",
            (Locale::Es, M::NewsTitle) => "📰 <b>Noticias</b>",
            (Locale::En, M::ReportFooter) => "ℹ️ Not financial advice. Data: CoinGecko, alternative.me, CryptoPanic.",
            (Locale::Es, M::ReportFooter) => {
                "ℹ️ No es asesoramiento financiero. Datos: CoinGecko, alternative.me, CryptoPanic."
            }

            (Locale::En, M::SentimentExtremeFear) => "Extreme fear",
            (Locale::Es, M::SentimentExtremeFear) => "Miedo extremo",
            (Locale::En, M::SentimentFear) => "Fear",
            (Locale::Es, M::SentimentFear) => "Miedo",
            (Locale::En, M::SentimentNeutral) => "Neutral",
            (Locale::Es, M::SentimentNeutral) => "Neutral",
            (Locale::En, M::SentimentGreed) => "Greed",
            (Locale::Es, M::SentimentGreed) => "Codicia",
            (Locale::En, M::SentimentExtremeGreed) => "Extreme greed",
            (Locale::Es, M::SentimentExtremeGreed) => "Codicia extrema",

            (Locale::En, M::AlertAskCoin) => "🔔 Which coin? Send one of: {coins}",
            (Locale::Es, M::AlertAskCoin) => "🔔 ¿Qué moneda? Envía una de: {coins}",
            (Locale::En, M::AlertUnknownCoin) => "❌ Unknown coin. Send one of: {coins}",
            (Locale::Es, M::AlertUnknownCoin) => "❌ Moneda desconocida. Envía una de: {coins}",
            (Locale::En, M::AlertAskPrice) => "💶 Target price for {coin}? (e.g. 41000.50)",
            (Locale::Es, M::AlertAskPrice) => "💶 ¿Precio objetivo para {coin}? (p. ej. 41000,50)",
            (Locale::En, M::AlertInvalidPrice) => {
                "❌ That is not a valid price. Send a positive number, e.g. 41000.50"
            }
            (Locale::Es, M::AlertInvalidPrice) => {
                "❌ No es un precio válido. Envía un número positivo, p. ej. 41000,50"
            }
            (Locale::En, M::AlertSaved) => "✅ Alert saved: {coin} at {price}.",
            (Locale::Es, M::AlertSaved) => "✅ Alerta guardada: {coin} a {price}.",
            (Locale::En, M::AlertCancelled) => "🚫 Alert creation cancelled.",
            (Locale::Es, M::AlertCancelled) => "🚫 Creación de alerta cancelada.",
            (Locale::En, M::NothingToCancel) => "Nothing to cancel.",
            (Locale::Es, M::NothingToCancel) => "No hay nada que cancelar.",
            (Locale::En, M::AlertsTitle) => "📝 <b>Your alerts</b>",
            (Locale::Es, M::AlertsTitle) => "📝 <b>Tus alertas</b>",
            (Locale::En, M::NoAlerts) => "You have no alerts yet.",
            (Locale::Es, M::NoAlerts) => "Todavía no tienes alertas.",
        }
    }
}

impl Localizer for StaticLocalizer {
    fn resolve(&self, locale: Locale, id: MessageId, params: &[(&str, &str)]) -> String {
        params
            .iter()
            .fold(Self::template(locale, id).to_string(), |text, (name, value)| {
                text.replace(&format!("{{{name}}}"), value)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_codes() {
        assert_eq!(Locale::from_code("EN"), Some(Locale::En));
        assert_eq!(Locale::from_code("fr"), None);
        assert_eq!(Locale::default(), Locale::Es);
        assert_eq!(Locale::Es.to_string(), "es");
    }

    #[test]
    fn test_resolve_substitutes_params() {
        let localizer = StaticLocalizer::new();
        let text = localizer.resolve(
            Locale::En,
            MessageId::AlertSaved,
            &[("coin", "BTC"), ("price", "€41000.50")],
        );
        assert_eq!(text, "✅ Alert saved: BTC at €41000.50.");
    }

    #[test]
    fn test_labels_differ_per_locale() {
        let localizer = StaticLocalizer::new();
        assert_ne!(
            localizer.text(Locale::Es, MessageId::BtnOverview),
            localizer.text(Locale::En, MessageId::BtnOverview)
        );
        assert_eq!(
            localizer.text(Locale::Es, MessageId::ChooseLanguage),
            localizer.text(Locale::En, MessageId::ChooseLanguage)
        );
    }
}
