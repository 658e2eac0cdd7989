//! Commands
//!
//! Locale-independent command model. Structured button events carry a
//! stable callback id; plain text is matched against slash commands and,
//! as a fallback, against the localized menu labels of every locale.

use crate::locale::{Locale, Localizer, MessageId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Restart: discard any draft and choose a language again
    Start,
    Help,
    Cancel,
    Settings,
    SetLocale(Locale),
    Overview,
    Prices,
    TopMarket,
    Sentiment,
    News,
    CreateAlert,
    MyAlerts,
}

impl Command {
    /// Main menu, in display order
    pub const MENU: [Command; 8] = [
        Command::Overview,
        Command::Prices,
        Command::TopMarket,
        Command::Sentiment,
        Command::News,
        Command::CreateAlert,
        Command::MyAlerts,
        Command::Settings,
    ];

    /// Parse `/name` or `/name@botname`; arguments after a space are ignored
    pub fn from_slash(text: &str) -> Option<Self> {
        let word = text.trim().strip_prefix('/')?.split_whitespace().next()?;
        let name = word.split('@').next().unwrap_or(word);

        match name.to_lowercase().as_str() {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            "cancel" => Some(Command::Cancel),
            "settings" => Some(Command::Settings),
            "today" | "overview" | "report" => Some(Command::Overview),
            "prices" => Some(Command::Prices),
            "top" => Some(Command::TopMarket),
            "sentiment" => Some(Command::Sentiment),
            "news" => Some(Command::News),
            "alert" => Some(Command::CreateAlert),
            "alerts" => Some(Command::MyAlerts),
            _ => None,
        }
    }

    /// Parse a structured button callback id
    pub fn from_callback(id: &str) -> Option<Self> {
        if let Some(code) = id.strip_prefix("lang_") {
            return Locale::from_code(code).map(Command::SetLocale);
        }
        Self::MENU
            .into_iter()
            .chain([Command::Start, Command::Help, Command::Cancel])
            .find(|cmd| cmd.callback_id() == id)
    }

    /// Stable id sent back by the transport when a button is pressed
    pub fn callback_id(&self) -> String {
        match self {
            Command::SetLocale(locale) => format!("lang_{}", locale.code()),
            Command::Start => "cmd_start".into(),
            Command::Help => "cmd_help".into(),
            Command::Cancel => "cmd_cancel".into(),
            Command::Settings => "cmd_settings".into(),
            Command::Overview => "cmd_overview".into(),
            Command::Prices => "cmd_prices".into(),
            Command::TopMarket => "cmd_top".into(),
            Command::Sentiment => "cmd_sentiment".into(),
            Command::News => "cmd_news".into(),
            Command::CreateAlert => "cmd_alert".into(),
            Command::MyAlerts => "cmd_alerts".into(),
        }
    }

    /// Label message for menu entries
    pub fn label(&self) -> Option<MessageId> {
        match self {
            Command::Overview => Some(MessageId::BtnOverview),
            Command::Prices => Some(MessageId::BtnPrices),
            Command::TopMarket => Some(MessageId::BtnTop),
            Command::Sentiment => Some(MessageId::BtnSentiment),
            Command::News => Some(MessageId::BtnNews),
            Command::CreateAlert => Some(MessageId::BtnCreateAlert),
            Command::MyAlerts => Some(MessageId::BtnMyAlerts),
            Command::Settings => Some(MessageId::BtnSettings),
            _ => None,
        }
    }

    /// Reverse lookup of a menu label typed (or tapped) as plain text.
    /// Every locale is searched so a stale keyboard still works after a
    /// language change.
    pub fn from_label(text: &str, localizer: &dyn Localizer) -> Option<Self> {
        let text = text.trim();
        Self::MENU.into_iter().find(|cmd| {
            cmd.label().is_some_and(|id| {
                Locale::ALL.iter().any(|locale| localizer.text(*locale, id) == text)
            })
        })
    }

    /// Plain text: slash command first, then menu label
    pub fn parse_text(text: &str, localizer: &dyn Localizer) -> Option<Self> {
        Self::from_slash(text).or_else(|| Self::from_label(text, localizer))
    }

    /// Commands that take effect even while an alert dialog is open
    pub fn preempts_dialog(&self) -> bool {
        matches!(self, Command::Start | Command::Cancel | Command::CreateAlert)
    }
}
