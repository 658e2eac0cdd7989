//! Chat Router
//!
//! Turns one inbound event into the replies for its sender. Free text is
//! offered to the alert dialog before it is treated as a command, except
//! for the few commands that must work mid-dialog (restart, cancel, new
//! alert). Button presses always run their command.

use std::sync::Arc;

use crate::alert::AlertStore;
use crate::command::Command;
use crate::dialog::{AlertDialogEngine, DialogOutcome};
use crate::error::CoreError;
use crate::locale::{Locale, Localizer, MessageId};
use crate::recipient::{RecipientId, RecipientStore};
use crate::report::{escape_html, format_price, ReportAggregator};
use crate::transport::{Button, InboundEvent, Keyboard, OutboundMessage};

/// Menu buttons per keyboard row
const MENU_COLUMNS: usize = 2;

pub struct ChatRouter {
    recipients: Arc<dyn RecipientStore>,
    alerts: Arc<dyn AlertStore>,
    dialog: Arc<AlertDialogEngine>,
    reports: Arc<ReportAggregator>,
    localizer: Arc<dyn Localizer>,
}

impl ChatRouter {
    pub fn new(
        recipients: Arc<dyn RecipientStore>,
        alerts: Arc<dyn AlertStore>,
        dialog: Arc<AlertDialogEngine>,
        reports: Arc<ReportAggregator>,
        localizer: Arc<dyn Localizer>,
    ) -> Self {
        Self { recipients, alerts, dialog, reports, localizer }
    }

    /// Replies for `event`, in sending order
    #[tracing::instrument(skip_all, fields(recipient = %event.from()))]
    pub async fn handle(&self, event: &InboundEvent) -> Vec<OutboundMessage> {
        let from = event.from();
        let locale = match self.recipients.ensure(from).await {
            Ok(locale) => locale,
            Err(e) => {
                tracing::warn!(error = %e, "recipient lookup failed, using default locale");
                Locale::default()
            }
        };

        match event {
            InboundEvent::Button { callback_id, .. } => match Command::from_callback(callback_id) {
                Some(command) => self.execute(from, locale, command).await,
                None => {
                    tracing::debug!(callback_id = %callback_id, "unknown button");
                    vec![self.unknown(locale)]
                }
            },
            InboundEvent::Text { text, .. } => {
                let command = Command::parse_text(text, self.localizer.as_ref());
                if let Some(command) = command.filter(Command::preempts_dialog) {
                    return self.execute(from, locale, command).await;
                }
                if let DialogOutcome::Consumed(reply) = self.dialog.handle(from, locale, text).await {
                    return vec![OutboundMessage::plain(reply.text)];
                }
                match command {
                    Some(command) => self.execute(from, locale, command).await,
                    None => vec![self.unknown(locale)],
                }
            }
        }
    }

    async fn execute(&self, from: RecipientId, locale: Locale, command: Command) -> Vec<OutboundMessage> {
        tracing::debug!(?command, "executing command");

        match command {
            Command::Start => {
                self.dialog.reset(from).await;
                vec![self.choose_language(locale, MessageId::ChooseLanguage)]
            }
            Command::Settings => vec![self.choose_language(locale, MessageId::SettingsTitle)],
            Command::SetLocale(chosen) => self.set_locale(from, chosen).await,
            Command::Help => vec![
                OutboundMessage::plain(self.localizer.text(locale, MessageId::Help))
                    .with_keyboard(self.main_menu(locale)),
            ],
            Command::Cancel => {
                let id = if self.dialog.cancel(from).await {
                    MessageId::AlertCancelled
                } else {
                    MessageId::NothingToCancel
                };
                vec![OutboundMessage::plain(self.localizer.text(locale, id)).with_keyboard(self.main_menu(locale))]
            }
            Command::Overview => vec![match self.reports.build(locale).await {
                Ok(report) => report.to_message(),
                Err(e) => {
                    tracing::warn!(error = %e, "overview unavailable");
                    self.notice(locale, CoreError::from(e).user_message())
                }
            }],
            Command::Prices => vec![match self.reports.prices_block(locale).await {
                Ok(block) => OutboundMessage::html(block),
                Err(e) => {
                    tracing::warn!(error = %e, "prices unavailable");
                    self.notice(locale, MessageId::TryLater)
                }
            }],
            Command::TopMarket => vec![self.optional_block(locale, self.reports.top_block(locale).await)],
            Command::Sentiment => {
                vec![self.optional_block(locale, self.reports.sentiment_block(locale).await)]
            }
            Command::News => vec![self.optional_block(locale, self.reports.news_block(locale).await)],
            Command::CreateAlert => {
                let reply = self.dialog.start(from, locale).await;
                vec![OutboundMessage::plain(reply.text)]
            }
            Command::MyAlerts => vec![self.list_alerts(from, locale).await],
        }
    }

    async fn set_locale(&self, from: RecipientId, locale: Locale) -> Vec<OutboundMessage> {
        if let Err(e) = self.recipients.upsert_locale(from, locale).await {
            tracing::warn!(error = %e, %locale, "failed to store locale");
            return vec![self.notice(locale, e.user_message())];
        }
        tracing::info!(%locale, "locale saved");

        let greeting = format!(
            "{}\n\n{}",
            self.localizer.text(locale, MessageId::LanguageSaved),
            self.localizer.text(locale, MessageId::Welcome),
        );
        vec![
            OutboundMessage::html(greeting),
            OutboundMessage::plain(self.localizer.text(locale, MessageId::MainMenuTitle))
                .with_keyboard(self.main_menu(locale)),
        ]
    }

    async fn list_alerts(&self, from: RecipientId, locale: Locale) -> OutboundMessage {
        let alerts = match self.alerts.list_for(from).await {
            Ok(alerts) => alerts,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load alerts");
                return self.notice(locale, e.user_message());
            }
        };
        if alerts.is_empty() {
            return self.notice(locale, MessageId::NoAlerts);
        }

        let fiat = &self.reports.config().fiat;
        let mut text = self.localizer.text(locale, MessageId::AlertsTitle);
        for alert in &alerts {
            text.push_str(&format!(
                "\n• <b>{}</b> → {}",
                escape_html(alert.coin.symbol),
                format_price(fiat, alert.target_price),
            ));
        }
        OutboundMessage::html(text)
    }

    fn optional_block<E: std::fmt::Display>(
        &self,
        locale: Locale,
        block: std::result::Result<String, E>,
    ) -> OutboundMessage {
        match block {
            Ok(block) => OutboundMessage::html(block),
            Err(e) => {
                tracing::warn!(error = %e, "block unavailable");
                self.notice(locale, MessageId::SourceUnavailable)
            }
        }
    }

    fn choose_language(&self, locale: Locale, prompt: MessageId) -> OutboundMessage {
        OutboundMessage::plain(self.localizer.text(locale, prompt)).with_keyboard(self.language_keyboard())
    }

    fn notice(&self, locale: Locale, id: MessageId) -> OutboundMessage {
        OutboundMessage::plain(self.localizer.text(locale, id))
    }

    fn unknown(&self, locale: Locale) -> OutboundMessage {
        OutboundMessage::plain(self.localizer.text(locale, MessageId::UnknownCommand))
            .with_keyboard(self.main_menu(locale))
    }

    /// One button per language, each labelled in its own language
    pub fn language_keyboard(&self) -> Keyboard {
        Keyboard::Inline(vec![
            Locale::ALL
                .iter()
                .map(|locale| Button {
                    label: self.localizer.text(*locale, MessageId::LanguageButton),
                    callback_id: Command::SetLocale(*locale).callback_id(),
                })
                .collect(),
        ])
    }

    /// Persistent menu whose labels map back through [`Command::from_label`]
    pub fn main_menu(&self, locale: Locale) -> Keyboard {
        let labels: Vec<String> = Command::MENU
            .iter()
            .filter_map(Command::label)
            .map(|id| self.localizer.text(locale, id))
            .collect();
        Keyboard::Menu(labels.chunks(MENU_COLUMNS).map(<[String]>::to_vec).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::MemoryAlertStore;
    use crate::dialog::{DraftState, DraftTable};
    use crate::locale::StaticLocalizer;
    use crate::recipient::MemoryRecipientStore;
    use crate::report::ReportConfig;
    use crate::transport::FormatHint;
    use market_feeds::{CoinRef, FetchError, MockMarketData, MockNews, MockSentiment};

    const ALICE: RecipientId = RecipientId::new(100);

    struct Harness {
        router: ChatRouter,
        recipients: Arc<MemoryRecipientStore>,
        dialog: Arc<AlertDialogEngine>,
        localizer: StaticLocalizer,
    }

    fn harness_with(market: MockMarketData, sentiment: MockSentiment) -> Harness {
        let localizer = Arc::new(StaticLocalizer::new());
        let recipients = Arc::new(MemoryRecipientStore::new(Locale::Es));
        let alerts = Arc::new(MemoryAlertStore::new());
        let dialog = Arc::new(AlertDialogEngine::new(
            Arc::new(DraftTable::new()),
            alerts.clone(),
            localizer.clone(),
        ));
        let reports = Arc::new(ReportAggregator::new(
            Arc::new(market),
            Arc::new(sentiment),
            Arc::new(MockNews::new()),
            localizer.clone(),
            ReportConfig::default(),
        ));
        let router = ChatRouter::new(recipients.clone(), alerts, dialog.clone(), reports, localizer);

        Harness { router, recipients, dialog, localizer: StaticLocalizer::new() }
    }

    fn harness() -> Harness {
        harness_with(MockMarketData::new(), MockSentiment::new(30))
    }

    fn text(body: &str) -> InboundEvent {
        InboundEvent::Text { from: ALICE, text: body.into() }
    }

    fn button(id: &str) -> InboundEvent {
        InboundEvent::Button { from: ALICE, callback_id: id.into() }
    }

    impl Harness {
        async fn say(&self, event: InboundEvent) -> Vec<OutboundMessage> {
            self.router.handle(&event).await
        }

        fn t(&self, locale: Locale, id: MessageId) -> String {
            self.localizer.text(locale, id)
        }
    }

    #[tokio::test]
    async fn test_start_offers_languages_and_registers_recipient() {
        let h = harness();
        let replies = h.say(text("/start")).await;

        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].text, h.t(Locale::Es, MessageId::ChooseLanguage));
        let Some(Keyboard::Inline(rows)) = &replies[0].keyboard else {
            panic!("expected language buttons");
        };
        let ids: Vec<_> = rows[0].iter().map(|b| b.callback_id.as_str()).collect();
        assert_eq!(ids, vec!["lang_es", "lang_en"]);
        assert_eq!(h.recipients.len().await, 1);
    }

    #[tokio::test]
    async fn test_language_choice_is_stored_and_menu_shown() {
        let h = harness();
        let replies = h.say(button("lang_en")).await;

        assert_eq!(h.recipients.get_locale(ALICE).await.unwrap(), Locale::En);
        assert_eq!(replies.len(), 2);
        assert!(replies[0].text.starts_with(&h.t(Locale::En, MessageId::LanguageSaved)));
        assert_eq!(replies[0].format, FormatHint::Html);

        let Some(Keyboard::Menu(rows)) = &replies[1].keyboard else {
            panic!("expected main menu");
        };
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0][0], h.t(Locale::En, MessageId::BtnOverview));
    }

    #[tokio::test]
    async fn test_unknown_text_outside_dialog() {
        let h = harness();
        let replies = h.say(text("hello?")).await;
        assert_eq!(replies[0].text, h.t(Locale::Es, MessageId::UnknownCommand));
    }

    #[tokio::test]
    async fn test_alert_dialog_through_menu_labels() {
        let h = harness();
        h.say(button("lang_en")).await;

        let ask = h.say(text(&h.t(Locale::En, MessageId::BtnCreateAlert))).await;
        assert!(ask[0].text.contains("BTC, ETH"));

        // mid-dialog gibberish is a re-prompt, not an unknown command
        let reprompt = h.say(text("xyz")).await;
        assert!(reprompt[0].text.starts_with("❌"));
        assert_ne!(reprompt[0].text, h.t(Locale::En, MessageId::UnknownCommand));

        h.say(text("btc")).await;
        let saved = h.say(text("41000,50")).await;
        assert_eq!(saved[0].text, "✅ Alert saved: BTC at €41000.50.");
        assert!(h.dialog.state(ALICE).await.is_none());

        let listed = h.say(text("/alerts")).await;
        assert!(listed[0].text.contains("<b>BTC</b> → €41000.50"), "{}", listed[0].text);
    }

    #[tokio::test]
    async fn test_restart_discards_draft() {
        let h = harness();
        h.say(text("/alert")).await;
        h.say(text("ETH")).await;
        assert_eq!(h.dialog.state(ALICE).await, Some(DraftState::AwaitingPrice { coin: CoinRef::ETHEREUM }));

        h.say(text("/start")).await;
        assert!(h.dialog.state(ALICE).await.is_none());

        h.say(text("/alert")).await;
        assert_eq!(h.dialog.state(ALICE).await, Some(DraftState::AwaitingCoin));
    }

    #[tokio::test]
    async fn test_cancel() {
        let h = harness();
        let nothing = h.say(text("/cancel")).await;
        assert_eq!(nothing[0].text, h.t(Locale::Es, MessageId::NothingToCancel));

        h.say(text("/alert")).await;
        let cancelled = h.say(text("/cancel")).await;
        assert_eq!(cancelled[0].text, h.t(Locale::Es, MessageId::AlertCancelled));
        assert!(h.dialog.state(ALICE).await.is_none());
    }

    #[tokio::test]
    async fn test_button_runs_command_and_keeps_draft() {
        let h = harness();
        h.say(text("/alert")).await;

        let replies = h.say(button("cmd_sentiment")).await;
        assert!(replies[0].text.contains("30/100"));
        assert_eq!(h.dialog.state(ALICE).await, Some(DraftState::AwaitingCoin));
    }

    #[tokio::test]
    async fn test_overview_and_failures() {
        let h = harness();
        let overview = h.say(text("/today")).await;
        assert_eq!(overview[0].format, FormatHint::Html);
        assert!(overview[0].text.contains("Resumen cripto"));

        let broken = harness_with(
            MockMarketData::failing(FetchError::Timeout),
            MockSentiment::failing(FetchError::Http(500)),
        );
        let overview = broken.say(text("/today")).await;
        assert_eq!(overview[0].text, broken.t(Locale::Es, MessageId::TryLater));

        let sentiment = broken.say(button("cmd_sentiment")).await;
        assert_eq!(sentiment[0].text, broken.t(Locale::Es, MessageId::SourceUnavailable));
    }

    #[tokio::test]
    async fn test_empty_alert_list() {
        let h = harness();
        let replies = h.say(button("cmd_alerts")).await;
        assert_eq!(replies[0].text, h.t(Locale::Es, MessageId::NoAlerts));
    }
}
