//! Alert Dialog Engine
//!
//! Per-recipient state machine that turns free-text messages into an
//! [`AlertRecord`]:
//!
//! ```text
//!  NoDialog ──create-alert──▶ AwaitingCoin ──known coin──▶ AwaitingPrice ──positive number──▶ saved
//!                              │     ▲                       │     ▲
//!                              └─────┘ re-prompt             └─────┘ re-prompt
//!  any state ──restart / cancel──▶ NoDialog
//! ```
//!
//! Drafts live only in the injected [`DraftTable`]; at most one per
//! recipient. While an accepted price is being written the draft sits in
//! [`DraftState::Saving`] and the table lock is released, so a slow store
//! only delays its own recipient.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use market_feeds::{CoinRef, Fiat};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::alert::{parse_coin, parse_target_price, supported_symbols, AlertRecord, AlertStore};
use crate::error::DialogInputError;
use crate::locale::{Locale, Localizer, MessageId};
use crate::recipient::RecipientId;
use crate::report::format_price;

/// Step of an open dialog
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DraftState {
    AwaitingCoin,
    AwaitingPrice { coin: CoinRef },
    /// Price accepted, record being stored
    Saving { coin: CoinRef },
}

/// In-progress alert definition
#[derive(Clone, Debug)]
pub struct AlertDraft {
    pub state: DraftState,
    pub started_at: DateTime<Utc>,
}

/// Keyed store of open drafts.
///
/// A single lock serialises every read-transition-write, so a user sending
/// two messages at once cannot lose an update. Only the store write runs
/// outside it, guarded by the `Saving` claim.
#[derive(Default)]
pub struct DraftTable {
    drafts: Mutex<HashMap<RecipientId, AlertDraft>>,
}

impl DraftTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn state(&self, recipient: RecipientId) -> Option<DraftState> {
        self.drafts.lock().await.get(&recipient).map(|d| d.state.clone())
    }

    pub async fn len(&self) -> usize {
        self.drafts.lock().await.len()
    }
}

/// What the dialog did with an input
#[derive(Clone, Debug, PartialEq)]
pub enum DialogEvent {
    Started,
    CoinAccepted(CoinRef),
    Rejected(DialogInputError),
    Completed(AlertRecord),
    /// Price was valid but the record could not be stored; state unchanged
    StorageFailed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DialogReply {
    pub text: String,
    pub event: DialogEvent,
}

/// Result of offering a message to the engine
#[derive(Clone, Debug, PartialEq)]
pub enum DialogOutcome {
    /// The recipient is mid-dialog; reply with this
    Consumed(DialogReply),
    /// No open dialog; route the message as an ordinary command
    NotInDialog,
}

pub struct AlertDialogEngine {
    drafts: Arc<DraftTable>,
    alerts: Arc<dyn AlertStore>,
    localizer: Arc<dyn Localizer>,
    fiat: Fiat,
}

impl AlertDialogEngine {
    pub fn new(
        drafts: Arc<DraftTable>,
        alerts: Arc<dyn AlertStore>,
        localizer: Arc<dyn Localizer>,
    ) -> Self {
        Self { drafts, alerts, localizer, fiat: Fiat::default() }
    }

    /// Currency used when confirming a saved target price
    pub fn with_fiat(mut self, fiat: Fiat) -> Self {
        self.fiat = fiat;
        self
    }

    /// Open a dialog, silently replacing any draft already in progress
    pub async fn start(&self, recipient: RecipientId, locale: Locale) -> DialogReply {
        let draft = AlertDraft {
            state: DraftState::AwaitingCoin,
            started_at: Utc::now(),
        };
        if self.drafts.drafts.lock().await.insert(recipient, draft).is_some() {
            tracing::debug!(recipient = %recipient, "replaced open alert draft");
        }

        DialogReply {
            text: self.ask_coin(locale, MessageId::AlertAskCoin),
            event: DialogEvent::Started,
        }
    }

    /// Offer a free-text message to the recipient's open dialog, if any
    pub async fn handle(&self, recipient: RecipientId, locale: Locale, text: &str) -> DialogOutcome {
        let mut drafts = self.drafts.drafts.lock().await;
        let Some(draft) = drafts.get_mut(&recipient) else {
            return DialogOutcome::NotInDialog;
        };

        let reply = match draft.state.clone() {
            DraftState::AwaitingCoin => match parse_coin(text) {
                Ok(coin) => {
                    draft.state = DraftState::AwaitingPrice { coin };
                    DialogReply {
                        text: self.localizer.resolve(
                            locale,
                            MessageId::AlertAskPrice,
                            &[("coin", coin.symbol)],
                        ),
                        event: DialogEvent::CoinAccepted(coin),
                    }
                }
                Err(err) => DialogReply {
                    text: self.ask_coin(locale, MessageId::AlertUnknownCoin),
                    event: DialogEvent::Rejected(err),
                },
            },

            DraftState::AwaitingPrice { coin } => match parse_target_price(text) {
                Ok(price) => {
                    draft.state = DraftState::Saving { coin };
                    drop(drafts);
                    return DialogOutcome::Consumed(self.save(recipient, locale, coin, price).await);
                }
                Err(err) => DialogReply {
                    text: self.localizer.text(locale, MessageId::AlertInvalidPrice),
                    event: DialogEvent::Rejected(err),
                },
            },

            // the same price sent twice; the first copy owns the draft
            DraftState::Saving { .. } => return DialogOutcome::NotInDialog,
        };

        DialogOutcome::Consumed(reply)
    }

    /// Store the record for a draft already claimed as `Saving`. The claim
    /// is settled afterwards only if no restart replaced it meanwhile.
    async fn save(
        &self,
        recipient: RecipientId,
        locale: Locale,
        coin: CoinRef,
        price: Decimal,
    ) -> DialogReply {
        let record = AlertRecord::new(recipient, coin, price);
        let saved = self.alerts.save(&record).await;

        let mut drafts = self.drafts.drafts.lock().await;
        let claim = drafts
            .get_mut(&recipient)
            .filter(|draft| draft.state == DraftState::Saving { coin });

        match saved {
            Ok(()) => {
                if claim.is_some() {
                    drafts.remove(&recipient);
                }
                drop(drafts);
                tracing::info!(recipient = %recipient, coin = coin.symbol, target = %price, "alert saved");

                let price_text = format_price(&self.fiat, price);
                DialogReply {
                    text: self.localizer.resolve(
                        locale,
                        MessageId::AlertSaved,
                        &[("coin", coin.symbol), ("price", price_text.as_str())],
                    ),
                    event: DialogEvent::Completed(record),
                }
            }
            Err(err) => {
                if let Some(draft) = claim {
                    draft.state = DraftState::AwaitingPrice { coin };
                }
                drop(drafts);
                tracing::warn!(recipient = %recipient, error = %err, "failed to store alert");

                DialogReply {
                    text: self.localizer.text(locale, err.user_message()),
                    event: DialogEvent::StorageFailed,
                }
            }
        }
    }

    /// Drop the draft, returning whether one existed
    pub async fn cancel(&self, recipient: RecipientId) -> bool {
        self.drafts.drafts.lock().await.remove(&recipient).is_some()
    }

    /// Restart command: forget any draft without replying
    pub async fn reset(&self, recipient: RecipientId) {
        if self.cancel(recipient).await {
            tracing::debug!(recipient = %recipient, "alert draft discarded on restart");
        }
    }

    pub async fn state(&self, recipient: RecipientId) -> Option<DraftState> {
        self.drafts.state(recipient).await
    }

    fn ask_coin(&self, locale: Locale, id: MessageId) -> String {
        let coins = supported_symbols();
        self.localizer.resolve(locale, id, &[("coins", coins.as_str())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::MemoryAlertStore;
    use crate::error::{CoreError, Result};
    use crate::locale::StaticLocalizer;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    struct BrokenAlertStore;

    #[async_trait]
    impl AlertStore for BrokenAlertStore {
        async fn save(&self, _alert: &AlertRecord) -> Result<()> {
            Err(CoreError::Storage("disk full".into()))
        }

        async fn list_for(&self, _recipient: RecipientId) -> Result<Vec<AlertRecord>> {
            Ok(Vec::new())
        }
    }

    /// Holds every save until a permit is added
    struct GatedAlertStore {
        inner: MemoryAlertStore,
        gate: tokio::sync::Semaphore,
    }

    #[async_trait]
    impl AlertStore for GatedAlertStore {
        async fn save(&self, alert: &AlertRecord) -> Result<()> {
            self.gate.acquire().await.unwrap().forget();
            self.inner.save(alert).await
        }

        async fn list_for(&self, recipient: RecipientId) -> Result<Vec<AlertRecord>> {
            self.inner.list_for(recipient).await
        }
    }

    fn engine_with(alerts: Arc<dyn AlertStore>) -> AlertDialogEngine {
        AlertDialogEngine::new(Arc::new(DraftTable::new()), alerts, Arc::new(StaticLocalizer))
    }

    fn event(outcome: DialogOutcome) -> DialogEvent {
        match outcome {
            DialogOutcome::Consumed(reply) => reply.event,
            DialogOutcome::NotInDialog => panic!("expected the dialog to consume the input"),
        }
    }

    #[tokio::test]
    async fn test_full_dialog_with_reprompts() {
        let alerts = Arc::new(MemoryAlertStore::new());
        let engine = engine_with(alerts.clone());
        let id = RecipientId::new(1);
        let en = Locale::En;

        assert_eq!(engine.start(id, en).await.event, DialogEvent::Started);

        let mut reprompts = 0;
        for input in ["xyz", "BTC", "not-a-number"] {
            if let DialogEvent::Rejected(_) = event(engine.handle(id, en, input).await) {
                reprompts += 1;
            }
        }
        assert_eq!(reprompts, 2);

        match event(engine.handle(id, en, "41000,50").await) {
            DialogEvent::Completed(record) => {
                assert_eq!(record.coin.symbol, "BTC");
                assert_eq!(record.target_price, dec!(41000.50));
            }
            other => panic!("expected completion, got {other:?}"),
        }

        assert_eq!(engine.state(id).await, None);
        assert_eq!(alerts.list_for(id).await.unwrap().len(), 1);
        assert_eq!(engine.handle(id, en, "BTC").await, DialogOutcome::NotInDialog);
    }

    #[tokio::test]
    async fn test_no_dialog_falls_through() {
        let engine = engine_with(Arc::new(MemoryAlertStore::new()));
        let outcome = engine.handle(RecipientId::new(9), Locale::Es, "hola").await;
        assert_eq!(outcome, DialogOutcome::NotInDialog);
    }

    #[tokio::test]
    async fn test_coin_match_is_case_insensitive() {
        let engine = engine_with(Arc::new(MemoryAlertStore::new()));
        let id = RecipientId::new(2);
        engine.start(id, Locale::Es).await;

        let outcome = engine.handle(id, Locale::Es, "eth").await;
        assert_eq!(event(outcome), DialogEvent::CoinAccepted(CoinRef::ETHEREUM));
        assert_eq!(
            engine.state(id).await,
            Some(DraftState::AwaitingPrice { coin: CoinRef::ETHEREUM })
        );
    }

    #[tokio::test]
    async fn test_restart_discards_draft() {
        let engine = engine_with(Arc::new(MemoryAlertStore::new()));
        let id = RecipientId::new(3);

        engine.start(id, Locale::En).await;
        engine.handle(id, Locale::En, "BTC").await;
        engine.reset(id).await;
        assert_eq!(engine.state(id).await, None);

        engine.start(id, Locale::En).await;
        assert_eq!(engine.state(id).await, Some(DraftState::AwaitingCoin));
        // a bare number is not a coin: no memory of the discarded choice
        let outcome = engine.handle(id, Locale::En, "41000").await;
        assert!(matches!(
            event(outcome),
            DialogEvent::Rejected(DialogInputError::UnknownCoin(_))
        ));
    }

    #[tokio::test]
    async fn test_start_overwrites_existing_draft() {
        let engine = engine_with(Arc::new(MemoryAlertStore::new()));
        let id = RecipientId::new(4);

        engine.start(id, Locale::En).await;
        engine.handle(id, Locale::En, "SOL").await;
        engine.start(id, Locale::En).await;

        assert_eq!(engine.state(id).await, Some(DraftState::AwaitingCoin));
        assert_eq!(engine.drafts.len().await, 1);
    }

    #[tokio::test]
    async fn test_cancel() {
        let engine = engine_with(Arc::new(MemoryAlertStore::new()));
        let id = RecipientId::new(5);

        assert!(!engine.cancel(id).await);
        engine.start(id, Locale::Es).await;
        assert!(engine.cancel(id).await);
        assert_eq!(engine.state(id).await, None);
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_awaiting_price() {
        let engine = engine_with(Arc::new(BrokenAlertStore));
        let id = RecipientId::new(6);

        engine.start(id, Locale::En).await;
        engine.handle(id, Locale::En, "BTC").await;

        let outcome = engine.handle(id, Locale::En, "100").await;
        assert_eq!(event(outcome), DialogEvent::StorageFailed);
        assert_eq!(
            engine.state(id).await,
            Some(DraftState::AwaitingPrice { coin: CoinRef::BITCOIN })
        );
    }

    #[tokio::test]
    async fn test_dialogs_are_per_recipient() {
        let engine = engine_with(Arc::new(MemoryAlertStore::new()));
        let (a, b) = (RecipientId::new(10), RecipientId::new(11));

        engine.start(a, Locale::En).await;
        engine.handle(a, Locale::En, "BTC").await;
        engine.start(b, Locale::En).await;

        assert_eq!(engine.state(a).await, Some(DraftState::AwaitingPrice { coin: CoinRef::BITCOIN }));
        assert_eq!(engine.state(b).await, Some(DraftState::AwaitingCoin));
    }

    #[tokio::test]
    async fn test_confirmation_uses_fiat_price_format() {
        let engine = engine_with(Arc::new(MemoryAlertStore::new())).with_fiat(Fiat::new("usd"));
        let id = RecipientId::new(12);

        engine.start(id, Locale::En).await;
        engine.handle(id, Locale::En, "BTC").await;
        let DialogOutcome::Consumed(reply) = engine.handle(id, Locale::En, "41000,5").await else {
            panic!("expected the dialog to consume the price");
        };
        assert_eq!(reply.text, "✅ Alert saved: BTC at $41000.50.");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_double_sent_price_saves_once() {
        let alerts = Arc::new(MemoryAlertStore::new());
        let engine = Arc::new(engine_with(alerts.clone()));
        let id = RecipientId::new(13);

        engine.start(id, Locale::En).await;
        engine.handle(id, Locale::En, "BTC").await;

        let sends: Vec<_> = (0..2)
            .map(|_| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.handle(id, Locale::En, "100").await })
            })
            .collect();

        let (mut completed, mut fell_through) = (0, 0);
        for send in sends {
            match send.await.unwrap() {
                DialogOutcome::Consumed(DialogReply { event: DialogEvent::Completed(_), .. }) => completed += 1,
                DialogOutcome::NotInDialog => fell_through += 1,
                other => panic!("unexpected outcome {other:?}"),
            }
        }

        assert_eq!((completed, fell_through), (1, 1));
        assert_eq!(alerts.list_for(id).await.unwrap().len(), 1);
        assert_eq!(engine.state(id).await, None);
    }

    #[tokio::test]
    async fn test_slow_save_does_not_block_other_recipients() {
        let alerts = Arc::new(GatedAlertStore {
            inner: MemoryAlertStore::new(),
            gate: tokio::sync::Semaphore::new(0),
        });
        let engine = Arc::new(engine_with(alerts.clone()));
        let (slow, other) = (RecipientId::new(14), RecipientId::new(15));

        engine.start(slow, Locale::En).await;
        engine.handle(slow, Locale::En, "BTC").await;
        let pending = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.handle(slow, Locale::En, "100").await }
        });
        while engine.state(slow).await != Some(DraftState::Saving { coin: CoinRef::BITCOIN }) {
            tokio::task::yield_now().await;
        }

        engine.start(other, Locale::En).await;
        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            engine.handle(other, Locale::En, "ETH"),
        )
        .await
        .expect("draft table stayed locked during a save");
        assert_eq!(event(outcome), DialogEvent::CoinAccepted(CoinRef::ETHEREUM));

        alerts.gate.add_permits(1);
        assert!(matches!(event(pending.await.unwrap()), DialogEvent::Completed(_)));
        assert_eq!(engine.state(slow).await, None);
        assert_eq!(alerts.list_for(slow).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_restart_during_save_keeps_new_draft() {
        let alerts = Arc::new(GatedAlertStore {
            inner: MemoryAlertStore::new(),
            gate: tokio::sync::Semaphore::new(0),
        });
        let engine = Arc::new(engine_with(alerts.clone()));
        let id = RecipientId::new(16);

        engine.start(id, Locale::En).await;
        engine.handle(id, Locale::En, "ETH").await;
        let pending = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.handle(id, Locale::En, "150").await }
        });
        while engine.state(id).await != Some(DraftState::Saving { coin: CoinRef::ETHEREUM }) {
            tokio::task::yield_now().await;
        }

        engine.start(id, Locale::En).await;
        alerts.gate.add_permits(1);
        pending.await.unwrap();

        assert_eq!(engine.state(id).await, Some(DraftState::AwaitingCoin));
    }
}
