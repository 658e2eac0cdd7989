//! # planner-core
//!
//! The two coupled subsystems behind the crypto planner chat service, plus
//! the seams they are driven through.
//!
//! ## Architecture
//!
//! ```text
//!  inbound event ──▶ ChatRouter ──┬──▶ AlertDialogEngine ──▶ AlertStore
//!                                 │        (DraftTable)
//!                                 └──▶ ReportAggregator ──▶ market-feeds (×4, concurrent)
//!
//!  daily trigger ──▶ BroadcastScheduler ──▶ RecipientStore
//!                         │ (bounded pool)
//!                         └──▶ ReportAggregator ──▶ Transport
//! ```
//!
//! Storage and transport are traits; `planner-runtime` supplies SQLite and
//! Telegram implementations, the in-memory ones here back the tests.

pub mod alert;
pub mod broadcast;
pub mod command;
pub mod dialog;
pub mod error;
pub mod locale;
pub mod recipient;
pub mod report;
pub mod router;
pub mod transport;

pub use alert::{AlertRecord, AlertStore, MemoryAlertStore};
pub use broadcast::{BroadcastScheduler, BroadcastSummary, DailySchedule};
pub use command::Command;
pub use dialog::{AlertDialogEngine, DialogEvent, DialogOutcome, DialogReply, DraftState, DraftTable};
pub use error::{AggregationError, CoreError, DeliveryError, DialogInputError, Result};
pub use locale::{Locale, Localizer, MessageId, StaticLocalizer};
pub use recipient::{MemoryRecipientStore, Recipient, RecipientId, RecipientStore};
pub use report::{Report, ReportAggregator, ReportConfig, SectionKind};
pub use router::ChatRouter;
pub use transport::{Button, FormatHint, InboundEvent, Keyboard, OutboundMessage, RecordingTransport, Transport};
