//! # planner-runtime
//!
//! Concrete adapters behind the `planner-core` seams.
//!
//! ## Adapters
//!
//! - **SQLite** (`SqliteStore`): recipients and alerts, via `sqlx`
//! - **Telegram** (`TelegramClient`): Bot API transport
//! - **Long polling** (`UpdatePoller`): inbound `getUpdates` loop feeding the `ChatRouter`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use planner_runtime::{SqliteStore, TelegramClient, TelegramConfig, UpdatePoller};
//!
//! let store = Arc::new(SqliteStore::connect("sqlite://crypto_planner.db", Locale::Es).await?);
//! let telegram = Arc::new(TelegramClient::new(TelegramConfig::new(token))?);
//! tokio::spawn(UpdatePoller::new(telegram.clone(), router).run());
//! ```

pub mod poller;
pub mod sqlite;
pub mod telegram;

pub use poller::UpdatePoller;
pub use sqlite::SqliteStore;
pub use telegram::{TelegramClient, TelegramConfig, Update};
