//! Inbound Long Polling
//!
//! Streams `getUpdates` results and hands each update to the router on its
//! own task, so a slow report for one chat never delays another. Updates
//! from the same chat still run strictly in arrival order, because dialog
//! transitions depend on the order of successive messages.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use planner_core::{ChatRouter, InboundEvent, RecipientId, Transport};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::telegram::{TelegramClient, Update};

/// Finished chats are swept from [`ChatLanes`] once it grows past this
const LANE_SWEEP_AT: usize = 1024;

pub struct UpdatePoller {
    client: Arc<TelegramClient>,
    router: Arc<ChatRouter>,
    retry_delay: Duration,
}

impl UpdatePoller {
    pub fn new(client: Arc<TelegramClient>, router: Arc<ChatRouter>) -> Self {
        Self { client, router, retry_delay: Duration::from_secs(5) }
    }

    /// Pause after a failed `getUpdates` call
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Endless stream of updates. The offset is advanced past every
    /// update received, so each one is yielded exactly once.
    pub fn updates(&self) -> impl Stream<Item = Update> + Send + use<> {
        let retry_delay = self.retry_delay;
        let state = (Arc::clone(&self.client), 0_i64, VecDeque::new());

        futures::stream::unfold(state, move |(client, mut offset, mut pending)| async move {
            loop {
                if let Some(update) = pending.pop_front() {
                    return Some((update, (client, offset, pending)));
                }
                match client.get_updates(offset).await {
                    Ok(batch) => {
                        if let Some(last) = batch.last() {
                            offset = last.update_id + 1;
                        }
                        pending.extend(batch);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "getUpdates failed");
                        tokio::time::sleep(retry_delay).await;
                    }
                }
            }
        })
    }

    /// Poll forever
    pub async fn run(self) {
        tracing::info!("polling for chat updates");
        let transport: Arc<dyn Transport> = self.client.clone();
        let mut lanes = ChatLanes::default();
        let updates = self.updates();
        futures::pin_mut!(updates);

        while let Some(update) = updates.next().await {
            if let Some(query) = &update.callback_query {
                let client = Arc::clone(&self.client);
                let query_id = query.id.clone();
                tokio::spawn(async move {
                    if let Err(e) = client.answer_callback(&query_id).await {
                        tracing::debug!(error = %e, "answerCallbackQuery failed");
                    }
                });
            }

            let Some(event) = update.to_event() else {
                tracing::debug!(update_id = update.update_id, "ignoring unsupported update");
                continue;
            };

            let chat = event.from();
            lanes.spawn(chat, dispatch(Arc::clone(&self.router), Arc::clone(&transport), event));
        }
    }
}

/// Per-chat ordering of spawned work.
///
/// Each chat keeps the completion signal of its latest task; a new task
/// for that chat waits on it before running. Chats never wait on each
/// other.
#[derive(Default)]
struct ChatLanes {
    tails: HashMap<RecipientId, oneshot::Receiver<()>>,
}

impl ChatLanes {
    fn spawn<F>(&mut self, chat: RecipientId, work: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tails.len() >= LANE_SWEEP_AT {
            self.tails.retain(|_, tail| matches!(tail.try_recv(), Err(oneshot::error::TryRecvError::Empty)));
        }

        let previous = self.tails.remove(&chat);
        let (done, tail) = oneshot::channel::<()>();
        self.tails.insert(chat, tail);

        tokio::spawn(async move {
            // the sender is dropped on completion or panic; either releases us
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            work.await;
            drop(done);
        })
    }
}

async fn dispatch(router: Arc<ChatRouter>, transport: Arc<dyn Transport>, event: InboundEvent) {
    let to = event.from();
    for message in router.handle(&event).await {
        if let Err(e) = transport.send(to, &message).await {
            tracing::warn!(recipient = %to, error = %e, "reply not delivered");
            break;
        }
    }
}
