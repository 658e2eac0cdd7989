//! Daily Broadcast
//!
//! Fans the report out to every known recipient once a day. Each
//! recipient is an independent task: its report is built for its own
//! locale and a failure is logged and counted, never propagated to the
//! rest of the run. At most `concurrency` recipients are in flight; the
//! next one starts only when a running task is joined.

use std::sync::Arc;

use chrono::{DateTime, Days, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinSet};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::recipient::{Recipient, RecipientStore};
use crate::report::ReportAggregator;
use crate::transport::Transport;

/// Largest DST jump we step over when the configured time falls in a gap
const MAX_GAP_MINUTES: i64 = 180;

/// Fixed wall-clock time in a fixed zone
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DailySchedule {
    pub at: NaiveTime,
    pub tz: Tz,
}

impl DailySchedule {
    pub fn new(at: NaiveTime, tz: Tz) -> Self {
        Self { at, tz }
    }

    /// Parse `HH:MM` and an IANA zone name
    pub fn parse(at: &str, tz: &str) -> Result<Self> {
        let at = NaiveTime::parse_from_str(at.trim(), "%H:%M")
            .map_err(|e| CoreError::Config(format!("invalid broadcast time {at:?}: {e}")))?;
        let tz = tz
            .trim()
            .parse::<Tz>()
            .map_err(|e| CoreError::Config(format!("invalid broadcast timezone {tz:?}: {e}")))?;
        Ok(Self { at, tz })
    }

    /// First firing instant strictly after `now`
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.with_timezone(&self.tz).date_naive();
        (0..=2)
            .filter_map(|offset| today.checked_add_days(Days::new(offset)))
            .filter_map(|date| self.fire_time(date))
            .find(|at| *at > now)
            .unwrap_or_else(|| now + Duration::days(1))
    }

    /// Resolve the wall-clock time on `date`. Repeated hours take the
    /// earlier instant; skipped hours move to the first valid minute.
    fn fire_time(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        let local = date.and_time(self.at);
        let resolved = match self.tz.from_local_datetime(&local) {
            LocalResult::Single(at) => Some(at),
            LocalResult::Ambiguous(earliest, _) => Some(earliest),
            LocalResult::None => (1..=MAX_GAP_MINUTES).find_map(|minutes| {
                self.tz
                    .from_local_datetime(&(local + Duration::minutes(minutes)))
                    .earliest()
            }),
        };
        resolved.map(|at| at.with_timezone(&Utc))
    }
}

/// Outcome of one broadcast run
#[derive(Clone, Debug, Serialize)]
pub struct BroadcastSummary {
    pub run_id: Uuid,
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub struct BroadcastScheduler {
    recipients: Arc<dyn RecipientStore>,
    reports: Arc<ReportAggregator>,
    transport: Arc<dyn Transport>,
    schedule: DailySchedule,
    concurrency: usize,
    /// Serializes runs (daily trigger vs. manual trigger)
    running: Mutex<()>,
}

impl BroadcastScheduler {
    pub fn new(
        recipients: Arc<dyn RecipientStore>,
        reports: Arc<ReportAggregator>,
        transport: Arc<dyn Transport>,
        schedule: DailySchedule,
    ) -> Self {
        Self {
            recipients,
            reports,
            transport,
            schedule,
            concurrency: 4,
            running: Mutex::new(()),
        }
    }

    /// Maximum recipients processed at once (at least 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn schedule(&self) -> &DailySchedule {
        &self.schedule
    }

    /// Run one fan-out over every stored recipient.
    ///
    /// Fails only when the recipient list itself cannot be read; per
    /// recipient failures are reflected in the summary.
    pub async fn broadcast(&self) -> Result<BroadcastSummary> {
        let _running = self.running.lock().await;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let recipients = self.recipients.list_all().await?;
        let attempted = recipients.len();
        tracing::info!(%run_id, recipients = attempted, concurrency = self.concurrency, "broadcast started");

        let mut tasks = JoinSet::new();
        let mut tally = Tally::default();

        for recipient in recipients {
            if tasks.len() >= self.concurrency {
                if let Some(joined) = tasks.join_next().await {
                    tally.record(run_id, joined);
                }
            }

            let reports = Arc::clone(&self.reports);
            let transport = Arc::clone(&self.transport);
            tasks.spawn(async move { deliver(&reports, transport.as_ref(), &recipient).await });
        }

        while let Some(joined) = tasks.join_next().await {
            tally.record(run_id, joined);
        }
        let Tally { delivered, failed } = tally;

        let summary = BroadcastSummary {
            run_id,
            attempted,
            delivered,
            failed,
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(%run_id, delivered, failed, "broadcast finished");
        Ok(summary)
    }

    /// Sleep until each scheduled instant and broadcast, forever
    pub async fn run_daily(self: Arc<Self>) {
        loop {
            let now = Utc::now();
            let next = self.schedule.next_after(now);
            let wait = (next - now).to_std().unwrap_or_default();
            tracing::info!(next = %next, "next broadcast scheduled");

            tokio::time::sleep(wait).await;

            if let Err(e) = self.broadcast().await {
                tracing::error!(error = %e, "broadcast run failed");
            }
        }
    }
}

#[derive(Default)]
struct Tally {
    delivered: usize,
    failed: usize,
}

impl Tally {
    fn record(&mut self, run_id: Uuid, joined: std::result::Result<Result<()>, JoinError>) {
        match joined {
            Ok(Ok(())) => self.delivered += 1,
            Ok(Err(_)) => self.failed += 1,
            Err(e) => {
                self.failed += 1;
                tracing::error!(%run_id, error = %e, "broadcast task aborted");
            }
        }
    }
}

async fn deliver(
    reports: &ReportAggregator,
    transport: &dyn Transport,
    recipient: &Recipient,
) -> Result<()> {
    let outcome = match reports.build(recipient.locale).await {
        Ok(report) => transport
            .send(recipient.id, &report.to_message())
            .await
            .map_err(CoreError::from),
        Err(e) => Err(CoreError::from(e)),
    };

    match &outcome {
        Ok(()) => tracing::debug!(recipient = %recipient.id, "report delivered"),
        Err(e) => tracing::warn!(
            recipient = %recipient.id,
            locale = %recipient.locale,
            transient = e.is_transient(),
            error = %e,
            "broadcast to recipient failed"
        ),
    }
    outcome
}
