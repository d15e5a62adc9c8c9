//! Broadcast fan-out.
//!
//! One dispatch run sends a broadcast body to each active recipient in
//! order, one at a time, sleeping a fixed delay between recipients. Every
//! attempt leaves exactly one delivery record; the aggregate counts are
//! written once at the end. There is no retry.
//!
//! A run is not idempotent: dispatching the same broadcast twice writes a
//! second set of delivery records and overwrites the counts. Callers guard
//! with [`claim_broadcast`](crate::storage::broadcasts::claim_broadcast).

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::types::{BroadcastStatus, DeliveryStatus};
use crate::gateway::{MessagingGateway, ReplyKeyboard};
use crate::storage::broadcasts::{get_broadcast, record_counts, set_broadcast_status};
use crate::storage::deliveries::{insert_delivery, update_delivery_status};
use crate::storage::recipients::{list_active_recipients, Recipient};
use crate::storage::{get_connection, DbPool};

/// Error text stored when the gateway gives none.
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Counts of one dispatch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub successful: i64,
    pub failed: i64,
}

impl DispatchOutcome {
    pub fn total(&self) -> i64 {
        self.successful + self.failed
    }
}

/// Sends broadcasts through a [`MessagingGateway`] and records outcomes.
///
/// Cheap to clone; clones share the task tracker and the optional
/// serialization lock.
#[derive(Clone)]
pub struct BroadcastDispatcher {
    pool: Arc<DbPool>,
    gateway: Arc<dyn MessagingGateway>,
    delay: Duration,
    serialize: Option<Arc<Mutex<()>>>,
    tracker: TaskTracker,
}

impl BroadcastDispatcher {
    pub fn new(pool: Arc<DbPool>, gateway: Arc<dyn MessagingGateway>) -> Self {
        Self {
            pool,
            gateway,
            delay: config::dispatch::delay(),
            serialize: (*config::dispatch::SERIALIZE).then(|| Arc::new(Mutex::new(()))),
            tracker: TaskTracker::new(),
        }
    }

    /// Overrides the inter-recipient delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// When `true`, at most one run sends at a time.
    pub fn with_serialization(mut self, serialize: bool) -> Self {
        self.serialize = serialize.then(|| Arc::new(Mutex::new(())));
        self
    }

    pub fn gateway(&self) -> &Arc<dyn MessagingGateway> {
        &self.gateway
    }

    /// Runs one dispatch to completion.
    ///
    /// Marks the broadcast `sending`, attempts each active recipient, then
    /// writes the counts and marks it `sent`. A ledger failure aborts the
    /// run: counts so far are written best-effort, the status becomes
    /// `failed` and the error is returned.
    pub async fn dispatch(
        &self,
        broadcast_id: i64,
        message: &str,
        recipients: &[Recipient],
    ) -> AppResult<DispatchOutcome> {
        let _serial = match &self.serialize {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        log::info!(
            "Starting broadcast {} to {} recipient(s)",
            broadcast_id,
            recipients.len()
        );

        let mut outcome = DispatchOutcome::default();
        match self.run(broadcast_id, message, recipients, &mut outcome).await {
            Ok(()) => {
                log::info!(
                    "Broadcast {} finished: {} delivered, {} failed",
                    broadcast_id,
                    outcome.successful,
                    outcome.failed
                );
                Ok(outcome)
            }
            Err(e) => {
                log::error!("Broadcast {} aborted: {}", broadcast_id, e);
                self.mark_failed(broadcast_id, Some(outcome));
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        broadcast_id: i64,
        message: &str,
        recipients: &[Recipient],
        outcome: &mut DispatchOutcome,
    ) -> AppResult<()> {
        set_broadcast_status(&*get_connection(&self.pool)?, broadcast_id, BroadcastStatus::Sending)?;

        let mut attempted = 0usize;
        for recipient in recipients {
            if !recipient.is_active {
                log::debug!("Skipping inactive recipient {}", recipient.telegram_id);
                continue;
            }
            if attempted > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            attempted += 1;

            let sent = self
                .gateway
                .send_text(&recipient.telegram_id, message, &ReplyKeyboard::None)
                .await;

            let (status, error) = match sent {
                Ok(()) => (DeliveryStatus::Sent, None),
                Err(e) => {
                    let text = e.to_string();
                    let text = if text.trim().is_empty() { UNKNOWN_ERROR.to_string() } else { text };
                    log::warn!(
                        "Broadcast {} to {} failed: {}",
                        broadcast_id,
                        recipient.telegram_id,
                        text
                    );
                    (DeliveryStatus::Failed, Some(text))
                }
            };

            let conn = get_connection(&self.pool)?;
            let id = match insert_delivery(&conn, broadcast_id, recipient.id, status, error.as_deref()) {
                Ok(id) => id,
                Err(e) if e.is_foreign_key_violation() => {
                    log::warn!(
                        "Recipient {} was removed during broadcast {}, not counted",
                        recipient.telegram_id,
                        broadcast_id
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };
            if status == DeliveryStatus::Sent {
                update_delivery_status(&conn, id, DeliveryStatus::Delivered, None)?;
                outcome.successful += 1;
            } else {
                outcome.failed += 1;
            }
        }

        let conn = get_connection(&self.pool)?;
        record_counts(&conn, broadcast_id, outcome.successful, outcome.failed)?;
        set_broadcast_status(&conn, broadcast_id, BroadcastStatus::Sent)?;
        Ok(())
    }

    /// Best-effort transition to `failed`, optionally writing partial counts.
    fn mark_failed(&self, broadcast_id: i64, partial: Option<DispatchOutcome>) {
        let result = get_connection(&self.pool).and_then(|conn| {
            if let Some(outcome) = partial {
                record_counts(&conn, broadcast_id, outcome.successful, outcome.failed)?;
            }
            set_broadcast_status(&conn, broadcast_id, BroadcastStatus::Failed)
        });
        if let Err(e) = result {
            log::error!("Could not mark broadcast {} as failed: {}", broadcast_id, e);
        }
    }

    /// Loads the broadcast and the current active recipients, then runs
    /// [`dispatch`](Self::dispatch). A failed load marks the broadcast
    /// `failed`.
    pub async fn dispatch_broadcast(&self, broadcast_id: i64) -> AppResult<DispatchOutcome> {
        let loaded = get_connection(&self.pool).and_then(|conn| {
            let broadcast = get_broadcast(&conn, broadcast_id)?.ok_or(AppError::NotFound("Broadcast"))?;
            let recipients = list_active_recipients(&conn)?;
            Ok((broadcast, recipients))
        });

        match loaded {
            Ok((broadcast, recipients)) => self.dispatch(broadcast.id, &broadcast.message, &recipients).await,
            Err(e) => {
                log::error!("Could not load broadcast {} for dispatch: {}", broadcast_id, e);
                self.mark_failed(broadcast_id, None);
                Err(e)
            }
        }
    }

    /// Fire-and-forget [`dispatch`](Self::dispatch) on a tracked task.
    pub fn spawn(&self, broadcast_id: i64, message: String, recipients: Vec<Recipient>) {
        let this = self.clone();
        self.tracker.spawn(async move {
            // Failures are already logged and recorded on the broadcast.
            let _ = this.dispatch(broadcast_id, &message, &recipients).await;
        });
    }

    /// Fire-and-forget [`dispatch_broadcast`](Self::dispatch_broadcast).
    pub fn spawn_broadcast(&self, broadcast_id: i64) {
        let this = self.clone();
        self.tracker.spawn(async move {
            let _ = this.dispatch_broadcast(broadcast_id).await;
        });
    }

    /// Number of runs still in flight.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Closes the tracker and waits for in-flight runs.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}
