//! Background sweep that promotes due scheduled messages to broadcasts.
//!
//! Runs as a `tokio::spawn`ed task. Each tick loads pending messages whose
//! time has come, turns each into a claimed broadcast and dispatches it
//! inside the sweep task, one after another.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::core::config;
use crate::core::error::AppResult;
use crate::dispatch::BroadcastDispatcher;
use crate::storage::scheduled::{due_scheduled, promote_scheduled};
use crate::storage::{get_connection, now, DbPool};

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Scheduled messages turned into broadcasts
    pub promoted: usize,
    /// Promoted broadcasts whose dispatch returned an error
    pub failed: usize,
}

/// Start the sweep background task at the configured interval.
pub fn start_scheduler(db_pool: Arc<DbPool>, dispatcher: BroadcastDispatcher) -> JoinHandle<()> {
    start_scheduler_with_interval(db_pool, dispatcher, config::scheduler::interval())
}

pub fn start_scheduler_with_interval(
    db_pool: Arc<DbPool>,
    dispatcher: BroadcastDispatcher,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!("Scheduled message sweep started (interval: {}s)", every.as_secs());

        loop {
            ticker.tick().await;

            match run_sweep(&db_pool, &dispatcher).await {
                Ok(report) if report.promoted > 0 => {
                    log::info!(
                        "Sweep promoted {} scheduled message(s), {} failed",
                        report.promoted,
                        report.failed
                    );
                }
                Ok(_) => {}
                Err(e) => log::error!("Scheduled message sweep failed: {}", e),
            }
        }
    })
}

/// One sweep over the due pending messages.
///
/// A message is promoted at most once: promotion is a conditional
/// `pending → sent` update, so a message already taken by another sweep is
/// skipped.
pub async fn run_sweep(db_pool: &DbPool, dispatcher: &BroadcastDispatcher) -> AppResult<SweepReport> {
    let due = {
        let conn = get_connection(db_pool)?;
        due_scheduled(&conn, now())?
    };

    let mut report = SweepReport::default();
    for message in due {
        let broadcast = {
            let mut conn = get_connection(db_pool)?;
            promote_scheduled(&mut conn, message.id)?
        };
        let Some(broadcast) = broadcast else {
            log::debug!("Scheduled message {} already handled", message.id);
            continue;
        };

        log::info!(
            "Scheduled message {} promoted to broadcast {}",
            message.id,
            broadcast.id
        );
        report.promoted += 1;
        if let Err(e) = dispatcher.dispatch_broadcast(broadcast.id).await {
            log::error!("Dispatch of scheduled broadcast {} failed: {}", broadcast.id, e);
            report.failed += 1;
        }
    }

    Ok(report)
}
