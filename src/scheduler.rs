//! Cron-driven polling loop.
//!
//! Cycles are awaited inline, so at most one run is active at a time. A
//! fire time that passes while a cycle is still running is skipped rather
//! than queued.

use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::error::ConfigError;
use crate::sync::SyncOrchestrator;

/// A validated six-field cron expression (seconds first).
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: cron::Schedule,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self, ConfigError> {
        let schedule =
            cron::Schedule::from_str(expression).map_err(|e| ConfigError::InvalidValue {
                key: "CRON".into(),
                message: format!("invalid cron {expression:?}: {e}"),
            })?;
        Ok(Self {
            expression: expression.to_string(),
            schedule,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}

/// Run sync cycles on `schedule` until `shutdown` resolves.
///
/// Shutdown while idle returns immediately. Shutdown during a cycle lets
/// the message in progress finish (tracker call and marking) and leaves the
/// rest for the next invocation.
pub async fn run_forever<S>(orchestrator: &SyncOrchestrator, schedule: &CronSchedule, shutdown: S)
where
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    info!(cron = schedule.expression(), "Scheduler started");

    loop {
        let now = Utc::now();
        let Some(next) = schedule.next_after(now) else {
            warn!(cron = schedule.expression(), "Schedule has no future fire times; stopping");
            return;
        };
        let delay = (next - now).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = &mut shutdown => {
                info!("Scheduler shutting down");
                return;
            }
        }

        let stop = AtomicBool::new(false);
        let run = orchestrator.run_until(&stop);
        tokio::pin!(run);

        let result = loop {
            tokio::select! {
                result = &mut run => break result,
                _ = &mut shutdown, if !stop.load(Ordering::Relaxed) => {
                    warn!("Shutdown requested during a sync cycle; finishing the current message");
                    stop.store(true, Ordering::Relaxed);
                }
            }
        };

        if let Err(e) = result {
            error!(error = %e, "Sync cycle aborted; retrying at next fire time");
        }
        if stop.load(Ordering::Relaxed) {
            info!("Scheduler shutting down");
            return;
        }
    }
}
