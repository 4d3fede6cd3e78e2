//! Periodic and on-demand maintenance triggers
//!
//! Both triggers feed the same IO lane. At most one pass is queued or running
//! at a time: a trigger that finds the slot taken is skipped, not queued.

use super::{MaintenanceOutcome, MaintenanceReport};
use crate::core::types::Shared;
use crate::errors::Result;
use crate::executor::{IoHandle, IoOp};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub struct MaintenanceScheduler {
    shared: Arc<Shared>,
    io: IoHandle,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl MaintenanceScheduler {
    pub(crate) fn new(shared: Arc<Shared>, io: IoHandle) -> Self {
        Self {
            shared,
            io,
            timer: Mutex::new(None),
        }
    }

    /// Start the periodic timer; the first tick is one period from now
    pub fn start(&self, period: Duration) {
        let shared = Arc::clone(&self.shared);
        let io = self.io.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                if !enqueue(&shared, &io) {
                    tracing::trace!("maintenance tick skipped, pass already pending");
                }
            }
        });

        if let Some(previous) = self.timer.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Queue a pass without waiting; false if one is already pending
    pub fn trigger(&self) -> bool {
        enqueue(&self.shared, &self.io)
    }

    /// Run a pass and wait for its report
    pub async fn run_now(&self) -> Result<MaintenanceOutcome> {
        if !self.shared.try_begin_maintenance() {
            return Ok(MaintenanceOutcome::Skipped);
        }

        let result: Result<MaintenanceReport> = self
            .io
            .request("run maintenance", |reply| IoOp::Maintain { reply: Some(reply) })
            .await;

        match result {
            Ok(report) => Ok(MaintenanceOutcome::Completed(report)),
            Err(e) => {
                self.shared.end_maintenance();
                Err(e)
            }
        }
    }

    pub fn stop(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for MaintenanceScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn enqueue(shared: &Shared, io: &IoHandle) -> bool {
    if !shared.try_begin_maintenance() {
        return false;
    }
    match io.send(IoOp::Maintain { reply: None }) {
        Ok(()) => true,
        Err(e) => {
            shared.end_maintenance();
            tracing::debug!(error = %e, "maintenance trigger dropped");
            false
        }
    }
}
