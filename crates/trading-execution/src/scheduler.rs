//! One worker per instrument.
//!
//! Each instrument gets its own task draining a bounded queue, so decisions
//! for one instrument run strictly in order while different instruments run
//! concurrently. A failed or panicking dispatch is logged and counted; the
//! worker keeps going.

use futures::future::join_all;
use futures::FutureExt;
use serde::Serialize;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use trading_core::error::DispatchError;
use trading_core::types::Decision;

use crate::dispatcher::DecisionDispatcher;

/// Per-instrument tally returned when a worker stops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub instrument: String,
    /// Decisions dispatched without error
    pub dispatched: usize,
    /// Decisions whose dispatch returned an error
    pub failed: usize,
}

/// Handles to the running per-instrument workers.
pub struct SymbolWorkers {
    senders: HashMap<String, mpsc::Sender<Decision>>,
    handles: Vec<JoinHandle<WorkerReport>>,
}

impl SymbolWorkers {
    /// Queue depth per instrument.
    pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

    /// Start one worker per distinct instrument.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<I, S>(instruments: I, dispatcher: Arc<DecisionDispatcher>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_capacity(instruments, dispatcher, Self::DEFAULT_QUEUE_CAPACITY)
    }

    /// Start workers with a custom queue depth.
    pub fn with_capacity<I, S>(
        instruments: I,
        dispatcher: Arc<DecisionDispatcher>,
        capacity: usize,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut senders = HashMap::new();
        let mut handles = Vec::new();

        for instrument in instruments {
            let instrument = instrument.into();
            if senders.contains_key(&instrument) {
                continue;
            }

            let (tx, rx) = mpsc::channel(capacity.max(1));
            let worker = run_worker(instrument.clone(), dispatcher.clone(), rx);
            handles.push(tokio::spawn(worker));
            senders.insert(instrument, tx);
        }

        info!(workers = senders.len(), "Symbol workers started");
        Self { senders, handles }
    }

    /// Instruments with a running worker.
    pub fn instruments(&self) -> Vec<&str> {
        let mut instruments: Vec<&str> = self.senders.keys().map(String::as_str).collect();
        instruments.sort_unstable();
        instruments
    }

    /// Queue a decision for its instrument's worker.
    ///
    /// Waits while the instrument's queue is full.
    pub async fn submit(&self, instrument: &str, decision: Decision) -> Result<(), DispatchError> {
        let sender = self
            .senders
            .get(instrument)
            .ok_or_else(|| DispatchError::UnknownInstrument(instrument.to_string()))?;

        sender
            .send(decision)
            .await
            .map_err(|_| DispatchError::WorkerClosed(instrument.to_string()))
    }

    /// Close every queue, wait for the workers to drain them, and collect
    /// their reports sorted by instrument.
    pub async fn shutdown(self) -> Vec<WorkerReport> {
        let Self { senders, handles } = self;
        drop(senders);

        let mut reports = Vec::with_capacity(handles.len());
        for result in join_all(handles).await {
            match result {
                Ok(report) => reports.push(report),
                Err(e) => error!(error = %e, "Symbol worker terminated abnormally"),
            }
        }

        reports.sort_by(|a, b| a.instrument.cmp(&b.instrument));
        info!(workers = reports.len(), "Symbol workers stopped");
        reports
    }
}

async fn run_worker(
    instrument: String,
    dispatcher: Arc<DecisionDispatcher>,
    mut rx: mpsc::Receiver<Decision>,
) -> WorkerReport {
    let mut report = WorkerReport {
        instrument,
        ..Default::default()
    };

    while let Some(decision) = rx.recv().await {
        let dispatch = dispatcher.dispatch(&report.instrument, &decision);
        match AssertUnwindSafe(dispatch).catch_unwind().await {
            Ok(Ok(outcome)) => {
                report.dispatched += 1;
                debug!(instrument = %report.instrument, outcome = ?outcome, "Decision dispatched");
            }
            Ok(Err(e)) => {
                report.failed += 1;
                error!(
                    instrument = %report.instrument,
                    action = %decision.action,
                    error = %e,
                    "Decision dispatch failed"
                );
            }
            Err(panic) => {
                report.failed += 1;
                error!(
                    instrument = %report.instrument,
                    action = %decision.action,
                    panic = panic_message(panic.as_ref()),
                    "Decision dispatch panicked"
                );
            }
        }
    }

    report
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
