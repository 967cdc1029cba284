//! Decision execution.
//!
//! - [`DecisionDispatcher`]: maps a decision to exchange calls
//! - [`StopLossReconciler`]: amends the stop-loss of resting protective orders
//! - [`SymbolWorkers`]: serializes dispatch per instrument
//! - [`TradingCycle`] / [`CycleWorkers`]: poll candles, decide and dispatch per instrument

mod cycle;
mod dispatcher;
mod reconciler;
mod scheduler;

pub use cycle::{CycleReport, CycleSettings, CycleWorkers, TradingCycle};
pub use dispatcher::{plan_decision, DecisionDispatcher, DispatchOutcome, ExecutionPlan, SkipReason};
pub use reconciler::{StopLossReconciler, StopLossUpdate};
pub use scheduler::{SymbolWorkers, WorkerReport};
