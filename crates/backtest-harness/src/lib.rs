//! Walk-Forward Backtest Harness (spec §4.13): drives the same
//! `ProductionEngine::step` the live-trading wrapper would, one calendar
//! month at a time, over a `DataSource`'s full history, and assembles the
//! single `RunResult` output object (spec §6).

pub mod attribution;
pub mod harness;
pub mod persistence;
pub mod raw_panel;
pub mod run_result;
pub mod stress;
pub mod summary;

pub use harness::{run, HarnessError};
pub use run_result::RunResult;
