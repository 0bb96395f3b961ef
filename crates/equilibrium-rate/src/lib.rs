//! Composite Equilibrium Rate (spec §4.5): five parallel r* estimators and
//! their regime-weighted blend, plus SELIC*.

pub mod composite;
pub mod fiscal_augmented;
pub mod inputs;
pub mod market_implied;
pub mod real_rate_parity;
pub mod regime_switching;
pub mod state_space;

pub use composite::{initial_estimate, recompute_with_regime};
