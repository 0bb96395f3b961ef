use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A month-end date. All panels in the core share this calendar.
pub type MonthKey = NaiveDate;

/// The six tradeable instruments in the book (spec §1, §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Instrument {
    /// USD/BRL forward (long USD NDF 1M).
    Fx,
    /// Receiver DI 1Y.
    Front,
    /// Receiver DI 5Y.
    Belly,
    /// Receiver DI 10Y.
    Long,
    /// Hard-currency sovereign spread (EMBI DV01).
    Hard,
    /// NTN-B 5Y real-yield linker.
    Ntnb,
}

impl Instrument {
    pub const ALL: [Instrument; 6] = [
        Instrument::Fx,
        Instrument::Front,
        Instrument::Belly,
        Instrument::Long,
        Instrument::Hard,
        Instrument::Ntnb,
    ];

    /// The four "core" instruments whose absence at a date drops the row
    /// entirely (spec §4.3): fx/front/belly/long.
    pub fn is_core(&self) -> bool {
        matches!(
            self,
            Instrument::Fx | Instrument::Front | Instrument::Belly | Instrument::Long
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Instrument::Fx => "fx",
            Instrument::Front => "front",
            Instrument::Belly => "belly",
            Instrument::Long => "long",
            Instrument::Hard => "hard",
            Instrument::Ntnb => "ntnb",
        }
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unit tag carried by a `Series` (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    PctAnnual,
    Bps,
    Fx,
    Index,
    Ratio,
}

/// The two regime levels tracked by the regime model (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlobalRegime {
    Carry,
    RiskOff,
    Stress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomesticRegime {
    Calm,
    Stress,
}

/// Smoothed state probabilities for both HMM levels at one date (spec §3,
/// `RegimeState`). Each level sums to 1 within 1e-8.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegimeProbabilities {
    pub p_carry: f64,
    pub p_riskoff: f64,
    pub p_stress: f64,
    pub p_domestic_calm: f64,
    pub p_domestic_stress: f64,
    /// Set when the HMM fell back to uniform priors after a fit failure
    /// (spec §4.6, §9 "carried risk").
    pub is_fallback: bool,
}

impl RegimeProbabilities {
    pub fn uniform_fallback() -> Self {
        Self {
            p_carry: 1.0 / 3.0,
            p_riskoff: 1.0 / 3.0,
            p_stress: 1.0 / 3.0,
            p_domestic_calm: 0.5,
            p_domestic_stress: 0.5,
            is_fallback: true,
        }
    }

    pub fn global_dominant(&self) -> GlobalRegime {
        if self.p_stress >= self.p_carry && self.p_stress >= self.p_riskoff {
            GlobalRegime::Stress
        } else if self.p_riskoff >= self.p_carry {
            GlobalRegime::RiskOff
        } else {
            GlobalRegime::Carry
        }
    }

    pub fn domestic_dominant(&self) -> DomesticRegime {
        if self.p_domestic_stress > self.p_domestic_calm {
            DomesticRegime::Stress
        } else {
            DomesticRegime::Calm
        }
    }
}

/// Per-model contribution to the composite equilibrium rate (spec §3, §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquilibriumContribution {
    pub weight: f64,
    pub r_star: f64,
}

/// `EquilibriumEstimate`, spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquilibriumEstimate {
    pub date: MonthKey,
    pub r_star_composite: f64,
    pub selic_star: f64,
    /// Model 1's decomposition: {base, fiscal, sovereign}.
    pub fiscal_decomposition: HashMap<String, f64>,
    pub per_model: HashMap<String, EquilibriumContribution>,
}

/// `AllocationDecision`, spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationDecision {
    pub date: MonthKey,
    pub weights: HashMap<Instrument, f64>,
    pub mu: HashMap<Instrument, f64>,
    pub regime: RegimeProbabilities,
    /// Row-major flattened covariance matrix over `Instrument::ALL` order.
    pub covariance: Vec<f64>,
    pub transaction_cost: f64,
}

/// One row of the backtest's output, spec §3 `RunRecord`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub date: MonthKey,
    pub weights: HashMap<Instrument, f64>,
    pub mu: HashMap<Instrument, f64>,
    pub realised_pnl: HashMap<Instrument, f64>,
    pub overlay_equity: f64,
    pub total_equity: f64,
    pub benchmark_equity: Option<f64>,
    pub overlay_drawdown: f64,
    pub total_drawdown: f64,
    pub regime: RegimeProbabilities,
    pub raw_score: f64,
    pub demeaned_score: f64,
    pub ensemble_weights: HashMap<Instrument, HashMap<String, f64>>,
    pub turnover: f64,
    pub transaction_cost: f64,
    pub rolling_12m_sharpe: Option<f64>,
    pub marginal_contribution: HashMap<Instrument, f64>,
}
