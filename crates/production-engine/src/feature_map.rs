//! Per-instrument base feature lists (spec §4.8's feature map), restricted
//! to the columns this workspace's feature engine (L4) and this crate's
//! `engineered` module actually compute. The spec's table names several
//! series this implementation does not retrieve from a `DataSource`
//! (CFTC positioning, Focus survey FX, iron ore, BoP/IDP flow) — those
//! names are omitted rather than wired to a placeholder, consistent with
//! spec §7's graceful-degradation policy: a feature that was never built
//! simply isn't in the map, the same as one whose raw input went missing
//! mid-run.

use macro_core::types::Instrument;

const FX: &[&str] = &[
    "z_dxy",
    "z_vix",
    "z_cds",
    "z_real_diff",
    "z_hy_oas",
    "z_ewz",
    "z_bcom",
    "fx_fair_value",
    "mu_fx_val",
    "z_beer",
    "fv_feer",
    "fv_cyclical",
    "policy_gap",
    "regime_signal",
];

const FRONT: &[&str] = &[
    "z_fiscal_premium",
    "fiscal_premium",
    "z_pb_momentum",
    "z_debt_accel",
    "term_premium_slope",
    "term_premium_5y",
    "us_irp",
    "carry_front",
    "r_star",
    "selic_star",
    "sovereign_component",
    "policy_gap",
    "regime_signal",
];

const BELLY: &[&str] = &[
    "z_fiscal_premium",
    "fiscal_premium",
    "z_pb_momentum",
    "z_debt_accel",
    "term_premium_slope",
    "term_premium_5y",
    "us_irp",
    "carry_belly",
    "r_star",
    "selic_star",
    "sovereign_component",
    "policy_gap",
    "regime_signal",
];

const LONG: &[&str] = &[
    "z_fiscal_premium",
    "fiscal_premium",
    "z_pb_momentum",
    "z_debt_accel",
    "term_premium_slope",
    "term_premium_5y",
    "us_irp",
    "carry_long",
    "r_star",
    "selic_star",
    "sovereign_component",
    "policy_gap",
    "regime_signal",
];

const HARD: &[&str] = &[
    "z_vix",
    "z_cds",
    "z_embi",
    "z_fiscal_premium",
    "fiscal_premium",
    "z_dxy",
    "z_hy_oas",
    "z_ewz",
    "us_irp",
    "r_star",
    "sovereign_component",
    "regime_signal",
];

const NTNB: &[&str] = &[
    "z_real_diff",
    "z_fiscal_premium",
    "fiscal_premium",
    "us_irp",
    "term_premium_5y",
    "z_dxy",
    "z_vix",
    "z_cds",
    "r_star",
    "sovereign_component",
];

pub fn base_features(instrument: Instrument) -> &'static [&'static str] {
    match instrument {
        Instrument::Fx => FX,
        Instrument::Front => FRONT,
        Instrument::Belly => BELLY,
        Instrument::Long => LONG,
        Instrument::Hard => HARD,
        Instrument::Ntnb => NTNB,
    }
}
