//! Assembles the raw macro `Panel` the rest of the workspace consumes from
//! a `DataSource` (spec §6). This is the one place that knows the full set
//! of named series every downstream crate's `inputs` module looks for —
//! every other crate only ever sees the `Panel` this module hands it, never
//! the `DataSource` itself (spec §9: "the core has no I/O of its own").

use macro_core::{series, DataSource, Panel, Series};

/// Series known to arrive in bps but occasionally mis-scaled at the source
/// (spec §7 `DataQualityWarning`: CDS/EMBI spreads landing fractional or
/// already-bps with no unit tag attached). Checked once per run in `build`.
const BPS_SCALE_CHECKED: &[&str] = &[
    instrument_returns::inputs::EMBI,
    feature_engine::inputs::CDS,
    feature_engine::inputs::CDS_BPS,
];

/// Ibovespa benchmark prices (spec §6, "Benchmark: Ibovespa prices
/// (optional)"); consumed only by this crate's equity-curve bookkeeping,
/// so it lives here rather than in any modelling crate's `inputs` module.
pub const IBOVESPA: &str = "ibovespa";

/// The raw series names every downstream crate's `inputs` module declares,
/// gathered in one place so a `DataSource` implementation has a single
/// list to satisfy. Positioning series named in spec §6 (Focus FX, CFTC,
/// IDP flow, portfolio flow) are omitted: nothing in this workspace's
/// feature map (`production_engine::feature_map`) consumes them, the same
/// graceful-degradation call that module already documents.
const RAW_SERIES: &[&str] = &[
    // instrument-returns
    instrument_returns::inputs::SPOT_USDBRL,
    instrument_returns::inputs::SWAP_DI_DOLAR_30D,
    instrument_returns::inputs::CUPOM_CAMBIAL,
    instrument_returns::inputs::DI_3M,
    instrument_returns::inputs::UST_2Y,
    instrument_returns::inputs::DI_1Y,
    instrument_returns::inputs::DI_2Y,
    instrument_returns::inputs::DI_5Y,
    instrument_returns::inputs::DI_10Y,
    instrument_returns::inputs::CDI,
    instrument_returns::inputs::EMBI,
    instrument_returns::inputs::NTNB_5Y_REAL_YIELD,
    // feature-engine
    feature_engine::inputs::VIX,
    feature_engine::inputs::DXY,
    feature_engine::inputs::CDS,
    feature_engine::inputs::HY_OAS,
    feature_engine::inputs::BCOM,
    feature_engine::inputs::EWZ,
    feature_engine::inputs::SPOT_USDBRL,
    feature_engine::inputs::REER,
    feature_engine::inputs::PPP_FACTOR,
    feature_engine::inputs::GDP_PC_US,
    feature_engine::inputs::GDP_PC_BR,
    feature_engine::inputs::CA_PCT_GDP,
    feature_engine::inputs::TRADE_OPENNESS,
    feature_engine::inputs::TOT,
    feature_engine::inputs::CA_12M,
    feature_engine::inputs::IBC,
    feature_engine::inputs::Z_REAL_DIFF_INPUT,
    feature_engine::inputs::DI_1Y,
    feature_engine::inputs::DI_3M,
    feature_engine::inputs::DI_5Y,
    feature_engine::inputs::DI_10Y,
    feature_engine::inputs::CDI,
    feature_engine::inputs::UST_10Y,
    feature_engine::inputs::US_TIPS_5Y,
    feature_engine::inputs::US_BREAKEVEN_10Y,
    feature_engine::inputs::US_CPI_EXPECTATIONS,
    feature_engine::inputs::CDS_BPS,
    feature_engine::inputs::DEBT_GDP,
    feature_engine::inputs::PRIMARY_BALANCE,
    // equilibrium-rate
    equilibrium_rate::inputs::IPCA_EXPECTATIONS,
    equilibrium_rate::inputs::US_TIPS_10Y,
    equilibrium_rate::inputs::DI_3Y,
    // regime-model
    regime_model::global::UST_10Y,
    // benchmark
    IBOVESPA,
];

/// Builds the raw panel from every name in `RAW_SERIES`, plus the IBC-BR
/// level series inserted a second time under
/// `equilibrium_rate::inputs::OUTPUT_GAP`: the state-space model (spec
/// §4.5 Model 4) detrends that column internally to derive the output
/// gap, so it expects the *level*, not a pre-computed gap — and the
/// `DataSource` contract only names one IBC-BR series (spec §6). Missing
/// names are skipped; nothing here is mandatory (spec §7 `DataUnavailable`:
/// skip the computation, not the run).
pub fn build(source: &dyn DataSource) -> Panel {
    let mut panel = Panel::new();
    for &name in RAW_SERIES {
        if let Some(raw_series) = source.get(name) {
            let series = if BPS_SCALE_CHECKED.contains(&name) {
                let (normalised, warning) = series::normalise_bps_scale(&raw_series);
                if let Some(warning) = warning {
                    tracing::warn!(name, %warning, "data quality warning");
                }
                normalised
            } else {
                raw_series
            };
            panel.insert(series);
        } else {
            tracing::debug!(name, "raw series unavailable from data source");
        }
    }
    if let Some(ibc) = source.get(feature_engine::inputs::IBC) {
        panel.insert(Series::from_pairs(
            equilibrium_rate::inputs::OUTPUT_GAP,
            ibc.unit(),
            ibc.iter().collect(),
        ));
    }
    panel
}
