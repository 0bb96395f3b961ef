//! macro-risk-run: thin CLI that wires a synthetic in-memory `DataSource`
//! to the walk-forward backtest harness and writes the resulting
//! `RunResult` to disk as JSON.
//!
//! This stands in for the external serving layer (vendor data fetchers, a
//! CSV/Parquet cache, an HTTP API) during development and smoke-testing
//! only — the data it generates is a deterministic synthetic fixture, not
//! real market history.
//!
//! Usage:
//!   cargo run -p macro-risk-run -- --months 180 --output run_result.json
//!   cargo run -p macro-risk-run -- --months 96 --snapshot snapshots.json

use std::path::PathBuf;

use chrono::NaiveDate;
use macro_core::{EngineConfig, InMemoryDataSource, Series, Unit};

const DEFAULT_MONTHS: usize = 180;
const DEFAULT_SNAPSHOT_PATH: &str = "macro_risk_snapshots.json";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "macro_risk_run=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    let months: usize = args
        .iter()
        .position(|a| a == "--months")
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MONTHS);

    let snapshot_path: PathBuf = args
        .iter()
        .position(|a| a == "--snapshot")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_PATH));

    let output_path: Option<PathBuf> = args
        .iter()
        .position(|a| a == "--output")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);

    let cfg = EngineConfig::default().validated()?;

    tracing::info!(months, snapshot = %snapshot_path.display(), "building synthetic data source");
    let source = synthetic_source(months);

    let result = backtest_harness::run(&source, &cfg, &snapshot_path)?;

    tracing::info!(
        months = result.backtest.timeseries.len(),
        overlay_cagr = result.backtest.summary.overlay.cagr,
        overlay_sharpe = result.backtest.summary.overlay.sharpe,
        max_drawdown = result.backtest.summary.overlay.max_drawdown,
        "backtest complete",
    );

    let json = serde_json::to_string_pretty(&result)?;
    match output_path {
        Some(path) => {
            std::fs::write(&path, json)?;
            tracing::info!(path = %path.display(), "run result written");
        }
        None => println!("{json}"),
    }

    Ok(())
}

/// A deterministic synthetic macro history covering every raw series the
/// workspace's crates look for (`backtest_harness::raw_panel::build`'s
/// input list), generated from a simple linear congruential sequence so a
/// run is reproducible across invocations without shipping a data file.
fn synthetic_source(months: usize) -> InMemoryDataSource {
    let mut state = 0x2545F4914F6CDD1Du64;
    let mut noise = || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((state >> 11) as f64 / (1u64 << 53) as f64 - 0.5) * 2.0
    };

    let dates: Vec<NaiveDate> = (0..months)
        .map(|i| NaiveDate::from_ymd_opt(2008 + (i as i32) / 12, (i as u32 % 12) + 1, 1).unwrap())
        .collect();

    let mut series_for = |name: &str, unit: Unit, base: f64, drift: f64, scale: f64| {
        let mut s = Series::new(name, unit);
        for (i, &d) in dates.iter().enumerate() {
            let level = base + drift * i as f64 + scale * noise();
            s.insert(d, level);
        }
        s
    };

    InMemoryDataSource::new()
        .with_series(series_for(instrument_returns::inputs::SPOT_USDBRL, Unit::Fx, 2.0, 0.006, 0.05))
        .with_series(series_for(instrument_returns::inputs::SWAP_DI_DOLAR_30D, Unit::PctAnnual, 5.0, 0.0, 0.2))
        .with_series(series_for(instrument_returns::inputs::CUPOM_CAMBIAL, Unit::PctAnnual, 3.0, 0.0, 0.2))
        .with_series(series_for(instrument_returns::inputs::DI_3M, Unit::PctAnnual, 11.0, 0.0, 0.3))
        .with_series(series_for(instrument_returns::inputs::UST_2Y, Unit::PctAnnual, 3.0, 0.0, 0.2))
        .with_series(series_for(instrument_returns::inputs::DI_1Y, Unit::PctAnnual, 11.5, 0.0, 0.4))
        .with_series(series_for(instrument_returns::inputs::DI_2Y, Unit::PctAnnual, 11.2, 0.0, 0.4))
        .with_series(series_for(instrument_returns::inputs::DI_5Y, Unit::PctAnnual, 10.8, 0.0, 0.4))
        .with_series(series_for(instrument_returns::inputs::DI_10Y, Unit::PctAnnual, 10.5, 0.0, 0.4))
        .with_series(series_for(instrument_returns::inputs::CDI, Unit::PctAnnual, 11.0, 0.0, 0.5))
        .with_series(series_for(instrument_returns::inputs::EMBI, Unit::Bps, 250.0, 0.0, 15.0))
        .with_series(series_for(instrument_returns::inputs::NTNB_5Y_REAL_YIELD, Unit::PctAnnual, 5.0, 0.0, 0.3))
        .with_series(series_for(feature_engine::inputs::VIX, Unit::Index, 18.0, 0.0, 3.0))
        .with_series(series_for(feature_engine::inputs::DXY, Unit::Index, 95.0, 0.0, 1.5))
        .with_series(series_for(feature_engine::inputs::CDS, Unit::Bps, 200.0, 0.0, 10.0))
        .with_series(series_for(feature_engine::inputs::HY_OAS, Unit::Bps, 400.0, 0.0, 20.0))
        .with_series(series_for(feature_engine::inputs::BCOM, Unit::Index, 100.0, 0.0, 2.0))
        .with_series(series_for(feature_engine::inputs::EWZ, Unit::Index, 35.0, 0.0, 1.5))
        .with_series(series_for(feature_engine::inputs::REER, Unit::Index, 100.0, 0.0, 2.0))
        .with_series(series_for(feature_engine::inputs::PPP_FACTOR, Unit::Ratio, 2.5, 0.0, 0.05))
        .with_series(series_for(feature_engine::inputs::GDP_PC_US, Unit::Index, 65000.0, 200.0, 200.0))
        .with_series(series_for(feature_engine::inputs::GDP_PC_BR, Unit::Index, 9000.0, 20.0, 50.0))
        .with_series(series_for(feature_engine::inputs::CA_PCT_GDP, Unit::Ratio, -0.02, 0.0, 0.01))
        .with_series(series_for(feature_engine::inputs::TRADE_OPENNESS, Unit::Ratio, 0.3, 0.0, 0.02))
        .with_series(series_for(feature_engine::inputs::TOT, Unit::Index, 100.0, 0.0, 2.0))
        .with_series(series_for(feature_engine::inputs::CA_12M, Unit::Ratio, -0.015, 0.0, 0.01))
        .with_series(series_for(feature_engine::inputs::IBC, Unit::Index, 140.0, 0.2, 1.5))
        .with_series(series_for(feature_engine::inputs::Z_REAL_DIFF_INPUT, Unit::Ratio, 0.0, 0.0, 0.3))
        .with_series(series_for(feature_engine::inputs::UST_10Y, Unit::PctAnnual, 3.5, 0.0, 0.3))
        .with_series(series_for(feature_engine::inputs::US_TIPS_5Y, Unit::PctAnnual, 1.5, 0.0, 0.2))
        .with_series(series_for(feature_engine::inputs::US_BREAKEVEN_10Y, Unit::PctAnnual, 2.2, 0.0, 0.1))
        .with_series(series_for(feature_engine::inputs::US_CPI_EXPECTATIONS, Unit::PctAnnual, 2.3, 0.0, 0.1))
        .with_series(series_for(feature_engine::inputs::CDS_BPS, Unit::Bps, 200.0, 0.0, 10.0))
        .with_series(series_for(feature_engine::inputs::DEBT_GDP, Unit::Ratio, 0.75, 0.001, 0.01))
        .with_series(series_for(feature_engine::inputs::PRIMARY_BALANCE, Unit::Ratio, -0.01, 0.0, 0.005))
        .with_series(series_for(equilibrium_rate::inputs::IPCA_EXPECTATIONS, Unit::PctAnnual, 4.0, 0.0, 0.3))
        .with_series(series_for(equilibrium_rate::inputs::US_TIPS_10Y, Unit::PctAnnual, 1.8, 0.0, 0.2))
        .with_series(series_for(equilibrium_rate::inputs::DI_3Y, Unit::PctAnnual, 11.0, 0.0, 0.4))
        .with_series(series_for(regime_model::global::UST_10Y, Unit::PctAnnual, 3.5, 0.0, 0.3))
        .with_series(series_for("ibovespa", Unit::Index, 60000.0, 80.0, 1000.0))
}
