//! Raw series names the composite equilibrium-rate models look for.

pub const CDI: &str = "cdi";
pub const IPCA_EXPECTATIONS: &str = "ipca_expectations_12m";
pub const DEBT_GDP: &str = "debt_to_gdp";
pub const PRIMARY_BALANCE: &str = "primary_balance_pct_gdp";
pub const CDS_BPS: &str = "cds_5y_bps";
pub const EMBI: &str = "embi";

pub const US_TIPS_5Y: &str = "us_tips_5y";
pub const US_TIPS_10Y: &str = "us_tips_10y";
pub const VIX: &str = "vix";
pub const TOT: &str = "terms_of_trade";

pub const DI_1Y: &str = "di_1y";
pub const DI_2Y: &str = "di_2y";
pub const DI_3Y: &str = "di_3y";
pub const DI_5Y: &str = "di_5y";
pub const DI_10Y: &str = "di_10y";

pub const OUTPUT_GAP: &str = "output_gap_ibc";
