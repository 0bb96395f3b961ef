//! Raw macro series names the feature engine looks for on its input panel.
//! Absent names degrade the feature(s) that depend on them (spec §6/§7);
//! nothing here is mandatory.

pub const VIX: &str = "vix";
pub const DXY: &str = "dxy";
pub const CDS: &str = "cds_5y";
pub const EMBI: &str = "embi";
pub const HY_OAS: &str = "us_hy_oas";
pub const BCOM: &str = "bcom";
pub const EWZ: &str = "ewz";

pub const SPOT_USDBRL: &str = "spot_usdbrl";
pub const REER: &str = "reer";
pub const PPP_FACTOR: &str = "ppp_factor";
pub const GDP_PC_US: &str = "gdp_per_capita_us";
pub const GDP_PC_BR: &str = "gdp_per_capita_br";
pub const CA_PCT_GDP: &str = "current_account_pct_gdp";
pub const TRADE_OPENNESS: &str = "trade_openness";
pub const TOT: &str = "terms_of_trade";
pub const CA_12M: &str = "current_account_12m";
pub const IBC: &str = "ibc_br";
pub const Z_REAL_DIFF_INPUT: &str = "real_rate_differential";

pub const DI_1Y: &str = "di_1y";
pub const DI_3M: &str = "di_3m";
pub const DI_5Y: &str = "di_5y";
pub const DI_10Y: &str = "di_10y";
pub const CDI: &str = "cdi";
pub const UST_10Y: &str = "ust_10y";
pub const US_TIPS_5Y: &str = "us_tips_5y";
pub const US_BREAKEVEN_10Y: &str = "us_breakeven_10y";
pub const US_CPI_EXPECTATIONS: &str = "us_cpi_expectations";

pub const CDS_BPS: &str = "cds_5y_bps";
pub const DEBT_GDP: &str = "debt_to_gdp";
pub const PRIMARY_BALANCE: &str = "primary_balance_pct_gdp";
