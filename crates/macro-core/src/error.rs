use thiserror::Error;

/// Error taxonomy for the macro-risk core (see the design doc's error-handling
/// section). Most of these are never propagated across a component boundary
/// — the documented policy is "skip, log, continue" — but they are still
/// typed so that the handful of genuinely fatal paths (a `ConfigError` at
/// construction, or a cascading `DataUnavailable` that empties every
/// instrument) can be told apart from routine degradation.
#[derive(Error, Debug)]
pub enum MacroRiskError {
    /// A named series required by a computation is absent.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// A rolling estimator could not meet its minimum-periods requirement.
    #[error("window too short: {0}")]
    WindowTooShort(String),

    /// The optimiser failed to converge.
    #[error("solver failure: {0}")]
    SolverFailure(String),

    /// A model's `fit` raised (HMM singular, Kalman indefinite, GARCH
    /// non-convergence, ...).
    #[error("fit failure: {0}")]
    FitFailure(String),

    /// A series arrived in the wrong scale or cumulative form.
    #[error("data quality warning: {0}")]
    DataQualityWarning(String),

    /// Invalid configuration detected at construction time.
    #[error("config error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, MacroRiskError>;
