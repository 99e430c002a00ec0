mod config;
mod rates;
mod receivables;
mod types;

pub use config::config_output;
pub use rates::{
    build_manager, check_staleness, compare_sources, current_rate, latest_rate, rate_history,
    rate_range, reconcile, refresh_rate, set_rate,
};
pub use receivables::list_receivables;
pub use types::{
    ActivationOutput, RateOutput, ReceivableOutput, SourceComparisonOutput, StalenessOutput,
};
