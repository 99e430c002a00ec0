#[cfg(feature = "providers")]
pub mod app;
pub mod clock;
pub mod config;
pub mod duration;
pub mod format;
pub mod rates;
pub mod receivables;
pub mod staleness;
