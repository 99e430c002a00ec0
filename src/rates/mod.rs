mod error;
#[cfg(feature = "providers")]
pub mod providers;
#[cfg(feature = "providers")]
mod registry;
mod fallback;
mod jsonl_store;
mod manager;
mod models;
mod scheduler;
mod source;
mod store;
mod validation;

pub use error::{FetchError, RateError, SourceError, SourceFailure};
pub use fallback::FallbackFetcher;
pub use jsonl_store::JsonlRateStore;
pub use manager::{RateManager, RatePhase, RateSnapshot};
pub use models::{CurrentRate, FetchedRate, RateRecord, SourceOutcome, MANUAL_SOURCE, USD};
#[cfg(feature = "providers")]
pub use registry::build_sources;
pub use scheduler::{AutoRefresh, AutoRefreshHandle};
pub use source::{extract_rate, RateSource, DEFAULT_RATE_FIELDS};
pub use store::{MemoryRateStore, RateStore};
pub use validation::{parse_manual_rate, RateBounds};
