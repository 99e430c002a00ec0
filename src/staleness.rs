//! Staleness detection for the active exchange rate.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::rates::RateRecord;

/// Result of a staleness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalenessCheck {
    pub is_stale: bool,
    pub age: Option<Duration>,
    pub threshold: Duration,
}

impl StalenessCheck {
    pub fn stale(age: Duration, threshold: Duration) -> Self {
        Self { is_stale: true, age: Some(age), threshold }
    }

    pub fn fresh(age: Duration, threshold: Duration) -> Self {
        Self { is_stale: false, age: Some(age), threshold }
    }

    pub fn missing(threshold: Duration) -> Self {
        Self { is_stale: true, age: None, threshold }
    }
}

/// Check whether the active rate is older than `threshold` at `now`.
///
/// No active record counts as stale. A record timestamped in the future has
/// age zero.
pub fn check_rate_staleness(
    active: Option<&RateRecord>,
    threshold: Duration,
    now: DateTime<Utc>,
) -> StalenessCheck {
    match active {
        Some(record) => {
            let age = (now - record.created_at)
                .to_std()
                .unwrap_or(Duration::ZERO);
            if age > threshold {
                StalenessCheck::stale(age, threshold)
            } else {
                StalenessCheck::fresh(age, threshold)
            }
        }
        None => StalenessCheck::missing(threshold),
    }
}

/// Log a rate staleness check.
pub fn log_rate_staleness(check: &StalenessCheck) {
    let status = if check.is_stale { "stale" } else { "fresh" };
    let age_str = check
        .age
        .map(crate::duration::format_duration)
        .unwrap_or_else(|| "never".to_string());
    let threshold_str = crate::duration::format_duration(check.threshold);

    debug!(
        age = %age_str,
        threshold = %threshold_str,
        status = status,
        "rate staleness check"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record_at(created_at: DateTime<Utc>) -> RateRecord {
        RateRecord {
            id: 1,
            source: "dolar_api".to_string(),
            rate: 36.5,
            from_currency: "USD".to_string(),
            to_currency: "VES".to_string(),
            is_active: true,
            created_at,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn stale_after_threshold() {
        let record = record_at(now() - chrono::Duration::minutes(31));
        let check = check_rate_staleness(Some(&record), Duration::from_secs(30 * 60), now());
        assert!(check.is_stale);
        assert_eq!(check.age, Some(Duration::from_secs(31 * 60)));
    }

    #[test]
    fn fresh_before_threshold() {
        let record = record_at(now() - chrono::Duration::minutes(29));
        let check = check_rate_staleness(Some(&record), Duration::from_secs(30 * 60), now());
        assert!(!check.is_stale);
    }

    #[test]
    fn exactly_at_threshold_is_fresh() {
        let record = record_at(now() - chrono::Duration::minutes(30));
        let check = check_rate_staleness(Some(&record), Duration::from_secs(30 * 60), now());
        assert!(!check.is_stale);
    }

    #[test]
    fn missing_record_is_stale() {
        let check = check_rate_staleness(None, Duration::from_secs(60), now());
        assert!(check.is_stale);
        assert!(check.age.is_none());
    }

    #[test]
    fn future_record_has_zero_age() {
        let record = record_at(now() + chrono::Duration::minutes(5));
        let check = check_rate_staleness(Some(&record), Duration::from_secs(60), now());
        assert!(!check.is_stale);
        assert_eq!(check.age, Some(Duration::ZERO));
    }
}
