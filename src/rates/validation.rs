use serde::{Deserialize, Serialize};

use super::RateError;

/// Plausibility window a rate must fall in before it can be activated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateBounds {
    pub min: f64,
    pub max: f64,
}

impl RateBounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn check(&self, rate: f64) -> Result<f64, RateError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(RateError::InvalidRate(rate));
        }
        if rate < self.min || rate > self.max {
            return Err(RateError::OutOfBounds {
                rate,
                min: self.min,
                max: self.max,
            });
        }
        Ok(rate)
    }
}

impl Default for RateBounds {
    fn default() -> Self {
        Self::new(0.0001, 1_000_000_000.0)
    }
}

/// Parse a manually entered rate. Accepts a comma as decimal separator.
pub fn parse_manual_rate(input: &str) -> Result<f64, RateError> {
    let trimmed = input.trim();
    let normalized = trimmed.replace(',', ".");
    let value: f64 = normalized
        .parse()
        .map_err(|_| RateError::InvalidInput(trimmed.to_string()))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(RateError::InvalidRate(value));
    }
    Ok(value)
}
