//! Human-readable durations for refresh intervals and staleness thresholds.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{de, Deserialize, Deserializer};

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// Parse a duration such as `"30m"`, `"10s"`, `"1d"` or a compound `"1h30m"`.
///
/// Units are `d`, `h`, `m` and `s`. Input is trimmed and case-insensitive.
///
/// ```
/// use ratebook::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(30 * 60));
/// assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(90 * 60));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        bail!("Duration is empty");
    }

    let mut total: u64 = 0;
    let mut digits = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let unit_secs = match c {
            'd' => SECS_PER_DAY,
            'h' => SECS_PER_HOUR,
            'm' => SECS_PER_MINUTE,
            's' => 1,
            _ => bail!("Unknown duration unit '{c}' (expected d, h, m or s)"),
        };
        if digits.is_empty() {
            bail!("Duration unit '{c}' has no number in front of it");
        }

        let n: u64 = digits
            .parse()
            .with_context(|| format!("Invalid number in duration: {digits}"))?;
        let secs = n.checked_mul(unit_secs).context("Duration is too large")?;
        total = total.checked_add(secs).context("Duration is too large")?;
        digits.clear();
    }

    if !digits.is_empty() {
        bail!("Duration must end with d, h, m or s");
    }

    Ok(Duration::from_secs(total))
}

/// Render a duration using the largest units that divide it, e.g. `"1h30m"`.
pub fn format_duration(d: Duration) -> String {
    let mut secs = d.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, size) in [
        ('d', SECS_PER_DAY),
        ('h', SECS_PER_HOUR),
        ('m', SECS_PER_MINUTE),
        ('s', 1),
    ] {
        let n = secs / size;
        if n > 0 {
            out.push_str(&format!("{n}{unit}"));
            secs %= size;
        }
    }
    out
}

/// Serde deserializer for duration strings.
///
/// Use with `#[serde(deserialize_with = "deserialize_duration")]`.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(de::Error::custom)
}

/// Serde serializer counterpart of [`deserialize_duration`].
pub fn serialize_duration<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format_duration(*d))
}
