use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Round half away from zero to `decimals` places, padding with zeros.
pub fn format_amount(value: Decimal, decimals: u32) -> String {
    let rounded = value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    pad_fraction_to_dp(&rounded.normalize().to_string(), decimals)
}

/// Rate formatted for display. Falls back to plain `f64` formatting for
/// values `Decimal` cannot represent.
pub fn format_rate(rate: f64, decimals: u32) -> String {
    match Decimal::from_f64(rate) {
        Some(value) => format_amount(value, decimals),
        None => rate.to_string(),
    }
}

fn pad_fraction_to_dp(s: &str, dp: u32) -> String {
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };
    if dp == 0 {
        return int_part.to_string();
    }

    let mut out = String::with_capacity(int_part.len() + 1 + dp as usize);
    out.push_str(int_part);
    out.push('.');
    out.extend(frac_part.chars().take(dp as usize));
    for _ in frac_part.len().min(dp as usize)..dp as usize {
        out.push('0');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_and_rounds() {
        assert_eq!(format_amount(Decimal::new(4000, 0), 2), "4000.00");
        assert_eq!(format_amount(Decimal::new(36_125, 3), 2), "36.13");
        assert_eq!(format_amount(Decimal::new(365, 1), 0), "37");
        assert_eq!(format_rate(36.5, 2), "36.50");
        assert_eq!(format_rate(f64::INFINITY, 2), "inf");
    }
}
