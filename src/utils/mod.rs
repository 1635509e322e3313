/*
 * Utility functions and helpers
 */

use chrono::Utc;
use ethers::types::U256;
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use rust_decimal::Decimal;
use crate::models::{Result, SwapdeskError};

const BPS_DENOMINATOR: u32 = 10_000;
const PRICE_SCALE: u32 = 18;

/// Renders a smallest-unit amount as `integer.fraction`, the fraction zero-padded to `decimals` digits.
///
/// No rounding is applied. With `decimals == 0` the fraction is a single `0`.
pub fn format_units(value: U256, decimals: i32) -> Result<String> {
    let decimals = usize::try_from(decimals)
        .map_err(|_| SwapdeskError::InvalidInput(format!("Negative decimals: {decimals}")))?;

    if decimals == 0 {
        return Ok(format!("{value}.0"));
    }

    let digits = value.to_string();
    if digits.len() <= decimals {
        return Ok(format!("0.{digits:0>decimals$}"));
    }

    let (integer, fraction) = digits.split_at(digits.len() - decimals);
    Ok(format!("{integer}.{fraction}"))
}

/// Parses a human decimal string into smallest units. Inverse of [`format_units`].
///
/// Fraction digits beyond `decimals` are accepted only when they are zeros.
pub fn parse_units(text: &str, decimals: i32) -> Result<U256> {
    let decimals = usize::try_from(decimals)
        .map_err(|_| SwapdeskError::InvalidInput(format!("Negative decimals: {decimals}")))?;

    let text = text.trim();
    let (integer, fraction) = match text.split_once('.') {
        Some((integer, fraction)) => (integer, fraction),
        None => (text, ""),
    };

    if integer.is_empty() && fraction.is_empty() {
        return Err(SwapdeskError::InvalidInput(format!("Not a decimal amount: {text:?}")));
    }
    if !integer.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(SwapdeskError::InvalidInput(format!("Not a decimal amount: {text:?}")));
    }

    let fraction = if fraction.len() > decimals {
        let (kept, excess) = fraction.split_at(decimals);
        if excess.chars().any(|c| c != '0') {
            return Err(SwapdeskError::InvalidInput(format!(
                "{text} has more than {decimals} fractional digits"
            )));
        }
        kept
    } else {
        fraction
    };

    let combined = format!("{integer}{fraction:0<decimals$}");
    let trimmed = combined.trim_start_matches('0');
    if trimmed.is_empty() {
        return Ok(U256::zero());
    }

    U256::from_dec_str(trimmed)
        .map_err(|e| SwapdeskError::InvalidInput(format!("Amount {text} out of range: {e}")))
}

/// Price of token0 denominated in token1, in whole-token terms.
pub fn sqrt_price_x96_to_price(sqrt_price_x96: U256, decimals0: u8, decimals1: u8) -> Result<Decimal> {
    if sqrt_price_x96.is_zero() {
        return Err(SwapdeskError::CalculationError("Invalid sqrt price: zero".to_string()));
    }

    let sqrt_price = BigUint::parse_bytes(sqrt_price_x96.to_string().as_bytes(), 10)
        .ok_or_else(|| SwapdeskError::CalculationError("Failed to read sqrt price".to_string()))?;
    let ten = BigUint::from(10u32);

    let numerator = sqrt_price.pow(2u32)
        * ten.pow(u32::from(decimals0))
        * ten.pow(PRICE_SCALE);
    let denominator = BigUint::from(1u32) << 192usize;
    let denominator = denominator * ten.pow(u32::from(decimals1));

    let mut scaled = numerator / denominator;
    let mut scale = PRICE_SCALE;
    loop {
        if let Some(mantissa) = scaled.to_i128() {
            if let Ok(price) = Decimal::try_from_i128_with_scale(mantissa, scale) {
                return Ok(price.normalize());
            }
        }
        if scale == 0 {
            return Err(SwapdeskError::CalculationError(
                "Price does not fit in a decimal".to_string(),
            ));
        }
        scaled /= &ten;
        scale -= 1;
        if scaled.is_zero() {
            return Ok(Decimal::ZERO);
        }
    }
}

/// Converts a percentage such as `0.5` into basis points.
pub fn slippage_percent_to_bps(percent: Decimal) -> Result<u32> {
    if percent.is_sign_negative() || percent >= Decimal::from(100) {
        return Err(SwapdeskError::ConfigError(format!(
            "Slippage must be within [0, 100) percent, got {percent}"
        )));
    }
    (percent * Decimal::from(100))
        .round()
        .to_u32()
        .ok_or_else(|| SwapdeskError::ConfigError(format!("Invalid slippage: {percent}")))
}

/// Lowest acceptable output for a quoted amount, never below one unit.
///
/// A zero quote means the pool has nothing to give and is an error.
pub fn min_amount_out(quoted: U256, slippage_bps: u32) -> Result<U256> {
    if quoted.is_zero() {
        return Err(SwapdeskError::CalculationError(
            "Quoted output is zero, pool has no usable liquidity".to_string(),
        ));
    }
    let keep = U256::from(BPS_DENOMINATOR.saturating_sub(slippage_bps));
    let denominator = U256::from(BPS_DENOMINATOR);
    let minimum = quoted
        .checked_mul(keep)
        .map_or_else(|| quoted / denominator * keep, |v| v / denominator);
    Ok(minimum.max(U256::one()))
}

#[must_use]
pub fn deadline_from_now(window_secs: u64) -> U256 {
    let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
    U256::from(now.saturating_add(window_secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn formats_six_decimals() {
        assert_eq!(format_units(U256::from(1_234_567u64), 6).unwrap(), "1.234567");
    }

    #[test]
    fn formats_zero_with_full_padding() {
        assert_eq!(format_units(U256::zero(), 18).unwrap(), "0.000000000000000000");
    }

    #[test]
    fn pads_fraction_on_the_left() {
        assert_eq!(format_units(U256::from(1_000_050u64), 6).unwrap(), "1.000050");
        assert_eq!(format_units(U256::from(42u64), 6).unwrap(), "0.000042");
    }

    #[test]
    fn formats_zero_decimals() {
        assert_eq!(format_units(U256::from(5u64), 0).unwrap(), "5.0");
    }

    #[test]
    fn rejects_negative_decimals() {
        assert!(matches!(
            format_units(U256::one(), -1),
            Err(SwapdeskError::InvalidInput(_))
        ));
        assert!(parse_units("1", -3).is_err());
    }

    #[test]
    fn formats_max_value() {
        let text = format_units(U256::MAX, 18).unwrap();
        assert_eq!(parse_units(&text, 18).unwrap(), U256::MAX);
    }

    #[test]
    fn parse_inverts_format() {
        let values = [
            U256::zero(),
            U256::one(),
            U256::from(999_999u64),
            U256::from(1_234_567u64),
            U256::exp10(18),
            U256::from_dec_str("20000000000000000000").unwrap(),
            U256::MAX,
        ];
        for value in values {
            for decimals in [0, 1, 6, 8, 18, 30] {
                let text = format_units(value, decimals).unwrap();
                assert_eq!(parse_units(&text, decimals).unwrap(), value, "{text} @ {decimals}");
            }
        }
    }

    #[test]
    fn parses_human_amounts() {
        assert_eq!(parse_units("20", 18).unwrap(), U256::exp10(18) * 20);
        assert_eq!(parse_units("0.5", 6).unwrap(), U256::from(500_000u64));
        assert_eq!(parse_units(".5", 6).unwrap(), U256::from(500_000u64));
        assert_eq!(parse_units("3.", 2).unwrap(), U256::from(300u64));
        assert_eq!(parse_units("1.50", 1).unwrap(), U256::from(15u64));
    }

    #[test]
    fn rejects_malformed_amounts() {
        assert!(parse_units("", 6).is_err());
        assert!(parse_units(".", 6).is_err());
        assert!(parse_units("1.2.3", 6).is_err());
        assert!(parse_units("-1", 6).is_err());
        assert!(parse_units("1e18", 6).is_err());
        assert!(parse_units("0.1234567", 6).is_err());
    }

    #[test]
    fn rejects_overflowing_amounts() {
        let too_big = format!("{}0", U256::MAX);
        assert!(parse_units(&too_big, 0).is_err());
    }

    #[test]
    fn sqrt_price_of_one_is_parity() {
        let q96 = U256::one() << 96;
        assert_eq!(sqrt_price_x96_to_price(q96, 18, 18).unwrap(), Decimal::ONE);
    }

    #[test]
    fn sqrt_price_adjusts_for_decimals() {
        // raw ratio 1:1 between an 18-decimal token0 and a 6-decimal token1
        let q96 = U256::one() << 96;
        let price = sqrt_price_x96_to_price(q96, 18, 6).unwrap();
        assert_eq!(price, Decimal::from_str("1000000000000").unwrap());
    }

    #[test]
    fn sqrt_price_zero_is_rejected() {
        assert!(sqrt_price_x96_to_price(U256::zero(), 18, 6).is_err());
    }

    #[test]
    fn slippage_percent_converts_to_bps() {
        assert_eq!(slippage_percent_to_bps(Decimal::from_str("0.5").unwrap()).unwrap(), 50);
        assert_eq!(slippage_percent_to_bps(Decimal::from(3)).unwrap(), 300);
        assert!(slippage_percent_to_bps(Decimal::from(100)).is_err());
        assert!(slippage_percent_to_bps(Decimal::from(-1)).is_err());
    }

    #[test]
    fn min_amount_out_applies_tolerance() {
        assert_eq!(min_amount_out(U256::from(10_000u64), 50).unwrap(), U256::from(9_950u64));
        assert_eq!(min_amount_out(U256::from(10_000u64), 0).unwrap(), U256::from(10_000u64));
    }

    #[test]
    fn min_amount_out_never_below_one() {
        assert_eq!(min_amount_out(U256::from(1u64), 9_999).unwrap(), U256::one());
    }

    #[test]
    fn min_amount_out_rejects_empty_pool() {
        assert!(matches!(
            min_amount_out(U256::zero(), 50),
            Err(SwapdeskError::CalculationError(_))
        ));
    }

    #[test]
    fn min_amount_out_survives_huge_quotes() {
        let minimum = min_amount_out(U256::MAX, 50).unwrap();
        assert_eq!(minimum, U256::MAX / 10_000 * 9_950);
    }

    #[test]
    fn deadline_is_in_the_future() {
        let now = U256::from(Utc::now().timestamp());
        let deadline = deadline_from_now(1200);
        assert!(deadline >= now + 1200);
        assert!(deadline <= now + 1202);
    }
}
