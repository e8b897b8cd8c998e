//! Display formatting for margin figures

use rust_decimal::{Decimal, RoundingStrategy};

/// Round to `digits` significant digits, keeping trailing zeros.
///
/// `to_precision(dec!(66.666), 3)` is `"66.7"`, `to_precision(dec!(0), 3)`
/// is `"0.00"`. Values with more integer digits than `digits` are rounded to
/// the nearest multiple of the matching power of ten and printed in full,
/// never in exponent notation.
pub fn to_precision(value: Decimal, digits: u32) -> String {
    let digits = digits.max(1);
    if value.is_zero() {
        return format!("{:.*}", (digits - 1) as usize, Decimal::ZERO);
    }

    let magnitude = exponent(value.abs());
    let scale = digits as i64 - 1 - magnitude;

    if scale >= 0 {
        let rounded =
            value.round_dp_with_strategy(scale as u32, RoundingStrategy::MidpointAwayFromZero);
        if exponent(rounded.abs()) > magnitude {
            // 9.995 -> 10.0: one fewer fractional digit
            return to_precision(rounded, digits);
        }
        format!("{:.*}", scale as usize, rounded)
    } else {
        // At most 10^28, which still fits a decimal
        let factor = Decimal::try_from_i128_with_scale(10i128.pow((-scale) as u32), 0);
        let rounded = factor.ok().and_then(|factor| {
            (value / factor)
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .checked_mul(factor)
        });
        rounded.unwrap_or(value).trunc().to_string()
    }
}

/// Dollar amount with thousands separators and two decimals
pub fn to_approx_currency(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{sign}${grouped}.{frac_part}")
}

/// Power of ten of the leading digit of a positive value
fn exponent(value: Decimal) -> i64 {
    if value >= Decimal::ONE {
        return value.trunc().to_string().len() as i64 - 1;
    }
    let mut e = 0;
    let mut scaled = value;
    while scaled < Decimal::ONE {
        scaled *= Decimal::TEN;
        e -= 1;
    }
    e
}
