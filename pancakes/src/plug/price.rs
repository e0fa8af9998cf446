use alloy::primitives::U256;
use rust_decimal::Decimal;

/// Largest mantissa a `Decimal` can hold (2^96 - 1).
const MAX_MANTISSA: u128 = (1u128 << 96) - 1;
const MAX_SCALE: u32 = 28;

/// Flat protocol fee charged by every v2 pool hop, in basis points.
pub const LP_FEE_BPS: u32 = 25;

fn pow10(exp: u32) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}

/// Rescale a raw token amount with `decimals` to 18 decimal places.
pub fn normalize_18(amount: U256, decimals: u8) -> U256 {
    let decimals = decimals as u32;
    if decimals <= 18 {
        amount.saturating_mul(pow10(18 - decimals))
    } else {
        amount / pow10(decimals - 18)
    }
}

/// `num / den` as a `Decimal`, using the largest scale whose mantissa fits.
pub fn ratio_to_decimal(num: U256, den: U256) -> Decimal {
    if den.is_zero() || num.is_zero() {
        return Decimal::ZERO;
    }
    for scale in (0..=MAX_SCALE).rev() {
        let Some(scaled) = num.checked_mul(pow10(scale)) else {
            continue;
        };
        let Ok(mantissa) = u128::try_from(scaled / den) else {
            continue;
        };
        if mantissa <= MAX_MANTISSA {
            return Decimal::from_i128_with_scale(mantissa as i128, scale).normalize();
        }
    }
    Decimal::MAX
}

/// Human-readable amount of a raw quantity.
pub fn to_human(amount: U256, decimals: u8) -> Decimal {
    ratio_to_decimal(amount, pow10(decimals as u32))
}

/// Raw quantity for a human-readable amount, truncated. Negative values map to zero.
pub fn from_human(value: Decimal, decimals: u8) -> U256 {
    if value <= Decimal::ZERO {
        return U256::ZERO;
    }
    let mantissa = U256::from(value.mantissa().unsigned_abs());
    mantissa.saturating_mul(pow10(decimals as u32)) / pow10(value.scale())
}

/// Compounded protocol fee for a path with `hops` pool hops: `1 - 0.9975^hops`.
pub fn lp_fee(hops: usize) -> Decimal {
    let keep = Decimal::new(10_000 - LP_FEE_BPS as i64, 4);
    let mut kept = Decimal::ONE;
    for _ in 0..hops {
        kept *= keep;
    }
    Decimal::ONE - kept
}

/// Output implied by the pool-ratio `price` (BNB per token) alone, normalized
/// to 18 decimals. `decimals_in` are the decimals of the input asset.
pub fn fair_amount_out(amount_in: U256, price: Decimal, sell: bool, decimals_in: u8) -> U256 {
    if price <= Decimal::ZERO {
        return U256::ZERO;
    }
    let mantissa = U256::from(price.mantissa().unsigned_abs());
    let unit = pow10(price.scale());
    if sell {
        normalize_18(amount_in.saturating_mul(mantissa), decimals_in) / unit
    } else {
        normalize_18(amount_in.saturating_mul(unit), decimals_in) / mantissa
    }
}

/// Share of the fair output lost to pool depth, excluding the protocol fee.
/// Both amounts must be normalized to 18 decimals.
pub fn price_impact(fair_out: U256, actual_out: U256, hops: usize) -> Decimal {
    if fair_out.is_zero() {
        return Decimal::ONE;
    }
    let slippage = if actual_out <= fair_out {
        ratio_to_decimal(fair_out - actual_out, fair_out)
    } else {
        -ratio_to_decimal(actual_out - fair_out, fair_out)
    };
    slippage - lp_fee(hops)
}
