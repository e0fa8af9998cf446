use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;

use crate::pancake::addresses::{STABLE_TOKENS, WBNB};

/// Minimum acceptable output for a quote given a slippage tolerance in percent.
pub fn apply_slippage(quoted: U256, slippage_pct: Decimal) -> U256 {
    let keep = (Decimal::ONE_HUNDRED - slippage_pct).min(Decimal::ONE_HUNDRED);
    if keep <= Decimal::ZERO {
        return U256::ZERO;
    }
    let mantissa = U256::from(keep.mantissa().unsigned_abs());
    let denom = U256::from(100u64) * U256::from(10u64).pow(U256::from(keep.scale()));
    quoted.saturating_mul(mantissa) / denom
}

pub fn path2(token_in: Address, token_out: Address) -> Vec<Address> {
    vec![token_in, token_out]
}

pub fn path3(token_in: Address, mid: Address, token_out: Address) -> Vec<Address> {
    vec![token_in, mid, token_out]
}

/// Direct path between `token` and WBNB plus one hop through each stable
/// quote token, oriented in the trade direction.
pub fn candidate_paths(token: Address, sell: bool) -> Vec<Vec<Address>> {
    let mut paths = Vec::with_capacity(1 + STABLE_TOKENS.len());
    if sell {
        paths.push(path2(token, WBNB));
        for mid in STABLE_TOKENS {
            paths.push(path3(token, mid, WBNB));
        }
    } else {
        paths.push(path2(WBNB, token));
        for mid in STABLE_TOKENS {
            paths.push(path3(WBNB, mid, token));
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use rust_decimal_macros::dec;

    #[test]
    fn slippage_keeps_fraction_of_quote() {
        let q = U256::from(1_000_000u64);
        assert_eq!(apply_slippage(q, dec!(0.5)), U256::from(995_000u64));
        assert_eq!(apply_slippage(q, dec!(12.25)), U256::from(877_500u64));
        assert_eq!(apply_slippage(q, dec!(0)), q);
        assert_eq!(apply_slippage(q, dec!(100)), U256::ZERO);
    }

    #[test]
    fn candidates_follow_trade_direction() {
        let token = address!("0x0000000000000000000000000000000000000abc");
        let sells = candidate_paths(token, true);
        assert_eq!(sells.len(), 3);
        assert!(sells.iter().all(|p| p[0] == token && *p.last().unwrap() == WBNB));
        let buys = candidate_paths(token, false);
        assert!(buys.iter().all(|p| p[0] == WBNB && *p.last().unwrap() == token));
        assert_eq!(buys[1].len(), 3);
    }
}
