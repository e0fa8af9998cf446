use alloy::primitives::{Address, address};

pub const WBNB: Address = address!("0xbb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c");

pub const BUSD: Address = address!("0xe9e7CEA3DedcA5984780Bafc599bD69ADd087D56");

pub const USDT: Address = address!("0x55d398326f99059fF775485246999027B3197955");

/// Quote tokens a token can be paired against, native first.
pub const BASE_TOKENS: [Address; 3] = [WBNB, BUSD, USDT];

/// Quote tokens other than the native coin (all USD pegged).
pub const STABLE_TOKENS: [Address; 2] = [BUSD, USDT];

pub fn is_stable(token: Address) -> bool {
    STABLE_TOKENS.contains(&token)
}
