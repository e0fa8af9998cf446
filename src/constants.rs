use std::time::Duration;

use alloy::primitives::U256;

#[macro_export]
macro_rules! env_lazy {
    ($( $vis:vis $name:ident : $ty:ty = ($key:literal, $default:expr); )* ) => {
        $(
            $vis static $name: ::std::sync::LazyLock<$ty> = ::std::sync::LazyLock::new(|| {
                $crate::libs::config::load_env();
                $crate::libs::config::Config::get_var_t::<$ty>($key, $default)
            });
        )*
    };
}

env_lazy! {
    pub BSC_CHAIN_ID: u64          = ("BSC_CHAIN_ID", 56);
    pub RECEIPT_TIMEOUT_SECS: u64  = ("RECEIPT_TIMEOUT_SECS", 60);
}

/// If the estimated gas limit is above this one, the transaction is cancelled.
pub const GAS_LIMIT_FAILSAFE: u64 = 2_500_000;

/// Gas limit = estimate * GAS_MARGIN_PCT / 100.
pub const GAS_MARGIN_PCT: u64 = 120;

/// Used for approvals when the estimate fails.
pub const APPROVAL_GAS_FALLBACK: u64 = 100_000;

/// 0.1 gwei on top of the network price for approvals.
pub const APPROVAL_GAS_BUMP_WEI: u128 = 100_000_000;

/// 0.002 BNB kept aside for future gas fees when buying.
pub const BNB_GAS_RESERVE: U256 = U256::from_limbs([2_000_000_000_000_000, 0, 0, 0]);

pub const SWAP_DEADLINE_SECS: u64 = 60;

pub const NONCE_REFRESH_EVERY: Duration = Duration::from_secs(10);

pub const PRICE_TTL: Duration = Duration::from_secs(1);
pub const LP_TTL: Duration = Duration::from_secs(3600);
pub const BNB_PRICE_TTL: Duration = Duration::from_secs(30);

pub const RECEIPT_POLL_EVERY: Duration = Duration::from_millis(1000);

/// Gas offset (gwei) used by "sell all".
pub const SELL_ALL_GAS_OFFSET_GWEI: &str = "+20.1";

/// Allowances at or above this value (top 15 hex digits cleared) count as approved.
pub fn approval_threshold() -> U256 {
    U256::MAX >> 60
}
