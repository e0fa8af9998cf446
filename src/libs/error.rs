use {rust_decimal::Decimal, thiserror::Error};

/// Pre-flight reasons for not sending a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("no viable route")]
    NoViableRoute,
    #[error("price impact too high ({}%)", (.0 * Decimal::ONE_HUNDRED).round_dp(2))]
    PriceImpact(Decimal),
    #[error("gas estimate failed: {0}")]
    GasEstimate(String),
    #[error("gas estimate {0} is above the failsafe limit")]
    GasCeiling(u64),
    #[error("amount is zero")]
    ZeroAmount,
    #[error("slippage must be within 0..100%")]
    InvalidSlippage,
    #[error("router is not approved for the token")]
    NotApproved,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("unauthorized chat {0}")]
    Unauthorized(i64),
    #[error("token {0} is not watched")]
    UnknownToken(alloy::primitives::Address),
    #[error("order #{0} does not exist")]
    UnknownOrder(u64),
    #[error("token {0} is already watched")]
    DuplicateToken(alloy::primitives::Address),
    #[error("invalid order: {0}")]
    InvalidOrder(String),
}

/// Rejection carried by an `anyhow::Error`, if any.
pub fn as_rejection(err: &anyhow::Error) -> Option<&Rejection> {
    err.downcast_ref::<Rejection>()
}
