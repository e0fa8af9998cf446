//! PancakeSwap v1 (legacy) factory. Only used for pool discovery.

pub mod addresses;

pub use addresses::*;
