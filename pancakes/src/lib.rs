//! PancakeSwap (BSC) building blocks shared by the trading engine: contract
//! addresses for both factory/router generations, ABI bindings, swap path
//! helpers and the fixed-point price math used for quoting.

pub mod pancake;
pub mod plug;
