//! Trigger-driven trading engine for PancakeSwap on BNB Smart Chain.
//!
//! [`libs`] holds the chain-facing pieces (client, price oracle, router,
//! transaction executor) and [`app`] the order/token watchers, the
//! inbound facade and the persistence/notification boundaries.

pub mod app;
pub mod constants;
pub mod libs;
