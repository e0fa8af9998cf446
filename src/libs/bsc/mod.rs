//! BNB Smart Chain access. [`Chain`] is the seam every engine component is
//! generic over; [`ChainClient`] implements it over JSON-RPC.
pub mod chain;
pub mod client;
#[cfg(test)]
pub mod mock;

pub use chain::{Chain, TxReceipt};
pub use client::ChainClient;
