//! PancakeSwap v2 (BSC) utilities using Alloy only.
//!
//! Scope: quoting & swapping (exact in) between BNB and a token, direct or
//! through one intermediate quote token.

pub mod addresses;
pub mod path;
pub mod router;

pub use addresses::*;
pub use path::*;
pub use router::*;
