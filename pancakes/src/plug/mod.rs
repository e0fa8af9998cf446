//! Pure price math: decimal normalization, reserve ratios and price impact.

pub mod price;

pub use price::*;
