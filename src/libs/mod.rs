pub mod bsc;
pub mod config;
pub mod error;
pub mod price;
pub mod route;
pub mod tx;
pub mod writing;
