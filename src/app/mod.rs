pub mod handler;
pub mod models;
pub mod notify;
pub mod order;
pub mod services;
pub mod store;
pub mod token;
