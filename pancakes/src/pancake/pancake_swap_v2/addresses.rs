use alloy::primitives::{Address, address};

pub use crate::pancake::addresses::*;

pub const PANCAKE_V2_FACTORY: Address = address!("0xcA143Ce32Fe78f1f7019d7d551a6402fC5350c73");

pub const PANCAKE_V2_ROUTER: Address = address!("0x10ED43C718714eb63d5aA57B78B54704E256024E");
