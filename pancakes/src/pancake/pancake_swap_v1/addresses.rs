use alloy::primitives::{Address, address};

pub const PANCAKE_V1_FACTORY: Address = address!("0xBCfCcbde45cE874adCB698cC183deBcF17952812");
