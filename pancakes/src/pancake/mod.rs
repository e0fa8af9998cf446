pub mod addresses;
pub mod pancake_swap_v1;
pub mod pancake_swap_v2;

pub use addresses::*;

use alloy::primitives::Address;

/// Factory generation of the AMM.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Version {
    V1,
    V2,
}

impl Version {
    pub const ALL: [Version; 2] = [Version::V2, Version::V1];

    pub fn factory(self) -> Address {
        match self {
            Version::V1 => pancake_swap_v1::PANCAKE_V1_FACTORY,
            Version::V2 => pancake_swap_v2::PANCAKE_V2_FACTORY,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Version::V1 => "v1",
            Version::V2 => "v2",
        }
    }
}
