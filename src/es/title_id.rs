//! 64-bit title identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

use super::constants::TITLE_CATEGORY_SYSTEM;

/// Title identifier: category in the high word, number in the low word
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TitleId(pub u64);

impl TitleId {
    pub const fn new(category: u32, id: u32) -> Self {
        TitleId(((category as u64) << 32) | id as u64)
    }

    /// Title ID of system module (IOS) `ios`
    pub const fn system(ios: u32) -> Self {
        Self::new(TITLE_CATEGORY_SYSTEM, ios)
    }

    pub const fn category(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub const fn id(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    pub const fn is_system(self) -> bool {
        self.category() == TITLE_CATEGORY_SYSTEM
    }

    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for TitleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}-{:08x}", self.category(), self.id())
    }
}

impl From<u64> for TitleId {
    fn from(raw: u64) -> Self {
        TitleId(raw)
    }
}
