use serde::{Deserialize, Serialize};

/// Per-(IP, sourceID) state kept in the fast keyed store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ItemStatus {
    Available,
    Sold,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Available => "AVAILABLE",
            ItemStatus::Sold => "SOLD",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AVAILABLE" => Some(ItemStatus::Available),
            "SOLD" => Some(ItemStatus::Sold),
            _ => None,
        }
    }
}

/// Current recorded state of one marketplace listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemState {
    pub source_id: String,
    pub status: ItemStatus,
    /// Non-negative price in minor currency units.
    pub price: i64,
    pub first_seen_s: u64,
    pub last_seen_s: u64,
}
