use serde::{Deserialize, Serialize};

/// Lifecycle status of a tracked IP. Only `Active` descriptors participate
/// in scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpStatus {
    Active,
    Paused,
    Deleted,
}

/// Identity + scheduling weight for one tracked intellectual-property keyword.
///
/// Invariant: exactly one descriptor per `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpDescriptor {
    pub id: u64,
    pub name: String,
    pub status: IpStatus,
    /// Positive real controlling crawl interval via `interval = base / weight`.
    pub weight: f64,
    pub last_crawled_s: Option<u64>,
    pub aliases: Vec<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub external_id: Option<String>,
    pub notes: Option<String>,
}

impl IpDescriptor {
    pub fn is_active(&self) -> bool {
        self.status == IpStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk(status: IpStatus) -> IpDescriptor {
        IpDescriptor {
            id: 1,
            name: "Example IP".into(),
            status,
            weight: 1.0,
            last_crawled_s: None,
            aliases: vec![],
            category: None,
            tags: vec![],
            external_id: None,
            notes: None,
        }
    }

    #[test]
    fn only_active_status_is_active() {
        assert!(mk(IpStatus::Active).is_active());
        assert!(!mk(IpStatus::Paused).is_active());
        assert!(!mk(IpStatus::Deleted).is_active());
    }
}
