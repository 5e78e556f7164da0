use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pushed by the scheduler, consumed by the (external) crawler worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMessage {
    pub ip_id: u64,
    pub keyword: String,
    pub task_id: Uuid,
    pub created_at_s: u64,
    pub pages_on_sale: u32,
    pub pages_sold: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResultItemStatus {
    OnSale,
    Sold,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultItem {
    pub source_id: String,
    pub title: String,
    pub price: i64,
    pub status: ResultItemStatus,
    pub image_url: Option<String>,
    pub item_url: Option<String>,
}

/// Produced by the (external) crawler, consumed by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMessage {
    pub ip_id: u64,
    pub task_id: Uuid,
    pub items: Vec<ResultItem>,
    pub error_message: Option<String>,
}

impl ResultMessage {
    /// `errorMessage` values the pipeline treats as a recoverable no-op
    /// rather than a crawler-reported failure.
    pub fn is_recoverable_signal(&self) -> bool {
        matches!(self.error_message.as_deref(), Some("no_items") | None)
            || self.error_message.as_deref() == Some("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk(err: Option<&str>) -> ResultMessage {
        ResultMessage {
            ip_id: 1,
            task_id: Uuid::new_v4(),
            items: vec![],
            error_message: err.map(str::to_string),
        }
    }

    #[test]
    fn none_and_no_items_and_empty_are_recoverable() {
        assert!(mk(None).is_recoverable_signal());
        assert!(mk(Some("no_items")).is_recoverable_signal());
        assert!(mk(Some("")).is_recoverable_signal());
    }

    #[test]
    fn other_error_messages_are_not_recoverable() {
        assert!(!mk(Some("rate_limited")).is_recoverable_signal());
    }
}
