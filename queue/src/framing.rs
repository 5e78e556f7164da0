use anyhow::{bail, Context, Result};
use domain::message::{ResultMessage, TaskMessage};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

const LEN_PREFIX_BYTES: usize = 4;

/// A message framed for a single queue. Gives the redis-backed and mock
/// queue implementations a task id to key sidecar metadata on without
/// coupling them to the domain message types directly.
pub trait QueueMessage: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn task_id(&self) -> Uuid;

    /// Key used to deduplicate a *push*, if this message type wants one.
    /// Returns `None` for message types that only dedupe on the consumer
    /// side (via `IsProcessed`/`MarkProcessed`).
    fn push_dedupe_key(&self) -> Option<String> {
        None
    }
}

impl QueueMessage for TaskMessage {
    fn task_id(&self) -> Uuid {
        self.task_id
    }

    fn push_dedupe_key(&self) -> Option<String> {
        Some(format!("{}:{}", self.ip_id, self.task_id))
    }
}

impl QueueMessage for ResultMessage {
    fn task_id(&self) -> Uuid {
        self.task_id
    }
}

/// Encodes `item` as self-describing JSON prefixed with its 4-byte
/// little-endian length, ready to store as an opaque list-entry value.
pub fn encode<T: QueueMessage>(item: &T) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(item).context("serialize queue message")?;
    let len = u32::try_from(body.len()).context("queue message too large to frame")?;
    let mut framed = Vec::with_capacity(LEN_PREFIX_BYTES + body.len());
    framed.extend_from_slice(&len.to_le_bytes());
    framed.extend_from_slice(&body);
    Ok(framed)
}

/// Inverse of [`encode`]. Validates the length prefix against the actual
/// payload before deserializing so a truncated or corrupt entry fails
/// loudly instead of being handed to `serde_json` as-is.
pub fn decode<T: QueueMessage>(framed: &[u8]) -> Result<T> {
    if framed.len() < LEN_PREFIX_BYTES {
        bail!("queue entry shorter than length prefix ({} bytes)", framed.len());
    }
    let (len_bytes, body) = framed.split_at(LEN_PREFIX_BYTES);
    let len = u32::from_le_bytes(len_bytes.try_into().unwrap()) as usize;
    if len != body.len() {
        bail!(
            "queue entry length prefix mismatch: prefix says {len}, body is {}",
            body.len()
        );
    }
    serde_json::from_slice(body).context("deserialize queue message")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_task_message() {
        let msg = TaskMessage {
            ip_id: 11,
            keyword: "test".to_string(),
            task_id: Uuid::new_v4(),
            created_at_s: 1_700_000_000,
            pages_on_sale: 5,
            pages_sold: 5,
        };
        let framed = encode(&msg).unwrap();
        let decoded: TaskMessage = decode(&framed).unwrap();
        assert_eq!(decoded.ip_id, msg.ip_id);
        assert_eq!(decoded.task_id, msg.task_id);
    }

    #[test]
    fn rejects_truncated_entry() {
        let err = decode::<TaskMessage>(&[1, 2]).unwrap_err();
        assert!(err.to_string().contains("shorter than length prefix"));
    }

    #[test]
    fn rejects_length_mismatch() {
        let mut framed = encode(&TaskMessage {
            ip_id: 1,
            keyword: "k".to_string(),
            task_id: Uuid::new_v4(),
            created_at_s: 0,
            pages_on_sale: 1,
            pages_sold: 1,
        })
        .unwrap();
        framed.truncate(framed.len() - 1);
        let err = decode::<TaskMessage>(&framed).unwrap_err();
        assert!(err.to_string().contains("mismatch"));
    }

    #[test]
    fn task_message_push_dedupe_key_combines_ip_and_task() {
        let task_id = Uuid::new_v4();
        let msg = TaskMessage {
            ip_id: 42,
            keyword: "k".to_string(),
            task_id,
            created_at_s: 0,
            pages_on_sale: 1,
            pages_sold: 1,
        };
        assert_eq!(msg.push_dedupe_key(), Some(format!("42:{task_id}")));
    }

    #[test]
    fn result_message_has_no_push_dedupe_key() {
        let msg = ResultMessage {
            ip_id: 1,
            task_id: Uuid::new_v4(),
            items: vec![],
            error_message: None,
        };
        assert_eq!(msg.push_dedupe_key(), None);
    }
}
