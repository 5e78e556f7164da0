use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use common::time::now_ms;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::client::{PoppedItem, PushOutcome, Queue, QueueDepth, RescueReport};
use crate::framing::{self, QueueMessage};

struct Inner<T> {
    ready: VecDeque<Vec<u8>>,
    processing: VecDeque<Vec<u8>>,
    dead: Vec<Vec<u8>>,
    popped_at_ms: HashMap<Uuid, u64>,
    retry_count: HashMap<Uuid, u32>,
    push_dedupe: HashSet<String>,
    processed: HashMap<Uuid, u64>,
    _marker: std::marker::PhantomData<T>,
}

impl<T> Default for Inner<T> {
    fn default() -> Self {
        Self {
            ready: VecDeque::new(),
            processing: VecDeque::new(),
            dead: Vec::new(),
            popped_at_ms: HashMap::new(),
            retry_count: HashMap::new(),
            push_dedupe: HashSet::new(),
            processed: HashMap::new(),
            _marker: std::marker::PhantomData,
        }
    }
}

/// In-memory stand-in for [`crate::redis_queue::RedisQueue`], used by tests
/// that exercise queue-consuming logic without a live Redis instance.
pub struct MockQueue<T> {
    inner: Mutex<Inner<T>>,
    max_rescues: u32,
}

impl<T> Default for MockQueue<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_rescues: crate::redis_queue::MAX_RESCUES,
        }
    }
}

impl<T> MockQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<T> Queue<T> for MockQueue<T>
where
    T: QueueMessage,
{
    async fn push(&self, item: &T) -> anyhow::Result<PushOutcome> {
        let mut inner = self.inner.lock().await;
        if let Some(dedupe_key) = item.push_dedupe_key() {
            if !inner.push_dedupe.insert(dedupe_key) {
                return Ok(PushOutcome::AlreadyExists);
            }
        }
        let framed = framing::encode(item)?;
        inner.ready.push_back(framed);
        Ok(PushOutcome::Pushed)
    }

    async fn pop(&self, _timeout: Duration) -> anyhow::Result<Option<PoppedItem<T>>> {
        let mut inner = self.inner.lock().await;
        let Some(raw) = inner.ready.pop_front() else {
            return Ok(None);
        };
        let value: T = framing::decode(&raw)?;
        let task_id = value.task_id();
        inner.processing.push_back(raw.clone());
        inner.popped_at_ms.insert(task_id, now_ms());
        inner.retry_count.entry(task_id).or_insert(0);
        Ok(Some(PoppedItem { value, raw }))
    }

    async fn ack(&self, item: &PoppedItem<T>) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(pos) = inner.processing.iter().position(|raw| raw == &item.raw) {
            inner.processing.remove(pos);
        }
        let task_id = item.value.task_id();
        inner.popped_at_ms.remove(&task_id);
        inner.retry_count.remove(&task_id);
        Ok(())
    }

    async fn rescue_stuck(&self, age: Duration) -> anyhow::Result<RescueReport> {
        let mut inner = self.inner.lock().await;
        let now = now_ms();
        let age_ms = age.as_millis() as u64;
        let entries: Vec<Vec<u8>> = inner.processing.iter().cloned().collect();
        let mut report = RescueReport::default();

        for raw in entries {
            let value: T = match framing::decode(&raw) {
                Ok(v) => v,
                Err(_) => continue,
            };
            let task_id = value.task_id();
            let Some(&popped_at_ms) = inner.popped_at_ms.get(&task_id) else {
                continue;
            };
            if now.saturating_sub(popped_at_ms) < age_ms {
                continue;
            }
            let Some(pos) = inner.processing.iter().position(|r| r == &raw) else {
                continue;
            };
            inner.processing.remove(pos);

            let retry_count = *inner.retry_count.get(&task_id).unwrap_or(&0);
            if retry_count + 1 >= self.max_rescues {
                inner.dead.push(raw);
                inner.popped_at_ms.remove(&task_id);
                inner.retry_count.remove(&task_id);
                report.dead_lettered += 1;
            } else {
                inner.retry_count.insert(task_id, retry_count + 1);
                inner.ready.push_back(raw);
                report.rescued += 1;
            }
        }

        Ok(report)
    }

    async fn recover_orphaned(&self) -> anyhow::Result<u64> {
        let mut inner = self.inner.lock().await;
        let mut recovered = 0u64;
        while let Some(raw) = inner.processing.pop_front() {
            if let Ok(value) = framing::decode::<T>(&raw) {
                let task_id = value.task_id();
                inner.popped_at_ms.remove(&task_id);
                inner.retry_count.remove(&task_id);
            }
            inner.ready.push_back(raw);
            recovered += 1;
        }
        Ok(recovered)
    }

    async fn is_processed(&self, task_id: Uuid) -> anyhow::Result<bool> {
        let inner = self.inner.lock().await;
        Ok(match inner.processed.get(&task_id) {
            Some(&expires_at_ms) => now_ms() < expires_at_ms,
            None => false,
        })
    }

    async fn mark_processed(&self, task_id: Uuid, ttl: Duration) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        inner.processed.insert(task_id, now_ms() + ttl.as_millis() as u64);
        Ok(())
    }

    async fn depth(&self) -> anyhow::Result<QueueDepth> {
        let inner = self.inner.lock().await;
        Ok(QueueDepth {
            ready: inner.ready.len() as u64,
            processing: inner.processing.len() as u64,
            dead: inner.dead.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::message::TaskMessage;

    fn task(ip_id: u64) -> TaskMessage {
        TaskMessage {
            ip_id,
            keyword: "demo".to_string(),
            task_id: Uuid::new_v4(),
            created_at_s: 0,
            pages_on_sale: 1,
            pages_sold: 1,
        }
    }

    #[tokio::test]
    async fn push_pop_ack_round_trip() {
        let q: MockQueue<TaskMessage> = MockQueue::new();
        q.push(&task(1)).await.unwrap();
        let popped = q.pop(Duration::from_millis(10)).await.unwrap().unwrap();
        assert_eq!(popped.value.ip_id, 1);
        assert_eq!(q.depth().await.unwrap().processing, 1);
        q.ack(&popped).await.unwrap();
        assert_eq!(q.depth().await.unwrap(), QueueDepth::default());
    }

    #[tokio::test]
    async fn duplicate_task_push_is_deduped() {
        let q: MockQueue<TaskMessage> = MockQueue::new();
        let t = task(1);
        assert_eq!(q.push(&t).await.unwrap(), PushOutcome::Pushed);
        assert_eq!(q.push(&t).await.unwrap(), PushOutcome::AlreadyExists);
    }

    #[tokio::test]
    async fn rescue_requeues_until_max_then_dead_letters() {
        let q: MockQueue<TaskMessage> = MockQueue::new();
        q.push(&task(1)).await.unwrap();
        q.pop(Duration::from_millis(10)).await.unwrap().unwrap();

        for expected_rescues in 1..=2 {
            let report = q.rescue_stuck(Duration::from_millis(0)).await.unwrap();
            assert_eq!(report.rescued, 1);
            assert_eq!(report.dead_lettered, 0);
            let popped = q.pop(Duration::from_millis(10)).await.unwrap().unwrap();
            assert!(expected_rescues <= 2);
            let _ = popped;
        }

        let report = q.rescue_stuck(Duration::from_millis(0)).await.unwrap();
        assert_eq!(report.dead_lettered, 1);
        assert_eq!(q.depth().await.unwrap().dead, 1);
    }

    #[tokio::test]
    async fn recover_orphaned_moves_everything_back_to_ready() {
        let q: MockQueue<TaskMessage> = MockQueue::new();
        q.push(&task(1)).await.unwrap();
        q.push(&task(2)).await.unwrap();
        q.pop(Duration::from_millis(10)).await.unwrap();
        q.pop(Duration::from_millis(10)).await.unwrap();
        assert_eq!(q.depth().await.unwrap().processing, 2);

        let recovered = q.recover_orphaned().await.unwrap();
        assert_eq!(recovered, 2);
        assert_eq!(q.depth().await.unwrap().ready, 2);
        assert_eq!(q.depth().await.unwrap().processing, 0);
    }

    #[tokio::test]
    async fn processed_marker_expires() {
        let q: MockQueue<TaskMessage> = MockQueue::new();
        let id = Uuid::new_v4();
        assert!(!q.is_processed(id).await.unwrap());
        q.mark_processed(id, Duration::from_secs(3600)).await.unwrap();
        assert!(q.is_processed(id).await.unwrap());
    }
}
