use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::framing::QueueMessage;

/// Result of a push. `AlreadyExists` is not an error: the caller treats a
/// duplicate push as a no-op, matching the `TaskExists` outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed,
    AlreadyExists,
}

/// An item handed back by `pop`, carrying the raw framed bytes alongside
/// the decoded value so `ack` can remove the exact list entry by value.
#[derive(Debug, Clone)]
pub struct PoppedItem<T> {
    pub value: T,
    pub(crate) raw: Vec<u8>,
}

impl<T> PoppedItem<T> {
    pub fn task_id(&self) -> Uuid
    where
        T: QueueMessage,
    {
        self.value.task_id()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueDepth {
    pub ready: u64,
    pub processing: u64,
    pub dead: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RescueReport {
    pub rescued: u64,
    pub dead_lettered: u64,
}

/// One of the two durable, at-least-once channels (tasks, results). Each
/// is backed by a ready list, a processing list, and a dead-letter list.
#[async_trait]
pub trait Queue<T>: Send + Sync
where
    T: QueueMessage,
{
    async fn push(&self, item: &T) -> anyhow::Result<PushOutcome>;

    /// Atomically moves the head of the ready list to the tail of the
    /// processing list and returns it. Blocks up to `timeout`; returns
    /// `Ok(None)` on timeout rather than an error.
    async fn pop(&self, timeout: Duration) -> anyhow::Result<Option<PoppedItem<T>>>;

    /// Removes `item` from the processing list by value.
    async fn ack(&self, item: &PoppedItem<T>) -> anyhow::Result<()>;

    /// Moves processing entries older than `age` back to ready, or to
    /// dead-letter once they have exceeded the retry budget.
    async fn rescue_stuck(&self, age: Duration) -> anyhow::Result<RescueReport>;

    /// Called once on startup: moves every processing entry back to ready.
    /// Returns the number of entries recovered.
    async fn recover_orphaned(&self) -> anyhow::Result<u64>;

    async fn is_processed(&self, task_id: Uuid) -> anyhow::Result<bool>;

    async fn mark_processed(&self, task_id: Uuid, ttl: Duration) -> anyhow::Result<()>;

    async fn depth(&self) -> anyhow::Result<QueueDepth>;
}
