pub mod client;
pub mod framing;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod redis_queue;

pub use client::{PoppedItem, PushOutcome, Queue, QueueDepth, RescueReport};
pub use framing::QueueMessage;
pub use redis_queue::RedisQueue;

use anyhow::Context;
use redis::aio::ConnectionManager;

use domain::message::{ResultMessage, TaskMessage};

pub type TaskQueue = RedisQueue<TaskMessage>;
pub type ResultQueue = RedisQueue<ResultMessage>;

/// Opens a connection-managed Redis client and builds the `tasks` and
/// `results` queues over it. A single `ConnectionManager` is cheap to clone
/// and is shared by both channels, mirroring the pooled-connection style
/// the relational store uses on the aggregator side.
pub async fn connect(redis_url: &str) -> anyhow::Result<(TaskQueue, ResultQueue)> {
    let client = redis::Client::open(redis_url).context("open redis client")?;
    let conn = ConnectionManager::new(client)
        .await
        .context("establish redis connection manager")?;

    let tasks = RedisQueue::new(conn.clone(), "tasks");
    let results = RedisQueue::new(conn, "results");
    Ok((tasks, results))
}
