pub mod client;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod redis_store;

pub use client::ScheduleStore;
pub use redis_store::RedisScheduleStore;
