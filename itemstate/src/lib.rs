pub mod machine;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod redis_repo;
pub mod repository;

pub use machine::{process_items_batch, BatchOutcome, TtlPolicy};
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockItemStateRepository;
pub use redis_repo::RedisItemStateRepository;
pub use repository::ItemStateRepository;
