pub mod adjuster;
pub mod alerts;
pub mod descriptors;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod repository;
pub mod schema;
pub mod sqlx_descriptors;
pub mod sqlx_repo;

pub use adjuster::{adjust, AdjustInput, AdjustResult};
pub use alerts::{check_and_create_alerts, Alert, AlertKind, AlertSeverity, AlertThresholds};
pub use descriptors::IpDescriptorRepository;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockAggregator, MockIpDescriptorRepository};
pub use repository::{Aggregator, HourlyDelta};
pub use sqlx_descriptors::SqlxIpDescriptorRepository;
pub use sqlx_repo::SqlxAggregator;
