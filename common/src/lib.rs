pub mod cancellation;
pub mod config;
pub mod error;
pub mod logger;
pub mod metrics;
pub mod time;

pub use config::AppConfig;
pub use error::AppError;
pub use metrics::Counters;
