pub mod bucket;
pub mod ip;
pub mod item;
pub mod message;
pub mod schedule;
pub mod transition;

pub use bucket::{DailyBucket, HourlyBucket, MonthlyBucket, PriceStats, WeeklyBucket};
pub use ip::{IpDescriptor, IpStatus};
pub use item::{ItemState, ItemStatus};
pub use message::{ResultItem, ResultMessage, TaskMessage};
pub use schedule::ScheduleEntry;
pub use transition::Transition;
