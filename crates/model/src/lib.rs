pub mod env;
pub mod record;

pub use record::{now_millis, IdempotencyRecord, RecordStatus};

pub type Error = Box<dyn std::error::Error + Send + Sync>;
