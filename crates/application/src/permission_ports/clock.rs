use chrono::{DateTime, Utc};

/// Source of operation timestamps.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}
