mod task;
mod user;

pub use task::{NewTask, Task, TaskChanges, TaskResponse, TaskStatus};
pub use user::{ProfileChanges, PublicUser, User};

use chrono::{DateTime, Utc};
use mongodb::bson::DateTime as BsonDateTime;

/// Stored timestamps are BSON dates; clients get RFC 3339.
pub(crate) fn to_utc(value: BsonDateTime) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(value.timestamp_millis()).unwrap_or_default()
}
