use chrono::{DateTime, Utc};
use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

use super::to_utc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Completed => "Completed",
        }
    }

    /// Exact, case-sensitive match on the stored labels.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(TaskStatus::Pending),
            "Completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

/// A task document in the `lists` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    /// Owning user; never changes after insert.
    #[serde(rename = "user")]
    pub owner: ObjectId,
    #[serde(rename = "createdAt")]
    pub created_at: BsonDateTime,
    #[serde(rename = "updatedAt")]
    pub updated_at: BsonDateTime,
}

/// Already validated input for a new task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
}

impl Task {
    pub fn new(owner: ObjectId, input: NewTask) -> Self {
        let now = BsonDateTime::now();
        Task {
            id: ObjectId::new(),
            title: input.title,
            description: input.description,
            status: input.status,
            owner,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Already validated partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
}

impl TaskChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.status.is_none()
    }

    pub fn apply(&self, task: &mut Task, now: BsonDateTime) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        task.updated_at = now;
    }
}

/// JSON shape of a task sent to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub user: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        TaskResponse {
            id: task.id.to_hex(),
            title: task.title,
            description: task.description,
            status: task.status,
            user: task.owner.to_hex(),
            created_at: to_utc(task.created_at),
            updated_at: to_utc(task.updated_at),
        }
    }
}
