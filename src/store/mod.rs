//! Persistence seams. Every by-id task operation takes the owner as well and
//! must match on both in a single store call.

mod memory;
mod mongo;

pub use memory::{MemoryTaskStore, MemoryUserStore};
pub use mongo::{MongoTaskStore, MongoUserStore};

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use thiserror::Error;

use crate::models::{ProfileChanges, Task, TaskChanges, User};
use crate::query::{TaskFilter, TaskQuery};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    /// A unique index rejected the write.
    #[error("duplicate value for {0}")]
    Duplicate(String),
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert(&self, task: Task) -> Result<Task, StoreError>;

    /// One page of `query`, already sorted.
    async fn find_page(&self, query: &TaskQuery) -> Result<Vec<Task>, StoreError>;

    /// Matches for `filter`, ignoring pagination.
    async fn count(&self, filter: &TaskFilter) -> Result<u64, StoreError>;

    async fn find_owned(&self, owner: ObjectId, id: ObjectId) -> Result<Option<Task>, StoreError>;

    /// Returns the updated task, or `None` when no task has both `id` and `owner`.
    async fn update_owned(
        &self,
        owner: ObjectId,
        id: ObjectId,
        changes: &TaskChanges,
    ) -> Result<Option<Task>, StoreError>;

    /// `false` when no task has both `id` and `owner`.
    async fn delete_owned(&self, owner: ObjectId, id: ObjectId) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `StoreError::Duplicate` on a taken email or username.
    async fn insert(&self, user: User) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// `false` when the user does not exist.
    async fn set_password(&self, id: ObjectId, password_hash: &str) -> Result<bool, StoreError>;

    async fn update_profile(
        &self,
        id: ObjectId,
        changes: &ProfileChanges,
    ) -> Result<Option<User>, StoreError>;
}
