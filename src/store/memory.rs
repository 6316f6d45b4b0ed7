//! Process-local stores. Each operation takes the lock once, so owner-scoped
//! updates and deletes are as atomic here as the single-document calls in
//! the MongoDB stores.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use tokio::sync::RwLock;

use super::{StoreError, TaskStore, UserStore};
use crate::models::{ProfileChanges, Task, TaskChanges, User};
use crate::query::{TaskFilter, TaskQuery};

#[derive(Debug, Clone, Default)]
pub struct MemoryTaskStore {
    tasks: Arc<RwLock<HashMap<ObjectId, Task>>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn insert(&self, task: Task) -> Result<Task, StoreError> {
        let mut guard = self.tasks.write().await;
        if guard.contains_key(&task.id) {
            return Err(StoreError::Duplicate(format!("_id {}", task.id)));
        }
        guard.insert(task.id, task.clone());
        Ok(task)
    }

    async fn find_page(&self, query: &TaskQuery) -> Result<Vec<Task>, StoreError> {
        let guard = self.tasks.read().await;
        let mut matching: Vec<&Task> = guard.values().filter(|t| query.filter.matches(t)).collect();
        matching.sort_by(|a, b| query.compare(a, b));
        Ok(matching
            .into_iter()
            .skip(query.skip() as usize)
            .take(query.limit as usize)
            .cloned()
            .collect())
    }

    async fn count(&self, filter: &TaskFilter) -> Result<u64, StoreError> {
        let guard = self.tasks.read().await;
        Ok(guard.values().filter(|t| filter.matches(t)).count() as u64)
    }

    async fn find_owned(&self, owner: ObjectId, id: ObjectId) -> Result<Option<Task>, StoreError> {
        let guard = self.tasks.read().await;
        Ok(guard.get(&id).filter(|t| t.owner == owner).cloned())
    }

    async fn update_owned(
        &self,
        owner: ObjectId,
        id: ObjectId,
        changes: &TaskChanges,
    ) -> Result<Option<Task>, StoreError> {
        let mut guard = self.tasks.write().await;
        match guard.get_mut(&id).filter(|t| t.owner == owner) {
            Some(task) => {
                changes.apply(task, BsonDateTime::now());
                Ok(Some(task.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_owned(&self, owner: ObjectId, id: ObjectId) -> Result<bool, StoreError> {
        let mut guard = self.tasks.write().await;
        if guard.get(&id).is_some_and(|t| t.owner == owner) {
            guard.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<ObjectId, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: User) -> Result<User, StoreError> {
        let mut guard = self.users.write().await;
        if let Some(existing) = guard
            .values()
            .find(|u| u.email == user.email || u.username == user.username)
        {
            let key = if existing.email == user.email { "email" } else { "username" };
            return Err(StoreError::Duplicate(key.to_string()));
        }
        guard.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let guard = self.users.read().await;
        Ok(guard.values().find(|u| u.email == email).cloned())
    }

    async fn set_password(&self, id: ObjectId, password_hash: &str) -> Result<bool, StoreError> {
        let mut guard = self.users.write().await;
        match guard.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_profile(
        &self,
        id: ObjectId,
        changes: &ProfileChanges,
    ) -> Result<Option<User>, StoreError> {
        let mut guard = self.users.write().await;
        Ok(guard.get_mut(&id).map(|user| {
            changes.apply(user);
            user.clone()
        }))
    }
}
