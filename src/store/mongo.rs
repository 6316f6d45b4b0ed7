use async_trait::async_trait;
use futures_util::TryStreamExt;
use log::{debug, info};
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime, Document};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::{FindOptions, IndexOptions, ReturnDocument};
use mongodb::{Collection, Database, IndexModel};

use super::{StoreError, TaskStore, UserStore};
use crate::models::{ProfileChanges, Task, TaskChanges, User};
use crate::query::{TaskFilter, TaskQuery};

pub const TASK_COLLECTION: &str = "lists";
pub const USER_COLLECTION: &str = "users";

const DUPLICATE_KEY: i32 = 11000;

fn map_write_error(err: MongoError) -> StoreError {
    if let ErrorKind::Write(WriteFailure::WriteError(write_error)) = err.kind.as_ref() {
        if write_error.code == DUPLICATE_KEY {
            return StoreError::Duplicate(duplicate_field(&write_error.message));
        }
    }
    StoreError::Database(err)
}

/// Field of the unique index named in an E11000 message, e.g.
/// `... index: username_1 dup key: ...` gives `username`.
fn duplicate_field(message: &str) -> String {
    message
        .split("index: ")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .map(|index| index.trim_end_matches("_1").to_string())
        .unwrap_or_else(|| message.to_string())
}

fn owned(owner: ObjectId, id: ObjectId) -> Document {
    doc! { "_id": id, "user": owner }
}

#[derive(Clone)]
pub struct MongoTaskStore {
    collection: Collection<Task>,
}

impl MongoTaskStore {
    pub fn new(db: &Database) -> Self {
        MongoTaskStore {
            collection: db.collection::<Task>(TASK_COLLECTION),
        }
    }

    /// Owner-scoped listing sorted by the default key.
    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let index = IndexModel::builder()
            .keys(doc! { "user": 1, "createdAt": -1 })
            .build();
        self.collection.create_index(index).await?;
        info!("Indexes ensured on {}", TASK_COLLECTION);
        Ok(())
    }
}

fn find_options(query: &TaskQuery) -> FindOptions {
    FindOptions::builder()
        .sort(query.sort_document())
        .skip(query.skip())
        .limit(query.limit as i64)
        .build()
}

fn task_update(changes: &TaskChanges) -> Document {
    let mut set = doc! { "updatedAt": BsonDateTime::now() };
    if let Some(title) = &changes.title {
        set.insert("title", title.as_str());
    }
    if let Some(description) = &changes.description {
        set.insert("description", description.as_str());
    }
    if let Some(status) = changes.status {
        set.insert("status", status.as_str());
    }
    doc! { "$set": set }
}

#[async_trait]
impl TaskStore for MongoTaskStore {
    async fn insert(&self, task: Task) -> Result<Task, StoreError> {
        self.collection
            .insert_one(&task)
            .await
            .map_err(map_write_error)?;
        Ok(task)
    }

    async fn find_page(&self, query: &TaskQuery) -> Result<Vec<Task>, StoreError> {
        let filter = query.filter.to_document();
        let options = find_options(query);
        debug!(
            "find {} filter={} sort={} skip={} limit={}",
            TASK_COLLECTION,
            filter,
            query.sort_document(),
            query.skip(),
            query.limit
        );
        let cursor = self.collection.find(filter).with_options(options).await?;
        let tasks: Vec<Task> = cursor.try_collect().await?;
        Ok(tasks)
    }

    async fn count(&self, filter: &TaskFilter) -> Result<u64, StoreError> {
        Ok(self.collection.count_documents(filter.to_document()).await?)
    }

    async fn find_owned(&self, owner: ObjectId, id: ObjectId) -> Result<Option<Task>, StoreError> {
        Ok(self.collection.find_one(owned(owner, id)).await?)
    }

    async fn update_owned(
        &self,
        owner: ObjectId,
        id: ObjectId,
        changes: &TaskChanges,
    ) -> Result<Option<Task>, StoreError> {
        Ok(self
            .collection
            .find_one_and_update(owned(owner, id), task_update(changes))
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn delete_owned(&self, owner: ObjectId, id: ObjectId) -> Result<bool, StoreError> {
        let result = self.collection.delete_one(owned(owner, id)).await?;
        Ok(result.deleted_count == 1)
    }
}

#[derive(Clone)]
pub struct MongoUserStore {
    collection: Collection<User>,
}

impl MongoUserStore {
    pub fn new(db: &Database) -> Self {
        MongoUserStore {
            collection: db.collection::<User>(USER_COLLECTION),
        }
    }

    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        for key in ["email", "username"] {
            let mut keys = Document::new();
            keys.insert(key, 1);
            let index = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(true).build())
                .build();
            self.collection.create_index(index).await?;
        }
        info!("Indexes ensured on {}", USER_COLLECTION);
        Ok(())
    }
}

fn profile_update(changes: &ProfileChanges) -> Document {
    let mut set = Document::new();
    if let Some(name) = &changes.name {
        set.insert("name", name.as_str());
    }
    if let Some(age) = changes.age {
        set.insert("age", age);
    }
    if let Some(date_of_birth) = changes.date_of_birth {
        // Same text form serde gives NaiveDate on insert.
        set.insert("dateOfBirth", date_of_birth.to_string());
    }
    if let Some(image) = &changes.profile_image {
        set.insert("profileImage", image.as_str());
    }
    doc! { "$set": set }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn insert(&self, user: User) -> Result<User, StoreError> {
        self.collection
            .insert_one(&user)
            .await
            .map_err(map_write_error)?;
        Ok(user)
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<User>, StoreError> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.collection.find_one(doc! { "email": email }).await?)
    }

    async fn set_password(&self, id: ObjectId, password_hash: &str) -> Result<bool, StoreError> {
        let result = self
            .collection
            .update_one(doc! { "_id": id }, doc! { "$set": { "password": password_hash } })
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn update_profile(
        &self,
        id: ObjectId,
        changes: &ProfileChanges,
    ) -> Result<Option<User>, StoreError> {
        if changes.is_empty() {
            return self.find_by_id(id).await;
        }
        Ok(self
            .collection
            .find_one_and_update(doc! { "_id": id }, profile_update(changes))
            .return_document(ReturnDocument::After)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use crate::query::{build_query, ListParams};

    #[test]
    fn duplicate_field_reads_index_name() {
        let message = "E11000 duplicate key error collection: tasklist.users index: username_1 \
                       dup key: { username: \"ada-1234abcd\" }";
        assert_eq!(duplicate_field(message), "username");
        let message = "E11000 duplicate key error collection: tasklist.users index: email_1 \
                       dup key: { email: \"username@example.com\" }";
        assert_eq!(duplicate_field(message), "email");
        assert_eq!(duplicate_field("something else"), "something else");
    }

    #[test]
    fn find_options_serialize_for_any_page() {
        let params = ListParams {
            page: Some(i64::MAX.to_string()),
            limit: Some("5".into()),
            ..Default::default()
        };
        let query = build_query(ObjectId::new(), &params);
        let options = mongodb::bson::to_document(&find_options(&query)).unwrap();
        assert_eq!(options.get_i64("skip").unwrap(), i64::MAX);
        assert_eq!(options.get_i64("limit").unwrap(), 5);
    }

    #[test]
    fn task_update_sets_only_given_fields() {
        let changes = TaskChanges {
            title: Some("New title".into()),
            status: Some(TaskStatus::Completed),
            ..Default::default()
        };
        let update = task_update(&changes);
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_str("title").unwrap(), "New title");
        assert_eq!(set.get_str("status").unwrap(), "Completed");
        assert!(set.get("description").is_none());
        assert!(set.get_datetime("updatedAt").is_ok());
    }

    #[test]
    fn owned_filter_names_id_and_owner() {
        let owner = ObjectId::new();
        let id = ObjectId::new();
        assert_eq!(owned(owner, id), doc! { "_id": id, "user": owner });
    }

    #[test]
    fn profile_update_writes_date_as_text() {
        let changes = ProfileChanges {
            date_of_birth: chrono::NaiveDate::from_ymd_opt(1990, 4, 2),
            ..Default::default()
        };
        let update = profile_update(&changes);
        assert_eq!(
            update.get_document("$set").unwrap().get_str("dateOfBirth").unwrap(),
            "1990-04-02"
        );
    }
}
