// src/tasks.rs

use actix_web::{web, HttpResponse};
use log::{debug, info};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::{ApiError, FieldError};
use crate::models::{NewTask, Task, TaskChanges, TaskResponse, TaskStatus, User};
use crate::query::{build_query, ListParams};
use crate::store::TaskStore;

/// Body of `POST /addlist`. Fields are optional here so that a missing field
/// is reported as a validation error alongside the others.
#[derive(Debug, Default, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Body of `PUT /updatelist/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Response of `GET /todos`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TodosPage {
    pub lists: Vec<TaskResponse>,
    pub total: u64,
    pub page: u64,
    #[serde(rename = "totalPages")]
    pub total_pages: u64,
    pub limit: u64,
}

fn required_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn validate_new_task(input: &CreateTaskRequest) -> Result<NewTask, ApiError> {
    let mut errors = Vec::new();

    let title = required_text(&input.title);
    if title.is_none() {
        errors.push(FieldError::new("title", "Task title is required"));
    }
    let description = required_text(&input.description);
    if description.is_none() {
        errors.push(FieldError::new("description", "Task description is required"));
    }
    let status = input.status.as_deref().and_then(TaskStatus::parse);
    if status.is_none() {
        errors.push(FieldError::new("status", "Invalid task status"));
    }

    match (title, description, status) {
        (Some(title), Some(description), Some(status)) if errors.is_empty() => Ok(NewTask {
            title,
            description,
            status,
        }),
        _ => Err(ApiError::Validation(errors)),
    }
}

fn check_task_id(raw: &str, errors: &mut Vec<FieldError>) -> Option<ObjectId> {
    let id = ObjectId::parse_str(raw.trim()).ok();
    if id.is_none() {
        errors.push(FieldError::new("id", "Invalid task ID format"));
    }
    id
}

pub fn parse_task_id(raw: &str) -> Result<ObjectId, ApiError> {
    let mut errors = Vec::new();
    check_task_id(raw, &mut errors).ok_or(ApiError::Validation(errors))
}

/// Validates the id and every provided field together.
pub fn validate_update(raw_id: &str, input: &UpdateTaskRequest) -> Result<(ObjectId, TaskChanges), ApiError> {
    let mut errors = Vec::new();
    let id = check_task_id(raw_id, &mut errors);
    let mut changes = TaskChanges::default();

    if input.title.is_some() {
        changes.title = required_text(&input.title);
        if changes.title.is_none() {
            errors.push(FieldError::new("title", "Task title cannot be empty"));
        }
    }
    if input.description.is_some() {
        changes.description = required_text(&input.description);
        if changes.description.is_none() {
            errors.push(FieldError::new("description", "Task description cannot be empty"));
        }
    }
    if let Some(raw) = input.status.as_deref() {
        changes.status = TaskStatus::parse(raw);
        if changes.status.is_none() {
            errors.push(FieldError::new("status", "Invalid task status"));
        }
    }
    if errors.is_empty() && changes.is_empty() {
        errors.push(FieldError::new("body", "No fields to update"));
    }

    match id {
        Some(id) if errors.is_empty() => Ok((id, changes)),
        _ => Err(ApiError::Validation(errors)),
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("List not found".into())
}

pub async fn create_task(
    store: &dyn TaskStore,
    owner: &User,
    input: &CreateTaskRequest,
) -> Result<Task, ApiError> {
    let new_task = validate_new_task(input)?;
    Ok(store.insert(Task::new(owner.id, new_task)).await?)
}

/// Page and total come from the same filter; the count ignores skip/limit.
pub async fn list_tasks(
    store: &dyn TaskStore,
    owner: &User,
    params: &ListParams,
) -> Result<TodosPage, ApiError> {
    let query = build_query(owner.id, params);
    debug!("Listing tasks for {} with {:?}", owner.id, query);

    let (tasks, total) = futures::try_join!(store.find_page(&query), store.count(&query.filter))?;

    Ok(TodosPage {
        lists: tasks.into_iter().map(TaskResponse::from).collect(),
        total,
        page: query.page,
        total_pages: query.total_pages(total),
        limit: query.limit,
    })
}

pub async fn get_task(store: &dyn TaskStore, owner: &User, raw_id: &str) -> Result<Task, ApiError> {
    let id = parse_task_id(raw_id)?;
    store.find_owned(owner.id, id).await?.ok_or_else(not_found)
}

pub async fn update_task(
    store: &dyn TaskStore,
    owner: &User,
    raw_id: &str,
    input: &UpdateTaskRequest,
) -> Result<Task, ApiError> {
    let (id, changes) = validate_update(raw_id, input)?;
    store
        .update_owned(owner.id, id, &changes)
        .await?
        .ok_or_else(not_found)
}

pub async fn delete_task(store: &dyn TaskStore, owner: &User, raw_id: &str) -> Result<ObjectId, ApiError> {
    let id = parse_task_id(raw_id)?;
    if store.delete_owned(owner.id, id).await? {
        Ok(id)
    } else {
        Err(not_found())
    }
}

/// POST /addlist
pub async fn add_list(
    data: web::Data<AppState>,
    AuthUser(user): AuthUser,
    payload: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let task = create_task(data.tasks.as_ref(), &user, &payload).await?;
    info!("List created: {} by {}", task.id, user.id);
    Ok(HttpResponse::Created().json(json!({
        "message": "List added successfully",
        "list": TaskResponse::from(task),
    })))
}

/// GET /todos
pub async fn get_todos(
    data: web::Data<AppState>,
    AuthUser(user): AuthUser,
    query: web::Query<ListParams>,
) -> Result<HttpResponse, ApiError> {
    let page = list_tasks(data.tasks.as_ref(), &user, &query).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// GET /getlist/{id}
pub async fn get_list(
    data: web::Data<AppState>,
    AuthUser(user): AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let task = get_task(data.tasks.as_ref(), &user, &path).await?;
    Ok(HttpResponse::Ok().json(json!({ "list": TaskResponse::from(task) })))
}

/// PUT /updatelist/{id}
pub async fn update_list(
    data: web::Data<AppState>,
    AuthUser(user): AuthUser,
    path: web::Path<String>,
    payload: web::Json<UpdateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let task = update_task(data.tasks.as_ref(), &user, &path, &payload).await?;
    info!("List updated: {} by {}", task.id, user.id);
    Ok(HttpResponse::Ok().json(json!({
        "message": "List updated successfully",
        "list": TaskResponse::from(task),
    })))
}

/// DELETE /deletelist/{id}
pub async fn delete_list(
    data: web::Data<AppState>,
    AuthUser(user): AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = delete_task(data.tasks.as_ref(), &user, &path).await?;
    info!("List deleted: {} by {}", id, user.id);
    Ok(HttpResponse::Ok().json(json!({ "message": "List deleted successfully" })))
}
