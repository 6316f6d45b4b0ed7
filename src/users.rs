// src/users.rs

use std::sync::LazyLock;

use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, Utc};
use log::{info, warn};
use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::{
    create_jwt, hash_password, subject, validate_jwt, verify_password, AuthUser, TokenPurpose,
};
use crate::error::{ApiError, FieldError};
use crate::models::{ProfileChanges, PublicUser, User};
use crate::store::StoreError;

const MIN_PASSWORD_LEN: usize = 6;
const MAX_AGE: i64 = 150;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email regex pattern"));

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default, rename = "dateOfBirth")]
    pub date_of_birth: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default, rename = "oldPassword")]
    pub old_password: Option<String>,
    #[serde(default, rename = "newPassword")]
    pub new_password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default, rename = "dateOfBirth")]
    pub date_of_birth: Option<String>,
    #[serde(default, rename = "profileImage")]
    pub profile_image: Option<String>,
}

fn normalize_email(raw: &Option<String>) -> Option<String> {
    raw.as_deref()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
}

fn check_email(raw: &Option<String>, errors: &mut Vec<FieldError>) -> Option<String> {
    match normalize_email(raw) {
        Some(email) if EMAIL_PATTERN.is_match(&email) => Some(email),
        Some(_) => {
            errors.push(FieldError::new("email", "Invalid email address"));
            None
        }
        None => {
            errors.push(FieldError::new("email", "Email is required"));
            None
        }
    }
}

fn check_password<'a>(
    field: &str,
    raw: &'a Option<String>,
    errors: &mut Vec<FieldError>,
) -> Option<&'a str> {
    match raw.as_deref() {
        Some(p) if p.chars().count() >= MIN_PASSWORD_LEN => Some(p),
        Some(p) if !p.is_empty() => {
            errors.push(FieldError::new(
                field,
                format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
            ));
            None
        }
        _ => {
            errors.push(FieldError::new(field, "Password is required"));
            None
        }
    }
}

fn check_age(raw: Option<i64>, errors: &mut Vec<FieldError>) -> Option<i32> {
    let age = raw?;
    if (1..=MAX_AGE).contains(&age) {
        i32::try_from(age).ok()
    } else {
        errors.push(FieldError::new(
            "age",
            format!("Age must be between 1 and {}", MAX_AGE),
        ));
        None
    }
}

fn check_date_of_birth(raw: &Option<String>, errors: &mut Vec<FieldError>) -> Option<NaiveDate> {
    let raw = raw.as_deref()?.trim();
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) if date <= Utc::now().date_naive() => Some(date),
        Ok(_) => {
            errors.push(FieldError::new("dateOfBirth", "Date of birth cannot be in the future"));
            None
        }
        Err(_) => {
            errors.push(FieldError::new("dateOfBirth", "Date of birth must be YYYY-MM-DD"));
            None
        }
    }
}

/// Unique handle: the email local part plus a random suffix.
fn derive_username(email: &str) -> String {
    let local: String = email
        .split('@')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let suffix = Uuid::new_v4().simple().to_string();
    let base = if local.is_empty() { "user" } else { local.as_str() };
    format!("{}-{}", base, &suffix[..8])
}

fn duplicate_user(err: StoreError) -> ApiError {
    match err {
        StoreError::Duplicate(_) => ApiError::BadRequest("User already exists".into()),
        other => other.into(),
    }
}

/// Inserts `user`, drawing a fresh handle once if the derived one is taken.
async fn insert_new_user(state: &AppState, mut user: User) -> Result<User, ApiError> {
    match state.users.insert(user.clone()).await {
        Err(StoreError::Duplicate(key)) if key == "username" => {
            warn!("Handle {} already taken, drawing another", user.username);
            user.username = derive_username(&user.email);
            state.users.insert(user).await.map_err(duplicate_user)
        }
        other => other.map_err(duplicate_user),
    }
}

pub async fn register_user(state: &AppState, input: &RegisterRequest) -> Result<User, ApiError> {
    let mut errors = Vec::new();
    let name = input
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);
    if name.is_none() {
        errors.push(FieldError::new("name", "Name is required"));
    }
    let email = check_email(&input.email, &mut errors);
    let password = check_password("password", &input.password, &mut errors);
    let age = check_age(input.age, &mut errors);
    let date_of_birth = check_date_of_birth(&input.date_of_birth, &mut errors);

    let (Some(name), Some(email), Some(password)) = (name, email, password) else {
        return Err(ApiError::Validation(errors));
    };
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    if state.users.find_by_email(&email).await?.is_some() {
        return Err(ApiError::BadRequest("User already exists".into()));
    }

    let user = User {
        id: ObjectId::new(),
        name,
        username: derive_username(&email),
        email,
        password_hash: hash_password(password, state.config.bcrypt_cost)?,
        age,
        date_of_birth,
        profile_image: None,
        created_at: BsonDateTime::now(),
    };
    insert_new_user(state, user).await
}

/// Returns the access token and the user it was issued for. Unknown email and
/// wrong password are indistinguishable.
pub async fn login_user(state: &AppState, input: &LoginRequest) -> Result<(String, User), ApiError> {
    let invalid = || ApiError::BadRequest("Invalid credentials".into());
    let email = normalize_email(&input.email).ok_or_else(invalid)?;
    let password = input.password.as_deref().ok_or_else(invalid)?;

    let user = state.users.find_by_email(&email).await?.ok_or_else(invalid)?;
    if !verify_password(password, &user.password_hash)? {
        return Err(invalid());
    }
    let token = create_jwt(
        &user.id,
        TokenPurpose::Access,
        state.config.jwt_ttl_minutes,
        &state.config.jwt_secret,
    )?;
    Ok((token, user))
}

pub async fn request_password_reset(
    state: &AppState,
    input: &ForgotPasswordRequest,
) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    let email = check_email(&input.email, &mut errors).ok_or(ApiError::Validation(errors))?;
    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::BadRequest("User not found".into()))?;

    let token = create_jwt(
        &user.id,
        TokenPurpose::PasswordReset,
        state.config.reset_ttl_minutes,
        &state.config.jwt_secret,
    )?;
    let link = format!("{}reset-password/{}", state.config.frontend_url, token);
    state.mailer.send_password_reset(&user.email, &link).await?;
    Ok(())
}

pub async fn reset_password(state: &AppState, input: &ResetPasswordRequest) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    let token = input.token.as_deref().map(str::trim).filter(|t| !t.is_empty());
    if token.is_none() {
        errors.push(FieldError::new("token", "Reset token is required"));
    }
    let password = check_password("password", &input.password, &mut errors);
    let (Some(token), Some(password)) = (token, password) else {
        return Err(ApiError::Validation(errors));
    };

    let claims = validate_jwt(token, &state.config.jwt_secret, TokenPurpose::PasswordReset)?;
    let user_id = subject(&claims)?;
    let hashed = hash_password(password, state.config.bcrypt_cost)?;
    if !state.users.set_password(user_id, &hashed).await? {
        return Err(ApiError::BadRequest("User not found".into()));
    }
    Ok(())
}

pub async fn change_password(
    state: &AppState,
    user: &User,
    input: &ChangePasswordRequest,
) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    let old_password = input.old_password.as_deref().filter(|p| !p.is_empty());
    if old_password.is_none() {
        errors.push(FieldError::new("oldPassword", "Old password is required"));
    }
    let new_password = check_password("newPassword", &input.new_password, &mut errors);
    let (Some(old_password), Some(new_password)) = (old_password, new_password) else {
        return Err(ApiError::Validation(errors));
    };

    if !verify_password(old_password, &user.password_hash)? {
        return Err(ApiError::BadRequest("Incorrect old password".into()));
    }
    let hashed = hash_password(new_password, state.config.bcrypt_cost)?;
    if !state.users.set_password(user.id, &hashed).await? {
        return Err(ApiError::NotFound("User not found".into()));
    }
    Ok(())
}

pub fn validate_profile(input: &UpdateProfileRequest) -> Result<ProfileChanges, ApiError> {
    let mut errors = Vec::new();
    let mut changes = ProfileChanges::default();

    if let Some(name) = input.name.as_deref() {
        let name = name.trim();
        if name.is_empty() {
            errors.push(FieldError::new("name", "Name cannot be empty"));
        } else {
            changes.name = Some(name.to_string());
        }
    }
    changes.age = check_age(input.age, &mut errors);
    changes.date_of_birth = check_date_of_birth(&input.date_of_birth, &mut errors);
    if let Some(image) = input.profile_image.as_deref() {
        let image = image.trim();
        if image.is_empty() {
            errors.push(FieldError::new("profileImage", "Profile image cannot be empty"));
        } else {
            changes.profile_image = Some(image.to_string());
        }
    }

    if errors.is_empty() && changes.is_empty() {
        errors.push(FieldError::new("body", "No fields to update"));
    }
    if errors.is_empty() {
        Ok(changes)
    } else {
        Err(ApiError::Validation(errors))
    }
}

pub async fn update_profile(
    state: &AppState,
    user: &User,
    input: &UpdateProfileRequest,
) -> Result<User, ApiError> {
    let changes = validate_profile(input)?;
    state
        .users
        .update_profile(user.id, &changes)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))
}

/// POST /register
pub async fn register(
    data: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = register_user(&data, &payload).await?;
    info!("User registered: {} ({})", user.id, user.username);
    Ok(HttpResponse::Created().json(json!({ "message": "User registered successfully" })))
}

/// POST /login
pub async fn login(
    data: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    match login_user(&data, &payload).await {
        Ok((token, user)) => {
            info!("User logged in: {}", user.id);
            Ok(HttpResponse::Ok().json(json!({
                "token": token,
                "user": { "id": user.id.to_hex(), "name": user.name },
            })))
        }
        Err(e) => {
            warn!("Failed login attempt");
            Err(e)
        }
    }
}

/// POST /forgotpassword
pub async fn forgot_password(
    data: web::Data<AppState>,
    payload: web::Json<ForgotPasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    request_password_reset(&data, &payload).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Password reset email sent" })))
}

/// PUT /resetpassword
pub async fn reset_password_handler(
    data: web::Data<AppState>,
    payload: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    reset_password(&data, &payload).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Password reset successfully" })))
}

/// PUT /changepassword
pub async fn change_password_handler(
    data: web::Data<AppState>,
    AuthUser(user): AuthUser,
    payload: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    change_password(&data, &user, &payload).await?;
    info!("Password changed for {}", user.id);
    Ok(HttpResponse::Ok().json(json!({ "message": "Password changed successfully" })))
}

/// GET /profile
pub async fn get_profile(AuthUser(user): AuthUser) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(json!({ "user": PublicUser::from(&user) })))
}

/// PUT /profile
pub async fn update_profile_handler(
    data: web::Data<AppState>,
    AuthUser(user): AuthUser,
    payload: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    let updated = update_profile(&data, &user, &payload).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Profile updated successfully",
        "user": PublicUser::from(&updated),
    })))
}
