use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderMap, AUTHORIZATION},
    web, Error, FromRequest, HttpMessage, HttpRequest,
};
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use futures::future::{ok, ready, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, warn};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::User;

/// What a token may be used for. A reset link is not a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Access,
    PasswordReset,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Hex ObjectId of the user.
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
    pub purpose: TokenPurpose,
}

// JWT Creation
pub fn create_jwt(
    user_id: &ObjectId,
    purpose: TokenPurpose,
    ttl_minutes: i64,
    secret: &str,
) -> Result<String, ApiError> {
    let now = Utc::now();
    let expiration = now + Duration::minutes(ttl_minutes);
    let claims = Claims {
        sub: user_id.to_hex(),
        iat: now.timestamp() as usize,
        exp: expiration.timestamp().max(0) as usize,
        purpose,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))
        .map_err(|e| ApiError::Server(format!("jwt encode: {}", e)))
}

// JWT Validation
pub fn validate_jwt(token: &str, secret: &str, purpose: TokenPurpose) -> Result<Claims, ApiError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .map_err(|e| {
        debug!("Token rejected: {}", e);
        ApiError::InvalidCredential
    })?;
    if token_data.claims.purpose != purpose {
        debug!("Token purpose {:?} used where {:?} required", token_data.claims.purpose, purpose);
        return Err(ApiError::InvalidCredential);
    }
    Ok(token_data.claims)
}

/// User id carried by a verified token.
pub fn subject(claims: &Claims) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(&claims.sub).map_err(|_| ApiError::InvalidCredential)
}

pub fn hash_password(plain: &str, cost: u32) -> Result<String, ApiError> {
    Ok(hash(plain, cost)?)
}

pub fn verify_password(plain: &str, hashed: &str) -> Result<bool, ApiError> {
    Ok(verify(plain, hashed)?)
}

/// Token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let missing = || ApiError::Unauthenticated("No token provided".into());
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(missing)?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .ok_or_else(missing)?;
    if token.is_empty() {
        return Err(missing());
    }
    Ok(token)
}

/// Verifies the bearer token and loads the user it names. Nothing else is
/// read before this succeeds.
pub async fn resolve_principal(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let token = bearer_token(headers)?;
    let claims = validate_jwt(token, &state.config.jwt_secret, TokenPurpose::Access)?;
    let user_id = subject(&claims)?;
    state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthenticated("Unauthorized".into()))
}

/// Identity gate for protected resources. Attaches the loaded `User` to the
/// request, or answers 401 without calling the wrapped service.
#[derive(Debug)]
pub struct Authentication;

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware {
            service: Rc::new(service),
        })
    }
}

pub struct AuthMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let outcome = match req.app_data::<web::Data<AppState>>().cloned() {
                Some(state) => resolve_principal(&state, req.headers()).await,
                None => Err(ApiError::Server("application state not registered".into())),
            };

            match outcome {
                Ok(user) => {
                    req.extensions_mut().insert(user);
                    let res = service.call(req).await?;
                    Ok(res.map_into_boxed_body())
                }
                Err(e) => {
                    warn!("Rejected {} {}: {}", req.method(), req.path(), e);
                    Ok(req.error_response(e))
                }
            }
        })
    }
}

/// The principal attached by `Authentication`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<User>()
                .cloned()
                .map(AuthUser)
                .ok_or_else(|| ApiError::Unauthenticated("Unauthorized".into())),
        )
    }
}
