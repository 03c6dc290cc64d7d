use crate::api::rest::ApiResult;
use crate::db::models::{AuthToken, LoginCredentials, Registration, User};
use crate::security::auth::AuthService;
use crate::security::SecurityService;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: User,
    pub token: AuthToken,
}

pub async fn register(
    State(auth): State<Arc<AuthService>>,
    Json(registration): Json<Registration>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = auth.register(&registration).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(auth): State<Arc<AuthService>>,
    Json(credentials): Json<LoginCredentials>,
) -> ApiResult<Json<LoginResponse>> {
    let (user, token) = auth.login(&credentials).await?;
    Ok(Json(LoginResponse { user, token }))
}

pub async fn current_user(
    State(auth): State<Arc<AuthService>>,
    State(security): State<Arc<SecurityService>>,
    headers: HeaderMap,
) -> ApiResult<Json<User>> {
    let claims = security.authorize_headers(&headers)?;
    let user = auth.current_user(&claims).await?;
    Ok(Json(user))
}
