use crate::config::SecurityConfig;
use crate::db::models::{AuthToken, User, UserRole};
use crate::error::Error;
use anyhow::Result;
use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub mod auth;
pub mod password;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// User name
    pub name: String,
    /// User role
    pub role: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

impl Claims {
    /// Get the user ID from the claims
    pub fn user_id(&self) -> Result<uuid::Uuid, uuid::Error> {
        uuid::Uuid::parse_str(&self.sub)
    }
}

/// Issues and checks the session tokens that guard the API and alert socket
pub struct SecurityService {
    config: SecurityConfig,
}

impl SecurityService {
    pub fn new(config: SecurityConfig) -> Self {
        Self { config }
    }

    /// Whether the alert socket needs a token
    pub fn require_ws_auth(&self) -> bool {
        self.config.require_ws_auth
    }

    /// Generate a JWT token for a user
    pub fn generate_token(&self, user: &User) -> Result<AuthToken> {
        let now = Utc::now();
        let expiration = now + Duration::minutes(self.config.jwt_expiration_minutes as i64);

        let claims = Claims {
            sub: user.id.to_string(),
            name: user.username.clone(),
            role: role_name(&user.role).to_string(),
            exp: expiration.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| Error::Authentication(format!("Failed to generate JWT token: {}", e)))?;

        Ok(AuthToken {
            access_token: token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.jwt_expiration_minutes * 60,
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| Error::Authentication(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }

    /// Validate the bearer token in an `Authorization` header
    pub fn authorize_headers(&self, headers: &HeaderMap) -> Result<Claims> {
        let token = bearer_token(headers)
            .ok_or_else(|| Error::Authentication("Missing bearer token".to_string()))?;
        self.validate_token(token)
    }

    /// Validate a token from a query parameter, falling back to the
    /// `Authorization` header. Browsers cannot set headers on WebSocket
    /// handshakes, so the alert socket accepts `?token=`.
    pub fn authorize_subscriber(&self, query_token: Option<&str>, headers: &HeaderMap) -> Result<Claims> {
        match query_token {
            Some(token) => self.validate_token(token),
            None => self.authorize_headers(headers),
        }
    }
}

fn role_name(role: &UserRole) -> &'static str {
    match role {
        UserRole::Admin => "admin",
        UserRole::Operator => "operator",
        UserRole::Viewer => "viewer",
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}
