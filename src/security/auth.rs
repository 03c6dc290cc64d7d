use crate::config::SecurityConfig;
use crate::db::models::{AuthToken, LoginCredentials, Registration, User, UserRole};
use crate::db::repositories::UsersRepository;
use crate::error::Error;
use crate::security::{password, Claims, SecurityService};
use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

/// Account registration and login
pub struct AuthService {
    users_repo: UsersRepository,
    security: Arc<SecurityService>,
    config: SecurityConfig,
}

impl AuthService {
    pub fn new(pool: Arc<PgPool>, security: Arc<SecurityService>, config: &SecurityConfig) -> Self {
        Self {
            users_repo: UsersRepository::new(pool),
            security,
            config: config.clone(),
        }
    }

    /// Login a user with username/password
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<(User, AuthToken)> {
        let user = self
            .users_repo
            .get_by_username(&credentials.username)
            .await?
            .ok_or_else(|| Error::Authentication("Invalid username or password".to_string()))?;

        if !user.active {
            return Err(Error::Authentication("User account is inactive".to_string()).into());
        }

        if !password::verify_password(&credentials.password, &user.password_hash)? {
            return Err(Error::Authentication("Invalid username or password".to_string()).into());
        }

        self.users_repo.update_last_login(&user.id).await?;
        let token = self.security.generate_token(&user)?;

        info!("User logged in: {}", user.username);

        Ok((user, token))
    }

    /// Resolve the account behind a validated token
    pub async fn current_user(&self, claims: &Claims) -> Result<User> {
        let id = claims
            .user_id()
            .map_err(|_| Error::Authentication("Malformed token subject".to_string()))?;

        let user = self
            .users_repo
            .get_by_id(&id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("User not found: {}", id)))?;

        if !user.active {
            return Err(Error::Authentication("User account is inactive".to_string()).into());
        }

        Ok(user)
    }

    /// Register a new viewer account
    pub async fn register(&self, registration: &Registration) -> Result<User> {
        let username = registration.username.trim();
        let email = registration.email.trim();
        if username.is_empty() || email.is_empty() {
            return Err(Error::InvalidInput("Username and email are required".to_string()).into());
        }
        password::check_password_strength(&registration.password)?;

        if let Some(field) = self.users_repo.find_conflict(username, email).await? {
            return Err(Error::AlreadyExists(format!("{} already exists", field)).into());
        }

        let password_hash = password::hash_password(&registration.password, &self.config)?;
        let user = self
            .users_repo
            .create(username, email, &password_hash, UserRole::Viewer)
            .await?;

        info!("New user registered: {}", username);

        Ok(user)
    }
}
