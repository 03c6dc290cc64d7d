use crate::{
    db::models::{User, UserRole},
    error::Error,
};
use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, created_at, updated_at, last_login, active";

/// Users repository for dashboard accounts
#[derive(Clone)]
pub struct UsersRepository {
    pool: Arc<PgPool>,
}

impl UsersRepository {
    /// Create a new users repository
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Insert a new active account
    pub async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: UserRole,
    ) -> Result<User> {
        info!("Creating new user: {}", username);

        let now = Utc::now();
        let result = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, role, created_at, updated_at, active)
            VALUES ($1, $2, $3, $4, $5, $6, $6, TRUE)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .bind(now)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create user: {}", e)))?;

        Ok(result)
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        let result = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get user by ID: {}", e)))?;

        Ok(result)
    }

    /// Get user by username
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let result = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get user by username: {}", e)))?;

        Ok(result)
    }

    /// Which of `username` / `email` is already taken, if any
    pub async fn find_conflict(&self, username: &str, email: &str) -> Result<Option<&'static str>> {
        // Aggregates over zero rows come back as NULL
        let (username_taken, email_taken): (Option<bool>, Option<bool>) = sqlx::query_as(
            r#"
            SELECT bool_or(username = $1), bool_or(email = $2)
            FROM users
            WHERE username = $1 OR email = $2
            "#,
        )
        .bind(username)
        .bind(email)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to check existing users: {}", e)))?;

        Ok(if username_taken.unwrap_or(false) {
            Some("Username")
        } else if email_taken.unwrap_or(false) {
            Some("Email")
        } else {
            None
        })
    }

    /// Update last login time
    pub async fn update_last_login(&self, id: &Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to update last login: {}", e)))?;

        Ok(())
    }
}
