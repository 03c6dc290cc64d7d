use crate::db::models::{Alert, CameraLog, NewAlert, NewCameraLog};
use crate::db::store::AlertStore;
use crate::error::Error;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::debug;

const ALERT_COLUMNS: &str = "id, message, timestamp, severity, alert_type, metrics, image, \
     resolved, resolution_time, resolution_notes";

const LOG_COLUMNS: &str = "id, camera_id, alert_id, timestamp, emotion_data, violence_data, \
     camera_status, sustained_movement_duration, camera_coverage_percentage, alert_triggered";

/// Alerts repository backed by PostgreSQL
#[derive(Clone)]
pub struct AlertsRepository {
    pool: Arc<PgPool>,
}

impl AlertsRepository {
    /// Create a new alerts repository
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertStore for AlertsRepository {
    async fn create_alert_with_log(
        &self,
        alert: NewAlert,
        log: NewCameraLog,
    ) -> Result<(Alert, CameraLog)> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let message = alert.stored_message().to_string();
        let NewAlert {
            severity,
            alert_type,
            metrics,
            image,
            ..
        } = alert;

        let created = sqlx::query_as::<_, Alert>(&format!(
            r#"
            INSERT INTO alerts (message, severity, alert_type, metrics, image)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            ALERT_COLUMNS
        ))
        .bind(message)
        .bind(severity.as_str())
        .bind(alert_type.as_str())
        .bind(Value::Object(metrics))
        .bind(image)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to create alert: {}", e)))?;

        let created_log = sqlx::query_as::<_, CameraLog>(&format!(
            r#"
            INSERT INTO camera_logs (
                camera_id, alert_id, emotion_data, violence_data, camera_status,
                sustained_movement_duration, camera_coverage_percentage, alert_triggered
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            LOG_COLUMNS
        ))
        .bind(&log.camera_id)
        .bind(created.id)
        .bind(Value::Object(log.emotion_data))
        .bind(Value::Object(log.violence_data))
        .bind(&log.camera_status)
        .bind(log.sustained_movement_duration)
        .bind(log.camera_coverage_percentage)
        .bind(log.alert_triggered)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to create camera log: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit alert: {}", e)))?;

        debug!("Stored alert {} with camera log {}", created.id, created_log.id);

        Ok((created, created_log))
    }

    async fn list_alerts(&self, limit: i64) -> Result<Vec<Alert>> {
        let result = sqlx::query_as::<_, Alert>(&format!(
            r#"
            SELECT {}
            FROM alerts
            ORDER BY timestamp DESC, id DESC
            LIMIT $1
            "#,
            ALERT_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to list alerts: {}", e)))?;

        Ok(result)
    }

    async fn get_alert(&self, id: i64) -> Result<Option<Alert>> {
        let result = sqlx::query_as::<_, Alert>(&format!(
            r#"
            SELECT {}
            FROM alerts
            WHERE id = $1
            "#,
            ALERT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get alert by ID: {}", e)))?;

        Ok(result)
    }

    async fn logs_for_alert(&self, alert_id: i64) -> Result<Vec<CameraLog>> {
        let result = sqlx::query_as::<_, CameraLog>(&format!(
            r#"
            SELECT {}
            FROM camera_logs
            WHERE alert_id = $1
            ORDER BY id
            "#,
            LOG_COLUMNS
        ))
        .bind(alert_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get camera logs for alert: {}", e)))?;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations;
    use crate::db::models::{AlertType, Severity};
    use serde_json::json;
    use sqlx::postgres::PgPoolOptions;

    // Needs a scratch database: TEST_DATABASE_URL=postgres://...
    #[tokio::test]
    async fn test_create_alert_with_log() -> Result<()> {
        let url = match std::env::var("TEST_DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                println!("Skipping PostgreSQL test. Set TEST_DATABASE_URL to run.");
                return Ok(());
            }
        };

        let pool = PgPoolOptions::new().max_connections(2).connect(&url).await?;
        migrations::run_migrations(&pool).await?;
        let repo = AlertsRepository::new(Arc::new(pool));

        let metrics = json!({"fighting": 0.9}).as_object().cloned().unwrap();
        let alert = NewAlert::new(AlertType::Fighting, "m", Severity::High).with_metrics(metrics.clone());
        let log = NewCameraLog::from_metrics("Camera_1", &metrics);

        let (alert, log) = repo.create_alert_with_log(alert, log).await?;
        assert_eq!(alert.alert_type, AlertType::Fighting);
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.metrics, json!({"fighting": 0.9}));
        assert_eq!(log.alert_id, Some(alert.id));
        assert_eq!(log.violence_data["fighting"], json!(0.9));

        let fetched = repo.get_alert(alert.id).await?.expect("alert stored");
        assert_eq!(fetched.message, "m");
        assert_eq!(repo.logs_for_alert(alert.id).await?.len(), 1);

        // Caller-supplied labels are free text of any length
        let long_type = "t".repeat(120);
        let alert = NewAlert::new(AlertType::from(long_type.clone()), "m", Severity::from("s".repeat(80)))
            .with_image(Some("/media/crime_snapshots/x.jpg".to_string()));
        let log = NewCameraLog::new("c".repeat(150));
        let (alert, log) = repo.create_alert_with_log(alert, log).await?;
        assert_eq!(alert.alert_type.as_str(), long_type);
        assert_eq!(alert.image.as_deref(), Some("/media/crime_snapshots/x.jpg"));
        assert_eq!(log.camera_id.chars().count(), 150);

        Ok(())
    }
}
