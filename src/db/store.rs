use crate::db::models::{Alert, CameraLog, NewAlert, NewCameraLog};
use crate::error::Error;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;

/// Durable record of alerts and their camera logs
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Insert an alert and its camera log atomically. The log is linked to
    /// the new alert through `alert_id`.
    async fn create_alert_with_log(
        &self,
        alert: NewAlert,
        log: NewCameraLog,
    ) -> Result<(Alert, CameraLog)>;

    /// Most recent alerts first
    async fn list_alerts(&self, limit: i64) -> Result<Vec<Alert>>;

    /// Get alert by ID
    async fn get_alert(&self, id: i64) -> Result<Option<Alert>>;

    /// Camera logs written together with an alert
    async fn logs_for_alert(&self, alert_id: i64) -> Result<Vec<CameraLog>>;
}

#[derive(Default)]
struct MemoryState {
    alerts: Vec<Alert>,
    logs: Vec<CameraLog>,
    fail_next: Option<String>,
}

/// In-process store, used by tests and for running without PostgreSQL
#[derive(Default)]
pub struct MemoryAlertStore {
    state: Mutex<MemoryState>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next write fail with a database error
    pub async fn fail_next_write(&self, reason: impl Into<String>) {
        self.state.lock().await.fail_next = Some(reason.into());
    }

    pub async fn alert_count(&self) -> usize {
        self.state.lock().await.alerts.len()
    }

    pub async fn log_count(&self) -> usize {
        self.state.lock().await.logs.len()
    }
}

#[async_trait]
impl AlertStore for MemoryAlertStore {
    async fn create_alert_with_log(
        &self,
        alert: NewAlert,
        log: NewCameraLog,
    ) -> Result<(Alert, CameraLog)> {
        let mut state = self.state.lock().await;

        if let Some(reason) = state.fail_next.take() {
            return Err(Error::Database(format!("Failed to create alert: {}", reason)).into());
        }

        let now = Utc::now();
        let alert = Alert {
            id: state.alerts.len() as i64 + 1,
            message: alert.stored_message().to_string(),
            timestamp: now,
            severity: alert.severity,
            alert_type: alert.alert_type,
            metrics: Value::Object(alert.metrics),
            image: alert.image,
            resolved: false,
            resolution_time: None,
            resolution_notes: String::new(),
        };
        let log = CameraLog {
            id: state.logs.len() as i64 + 1,
            camera_id: log.camera_id,
            alert_id: Some(alert.id),
            timestamp: now,
            emotion_data: Value::Object(log.emotion_data),
            violence_data: Value::Object(log.violence_data),
            camera_status: log.camera_status,
            sustained_movement_duration: log.sustained_movement_duration,
            camera_coverage_percentage: log.camera_coverage_percentage,
            alert_triggered: log.alert_triggered,
        };

        state.alerts.push(alert.clone());
        state.logs.push(log.clone());

        Ok((alert, log))
    }

    async fn list_alerts(&self, limit: i64) -> Result<Vec<Alert>> {
        let state = self.state.lock().await;
        Ok(state
            .alerts
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn get_alert(&self, id: i64) -> Result<Option<Alert>> {
        let state = self.state.lock().await;
        Ok(state.alerts.iter().find(|a| a.id == id).cloned())
    }

    async fn logs_for_alert(&self, alert_id: i64) -> Result<Vec<CameraLog>> {
        let state = self.state.lock().await;
        Ok(state
            .logs
            .iter()
            .filter(|l| l.alert_id == Some(alert_id))
            .cloned()
            .collect())
    }
}
