use crate::config::IngestConfig;
use crate::db::models::{Alert, CameraLog, NewCameraLog};
use crate::db::store::AlertStore;
use crate::detection::{AlertPayload, DecisionPolicy, FuzzyError};
use crate::messaging::{AlertBroadcaster, AlertNotification};
use crate::services::snapshot::SnapshotStore;
use chrono::Timelike;
use log::{error, info, warn};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Failures surfaced to the ingestion caller
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    InvalidMetrics(#[from] FuzzyError),

    #[error("invalid form data: {0}")]
    InvalidForm(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Result of one ingestion call
#[derive(Debug)]
pub enum IngestOutcome {
    /// Alert and camera log stored; `delivered` subscribers were notified
    Raised {
        alert: Alert,
        log: CameraLog,
        delivered: usize,
    },
    /// The decision policy raised no alert
    Skipped,
}

/// Alert ingestion pipeline: decide, store, broadcast
pub struct AlertIngestService {
    store: Arc<dyn AlertStore>,
    broadcaster: Arc<dyn AlertBroadcaster>,
    snapshots: SnapshotStore,
    policy: DecisionPolicy,
    default_camera_id: String,
}

impl AlertIngestService {
    pub fn new(
        store: Arc<dyn AlertStore>,
        broadcaster: Arc<dyn AlertBroadcaster>,
        config: &IngestConfig,
    ) -> Self {
        Self {
            store,
            broadcaster,
            snapshots: SnapshotStore::from_config(config),
            policy: DecisionPolicy::from_config(config),
            default_camera_id: config.default_camera_id.clone(),
        }
    }

    pub fn policy(&self) -> DecisionPolicy {
        self.policy
    }

    /// Decode a request body. Anything but a JSON object is rejected.
    pub fn parse_payload(body: &[u8]) -> Result<AlertPayload, IngestError> {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(object)) => Ok(AlertPayload::from_object(object)),
            Ok(other) => Err(IngestError::InvalidPayload(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
            Err(e) => Err(IngestError::InvalidPayload(e.to_string())),
        }
    }

    /// Ingest a raw request body using the current local hour
    pub async fn ingest(&self, body: &[u8]) -> Result<IngestOutcome, IngestError> {
        let hour = chrono::Local::now().hour() as f64;
        self.ingest_at(body, hour).await
    }

    /// Ingest a raw request body as if it arrived at `hour`
    pub async fn ingest_at(&self, body: &[u8], hour: f64) -> Result<IngestOutcome, IngestError> {
        let payload = Self::parse_payload(body)?;
        self.ingest_payload_at(payload, hour).await
    }

    /// Ingest an already decoded payload using the current local hour
    pub async fn ingest_payload(&self, payload: AlertPayload) -> Result<IngestOutcome, IngestError> {
        let hour = chrono::Local::now().hour() as f64;
        self.ingest_payload_at(payload, hour).await
    }

    /// Decide, store and broadcast one payload as if it arrived at `hour`
    pub async fn ingest_payload_at(
        &self,
        payload: AlertPayload,
        hour: f64,
    ) -> Result<IngestOutcome, IngestError> {
        let Some(mut draft) = self.policy.decide(&payload, hour)? else {
            info!("No alert raised for payload under {:?} policy", self.policy);
            return Ok(IngestOutcome::Skipped);
        };

        // An uploaded file takes precedence over a caller supplied reference
        let stored_snapshot = match &payload.snapshot {
            Some(snapshot) => {
                let stored = self.snapshots.save(snapshot).await.map_err(|e| {
                    error!("Failed to store snapshot: {:#}", e);
                    IngestError::Snapshot(e.to_string())
                })?;
                draft.image = Some(stored.url.clone());
                Some(stored)
            }
            None => {
                draft.image = payload.image.clone();
                None
            }
        };

        let camera_id = payload
            .camera_id
            .clone()
            .unwrap_or_else(|| self.default_camera_id.clone());
        let mut camera_log = NewCameraLog::from_metrics(camera_id, &draft.metrics);
        camera_log.alert_triggered = true;

        let stored = self
            .store
            .create_alert_with_log(draft, camera_log)
            .await;
        let (alert, log) = match stored {
            Ok(rows) => rows,
            Err(e) => {
                error!("Failed to store alert: {:#}", e);
                if let Some(snapshot) = &stored_snapshot {
                    self.snapshots.discard(snapshot).await;
                }
                return Err(IngestError::Storage(e.to_string()));
            }
        };

        info!(
            "Alert {} stored ({}, {}) with camera log {}",
            alert.id, alert.alert_type, alert.severity, log.id
        );

        let notification = AlertNotification::from_alert(&alert);
        let delivered = match self.broadcaster.broadcast_alert(&notification).await {
            Ok(count) => count,
            Err(e) => {
                warn!("Failed to broadcast alert {}: {:#}", alert.id, e);
                0
            }
        };

        Ok(IngestOutcome::Raised {
            alert,
            log,
            delivered,
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
