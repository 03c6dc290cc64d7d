use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metric keys copied into `emotion_data`
pub const EMOTION_KEYS: [&str; 3] = ["anger", "fear", "stress"];

/// Metric keys copied into `violence_data`
pub const VIOLENCE_KEYS: [&str; 4] = ["fighting", "vandalism", "assault", "quickMovements"];

/// Per-camera sensor snapshot stored alongside an alert
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CameraLog {
    pub id: i64,
    pub camera_id: String,
    pub alert_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub emotion_data: Value,
    pub violence_data: Value,
    pub camera_status: String,
    pub sustained_movement_duration: i32,
    pub camera_coverage_percentage: f64,
    pub alert_triggered: bool,
}

/// Camera log to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewCameraLog {
    pub camera_id: String,
    pub emotion_data: Map<String, Value>,
    pub violence_data: Map<String, Value>,
    pub camera_status: String,
    pub sustained_movement_duration: i32,
    pub camera_coverage_percentage: f64,
    pub alert_triggered: bool,
}

impl NewCameraLog {
    /// Empty log for a camera with every auxiliary field at its default
    pub fn new(camera_id: impl Into<String>) -> Self {
        Self {
            camera_id: camera_id.into(),
            emotion_data: Map::new(),
            violence_data: Map::new(),
            camera_status: "active".to_string(),
            sustained_movement_duration: 0,
            camera_coverage_percentage: 0.0,
            alert_triggered: false,
        }
    }

    /// Build a log from an alert's metrics map
    pub fn from_metrics(camera_id: impl Into<String>, metrics: &Map<String, Value>) -> Self {
        let mut log = Self::new(camera_id);
        log.emotion_data = pick(metrics, &EMOTION_KEYS);
        log.violence_data = pick(metrics, &VIOLENCE_KEYS);

        if let Some(duration) = metrics.get("sustainedMovementDuration").and_then(Value::as_f64) {
            log.sustained_movement_duration = duration.round().clamp(0.0, i32::MAX as f64) as i32;
        }
        if let Some(covered) = metrics.get("cameraCovered").and_then(Value::as_f64) {
            log.camera_coverage_percentage = (covered * 100.0).clamp(0.0, 100.0);
        }

        log
    }
}

fn pick(metrics: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|key| metrics.get(*key).map(|v| (key.to_string(), v.clone())))
        .collect()
}
