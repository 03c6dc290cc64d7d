use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

use crate::utils::truncate_chars;

/// Maximum stored length of an alert message, in characters
pub const MAX_MESSAGE_LEN: usize = 255;

/// Alert category. Known kinds map to fixed names; anything else the caller
/// sends is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlertType {
    Fighting,
    Vandalism,
    Assault,
    CameraInterference,
    #[default]
    SuspiciousBehavior,
    SustainedMovement,
    CameraCovered,
    CompleteDarkness,
    Emergency,
    Other(String),
}

impl AlertType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Fighting => "fighting",
            Self::Vandalism => "vandalism",
            Self::Assault => "assault",
            Self::CameraInterference => "camera_interference",
            Self::SuspiciousBehavior => "suspicious_behavior",
            Self::SustainedMovement => "sustained_movement",
            Self::CameraCovered => "camera_covered",
            Self::CompleteDarkness => "complete_darkness",
            Self::Emergency => "emergency",
            Self::Other(name) => name,
        }
    }

    /// Human-readable label
    pub fn label(&self) -> String {
        match self {
            Self::Fighting => "Fighting".to_string(),
            Self::Vandalism => "Vandalism".to_string(),
            Self::Assault => "Assault".to_string(),
            Self::CameraInterference => "Camera Interference".to_string(),
            Self::SuspiciousBehavior => "Suspicious Behavior".to_string(),
            Self::SustainedMovement => "Sustained Movement".to_string(),
            Self::CameraCovered => "Camera Covered".to_string(),
            Self::CompleteDarkness => "Complete Darkness".to_string(),
            Self::Emergency => "Emergency".to_string(),
            Self::Other(name) => name.clone(),
        }
    }
}

impl From<String> for AlertType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "fighting" => Self::Fighting,
            "vandalism" => Self::Vandalism,
            "assault" => Self::Assault,
            "camera_interference" => Self::CameraInterference,
            "suspicious_behavior" => Self::SuspiciousBehavior,
            "sustained_movement" => Self::SustainedMovement,
            "camera_covered" => Self::CameraCovered,
            "complete_darkness" => Self::CompleteDarkness,
            "emergency" => Self::Emergency,
            _ => Self::Other(value),
        }
    }
}

impl From<AlertType> for String {
    fn from(value: AlertType) -> Self {
        value.as_str().to_string()
    }
}

impl Display for AlertType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity. Same open-set treatment as [`AlertType`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
    Other(String),
}

impl Severity {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        match value.as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Other(value),
        }
    }
}

impl From<Severity> for String {
    fn from(value: Severity) -> Self {
        value.as_str().to_string()
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Alert {
    pub id: i64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub severity: Severity,
    #[sqlx(try_from = "String")]
    pub alert_type: AlertType,
    pub metrics: Value,
    pub image: Option<String>,
    pub resolved: bool,
    pub resolution_time: Option<DateTime<Utc>>,
    pub resolution_notes: String,
}

/// Alert to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub message: String,
    pub severity: Severity,
    pub alert_type: AlertType,
    pub metrics: Map<String, Value>,
    pub image: Option<String>,
}

impl NewAlert {
    pub fn new(alert_type: AlertType, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
            alert_type,
            metrics: Map::new(),
            image: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Map<String, Value>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Attach a snapshot path or URL
    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }

    /// Message as it will be stored
    pub fn stored_message(&self) -> &str {
        truncate_chars(&self.message, MAX_MESSAGE_LEN)
    }
}

/// Coerce an optional JSON value into an object, falling back to empty
pub fn normalize_map(value: Option<Value>) -> Map<String, Value> {
    match value {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}
