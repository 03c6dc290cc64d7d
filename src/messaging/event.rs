use crate::db::models::Alert;
use serde::{Deserialize, Serialize};

/// Format used for timestamps pushed to dashboards
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Alert notification delivered to every subscriber of the alerts group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertNotification {
    pub message: String,
    pub alert_type: String,
    /// `YYYY-MM-DD HH:MM:SS`, UTC
    pub timestamp: String,
    pub image_url: Option<String>,
    pub severity: String,
}

impl AlertNotification {
    /// Build the notification for a stored alert
    pub fn from_alert(alert: &Alert) -> Self {
        Self {
            message: alert.message.clone(),
            alert_type: alert.alert_type.to_string(),
            timestamp: alert.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            image_url: alert.image.clone(),
            severity: alert.severity.to_string(),
        }
    }
}
