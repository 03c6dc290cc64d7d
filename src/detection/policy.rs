use crate::config::{IngestConfig, PolicyKind};
use crate::db::models::{normalize_map, AlertType, NewAlert, Severity};
use crate::detection::fuzzy::{evaluate_crime_likelihood, FuzzyError, FuzzyInputs};
use serde_json::{Map, Value};

pub const DEFAULT_MESSAGE: &str = "Unknown alert";

/// Violence signals checked by the threshold policy, in priority order
const VIOLENCE_SIGNALS: [(&str, AlertType); 3] = [
    ("fighting", AlertType::Fighting),
    ("vandalism", AlertType::Vandalism),
    ("assault", AlertType::Assault),
];
const VIOLENCE_THRESHOLD: f64 = 0.6;
const CAMERA_BLOCKED_THRESHOLD: f64 = 0.8;

/// Form fields carrying single readings, and the metric each one fills
const FORM_SCORE_FIELDS: [(&str, &str); 5] = [
    ("anger_score", "anger"),
    ("fear_score", "fear"),
    ("stress_score", "stress"),
    ("sound_intensity", "sound"),
    ("crowd_density", "crowd"),
];

/// Image uploaded alongside a form submission
#[derive(Clone, Default, PartialEq)]
pub struct Snapshot {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("len", &self.data.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Parsed ingestion payload. Fields of the wrong JSON type are treated as
/// absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertPayload {
    pub alert_type: Option<String>,
    pub message: Option<String>,
    pub severity: Option<String>,
    pub metrics: Map<String, Value>,
    pub camera_id: Option<String>,
    /// Existing image path or URL supplied by the caller
    pub image: Option<String>,
    pub snapshot: Option<Snapshot>,
}

impl AlertPayload {
    /// Build from a decoded JSON object
    pub fn from_object(mut object: Map<String, Value>) -> Self {
        let mut text = |key: &str| match object.remove(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };

        Self {
            alert_type: text("alert_type"),
            message: text("message"),
            severity: text("severity"),
            camera_id: text("camera_id"),
            image: text("image"),
            metrics: normalize_map(object.remove("metrics")),
            snapshot: None,
        }
    }

    /// Build from form fields. `metrics` may hold a JSON object; the
    /// `*_score`, `sound_intensity` and `crowd_density` fields fill the
    /// matching readings when `metrics` does not already name them.
    pub fn from_form<I>(fields: I, snapshot: Option<Snapshot>) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut object: Map<String, Value> = fields
            .into_iter()
            .map(|(name, value)| (name, Value::String(value)))
            .collect();

        let metrics = match object.remove("metrics") {
            Some(Value::String(raw)) => serde_json::from_str(&raw).ok(),
            _ => None,
        };
        let mut metrics = normalize_map(metrics);

        for (field, metric) in FORM_SCORE_FIELDS {
            if let Some(Value::String(raw)) = object.remove(field) {
                metrics
                    .entry(metric.to_string())
                    .or_insert_with(|| form_number(raw));
            }
        }
        object.insert("metrics".to_string(), Value::Object(metrics));

        Self {
            snapshot: snapshot.filter(|s| !s.data.is_empty()),
            ..Self::from_object(object)
        }
    }
}

/// Numbers are stored as numbers; anything else is kept as text so the
/// fuzzy evaluator can name the bad field.
fn form_number(raw: String) -> Value {
    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::String(raw))
}

/// Rule deciding whether a payload becomes an alert
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecisionPolicy {
    /// Take alert_type / message / severity from the caller
    Caller,
    /// Fixed per-signal thresholds on the metrics
    Threshold,
    /// Fuzzy crime likelihood at or above `threshold`
    Fuzzy { threshold: f64 },
}

impl DecisionPolicy {
    pub fn from_config(config: &IngestConfig) -> Self {
        match config.policy {
            PolicyKind::Caller => Self::Caller,
            PolicyKind::Threshold => Self::Threshold,
            PolicyKind::Fuzzy => Self::Fuzzy {
                threshold: config.likelihood_threshold,
            },
        }
    }

    /// Alert to raise for `payload`, if any. `hour` is the local hour of day
    /// used by the fuzzy policy.
    pub fn decide(&self, payload: &AlertPayload, hour: f64) -> Result<Option<NewAlert>, FuzzyError> {
        match self {
            Self::Caller => Ok(Some(caller_alert(payload))),
            Self::Threshold => Ok(threshold_alert(&payload.metrics)),
            Self::Fuzzy { threshold } => fuzzy_alert(&payload.metrics, hour, *threshold),
        }
    }
}

fn caller_alert(payload: &AlertPayload) -> NewAlert {
    let alert_type = payload
        .alert_type
        .clone()
        .map(AlertType::from)
        .unwrap_or_default();
    let severity = payload
        .severity
        .clone()
        .map(Severity::from)
        .unwrap_or_default();
    let message = payload
        .message
        .clone()
        .unwrap_or_else(|| DEFAULT_MESSAGE.to_string());

    NewAlert::new(alert_type, message, severity).with_metrics(payload.metrics.clone())
}

fn threshold_alert(metrics: &Map<String, Value>) -> Option<NewAlert> {
    let reading = |key: &str| metrics.get(key).and_then(Value::as_f64);

    let (alert_type, value) = VIOLENCE_SIGNALS
        .iter()
        .find_map(|(key, kind)| {
            reading(key)
                .filter(|v| *v > VIOLENCE_THRESHOLD)
                .map(|v| (kind.clone(), v))
        })
        .or_else(|| {
            reading("cameraBlocked")
                .filter(|v| *v > CAMERA_BLOCKED_THRESHOLD)
                .map(|v| (AlertType::CameraInterference, v))
        })?;

    let message = format!("{} detected ({:.2})", alert_type.label(), value);
    Some(NewAlert::new(alert_type, message, Severity::High).with_metrics(metrics.clone()))
}

fn fuzzy_alert(
    metrics: &Map<String, Value>,
    hour: f64,
    threshold: f64,
) -> Result<Option<NewAlert>, FuzzyError> {
    let likelihood = evaluate_crime_likelihood(&FuzzyInputs::from_metrics(metrics, hour)?)?;
    if likelihood < threshold {
        return Ok(None);
    }

    let mut metrics = metrics.clone();
    metrics.insert("crime_likelihood".to_string(), Value::from(likelihood));
    let message = format!("High crime likelihood detected: {:.2}", likelihood);

    Ok(Some(
        NewAlert::new(AlertType::SuspiciousBehavior, message, Severity::High).with_metrics(metrics),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> AlertPayload {
        AlertPayload::from_object(value.as_object().cloned().unwrap())
    }

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn form_scores_become_metrics() {
        let snapshot = Snapshot {
            data: vec![0xff, 0xd8],
            content_type: Some("image/jpeg".to_string()),
        };
        let payload = AlertPayload::from_form(
            fields(&[
                ("anger_score", "0.9"),
                ("crowd_density", " 0.4 "),
                ("camera_id", "gate"),
                ("unrelated", "x"),
            ]),
            Some(snapshot.clone()),
        );

        assert_eq!(payload.metrics["anger"], json!(0.9));
        assert_eq!(payload.metrics["crowd"], json!(0.4));
        assert!(!payload.metrics.contains_key("fear"));
        assert_eq!(payload.camera_id.as_deref(), Some("gate"));
        assert_eq!(payload.snapshot, Some(snapshot));
    }

    #[test]
    fn form_metrics_json_wins_over_scores() {
        let payload = AlertPayload::from_form(
            fields(&[("metrics", r#"{"anger": 0.2}"#), ("anger_score", "0.9"), ("fear_score", "lots")]),
            Some(Snapshot::default()),
        );

        assert_eq!(payload.metrics["anger"], json!(0.2));
        assert_eq!(payload.metrics["fear"], json!("lots"));
        assert_eq!(payload.snapshot, None);

        let err = DecisionPolicy::Fuzzy { threshold: 0.5 }
            .decide(&payload, 23.0)
            .unwrap_err();
        assert_eq!(err.field(), "fear");
    }

    #[test]
    fn json_image_reference_is_kept() {
        let payload = payload(json!({"image": "/media/crime_snapshots/a.jpg", "snapshot": "ignored"}));
        assert_eq!(payload.image.as_deref(), Some("/media/crime_snapshots/a.jpg"));
        assert!(payload.snapshot.is_none());
    }

    #[test]
    fn caller_policy_fills_defaults() {
        let alert = DecisionPolicy::Caller
            .decide(&payload(json!({})), 12.0)
            .unwrap()
            .unwrap();
        assert_eq!(alert.alert_type, AlertType::SuspiciousBehavior);
        assert_eq!(alert.message, DEFAULT_MESSAGE);
        assert_eq!(alert.severity, Severity::Medium);
        assert!(alert.metrics.is_empty());
    }

    #[test]
    fn caller_policy_trusts_free_text_type() {
        let alert = DecisionPolicy::Caller
            .decide(
                &payload(json!({"alert_type": "camera_blocked", "severity": "medium"})),
                12.0,
            )
            .unwrap()
            .unwrap();
        assert_eq!(alert.alert_type.as_str(), "camera_blocked");
    }

    #[test]
    fn payload_ignores_mistyped_fields() {
        let parsed = payload(json!({"message": 5, "metrics": "loud", "camera_id": "lobby"}));
        assert_eq!(parsed.message, None);
        assert!(parsed.metrics.is_empty());
        assert_eq!(parsed.camera_id.as_deref(), Some("lobby"));
    }

    #[test]
    fn threshold_policy_picks_first_signal_over_limit() {
        let alert = DecisionPolicy::Threshold
            .decide(&payload(json!({"metrics": {"vandalism": 0.7, "assault": 0.95}})), 12.0)
            .unwrap()
            .unwrap();
        assert_eq!(alert.alert_type, AlertType::Vandalism);
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.message, "Vandalism detected (0.70)");
    }

    #[test]
    fn threshold_policy_detects_blocked_camera() {
        let alert = DecisionPolicy::Threshold
            .decide(&payload(json!({"metrics": {"fighting": 0.6, "cameraBlocked": 0.85}})), 12.0)
            .unwrap()
            .unwrap();
        assert_eq!(alert.alert_type, AlertType::CameraInterference);
    }

    #[test]
    fn threshold_policy_stays_quiet_below_limits() {
        let decision = DecisionPolicy::Threshold
            .decide(&payload(json!({"metrics": {"fighting": 0.6, "cameraBlocked": 0.8}})), 12.0)
            .unwrap();
        assert!(decision.is_none());
    }

    #[test]
    fn fuzzy_policy_alerts_on_high_likelihood() {
        let policy = DecisionPolicy::Fuzzy { threshold: 0.5 };
        let alert = policy
            .decide(&payload(json!({"metrics": {"anger": 1.0}})), 23.0)
            .unwrap()
            .unwrap();
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.message, "High crime likelihood detected: 0.83");
        assert!(alert.metrics["crime_likelihood"].as_f64().unwrap() > 0.5);
    }

    #[test]
    fn fuzzy_policy_skips_calm_scene() {
        let policy = DecisionPolicy::Fuzzy { threshold: 0.5 };
        let decision = policy.decide(&payload(json!({"metrics": {}})), 23.0).unwrap();
        assert!(decision.is_none());
    }

    #[test]
    fn fuzzy_policy_rejects_malformed_reading() {
        let policy = DecisionPolicy::Fuzzy { threshold: 0.5 };
        let err = policy
            .decide(&payload(json!({"metrics": {"fear": "high"}})), 23.0)
            .unwrap_err();
        assert!(matches!(err, FuzzyError::InvalidInput { ref field, .. } if field == "fear"));
    }
}
