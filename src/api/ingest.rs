use crate::detection::{AlertPayload, Snapshot};
use crate::services::{AlertIngestService, IngestError, IngestOutcome};
use crate::utils::truncate_chars;
use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Multipart, State},
    http::{header, Method, Request, StatusCode},
    Form, Json,
};
use log::{error, warn};
use serde_json::{json, Value};
use std::sync::Arc;

/// Longest storage error detail echoed back to the caller
const MAX_ERROR_DETAIL: usize = 200;

/// Multipart field carrying the captured frame
const SNAPSHOT_FIELD: &str = "snapshot";

type Envelope = (StatusCode, Json<Value>);

fn error_envelope(status: StatusCode, message: impl Into<String>) -> Envelope {
    (
        status,
        Json(json!({"status": "error", "message": message.into()})),
    )
}

/// Body encodings accepted by the ingestion endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Submission {
    Json,
    UrlEncoded,
    Multipart,
}

impl Submission {
    fn of(request: &Request<Body>) -> Self {
        let mime = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(|value| value.trim().to_ascii_lowercase())
            .unwrap_or_default();

        match mime.as_str() {
            "multipart/form-data" => Submission::Multipart,
            "application/x-www-form-urlencoded" => Submission::UrlEncoded,
            // Detectors often omit the header; treat everything else as JSON
            _ => Submission::Json,
        }
    }
}

/// Decode the request body into a payload according to its content type
async fn read_payload(request: Request<Body>) -> Result<AlertPayload, IngestError> {
    match Submission::of(&request) {
        Submission::Json => {
            let body = Bytes::from_request(request, &())
                .await
                .map_err(|e| IngestError::InvalidPayload(e.to_string()))?;
            AlertIngestService::parse_payload(&body)
        }
        Submission::UrlEncoded => {
            let Form(fields) = Form::<Vec<(String, String)>>::from_request(request, &())
                .await
                .map_err(|e| IngestError::InvalidForm(e.to_string()))?;
            Ok(AlertPayload::from_form(fields, None))
        }
        Submission::Multipart => {
            let multipart = Multipart::from_request(request, &())
                .await
                .map_err(|e| IngestError::InvalidForm(e.to_string()))?;
            read_multipart(multipart).await
        }
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<AlertPayload, IngestError> {
    let mut fields = Vec::new();
    let mut snapshot = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| IngestError::InvalidForm(e.to_string()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == SNAPSHOT_FIELD {
            let content_type = field.content_type().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| IngestError::InvalidForm(e.to_string()))?;
            snapshot = Some(Snapshot {
                data: data.to_vec(),
                content_type,
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| IngestError::InvalidForm(e.to_string()))?;
            fields.push((name, value));
        }
    }

    Ok(AlertPayload::from_form(fields, snapshot))
}

/// `/process-emotion/`: accept one alert candidate from a detector
pub async fn process_emotion(
    State(service): State<Arc<AlertIngestService>>,
    request: Request<Body>,
) -> Envelope {
    if request.method() != Method::POST {
        return error_envelope(StatusCode::METHOD_NOT_ALLOWED, "Invalid request method");
    }

    let result = match read_payload(request).await {
        Ok(payload) => service.ingest_payload(payload).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(IngestOutcome::Raised { alert, .. }) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "message": "Alert processed successfully",
                "alert_id": alert.id,
            })),
        ),
        Ok(IngestOutcome::Skipped) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "message": "No alert raised",
                "alert_id": null,
            })),
        ),
        Err(IngestError::InvalidPayload(reason)) => {
            warn!("Rejected alert payload: {}", reason);
            error_envelope(StatusCode::BAD_REQUEST, "Invalid JSON data")
        }
        Err(IngestError::InvalidForm(reason)) => {
            warn!("Rejected alert form: {}", reason);
            error_envelope(StatusCode::BAD_REQUEST, "Invalid form data")
        }
        Err(IngestError::InvalidMetrics(err)) => {
            warn!("Rejected alert metrics: {}", err);
            error_envelope(
                StatusCode::BAD_REQUEST,
                format!("Invalid metric value: {}", err.field()),
            )
        }
        Err(IngestError::Snapshot(detail)) => {
            error!("Snapshot upload failed: {}", detail);
            error_envelope(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store snapshot")
        }
        Err(IngestError::Storage(detail)) => error_envelope(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!(
                "Database error occurred: {}",
                truncate_chars(&detail, MAX_ERROR_DETAIL)
            ),
        ),
    }
}
