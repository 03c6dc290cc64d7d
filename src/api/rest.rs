use crate::api::{alerts, auth, ingest, websocket};
use crate::config::{ApiConfig, IngestConfig};
use crate::db::store::AlertStore;
use crate::error::Error;
use crate::messaging::ChannelLayer;
use crate::security::auth::AuthService;
use crate::security::SecurityService;
use crate::services::AlertIngestService;
use anyhow::Result;
use axum::{
    extract::FromRef,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use log::{error, info, warn};
use serde::Serialize;
use serde_json::json;
use std::any::Any as PanicPayload;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub ingest: Arc<AlertIngestService>,
    pub store: Arc<dyn AlertStore>,
    pub channels: Arc<ChannelLayer>,
    pub security: Arc<SecurityService>,
    pub auth: Arc<AuthService>,
}

impl FromRef<AppState> for Arc<AlertIngestService> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.ingest)
    }
}

impl FromRef<AppState> for Arc<dyn AlertStore> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.store)
    }
}

impl FromRef<AppState> for Arc<ChannelLayer> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.channels)
    }
}

impl FromRef<AppState> for Arc<SecurityService> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.security)
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.auth)
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
    pub status: u16,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: status.as_u16(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match err {
            Error::Authentication(_) => StatusCode::UNAUTHORIZED,
            Error::Authorization(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::AlreadyExists(_) => StatusCode::CONFLICT,
            Error::InvalidInput(_) | Error::Config(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(err) = err.downcast_ref::<Error>() {
            return (*err).clone().into();
        }

        error!("Unhandled API error: {:#}", err);
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

/// Implement IntoResponse for ApiError
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(self);
        (status, body).into_response()
    }
}

/// Turns a handler panic into the generic error envelope
fn panic_response(err: Box<dyn PanicPayload + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!("Request handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "application/json")],
        json!({"status": "error", "message": "Internal server error"}).to_string(),
    )
        .into_response()
}

/// Where stored snapshots are served from
#[derive(Debug, Clone)]
pub struct MediaMount {
    pub url: String,
    pub dir: PathBuf,
}

impl MediaMount {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            url: config.media_url.trim_end_matches('/').to_string(),
            dir: config.media_dir.clone(),
        }
    }

    /// Only absolute, non-root prefixes can be nested
    fn is_servable(&self) -> bool {
        self.url.starts_with('/') && self.url.len() > 1
    }
}

/// Build the application router
pub fn router(state: AppState, static_dir: PathBuf, media: MediaMount) -> Router {
    use std::time::Duration;
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_credentials(false)
        .max_age(Duration::from_secs(3600));

    let mut app = Router::new()
        // Ingestion
        .route("/process-emotion/", any(ingest::process_emotion))
        // Live alert feed
        .route("/ws/alerts/", get(websocket::alerts_socket))
        // Auth routes
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::current_user))
        // Alert routes
        .route("/api/alerts", get(alerts::list_alerts))
        .route("/api/alerts/:id", get(alerts::get_alert))
        .with_state(state);

    if media.is_servable() {
        app = app.nest_service(&media.url, ServeDir::new(media.dir));
    } else {
        warn!("Media URL {:?} is not an absolute path; snapshots will not be served", media.url);
    }

    app.fallback_service(ServeDir::new(static_dir))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors)
}

pub struct RestApi {
    config: ApiConfig,
    media: MediaMount,
    state: AppState,
}

impl RestApi {
    pub fn new(config: &ApiConfig, ingest: &IngestConfig, state: AppState) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            media: MediaMount::from_config(ingest),
            state,
        })
    }

    /// Serve until `shutdown` resolves
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = router(
            self.state.clone(),
            self.config.static_dir.clone(),
            self.media.clone(),
        );

        let addr = format!("{}:{}", self.config.address, self.config.port);
        let addr: SocketAddr = addr.parse()?;

        info!("API server listening on {}", addr);

        let listener = TcpListener::bind(addr).await?;

        axum::Server::from_tcp(listener.into_std()?)?
            .serve(app.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_statuses() {
        let cases = [
            (Error::Authentication("x".into()), 401),
            (Error::Authorization("x".into()), 403),
            (Error::NotFound("x".into()), 404),
            (Error::AlreadyExists("x".into()), 409),
            (Error::InvalidInput("x".into()), 400),
            (Error::Database("x".into()), 500),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn anyhow_keeps_typed_status() {
        let err = anyhow::Error::from(Error::NotFound("alert 9".into()));
        let api = ApiError::from(err);
        assert_eq!(api.status, 404);
        assert_eq!(api.message, "Not found: alert 9");

        let api = ApiError::from(anyhow::anyhow!("boom"));
        assert_eq!(api.status, 500);
    }

    #[test]
    fn media_mount_requires_absolute_prefix() {
        let mount = |url: &str| MediaMount {
            url: url.trim_end_matches('/').to_string(),
            dir: PathBuf::from("media"),
        };
        assert!(mount("/media/").is_servable());
        assert!(!mount("/").is_servable());
        assert!(!mount("media").is_servable());

        let from_default = MediaMount::from_config(&IngestConfig::default());
        assert_eq!(from_default.url, "/media");
        assert!(from_default.is_servable());
    }

    #[test]
    fn panics_become_internal_error() {
        let response = panic_response(Box::new("handler blew up"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
