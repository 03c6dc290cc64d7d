pub mod alerts;
pub mod auth;
pub mod ingest;
pub mod rest;
pub mod websocket;

pub use rest::{router, ApiError, ApiResult, AppState, MediaMount, RestApi};
