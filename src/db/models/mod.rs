pub mod alert_models;
pub mod camera_log_models;
pub mod user_models;

pub use alert_models::{normalize_map, Alert, AlertType, NewAlert, Severity};
pub use camera_log_models::{CameraLog, NewCameraLog};
pub use user_models::{AuthToken, LoginCredentials, Registration, User, UserRole};
