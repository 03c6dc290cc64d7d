pub mod api;
pub mod config;
pub mod db;
pub mod detection;
pub mod error;
pub mod messaging;
pub mod security;
pub mod services;
pub mod utils;

// Re-export main components for easier use
pub use error::Error;
pub use messaging::{ChannelLayer, ALERTS_GROUP};
pub use services::{AlertIngestService, IngestError, IngestOutcome};
