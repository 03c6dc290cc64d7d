pub mod ingest;
pub mod snapshot;
#[cfg(test)]
mod tests;

pub use ingest::{AlertIngestService, IngestError, IngestOutcome};
pub use snapshot::{SnapshotStore, StoredSnapshot, SNAPSHOT_DIR};
