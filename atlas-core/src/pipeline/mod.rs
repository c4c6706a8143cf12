//! Cleaning pipeline and store adapter.

pub mod clean;
pub mod ingest;
pub mod store;

pub use clean::{clean_file, CleanError, SourceLayout};
pub use ingest::{read_csv, IngestError};
pub use store::{
    LoadProgress, LoadSummary, QueryFilter, SnapshotStore, StdoutProgress, StoreError,
};
