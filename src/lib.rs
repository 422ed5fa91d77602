// src/lib.rs
// Public library surface for the server binary and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod scheduler;
pub mod scoring;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::IngestConfig;
pub use crate::error::{FetchError, IngestError, SourceFailure, StoreError};
pub use crate::ingest::types::{CandidateRecord, SignalDimensions, SourceAdapter, SourceId};
pub use crate::ingest::{IngestReport, IngestRequest, Ingestor, SourceSelector};
pub use crate::store::{InMemoryStore, OpportunityStore, StoredOpportunity};
