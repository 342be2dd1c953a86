//! Persistence hand-off for ingested records
//!
//! - [`entity_store`] - storage contract and query types
//! - [`memory_store`] - in-process store, used by tests and dry runs
//! - [`jsonl_store`] - directory of JSON lines files, used by the CLI
//! - [`batch_sink`] - bounded batches and the bulk-upsert sink

pub mod batch_sink;
pub mod entity_store;
pub mod jsonl_store;
pub mod memory_store;

pub use batch_sink::{Batch, BatchPersistenceSink, RecordSink};
pub use entity_store::{EntityStore, Filter, Pagination, StoredEntity};
pub use jsonl_store::JsonLinesEntityStore;
pub use memory_store::InMemoryEntityStore;
