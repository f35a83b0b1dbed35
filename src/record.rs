#[path = "record/types.rs"]
mod types;

#[path = "record/schema.rs"]
mod schema;

#[path = "record/artifact.rs"]
mod artifact;

pub use artifact::{load_records, write_artifact};
pub use schema::SchemaVersion;
pub use types::{EntryRecord, TrialResult};
