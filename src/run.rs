#[path = "run/layout.rs"]
mod layout;

#[path = "run/manager.rs"]
mod manager;


pub use layout::{allocate_run_dir, ensure_destination, next_run_id, RunDirectory, LAST_RUN_MARKER};
pub use manager::{RunManager, RunSummary};
