//! Judging of persisted trials and accuracy tables.

#[path = "aggregate/aggregator.rs"]
mod aggregator;

#[path = "aggregate/tables.rs"]
mod tables;

pub use aggregator::{
    entry_accuracy, model_accuracy, Aggregator, Evaluation, ModelRow, QuestionRow, RunRow,
};
pub use tables::{write_tables, TablePaths};
