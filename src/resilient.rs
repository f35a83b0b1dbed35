#[path = "resilient/config.rs"]
mod config;

#[path = "resilient/executor.rs"]
mod executor;


pub use config::{MaxAttempts, ResilienceConfig};
pub use executor::{RetryEvent, RetryExecutor, RetryObserver};
