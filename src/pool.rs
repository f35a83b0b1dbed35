#[path = "pool/fanout.rs"]
mod fanout;

#[cfg(test)]
#[path = "pool/tests.rs"]
mod tests;

pub use fanout::{ProviderPool, TrialOutcome};
