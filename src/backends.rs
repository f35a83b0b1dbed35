//! HTTP adapters for the supported vision APIs and the factory building
//! them from configuration.

#[path = "backends/transport.rs"]
mod transport;

#[path = "backends/factory.rs"]
mod factory;

#[cfg(feature = "anthropic")]
pub mod anthropic;
#[cfg(feature = "google")]
pub mod google;
#[cfg(feature = "openai")]
pub mod openai;

pub use factory::{build_judge, build_registry, resolve_api_key};
pub use transport::BackendSettings;
