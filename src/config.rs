//! TOML configuration shared by the library and the command line tool.

#[path = "config/types.rs"]
mod types;

#[path = "config/load.rs"]
mod load;

pub use load::{default_config_path, load_config, parse_config};
pub use types::{
    BackendKind, BenchConfig, JudgeConfig, JudgeKind, LoggingConfig, ProviderConfig, RetryConfig,
    RunConfig, DEFAULT_SYSTEM_PROMPT,
};
