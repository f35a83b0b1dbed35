use std::fs;
use std::path::PathBuf;

use crate::error::BenchError;

use super::types::BenchConfig;

const LOCAL_CONFIG: &str = "vqa-bench.toml";

/// `./vqa-bench.toml` when present, else `~/.config/vqa-bench/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.is_file() {
        return Some(local);
    }
    dirs::home_dir().map(|home| home.join(".config").join("vqa-bench").join("config.toml"))
}

/// Loads the configuration.
///
/// An explicit path must exist. Without one, a missing default file yields
/// the built-in defaults.
pub fn load_config(path_override: Option<PathBuf>) -> Result<BenchConfig, BenchError> {
    let explicit = path_override.is_some();
    let Some(path) = path_override.or_else(default_config_path) else {
        log::debug!("no home directory, using default configuration");
        return Ok(BenchConfig::default());
    };

    match fs::read_to_string(&path) {
        Ok(contents) => {
            let config = parse_config(&contents)
                .map_err(|e| BenchError::config(path.display(), e))?;
            log::debug!("loaded configuration from {}", path.display());
            Ok(config)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound && !explicit => {
            log::debug!("{} not found, using default configuration", path.display());
            Ok(BenchConfig::default())
        }
        Err(err) => Err(BenchError::config(
            format!("cannot read {}", path.display()),
            err,
        )),
    }
}

/// Parses and validates a TOML document.
pub fn parse_config(contents: &str) -> Result<BenchConfig, BenchError> {
    let config: BenchConfig = toml::from_str(contents)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &BenchConfig) -> Result<(), BenchError> {
    if config.run.trials == 0 {
        return Err(BenchError::ConfigError(
            "run.trials must be at least 1".to_string(),
        ));
    }
    if config.retry.max_attempts == Some(0) {
        return Err(BenchError::ConfigError(
            "retry.max_attempts must be at least 1".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&config.retry.jitter_ratio) {
        return Err(BenchError::ConfigError(
            "retry.jitter_ratio must be between 0 and 1".to_string(),
        ));
    }
    if let Some(name) = config.providers.keys().find(|name| name.trim().is_empty()) {
        return Err(BenchError::ConfigError(format!(
            "invalid provider name '{name}'"
        )));
    }
    Ok(())
}
