// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use ::config::{Environment, File};
use std::path::Path;

/// Prefix for environment overrides, e.g. `HEALTH_API__BASE_PATH=/api/v2`.
pub const ENV_PREFIX: &str = "HEALTH";

/// Load configuration from defaults, an optional file (YAML or JSON, picked
/// by extension) and `HEALTH_*` environment variables, in that order.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    load_layered(path.as_ref(), environment())
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

fn load_layered(path: &Path, env: Environment) -> Result<Config> {
    let config: Config = ::config::Config::builder()
        .add_source(File::from(path).required(false))
        .add_source(env)
        .build()
        .with_context(|| format!("Failed to read config from {}", path.display()))?
        .try_deserialize()
        .context("Failed to parse config")?;

    config.validate()?;
    Ok(config)
}
