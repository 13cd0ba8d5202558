use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{
    Config, EngineSettings, FactorySettings, FeedConfig, LoggingSettings, OracleSettings,
    PoolConfig, Simulation,
};

/// Environment variables with this prefix override file values,
/// e.g. `BASKET__ENGINE__MAX_PRICE_AGE_SECS=60`.
const ENV_PREFIX: &str = "BASKET";

/// Loads the application configuration from the `config.toml` file.
///
/// This function is the primary entry point for this crate. It reads the configuration file,
/// overlays environment variables, deserializes the result into our strongly-typed `Config`
/// struct and validates it.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from("config.toml")
}

/// Loads the configuration from an explicit file path.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path.as_ref()))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    finish(builder)
}

/// Parses a configuration from an in-memory TOML document. No environment overlay.
pub fn parse_config(toml: &str) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml))
        .build()?;

    finish(builder)
}

fn finish(builder: config::Config) -> Result<Config, ConfigError> {
    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;
    tracing::debug!(
        feeds = config.oracle.feeds.len(),
        pools = config.simulation.pools.len(),
        "Configuration loaded"
    );
    Ok(config)
}
