use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::{Path, PathBuf};

/// Command-line values that take precedence over the configuration file
///
/// `None`/`false` leaves the file (or default) value in place.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub rate_limit: Option<f64>,
    pub max_auctions: Option<usize>,
    pub max_pages: Option<u32>,
    pub dry_run: bool,
    pub headless: bool,
}

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Builds the effective configuration from an optional file and CLI overrides
///
/// Validation runs once, after the overrides are applied, so a file value
/// that is only valid in combination with a flag is judged as merged.
pub fn resolve_config(
    path: Option<&Path>,
    overrides: ConfigOverrides,
) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => Config::default(),
    };

    apply_overrides(&mut config, overrides);
    validate(&config)?;
    Ok(config)
}

fn apply_overrides(config: &mut Config, overrides: ConfigOverrides) {
    if let Some(base_url) = overrides.base_url {
        config.crawler.base_url = base_url;
    }
    if let Some(output_dir) = overrides.output_dir {
        config.output.output_dir = output_dir;
    }
    if let Some(rate) = overrides.rate_limit {
        config.crawler.rate_limit = rate;
    }
    if overrides.max_auctions.is_some() {
        config.crawler.max_auctions = overrides.max_auctions;
    }
    if overrides.max_pages.is_some() {
        config.crawler.max_pages = overrides.max_pages;
    }
    config.crawler.dry_run |= overrides.dry_run;
    config.crawler.headless |= overrides.headless;
}
