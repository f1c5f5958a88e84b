//! Configuration handling for sitegen.
//! [`RunConfiguration`] carries the per-run transfer settings, [`SiteConfig`]
//! describes the site itself and is read from `sitegen.json`, `sitegen.yml`
//! or `sitegen.yaml` in the source directory.

use crate::constants::{
    CONFIG_FILES, DEFAULT_ASSETS, DEFAULT_EXTENSION, DEFAULT_LOCALES, DEPLOY_CONFIG, LAYOUT_FILE,
    STAGING_DIR, TRANSFER_COMMAND,
};
use crate::error::{Error, Result};
use crate::html::AssetDirs;
use crate::locale::LocaleSet;
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Settings for one run. The runner only reads them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfiguration {
    /// Pass `analytics => true` to the layout
    pub analytics: bool,
    pub verbose: bool,
    /// Value written into the deploy configuration's `RewriteBase` in remote mode
    pub remote_base: Option<String>,
    /// Transfer target; no transfer happens without one
    pub destination: Option<String>,
    /// Rewrite the deploy configuration for the remote host
    pub remote: bool,
    /// Transfer command run by `sh`; staging and destination are appended
    pub transfer_command: String,
    pub staging_dir: PathBuf,
    /// Directory holding source pages, assets and the deploy configuration
    pub source_dir: PathBuf,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            analytics: false,
            verbose: false,
            remote_base: None,
            destination: None,
            remote: false,
            transfer_command: TRANSFER_COMMAND.to_string(),
            staging_dir: PathBuf::from(STAGING_DIR),
            source_dir: PathBuf::from("."),
        }
    }
}

/// Site description loaded from the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Extension of source pages and generated output
    pub extension: String,
    /// Locale tags; empty for a single-language site
    pub locales: Vec<String>,
    /// Globs or paths copied verbatim into staging
    pub assets: Vec<String>,
    pub deploy_config: String,
    pub layout: PathBuf,
    pub dirs: AssetDirs,
    pub analytics_account: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            locales: DEFAULT_LOCALES.iter().map(|l| l.to_string()).collect(),
            assets: DEFAULT_ASSETS.iter().map(|a| a.to_string()).collect(),
            deploy_config: DEPLOY_CONFIG.to_string(),
            layout: PathBuf::from(LAYOUT_FILE),
            dirs: AssetDirs::default(),
            analytics_account: None,
        }
    }
}

impl SiteConfig {
    /// Validated locale set built from [`SiteConfig::locales`].
    pub fn locale_set(&self) -> Result<LocaleSet> {
        LocaleSet::from_tags(self.locales.as_slice())
    }
}

/// Loads the first configuration file found in `source_dir`.
///
/// # Arguments
/// * `source_dir` - Directory to look in
/// * `config_files` - List of configuration files to try
///
/// # Returns
/// * `Result<Option<String>>` - Contents of the first found configuration
///   file, `None` if there is none
pub fn load_config<P: AsRef<Path>>(
    source_dir: P,
    config_files: &[&str],
) -> Result<Option<String>> {
    for file in config_files {
        let config_path = source_dir.as_ref().join(file);
        if config_path.exists() {
            debug!("Loading configuration from {}", config_path.display());
            return Ok(Some(std::fs::read_to_string(&config_path).map_err(Error::IoError)?));
        }
    }

    debug!("No configuration file found (tried: {})", config_files.join(", "));
    Ok(None)
}

/// Parses configuration content, JSON first, then YAML.
///
/// # Errors
/// * `Error::ConfigError` if the content is neither valid JSON nor valid YAML
///   for [`SiteConfig`], or names an invalid locale set
pub fn parse_config(content: &str) -> Result<SiteConfig> {
    let config: SiteConfig = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(_) => serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Invalid configuration format: {}", e)))?,
    };

    if config.extension.is_empty() {
        return Err(Error::ConfigError("extension must not be empty".to_string()));
    }
    config
        .locale_set()
        .map_err(|e| Error::ConfigError(e.to_string()))?;

    Ok(config)
}

/// Loads and parses the site configuration, falling back to defaults.
pub fn get_config<P: AsRef<Path>>(source_dir: P) -> Result<SiteConfig> {
    match load_config(source_dir, &CONFIG_FILES)? {
        Some(content) => parse_config(&content),
        None => Ok(SiteConfig::default()),
    }
}
