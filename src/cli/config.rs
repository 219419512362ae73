use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{MirrorError, MirrorResult};

/// Settings for one mirroring run
///
/// Built once, then shared read-only by the transport and the crawl engine.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MirrorConfig {
    /// Root URL of the mirror
    pub url: String,

    /// Maximum recursion depth; the root document sits at depth 0
    pub depth: u32,

    /// Skip all external links
    pub remote: bool,

    /// Keep image links pointing at their original host
    pub remote_images: bool,

    /// Write a placeholder page for links beyond the depth limit
    pub error_page: bool,

    /// Base directory of the mirror
    pub output: PathBuf,

    /// Value of the `Cookie` request header, omitted when empty
    pub cookies: String,

    /// Value of the `User-Agent` request header, omitted when empty
    pub user_agent: String,

    /// Comma separated allow-list of external domains
    pub limit: String,

    /// Additional PEM certificate bundle, file or directory
    pub cert_store: Option<PathBuf>,

    /// Append the generator comment to rewritten documents
    pub advertisement: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            depth: 1,
            remote: false,
            remote_images: false,
            error_page: false,
            output: PathBuf::from("./output"),
            cookies: String::new(),
            user_agent: format!("site-mirror/{}", env!("CARGO_PKG_VERSION")),
            limit: String::new(),
            cert_store: None,
            advertisement: true,
        }
    }
}

impl MirrorConfig {
    /// Get the path to the config directory
    fn config_dir() -> PathBuf {
        if let Some(proj_dirs) =
            directories::ProjectDirs::from("org", "site-mirror", "site-mirror")
        {
            proj_dirs.config_dir().to_path_buf()
        } else {
            PathBuf::from("./config")
        }
    }

    /// Path of the configuration file picked up when `--config` is absent
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("default.yaml")
    }

    /// Load the default configuration, or built-in defaults if there is none
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_path();

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            debug!("No configuration at {}, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    /// Load from an explicit path, falling back to the default location
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::load_default(),
        }
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read configuration file: {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&contents)
            .context(format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save the configuration as the default
    pub fn save_as_default(&self) -> Result<PathBuf> {
        let config_path = Self::default_path();
        self.save_to_file(&config_path)?;
        Ok(config_path)
    }

    /// Save the configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        debug!("Saving configuration to: {}", path.display());

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .context(format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        fs::write(path, self.to_yaml()?)
            .context(format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration")
    }

    /// Check the values a run cannot start without
    pub fn validate(&self) -> MirrorResult<()> {
        if self.url.trim().is_empty() {
            return Err(MirrorError::Config("no root URL given".to_string()));
        }

        if self.output.as_os_str().is_empty() {
            return Err(MirrorError::Config("output directory is empty".to_string()));
        }

        Ok(())
    }

    /// Allow-listed external domains, lower-cased
    pub fn limit_domains(&self) -> Vec<String> {
        self.limit
            .split(',')
            .map(|domain| domain.trim().to_lowercase())
            .filter(|domain| !domain.is_empty())
            .collect()
    }
}
