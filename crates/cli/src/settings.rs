// Layered settings: built-in defaults, optional TOML file, BULKGEN__* env vars

use anyhow::{Context, Result};
use bulkgen_core::application::OrchestratorConfig;
use bulkgen_infra_http::HttpGenerationConfig;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "BULKGEN";
const DEFAULT_DATABASE_URL: &str = "~/.bulkgen/artifacts.db";

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

/// `[storage]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// SQLite file path or `sqlite:` URL; a leading `~` is expanded
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
        }
    }
}

impl StorageConfig {
    fn path_part(&self) -> &str {
        let raw = self.database_url.trim();
        raw.strip_prefix("sqlite://")
            .or_else(|| raw.strip_prefix("sqlite:"))
            .unwrap_or(raw)
    }

    fn is_memory(&self) -> bool {
        self.path_part().starts_with(":memory:")
    }

    /// URL handed to the SQLite pool
    pub fn resolved_url(&self) -> String {
        if self.is_memory() {
            return format!("sqlite:{}", self.path_part());
        }
        format!("sqlite://{}", shellexpand::tilde(self.path_part()))
    }

    /// Directory that must exist before the database file can be created
    pub fn database_dir(&self) -> Option<PathBuf> {
        if self.is_memory() {
            return None;
        }
        let path = shellexpand::tilde(self.path_part()).into_owned();
        // Query parameters are not part of the file path
        let path = path.split('?').next().unwrap_or_default().to_string();
        Path::new(&path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub orchestrator: OrchestratorConfig,
    pub generation: HttpGenerationConfig,
    pub storage: StorageConfig,
}

impl Settings {
    /// Load settings from an optional config file and the process environment
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        Self::load_with(config_file, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with(config_file: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            env.prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings
            .orchestrator
            .validate()
            .context("Invalid [orchestrator] configuration")?;
        Ok(settings)
    }
}
