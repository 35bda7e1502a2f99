//! Application configuration.
//!
//! A [`Config`] is read from YAML. Every field has a default, so an empty
//! document (or [`Config::default`]) describes the conventional layout:
//!
//! ```yaml
//! environment: development
//! root: .
//! paths:
//!   application: app
//!   components: app/components
//!   views: app/views
//!   layouts: app/views/layouts
//!   public_assets: public/assets
//! views:
//!   extension: html
//!   extension_prefix: io
//!   adapter: Pistachio
//! routing:
//!   default_controller: Application
//! ```
//!
//! Relative paths resolve against `root`. The declared route table is read
//! from `<application>/environment/<Environment>/routes.json` unless
//! `routing.routes` names another file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use brewery_routing::RouterConfig;
use brewery_view::{Adapter, ViewConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding [`Config::environment`].
pub const ENVIRONMENT_VAR: &str = "BREWERY_ENVIRONMENT";

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unknown environment `{0}`, expected development, testing or production")]
    UnknownEnvironment(String),
}

/// Deployment environment. Selects the route table directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Testing,
    Production,
}

impl Environment {
    /// Directory name under `<application>/environment/`.
    pub fn directory_name(&self) -> &'static str {
        match self {
            Environment::Development => "Development",
            Environment::Testing => "Testing",
            Environment::Production => "Production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Testing => write!(f, "testing"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" => Ok(Environment::Development),
            "testing" => Ok(Environment::Testing),
            "production" => Ok(Environment::Production),
            _ => Err(ConfigError::UnknownEnvironment(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub application: PathBuf,
    pub components: PathBuf,
    pub views: PathBuf,
    pub layouts: PathBuf,
    pub public_assets: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            application: "app".into(),
            components: "app/components".into(),
            views: "app/views".into(),
            layouts: "app/views/layouts".into(),
            public_assets: "public/assets".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewsConfig {
    pub extension: String,
    pub extension_prefix: Option<String>,
    pub adapter: Adapter,
    /// Base URL of `asset()`. Derived from `paths.public_assets` when unset.
    pub assets_url: Option<String>,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            extension: "html".into(),
            extension_prefix: Some("io".into()),
            adapter: Adapter::Pistachio,
            assets_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub default_controller: String,
    /// Route table file, replacing the per-environment default.
    pub routes: Option<PathBuf>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_controller: "Application".into(),
            routes: None,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub environment: Environment,
    /// Base directory relative paths resolve against.
    pub root: PathBuf,
    pub paths: PathsConfig,
    pub views: ViewsConfig,
    pub routing: RoutingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            root: PathBuf::from("."),
            paths: PathsConfig::default(),
            views: ViewsConfig::default(),
            routing: RoutingConfig::default(),
        }
    }
}

impl Config {
    /// Default configuration rooted at `root`.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(source)?)
    }

    /// Reads a YAML config file. A relative `root` resolves against the
    /// directory holding the file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&source)?;
        if config.root.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            config.root = base.join(&config.root);
        }
        Ok(config)
    }

    /// Applies overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(value) = std::env::var(ENVIRONMENT_VAR) {
            if !value.trim().is_empty() {
                self.environment = value.parse()?;
            }
        }
        Ok(())
    }

    /// `path` resolved against [`Config::root`].
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn application_root(&self) -> PathBuf {
        self.resolve(&self.paths.application)
    }

    pub fn components_root(&self) -> PathBuf {
        self.resolve(&self.paths.components)
    }

    pub fn views_root(&self) -> PathBuf {
        self.resolve(&self.paths.views)
    }

    pub fn layouts_root(&self) -> PathBuf {
        self.resolve(&self.paths.layouts)
    }

    /// Route table for the configured environment.
    pub fn routes_file(&self) -> PathBuf {
        match &self.routing.routes {
            Some(routes) => self.resolve(routes),
            None => self
                .application_root()
                .join("environment")
                .join(self.environment.directory_name())
                .join("routes.json"),
        }
    }

    /// Public URL of the assets directory: `public/assets` is served at
    /// `/assets`.
    pub fn assets_url(&self) -> String {
        if let Some(url) = &self.views.assets_url {
            return url.clone();
        }
        let assets = &self.paths.public_assets;
        let served = assets.strip_prefix("public").unwrap_or(assets.as_path());
        let served = served.to_string_lossy().replace('\\', "/");
        format!("/{}", served.trim_matches('/'))
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig::new(self.application_root())
            .components_root(self.components_root())
            .views_root(self.views_root())
            .default_controller(self.routing.default_controller.clone())
    }

    /// View settings for templates under `include_path`.
    pub fn view_config(&self, include_path: impl Into<PathBuf>) -> ViewConfig {
        ViewConfig::new(include_path, self.layouts_root())
            .extension(self.views.extension.clone())
            .extension_prefix(self.views.extension_prefix.clone())
            .adapter(self.views.adapter)
            .assets_url(self.assets_url())
    }
}
