use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use infodyn_core::{ComplexityConfig, EstimatorConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Returns the ~/.infodyn directory, or a local `.infodyn` if the home
/// directory cannot be determined. Nothing is created.
pub fn infodyn_data_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(mut path) => {
            path.push(".infodyn");
            path
        }
        None => {
            warn!("Could not determine home directory, falling back to local .infodyn");
            PathBuf::from(".infodyn")
        }
    }
}

/// Optional settings file. A table present here replaces the matching
/// command-line values wholesale; missing keys inside it take defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub estimator: Option<EstimatorConfig>,
    #[serde(default)]
    pub complexity: Option<ComplexityConfig>,
}

impl FileConfig {
    pub fn default_path() -> PathBuf {
        let mut path = infodyn_data_dir();
        path.push("config.toml");
        path
    }

    /// Loads `explicit` (which must exist) or, failing that, the default
    /// path if present.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::from_file(&path)
                } else {
                    debug!(path = %path.display(), "No config file");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        debug!(path = %path.display(), ?config, "Loaded config file");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn estimator_or(&self, flags: EstimatorConfig) -> EstimatorConfig {
        self.estimator.clone().unwrap_or(flags)
    }

    pub fn complexity_or(&self, flags: ComplexityConfig) -> ComplexityConfig {
        self.complexity.clone().unwrap_or(flags)
    }
}
