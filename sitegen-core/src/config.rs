use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Error loading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Error loading {path}: {source}")]
    Parsing {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Site-wide configuration read from `site.config.yaml`.
///
/// `site` and `features` are free-form: whatever the file holds is handed to
/// the templates as-is.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SiteConfig {
    #[serde(default)]
    pub site: Map<String, Value>,
    #[serde(default)]
    pub build: BuildPaths,
    #[serde(default)]
    pub features: Map<String, Value>,

    /// Directory relative paths resolve against. Set by [`SiteConfig::load`].
    #[serde(skip)]
    root: PathBuf,
}

impl SiteConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: SiteConfig =
            serde_yaml::from_str(&data).map_err(|source| ConfigError::Parsing {
                path: path.to_path_buf(),
                source,
            })?;

        config.root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Ok(config)
    }

    /// Point relative paths at `root` instead of the config file's directory.
    pub fn with_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        self.root = root.as_ref().to_path_buf();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn content_dir(&self) -> PathBuf {
        self.root.join(&self.build.content_dir)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.content_dir().join("data")
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.content_dir().join("pages")
    }

    pub fn template_dir(&self) -> PathBuf {
        self.root.join(&self.build.template_dir)
    }

    pub fn static_dir(&self) -> PathBuf {
        self.root.join(&self.build.static_dir)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.build.output_dir)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct BuildPaths {
    pub template_dir: PathBuf,
    pub static_dir: PathBuf,
    pub output_dir: PathBuf,
    pub content_dir: PathBuf,
}

impl Default for BuildPaths {
    fn default() -> Self {
        Self {
            template_dir: PathBuf::from("templates"),
            static_dir: PathBuf::from("static"),
            output_dir: PathBuf::from("docs"),
            content_dir: PathBuf::from("content"),
        }
    }
}
