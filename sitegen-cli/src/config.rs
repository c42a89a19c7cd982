use anyhow::Result;
use clap::ArgMatches;
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use sitegen_core::{BuildPaths, SiteConfig};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "site.config.yaml";

/// Settings for the `site` commands, read from the same file as the site
/// config plus `SITE__*` environment overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CliConfig {
    pub build: BuildPaths,
    pub logging: LoggingConfig,
    pub backup: BackupConfig,
    pub validation: ValidationConfig,
    pub performance: PerformanceConfig,
    pub development: DevelopmentConfig,
    pub project: ProjectConfig,
    pub tools: ToolsConfig,

    /// Config file path, set from the command line
    #[serde(skip)]
    pub config_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackupConfig {
    pub enabled: bool,
    pub location: PathBuf,
    pub keep_last: usize,
    pub auto_backup_before_build: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            location: PathBuf::from("backups"),
            keep_last: 5,
            auto_backup_before_build: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub check_yaml: bool,
    pub check_images: bool,
    /// Run markup checks on the output after `build --validate`
    pub markup: bool,
    pub critical_files: Vec<String>,
    pub report: PathBuf,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            check_yaml: true,
            check_images: true,
            markup: true,
            critical_files: vec!["index.html".to_string(), "styles.css".to_string()],
            report: PathBuf::from("validation-report.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub track_build_time: bool,
    pub metrics_file: PathBuf,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            track_build_time: true,
            metrics_file: PathBuf::from("build_metrics.log"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DevelopmentConfig {
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub open: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8000,
            open: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
    pub version: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "Unknown".to_string(),
            version: "?".to_string(),
        }
    }
}

/// External helper programs behind `analyze`, `optimize` and `cleanup`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub analyze: Vec<String>,
    pub optimize: Vec<String>,
    pub cleanup: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        let cmd = |parts: &[&str]| parts.iter().map(|s| s.to_string()).collect();
        Self {
            analyze: cmd(&["python", "tools/visual_inspector.py", "--full", "--analyze"]),
            optimize: cmd(&["python", "tools/image_optimizer.py"]),
            cleanup: cmd(&["python", "cleanup_project.py"]),
        }
    }
}

impl CliConfig {
    /// Load configuration with cascading precedence:
    /// 1. Environment variables (SITE__SECTION__KEY)
    /// 2. Configuration file, when present
    /// 3. Defaults
    pub fn load(args: &ArgMatches) -> Result<Self> {
        let config_file = args
            .get_one::<PathBuf>("config")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut builder = ConfigBuilder::builder();

        builder = builder.add_source(ConfigBuilder::try_from(&Self::default())?);

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.as_path())
                    .format(FileFormat::Yaml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("SITE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut cli_config: CliConfig = builder.build()?.try_deserialize()?;
        cli_config.config_file = config_file;
        Ok(cli_config)
    }

    /// Directory that relative paths resolve against
    pub fn root(&self) -> PathBuf {
        match self.config_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn resolve<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.root().join(path)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.build.output_dir)
    }

    pub fn content_dir(&self) -> PathBuf {
        self.resolve(&self.build.content_dir)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.resolve(&self.backup.location)
    }

    /// The site config for the core build. Build paths come from this
    /// layered config so environment overrides reach the build too.
    pub fn site_config(&self) -> Result<SiteConfig> {
        let mut site_config = SiteConfig::load(&self.config_file)?;
        site_config.build = self.build.clone();
        Ok(site_config)
    }

    /// What a backup snapshots, relative to [`CliConfig::root`]
    pub fn backup_items(&self) -> Vec<PathBuf> {
        let mut items = vec![
            self.build.content_dir.clone(),
            self.build.template_dir.clone(),
            self.build.static_dir.clone(),
        ];
        if let Some(name) = self.config_file.file_name() {
            items.push(PathBuf::from(name));
        }
        items
    }
}
