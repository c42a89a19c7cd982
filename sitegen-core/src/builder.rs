use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::assets;
use crate::config::{ConfigError, SiteConfig};
use crate::context::page_context;
use crate::data::{DataCatalog, DataError};
use crate::page::{Page, PageError};
use crate::template::{TemplateError, TemplateRenderer};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Page(#[from] PageError),
    #[error("{page}: {source}")]
    Template {
        page: PathBuf,
        #[source]
        source: TemplateError,
    },
    #[error(transparent)]
    Templates(#[from] TemplateError),
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| BuildError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Pipeline steps, in the order a build passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Clean,
    DataLoaded,
    PagesRendered,
    AssetsCopied,
    Done,
}

#[derive(Debug, Default)]
pub struct BuildReport {
    /// Output files written for pages, in render order.
    pub pages: Vec<PathBuf>,
    /// Page sources that disappeared before they could be read.
    pub skipped: Vec<PathBuf>,
    pub assets: Vec<PathBuf>,
    pub stages: Vec<BuildStage>,
    pub elapsed: Duration,
}

pub struct SiteBuilder<'a> {
    config: &'a SiteConfig,
    clean: bool,
    build_time: Option<DateTime<Local>>,
}

impl<'a> SiteBuilder<'a> {
    pub fn new(config: &'a SiteConfig) -> Self {
        Self {
            config,
            clean: true,
            build_time: None,
        }
    }

    /// Remove and recreate the output directory before building (default on).
    pub fn clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    /// Pin the timestamp templates see as `build_time`/`current_year`.
    pub fn build_time(mut self, build_time: DateTime<Local>) -> Self {
        self.build_time = Some(build_time);
        self
    }

    pub fn build(&self) -> Result<BuildReport, BuildError> {
        let started = Instant::now();
        let build_time = self.build_time.unwrap_or_else(Local::now);
        let output_dir = self.config.output_dir();
        let mut report = BuildReport::default();

        if self.clean {
            clean_output(&output_dir)?;
            report.stages.push(BuildStage::Clean);
        } else {
            std::fs::create_dir_all(&output_dir).map_err(BuildError::io(&output_dir))?;
        }

        tracing::info!("Loading content data...");
        let data = DataCatalog::load(self.config.data_dir())?;
        report.stages.push(BuildStage::DataLoaded);

        tracing::info!("Building pages...");
        let sources = discover_pages(&self.config.pages_dir())?;
        self.render_pages(&sources, &data, &build_time, &output_dir, &mut report)?;
        report.stages.push(BuildStage::PagesRendered);

        tracing::info!("Copying static assets...");
        let static_dir = self.config.static_dir();
        report.assets =
            assets::copy_static(&static_dir, &output_dir).map_err(BuildError::io(&static_dir))?;
        report.stages.push(BuildStage::AssetsCopied);

        report.elapsed = started.elapsed();
        report.stages.push(BuildStage::Done);
        tracing::info!(
            "Build complete in {:.2}s, output: {}",
            report.elapsed.as_secs_f64(),
            output_dir.display()
        );

        Ok(report)
    }

    // Templates load on the first page that needs them, so a site without
    // pages builds without a template directory.
    fn render_pages(
        &self,
        sources: &[PathBuf],
        data: &DataCatalog,
        build_time: &DateTime<Local>,
        output_dir: &Path,
        report: &mut BuildReport,
    ) -> Result<(), BuildError> {
        let mut renderer: Option<TemplateRenderer> = None;

        for source in sources {
            let page = match Page::read(source) {
                Ok(page) => page,
                Err(PageError::NotFound(path)) => {
                    tracing::warn!("Page not found: {}", path.display());
                    report.skipped.push(path);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let renderer: &TemplateRenderer = match renderer {
                Some(ref loaded) => loaded,
                None => renderer.insert(TemplateRenderer::new(self.config.template_dir())?),
            };

            tracing::info!("Building {}...", display_name(source));
            let output_path = output_dir.join(page.output_name());
            let context = page_context(self.config, data, &page, build_time);
            renderer
                .render_to_file(page.layout(), &context, &output_path)
                .map_err(|source| BuildError::Template {
                    page: page.source.clone(),
                    source,
                })?;

            tracing::info!("Generated {}", page.output_name());
            report.pages.push(output_path);
        }

        Ok(())
    }
}

/// Load the config at `config_path` and run a full build.
pub fn build_site<P: AsRef<Path>>(config_path: P, clean: bool) -> Result<BuildReport, BuildError> {
    let config = SiteConfig::load(config_path)?;
    SiteBuilder::new(&config).clean(clean).build()
}

/// `*.md` files directly under `pages_dir`, sorted by name.
pub fn discover_pages(pages_dir: &Path) -> Result<Vec<PathBuf>, BuildError> {
    if !pages_dir.is_dir() {
        tracing::warn!("Pages directory not found: {}", pages_dir.display());
        return Ok(Vec::new());
    }

    let mut pages = Vec::new();
    for entry in std::fs::read_dir(pages_dir).map_err(BuildError::io(pages_dir))? {
        let path = entry.map_err(BuildError::io(pages_dir))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
            pages.push(path);
        }
    }
    pages.sort();

    Ok(pages)
}

fn clean_output(output_dir: &Path) -> Result<(), BuildError> {
    if output_dir.exists() {
        tracing::info!("Cleaning {}...", output_dir.display());
        std::fs::remove_dir_all(output_dir).map_err(BuildError::io(output_dir))?;
    }
    std::fs::create_dir_all(output_dir).map_err(BuildError::io(output_dir))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
