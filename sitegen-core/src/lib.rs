pub mod assets;
pub mod backup;
pub mod builder;
pub mod config;
pub mod context;
pub mod data;
pub mod markdown;
pub mod metrics;
pub mod page;
pub mod template;
pub mod validate;

// Re-export main types
pub use builder::{BuildError, BuildReport, BuildStage, SiteBuilder, build_site};
pub use config::{BuildPaths, ConfigError, SiteConfig};
pub use data::{DataCatalog, DataError};
pub use page::{Page, PageError, output_file_name};
pub use template::{TemplateError, TemplateRenderer};
pub use validate::{
    MarkupValidator, NoopValidator, StructureValidator, ValidationReport, Validator,
};
