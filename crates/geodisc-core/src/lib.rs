pub mod app_config;
pub mod categories;
pub mod config;
pub mod error;
pub mod types;

pub use app_config::{AppConfig, Environment};
pub use categories::{load_categories, Category, CategoryCatalog};
pub use config::{load_app_config, load_app_config_from_env};
pub use error::BackendError;
pub use types::{
    CategoryBadge, Coordinate, EntityKind, Happening, PageInfo, Place, SearchPage, SearchQuery,
    TypeSelector,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read category catalog at {path}: {source}")]
    CategoriesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse category catalog: {0}")]
    CategoriesFileParse(#[source] serde_yaml::Error),

    #[error("category catalog validation failed: {0}")]
    Validation(String),
}
