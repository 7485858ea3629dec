use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// A catalog entry. The list is fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCatalog {
    pub categories: Vec<Category>,
}

impl CategoryCatalog {
    #[must_use]
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    #[must_use]
    pub fn find_by_slug(&self, slug: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.slug == slug)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.len()
    }
}

/// Load and validate a category catalog from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_categories(path: &Path) -> Result<CategoryCatalog, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::CategoriesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let catalog: CategoryCatalog =
        serde_yaml::from_str(&content).map_err(ConfigError::CategoriesFileParse)?;

    validate_categories(&catalog)?;

    Ok(catalog)
}

/// Checks names are non-empty and ids/slugs are unique.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] describing the first offending entry.
pub fn validate_categories(catalog: &CategoryCatalog) -> Result<(), ConfigError> {
    let mut seen_ids = HashSet::new();
    let mut seen_slugs = HashSet::new();

    for category in &catalog.categories {
        if category.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "category name must be non-empty".to_string(),
            ));
        }

        if category.slug.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "category '{}' has an empty slug",
                category.name
            )));
        }

        if !seen_ids.insert(category.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate category id: '{}'",
                category.id
            )));
        }

        if !seen_slugs.insert(category.slug.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate category slug: '{}' (from category '{}')",
                category.slug, category.name
            )));
        }
    }

    Ok(())
}
