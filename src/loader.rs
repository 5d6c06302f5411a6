//! Catalog file loading.

use std::path::{Path, PathBuf};
use stmgr_core::{Catalog, CoreError};
use thiserror::Error;

/// Catalog loading and lookup errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported catalog format '{}' (expected .yaml, .yml or .json)", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("invalid catalog '{}': {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: CoreError,
    },

    #[error("entity not found in catalog: {0}")]
    UnknownEntity(String),
}

enum Format {
    Json,
    Yaml,
}

fn format_of(path: &Path) -> Option<Format> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "json" => Some(Format::Json),
        "yaml" | "yml" => Some(Format::Yaml),
        _ => None,
    }
}

/// Loads a catalog, choosing the parser by file extension.
pub fn load_catalog(path: &Path) -> Result<Catalog, CatalogError> {
    let format = format_of(path).ok_or_else(|| CatalogError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;

    let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let parsed = match format {
        Format::Json => Catalog::from_json_str(&content),
        Format::Yaml => Catalog::from_yaml_str(&content),
    };

    let catalog = parsed.map_err(|source| CatalogError::Invalid {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(
        "Loaded catalog {}: {} definitions, {} entities",
        path.display(),
        catalog.definitions().count(),
        catalog.entities().count()
    );

    Ok(catalog)
}
