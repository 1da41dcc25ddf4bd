use serde::{Deserialize, Serialize};

use crate::catalog_error::CatalogError;

/// Catalog-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Scope that owns every object created through this catalog handle.
    pub current_scope: String,
    /// Refuse to mutate datasets and maps owned by another scope.
    pub scope_check: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            current_scope: "PERMANENT".into(),
            scope_check: true,
        }
    }
}

impl CatalogConfig {
    pub fn with_scope(scope: impl Into<String>) -> Self {
        Self { current_scope: scope.into(), ..Self::default() }
    }

    /// Fails with `ScopeMismatch` when `owner` is not the current scope and
    /// checks are enabled.
    pub fn check_scope(&self, id: &str, owner: &str) -> Result<(), CatalogError> {
        if self.scope_check && owner != self.current_scope {
            return Err(CatalogError::ScopeMismatch {
                id: id.to_string(),
                current: self.current_scope.clone(),
                found: owner.to_string(),
            });
        }
        Ok(())
    }
}
