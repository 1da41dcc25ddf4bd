//! Map and dataset identifiers of the form `name[:layer]@scope`.
//!
//! Identifiers are opaque keys. The only structure the catalog relies on is
//! the owning scope (used for ownership checks) and the optional layer of a
//! vector map.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog_error::CatalogError;

fn valid_part(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn split_scope(s: &str) -> Result<(&str, &str), CatalogError> {
    let invalid = || CatalogError::InvalidIdentifier(s.to_string());
    let (left, scope) = s.rsplit_once('@').ok_or_else(invalid)?;
    if !valid_part(scope) {
        return Err(invalid());
    }
    Ok((left, scope))
}

/// Identifier of a map: `name[:layer]@scope`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MapId {
    name: String,
    layer: Option<String>,
    scope: String,
}

impl MapId {
    pub fn new(name: &str, layer: Option<&str>, scope: &str) -> Result<Self, CatalogError> {
        let id = Self {
            name: name.to_string(),
            layer: layer.map(str::to_string),
            scope: scope.to_string(),
        };
        let ok = valid_part(name) && valid_part(scope) && layer.is_none_or(valid_part);
        if ok { Ok(id) } else { Err(CatalogError::InvalidIdentifier(id.to_string())) }
    }

    /// Parse `name@scope` or `name:layer@scope`.
    pub fn parse(s: &str) -> Result<Self, CatalogError> {
        let (left, scope) = split_scope(s)?;
        let (name, layer) = match left.split_once(':') {
            Some((n, l)) => (n, Some(l)),
            None => (left, None),
        };
        Self::new(name, layer, scope).map_err(|_| CatalogError::InvalidIdentifier(s.to_string()))
    }

    /// Parse a bare name and place it into `scope` when no scope is given.
    pub fn parse_in_scope(s: &str, scope: &str) -> Result<Self, CatalogError> {
        if s.contains('@') { Self::parse(s) } else { Self::parse(&format!("{s}@{scope}")) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layer(&self) -> Option<&str> {
        self.layer.as_deref()
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// `name@scope` without the layer.
    pub fn map_id(&self) -> String {
        format!("{}@{}", self.name, self.scope)
    }

    /// Same map under a new name, keeping layer and scope.
    pub fn with_name(&self, name: &str) -> Result<Self, CatalogError> {
        Self::new(name, self.layer.as_deref(), &self.scope)
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.layer {
            Some(l) => write!(f, "{}:{}@{}", self.name, l, self.scope),
            None => write!(f, "{}@{}", self.name, self.scope),
        }
    }
}

impl FromStr for MapId {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MapId {
    type Error = CatalogError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<MapId> for String {
    fn from(id: MapId) -> String {
        id.to_string()
    }
}

/// Identifier of a space time dataset: `name@scope`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasetId {
    name: String,
    scope: String,
}

impl DatasetId {
    pub fn new(name: &str, scope: &str) -> Result<Self, CatalogError> {
        if valid_part(name) && valid_part(scope) {
            Ok(Self { name: name.to_string(), scope: scope.to_string() })
        } else {
            Err(CatalogError::InvalidIdentifier(format!("{name}@{scope}")))
        }
    }

    pub fn parse(s: &str) -> Result<Self, CatalogError> {
        let (name, scope) = split_scope(s)?;
        Self::new(name, scope).map_err(|_| CatalogError::InvalidIdentifier(s.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.scope)
    }
}

impl FromStr for DatasetId {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DatasetId {
    type Error = CatalogError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<DatasetId> for String {
    fn from(id: DatasetId) -> String {
        id.to_string()
    }
}
