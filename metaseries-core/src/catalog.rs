//! Catalog of named series, loaded from TOML.
//!
//! Each `[[series]]` table maps a display name to the source, symbol,
//! optional field and native frequency used to fetch it. Entries are checked
//! against [`SourceRules`] at load time so a bad field never reaches an
//! adapter.

use crate::domain::{FetchRequest, Frequency, SeriesRequest};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("read catalog file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse catalog TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate catalog name '{0}'")]
    DuplicateName(String),

    #[error("name '{0}' not found in catalog")]
    NameNotFound(String),

    #[error("'{name}': source '{source_name}' requires a field")]
    FieldRequired { name: String, source_name: String },

    #[error("'{name}': source '{source_name}' does not accept a field (got '{field}')")]
    FieldForbidden {
        name: String,
        source_name: String,
        field: String,
    },

    #[error("'{name}': {reason}")]
    Invalid { name: String, reason: String },
}

/// Whether a source expects a field alongside the symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldRule {
    Required,
    Forbidden,
    Optional,
}

/// Per-source field rules. Sources without a rule accept either form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRules {
    rules: BTreeMap<String, FieldRule>,
}

impl Default for SourceRules {
    fn default() -> Self {
        let rules = [
            ("bloomberg", FieldRule::Required),
            ("gsquant", FieldRule::Required),
            ("macrobond", FieldRule::Optional),
            ("localfile", FieldRule::Forbidden),
        ]
        .into_iter()
        .map(|(source, rule)| (source.to_string(), rule))
        .collect();
        Self { rules }
    }
}

impl SourceRules {
    /// Rules table with no entries; every source is optional.
    pub fn empty() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, source: impl Into<String>, rule: FieldRule) {
        self.rules.insert(source.into(), rule);
    }

    pub fn with(mut self, source: impl Into<String>, rule: FieldRule) -> Self {
        self.set(source, rule);
        self
    }

    pub fn rule_for(&self, source: &str) -> FieldRule {
        self.rules.get(source).copied().unwrap_or(FieldRule::Optional)
    }

    /// Check one `(source, field)` pairing. `name` labels the error.
    pub fn check(&self, name: &str, source: &str, field: Option<&str>) -> Result<(), CatalogError> {
        match (self.rule_for(source), field) {
            (FieldRule::Required, None) => Err(CatalogError::FieldRequired {
                name: name.to_string(),
                source_name: source.to_string(),
            }),
            (FieldRule::Forbidden, Some(field)) => Err(CatalogError::FieldForbidden {
                name: name.to_string(),
                source_name: source.to_string(),
                field: field.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// One named series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogEntry {
    pub name: String,
    pub source: String,
    pub symbol: String,
    pub frequency: Frequency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl CatalogEntry {
    /// Request for this entry over `[start, end]`.
    pub fn request(&self, start: NaiveDate, end: NaiveDate) -> SeriesRequest {
        SeriesRequest::new(
            &self.name,
            FetchRequest::new(&self.source, &self.symbol, self.field.clone(), start, end),
            self.frequency,
        )
    }

    fn validate(&self, rules: &SourceRules) -> Result<(), CatalogError> {
        for (what, value) in [("name", &self.name), ("source", &self.source), ("symbol", &self.symbol)] {
            if value.trim().is_empty() {
                return Err(CatalogError::Invalid {
                    name: self.name.clone(),
                    reason: format!("{what} must not be empty"),
                });
            }
        }
        if self.field.as_deref() == Some("") {
            return Err(CatalogError::Invalid {
                name: self.name.clone(),
                reason: "field must be omitted rather than empty".into(),
            });
        }
        rules.check(&self.name, &self.source, self.field.as_deref())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    series: Vec<CatalogEntry>,
}

/// Name -> entry map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from a TOML file.
    pub fn from_file(path: &Path, rules: &SourceRules) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_toml(&content, rules)?;
        tracing::info!(path = %path.display(), entries = catalog.len(), "catalog_loaded");
        Ok(catalog)
    }

    /// Load several files into one catalog; names must be unique across all.
    pub fn from_files<P: AsRef<Path>>(paths: &[P], rules: &SourceRules) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for path in paths {
            catalog.merge(Self::from_file(path.as_ref(), rules)?)?;
        }
        Ok(catalog)
    }

    /// Parse a catalog from a TOML string.
    pub fn from_toml(content: &str, rules: &SourceRules) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(content)?;
        Self::from_entries(file.series, rules)
    }

    pub fn from_entries(
        entries: impl IntoIterator<Item = CatalogEntry>,
        rules: &SourceRules,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for entry in entries {
            entry.validate(rules)?;
            catalog.insert(entry)?;
        }
        Ok(catalog)
    }

    fn insert(&mut self, entry: CatalogEntry) -> Result<(), CatalogError> {
        if self.entries.contains_key(&entry.name) {
            return Err(CatalogError::DuplicateName(entry.name));
        }
        self.entries.insert(entry.name.clone(), entry);
        Ok(())
    }

    /// Move every entry of `other` into `self`. Fails without modifying
    /// `self` if any name already exists.
    pub fn merge(&mut self, other: Catalog) -> Result<(), CatalogError> {
        if let Some(name) = other.entries.keys().find(|name| self.entries.contains_key(*name)) {
            return Err(CatalogError::DuplicateName(name.clone()));
        }
        self.entries.extend(other.entries);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&CatalogEntry, CatalogError> {
        self.entries
            .get(name)
            .ok_or_else(|| CatalogError::NameNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
