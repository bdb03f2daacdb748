//! Named dataset endpoints, loaded from a JSON catalog file.

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;

use crate::fetch::DatasetRequest;

/// Environment variable naming the catalog file.
pub const DATASETS_CONFIG_ENV: &str = "DATASETS_CONFIG";
/// Catalog path used when [`DATASETS_CONFIG_ENV`] is unset.
pub const DEFAULT_DATASETS_CONFIG: &str = "datasets.json";
/// Environment variable holding the portal application token.
pub const APP_TOKEN_ENV: &str = "OPEN_DATA_APP_TOKEN";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DatasetEntry {
    pub endpoint: String,
    #[serde(default)]
    pub limit: Option<NonZeroUsize>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Maps dataset names to their endpoints.
///
/// Stored as a plain JSON object on disk:
/// ```json
/// {
///   "traffic_volume": {
///     "endpoint": "https://data.cityofnewyork.us/resource/7ym2-wayt.json",
///     "limit": 5000,
///     "description": "Automated traffic volume counts"
///   }
/// }
/// ```
#[derive(Debug, Default)]
pub struct DatasetCatalog {
    entries: BTreeMap<String, DatasetEntry>,
}

impl DatasetCatalog {
    /// Loads the catalog from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset catalog '{path}'"))?;
        Self::from_json(&content).with_context(|| format!("Invalid dataset catalog '{path}'"))
    }

    /// Loads the catalog named by `DATASETS_CONFIG`, or `datasets.json`.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var(DATASETS_CONFIG_ENV)
            .unwrap_or_else(|_| DEFAULT_DATASETS_CONFIG.to_string());
        Self::load(&path)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let entries: BTreeMap<String, DatasetEntry> = serde_json::from_str(content)?;
        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&DatasetEntry> {
        self.entries.get(name)
    }

    /// Iterates over all `(name, entry)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DatasetEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds the fetch request for `name`. An explicit `limit` wins over the
    /// catalog's, which wins over the default.
    pub fn request(&self, name: &str, limit: Option<NonZeroUsize>) -> Result<DatasetRequest> {
        let entry = self
            .get(name)
            .ok_or_else(|| anyhow!("Dataset '{name}' is not in the catalog"))?;

        let mut req = DatasetRequest::new(&entry.endpoint)?;
        if let Some(limit) = limit.or(entry.limit) {
            req = req.with_limit(limit);
        }
        Ok(req)
    }
}

/// Reads the optional application token from the environment.
pub fn app_token_from_env() -> Option<String> {
    std::env::var(APP_TOKEN_ENV)
        .ok()
        .filter(|t| !t.trim().is_empty())
}
