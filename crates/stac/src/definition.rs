//! Dataset definitions: which COGs make up a collection and how they are
//! grouped into items.

use std::collections::BTreeMap;
use std::path::Path;

use cog_common::DatetimeRange;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use storage::ObjectStorage;
use tracing::{debug, warn};

use crate::error::{Result, StacError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDefinition {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Matched against the object key from its start.
    pub regex: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDefinition {
    pub collection: String,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub prefix: String,
    pub filename_regex: String,
    /// Regex whose first capture group is the item's date token.
    pub datetime_group: String,
    #[serde(default)]
    pub datetime_range: Option<DatetimeRange>,
    pub assets: BTreeMap<String, AssetDefinition>,
    /// Extra item properties.
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl DatasetDefinition {
    pub fn from_json(text: &str) -> Result<Self> {
        let def: Self = serde_json::from_str(text)?;
        def.validate()?;
        Ok(def)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let def: Self = serde_yaml::from_str(text)?;
        def.validate()?;
        Ok(def)
    }

    /// Load a `.json`, `.yaml` or `.yml` definition.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text),
            _ => Self::from_yaml(&text),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.collection.trim().is_empty() {
            return Err(StacError::Definition("collection is empty".to_string()));
        }
        if self.assets.is_empty() {
            return Err(StacError::Definition("no assets defined".to_string()));
        }
        self.compile().map(|_| ())
    }

    pub fn compile(&self) -> Result<CompiledDefinition> {
        let compile = |p: &str| Regex::new(p).map_err(|e| StacError::pattern(p, e));
        Ok(CompiledDefinition {
            filename: compile(&self.filename_regex)?,
            datetime: compile(&self.datetime_group)?,
            assets: self
                .assets
                .iter()
                .map(|(k, a)| Ok((k.clone(), compile(&a.regex)?)))
                .collect::<Result<_>>()?,
        })
    }
}

/// Files making up one item: asset name to object key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemGroup {
    pub date_key: String,
    pub assets: BTreeMap<String, String>,
}

pub struct CompiledDefinition {
    filename: Regex,
    datetime: Regex,
    assets: Vec<(String, Regex)>,
}

/// Captures of a match anchored at the start of `text`.
fn match_start<'t>(re: &Regex, text: &'t str) -> Option<Captures<'t>> {
    re.captures(text)
        .filter(|caps| caps.get(0).is_some_and(|m| m.start() == 0))
}

impl CompiledDefinition {
    pub fn matches_filename(&self, key: &str) -> bool {
        match_start(&self.filename, key).is_some()
    }

    /// Date token of a key, from the first capture group.
    pub fn date_key(&self, key: &str) -> Option<String> {
        match_start(&self.datetime, key)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Group keys into items by date token.
    ///
    /// Keys are filtered with `filename_regex`, assigned to every asset
    /// whose regex matches and grouped by date. When several keys match the
    /// same asset and date, the last one in `keys` order is kept.
    pub fn group(&self, keys: &[String]) -> Vec<ItemGroup> {
        let mut items: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();

        for key in keys.iter().filter(|k| self.matches_filename(k)) {
            let Some(date) = self.date_key(key) else {
                debug!(key = %key, "No date group, skipping");
                continue;
            };
            for (asset, re) in &self.assets {
                if match_start(re, key).is_some() {
                    items
                        .entry(date.clone())
                        .or_default()
                        .insert(asset.clone(), key.clone());
                }
            }
        }

        items
            .into_iter()
            .map(|(date_key, assets)| {
                if assets.len() < self.assets.len() {
                    warn!(date = %date_key, found = assets.len(), expected = self.assets.len(), "Item is missing assets");
                }
                ItemGroup { date_key, assets }
            })
            .collect()
    }

    /// List the store under `prefix` and group what matches.
    pub async fn discover(&self, storage: &ObjectStorage, prefix: &str) -> Result<Vec<ItemGroup>> {
        let keys: Vec<String> = storage
            .list(prefix)
            .await?
            .into_iter()
            .map(|o| o.key)
            .collect();
        let groups = self.group(&keys);
        debug!(listed = keys.len(), items = groups.len(), "Discovered items");
        Ok(groups)
    }
}
