// src/catalog/sources.rs

use anyhow::{Context, Result};
use serde_json::Value;
use std::{collections::BTreeMap, fs, path::Path};
use tracing::{debug, warn};

/// Group holding the patterns shared by every "other" dataset, and the
/// static URLs in the static file.
pub const OTHERS_GROUP: &str = "others";
/// Group holding the dataset prefixes to consolidate.
pub const PREFIXES_GROUP: &str = "prefixes";

/// Named lists of strings loaded from a JSON object such as
/// `{"cig": ["https://..."], "others": [...]}`.
#[derive(Debug, Clone, Default)]
pub struct SourceFile {
    groups: BTreeMap<String, Vec<String>>,
}

impl SourceFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading URL source {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing URL source {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let root: BTreeMap<String, Value> = serde_json::from_str(text)?;
        let mut groups = BTreeMap::new();
        for (name, value) in root {
            match serde_json::from_value::<Vec<String>>(value) {
                Ok(items) => {
                    groups.insert(name, items);
                }
                Err(e) => warn!(group = %name, error = %e, "ignoring non string-list group"),
            }
        }
        Ok(Self { groups })
    }

    /// Entries of `group` in file order; a missing group is empty.
    pub fn group(&self, group: &str) -> Vec<String> {
        match self.groups.get(group) {
            Some(items) => {
                debug!(group, count = items.len(), "loaded source group");
                items.clone()
            }
            None => {
                warn!(group, "source group not found");
                Vec::new()
            }
        }
    }
}

/// Read the ordered entries of `group` from the JSON file at `path`.
pub fn read_configured_sources(path: impl AsRef<Path>, group: &str) -> Result<Vec<String>> {
    Ok(SourceFile::load(path)?.group(group))
}
