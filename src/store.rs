//! JSON persistence: seen-state and rolling histories.
//!
//! ```text
//! state.json            {"seen": {"<guid>": true, ...}}
//! <history>/<slug>.json [Item, ...] newest first
//! <history>/all.json    [Item, ...] newest first
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::item::Item;

/// Read a JSON document. `Ok(None)` when the file does not exist; a file that
/// exists but does not parse is an error.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io(path, e)),
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| Error::json(path, e))
}

/// Pretty-print `value` to `path`, creating parent directories.
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let mut text = serde_json::to_string_pretty(value).map_err(|e| Error::json(path, e))?;
    text.push('\n');
    fs::write(path, text).map_err(|e| Error::io(path, e))
}

/// Every guid ever published. Grows without bound.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeenState {
    #[serde(default)]
    seen: BTreeMap<String, bool>,
}

impl SeenState {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(load_json(path)?.unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_json(path, self)
    }

    pub fn is_seen(&self, guid: &str) -> bool {
        self.seen.get(guid).copied().unwrap_or(false)
    }

    pub fn mark_seen(&mut self, guid: &str) {
        self.seen.insert(guid.to_string(), true);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Rolling histories stored one file per slug.
pub struct HistoryStore {
    root: PathBuf,
}

impl HistoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn load(&self, slug: &str) -> Result<Vec<Item>> {
        Ok(load_json(&self.path(slug))?.unwrap_or_default())
    }

    pub fn save(&self, slug: &str, items: &[Item]) -> Result<()> {
        save_json(&self.path(slug), items)
    }

    fn path(&self, slug: &str) -> PathBuf {
        self.root.join(format!("{slug}.json"))
    }
}

/// New items first, in their given order, then the existing items they do not
/// replace, truncated to `cap`.
pub fn merge_items(existing: &[Item], new_items: &[Item], cap: usize) -> Vec<Item> {
    let fresh: HashSet<&str> = new_items.iter().map(|it| it.guid.as_str()).collect();
    new_items
        .iter()
        .chain(existing.iter().filter(|it| !fresh.contains(it.guid.as_str())))
        .take(cap)
        .cloned()
        .collect()
}
