//! Text map and NPC name table loading
//!
//! The text map is a single large JSON object mapping decimal hash strings
//! to localized strings. NPC display names resolve through it.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use tracing::info;

use crate::error::Result;

use super::common::{as_hash, as_i64};

/// Load `TextMap<LANG>.json` into a hash → text map.
pub fn load_text_map<P: AsRef<Path>>(path: P) -> Result<BTreeMap<i64, String>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let raw: BTreeMap<String, String> = serde_json::from_str(&text)?;
    let map: BTreeMap<i64, String> = raw
        .into_iter()
        .filter_map(|(key, value)| key.parse::<i64>().ok().map(|hash| (hash, value)))
        .collect();
    info!(entries = map.len(), "loaded text map");
    Ok(map)
}

/// Load the NPC table and resolve display names through the text map.
/// NPCs whose name hash is absent or empty are skipped.
pub fn load_npc_names<P: AsRef<Path>>(
    path: P,
    text_map: &BTreeMap<i64, String>,
) -> Result<BTreeMap<i64, String>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let rows: Vec<Value> = serde_json::from_str(&text)?;
    let mut names = BTreeMap::new();
    for row in &rows {
        let Some(obj) = row.as_object() else { continue };
        let (Some(id), Some(hash)) = (
            obj.get("id").and_then(as_i64),
            obj.get("nameTextMapHash").and_then(as_hash),
        ) else {
            continue;
        };
        if let Some(name) = text_map.get(&hash).filter(|name| !name.is_empty()) {
            names.insert(id, name.clone());
        }
    }
    Ok(names)
}

/// Load the readable `.txt` files of a language directory, keyed by file
/// stem (`Weapon11101`, `Relic15001_1`, ...).
pub fn load_readables<P: AsRef<Path>>(dir: P) -> Result<BTreeMap<String, String>> {
    let mut readables = BTreeMap::new();
    let entries = match std::fs::read_dir(dir.as_ref()) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            info!(dir = %dir.as_ref().display(), "no readable directory");
            return Ok(readables);
        }
        Err(err) => return Err(err.into()),
    };
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("txt") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        readables.insert(stem.to_string(), std::fs::read_to_string(&path)?);
    }
    Ok(readables)
}
