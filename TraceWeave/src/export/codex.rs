//! Codex CSV export: avatars, items, weapons, reliquary sets
//!
//! Flat tables for downstream corpus tooling. Each row resolves its text
//! hashes through the text map, falls back to the unknown markers, and is
//! dropped when it carries unreleased tags.

use std::path::Path;

use tracing::info;

use crate::database::Database;
use crate::error::Result;

use super::dialogs::{AVATAR_ID_AETHER, AVATAR_ID_LUMINE};
use super::text::TextFilter;
use super::{ExportOptions, TravellerSex};

/// Test-only avatars never shipped in the game.
const AVATAR_ID_BLACKLIST: &[i64] = &[10000001];

/// Up to this many stories are exported per avatar.
const AVATAR_STORY_COLUMNS: usize = 8;

/// Export `avatar.csv`.
pub fn export_avatars(db: &Database, path: &Path, opts: &ExportOptions) -> Result<()> {
    info!(path = %path.display(), "exporting avatar codex");
    let filter = TextFilter::new(opts);
    let resolve = |hash: Option<i64>, fallback: &str| -> String {
        match hash.and_then(|hash| db.text_map.get(&hash)) {
            Some(text) => {
                let text = filter.strip_markup(text);
                let text = filter.substitute(&text, &opts.traveller_name);
                let text = filter.normalize_quotes(&text);
                filter.normalize_newlines(&text)
            }
            None => fallback.to_string(),
        }
    };
    let ignored_twin = match opts.traveller_sex {
        TravellerSex::Male => AVATAR_ID_LUMINE,
        TravellerSex::Female => AVATAR_ID_AETHER,
    };

    let mut writer = csv::Writer::from_path(path)?;
    let mut header: Vec<String> = [
        "id",
        "name",
        "description",
        "birth_month",
        "birth_day",
        "affiliation",
        "vision_before",
        "vision_after",
        "vision_name_before",
        "vision_name_after",
        "constellation_before",
        "constellation_after",
        "title",
        "detail",
        "association",
    ]
    .iter()
    .map(ToString::to_string)
    .collect();
    for story in 1..=AVATAR_STORY_COLUMNS {
        header.push(format!("story_title_{story}"));
        header.push(format!("story_{story}"));
    }
    writer.write_record(&header)?;

    for (&avatar_id, avatar) in &db.avatars {
        if avatar_id == ignored_twin || AVATAR_ID_BLACKLIST.contains(&avatar_id) {
            continue;
        }
        let mut record = vec![
            avatar_id.to_string(),
            resolve(avatar.name_hash, &opts.unknown_name),
            resolve(avatar.desc_hash, &opts.unknown_text),
            avatar.birth_month.to_string(),
            avatar.birth_day.to_string(),
            resolve(avatar.native_hash, &opts.unknown_text),
            resolve(avatar.vision_before_hash, &opts.unknown_text),
            resolve(avatar.vision_after_hash, &opts.unknown_text),
            resolve(avatar.vision_name_before_hash, &opts.unknown_text),
            resolve(avatar.vision_name_after_hash, &opts.unknown_text),
            resolve(avatar.constellation_before_hash, &opts.unknown_text),
            resolve(avatar.constellation_after_hash, &opts.unknown_text),
            resolve(avatar.title_hash, &opts.unknown_text),
            resolve(avatar.detail_hash, &opts.unknown_text),
            avatar.assoc_type.clone().unwrap_or_default(),
        ];
        for story in 0..AVATAR_STORY_COLUMNS {
            let (title_hash, content_hash) = avatar
                .stories
                .get(story)
                .copied()
                .unwrap_or((None, None));
            record.push(resolve(title_hash, &opts.unknown_text));
            record.push(resolve(content_hash, &opts.unknown_text));
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Export `item.csv`.
pub fn export_items(db: &Database, path: &Path, opts: &ExportOptions) -> Result<()> {
    info!(path = %path.display(), "exporting item codex");
    let filter = TextFilter::new(opts);
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["id", "name", "description"])?;
    for (&item_id, item) in &db.items {
        if opts.remove_absent_text {
            let described = item
                .desc_hash
                .is_some_and(|hash| db.text_map.contains_key(&hash))
                || item
                    .codex_desc_hash
                    .is_some_and(|hash| db.text_map.contains_key(&hash));
            let named = item
                .name_hash
                .is_some_and(|hash| db.text_map.contains_key(&hash));
            if !named || !described {
                continue;
            }
        }
        let name = lookup(db, &filter, item.name_hash, &opts.unknown_name);
        // The codex description stands in when the primary one is absent.
        let description = match item.desc_hash.and_then(|hash| db.text_map.get(&hash)) {
            Some(_) => lookup(db, &filter, item.desc_hash, &opts.unknown_text),
            None => lookup(db, &filter, item.codex_desc_hash, &opts.unknown_text),
        };
        if filter.is_unreleased(&name) || filter.is_unreleased(&description) {
            continue;
        }
        writer.write_record(&[item_id.to_string(), name, description])?;
    }
    writer.flush()?;
    Ok(())
}

/// Export `weapon.csv`.
pub fn export_weapons(db: &Database, path: &Path, opts: &ExportOptions) -> Result<()> {
    info!(path = %path.display(), "exporting weapon codex");
    let filter = TextFilter::new(opts);
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["id", "name", "type", "rank_level", "description", "story"])?;
    for (&weapon_id, weapon) in &db.weapons {
        let story_key = format!("Weapon{weapon_id}");
        if opts.remove_absent_text {
            let complete = weapon
                .name_hash
                .is_some_and(|hash| db.text_map.contains_key(&hash))
                && weapon
                    .desc_hash
                    .is_some_and(|hash| db.text_map.contains_key(&hash))
                && db.readables.contains_key(&story_key);
            if !complete {
                continue;
            }
        }
        let name = tidy_lookup(db, &filter, weapon.name_hash, &opts.unknown_name);
        let description = tidy_lookup(db, &filter, weapon.desc_hash, &opts.unknown_text);
        let story = db
            .readables
            .get(&story_key)
            .map_or_else(|| opts.unknown_text.clone(), |text| filter.tidy(text));
        if filter.is_unreleased(&name) || filter.is_unreleased(&description) {
            continue;
        }
        writer.write_record(&[
            weapon_id.to_string(),
            name,
            weapon.kind.clone(),
            weapon.rank_level.to_string(),
            description,
            story,
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Export `reliquary.csv`: one row per set, slot-indexed columns.
pub fn export_reliquaries(db: &Database, path: &Path, opts: &ExportOptions) -> Result<()> {
    info!(path = %path.display(), "exporting reliquary codex");
    let filter = TextFilter::new(opts);
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec!["id".to_string(), "set_name".to_string()];
    for slot in 1..=crate::database::types::RELIQUARY_SLOTS {
        header.push(format!("name_{slot}"));
        header.push(format!("description_{slot}"));
        header.push(format!("story_{slot}"));
    }
    writer.write_record(&header)?;

    for (&set_id, set) in &db.reliquary_sets {
        let mut record = vec![
            set_id.to_string(),
            tidy_lookup(db, &filter, set.set_name_hash, &opts.unknown_name),
        ];
        for slot in 0..crate::database::types::RELIQUARY_SLOTS {
            record.push(tidy_lookup(db, &filter, set.name_hashes[slot], &opts.unknown_name));
            record.push(tidy_lookup(db, &filter, set.desc_hashes[slot], &opts.unknown_text));
            // A missing piece exports an empty story rather than an
            // unknown marker.
            let story = if set.name_hashes[slot].is_none() {
                String::new()
            } else {
                db.readables
                    .get(&format!("Relic{set_id}_{}", slot + 1))
                    .map_or_else(|| opts.unknown_text.clone(), |text| filter.tidy(text))
            };
            record.push(story);
        }
        if record
            .iter()
            .skip(1)
            .any(|text| filter.is_unreleased(text))
        {
            continue;
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn lookup(db: &Database, filter: &TextFilter<'_>, hash: Option<i64>, fallback: &str) -> String {
    match hash.and_then(|hash| db.text_map.get(&hash)) {
        Some(text) => {
            let text = filter.strip_markup(text);
            let text = filter.normalize_quotes(&text);
            filter.normalize_newlines(&text)
        }
        None => fallback.to_string(),
    }
}

fn tidy_lookup(db: &Database, filter: &TextFilter<'_>, hash: Option<i64>, fallback: &str) -> String {
    match hash.and_then(|hash| db.text_map.get(&hash)) {
        Some(text) => filter.tidy(text),
        None => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::types::{Item, Weapon};

    #[test]
    fn item_rows_fall_back_to_codex_description() {
        let mut db = Database::new();
        db.text_map.insert(10, "Apple".to_string());
        db.text_map.insert(12, "From the codex.".to_string());
        db.items.insert(
            1,
            Item {
                id: 1,
                name_hash: Some(10),
                desc_hash: Some(11), // absent from the text map
                codex_desc_hash: Some(12),
            },
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("item.csv");
        export_items(&db, &path, &ExportOptions::default()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("From the codex."));
    }

    #[test]
    fn weapons_without_story_are_dropped_when_absent_text_removed() {
        let mut db = Database::new();
        db.text_map.insert(10, "Sword".to_string());
        db.text_map.insert(11, "Sharp.".to_string());
        db.weapons.insert(
            1,
            Weapon {
                id: 1,
                kind: "WEAPON_SWORD_ONE_HAND".to_string(),
                rank_level: 4,
                name_hash: Some(10),
                desc_hash: Some(11),
            },
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weapon.csv");

        export_weapons(&db, &path, &ExportOptions::default()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("Sword"));

        db.readables
            .insert("Weapon1".to_string(), "Forged long ago.".to_string());
        export_weapons(&db, &path, &ExportOptions::default()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Forged long ago."));
    }
}
