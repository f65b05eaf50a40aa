//! End-to-end extraction pipeline over a data-dump directory
//!
//! Phases run strictly in order: ingest every record family, repair the
//! merged tables, derive the quest DAG, build and cover the sources, wire
//! them together, then export. The directory layout mirrors the known
//! dumps: talk and dialog JSON files under `BinOutput/Talk/...`, quests
//! under `BinOutput/Quest`, the excel tables under `ExcelBinOutput`, and
//! the text maps under `TextMap`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::database::Database;
use crate::error::Result;
use crate::export::{self, ExportOptions};
use crate::formats::{self, AliasTable};
use crate::{quests, sources};

/// Directories holding talk group files, relative to the dump root.
const TALK_GROUP_DIRS: &[&str] = &[
    "BinOutput/Talk/ActivityGroup",
    "BinOutput/Talk/BlossomGroup",
    "BinOutput/Talk/GadgetGroup",
    "BinOutput/Talk/NpcGroup",
];

/// Directories holding dialog files. The bare `BinOutput/Talk` directory
/// itself holds stray dialog files and is scanned non-recursively last.
const DIALOG_DIRS: &[&str] = &[
    "BinOutput/Talk/Activity",
    "BinOutput/Talk/Blossom",
    "BinOutput/Talk/Coop",
    "BinOutput/Talk/FreeGroup",
    "BinOutput/Talk/Gadget",
    "BinOutput/Talk/Npc",
    "BinOutput/Talk/NpcOther",
    "BinOutput/Talk",
];

const QUEST_TALK_DIR: &str = "BinOutput/Talk/Quest";
const QUEST_DIR: &str = "BinOutput/Quest";
const EXCEL_DIR: &str = "ExcelBinOutput";

/// Talk ids known to be test data.
const DEFAULT_TALK_BLACKLIST: &[i64] = &[3];

/// Configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub remove_quest_cycles: bool,
    pub aliases: AliasTable,
    /// Dump-relative paths skipped during enumeration.
    pub file_blacklist: BTreeSet<PathBuf>,
    pub talk_blacklist: BTreeSet<i64>,
    pub export: ExportOptions,
}

impl PipelineConfig {
    pub fn new(data_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        PipelineConfig {
            data_dir: data_dir.into(),
            output_dir: output_dir.into(),
            remove_quest_cycles: true,
            aliases: AliasTable::default(),
            file_blacklist: BTreeSet::new(),
            talk_blacklist: DEFAULT_TALK_BLACKLIST.iter().copied().collect(),
            export: ExportOptions::default(),
        }
    }
}

/// Run the full pipeline and write every output file.
pub fn run(config: &PipelineConfig) -> Result<()> {
    let mut db = ingest(config)?;
    process(&mut db, config);
    load_texts(&mut db, config)?;
    write_outputs(&db, config)
}

/// Phase 1: parse every input family into the database.
pub fn ingest(config: &PipelineConfig) -> Result<Database> {
    let mut db = Database::with_talk_blacklist(config.talk_blacklist.iter().copied());
    let aliases = &config.aliases;
    let root = &config.data_dir;

    info!("parsing talk files");
    let mut talk_files = vec![
        root.join(EXCEL_DIR).join("TalkExcelConfigData.json"),
        root.join(EXCEL_DIR).join("RqTalkExcelConfigData.json"),
    ];
    for dir in TALK_GROUP_DIRS {
        talk_files.extend(json_files(root, dir, config));
    }
    for path in talk_files {
        let Some(document) = read_json(&path)? else {
            continue;
        };
        for item in unwrap_talks(&document, aliases) {
            if let Some(talk) = formats::parse_talk(item, aliases, &display(&path))? {
                db.add_talk(talk)?;
            }
        }
    }

    info!("parsing dialog files");
    let mut dialog_files = vec![root.join(EXCEL_DIR).join("DialogExcelConfigData.json")];
    for dir in DIALOG_DIRS {
        dialog_files.extend(json_files(root, dir, config));
    }
    for path in dialog_files {
        let Some(document) = read_json(&path)? else {
            continue;
        };
        let Some((items, talk_id)) = unwrap_dialogs(&document, aliases) else {
            info!(path = %path.display(), "ignoring non-dialog file");
            continue;
        };
        for item in items {
            db.add_dialog(formats::parse_dialog(item, talk_id, aliases, &display(&path))?)?;
        }
    }

    info!("parsing quest talk files");
    for path in json_files(root, QUEST_TALK_DIR, config) {
        let Some(document) = read_json(&path)? else {
            continue;
        };
        let Some(obj) = document.as_object() else {
            continue;
        };
        for item in obj.get("talks").and_then(Value::as_array).into_iter().flatten() {
            if let Some(talk) = formats::parse_talk(item, aliases, &display(&path))? {
                db.add_talk(talk)?;
            }
        }
        for item in obj
            .get("dialogList")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            db.add_dialog(formats::parse_dialog(item, None, aliases, &display(&path))?)?;
        }
    }

    info!("parsing quest files");
    for path in json_files(root, QUEST_DIR, config) {
        let Some(document) = read_json(&path)? else {
            continue;
        };
        db.add_quest(formats::parse_quest(&document, aliases, &display(&path))?)?;
    }

    info!("parsing chapter file");
    if let Some(document) = read_json(&root.join(EXCEL_DIR).join("ChapterExcelConfigData.json"))? {
        for item in document.as_array().into_iter().flatten() {
            let chapter = formats::parse_chapter(item, "ChapterExcelConfigData.json")?;
            db.add_chapter(chapter);
        }
    }

    info!("parsing codex tables");
    let excel = |name: &str| -> Result<Vec<Value>> {
        Ok(read_json(&root.join(EXCEL_DIR).join(name))?
            .and_then(|document| document.as_array().cloned())
            .unwrap_or_default())
    };
    db.avatars = formats::codex::collect_avatars(
        &excel("AvatarExcelConfigData.json")?,
        &excel("FetterInfoExcelConfigData.json")?,
        &excel("FettersExcelConfigData.json")?,
        &excel("FetterStoryExcelConfigData.json")?,
        aliases,
    );
    db.items = formats::codex::collect_items(
        &excel("MaterialExcelConfigData.json")?,
        &excel("MaterialCodexExcelConfigData.json")?,
    );
    db.weapons = formats::codex::collect_weapons(&excel("WeaponExcelConfigData.json")?);
    db.reliquary_sets = formats::codex::collect_reliquary_sets(
        &excel("ReliquaryExcelConfigData.json")?,
        &excel("ReliquarySetExcelConfigData.json")?,
        &excel("EquipAffixExcelConfigData.json")?,
    );

    Ok(db)
}

/// Phase 2: clean the tables and derive all graphs, sources, and traces.
pub fn process(db: &mut Database, config: &PipelineConfig) {
    db.link_prev_talks();
    let report = db.clean();
    info!(
        dropped = report.dropped_talks,
        total = report.talks_before,
        "cleaned talk table"
    );
    quests::connect_quests(db, config.remove_quest_cycles);
    sources::build_sources(db);
    sources::connect_sources(db);
}

/// Phase 3: load the localization tables for the export language.
pub fn load_texts(db: &mut Database, config: &PipelineConfig) -> Result<()> {
    let root = &config.data_dir;
    let lang = &config.export.lang;
    db.text_map = formats::load_text_map(root.join("TextMap").join(format!("TextMap{lang}.json")))?;
    db.npc_names = formats::load_npc_names(
        root.join(EXCEL_DIR).join("NpcExcelConfigData.json"),
        &db.text_map,
    )?;
    db.readables = formats::load_readables(root.join("Readable").join(lang))?;
    Ok(())
}

/// Phase 4: write every output document.
pub fn write_outputs(db: &Database, config: &PipelineConfig) -> Result<()> {
    std::fs::create_dir_all(&config.output_dir)?;
    let out = |name: &str| config.output_dir.join(name);
    export::export_dialogs(db, &out("dialog.json"), &config.export)?;
    export::export_quests(db, &out("quest.json"), &config.export)?;
    export::codex::export_avatars(db, &out("avatar.csv"), &config.export)?;
    export::codex::export_items(db, &out("item.csv"), &config.export)?;
    export::codex::export_weapons(db, &out("weapon.csv"), &config.export)?;
    export::codex::export_reliquaries(db, &out("reliquary.csv"), &config.export)?;
    Ok(())
}

/// JSON files directly under `dir`, sorted, minus the blacklist. A missing
/// directory is not an error; dumps vary by game version.
fn json_files(root: &Path, dir: &str, config: &PipelineConfig) -> Vec<PathBuf> {
    let full = root.join(dir);
    if !full.is_dir() {
        warn!(dir = %full.display(), "input directory missing");
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = WalkDir::new(&full)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .map(walkdir::DirEntry::into_path)
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("json"))
        .filter(|path| {
            path.strip_prefix(root)
                .map(|rel| !config.file_blacklist.contains(rel))
                .unwrap_or(true)
        })
        .collect();
    files.sort();
    files
}

fn read_json(path: &Path) -> Result<Option<Value>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "input file missing");
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };
    Ok(Some(serde_json::from_str(&text)?))
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// Peel the container of a talk file: a bare array, a `talks` wrapper (or
/// its aliases), or a single talk object.
fn unwrap_talks<'a>(document: &'a Value, aliases: &AliasTable) -> Vec<&'a Value> {
    match document {
        Value::Array(items) => items.iter().collect(),
        Value::Object(obj) => {
            if let Some(items) = aliases
                .container
                .value(obj, "talks")
                .and_then(Value::as_array)
            {
                items.iter().collect()
            } else {
                vec![document]
            }
        }
        _ => Vec::new(),
    }
}

/// Peel the container of a dialog file: a bare array, or a `dialogList`
/// wrapper (or aliases) with a file-level `talkId`. `None` marks files
/// that are not dialog data at all.
fn unwrap_dialogs<'a>(
    document: &'a Value,
    aliases: &AliasTable,
) -> Option<(Vec<&'a Value>, Option<i64>)> {
    match document {
        Value::Array(items) => {
            let plausible = items.first().is_none_or(|first| {
                first
                    .as_object()
                    .is_some_and(|obj| aliases.dialog.value(obj, "id").is_some())
            });
            plausible.then(|| (items.iter().collect(), None))
        }
        Value::Object(obj) => {
            // Placeholder files carrying only a talk reference hold no
            // dialog lines.
            if obj.len() == 2 && obj.contains_key("talkId") && obj.contains_key("type") {
                return Some((Vec::new(), None));
            }
            let talk_id = aliases
                .container
                .value(obj, "talkId")
                .and_then(crate::formats::common::as_i64)?;
            let items = aliases
                .container
                .value(obj, "dialogList")
                .and_then(Value::as_array)
                .map(|items| items.iter().collect())
                .unwrap_or_default();
            Some((items, Some(talk_id).filter(|&id| id >= 0)))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn talk_containers_unwrap() {
        let aliases = AliasTable::default();
        let wrapped = serde_json::json!({"talks": [{"id": 1}, {"id": 2}]});
        assert_eq!(unwrap_talks(&wrapped, &aliases).len(), 2);
        let bare = serde_json::json!([{"id": 1}]);
        assert_eq!(unwrap_talks(&bare, &aliases).len(), 1);
        let single = serde_json::json!({"id": 1, "initDialog": 10});
        assert_eq!(unwrap_talks(&single, &aliases).len(), 1);
    }

    #[test]
    fn dialog_containers_carry_the_file_talk_id() {
        let aliases = AliasTable::default();
        let wrapped = serde_json::json!({"talkId": 7, "dialogList": [{"id": 1}]});
        let (items, talk_id) = unwrap_dialogs(&wrapped, &aliases).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(talk_id, Some(7));

        let foreign = serde_json::json!({"somethingElse": true});
        assert!(unwrap_dialogs(&foreign, &aliases).is_none());

        let placeholder = serde_json::json!({"talkId": 7, "type": "X"});
        let (items, _) = unwrap_dialogs(&placeholder, &aliases).unwrap();
        assert!(items.is_empty());
    }
}
