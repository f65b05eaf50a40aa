//! Quest and chapter index export
//!
//! Emits `quest.json`: chapters, quests, and subquests with their texts
//! resolved, unreleased records removed, and cross-reference lists filtered
//! down to the records that survived.

use std::collections::BTreeSet;
use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;

use crate::database::Database;
use crate::error::{Error, Result};

use super::ExportOptions;
use super::text::TextFilter;

#[derive(Debug, Serialize)]
struct ChapterOut {
    group_id: i64,
    begin_subquest_id: i64,
    end_subquest_id: i64,
    #[serde(rename = "type")]
    kind: String,
    number: String,
    title: String,
    quest_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
struct QuestOut {
    #[serde(rename = "type")]
    kind: String,
    title: String,
    description: String,
    chapter_id: i64,
    subquest_ids: Vec<i64>,
    prev_quest_ids: Vec<i64>,
    next_quest_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
struct SubQuestOut {
    description: String,
    step_description: Option<String>,
}

#[derive(Debug, Serialize)]
struct QuestDocument {
    chapters: IndexMap<String, ChapterOut>,
    quests: IndexMap<String, QuestOut>,
    subquests: IndexMap<String, SubQuestOut>,
}

/// Export `quest.json`.
pub fn export_quests(db: &Database, path: &Path, opts: &ExportOptions) -> Result<()> {
    if db.text_map.is_empty() {
        return Err(Error::TextMapMissing);
    }
    info!(path = %path.display(), "exporting quests");
    let filter = TextFilter::new(opts);

    let resolve = |hash: Option<i64>| -> String {
        hash.and_then(|hash| db.text_map.get(&hash))
            .cloned()
            .unwrap_or_else(|| opts.unknown_text.clone())
    };
    let polish = |text: String| -> String {
        let text = filter.strip_markup(&text);
        let text = filter.substitute(&text, &opts.traveller_name);
        let text = filter.normalize_quotes(&text);
        filter.normalize_newlines(&text)
    };

    let mut chapters = IndexMap::new();
    for (&chapter_id, chapter) in &db.chapters {
        let number = resolve(chapter.number_hash);
        let title = resolve(chapter.title_hash);
        if filter.is_unreleased(&number) || filter.is_unreleased(&title) {
            continue;
        }
        let number = if filter.is_hidden(&number) {
            opts.unknown_text.clone()
        } else {
            number
        };
        let title = if filter.is_hidden(&title) {
            opts.unknown_text.clone()
        } else {
            title
        };
        chapters.insert(
            chapter_id.to_string(),
            ChapterOut {
                group_id: chapter.group_id,
                begin_subquest_id: chapter.begin_subquest_id,
                end_subquest_id: chapter.end_subquest_id,
                kind: chapter.quest_kind.as_code().to_string(),
                number: polish(number),
                title: polish(title),
                quest_ids: chapter.quests.iter().copied().collect::<BTreeSet<i64>>()
                    .into_iter()
                    .collect(),
            },
        );
    }

    let mut quests = IndexMap::new();
    let mut valid_quests: BTreeSet<i64> = BTreeSet::new();
    for (&quest_id, quest) in &db.quests {
        let title = resolve(quest.title_hash);
        let description = resolve(quest.desc_hash);
        if filter.is_unreleased(&title) || filter.is_unreleased(&description) {
            continue;
        }
        let title = if filter.is_hidden(&title) {
            opts.unknown_text.clone()
        } else {
            title
        };
        let description = if filter.is_hidden(&description) {
            opts.unknown_text.clone()
        } else {
            description
        };
        let mut subquest_ids: Vec<i64> = quest.subquests.clone();
        subquest_ids.sort_unstable();
        quests.insert(
            quest_id.to_string(),
            QuestOut {
                kind: quest.kind.as_code().to_string(),
                title: polish(title),
                description: polish(description),
                chapter_id: quest.chapter_id,
                subquest_ids,
                prev_quest_ids: sorted(&quest.prev_quests),
                next_quest_ids: sorted(&quest.next_quests),
            },
        );
        valid_quests.insert(quest_id);
    }

    let mut subquests = IndexMap::new();
    let mut valid_subquests: BTreeSet<i64> = BTreeSet::new();
    for (&subquest_id, subquest) in &db.subquests {
        let description = resolve(subquest.desc_hash);
        // An absent step description means the quest journal does not
        // update on this step.
        let step_description = subquest
            .step_desc_hash
            .and_then(|hash| db.text_map.get(&hash))
            .cloned();
        if filter.is_unreleased(&description)
            || step_description
                .as_deref()
                .is_some_and(|text| filter.is_unreleased(text))
        {
            continue;
        }
        let description = filter.remove_skip_tags(&description);
        let description = if filter.is_hidden(&description) {
            opts.unknown_text.clone()
        } else {
            description
        };
        let step_description = step_description
            .filter(|text| !filter.is_hidden(text))
            .map(&polish);
        subquests.insert(
            subquest_id.to_string(),
            SubQuestOut {
                description: polish(description),
                step_description,
            },
        );
        valid_subquests.insert(subquest_id);
    }

    // Purge references to records that were filtered out.
    for quest in quests.values_mut() {
        quest.subquest_ids.retain(|id| valid_subquests.contains(id));
        quest.prev_quest_ids.retain(|id| valid_quests.contains(id));
        quest.next_quest_ids.retain(|id| valid_quests.contains(id));
    }

    let document = QuestDocument {
        chapters,
        quests,
        subquests,
    };
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), &document)?;
    Ok(())
}

fn sorted(ids: &[i64]) -> Vec<i64> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids
}
