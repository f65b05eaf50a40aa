//! Quest record normalization
//!
//! A quest file carries the quest itself, its subquest list, and a list of
//! embedded talk items. The talks are returned alongside the quest so the
//! database can run them through the normal talk-merging path.

use serde_json::Value;

use crate::database::types::{Quest, QuestKind, SubQuest, Talk};
use crate::error::{Error, Result};

use super::aliases::AliasTable;
use super::common::{as_hash, as_i64, as_id_list, as_str};
use super::talk::parse_talk;

/// Subquest finish conditions that tie a subquest to talks.
const FINISH_COMPLETE_TALK: &str = "QUEST_CONTENT_COMPLETE_TALK";
const FINISH_COMPLETE_ANY_TALK: &str = "QUEST_CONTENT_COMPLETE_ANY_TALK";

/// Sentinel talk id meaning "any talk completes this subquest".
pub const ANY_TALK: i64 = -1;

/// A normalized quest file: the quest, its subquests, and its talks.
#[derive(Debug, Clone, Default)]
pub struct RawQuest {
    pub quest: Quest,
    pub subquests: Vec<SubQuest>,
    pub talks: Vec<Talk>,
}

/// Normalize one raw quest document.
///
/// # Errors
/// [`Error::InconsistentInput`] when the quest id cannot be resolved;
/// parse errors from embedded talks propagate unchanged.
pub fn parse_quest(data: &Value, aliases: &AliasTable, path: &str) -> Result<RawQuest> {
    let Some(obj) = data.as_object() else {
        return Err(Error::InvalidRecord {
            kind: "quest",
            path: path.to_string(),
            reason: "document is not a JSON object".to_string(),
        });
    };

    let Some(id) = aliases.quest.value(obj, "id").and_then(as_i64) else {
        return Err(Error::InconsistentInput {
            path: path.to_string(),
        });
    };

    let mut talks = Vec::new();
    let mut talk_ids = Vec::new();
    for item in aliases
        .quest
        .value(obj, "talks")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        if let Some(talk) = parse_talk(item, aliases, path)? {
            talk_ids.push(talk.id);
            talks.push(talk);
        }
    }

    let mut subquests = Vec::new();
    let mut subquest_ids = Vec::new();
    for item in aliases
        .quest
        .value(obj, "subQuests")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let Some(sub_obj) = item.as_object() else {
            continue;
        };
        let Some(sub_id) = aliases.quest.value(sub_obj, "subId").and_then(as_i64) else {
            continue;
        };
        let mut finish_talk_ids = Vec::new();
        for cond in aliases
            .quest
            .value(sub_obj, "finishCond")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let Some(cond_obj) = cond.as_object() else {
                continue;
            };
            match aliases.quest.value(cond_obj, "type").and_then(as_str) {
                Some(FINISH_COMPLETE_TALK) => {
                    if let Some(talk_id) = aliases
                        .quest
                        .value(cond_obj, "param")
                        .and_then(Value::as_array)
                        .and_then(|params| params.first())
                        .and_then(as_i64)
                    {
                        finish_talk_ids.push(talk_id);
                    }
                }
                Some(FINISH_COMPLETE_ANY_TALK) => finish_talk_ids.push(ANY_TALK),
                _ => {}
            }
        }
        subquests.push(SubQuest {
            id: sub_id,
            order: aliases
                .quest
                .value(sub_obj, "order")
                .and_then(as_i64)
                .unwrap_or(-1),
            desc_hash: aliases
                .quest
                .value(sub_obj, "descTextMapHash")
                .and_then(as_hash),
            step_desc_hash: aliases
                .quest
                .value(sub_obj, "stepDescTextMapHash")
                .and_then(as_hash),
            talk_ids: finish_talk_ids,
        });
        subquest_ids.push(sub_id);
    }

    let quest = Quest {
        id,
        // Quests without a type tag are archon quests.
        kind: aliases
            .quest
            .value(obj, "type")
            .and_then(as_str)
            .map_or(QuestKind::Archon, QuestKind::from_code),
        title_hash: aliases
            .quest
            .value(obj, "titleTextMapHash")
            .and_then(as_hash),
        desc_hash: aliases
            .quest
            .value(obj, "descTextMapHash")
            .and_then(as_hash),
        suggested_next: aliases
            .quest
            .value(obj, "suggestTrackMainQuestList")
            .map(as_id_list)
            .unwrap_or_default(),
        chapter_id: aliases
            .quest
            .value(obj, "chapterId")
            .and_then(as_i64)
            .unwrap_or(-1),
        subquests: subquest_ids,
        talks: talk_ids,
        next_quests: Vec::new(),
        prev_quests: Vec::new(),
    };

    Ok(RawQuest {
        quest,
        subquests,
        talks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quest_with_subquests_and_talks() {
        let data = json!({
            "id": 300,
            "type": "WQ",
            "titleTextMapHash": 1,
            "descTextMapHash": 2,
            "chapterId": 9,
            "suggestTrackMainQuestList": [301],
            "subQuests": [
                {
                    "subId": 3001,
                    "order": 1,
                    "descTextMapHash": 3,
                    "finishCond": [
                        {"type": "QUEST_CONTENT_COMPLETE_TALK", "param": [30001]},
                        {"type": "QUEST_CONTENT_COMPLETE_ANY_TALK", "param": []},
                        {"type": "QUEST_CONTENT_KILL_MONSTER", "param": [5]},
                    ],
                },
            ],
            "talks": [
                {"id": 30001, "initDialog": 42},
            ],
        });
        let raw = parse_quest(&data, &AliasTable::default(), "q.json").unwrap();
        assert_eq!(raw.quest.id, 300);
        assert_eq!(raw.quest.kind, QuestKind::World);
        assert_eq!(raw.quest.talks, vec![30001]);
        assert_eq!(raw.quest.subquests, vec![3001]);
        assert_eq!(raw.subquests[0].talk_ids, vec![30001, ANY_TALK]);
        assert_eq!(raw.talks.len(), 1);
        assert_eq!(raw.talks[0].init_dialog, Some(42));
    }

    #[test]
    fn obfuscated_quest_resolves() {
        let data = json!({
            "CCFPGAKINNB": 300,
            "JNMCHAGDLOL": "LQ",
            "POJOCEPJPAL": [
                {"OHGOECEBPJM": 3001, "NKCPJODPKPO": 0},
            ],
        });
        let raw = parse_quest(&data, &AliasTable::default(), "q.json").unwrap();
        assert_eq!(raw.quest.id, 300);
        assert_eq!(raw.quest.kind, QuestKind::Legend);
        assert_eq!(raw.subquests[0].id, 3001);
        assert_eq!(raw.subquests[0].order, 0);
    }
}
