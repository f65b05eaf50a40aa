//! Chapter record normalization

use serde_json::Value;

use crate::database::types::{Chapter, QuestKind};
use crate::error::{Error, Result};

use super::common::{as_hash, as_i64, as_str};

/// Normalize one chapter item from the chapter excel table.
pub fn parse_chapter(item: &Value, path: &str) -> Result<Chapter> {
    let Some(obj) = item.as_object() else {
        return Err(Error::InvalidRecord {
            kind: "chapter",
            path: path.to_string(),
            reason: "item is not a JSON object".to_string(),
        });
    };
    let Some(id) = obj.get("id").and_then(as_i64) else {
        return Err(Error::InconsistentInput {
            path: path.to_string(),
        });
    };
    Ok(Chapter {
        id,
        group_id: obj.get("groupId").and_then(as_i64).unwrap_or(-1),
        begin_subquest_id: obj.get("beginQuestId").and_then(as_i64).unwrap_or(-1),
        end_subquest_id: obj.get("endQuestId").and_then(as_i64).unwrap_or(-1),
        number_hash: obj.get("chapterNumTextMapHash").and_then(as_hash),
        title_hash: obj.get("chapterTitleTextMapHash").and_then(as_hash),
        image_title_hash: obj.get("chapterImageTitleTextMapHash").and_then(as_hash),
        // Chapters without a type tag belong to the archon storyline.
        quest_kind: obj
            .get("questType")
            .and_then(as_str)
            .map_or(QuestKind::Archon, QuestKind::from_code),
        quests: Vec::new(),
    })
}
