//! Talk record normalization

use serde_json::Value;

use crate::database::types::{CondComb, CondState, Talk};
use crate::error::{Error, Result};

use super::aliases::AliasTable;
use super::common::{as_i64, as_id_list, as_str};

/// Condition type that gates a talk on a subquest's state.
const COND_STATE_EQUAL: &str = "QUEST_COND_STATE_EQUAL";

/// Normalize one raw talk item.
///
/// Returns `Ok(None)` for items that are valid JSON but not usable talks
/// (obfuscated records without an initial dialog carry no dialog data).
///
/// # Errors
/// [`Error::InconsistentInput`] when the item has neither an `id` field nor
/// any known alias.
pub fn parse_talk(item: &Value, aliases: &AliasTable, path: &str) -> Result<Option<Talk>> {
    let Some(obj) = item.as_object() else {
        return Err(Error::InvalidRecord {
            kind: "talk",
            path: path.to_string(),
            reason: "item is not a JSON object".to_string(),
        });
    };

    let Some((id_value, id_source)) = aliases.talk.get(obj, "id") else {
        return Err(Error::InconsistentInput {
            path: path.to_string(),
        });
    };
    let Some(id) = as_i64(id_value) else {
        return Err(Error::InvalidRecord {
            kind: "talk",
            path: path.to_string(),
            reason: format!("unreadable talk id {id_value}"),
        });
    };
    let trusted = id_source.is_trusted();

    let init_dialog = aliases.talk.value(obj, "initDialog").and_then(as_i64);
    let init_dialog = init_dialog.filter(|&d| d >= 0);
    if !trusted && init_dialog.is_none() {
        // Obfuscated talks without an initial dialog are useless.
        return Ok(None);
    }

    let begin_cond_comb = aliases
        .talk
        .value(obj, "beginCondComb")
        .and_then(as_str)
        .map_or(CondComb::Or, |comb| {
            if comb == "LOGIC_AND" {
                CondComb::And
            } else {
                CondComb::Or
            }
        });

    let mut begin_cond = Vec::new();
    for cond in aliases
        .talk
        .value(obj, "beginCond")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        if let Some(atom) = parse_cond_atom(cond, aliases) {
            begin_cond.push(atom);
        }
    }

    Ok(Some(Talk {
        id,
        provenance: path.to_string(),
        npc_ids: aliases
            .talk
            .value(obj, "npcId")
            .map(as_id_list)
            .unwrap_or_default(),
        init_dialog,
        next_talks: aliases
            .talk
            .value(obj, "nextTalks")
            .map(as_id_list)
            .unwrap_or_default(),
        prev_talks: Vec::new(),
        begin_cond_comb,
        begin_cond,
        trusted,
    }))
}

/// One `beginCond` entry: `{type, param: [subquest_id, state]}`. Atoms with
/// other condition types or unrecognized states are not about subquest
/// progress and are skipped.
fn parse_cond_atom(cond: &Value, aliases: &AliasTable) -> Option<(i64, CondState)> {
    let obj = cond.as_object()?;
    let cond_type = aliases.talk.value(obj, "type").and_then(as_str)?;
    if cond_type != COND_STATE_EQUAL {
        return None;
    }
    let params = aliases.talk.value(obj, "param")?.as_array()?;
    let subquest_id = as_i64(params.first()?)?;
    let state = match as_i64(params.get(1)?)? {
        2 => CondState::InProgress,
        3 => CondState::Finished,
        4 => CondState::Failed,
        _ => return None,
    };
    Some((subquest_id, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_talk_parses_trusted() {
        let item = json!({
            "id": 1,
            "initDialog": 10,
            "npcId": [5],
            "nextTalks": [2],
            "beginCondComb": "LOGIC_AND",
            "beginCond": [
                {"type": "QUEST_COND_STATE_EQUAL", "param": ["400", "3"]},
                {"type": "QUEST_COND_SOMETHING_ELSE", "param": ["1", "2"]},
            ],
        });
        let talk = parse_talk(&item, &AliasTable::default(), "t.json")
            .unwrap()
            .unwrap();
        assert!(talk.trusted);
        assert_eq!(talk.init_dialog, Some(10));
        assert_eq!(talk.begin_cond_comb, CondComb::And);
        assert_eq!(talk.begin_cond, vec![(400, CondState::Finished)]);
    }

    #[test]
    fn obfuscated_talk_without_init_dialog_is_skipped() {
        let item = json!({"CCFPGAKINNB": 9});
        let talk = parse_talk(&item, &AliasTable::default(), "t.json").unwrap();
        assert!(talk.is_none());
    }

    #[test]
    fn obfuscated_talk_parses_untrusted() {
        let item = json!({
            "CCFPGAKINNB": 9,
            "FMFFELFBBJN": 90,
            "AFNAENENCBB": [
                {"_type": "QUEST_COND_STATE_EQUAL", "_param": ["7", "2"]},
            ],
        });
        let talk = parse_talk(&item, &AliasTable::default(), "t.json")
            .unwrap()
            .unwrap();
        assert!(!talk.trusted);
        assert_eq!(talk.init_dialog, Some(90));
        assert_eq!(talk.begin_cond, vec![(7, CondState::InProgress)]);
    }

    #[test]
    fn missing_id_is_inconsistent_input() {
        let item = json!({"initDialog": 10});
        let err = parse_talk(&item, &AliasTable::default(), "t.json").unwrap_err();
        assert!(matches!(err, Error::InconsistentInput { .. }));
    }
}
