//! Dialog record normalization
//!
//! Role decoding is the delicate part: the dumps encode the speaker as a
//! `{type, id}` pair where the id may be a decimal string, the type may be
//! one of several black-screen variants, and `talkShowType` can force a
//! line to be a player option regardless of the recorded role.

use serde_json::Value;

use crate::database::types::{Dialog, Role};
use crate::error::{Error, Result};

use super::aliases::AliasTable;
use super::common::{as_hash, as_i64, as_id_list, as_str};

const ROLE_PLAYER: &str = "TALK_ROLE_PLAYER";
const ROLE_MATE: &str = "TALK_ROLE_MATE_AVATAR";
const ROLE_BLACK_SCREEN: [&str; 4] = [
    "TALK_ROLE_BLACK_SCREEN",
    "TALK_ROLE_NEED_CLICK_BLACK_SCREEN",
    "TALK_ROLE_CONSEQUENT_BLACK_SCREEN",
    "TALK_ROLE_CONSEQUENT_NEED_CLICK_BLACK_SCREEN",
];
/// Role types whose id field must be numeric to be usable.
const ROLE_NEEDS_ID: [&str; 2] = ["TALK_ROLE_NPC", "TALK_ROLE_GADGET"];
const SHOW_FORCE_SELECT: &str = "TALK_SHOW_FORCE_SELECT";

/// Normalize one raw dialog item. `talk_id` is the file-level owning talk,
/// when the container carried one.
///
/// # Errors
/// [`Error::InconsistentInput`] when no id can be resolved;
/// [`Error::InvalidRecord`] when the record lacks a `talkRole`.
pub fn parse_dialog(
    item: &Value,
    talk_id: Option<i64>,
    aliases: &AliasTable,
    path: &str,
) -> Result<Dialog> {
    let Some(obj) = item.as_object() else {
        return Err(Error::InvalidRecord {
            kind: "dialog",
            path: path.to_string(),
            reason: "item is not a JSON object".to_string(),
        });
    };

    let Some((id_value, id_source)) = aliases.dialog.get(obj, "id") else {
        return Err(Error::InconsistentInput {
            path: path.to_string(),
        });
    };
    let Some(id) = as_i64(id_value) else {
        return Err(Error::InvalidRecord {
            kind: "dialog",
            path: path.to_string(),
            reason: format!("unreadable dialog id {id_value}"),
        });
    };

    let Some(role_value) = aliases.dialog.value(obj, "talkRole") else {
        return Err(Error::InvalidRecord {
            kind: "dialog",
            path: path.to_string(),
            reason: format!("dialog {id} has no talkRole"),
        });
    };

    let forced_select = obj
        .get("talkShowType")
        .and_then(as_str)
        .is_some_and(|show| show == SHOW_FORCE_SELECT);
    let role = if forced_select {
        Role::Player
    } else {
        decode_role(role_value, aliases)
    };

    let mut next_dialogs = aliases
        .dialog
        .value(obj, "nextDialogs")
        .map(as_id_list)
        .unwrap_or_default();
    // Self-loops carry no narrative meaning.
    next_dialogs.retain(|&next| next != id);

    Ok(Dialog {
        id,
        talk_id,
        role,
        provenance: path.to_string(),
        content_hash: aliases
            .dialog
            .value(obj, "talkContentTextMapHash")
            .and_then(as_hash),
        role_name_hash: aliases
            .dialog
            .value(obj, "talkRoleNameTextMapHash")
            .and_then(as_hash),
        next_dialogs,
        trusted: id_source.is_trusted(),
    })
}

fn decode_role(role_value: &Value, aliases: &AliasTable) -> Role {
    let Some(role_obj) = role_value.as_object() else {
        return Role::Unknown;
    };
    let Some(role_type) = aliases.role.value(role_obj, "type").and_then(as_str) else {
        return Role::Unknown;
    };
    // The id field must be present even for roles that do not use it; its
    // absence marks a degenerate record.
    let Some(id_value) = aliases.role.value(role_obj, "id") else {
        return Role::Unknown;
    };
    let role_id = as_i64(id_value);
    if ROLE_NEEDS_ID.contains(&role_type) && role_id.is_none() {
        return Role::Unknown;
    }
    if role_type == ROLE_PLAYER {
        Role::Player
    } else if ROLE_BLACK_SCREEN.contains(&role_type) {
        Role::Narrator
    } else if role_type == ROLE_MATE {
        Role::Mate
    } else {
        role_id.map_or(Role::Unknown, Role::Npc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(item: Value) -> Dialog {
        parse_dialog(&item, None, &AliasTable::default(), "d.json").unwrap()
    }

    #[test]
    fn npc_role_with_string_id() {
        let dialog = parse(json!({
            "id": 10,
            "talkRole": {"type": "TALK_ROLE_NPC", "id": "1234"},
            "talkContentTextMapHash": 111,
            "nextDialogs": [11, 12],
        }));
        assert_eq!(dialog.role, Role::Npc(1234));
        assert_eq!(dialog.content_hash, Some(111));
        assert!(dialog.trusted);
    }

    #[test]
    fn black_screen_is_narrator() {
        for variant in ROLE_BLACK_SCREEN {
            let dialog = parse(json!({
                "id": 10,
                "talkRole": {"type": variant, "id": ""},
            }));
            assert_eq!(dialog.role, Role::Narrator);
        }
    }

    #[test]
    fn force_select_overrides_role() {
        let dialog = parse(json!({
            "id": 10,
            "talkShowType": "TALK_SHOW_FORCE_SELECT",
            "talkRole": {"type": "TALK_ROLE_NPC", "id": "5"},
        }));
        assert_eq!(dialog.role, Role::Player);
    }

    #[test]
    fn non_numeric_npc_id_is_unknown() {
        let dialog = parse(json!({
            "id": 10,
            "talkRole": {"type": "TALK_ROLE_NPC", "id": "gadget_a"},
        }));
        assert_eq!(dialog.role, Role::Unknown);
    }

    #[test]
    fn self_loops_removed_at_ingestion() {
        let dialog = parse(json!({
            "id": 10,
            "talkRole": {"type": "TALK_ROLE_PLAYER", "id": "0"},
            "nextDialogs": [10, 11],
        }));
        assert_eq!(dialog.next_dialogs, vec![11]);
    }

    #[test]
    fn obfuscated_dialog_is_untrusted() {
        let item = json!({
            "JOLEJEFDNJJ": 10,
            "IFAOOKCBDGD": {"_type": "TALK_ROLE_PLAYER", "_id": "0"},
            "CLMNEDLMAJL": [11],
            "EMKCOIBADBJ": 222,
        });
        let dialog = parse_dialog(&item, Some(4), &AliasTable::default(), "d.json").unwrap();
        assert!(!dialog.trusted);
        assert_eq!(dialog.role, Role::Player);
        assert_eq!(dialog.talk_id, Some(4));
        assert_eq!(dialog.content_hash, Some(222));
        assert_eq!(dialog.next_dialogs, vec![11]);
    }
}
