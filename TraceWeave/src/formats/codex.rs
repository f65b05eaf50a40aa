//! Codex table normalization: avatars, items, weapons, reliquary sets
//!
//! These records feed the per-entity exporters only; the dialog core never
//! reads them. Each collector takes the decoded excel arrays and produces
//! id-keyed records, skipping rows that lack an id.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::warn;

use crate::database::types::{
    Avatar, Item, RELIQUARY_SLOTS, ReliquarySet, VoiceText, Weapon,
};

use super::aliases::AliasTable;
use super::common::{as_hash, as_i64, as_str};

/// Reliquary equip slots, in export order.
const RELIQUARY_SLOT_MAP: [(&str, usize); RELIQUARY_SLOTS] = [
    ("EQUIP_RING", 0),
    ("EQUIP_NECKLACE", 1),
    ("EQUIP_DRESS", 2),
    ("EQUIP_BRACER", 3),
    ("EQUIP_SHOES", 4),
];

/// Merge the avatar info, fetter info, voice, and story tables.
pub fn collect_avatars(
    avatar_info: &[Value],
    fetter_info: &[Value],
    fetters: &[Value],
    fetter_story: &[Value],
    aliases: &AliasTable,
) -> BTreeMap<i64, Avatar> {
    let mut avatars: BTreeMap<i64, Avatar> = BTreeMap::new();
    for info in avatar_info {
        let Some(obj) = info.as_object() else { continue };
        let Some(id) = obj.get("id").and_then(as_i64) else {
            continue;
        };
        avatars.insert(
            id,
            Avatar {
                id,
                name_hash: obj.get("nameTextMapHash").and_then(as_hash),
                desc_hash: obj.get("descTextMapHash").and_then(as_hash),
                birth_month: -1,
                birth_day: -1,
                ..Avatar::default()
            },
        );
    }

    for info in fetter_info {
        let Some(obj) = info.as_object() else { continue };
        let Some(id) = obj.get("avatarId").and_then(as_i64) else {
            continue;
        };
        let Some(avatar) = avatars.get_mut(&id) else {
            continue;
        };
        avatar.assoc_type = obj
            .get("avatarAssocType")
            .and_then(as_str)
            .map(str::to_string);
        avatar.birth_month = obj.get("infoBirthMonth").and_then(as_i64).unwrap_or(-1);
        avatar.birth_day = obj.get("infoBirthDay").and_then(as_i64).unwrap_or(-1);
        avatar.native_hash = obj.get("avatarNativeTextMapHash").and_then(as_hash);
        avatar.vision_before_hash = obj.get("avatarVisionBeforTextMapHash").and_then(as_hash);
        avatar.vision_after_hash = obj.get("avatarVisionAfterTextMapHash").and_then(as_hash);
        avatar.vision_name_before_hash = aliases
            .codex
            .value(obj, "avatarVisionNameBeforTextMapHash")
            .and_then(as_hash);
        avatar.vision_name_after_hash = aliases
            .codex
            .value(obj, "avatarVisionNameAfterTextMapHash")
            .and_then(as_hash);
        avatar.constellation_before_hash = obj
            .get("avatarConstellationBeforTextMapHash")
            .and_then(as_hash);
        avatar.constellation_after_hash = obj
            .get("avatarConstellationAfterTextMapHash")
            .and_then(as_hash);
        avatar.title_hash = obj.get("avatarTitleTextMapHash").and_then(as_hash);
        avatar.detail_hash = obj.get("avatarDetailTextMapHash").and_then(as_hash);
    }

    for info in fetters {
        let Some(obj) = info.as_object() else { continue };
        let Some(id) = obj.get("avatarId").and_then(as_i64) else {
            continue;
        };
        let Some(avatar) = avatars.get_mut(&id) else {
            continue;
        };
        avatar.voice_texts.push(VoiceText {
            kind: obj.get("type").and_then(as_i64).unwrap_or(-1),
            title_hash: obj.get("voiceTitleTextMapHash").and_then(as_hash),
            content_hash: obj.get("voiceFileTextTextMapHash").and_then(as_hash),
        });
    }

    for info in fetter_story {
        let Some(obj) = info.as_object() else { continue };
        let Some(id) = obj.get("avatarId").and_then(as_i64) else {
            continue;
        };
        let Some(avatar) = avatars.get_mut(&id) else {
            continue;
        };
        avatar.stories.push((
            obj.get("storyTitleTextMapHash").and_then(as_hash),
            obj.get("storyContextTextMapHash").and_then(as_hash),
        ));
    }

    avatars
}

/// Merge the material table with the codex descriptions.
pub fn collect_items(material_info: &[Value], material_codex: &[Value]) -> BTreeMap<i64, Item> {
    let mut items: BTreeMap<i64, Item> = BTreeMap::new();
    for entry in material_info {
        let Some(obj) = entry.as_object() else { continue };
        let Some(id) = obj.get("id").and_then(as_i64) else {
            continue;
        };
        items.insert(
            id,
            Item {
                id,
                name_hash: obj.get("nameTextMapHash").and_then(as_hash),
                desc_hash: obj.get("descTextMapHash").and_then(as_hash),
                codex_desc_hash: None,
            },
        );
    }
    for entry in material_codex {
        let Some(obj) = entry.as_object() else { continue };
        let Some(id) = obj.get("materialId").and_then(as_i64) else {
            continue;
        };
        let codex_desc = obj.get("descTextMapHash").and_then(as_hash);
        items
            .entry(id)
            .or_insert_with(|| Item {
                id,
                ..Item::default()
            })
            .codex_desc_hash = codex_desc;
    }
    items
}

pub fn collect_weapons(weapon_info: &[Value]) -> BTreeMap<i64, Weapon> {
    let mut weapons = BTreeMap::new();
    for entry in weapon_info {
        let Some(obj) = entry.as_object() else { continue };
        let Some(id) = obj.get("id").and_then(as_i64) else {
            continue;
        };
        weapons.insert(
            id,
            Weapon {
                id,
                kind: obj
                    .get("weaponType")
                    .and_then(as_str)
                    .unwrap_or_default()
                    .to_string(),
                rank_level: obj.get("rankLevel").and_then(as_i64).unwrap_or(-1),
                name_hash: obj.get("nameTextMapHash").and_then(as_hash),
                desc_hash: obj.get("descTextMapHash").and_then(as_hash),
            },
        );
    }
    weapons
}

/// Join the reliquary piece, set, and affix tables into slot-indexed sets.
pub fn collect_reliquary_sets(
    reliquary_info: &[Value],
    reliquary_set_info: &[Value],
    equip_affix_info: &[Value],
) -> BTreeMap<i64, ReliquarySet> {
    // piece id -> (slot, name hash, description hash)
    let mut pieces: BTreeMap<i64, (usize, Option<i64>, Option<i64>)> = BTreeMap::new();
    for entry in reliquary_info {
        let Some(obj) = entry.as_object() else { continue };
        let Some(id) = obj.get("id").and_then(as_i64) else {
            continue;
        };
        let Some(slot) = obj
            .get("equipType")
            .and_then(as_str)
            .and_then(|equip| {
                RELIQUARY_SLOT_MAP
                    .iter()
                    .find(|(name, _)| *name == equip)
                    .map(|&(_, slot)| slot)
            })
        else {
            warn!(piece = id, "reliquary piece has unknown equip type");
            continue;
        };
        pieces.insert(
            id,
            (
                slot,
                obj.get("nameTextMapHash").and_then(as_hash),
                obj.get("descTextMapHash").and_then(as_hash),
            ),
        );
    }

    let mut set_names: BTreeMap<i64, Option<i64>> = BTreeMap::new();
    for entry in equip_affix_info {
        let Some(obj) = entry.as_object() else { continue };
        let Some(id) = obj.get("id").and_then(as_i64) else {
            continue;
        };
        set_names.insert(id, obj.get("nameTextMapHash").and_then(as_hash));
    }

    let mut sets = BTreeMap::new();
    for entry in reliquary_set_info {
        let Some(obj) = entry.as_object() else { continue };
        let (Some(set_id), Some(affix_id)) = (
            obj.get("setId").and_then(as_i64),
            obj.get("EquipAffixId").and_then(as_i64),
        ) else {
            continue;
        };
        let mut set = ReliquarySet {
            id: set_id,
            set_name_hash: set_names.get(&affix_id).copied().flatten(),
            ..ReliquarySet::default()
        };
        for piece_id in obj
            .get("containsList")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(as_i64)
        {
            if let Some(&(slot, name_hash, desc_hash)) = pieces.get(&piece_id) {
                set.name_hashes[slot] = name_hash;
                set.desc_hashes[slot] = desc_hash;
            }
        }
        sets.insert(set_id, set);
    }
    sets
}
