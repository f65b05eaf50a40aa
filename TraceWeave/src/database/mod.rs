//! The in-memory narrative database
//!
//! A single owned [`Database`] value is threaded through the pipeline:
//! ingestion fills the record tables, cleaning repairs them, and the graph
//! phases derive quest links, sources, and traces. Phases run strictly in
//! order and each writes fields the previous ones do not touch.

pub mod clean;
pub mod ingest;
pub mod types;

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;

use types::{
    Avatar, Chapter, Dialog, Item, Quest, ReliquarySet, Source, SubQuest, Talk, Weapon,
};

#[derive(Debug, Default)]
pub struct Database {
    pub talks: BTreeMap<i64, Talk>,
    pub dialogs: BTreeMap<i64, Dialog>,
    pub quests: BTreeMap<i64, Quest>,
    pub subquests: BTreeMap<i64, SubQuest>,
    pub chapters: BTreeMap<i64, Chapter>,
    pub avatars: BTreeMap<i64, Avatar>,
    pub items: BTreeMap<i64, Item>,
    pub weapons: BTreeMap<i64, Weapon>,
    pub reliquary_sets: BTreeMap<i64, ReliquarySet>,
    /// Sources in creation order; the export order follows it.
    pub sources: IndexMap<String, Source>,
    pub text_map: BTreeMap<i64, String>,
    pub npc_names: BTreeMap<i64, String>,
    /// Long-form readable texts (weapon and relic stories), keyed by stem.
    pub readables: BTreeMap<String, String>,

    /// Talk → owning quest, filled by the source partitioner.
    pub talk_to_quest: BTreeMap<i64, i64>,
    /// Talk → owning subquest, filled by the source partitioner.
    pub talk_to_subquest: BTreeMap<i64, i64>,
    /// Subquest → owning quest, filled by the source partitioner.
    pub subquest_to_quest: BTreeMap<i64, i64>,

    /// Talks excluded from ingestion (test-only records in the dumps).
    pub talk_blacklist: BTreeSet<i64>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Database with an ingestion blacklist for known test-only talk ids.
    pub fn with_talk_blacklist(blacklist: impl IntoIterator<Item = i64>) -> Self {
        Database {
            talk_blacklist: blacklist.into_iter().collect(),
            ..Database::default()
        }
    }
}
