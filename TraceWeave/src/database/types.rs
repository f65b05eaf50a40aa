//! Record types for the in-memory narrative database
//!
//! Entities reference each other by id, never by pointer: the database owns
//! every record and the pipeline phases look ids up on demand. This keeps
//! the (heavily cyclic) talk/dialog graphs representable without any
//! object-graph ownership questions.

use std::collections::BTreeSet;

/// Who speaks a dialog line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    /// The player character.
    Player,
    /// Black-screen narration.
    Narrator,
    /// The player's travelling companion.
    Mate,
    /// The role field was missing or unusable in the data.
    #[default]
    Unknown,
    /// A named NPC (or gadget) by id.
    Npc(i64),
}

impl Role {
    /// Whether this role is concrete enough to overwrite an existing one
    /// during a merge. The data is known to carry stale narrator/mate tags,
    /// so only player and NPC readings win.
    pub fn overrides_existing(self) -> bool {
        matches!(self, Role::Player | Role::Npc(_))
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, Role::Unknown)
    }
}

/// State a subquest must be in for a begin condition to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondState {
    InProgress,
    Finished,
    Failed,
}

/// How a talk's begin-condition atoms combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CondComb {
    And,
    #[default]
    Or,
}

/// A group of dialogs with an entry point and chaining rules.
#[derive(Debug, Clone, Default)]
pub struct Talk {
    pub id: i64,
    /// File the record came from; diagnostics only.
    pub provenance: String,
    /// NPCs participating in this talk. Maybe empty.
    pub npc_ids: Vec<i64>,
    /// First dialog of the talk. `None` means unspecified.
    pub init_dialog: Option<i64>,
    /// Talks that may follow this one.
    pub next_talks: Vec<i64>,
    /// Inverse of `next_talks`; derived after ingestion.
    pub prev_talks: Vec<i64>,
    pub begin_cond_comb: CondComb,
    /// (subquest id, required state) atoms gating this talk.
    pub begin_cond: Vec<(i64, CondState)>,
    /// Untrusted records yield to trusted ones with the same id.
    pub trusted: bool,
}

impl Talk {
    /// Record equality for merge purposes. `prev_talks` is derived and
    /// `provenance`/`trusted` are bookkeeping, so none of them count.
    pub fn same_record(&self, other: &Talk) -> bool {
        self.id == other.id
            && self.npc_ids == other.npc_ids
            && self.next_talks == other.next_talks
            && self.init_dialog == other.init_dialog
            && self.begin_cond_comb == other.begin_cond_comb
            && self.begin_cond == other.begin_cond
    }
}

/// A single spoken line with its branching successors.
#[derive(Debug, Clone, Default)]
pub struct Dialog {
    pub id: i64,
    /// Owning talk, when the record carried one.
    pub talk_id: Option<i64>,
    pub role: Role,
    /// File the record came from; diagnostics only.
    pub provenance: String,
    /// Text-map hash of the spoken line.
    pub content_hash: Option<i64>,
    /// Text-map hash of the speaker's display name.
    pub role_name_hash: Option<i64>,
    pub next_dialogs: Vec<i64>,
    pub trusted: bool,
}

impl Dialog {
    /// Record equality for merge purposes. The talk id conflicts in the
    /// original data and carries no meaning for the graph, so it does not
    /// count.
    pub fn same_record(&self, other: &Dialog) -> bool {
        self.id == other.id
            && self.role == other.role
            && self.content_hash == other.content_hash
            && self.role_name_hash == other.role_name_hash
            && self.next_dialogs == other.next_dialogs
    }

    /// Merge another trusted reading of the same dialog into this one.
    ///
    /// Returns `false` when the records disagree on a field that cannot be
    /// reconciled (two different valid role-name hashes); the caller treats
    /// that as a fatal merge conflict.
    pub fn absorb(&mut self, item: &Dialog) -> bool {
        if let Some(talk_id) = item.talk_id {
            self.talk_id = Some(talk_id);
        }
        // The role field conflicts between shards; the newer reading wins.
        if item.role.overrides_existing() {
            self.role = item.role;
        }
        if let Some(hash) = item.role_name_hash {
            if self.role_name_hash.is_some_and(|existing| existing != hash) {
                return false;
            }
            self.role_name_hash = Some(hash);
        }
        let union: BTreeSet<i64> = self
            .next_dialogs
            .iter()
            .chain(item.next_dialogs.iter())
            .copied()
            .collect();
        self.next_dialogs = union.into_iter().collect();
        self.provenance = format!("{}:{}", item.provenance, self.provenance);
        true
    }
}

/// One step of a quest. A talk id of `-1` means any talk completes it.
#[derive(Debug, Clone, Default)]
pub struct SubQuest {
    pub id: i64,
    /// Order within the owning quest; `-1` when unspecified.
    pub order: i64,
    pub desc_hash: Option<i64>,
    pub step_desc_hash: Option<i64>,
    /// Finishing any of these talks completes the subquest.
    pub talk_ids: Vec<i64>,
}

/// Quest category tag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QuestKind {
    #[default]
    Archon,
    Event,
    Intrust,
    Legend,
    World,
    Other(String),
}

impl QuestKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            "AQ" => QuestKind::Archon,
            "EQ" => QuestKind::Event,
            "IQ" => QuestKind::Intrust,
            "LQ" => QuestKind::Legend,
            "WQ" => QuestKind::World,
            other => QuestKind::Other(other.to_string()),
        }
    }

    pub fn as_code(&self) -> &str {
        match self {
            QuestKind::Archon => "AQ",
            QuestKind::Event => "EQ",
            QuestKind::Intrust => "IQ",
            QuestKind::Legend => "LQ",
            QuestKind::World => "WQ",
            QuestKind::Other(code) => code,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Quest {
    pub id: i64,
    pub kind: QuestKind,
    pub title_hash: Option<i64>,
    pub desc_hash: Option<i64>,
    /// Suggested follow-up quests from the input; feeds the quest DAG.
    pub suggested_next: Vec<i64>,
    /// Owning chapter; `-1` when absent.
    pub chapter_id: i64,
    pub subquests: Vec<i64>,
    /// Talks this quest contains directly.
    pub talks: Vec<i64>,
    /// Successors in the (cycle-free) quest graph; derived.
    pub next_quests: Vec<i64>,
    /// Inverse of `next_quests`; derived.
    pub prev_quests: Vec<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct Chapter {
    pub id: i64,
    /// Chapters are grouped; `-1` when ungrouped.
    pub group_id: i64,
    /// Subquest whose completion shows the chapter-begin UI; `-1` if none.
    pub begin_subquest_id: i64,
    /// Subquest whose completion shows the chapter-end UI; `-1` if none.
    pub end_subquest_id: i64,
    pub number_hash: Option<i64>,
    pub title_hash: Option<i64>,
    pub image_title_hash: Option<i64>,
    pub quest_kind: QuestKind,
    /// All quests of this chapter; derived from the quests' chapter ids.
    pub quests: Vec<i64>,
}

/// A voice line attached to an avatar.
#[derive(Debug, Clone, Copy)]
pub struct VoiceText {
    /// 1 = chat, 2 = battle.
    pub kind: i64,
    pub title_hash: Option<i64>,
    pub content_hash: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct Avatar {
    pub id: i64,
    pub name_hash: Option<i64>,
    pub desc_hash: Option<i64>,
    pub birth_month: i64,
    pub birth_day: i64,
    pub native_hash: Option<i64>,
    pub vision_before_hash: Option<i64>,
    pub vision_after_hash: Option<i64>,
    pub vision_name_before_hash: Option<i64>,
    pub vision_name_after_hash: Option<i64>,
    pub constellation_before_hash: Option<i64>,
    pub constellation_after_hash: Option<i64>,
    pub title_hash: Option<i64>,
    pub detail_hash: Option<i64>,
    pub assoc_type: Option<String>,
    pub voice_texts: Vec<VoiceText>,
    /// (title hash, content hash) pairs.
    pub stories: Vec<(Option<i64>, Option<i64>)>,
}

#[derive(Debug, Clone, Default)]
pub struct Item {
    pub id: i64,
    pub name_hash: Option<i64>,
    pub desc_hash: Option<i64>,
    /// Alternative description from the codex table.
    pub codex_desc_hash: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct Weapon {
    pub id: i64,
    pub kind: String,
    /// 1-5 stars; `-1` when absent.
    pub rank_level: i64,
    pub name_hash: Option<i64>,
    pub desc_hash: Option<i64>,
}

/// The five reliquary pieces of a set, slot-indexed.
pub const RELIQUARY_SLOTS: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct ReliquarySet {
    pub id: i64,
    pub set_name_hash: Option<i64>,
    pub name_hashes: [Option<i64>; RELIQUARY_SLOTS],
    pub desc_hashes: [Option<i64>; RELIQUARY_SLOTS],
}

/// A weakly connected group of talks (or orphan dialogs) treated as one
/// narrative scene, together with the traces that cover its dialog graph.
#[derive(Debug, Clone, Default)]
pub struct Source {
    /// Stable name derived from the quest/subquest context.
    pub name: String,
    /// Order within the owning quest; `-1` when unordered. Two sources with
    /// the same order are branches of the story.
    pub order: i64,
    /// Owning quest; `-1` when none.
    pub quest_id: i64,
    /// Owning subquest; `-1` when none.
    pub subquest_id: i64,
    /// Talks in this source; `None` when the source was formed from orphan
    /// dialogs instead of talks.
    pub talk_ids: Option<BTreeSet<i64>>,
    /// Dialogs in this source, filled once the dialog graph is assembled.
    pub dialog_ids: BTreeSet<i64>,
    /// Covering walks through the dialog graph, as dialog-id sequences.
    pub traces: Vec<Vec<i64>>,
    pub next_sources: Vec<String>,
    pub next_sources_optional: Vec<String>,
    pub prev_sources: Vec<String>,
    pub prev_sources_optional: Vec<String>,
}

impl Source {
    pub fn new(name: impl Into<String>) -> Self {
        Source {
            name: name.into(),
            order: -1,
            quest_id: -1,
            subquest_id: -1,
            ..Source::default()
        }
    }
}
