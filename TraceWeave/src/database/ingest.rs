//! Record ingestion and merging
//!
//! Records are sharded across many files with overlapping coverage, so the
//! same talk or dialog id routinely arrives several times. Trusted
//! duplicates must agree (dialogs tolerate role and speaker-name drift, see
//! [`Dialog::absorb`]); untrusted duplicates come from obfuscated-field
//! recovery and always yield.

use std::collections::btree_map::Entry;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::formats::RawQuest;

use super::Database;
use super::types::{Chapter, Dialog, Talk};

impl Database {
    /// Insert or merge a talk record.
    ///
    /// # Errors
    /// [`Error::MergeConflict`] when two trusted records with the same id
    /// disagree; this signals an unknown data format and aborts the run.
    pub fn add_talk(&mut self, talk: Talk) -> Result<()> {
        if self.talk_blacklist.contains(&talk.id) {
            debug!(talk = talk.id, "skipping blacklisted talk");
            return Ok(());
        }
        match self.talks.entry(talk.id) {
            Entry::Vacant(slot) => {
                slot.insert(talk);
            }
            Entry::Occupied(mut slot) => {
                if !talk.same_record(slot.get()) && talk.trusted {
                    if slot.get().trusted {
                        return Err(Error::MergeConflict {
                            kind: "talk",
                            id: talk.id,
                            incoming: talk.provenance,
                            existing: slot.get().provenance.clone(),
                        });
                    }
                    slot.insert(talk);
                }
            }
        }
        Ok(())
    }

    /// Insert or merge a dialog record.
    ///
    /// # Errors
    /// [`Error::MergeConflict`] when two trusted records disagree and the
    /// in-place update cannot reconcile them.
    pub fn add_dialog(&mut self, dialog: Dialog) -> Result<()> {
        match self.dialogs.entry(dialog.id) {
            Entry::Vacant(slot) => {
                slot.insert(dialog);
            }
            Entry::Occupied(mut slot) => {
                if !dialog.same_record(slot.get()) && dialog.trusted {
                    if slot.get().trusted {
                        if !slot.get_mut().absorb(&dialog) {
                            return Err(Error::MergeConflict {
                                kind: "dialog",
                                id: dialog.id,
                                incoming: dialog.provenance,
                                existing: slot.get().provenance.clone(),
                            });
                        }
                    } else {
                        slot.insert(dialog);
                    }
                }
            }
        }
        Ok(())
    }

    /// Insert a quest together with its subquests and embedded talks.
    pub fn add_quest(&mut self, raw: RawQuest) -> Result<()> {
        for talk in raw.talks {
            self.add_talk(talk)?;
        }
        for subquest in raw.subquests {
            self.subquests.insert(subquest.id, subquest);
        }
        self.quests.insert(raw.quest.id, raw.quest);
        Ok(())
    }

    /// Insert a chapter, deriving its quest list from the quests' chapter
    /// ids. Must run after all quests are ingested.
    pub fn add_chapter(&mut self, mut chapter: Chapter) {
        for bound in [chapter.begin_subquest_id, chapter.end_subquest_id] {
            if bound >= 0 && !self.subquests.contains_key(&bound) {
                warn!(
                    chapter = chapter.id,
                    subquest = bound,
                    "chapter boundary references a missing subquest"
                );
            }
        }
        chapter.quests = self
            .quests
            .values()
            .filter(|quest| quest.chapter_id == chapter.id)
            .map(|quest| quest.id)
            .collect();
        self.chapters.insert(chapter.id, chapter);
    }

    /// Fill every talk's `prev_talks` from the `next_talks` lists, dropping
    /// next-talk ids that reference no known talk. Returns the number of
    /// dropped references.
    pub fn link_prev_talks(&mut self) -> usize {
        let ids: Vec<i64> = self.talks.keys().copied().collect();
        let mut dangling = 0;
        for id in ids {
            let nexts = self
                .talks
                .get(&id)
                .map(|talk| talk.next_talks.clone())
                .unwrap_or_default();
            let mut kept = Vec::with_capacity(nexts.len());
            for next in nexts {
                if let Some(target) = self.talks.get_mut(&next) {
                    target.prev_talks.push(id);
                    kept.push(next);
                } else {
                    dangling += 1;
                }
            }
            if let Some(talk) = self.talks.get_mut(&id) {
                talk.next_talks = kept;
            }
        }
        if dangling > 0 {
            warn!(count = dangling, "dropped next-talk references to missing talks");
        }
        dangling
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::types::Role;
    use pretty_assertions::assert_eq;

    fn talk(id: i64, init: i64, trusted: bool, provenance: &str) -> Talk {
        Talk {
            id,
            init_dialog: Some(init),
            trusted,
            provenance: provenance.into(),
            ..Talk::default()
        }
    }

    fn dialog(id: i64, role: Role, trusted: bool, next: &[i64]) -> Dialog {
        Dialog {
            id,
            role,
            trusted,
            next_dialogs: next.to_vec(),
            provenance: "test.json".into(),
            ..Dialog::default()
        }
    }

    #[test]
    fn identical_trusted_talk_is_idempotent() {
        let mut db = Database::new();
        db.add_talk(talk(1, 10, true, "a.json")).unwrap();
        db.add_talk(talk(1, 10, true, "b.json")).unwrap();
        assert_eq!(db.talks.len(), 1);
        assert_eq!(db.talks[&1].provenance, "a.json");
    }

    #[test]
    fn conflicting_trusted_talks_abort() {
        let mut db = Database::new();
        db.add_talk(talk(1, 10, true, "a.json")).unwrap();
        let err = db.add_talk(talk(1, 11, true, "b.json")).unwrap_err();
        assert!(matches!(err, Error::MergeConflict { kind: "talk", id: 1, .. }));
    }

    #[test]
    fn trusted_talk_replaces_untrusted() {
        let mut db = Database::new();
        db.add_talk(talk(1, 10, false, "a.json")).unwrap();
        db.add_talk(talk(1, 11, true, "b.json")).unwrap();
        assert_eq!(db.talks[&1].init_dialog, Some(11));
    }

    #[test]
    fn untrusted_talk_yields_to_incumbent() {
        let mut db = Database::new();
        db.add_talk(talk(1, 10, true, "a.json")).unwrap();
        db.add_talk(talk(1, 11, false, "b.json")).unwrap();
        assert_eq!(db.talks[&1].init_dialog, Some(10));
    }

    #[test]
    fn blacklisted_talk_is_dropped() {
        let mut db = Database::with_talk_blacklist([3]);
        db.add_talk(talk(3, 10, true, "a.json")).unwrap();
        assert!(db.talks.is_empty());
    }

    #[test]
    fn trusted_dialogs_merge_then_conflict() {
        let mut db = Database::new();
        let mut first = dialog(100, Role::Unknown, true, &[200]);
        first.role_name_hash = None;
        db.add_dialog(first).unwrap();

        let mut second = dialog(100, Role::Npc(5), true, &[201]);
        second.role_name_hash = Some(42);
        db.add_dialog(second).unwrap();
        assert_eq!(db.dialogs[&100].role, Role::Npc(5));
        assert_eq!(db.dialogs[&100].role_name_hash, Some(42));
        assert_eq!(db.dialogs[&100].next_dialogs, vec![200, 201]);

        let mut third = dialog(100, Role::Npc(5), true, &[200, 201]);
        third.role_name_hash = Some(43);
        let err = db.add_dialog(third).unwrap_err();
        assert!(matches!(err, Error::MergeConflict { kind: "dialog", id: 100, .. }));
    }

    #[test]
    fn prev_talks_link_and_drop_dangling() {
        let mut db = Database::new();
        let mut t1 = talk(1, 10, true, "a.json");
        t1.next_talks = vec![2, 99];
        db.add_talk(t1).unwrap();
        db.add_talk(talk(2, 20, true, "a.json")).unwrap();
        let dangling = db.link_prev_talks();
        assert_eq!(dangling, 1);
        assert_eq!(db.talks[&1].next_talks, vec![2]);
        assert_eq!(db.talks[&2].prev_talks, vec![1]);
    }
}
