//! Graph cleaning: repair or drop records with missing references
//!
//! Runs once, after all records are merged. A talk is *broken* when the
//! dialog walk from its initial dialog reaches an id that is not in the
//! dialog table; broken talks are dropped together with the dialogs only
//! they reach, and the drop propagates to every list that mentions them.

use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use super::Database;
use super::types::Role;

/// Counts reported by [`Database::clean`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub talks_before: usize,
    pub dropped_talks: usize,
    pub dropped_dialogs: usize,
    pub dropped_next_refs: usize,
    pub dropped_cond_atoms: usize,
    pub dropped_suggested_quests: usize,
    pub inferred_player_roles: usize,
}

impl Database {
    /// Repair the merged tables. Returns drop counts for diagnostics.
    pub fn clean(&mut self) -> CleanReport {
        let mut report = CleanReport {
            talks_before: self.talks.len(),
            ..CleanReport::default()
        };

        report.dropped_next_refs += self.drop_dangling_next_dialogs();

        // Walk every talk's dialog subtree; collect the broken ones.
        let mut visited_per_talk: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
        let mut broken_talks: BTreeSet<i64> = BTreeSet::new();
        for (&talk_id, talk) in &self.talks {
            let mut visited = BTreeSet::new();
            let intact = match talk.init_dialog {
                Some(init) => self.walk_is_intact(init, &mut visited),
                // A talk without an entry point has no usable dialog tree.
                None => false,
            };
            if !intact {
                broken_talks.insert(talk_id);
            }
            visited_per_talk.insert(talk_id, visited);
        }

        // Dialogs reached by a healthy talk stay even when a broken talk
        // also reaches them.
        let mut healthy_dialogs: BTreeSet<i64> = BTreeSet::new();
        for (talk_id, visited) in &visited_per_talk {
            if !broken_talks.contains(talk_id) {
                healthy_dialogs.extend(visited.iter().copied());
            }
        }
        for talk_id in &broken_talks {
            self.talks.remove(talk_id);
            for dialog_id in &visited_per_talk[talk_id] {
                if !healthy_dialogs.contains(dialog_id)
                    && self.dialogs.remove(dialog_id).is_some()
                {
                    report.dropped_dialogs += 1;
                }
            }
        }
        report.dropped_talks = broken_talks.len();

        // Dropped dialogs may leave fresh dangling references behind.
        if report.dropped_dialogs > 0 {
            report.dropped_next_refs += self.drop_dangling_next_dialogs();
        }

        // Propagate the talk drops.
        for talk in self.talks.values_mut() {
            talk.next_talks.retain(|id| !broken_talks.contains(id));
            talk.prev_talks.retain(|id| !broken_talks.contains(id));
        }
        for subquest in self.subquests.values_mut() {
            subquest.talk_ids.retain(|id| !broken_talks.contains(id));
        }
        for quest in self.quests.values_mut() {
            quest.talks.retain(|id| !broken_talks.contains(id));
        }

        // Begin conditions over missing subquests can never be evaluated.
        let subquest_ids: BTreeSet<i64> = self.subquests.keys().copied().collect();
        for talk in self.talks.values_mut() {
            let before = talk.begin_cond.len();
            talk.begin_cond
                .retain(|(subquest_id, _)| subquest_ids.contains(subquest_id));
            report.dropped_cond_atoms += before - talk.begin_cond.len();
        }

        let quest_ids: BTreeSet<i64> = self.quests.keys().copied().collect();
        for quest in self.quests.values_mut() {
            let before = quest.suggested_next.len();
            quest.suggested_next.retain(|id| quest_ids.contains(id));
            report.dropped_suggested_quests += before - quest.suggested_next.len();
        }

        report.inferred_player_roles = self.infer_player_roles();

        info!(
            dropped_talks = report.dropped_talks,
            talks_before = report.talks_before,
            "dropped talks whose dialog subtree is broken"
        );
        report
    }

    /// Remove next-dialog ids that reference no known dialog.
    fn drop_dangling_next_dialogs(&mut self) -> usize {
        let known: BTreeSet<i64> = self.dialogs.keys().copied().collect();
        let mut dropped = 0;
        for dialog in self.dialogs.values_mut() {
            let before = dialog.next_dialogs.len();
            dialog.next_dialogs.retain(|id| known.contains(id));
            dropped += before - dialog.next_dialogs.len();
        }
        dropped
    }

    /// Iterative walk over `next_dialogs`; records every id it touches and
    /// reports whether they all exist.
    fn walk_is_intact(&self, init: i64, visited: &mut BTreeSet<i64>) -> bool {
        let mut intact = true;
        let mut stack = vec![init];
        visited.insert(init);
        while let Some(id) = stack.pop() {
            let Some(dialog) = self.dialogs.get(&id) else {
                intact = false;
                continue;
            };
            for &next in &dialog.next_dialogs {
                if visited.insert(next) {
                    stack.push(next);
                }
            }
        }
        intact
    }

    /// When a choice fan mixes player options with role-less lines, the
    /// whole fan belongs to the player: the dumps omit the role on all but
    /// one option. Returns the number of dialogs whose role was forced.
    fn infer_player_roles(&mut self) -> usize {
        let ids: Vec<i64> = self.dialogs.keys().copied().collect();
        let mut forced = 0;
        for id in ids {
            let nexts = self
                .dialogs
                .get(&id)
                .map(|dialog| dialog.next_dialogs.clone())
                .unwrap_or_default();
            let roles: Vec<Role> = nexts
                .iter()
                .filter_map(|next| self.dialogs.get(next).map(|d| d.role))
                .collect();
            if !roles.iter().any(|role| role.is_unknown()) {
                continue;
            }
            if !roles.contains(&Role::Player) {
                continue;
            }
            for next in nexts {
                if let Some(dialog) = self.dialogs.get_mut(&next) {
                    if dialog.role != Role::Player {
                        dialog.role = Role::Player;
                        forced += 1;
                    }
                }
            }
        }
        forced
    }
}
