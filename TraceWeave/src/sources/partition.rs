//! Source partitioning: group talks (and orphan dialogs) into sources
//!
//! A source is a weakly connected component of the talk graph, widened so
//! that two components whose dialog subtrees overlap collapse into one.
//! That widening keeps the partition a disjoint cover: every live dialog
//! ends up in exactly one source.
//!
//! Each component is then attributed to a subquest or quest, which decides
//! its name and its order within the quest.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, error};

use crate::database::Database;
use crate::database::types::Source;
use crate::graph::{IdGraph, weakly_connected_components};

use super::assemble::reachable_dialogs;

/// Build talk-backed sources into `db.sources`.
pub fn collect_talk_sources(db: &mut Database) {
    let mut graph = IdGraph::new();
    for (&talk_id, talk) in &db.talks {
        graph.add_node(talk_id);
        for &next in &talk.next_talks {
            if db.talks.contains_key(&next) {
                graph.add_edge(talk_id, next, ());
            }
        }
    }

    // Components whose dialog subtrees overlap must form one source, or the
    // shared dialogs would be claimed twice.
    let mut dialog_owner: BTreeMap<i64, i64> = BTreeMap::new();
    for (&talk_id, talk) in &db.talks {
        let Some(init) = talk.init_dialog else {
            continue;
        };
        for dialog_id in reachable_dialogs(&db.dialogs, init) {
            match dialog_owner.entry(dialog_id) {
                Entry::Vacant(slot) => {
                    slot.insert(talk_id);
                }
                Entry::Occupied(slot) => {
                    graph.add_edge(*slot.get(), talk_id, ());
                }
            }
        }
    }

    attribute_talks(db);

    let mut subquest_counters: BTreeMap<i64, usize> = BTreeMap::new();
    let mut quest_counters: BTreeMap<i64, usize> = BTreeMap::new();
    for component in weakly_connected_components(&graph) {
        let subquests: BTreeSet<i64> = component
            .iter()
            .filter_map(|talk_id| db.talk_to_subquest.get(talk_id).copied())
            .collect();
        let quests: BTreeSet<i64> = component
            .iter()
            .filter_map(|talk_id| db.talk_to_quest.get(talk_id).copied())
            .collect();

        let mut source = if subquests.len() == 1 {
            let subquest_id = *subquests.iter().next().expect("one subquest");
            let quest_id = db.subquest_to_quest[&subquest_id];
            let serial = subquest_counters.entry(subquest_id).or_insert(0);
            let name = format!("subquest_{quest_id}_{subquest_id}_{serial}");
            *serial += 1;
            Source {
                order: db.subquests[&subquest_id].order,
                quest_id,
                subquest_id,
                ..Source::new(name)
            }
        } else if quests.len() == 1 {
            let quest_id = *quests.iter().next().expect("one quest");
            let serial = quest_counters.entry(quest_id).or_insert(0);
            let name = format!("quest_{quest_id}_{serial}");
            *serial += 1;
            // The minimum order of the attributed subquests stands in for
            // the whole component; without any, the component is unordered.
            let order = subquests
                .iter()
                .map(|subquest_id| db.subquests[subquest_id].order)
                .min()
                .unwrap_or(-1);
            Source {
                order,
                quest_id,
                ..Source::new(name)
            }
        } else {
            // No quest, or talks from several quests fused together; leave
            // it unordered under a name taken from its smallest talk.
            let min_talk = *component.iter().next().expect("non-empty component");
            Source::new(format!("talk_{min_talk}"))
        };
        source.talk_ids = Some(component);
        debug!(source = %source.name, "collected talk source");
        db.sources.insert(source.name.clone(), source);
    }
}

/// Build dialog-backed sources from the dialogs no talk source claimed.
/// Edges are restricted to orphan endpoints so the partition stays
/// disjoint from the talk sources.
pub fn collect_dialog_sources(db: &mut Database, claimed: &BTreeSet<i64>) {
    let orphans: BTreeSet<i64> = db
        .dialogs
        .keys()
        .copied()
        .filter(|id| !claimed.contains(id))
        .collect();
    let mut graph = IdGraph::new();
    for &dialog_id in &orphans {
        graph.add_node(dialog_id);
        for &next in &db.dialogs[&dialog_id].next_dialogs {
            if orphans.contains(&next) {
                graph.add_edge(dialog_id, next, ());
            }
        }
    }
    for component in weakly_connected_components(&graph) {
        let min_dialog = *component.iter().next().expect("non-empty component");
        let mut source = Source::new(format!("dialog_{min_dialog}"));
        source.dialog_ids = component;
        db.sources.insert(source.name.clone(), source);
    }
}

/// Fill `talk_to_quest`, `talk_to_subquest`, and `subquest_to_quest`.
fn attribute_talks(db: &mut Database) {
    // Direct attribution: a talk listed by a quest belongs to it. Two
    // quests claiming one talk is an input bug; the first claim stands.
    for (&quest_id, quest) in &db.quests {
        for &talk_id in &quest.talks {
            match db.talk_to_quest.entry(talk_id) {
                Entry::Vacant(slot) => {
                    slot.insert(quest_id);
                }
                Entry::Occupied(slot) => {
                    if *slot.get() != quest_id {
                        error!(
                            talk = talk_id,
                            first = *slot.get(),
                            second = quest_id,
                            "talk claimed by two quests"
                        );
                    }
                }
            }
        }
    }

    db.subquest_to_quest = db
        .quests
        .iter()
        .flat_map(|(&quest_id, quest)| {
            quest
                .subquests
                .iter()
                .map(move |&subquest_id| (subquest_id, quest_id))
        })
        .collect();

    // Indirect attribution through subquest terminator lists.
    let mut ambiguous: BTreeSet<i64> = BTreeSet::new();
    for (&quest_id, quest) in &db.quests {
        for &subquest_id in &quest.subquests {
            let Some(subquest) = db.subquests.get(&subquest_id) else {
                continue;
            };
            for &talk_id in &subquest.talk_ids {
                if talk_id < 0 || ambiguous.contains(&talk_id) {
                    continue;
                }
                // A talk already owned by a different quest stays there.
                if db
                    .talk_to_quest
                    .get(&talk_id)
                    .is_some_and(|&owner| owner != quest_id)
                {
                    continue;
                }
                if let Some(&assigned) = db.talk_to_subquest.get(&talk_id) {
                    if db.subquest_to_quest.get(&assigned) != Some(&quest_id) {
                        // Subquests of two quests claim this talk; it
                        // belongs to neither.
                        db.talk_to_subquest.remove(&talk_id);
                        db.talk_to_quest.remove(&talk_id);
                        ambiguous.insert(talk_id);
                        continue;
                    }
                    // Same quest: the subquest with the smaller order wins.
                    if subquest.order < db.subquests[&assigned].order {
                        db.talk_to_subquest.insert(talk_id, subquest_id);
                    }
                } else {
                    db.talk_to_subquest.insert(talk_id, subquest_id);
                    db.talk_to_quest.insert(talk_id, quest_id);
                }
            }
        }
    }
    if !ambiguous.is_empty() {
        debug!(count = ambiguous.len(), "talks left unassigned as ambiguous");
    }
}
