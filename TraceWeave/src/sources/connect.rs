//! Source connection: order sources within and across quests
//!
//! Ordered sources of a quest wire up group-to-group with mandatory edges.
//! Unordered sources place themselves through the begin conditions of their
//! talks: every condition atom constrains where in the subquest order the
//! source may appear, an in-progress atom pinning it to that subquest and a
//! finished/failed atom pushing it after. The combined interval decides
//! which ordered group the source attaches to, as an optional predecessor
//! or successor.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::database::Database;
use crate::database::types::{CondComb, CondState};

/// An interval endpoint: (subquest order, bias). Bias `-1` sits before the
/// subquest of that order, `1` after it.
type Endpoint = (i64, i8);

const FLOOR: Endpoint = (0, -1);
const CEILING: Endpoint = (i64::MAX, 1);

/// Fill the four neighbor lists of every source.
pub fn connect_sources(db: &mut Database) {
    info!("building connections among the sources");

    // quest -> order -> source names, insertion-ordered within a group.
    let mut ordered: BTreeMap<i64, BTreeMap<i64, Vec<String>>> = BTreeMap::new();
    let mut before: BTreeMap<i64, BTreeMap<i64, Vec<String>>> = BTreeMap::new();
    let mut after: BTreeMap<i64, BTreeMap<i64, Vec<String>>> = BTreeMap::new();

    for (name, source) in &db.sources {
        if source.order >= 0 && source.quest_id >= 0 {
            ordered
                .entry(source.quest_id)
                .or_default()
                .entry(source.order)
                .or_default()
                .push(name.clone());
        }
    }

    for (name, source) in &db.sources {
        if source.order >= 0 || source.quest_id < 0 {
            continue;
        }
        let Some(talk_ids) = source.talk_ids.as_ref() else {
            continue;
        };
        let conditions: Vec<(CondComb, Vec<(i64, CondState)>)> = talk_ids
            .iter()
            .filter_map(|talk_id| db.talks.get(talk_id))
            .filter(|talk| !talk.begin_cond.is_empty())
            .map(|talk| (talk.begin_cond_comb, talk.begin_cond.clone()))
            .collect();

        if conditions.is_empty() {
            // Nothing gates this source; it can run from the very start of
            // the quest.
            before
                .entry(source.quest_id)
                .or_default()
                .entry(0)
                .or_default()
                .push(name.clone());
            continue;
        }

        match placement_interval(db, &conditions) {
            Some((start, _end)) if start.1 == -1 => {
                before
                    .entry(source.quest_id)
                    .or_default()
                    .entry(start.0)
                    .or_default()
                    .push(name.clone());
            }
            Some((start, _end)) => {
                after
                    .entry(source.quest_id)
                    .or_default()
                    .entry(start.0)
                    .or_default()
                    .push(name.clone());
            }
            None => {
                // Unsatisfiable constraints; fall back to the quest's tail.
                debug!(source = %name, "empty placement interval");
                after
                    .entry(source.quest_id)
                    .or_default()
                    .entry(i64::MAX)
                    .or_default()
                    .push(name.clone());
            }
        }
    }

    // Mandatory edges between consecutive order groups.
    for groups in ordered.values() {
        let orders: Vec<i64> = groups.keys().copied().collect();
        for pair in orders.windows(2) {
            for earlier in &groups[&pair[0]] {
                for later in &groups[&pair[1]] {
                    db.sources[earlier].next_sources.push(later.clone());
                    db.sources[later].prev_sources.push(earlier.clone());
                }
            }
        }
    }

    // Optional attachments around the nearest ordered group.
    for (&quest_id, placements) in &before {
        let Some(groups) = ordered.get(&quest_id) else {
            continue;
        };
        let orders: Vec<i64> = groups.keys().copied().collect();
        for (&order, names) in placements {
            let slot = orders.partition_point(|&o| o < order);
            if slot < orders.len() {
                for anchor in &groups[&orders[slot]] {
                    db.sources[anchor]
                        .prev_sources_optional
                        .extend(names.iter().cloned());
                }
            } else if let Some(&last) = orders.last() {
                for anchor in &groups[&last] {
                    db.sources[anchor]
                        .next_sources_optional
                        .extend(names.iter().cloned());
                }
            }
        }
    }
    for (&quest_id, placements) in &after {
        let Some(groups) = ordered.get(&quest_id) else {
            continue;
        };
        let orders: Vec<i64> = groups.keys().copied().collect();
        for (&order, names) in placements {
            let slot = orders.partition_point(|&o| o <= order);
            if slot > 0 {
                for anchor in &groups[&orders[slot - 1]] {
                    db.sources[anchor]
                        .next_sources_optional
                        .extend(names.iter().cloned());
                }
            } else if let Some(&first) = orders.first() {
                for anchor in &groups[&first] {
                    db.sources[anchor]
                        .prev_sources_optional
                        .extend(names.iter().cloned());
                }
            }
        }
    }

    // Mandatory edges across adjacent quests: last group to first group.
    let quest_ids: Vec<i64> = db.quests.keys().copied().collect();
    for quest_id in quest_ids {
        let Some(groups) = ordered.get(&quest_id) else {
            continue;
        };
        let Some(last_group) = groups.values().next_back().cloned() else {
            continue;
        };
        let next_quests = db.quests[&quest_id].next_quests.clone();
        for next_quest in next_quests {
            let Some(next_groups) = ordered.get(&next_quest) else {
                continue;
            };
            let Some(first_group) = next_groups.values().next().cloned() else {
                continue;
            };
            for earlier in &last_group {
                for later in &first_group {
                    db.sources[earlier].next_sources.push(later.clone());
                    db.sources[later].prev_sources.push(earlier.clone());
                }
            }
        }
    }
}

/// Combine all begin conditions of a source into one placement interval.
/// Atoms combine by AND (intersection) or OR (union) within a talk, and
/// talks intersect with each other. `None` means the interval is empty.
fn placement_interval(
    db: &Database,
    conditions: &[(CondComb, Vec<(i64, CondState)>)],
) -> Option<(Endpoint, Endpoint)> {
    let mut start = FLOOR;
    let mut end = CEILING;
    for (comb, atoms) in conditions {
        let mut talk_start;
        let mut talk_end;
        match comb {
            CondComb::And => {
                talk_start = FLOOR;
                talk_end = CEILING;
                for &(subquest_id, state) in atoms {
                    let Some(order) = subquest_order(db, subquest_id) else {
                        continue;
                    };
                    match state {
                        CondState::InProgress => {
                            talk_start = talk_start.max((order, -1));
                            talk_end = talk_end.min((order, -1));
                        }
                        CondState::Finished | CondState::Failed => {
                            talk_start = talk_start.max((order, 1));
                        }
                    }
                }
            }
            CondComb::Or => {
                talk_start = CEILING;
                talk_end = FLOOR;
                for &(subquest_id, state) in atoms {
                    let Some(order) = subquest_order(db, subquest_id) else {
                        continue;
                    };
                    match state {
                        CondState::InProgress => {
                            talk_start = talk_start.min((order, -1));
                            talk_end = talk_end.max((order, -1));
                        }
                        CondState::Finished | CondState::Failed => {
                            talk_start = talk_start.min((order, 1));
                            talk_end = talk_end.max(CEILING);
                        }
                    }
                }
            }
        }
        start = start.max(talk_start);
        end = end.min(talk_end);
    }
    (start <= end).then_some((start, end))
}

/// Order of a subquest, when it has one. Conditions over unordered
/// subquests say nothing about placement.
fn subquest_order(db: &Database, subquest_id: i64) -> Option<i64> {
    db.subquests
        .get(&subquest_id)
        .map(|subquest| subquest.order)
        .filter(|&order| order >= 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::types::{Source, SubQuest, Talk};
    use pretty_assertions::assert_eq;

    fn source(name: &str, quest_id: i64, order: i64) -> Source {
        Source {
            quest_id,
            order,
            ..Source::new(name)
        }
    }

    fn add_source(db: &mut Database, src: Source) {
        db.sources.insert(src.name.clone(), src);
    }

    fn quest(db: &mut Database, id: i64) {
        db.quests.insert(
            id,
            crate::database::types::Quest {
                id,
                ..crate::database::types::Quest::default()
            },
        );
    }

    #[test]
    fn consecutive_groups_fan_out() {
        let mut db = Database::new();
        quest(&mut db, 300);
        add_source(&mut db, source("a", 300, 1));
        add_source(&mut db, source("b1", 300, 5));
        add_source(&mut db, source("b2", 300, 5));

        connect_sources(&mut db);
        assert_eq!(db.sources["a"].next_sources, vec!["b1", "b2"]);
        assert_eq!(db.sources["b1"].prev_sources, vec!["a"]);
        assert_eq!(db.sources["b2"].prev_sources, vec!["a"]);
    }

    #[test]
    fn finished_condition_attaches_after_its_group() {
        let mut db = Database::new();
        quest(&mut db, 300);
        db.subquests.insert(
            500,
            SubQuest {
                id: 500,
                order: 1,
                ..SubQuest::default()
            },
        );
        db.talks.insert(
            9,
            Talk {
                id: 9,
                begin_cond_comb: CondComb::And,
                begin_cond: vec![(500, CondState::Finished)],
                trusted: true,
                ..Talk::default()
            },
        );
        add_source(&mut db, source("a", 300, 1));
        add_source(&mut db, source("b1", 300, 5));
        add_source(&mut db, source("b2", 300, 5));
        let mut floating = source("float", 300, -1);
        floating.talk_ids = Some([9].into());
        add_source(&mut db, floating);

        connect_sources(&mut db);
        assert_eq!(db.sources["a"].next_sources_optional, vec!["float"]);
        assert_eq!(db.sources["a"].next_sources, vec!["b1", "b2"]);
        assert!(db.sources["b1"].next_sources_optional.is_empty());
    }

    #[test]
    fn in_progress_condition_attaches_before_its_group() {
        let mut db = Database::new();
        quest(&mut db, 300);
        db.subquests.insert(
            500,
            SubQuest {
                id: 500,
                order: 5,
                ..SubQuest::default()
            },
        );
        db.talks.insert(
            9,
            Talk {
                id: 9,
                begin_cond_comb: CondComb::And,
                begin_cond: vec![(500, CondState::InProgress)],
                trusted: true,
                ..Talk::default()
            },
        );
        add_source(&mut db, source("a", 300, 1));
        add_source(&mut db, source("b", 300, 5));
        let mut floating = source("float", 300, -1);
        floating.talk_ids = Some([9].into());
        add_source(&mut db, floating);

        connect_sources(&mut db);
        assert_eq!(db.sources["b"].prev_sources_optional, vec!["float"]);
    }

    #[test]
    fn unconditioned_source_precedes_the_earliest_group() {
        let mut db = Database::new();
        quest(&mut db, 300);
        db.talks.insert(
            9,
            Talk {
                id: 9,
                trusted: true,
                ..Talk::default()
            },
        );
        add_source(&mut db, source("a", 300, 2));
        let mut floating = source("float", 300, -1);
        floating.talk_ids = Some([9].into());
        add_source(&mut db, floating);

        connect_sources(&mut db);
        assert_eq!(db.sources["a"].prev_sources_optional, vec!["float"]);
    }

    #[test]
    fn contradictory_conditions_fall_back_to_the_tail() {
        let mut db = Database::new();
        quest(&mut db, 300);
        for (id, order) in [(500, 1), (501, 5)] {
            db.subquests.insert(
                id,
                SubQuest {
                    id,
                    order,
                    ..SubQuest::default()
                },
            );
        }
        // In progress at order 1 AND finished at order 5: impossible.
        db.talks.insert(
            9,
            Talk {
                id: 9,
                begin_cond_comb: CondComb::And,
                begin_cond: vec![(500, CondState::InProgress), (501, CondState::Finished)],
                trusted: true,
                ..Talk::default()
            },
        );
        add_source(&mut db, source("a", 300, 1));
        add_source(&mut db, source("b", 300, 5));
        let mut floating = source("float", 300, -1);
        floating.talk_ids = Some([9].into());
        add_source(&mut db, floating);

        connect_sources(&mut db);
        assert_eq!(db.sources["b"].next_sources_optional, vec!["float"]);
    }

    #[test]
    fn adjacent_quests_link_last_group_to_first() {
        let mut db = Database::new();
        quest(&mut db, 300);
        quest(&mut db, 301);
        db.quests.get_mut(&300).unwrap().next_quests = vec![301];
        add_source(&mut db, source("a", 300, 1));
        add_source(&mut db, source("b", 300, 7));
        add_source(&mut db, source("c", 301, 2));

        connect_sources(&mut db);
        assert_eq!(db.sources["b"].next_sources, vec!["c"]);
        assert_eq!(db.sources["c"].prev_sources, vec!["b"]);
    }

    #[test]
    fn or_conditions_take_the_union() {
        let mut db = Database::new();
        quest(&mut db, 300);
        for (id, order) in [(500, 2), (501, 6)] {
            db.subquests.insert(
                id,
                SubQuest {
                    id,
                    order,
                    ..SubQuest::default()
                },
            );
        }
        // Finished at 2 OR in progress at 6: valid from just after order 2.
        db.talks.insert(
            9,
            Talk {
                id: 9,
                begin_cond_comb: CondComb::Or,
                begin_cond: vec![(500, CondState::Finished), (501, CondState::InProgress)],
                trusted: true,
                ..Talk::default()
            },
        );
        add_source(&mut db, source("a", 300, 2));
        add_source(&mut db, source("b", 300, 6));
        let mut floating = source("float", 300, -1);
        floating.talk_ids = Some([9].into());
        add_source(&mut db, floating);

        connect_sources(&mut db);
        assert_eq!(db.sources["a"].next_sources_optional, vec!["float"]);
    }
}
