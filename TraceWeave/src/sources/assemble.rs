//! Per-source dialog graph assembly
//!
//! A talk source's graph contains every dialog reachable from its talks'
//! initial dialogs, plus boundary edges that inline the talk-level chaining:
//! a terminal dialog of talk `t` connects to the initial dialog of each talk
//! in `t.next_talks`. A dialog source's graph is read straight from the
//! dialog table, restricted to the source's members.

use std::collections::{BTreeMap, BTreeSet};

use crate::database::Database;
use crate::database::types::{Dialog, Role};
use crate::graph::IdGraph;

/// Every dialog reachable from `init` over `next_dialogs`, `init` included.
/// Iterative: quest chains routinely run thousands of dialogs deep.
pub fn reachable_dialogs(dialogs: &BTreeMap<i64, Dialog>, init: i64) -> BTreeSet<i64> {
    let mut visited = BTreeSet::new();
    let mut stack = vec![init];
    visited.insert(init);
    while let Some(id) = stack.pop() {
        let Some(dialog) = dialogs.get(&id) else {
            continue;
        };
        for &next in &dialog.next_dialogs {
            if visited.insert(next) {
                stack.push(next);
            }
        }
    }
    visited
}

/// Assemble the dialog graph of a talk source.
pub fn dialog_graph_from_talks(db: &Database, talk_ids: &BTreeSet<i64>) -> IdGraph {
    let mut graph = IdGraph::new();
    for &talk_id in talk_ids {
        if let Some(init) = db.talks.get(&talk_id).and_then(|talk| talk.init_dialog) {
            graph.add_node(init);
        }
    }
    for &talk_id in talk_ids {
        let Some(talk) = db.talks.get(&talk_id) else {
            continue;
        };
        let Some(init) = talk.init_dialog else {
            continue;
        };
        let mut terminals = BTreeSet::new();
        let mut visited = BTreeSet::new();
        let mut stack = vec![init];
        visited.insert(init);
        while let Some(id) = stack.pop() {
            let Some(dialog) = db.dialogs.get(&id) else {
                continue;
            };
            if dialog.next_dialogs.is_empty() {
                terminals.insert(id);
            }
            for &next in &dialog.next_dialogs {
                graph.add_edge(id, next, ());
                if visited.insert(next) {
                    stack.push(next);
                }
            }
        }
        // Inline the talk chaining: leaving this talk means entering the
        // next one's initial dialog.
        for &terminal in &terminals {
            for &next_talk in &talk.next_talks {
                if let Some(next_init) =
                    db.talks.get(&next_talk).and_then(|next| next.init_dialog)
                {
                    graph.add_edge(terminal, next_init, ());
                }
            }
        }
    }
    graph
}

/// Assemble the dialog graph of a dialog source (members only).
pub fn dialog_graph_from_dialogs(db: &Database, dialog_ids: &BTreeSet<i64>) -> IdGraph {
    let mut graph = IdGraph::new();
    for &dialog_id in dialog_ids {
        graph.add_node(dialog_id);
        let Some(dialog) = db.dialogs.get(&dialog_id) else {
            continue;
        };
        for &next in &dialog.next_dialogs {
            if dialog_ids.contains(&next) {
                graph.add_edge(dialog_id, next, ());
            }
        }
    }
    graph
}

/// Linearize player-choice fans.
///
/// A line of the player is sometimes broken into parallel options even
/// though the choice does not affect what follows. Whenever all options of
/// a fan are player lines with the same single successor, the fan becomes a
/// chain of options read in order:
///
/// ```text
/// npc --> opt1 --> npc2          npc --> opt1 --> opt2 --> npc2
///     \-> opt2 ------^
/// ```
///
/// Detection reads the immutable dialog records, so applying the rewrite
/// twice leaves the graph unchanged.
pub fn reorder_player_fans(dialogs: &BTreeMap<i64, Dialog>, graph: &mut IdGraph) {
    let mut nodes: Vec<i64> = graph.nodes().collect();
    nodes.sort_unstable();
    for node in nodes {
        let Some(record) = dialogs.get(&node) else {
            continue;
        };
        let fan = record.next_dialogs.clone();
        if fan.len() < 2 {
            continue;
        }
        if !fan.iter().all(|option| {
            graph.contains_node(*option)
                && dialogs
                    .get(option)
                    .is_some_and(|d| d.role == Role::Player && d.next_dialogs.len() == 1)
        }) {
            continue;
        }
        let join = dialogs[&fan[0]].next_dialogs[0];
        if !fan
            .iter()
            .all(|option| dialogs[option].next_dialogs[0] == join)
        {
            continue;
        }
        if !graph.contains_node(join) {
            continue;
        }
        // Overlapping fans may have removed some of these edges already.
        for &option in &fan[..fan.len() - 1] {
            graph.remove_edge(option, join);
        }
        for pair in fan.windows(2) {
            graph.remove_edge(node, pair[1]);
            graph.add_edge(pair[0], pair[1], ());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::types::Talk;
    use pretty_assertions::assert_eq;

    fn dialog(id: i64, role: Role, next: &[i64]) -> Dialog {
        Dialog {
            id,
            role,
            next_dialogs: next.to_vec(),
            trusted: true,
            ..Dialog::default()
        }
    }

    fn talk(id: i64, init: i64, next: &[i64]) -> Talk {
        Talk {
            id,
            init_dialog: Some(init),
            next_talks: next.to_vec(),
            trusted: true,
            ..Talk::default()
        }
    }

    fn edges_of(graph: &IdGraph) -> BTreeSet<(i64, i64)> {
        graph.all_edges().map(|(u, v, _)| (u, v)).collect()
    }

    #[test]
    fn boundary_edges_inline_talk_chaining() {
        let mut db = Database::new();
        db.dialogs.insert(20, dialog(20, Role::Npc(1), &[]));
        db.dialogs.insert(21, dialog(21, Role::Npc(1), &[]));
        db.talks.insert(1, talk(1, 20, &[2]));
        db.talks.insert(2, talk(2, 21, &[]));

        let graph = dialog_graph_from_talks(&db, &BTreeSet::from([1, 2]));
        assert_eq!(edges_of(&graph), BTreeSet::from([(20, 21)]));
    }

    #[test]
    fn player_fan_becomes_a_chain() {
        let mut db = Database::new();
        db.dialogs.insert(10, dialog(10, Role::Unknown, &[11, 12]));
        db.dialogs.insert(11, dialog(11, Role::Player, &[13]));
        db.dialogs.insert(12, dialog(12, Role::Player, &[13]));
        db.dialogs.insert(13, dialog(13, Role::Npc(5), &[]));
        db.talks.insert(1, talk(1, 10, &[]));

        let mut graph = dialog_graph_from_talks(&db, &BTreeSet::from([1]));
        reorder_player_fans(&db.dialogs, &mut graph);
        assert_eq!(
            edges_of(&graph),
            BTreeSet::from([(10, 11), (11, 12), (12, 13)])
        );
    }

    #[test]
    fn fan_rewrite_is_idempotent() {
        let mut db = Database::new();
        db.dialogs.insert(10, dialog(10, Role::Npc(2), &[11, 12, 13]));
        db.dialogs.insert(11, dialog(11, Role::Player, &[14]));
        db.dialogs.insert(12, dialog(12, Role::Player, &[14]));
        db.dialogs.insert(13, dialog(13, Role::Player, &[14]));
        db.dialogs.insert(14, dialog(14, Role::Npc(2), &[]));
        db.talks.insert(1, talk(1, 10, &[]));

        let mut graph = dialog_graph_from_talks(&db, &BTreeSet::from([1]));
        reorder_player_fans(&db.dialogs, &mut graph);
        let once = edges_of(&graph);
        reorder_player_fans(&db.dialogs, &mut graph);
        assert_eq!(edges_of(&graph), once);
        assert_eq!(
            once,
            BTreeSet::from([(10, 11), (11, 12), (12, 13), (13, 14)])
        );
    }

    #[test]
    fn fans_with_divergent_joins_stay_parallel() {
        let mut db = Database::new();
        db.dialogs.insert(10, dialog(10, Role::Npc(2), &[11, 12]));
        db.dialogs.insert(11, dialog(11, Role::Player, &[13]));
        db.dialogs.insert(12, dialog(12, Role::Player, &[14]));
        db.dialogs.insert(13, dialog(13, Role::Npc(2), &[]));
        db.dialogs.insert(14, dialog(14, Role::Npc(2), &[]));
        db.talks.insert(1, talk(1, 10, &[]));

        let mut graph = dialog_graph_from_talks(&db, &BTreeSet::from([1]));
        let before = edges_of(&graph);
        reorder_player_fans(&db.dialogs, &mut graph);
        assert_eq!(edges_of(&graph), before);
    }

    #[test]
    fn dialog_source_graph_stays_inside_the_member_set() {
        let mut db = Database::new();
        db.dialogs.insert(20, dialog(20, Role::Npc(1), &[21, 99]));
        db.dialogs.insert(21, dialog(21, Role::Npc(1), &[]));
        db.dialogs.insert(99, dialog(99, Role::Npc(1), &[]));

        let graph = dialog_graph_from_dialogs(&db, &BTreeSet::from([20, 21]));
        assert_eq!(edges_of(&graph), BTreeSet::from([(20, 21)]));
        assert!(!graph.contains_node(99));
    }
}
