//! Source construction: partitioning, graph assembly, trace covering,
//! and connection
//!
//! [`build_sources`] drives the per-source pipeline: partition talks and
//! orphan dialogs into sources, assemble each source's dialog graph,
//! linearize player fans, choose starts and ends, and cover the graph with
//! a minimum set of traces. Covering is independent per source, so it runs
//! on the rayon pool; results merge back in source order.

pub mod assemble;
pub mod connect;
pub mod cover;
pub mod flow;
pub mod partition;
pub mod start_end;

use std::collections::BTreeSet;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::database::Database;
use crate::graph::IdGraph;

pub use connect::connect_sources;

/// Partition the database into sources and cover each with traces.
pub fn build_sources(db: &mut Database) {
    info!("building sources and covering traces");
    partition::collect_talk_sources(db);

    // Assemble talk-source graphs and claim their dialogs.
    let talk_source_names: Vec<String> = db.sources.keys().cloned().collect();
    let mut graphs: Vec<(String, IdGraph)> = Vec::with_capacity(talk_source_names.len());
    for name in &talk_source_names {
        let talk_ids = db.sources[name]
            .talk_ids
            .clone()
            .expect("talk sources carry talk ids");
        let graph = assemble::dialog_graph_from_talks(db, &talk_ids);
        db.sources[name].dialog_ids = graph.nodes().collect();
        graphs.push((name.clone(), graph));
    }

    // Whatever the talk sources did not claim partitions by plain dialog
    // connectivity.
    let claimed: BTreeSet<i64> = graphs
        .iter()
        .flat_map(|(_, graph)| graph.nodes())
        .collect();
    partition::collect_dialog_sources(db, &claimed);
    for (name, source) in &db.sources {
        if source.talk_ids.is_none() {
            graphs.push((
                name.clone(),
                assemble::dialog_graph_from_dialogs(db, &source.dialog_ids),
            ));
        }
    }

    for (_, graph) in &mut graphs {
        assemble::reorder_player_fans(&db.dialogs, graph);
    }

    // Covering is embarrassingly parallel across sources; the collect
    // keeps input order, so the merge-back is deterministic.
    let inputs: Vec<(String, IdGraph, Vec<i64>)> = graphs
        .into_iter()
        .map(|(name, graph)| {
            let preferred: Vec<i64> = db.sources[&name]
                .talk_ids
                .as_ref()
                .map(|talk_ids| {
                    talk_ids
                        .iter()
                        .filter_map(|talk_id| {
                            db.talks.get(talk_id).and_then(|talk| talk.init_dialog)
                        })
                        .collect()
                })
                .unwrap_or_default();
            (name, graph, preferred)
        })
        .collect();
    let covered: Vec<(String, Vec<Vec<i64>>)> = inputs
        .into_par_iter()
        .map(|(name, graph, preferred)| {
            let (starts, ends) = start_end::find_start_end(&graph, &preferred);
            let traces = cover::find_covering_traces(&graph, &starts, &ends);
            (name, traces)
        })
        .collect();
    for (name, traces) in covered {
        if traces.is_empty() && !db.sources[&name].dialog_ids.is_empty() {
            warn!(source = %name, "source ended up with no traces");
        }
        db.sources[&name].traces = traces;
    }
}
