//! # `TraceWeave`
//!
//! A pure-Rust library for reconstructing the narrative dialog corpus of a
//! large RPG from its raw asset dumps.
//!
//! The dumps shard talks, dialogs, quests, and chapters over thousands of
//! JSON files with overlapping coverage and obfuscated field names.
//! `TraceWeave` merges them under strict consistency rules, assembles the
//! implied dialog graphs, partitions them into narrative *sources*, covers
//! every source with a minimum set of linear *traces* (a minimum-cost flow
//! problem over a split-vertex auxiliary graph), orders the sources along
//! the quest DAG, and exports the whole corpus with localized text.
//!
//! ## Quick Start
//!
//! ```no_run
//! use traceweave::pipeline::{self, PipelineConfig};
//!
//! let config = PipelineConfig::new("GameData", "exp/output");
//! pipeline::run(&config)?;
//! # Ok::<(), traceweave::Error>(())
//! ```
//!
//! Or drive the phases individually:
//!
//! ```no_run
//! use traceweave::pipeline::{self, PipelineConfig};
//!
//! let config = PipelineConfig::new("GameData", "exp/output");
//! let mut db = pipeline::ingest(&config)?;
//! pipeline::process(&mut db, &config);
//! for (name, source) in &db.sources {
//!     println!("{name}: {} traces", source.traces.len());
//! }
//! # Ok::<(), traceweave::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `traceweave` command-line binary

pub mod database;
pub mod error;
pub mod export;
pub mod formats;
pub mod graph;
pub mod pipeline;
pub mod quests;
pub mod sources;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::database::Database;
    pub use crate::database::types::{Dialog, Quest, Role, Source, SubQuest, Talk};
    pub use crate::error::{Error, Result};
    pub use crate::export::{ExportOptions, TravellerSex};
    pub use crate::formats::AliasTable;
    pub use crate::pipeline::{PipelineConfig, run};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
