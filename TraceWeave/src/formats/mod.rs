//! Raw asset normalization
//!
//! This module turns loosely-typed JSON dump records into the typed records
//! of [`crate::database::types`]. It owns the obfuscated-field alias table
//! ([`aliases`]), the per-family normalizers, and the text-map loader.
//! Nothing here merges or validates across records; that is the database's
//! job.

pub mod aliases;
pub mod chapter;
pub mod codex;
pub mod common;
pub mod dialog;
pub mod quest;
pub mod talk;
pub mod textmap;

pub use aliases::{AliasTable, FieldSource};
pub use chapter::parse_chapter;
pub use dialog::parse_dialog;
pub use quest::{ANY_TALK, RawQuest, parse_quest};
pub use talk::parse_talk;
pub use textmap::{load_npc_names, load_readables, load_text_map};
