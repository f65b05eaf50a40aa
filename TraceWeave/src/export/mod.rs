//! Final output emission
//!
//! The exporters consume the finished database and write the dialog
//! corpus (`dialog.json`), the quest/chapter index (`quest.json`), and the
//! codex CSV tables. All text passes through [`text::TextFilter`], which
//! owns markup stripping, placeholder substitution, and the release
//! filters.

pub mod codex;
pub mod dialogs;
pub mod quests;
pub mod text;

pub use dialogs::export_dialogs;
pub use quests::export_quests;

use serde::Serialize;

/// Traveller sex; decides pronoun placeholders and which twin is exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravellerSex {
    Male,
    Female,
}

/// Knobs shared by all exporters.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub lang: String,
    pub traveller_sex: TravellerSex,
    pub traveller_name: String,
    pub mate_name: String,
    pub wanderer_name: String,
    pub narrator_name: String,
    /// Stands in for a speaker whose name is absent from the text map.
    pub unknown_name: String,
    /// Stands in for a line whose text is absent from the text map.
    pub unknown_text: String,
    pub replace_quotes: bool,
    pub replace_newline: bool,
    /// Drop a whole trace when one of its lines has no text; otherwise the
    /// line alone is skipped.
    pub remove_broken_trace: bool,
    /// Skip absent texts instead of substituting `unknown_text`.
    pub remove_absent_text: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            lang: "CHS".to_string(),
            traveller_sex: TravellerSex::Female,
            traveller_name: "旅行者".to_string(),
            mate_name: "空".to_string(),
            wanderer_name: "流浪者".to_string(),
            narrator_name: "`旁白`".to_string(),
            unknown_name: "`未知`".to_string(),
            unknown_text: "`未知`".to_string(),
            replace_quotes: true,
            replace_newline: true,
            remove_broken_trace: false,
            remove_absent_text: true,
        }
    }
}

/// One spoken line of an exported trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Utterance {
    pub role: String,
    pub content: String,
}
