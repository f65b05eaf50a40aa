//! Command definitions and execution

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Subcommand;

use crate::export::{ExportOptions, TravellerSex};
use crate::formats::AliasTable;
use crate::pipeline::{self, PipelineConfig};

use super::progress::{DISK, GEAR, LOOKING_GLASS, print_done, print_step};

#[derive(Subcommand)]
pub enum Commands {
    /// Extract the dialog corpus and codex tables from a data dump
    #[command(long_about = "Extract the dialog corpus and codex tables from a data dump

Reads the talk/dialog/quest JSON trees and the excel tables under DATA_DIR,
reconstructs the dialog graphs, covers every source with a minimum set of
traces, and writes dialog.json, quest.json, and the codex CSV files.

Examples:
  traceweave export ./GameData
  traceweave export ./GameData --output-dir out --lang CHS
  traceweave export ./GameData --traveller-sex male --keep-quest-cycles")]
    Export {
        /// Directory containing the extracted game data
        data_dir: PathBuf,

        /// The output directory
        #[arg(long, default_value = "exp/output")]
        output_dir: PathBuf,

        /// Language of the exported text
        #[arg(long, default_value = "CHS")]
        lang: String,

        /// Alias table override (TOML)
        #[arg(long)]
        aliases: Option<PathBuf>,

        /// Keep cycles in the quest graph instead of removing them
        #[arg(long)]
        keep_quest_cycles: bool,

        /// Traveller's sex; determines some pronoun substitutions
        #[arg(long, value_parser = parse_sex, default_value = "female")]
        traveller_sex: TravellerSex,

        /// Traveller's name for name placeholders
        #[arg(long, default_value = "旅行者")]
        traveller_name: String,

        /// Name of the traveller's mate; defaults to the other twin
        #[arg(long)]
        mate_name: Option<String>,

        /// Wanderer's name for his placeholder and NPC ids
        #[arg(long, default_value = "流浪者")]
        wanderer_name: String,

        /// Speaker name used for black-screen narration
        #[arg(long, default_value = "`旁白`")]
        narrator_name: String,

        /// Marker for speakers whose name is absent
        #[arg(long, default_value = "`未知`")]
        unknown_name: String,

        /// Marker for lines whose text is absent
        #[arg(long, default_value = "`未知`")]
        unknown_text: String,

        /// Keep corner quotes instead of normalizing them
        #[arg(long)]
        keep_quotes: bool,

        /// Keep escaped newline characters
        #[arg(long)]
        keep_newlines: bool,

        /// Drop a whole trace when one of its lines has no text
        #[arg(long)]
        remove_broken_traces: bool,

        /// Substitute the unknown-text marker instead of skipping absent lines
        #[arg(long)]
        keep_absent_text: bool,
    },

    /// Ingest and clean a data dump, then print database statistics
    Stats {
        /// Directory containing the extracted game data
        data_dir: PathBuf,

        /// Alias table override (TOML)
        #[arg(long)]
        aliases: Option<PathBuf>,
    },
}

fn parse_sex(value: &str) -> Result<TravellerSex, String> {
    match value {
        "male" => Ok(TravellerSex::Male),
        "female" => Ok(TravellerSex::Female),
        other => Err(format!("invalid sex '{other}' (male or female)")),
    }
}

impl Commands {
    /// Execute the selected command.
    ///
    /// # Errors
    /// Returns an error if the underlying pipeline fails.
    pub fn execute(self) -> anyhow::Result<()> {
        match self {
            Commands::Export {
                data_dir,
                output_dir,
                lang,
                aliases,
                keep_quest_cycles,
                traveller_sex,
                traveller_name,
                mate_name,
                wanderer_name,
                narrator_name,
                unknown_name,
                unknown_text,
                keep_quotes,
                keep_newlines,
                remove_broken_traces,
                keep_absent_text,
            } => {
                let started = Instant::now();
                let mate_name = mate_name.unwrap_or_else(|| {
                    // The mate is the twin the player did not pick.
                    match traveller_sex {
                        TravellerSex::Female => "空".to_string(),
                        TravellerSex::Male => "荧".to_string(),
                    }
                });
                let mut config = PipelineConfig::new(data_dir, output_dir);
                config.remove_quest_cycles = !keep_quest_cycles;
                config.aliases = load_aliases(aliases)?;
                config.export = ExportOptions {
                    lang,
                    traveller_sex,
                    traveller_name,
                    mate_name,
                    wanderer_name,
                    narrator_name,
                    unknown_name,
                    unknown_text,
                    replace_quotes: !keep_quotes,
                    replace_newline: !keep_newlines,
                    remove_broken_trace: remove_broken_traces,
                    remove_absent_text: !keep_absent_text,
                };

                print_step(1, 4, LOOKING_GLASS, "Parsing data dump...");
                let mut db = pipeline::ingest(&config).context("ingesting data dump")?;
                print_step(2, 4, GEAR, "Reconstructing dialog graphs and traces...");
                pipeline::process(&mut db, &config);
                print_step(3, 4, LOOKING_GLASS, "Loading localization...");
                pipeline::load_texts(&mut db, &config).context("loading text maps")?;
                print_step(4, 4, DISK, "Writing outputs...");
                pipeline::write_outputs(&db, &config).context("writing outputs")?;
                print_done(started.elapsed());
                Ok(())
            }
            Commands::Stats { data_dir, aliases } => {
                let mut config = PipelineConfig::new(data_dir, "unused");
                config.aliases = load_aliases(aliases)?;
                let mut db = pipeline::ingest(&config).context("ingesting data dump")?;
                db.link_prev_talks();
                let report = db.clean();
                println!("talks:          {}", db.talks.len());
                println!("dialogs:        {}", db.dialogs.len());
                println!("quests:         {}", db.quests.len());
                println!("subquests:      {}", db.subquests.len());
                println!("chapters:       {}", db.chapters.len());
                println!("avatars:        {}", db.avatars.len());
                println!("items:          {}", db.items.len());
                println!("weapons:        {}", db.weapons.len());
                println!("reliquary sets: {}", db.reliquary_sets.len());
                println!(
                    "dropped talks:  {}/{}",
                    report.dropped_talks, report.talks_before
                );
                Ok(())
            }
        }
    }
}

fn load_aliases(path: Option<PathBuf>) -> anyhow::Result<AliasTable> {
    match path {
        Some(path) => {
            AliasTable::from_path(&path).with_context(|| format!("loading {}", path.display()))
        }
        None => Ok(AliasTable::default()),
    }
}
