//! Dialog corpus export
//!
//! Emits the source map as one JSON document: every source's traces
//! resolved to `{role, content}` pairs, neighbor lists purged of sources
//! that did not survive text filtering, and avatar chat voice lines
//! appended as synthetic single-trace sources.

use std::collections::BTreeSet;
use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;

use crate::database::Database;
use crate::database::types::Role;
use crate::error::{Error, Result};

use super::text::{NAMES_IN_VOICE_TEXT_CHS, TextFilter, WANDERER_NPC_IDS};
use super::{ExportOptions, TravellerSex, Utterance};

/// The twin avatars; the one of the opposite sex is not exported.
pub const AVATAR_ID_AETHER: i64 = 10000005;
pub const AVATAR_ID_LUMINE: i64 = 10000007;
/// Avatars whose voice texts quote other speakers inline.
const MULTI_SPEAKER_AVATARS: &[i64] = &[
    AVATAR_ID_AETHER,
    AVATAR_ID_LUMINE,
    10000031, // Fischl quotes Oz
    10000082, // Baizhu quotes Changsheng
];
/// Chat voice lines; battle voices are not narrative.
const VOICE_KIND_CHAT: i64 = 1;

#[derive(Debug, Serialize)]
struct SourceOut {
    quest_id: i64,
    subquest_id: i64,
    prev_sources: Vec<String>,
    prev_sources_optional: Vec<String>,
    next_sources: Vec<String>,
    next_sources_optional: Vec<String>,
    traces: Vec<Vec<Utterance>>,
}

/// Export `dialog.json`.
///
/// # Errors
/// [`Error::TextMapMissing`] when no text map is loaded; IO and JSON
/// errors propagate.
pub fn export_dialogs(db: &Database, path: &Path, opts: &ExportOptions) -> Result<()> {
    if db.text_map.is_empty() {
        return Err(Error::TextMapMissing);
    }
    info!(path = %path.display(), "exporting dialogs");
    let filter = TextFilter::new(opts);

    let mut result: IndexMap<String, SourceOut> = IndexMap::new();
    for (name, source) in &db.sources {
        let traces: Vec<Vec<Utterance>> = source
            .traces
            .iter()
            .filter_map(|trace| render_trace(db, &filter, trace))
            .filter(|trace| !trace.is_empty())
            .collect();
        if traces.is_empty() {
            continue;
        }
        result.insert(
            name.clone(),
            SourceOut {
                quest_id: source.quest_id,
                subquest_id: source.subquest_id,
                prev_sources: source.prev_sources.clone(),
                prev_sources_optional: source.prev_sources_optional.clone(),
                next_sources: source.next_sources.clone(),
                next_sources_optional: source.next_sources_optional.clone(),
                traces,
            },
        );
    }

    // Sources whose traces all filtered away disappear from the neighbor
    // lists too.
    let valid: BTreeSet<String> = result.keys().cloned().collect();
    for out in result.values_mut() {
        out.prev_sources.retain(|name| valid.contains(name));
        out.prev_sources_optional.retain(|name| valid.contains(name));
        out.next_sources.retain(|name| valid.contains(name));
        out.next_sources_optional.retain(|name| valid.contains(name));
    }

    append_voice_sources(db, &filter, &mut result);

    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), &result)?;
    Ok(())
}

/// Resolve one trace; `None` drops the trace entirely (broken, unreleased,
/// or challenge content).
fn render_trace(db: &Database, filter: &TextFilter<'_>, trace: &[i64]) -> Option<Vec<Utterance>> {
    let opts = filter.options();
    let mut rendered = Vec::with_capacity(trace.len());
    for dialog_id in trace {
        let Some(dialog) = db.dialogs.get(dialog_id) else {
            continue;
        };
        let role = resolve_role(db, filter, dialog.role, dialog.role_name_hash);
        let content = dialog
            .content_hash
            .and_then(|hash| db.text_map.get(&hash))
            .filter(|text| !text.is_empty());
        let content = match content {
            Some(text) => text.clone(),
            None if !opts.remove_absent_text => opts.unknown_text.clone(),
            None => {
                if opts.remove_broken_trace {
                    return None;
                }
                continue;
            }
        };
        if filter.is_unreleased(&content) || filter.is_unreleased(&role) {
            return None;
        }
        let content = filter.strip_markup(&content);
        if filter.has_quest_placeholder(&content) {
            return None;
        }
        let content = filter.substitute(&content, &opts.traveller_name);
        let role = filter.normalize_quotes(&role);
        let content = filter.normalize_quotes(&content);
        let content = filter.normalize_newlines(&content);
        if content.is_empty() {
            continue;
        }
        rendered.push(Utterance { role, content });
    }
    Some(rendered)
}

fn resolve_role(
    db: &Database,
    filter: &TextFilter<'_>,
    role: Role,
    role_name_hash: Option<i64>,
) -> String {
    let opts = filter.options();
    match role {
        Role::Player => opts.traveller_name.clone(),
        Role::Narrator => opts.narrator_name.clone(),
        Role::Mate => opts.mate_name.clone(),
        Role::Npc(id) if WANDERER_NPC_IDS.contains(&id) => opts.wanderer_name.clone(),
        _ => {
            if let Some(name) = role_name_hash
                .and_then(|hash| db.text_map.get(&hash))
                .filter(|name| !name.is_empty())
            {
                return name.clone();
            }
            if let Role::Npc(id) = role {
                if let Some(name) = db.npc_names.get(&id) {
                    return name.clone();
                }
            }
            opts.unknown_name.clone()
        }
    }
}

/// Append `avatar_<id>_voice_<i>` sources for chat voice lines.
fn append_voice_sources(
    db: &Database,
    filter: &TextFilter<'_>,
    result: &mut IndexMap<String, SourceOut>,
) {
    let opts = filter.options();
    let ignored_twin = match opts.traveller_sex {
        TravellerSex::Male => AVATAR_ID_LUMINE,
        TravellerSex::Female => AVATAR_ID_AETHER,
    };
    for (&avatar_id, avatar) in &db.avatars {
        if avatar_id == ignored_twin {
            continue;
        }
        let avatar_name = match avatar
            .name_hash
            .and_then(|hash| db.text_map.get(&hash))
        {
            Some(name) => name.clone(),
            None if opts.remove_absent_text => continue,
            None => opts.unknown_name.clone(),
        };
        for (index, voice) in avatar.voice_texts.iter().enumerate() {
            if voice.kind != VOICE_KIND_CHAT {
                continue;
            }
            let topic = voice
                .title_hash
                .and_then(|hash| db.text_map.get(&hash))
                .filter(|text| !text.is_empty());
            let content = voice
                .content_hash
                .and_then(|hash| db.text_map.get(&hash))
                .filter(|text| !text.is_empty());
            let (topic, content) = match (topic, content) {
                (Some(topic), Some(content)) => (topic.clone(), content.clone()),
                _ if opts.remove_absent_text => continue,
                (topic, content) => (
                    topic.cloned().unwrap_or_else(|| opts.unknown_text.clone()),
                    content.cloned().unwrap_or_else(|| opts.unknown_text.clone()),
                ),
            };
            if filter.is_unreleased(&topic) || filter.is_unreleased(&content) {
                continue;
            }
            let content = filter.strip_markup(&content);
            // The nickname stays a placeholder until after speaker
            // splitting; the split keys on it.
            let content = filter.substitute(&content, "{NICKNAME}");
            if content.is_empty() {
                continue;
            }

            let mut trace = if is_multi_speaker(avatar_id, opts, &content) {
                let mut split = split_voice_text(&content, &opts.traveller_name);
                if !matches!(avatar_id, AVATAR_ID_AETHER | AVATAR_ID_LUMINE) {
                    split.insert(
                        0,
                        Utterance {
                            role: opts.traveller_name.clone(),
                            content: topic.clone(),
                        },
                    );
                }
                split
            } else {
                vec![
                    Utterance {
                        role: opts.traveller_name.clone(),
                        content: topic.clone(),
                    },
                    Utterance {
                        role: avatar_name.clone(),
                        content,
                    },
                ]
            };
            for utterance in &mut trace {
                utterance.content = utterance.content.replace("{NICKNAME}", &opts.traveller_name);
                utterance.role = filter.normalize_quotes(&utterance.role);
                utterance.content = filter.normalize_quotes(&utterance.content);
                utterance.content = filter.normalize_newlines(&utterance.content);
            }
            result.insert(
                format!("avatar_{avatar_id}_voice_{index}"),
                SourceOut {
                    quest_id: -1,
                    subquest_id: -1,
                    prev_sources: Vec::new(),
                    prev_sources_optional: Vec::new(),
                    next_sources: Vec::new(),
                    next_sources_optional: Vec::new(),
                    traces: vec![trace],
                },
            );
        }
    }
}

/// Whether the voice text embeds lines of several speakers.
fn is_multi_speaker(avatar_id: i64, opts: &ExportOptions, content: &str) -> bool {
    let first_line = content.split("\\n").next().unwrap_or("");
    if opts.lang == "CHS" {
        NAMES_IN_VOICE_TEXT_CHS
            .iter()
            .any(|name| {
                first_line.starts_with(&format!("{name}: "))
                    || first_line.starts_with(&format!("{name}："))
            })
    } else {
        MULTI_SPEAKER_AVATARS.contains(&avatar_id)
            && (first_line.contains(": ") || first_line.contains('：'))
    }
}

/// Split a voice text with embedded speaker prefixes into utterances.
/// Lines without a colon continue the previous utterance.
fn split_voice_text(text: &str, traveller_name: &str) -> Vec<Utterance> {
    let mut trace: Vec<Utterance> = Vec::new();
    for turn in text.split("\\n") {
        if turn.is_empty() {
            continue;
        }
        let turn = turn.replace(": ", "：");
        match turn.split_once('：') {
            Some((speaker, line)) => {
                trace.push(Utterance {
                    role: speaker.trim().replace("{NICKNAME}", traveller_name),
                    content: line.trim().to_string(),
                });
            }
            None => {
                if let Some(last) = trace.last_mut() {
                    last.content.push_str(&turn);
                }
            }
        }
    }
    trace
}
