//! Text post-processing for exported strings
//!
//! Raw text-map strings carry engine markup: color tags, ruby annotations,
//! pronoun placeholders branching on the traveller's sex, and internal
//! tags marking unreleased or hidden content. The filter normalizes all of
//! it the same way for every exporter.

use regex::Regex;
use tracing::warn;

use super::{ExportOptions, TravellerSex};

/// Tags marking content that never shipped. Collected by hand; only the
/// simplified-Chinese dumps are tagged so far.
const UNRELEASED_TAGS_CHS: &[&str] = &[
    "unreleased",
    "(test)",
    "（test）",
    "（test)",
    "(test）",
    "( test)",
    "（ test）",
    "（ test)",
    "( test）",
    "(test )",
    "（test ）",
    "（test )",
    "(test ）",
    "（废弃）",
    "(废弃）",
    "（废弃)",
    "(废弃)",
    "此道具废弃",
];

/// Tags whose presence hides the whole text.
const HIDDEN_TAGS: &[&str] = &["$HIDDEN"];

/// Tags in subquest step descriptions marking skippable steps.
const SKIP_TAGS_CHS: &[&str] = &["(跳过)"];

/// Placeholders of challenge quests; a line carrying one aborts its trace.
const QUEST_PLACEHOLDERS: &[&str] = &[
    "{QuestNpcID}",
    "{QuestGatherID}",
    "{QuestGatherNum}",
    "{QuestNpcID2}",
    "{ChallengeIndex10}",
    "{ChallengeCurrValue10}",
];

/// Corner quotes replaced by the usual curly kind in simplified Chinese.
const QUOTE_MAPPINGS_CHS: &[(&str, &str)] = &[
    ("「", "“"),
    ("」", "”"),
    ("『", "‘"),
    ("』", "’"),
];

/// Pronoun table for `{PLAYERAVATAR#SEXPRO[...]}` placeholders.
const SEXPRO_CHS: &[(&str, &str)] = &[
    ("INFO_FEMALE_PRONOUN_AUNT", "阿姨"),
    ("INFO_MALE_PRONOUN_UNCLE", "叔叔"),
    ("INFO_FEMALE_PRONOUN_BIGSISTER", "大姐姐"),
    ("INFO_MALE_PRONOUN_BIGBROTHER", "大哥哥"),
    ("INFO_FEMALE_PRONOUN_BROTHER", "哥哥"),
    ("INFO_MALE_PRONOUN_SISTER", "妹妹"),
    ("INFO_FEMALE_PRONOUN_CUTEBIGSISTER", "大捷洁"),
    ("INFO_MALE_PRONOUN_CUTEBIGBROTHER", "大葛格"),
    ("INFO_FEMALE_PRONOUN_GIRLA", "老妹"),
    ("INFO_MALE_PRONOUN_BOYA", "小哥"),
    ("INFO_FEMALE_PRONOUN_GIRLB", "姑娘"),
    ("INFO_FEMALE_PRONOUN_GIRLC", "小姐"),
    ("INFO_MALE_PRONOUN_BOYC", "先生"),
    ("INFO_FEMALE_PRONOUN_GIRLD", "公主"),
    ("INFO_MALE_PRONOUN_BOYD", "王子"),
    ("INFO_FEMALE_PRONOUN_BOYD", "王子"),
    ("INFO_MALE_PRONOUN_GIRLD", "公主"),
    ("INFO_FEMALE_PRONOUN_GIRLE", "小姑娘"),
    ("INFO_MALE_PRONOUN_BOYE", "小伙子"),
    ("INFO_FEMALE_PRONOUN_GIRLF", "女士"),
    ("INFO_FEMALE_PRONOUN_GIRL", "少女"),
    ("INFO_MALE_PRONOUN_BOY", "少年"),
    ("INFO_FEMALE_PRONOUN_HEROINE", "女一号"),
    ("INFO_MALE_PRONOUN_HERO", "男一号"),
    ("INFO_FEMALE_PRONOUN_HE", "他"),
    ("INFO_MALE_PRONOUN_SHE", "她"),
    ("INFO_FEMALE_PRONOUN_KONG", "空"),
    ("INFO_MALE_PRONOUN_YING", "荧"),
    ("INFO_FEMALE_PRONOUN_SHE", "她"),
    ("INFO_MALE_PRONOUN_HE", "他"),
    ("INFO_FEMALE_PRONOUN_SISANDSIS", "两位姐姐"),
    ("INFO_MALE_PRONOUN_BROANDSIS", "哥哥姐姐"),
    ("INFO_FEMALE_PRONOUN_SISTERA", "姐姐"),
    ("INFO_FEMALE_PRONOUN_SISTER", "妹妹"),
    ("INFO_FEMALE_PRONOUN_XIAGIRL", "女侠"),
    ("INFO_MALE_PRONOUN_XIABOY", "少侠"),
    ("INFO_FEMALE_PRONOUN_YING", "荧"),
    ("INFO_MALE_PRONOUN_BROTHER", "哥哥"),
];

/// Names that may open a speaker line inside a voice text.
pub const NAMES_IN_VOICE_TEXT_CHS: &[&str] = &["{NICKNAME}", "派蒙", "菲谢尔", "奥兹", "白术", "长生"];

/// The wanderer speaks under several NPC ids.
pub const WANDERER_NPC_IDS: &[i64] = &[12947, 1065, 9075, 9547];

/// Shared text post-processing for the exporters.
pub struct TextFilter<'a> {
    opts: &'a ExportOptions,
    color_open: Regex,
    color_close: Regex,
    placeholder: Regex,
    ruby: Regex,
    blank_lines: Regex,
}

impl<'a> TextFilter<'a> {
    pub fn new(opts: &'a ExportOptions) -> Self {
        TextFilter {
            opts,
            color_open: Regex::new(r"<color=[^>]*>").expect("valid pattern"),
            color_close: Regex::new(r"</color>").expect("valid pattern"),
            placeholder: Regex::new(r"\{([^}]*)\}").expect("valid pattern"),
            ruby: Regex::new(r"\{RUBY#\[D\]([^}]*)\}").expect("valid pattern"),
            blank_lines: Regex::new(r"\n{2,}").expect("valid pattern"),
        }
    }

    pub fn options(&self) -> &ExportOptions {
        self.opts
    }

    /// Strip engine color tags.
    pub fn strip_markup(&self, text: &str) -> String {
        let text = self.color_open.replace_all(text, "");
        self.color_close.replace_all(&text, "").into_owned()
    }

    /// Whether the text carries an unreleased tag for the export language.
    pub fn is_unreleased(&self, text: &str) -> bool {
        let Some(tags) = unreleased_tags(&self.opts.lang) else {
            return false;
        };
        let lowered = text.to_lowercase();
        tags.iter().any(|tag| lowered.contains(tag))
    }

    /// Whether the text is hidden outright.
    pub fn is_hidden(&self, text: &str) -> bool {
        HIDDEN_TAGS.iter().any(|tag| text.contains(tag))
    }

    /// Whether the text carries a challenge-quest placeholder.
    pub fn has_quest_placeholder(&self, text: &str) -> bool {
        QUEST_PLACEHOLDERS.iter().any(|tag| text.contains(tag))
    }

    /// Remove skip tags from subquest descriptions.
    pub fn remove_skip_tags(&self, text: &str) -> String {
        let mut text = text.to_string();
        if self.opts.lang == "CHS" {
            for tag in SKIP_TAGS_CHS {
                text = text.replace(tag, "");
            }
        }
        text
    }

    /// Substitute pronoun and name placeholders. `nickname` is the value
    /// for `{NICKNAME}`; the voice exporter defers it.
    pub fn substitute(&self, content: &str, nickname: &str) -> String {
        let mut content = content.to_string();
        let glosses: Vec<String> = self
            .ruby
            .captures_iter(&content)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect();
        for gloss in glosses {
            content = content.replace(&format!("{{RUBY#[D]{gloss}}}"), "");
        }
        // Only '#'-prefixed texts carry conditional placeholders.
        if !content.starts_with('#') {
            return content;
        }
        let placeholders: Vec<String> = self
            .placeholder
            .captures_iter(&content)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect();
        for placeholder in placeholders {
            let target = self.resolve_placeholder(&placeholder, nickname);
            let Some(target) = target else {
                warn!(placeholder = %placeholder, "unresolvable text placeholder left in place");
                continue;
            };
            content = content.replace(&format!("{{{placeholder}}}"), &target);
        }
        content[1..].to_string()
    }

    fn resolve_placeholder(&self, placeholder: &str, nickname: &str) -> Option<String> {
        if let Some((selector, body)) = placeholder.split_once('#') {
            return match selector {
                "PLAYERAVATAR" | "MATEAVATAR" => {
                    // e.g. SEXPRO[INFO_FEMALE_PRONOUN_AUNT|INFO_MALE_PRONOUN_UNCLE]
                    let body = body.strip_suffix(']')?;
                    let (category, choices) = body.split_once('[')?;
                    if category != "SEXPRO" || self.opts.lang != "CHS" {
                        return None;
                    }
                    // The alternatives list is indexed 1 for the female
                    // traveller under PLAYERAVATAR and for the male one
                    // under MATEAVATAR.
                    let choice_index = match selector {
                        "PLAYERAVATAR" => self.opts.traveller_sex == TravellerSex::Female,
                        _ => self.opts.traveller_sex == TravellerSex::Male,
                    };
                    let key = choices.split('|').nth(usize::from(choice_index))?;
                    SEXPRO_CHS
                        .iter()
                        .find(|(name, _)| *name == key)
                        .map(|&(_, value)| value.to_string())
                }
                "M" => Some(
                    if self.opts.traveller_sex == TravellerSex::Male {
                        body.to_string()
                    } else {
                        String::new()
                    },
                ),
                "F" => Some(
                    if self.opts.traveller_sex == TravellerSex::Female {
                        body.to_string()
                    } else {
                        String::new()
                    },
                ),
                _ => None,
            };
        }
        match placeholder {
            "REALNAME[ID(1)|HOSTONLY(true)]" | "REALNAME[ID(1)]" => {
                Some(self.opts.wanderer_name.clone())
            }
            "NICKNAME" => Some(nickname.to_string()),
            _ => None,
        }
    }

    /// Replace corner quotes with the usual kind, when enabled.
    pub fn normalize_quotes(&self, text: &str) -> String {
        if !self.opts.replace_quotes || self.opts.lang != "CHS" {
            return text.to_string();
        }
        let mut text = text.to_string();
        for &(from, to) in QUOTE_MAPPINGS_CHS {
            text = text.replace(from, to);
        }
        text
    }

    /// Unescape newline characters, when enabled.
    pub fn normalize_newlines(&self, text: &str) -> String {
        if self.opts.replace_newline {
            text.replace("\\n", "\n")
        } else {
            text.to_string()
        }
    }

    /// Codex post-processing: markup, quotes, newlines, and blank-line
    /// trimming in one go.
    pub fn tidy(&self, text: &str) -> String {
        let text = self.strip_markup(text);
        let text = self.normalize_quotes(&text);
        let text = self.normalize_newlines(&text);
        self.blank_lines
            .replace_all(text.trim(), "\n\n")
            .into_owned()
    }
}

fn unreleased_tags(lang: &str) -> Option<&'static [&'static str]> {
    (lang == "CHS").then_some(UNRELEASED_TAGS_CHS)
}
