//! Obfuscated-field alias table
//!
//! Every game patch may rename record fields to fresh obfuscated tokens, so
//! the canonical-name → alias mapping lives in configuration rather than in
//! code. A built-in table covering the known dumps ships embedded; operators
//! can override it with `--aliases <file.toml>` when a patch rotates names.
//!
//! A record whose `id` resolves only through an ordinary alias is ingested
//! as *untrusted*: it yields to any trusted record with the same id instead
//! of conflicting with it. Aliases listed under `trusted_aliases` (stable
//! alternate spellings, not obfuscation) do not demote trust.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// How a field's value was located on a raw record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Found under its canonical name.
    Canonical,
    /// Found under an alias that does not demote trust.
    TrustedAlias,
    /// Found under an obfuscated alias; the record becomes untrusted.
    Alias,
}

impl FieldSource {
    pub fn is_trusted(self) -> bool {
        !matches!(self, FieldSource::Alias)
    }
}

/// Alias mapping for one record family.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AliasSection {
    #[serde(default)]
    pub trusted_aliases: Vec<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, Vec<String>>,
}

impl AliasSection {
    /// Look `key` up on `obj`, trying the canonical name first and then the
    /// configured aliases in order.
    pub fn get<'v>(&self, obj: &'v Map<String, Value>, key: &str) -> Option<(&'v Value, FieldSource)> {
        if let Some(value) = obj.get(key) {
            return Some((value, FieldSource::Canonical));
        }
        for alias in self.fields.get(key).into_iter().flatten() {
            if let Some(value) = obj.get(alias.as_str()) {
                let source = if self.trusted_aliases.iter().any(|a| a == alias) {
                    FieldSource::TrustedAlias
                } else {
                    FieldSource::Alias
                };
                return Some((value, source));
            }
        }
        None
    }

    /// Like [`AliasSection::get`] but without the provenance.
    pub fn value<'v>(&self, obj: &'v Map<String, Value>, key: &str) -> Option<&'v Value> {
        self.get(obj, key).map(|(value, _)| value)
    }
}

/// The full alias table, one section per record family.
#[derive(Debug, Clone, Deserialize)]
pub struct AliasTable {
    #[serde(default)]
    pub talk: AliasSection,
    #[serde(default)]
    pub dialog: AliasSection,
    /// Sub-object of a dialog's `talkRole`.
    #[serde(default)]
    pub role: AliasSection,
    #[serde(default)]
    pub quest: AliasSection,
    #[serde(default)]
    pub codex: AliasSection,
    /// File-level container keys (`talks`, `dialogList`, `talkId`).
    #[serde(default)]
    pub container: AliasSection,
}

/// Aliases observed in the known data dumps.
const EMBEDDED_ALIASES: &str = r#"
[talk]
[talk.fields]
id = ["JOLEJEFDNJJ", "CCFPGAKINNB"]
initDialog = ["FBALOFKGJKN", "FMFFELFBBJN"]
npcId = ["JDOFKFPHIDC"]
nextTalks = ["EECDLICEMBF"]
beginCondComb = ["KHBAFFEPLFB"]
beginCond = ["AFNAENENCBB"]
type = ["_type"]
param = ["_param"]

[dialog]
trusted_aliases = ["GFLDJMJKIKE"]
[dialog.fields]
id = ["GFLDJMJKIKE", "CCFPGAKINNB", "JOLEJEFDNJJ"]
nextDialogs = ["FNNPCGIAELE", "CLMNEDLMAJL"]
talkRole = ["HJLEMJIGNFE", "IFAOOKCBDGD"]
talkContentTextMapHash = ["BDOKCLNNDGN", "EMKCOIBADBJ"]
talkRoleNameTextMapHash = ["EIKACHBNBMJ"]

[role]
[role.fields]
type = ["_type"]
id = ["_id"]

[quest]
[quest.fields]
id = ["CCFPGAKINNB"]
type = ["JNMCHAGDLOL"]
titleTextMapHash = ["HLAINHJACPJ"]
descTextMapHash = ["CJBHOPEAEPN"]
chapterId = ["FLCLAPBOOHF"]
subQuests = ["POJOCEPJPAL"]
subId = ["OHGOECEBPJM"]
order = ["NKCPJODPKPO"]
finishCond = ["AODHOADLAJC"]
param = ["OBKNOBNIEGC"]
talks = ["PCNNNPLAEAI"]

[codex]
[codex.fields]
avatarVisionNameBeforTextMapHash = ["AMOCIMEIEOG"]
avatarVisionNameAfterTextMapHash = ["DOEBOFLEBLL"]

[container]
[container.fields]
talks = ["DMIMNILOLKP", "PCNNNPLAEAI"]
dialogList = ["AAOAAFLLOJI", "KJNKFMPAGAA"]
talkId = ["FEOACBMDCKJ", "PBAEPDPNKEJ"]
"#;

impl Default for AliasTable {
    fn default() -> Self {
        toml::from_str(EMBEDDED_ALIASES).expect("embedded alias table is valid")
    }
}

impl AliasTable {
    /// Load an alias table from a TOML file, replacing the embedded one.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&text).map_err(|e| Error::AliasTable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().expect("object").clone()
    }

    #[test]
    fn canonical_fields_resolve_trusted() {
        let table = AliasTable::default();
        let item = obj(json!({"id": 7}));
        let (value, source) = table.talk.get(&item, "id").unwrap();
        assert_eq!(value, &json!(7));
        assert_eq!(source, FieldSource::Canonical);
    }

    #[test]
    fn obfuscated_fields_resolve_untrusted() {
        let table = AliasTable::default();
        let item = obj(json!({"JOLEJEFDNJJ": 7}));
        let (value, source) = table.talk.get(&item, "id").unwrap();
        assert_eq!(value, &json!(7));
        assert_eq!(source, FieldSource::Alias);
        assert!(!source.is_trusted());
    }

    #[test]
    fn excel_dialog_id_alias_keeps_trust() {
        let table = AliasTable::default();
        let item = obj(json!({"GFLDJMJKIKE": 100}));
        let (_, source) = table.dialog.get(&item, "id").unwrap();
        assert_eq!(source, FieldSource::TrustedAlias);
        assert!(source.is_trusted());
    }

    #[test]
    fn aliases_try_in_configured_order() {
        let table = AliasTable::default();
        let item = obj(json!({"FBALOFKGJKN": 1, "FMFFELFBBJN": 2}));
        let (value, _) = table.talk.get(&item, "initDialog").unwrap();
        assert_eq!(value, &json!(1));
    }
}
