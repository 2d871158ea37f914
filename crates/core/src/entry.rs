use serde_json::{json, Map, Value};

use crate::strategy::Strategy;
use crate::uid::EntryUid;

/// Document field names for the values the editor models directly.
/// 編輯器直接建模之欄位在文件中的名稱。
pub mod field {
    pub const UID: &str = "uid";
    pub const KEYS: &str = "key";
    pub const SECONDARY_KEYS: &str = "keysecondary";
    pub const COMMENT: &str = "comment";
    pub const CONTENT: &str = "content";
    pub const CONSTANT: &str = "constant";
    pub const VECTORIZED: &str = "vectorized";
    pub const SELECTIVE: &str = "selective";
    pub const SELECTIVE_LOGIC: &str = "selectiveLogic";
    pub const DISABLE: &str = "disable";
    pub const DISPLAY_INDEX: &str = "displayIndex";

    pub const MODELED: [&str; 11] = [
        UID,
        KEYS,
        SECONDARY_KEYS,
        COMMENT,
        CONTENT,
        CONSTANT,
        VECTORIZED,
        SELECTIVE,
        SELECTIVE_LOGIC,
        DISABLE,
        DISPLAY_INDEX,
    ];

    pub fn is_modeled(name: &str) -> bool {
        MODELED.contains(&name)
    }
}

/// Default values of the schema fields the editor carries without
/// interpreting them, in document order.
/// 編輯器不解讀、僅保留之欄位的預設值。
pub fn default_attributes() -> Map<String, Value> {
    let defaults = json!({
        "addMemo": true,
        "order": 100,
        "position": 0,
        "excludeRecursion": false,
        "preventRecursion": false,
        "delayUntilRecursion": false,
        "probability": 100,
        "useProbability": true,
        "depth": 4,
        "group": "",
        "groupOverride": false,
        "groupWeight": 100,
        "scanDepth": null,
        "caseSensitive": null,
        "matchWholeWords": null,
        "useGroupScoring": null,
        "automationId": "",
        "role": null,
        "sticky": 0,
        "cooldown": 0,
        "delay": 0,
    });
    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// How primary and secondary keywords combine when `selective` is set.
/// `selective` 啟用時主要與次要關鍵字的組合方式。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SelectiveLogic {
    #[default]
    And,
    Not,
}

impl SelectiveLogic {
    pub fn code(self) -> u8 {
        match self {
            SelectiveLogic::And => 0,
            SelectiveLogic::Not => 1,
        }
    }

    /// Any code other than `1` reads as AND.
    pub fn from_code(code: i64) -> Self {
        if code == 1 {
            SelectiveLogic::Not
        } else {
            SelectiveLogic::And
        }
    }
}

/// One lorebook record.
/// 一筆 lorebook 條目。
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    uid: EntryUid,
    keys: Vec<String>,
    secondary_keys: Vec<String>,
    pub comment: String,
    pub content: String,
    pub disabled: bool,
    pub selective: bool,
    pub selective_logic: SelectiveLogic,
    pub strategy: Strategy,
    attributes: Map<String, Value>,
    display_index: usize,
}

impl Entry {
    /// Builds an entry carrying the default schema, as created by "add".
    /// 以預設欄位建立新條目。
    pub fn new(uid: EntryUid) -> Self {
        Self {
            uid,
            keys: Vec::new(),
            secondary_keys: Vec::new(),
            comment: String::new(),
            content: String::new(),
            disabled: false,
            selective: true,
            selective_logic: SelectiveLogic::And,
            // The default schema stores constant=false, vectorized=true.
            strategy: Strategy::from_flags(false, true),
            attributes: default_attributes(),
            display_index: 0,
        }
    }

    pub fn uid(&self) -> EntryUid {
        self.uid
    }

    pub(crate) fn set_uid(&mut self, uid: EntryUid) {
        self.uid = uid;
    }

    /// Position mirror; only meaningful right after the owning registry
    /// refreshed it.
    pub fn display_index(&self) -> usize {
        self.display_index
    }

    pub(crate) fn set_display_index(&mut self, index: usize) {
        self.display_index = index;
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn secondary_keys(&self) -> &[String] {
        &self.secondary_keys
    }

    /// Replaces the primary keywords, dropping blank items.
    pub fn set_keys<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = clean_keywords(keys);
    }

    pub fn set_secondary_keys<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.secondary_keys = clean_keywords(keys);
    }

    /// Primary keywords as the comma-separated text shown in the editor.
    /// 以逗號分隔文字呈現主要關鍵字。
    pub fn keys_text(&self) -> String {
        self.keys.join(", ")
    }

    pub fn secondary_keys_text(&self) -> String {
        self.secondary_keys.join(", ")
    }

    pub fn set_keys_from_text(&mut self, text: &str) {
        self.keys = split_keywords(text);
    }

    pub fn set_secondary_keys_from_text(&mut self, text: &str) {
        self.secondary_keys = split_keywords(text);
    }

    pub fn is_enabled(&self) -> bool {
        !self.disabled
    }

    /// Flips `disabled` and returns the new enabled state.
    pub fn toggle_enabled(&mut self) -> bool {
        self.disabled = !self.disabled;
        !self.disabled
    }

    /// `(constant, vectorized)` as written to the document.
    pub fn flags(&self) -> (bool, bool) {
        self.strategy.to_flags()
    }

    /// Carried field by document name, e.g. `"order"` or `"probability"`.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Stores a carried field. Names of modeled fields are refused so the
    /// typed values stay authoritative; returns whether the value was stored.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: Value) -> bool {
        let name = name.into();
        if field::is_modeled(&name) {
            return false;
        }
        self.attributes.insert(name, value);
        true
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Name used in prompts: the comment, or `this entry` when blank.
    pub fn display_name(&self) -> &str {
        let trimmed = self.comment.trim();
        if trimmed.is_empty() {
            "this entry"
        } else {
            trimmed
        }
    }

    /// Single-line summary, e.g. `Index: 2 -- Dragons`.
    pub fn summary_label(&self) -> String {
        let title = if self.comment.is_empty() {
            "(No Comment)"
        } else {
            self.comment.as_str()
        };
        format!("Index: {} -- {}", self.display_index, title)
    }
}

pub(crate) fn split_keywords(text: &str) -> Vec<String> {
    clean_keywords(text.split(','))
}

fn clean_keywords<I, S>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    keys.into_iter()
        .map(Into::into)
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_uses_default_schema() {
        let entry = Entry::new(EntryUid::new(4));
        assert_eq!(entry.uid(), EntryUid::new(4));
        assert!(entry.selective);
        assert!(entry.is_enabled());
        assert_eq!(entry.strategy, Strategy::Vectorized);
        assert_eq!(entry.attribute("order"), Some(&json!(100)));
        assert_eq!(entry.attribute("scanDepth"), Some(&Value::Null));
        assert_eq!(entry.attributes().len(), 21);
    }

    #[test]
    fn keyword_text_is_split_and_trimmed() {
        let mut entry = Entry::new(EntryUid::new(0));
        entry.set_keys_from_text(" dragon, ,wyrm ,dragon,");
        assert_eq!(entry.keys(), ["dragon", "wyrm", "dragon"]);
        assert_eq!(entry.keys_text(), "dragon, wyrm, dragon");

        entry.set_secondary_keys(["", "  cave "]);
        assert_eq!(entry.secondary_keys(), ["cave"]);
    }

    #[test]
    fn modeled_fields_cannot_be_shadowed() {
        let mut entry = Entry::new(EntryUid::new(0));
        assert!(!entry.set_attribute("uid", json!(9)));
        assert!(!entry.set_attribute("disable", json!(true)));
        assert!(entry.set_attribute("order", json!(5)));
        assert_eq!(entry.attribute("order"), Some(&json!(5)));
        assert!(entry.attribute("uid").is_none());
    }

    #[test]
    fn labels_fall_back_when_comment_is_empty() {
        let mut entry = Entry::new(EntryUid::new(0));
        assert_eq!(entry.display_name(), "this entry");
        assert_eq!(entry.summary_label(), "Index: 0 -- (No Comment)");
        entry.comment = "Dragons".into();
        entry.set_display_index(3);
        assert_eq!(entry.display_name(), "Dragons");
        assert_eq!(entry.summary_label(), "Index: 3 -- Dragons");
    }

    #[test]
    fn toggle_flips_enabled_state() {
        let mut entry = Entry::new(EntryUid::new(0));
        assert!(!entry.toggle_enabled());
        assert!(entry.disabled);
        assert!(entry.toggle_enabled());
    }

    #[test]
    fn selective_logic_codes() {
        assert_eq!(SelectiveLogic::from_code(1), SelectiveLogic::Not);
        assert_eq!(SelectiveLogic::from_code(0), SelectiveLogic::And);
        assert_eq!(SelectiveLogic::from_code(3), SelectiveLogic::And);
        assert_eq!(SelectiveLogic::Not.code(), 1);
    }
}
