//! Mapping between lorebook JSON documents and [`Entry`] values.
//! Lorebook JSON 文件與 [`Entry`] 之間的轉換。

use std::collections::BTreeSet;

use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::entry::{default_attributes, field, split_keywords, Entry, SelectiveLogic};
use crate::strategy::Strategy;
use crate::uid::{next_uid, EntryUid};

/// Top-level key holding the entry collection.
pub const ENTRIES_KEY: &str = "entries";

/// Failures while reading a lorebook document.
/// 讀取 lorebook 文件時的錯誤。
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("error decoding JSON: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("JSON structure is invalid: {0}")]
    Format(String),
}

impl DocumentError {
    fn missing_entries() -> Self {
        DocumentError::Format("Missing or invalid \"entries\" key.".to_string())
    }
}

/// Parses `raw` and decodes its entries in encounter order.
pub fn decode(raw: &str) -> Result<Vec<Entry>, DocumentError> {
    let document: Value = serde_json::from_str(raw).map_err(DocumentError::Parse)?;
    decode_value(&document)
}

/// Decodes an already-parsed document. The `entries` collection may be an
/// object with arbitrary keys or an array; either way the source order is
/// kept and keys are never sorted.
pub fn decode_value(document: &Value) -> Result<Vec<Entry>, DocumentError> {
    let collection = document
        .as_object()
        .and_then(|object| object.get(ENTRIES_KEY))
        .ok_or_else(DocumentError::missing_entries)?;

    let raw_entries: Vec<(Option<u64>, &Value)> = match collection {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| (key.trim().parse::<u64>().ok(), value))
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, value)| (Some(index as u64), value))
            .collect(),
        _ => return Err(DocumentError::missing_entries()),
    };

    let mut taken = BTreeSet::new();
    let mut entries = Vec::with_capacity(raw_entries.len());
    let mut pending = Vec::new();
    for (index, (positional, value)) in raw_entries.into_iter().enumerate() {
        let empty = Map::new();
        let object = value.as_object().unwrap_or(&empty);
        let declared = object.get(field::UID).and_then(coerce_uid);
        let candidate = declared.or(positional).map(EntryUid::new);

        let mut entry = decode_entry(object);
        entry.set_display_index(index);
        match (candidate, candidate.filter(|uid| taken.insert(*uid))) {
            (_, Some(uid)) => entry.set_uid(uid),
            (Some(uid), None) => {
                warn!(%uid, index, "duplicate uid in document, reassigning");
                pending.push(index);
            }
            (None, None) => pending.push(index),
        }
        entries.push(entry);
    }

    // Synthesized uids are handed out only after every declared one is known.
    for index in pending {
        let uid = next_uid(&taken);
        taken.insert(uid);
        entries[index].set_uid(uid);
    }

    debug!(count = entries.len(), "decoded lorebook entries");
    Ok(entries)
}

fn decode_entry(object: &Map<String, Value>) -> Entry {
    let mut entry = Entry::new(EntryUid::new(0));
    entry.set_keys(object.get(field::KEYS).map(coerce_keywords).unwrap_or_default());
    entry.set_secondary_keys(
        object
            .get(field::SECONDARY_KEYS)
            .map(coerce_keywords)
            .unwrap_or_default(),
    );
    entry.comment = object.get(field::COMMENT).map(coerce_text).unwrap_or_default();
    entry.content = object.get(field::CONTENT).map(coerce_text).unwrap_or_default();
    entry.disabled = object.get(field::DISABLE).map(truthy).unwrap_or(false);
    entry.selective = object.get(field::SELECTIVE).map(truthy).unwrap_or(true);
    entry.selective_logic = object
        .get(field::SELECTIVE_LOGIC)
        .and_then(coerce_integer)
        .map(SelectiveLogic::from_code)
        .unwrap_or_default();
    let constant = object.get(field::CONSTANT).map(truthy).unwrap_or(false);
    let vectorized = object.get(field::VECTORIZED).map(truthy).unwrap_or(false);
    entry.strategy = Strategy::from_flags(constant, vectorized);

    for (name, value) in object {
        if !field::is_modeled(name) {
            entry.set_attribute(name.clone(), value.clone());
        }
    }
    entry
}

/// Builds `{ "entries": { "<position>": {...} } }` from `entries` in order.
/// The key and `displayIndex` of each value are its position in the slice.
pub fn encode(entries: &[Entry]) -> Value {
    let mut collection = Map::new();
    for (position, entry) in entries.iter().enumerate() {
        collection.insert(position.to_string(), Value::Object(encode_entry(entry, position)));
    }
    let mut document = Map::new();
    document.insert(ENTRIES_KEY.to_string(), Value::Object(collection));
    Value::Object(document)
}

fn encode_entry(entry: &Entry, position: usize) -> Map<String, Value> {
    let (constant, vectorized) = entry.flags();
    let mut object = Map::new();
    object.insert(field::UID.into(), Value::from(entry.uid().as_u64()));
    object.insert(field::KEYS.into(), Value::from(entry.keys().to_vec()));
    object.insert(
        field::SECONDARY_KEYS.into(),
        Value::from(entry.secondary_keys().to_vec()),
    );
    object.insert(field::COMMENT.into(), Value::from(entry.comment.clone()));
    object.insert(field::CONTENT.into(), Value::from(entry.content.clone()));
    object.insert(field::CONSTANT.into(), Value::from(constant));
    object.insert(field::VECTORIZED.into(), Value::from(vectorized));
    object.insert(field::SELECTIVE.into(), Value::from(entry.selective));
    object.insert(
        field::SELECTIVE_LOGIC.into(),
        Value::from(entry.selective_logic.code()),
    );
    object.insert(field::DISABLE.into(), Value::from(entry.disabled));
    for (name, default) in default_attributes() {
        let value = entry.attribute(&name).cloned().unwrap_or(default);
        object.insert(name, value);
    }
    for (name, value) in entry.attributes() {
        if !object.contains_key(name) {
            object.insert(name.clone(), value.clone());
        }
    }
    object.insert(field::DISPLAY_INDEX.into(), Value::from(position));
    object
}

/// Serializes an encoded document. `indent == 0` yields compact output,
/// otherwise that many spaces per level.
pub fn to_text(document: &Value, indent: usize) -> Result<String, serde_json::Error> {
    if indent == 0 {
        return serde_json::to_string(document);
    }
    let indent = " ".repeat(indent);
    let formatter = PrettyFormatter::with_indent(indent.as_bytes());
    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    serde::Serialize::serialize(document, &mut serializer)?;
    // serde_json only emits valid UTF-8.
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Loose truthiness: null, false, zero, `""`, `"0"` and empty containers are
/// false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !(text.is_empty() || text == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|n| n.trunc() as i64)),
        Value::String(text) => text.trim().parse().ok(),
        Value::Bool(flag) => Some(i64::from(*flag)),
        _ => None,
    }
}

fn coerce_uid(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|n| *n >= 0.0 && n.fract() == 0.0)
                .map(|n| n as u64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        other => other.to_string(),
    }
}

fn coerce_keywords(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text.clone()),
                Value::Number(number) => Some(number.to_string()),
                _ => None,
            })
            .collect(),
        Value::String(text) => split_keywords(text),
        _ => Vec::new(),
    }
}
