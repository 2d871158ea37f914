//! Editing session over one loaded lorebook: the surface a front end drives.
//! 單一 lorebook 的編輯工作階段，供前端呼叫的介面。

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec::{self, DocumentError};
use crate::entry::Entry;
use crate::preferences::Preferences;
use crate::registry::{EntryRegistry, Placement};
use crate::reorder::{DragSession, DropCandidate};
use crate::strategy::Strategy;
use crate::uid::EntryUid;

/// Name assumed when the collaborator does not know the document's name.
pub const DEFAULT_FILE_NAME: &str = "lorebook.json";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Invalid file type. Please upload a .json file.")]
    InvalidFileType { path: PathBuf },
    #[error("Error reading file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Error decoding JSON file ({name}): {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    Format(#[source] DocumentError),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Nothing to export!")]
    Empty,
    #[error("An error occurred while exporting the JSON file: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Encoded document handed to the save collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedDocument {
    pub file_name: String,
    pub text: String,
}

/// Change notification delivered after each successful mutation.
/// 每次成功變更後送出的通知。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Added { uid: EntryUid, index: usize },
    Duplicated { source: EntryUid, copy: EntryUid },
    Removed { uid: EntryUid },
    Moved { uid: EntryUid, from: usize, to: usize },
    Edited { uid: EntryUid },
}

/// Subscriber redrawn after every mutation.
pub trait SessionObserver {
    fn on_change(&mut self, event: &SessionEvent, entries: &[Entry]);
}

impl<F> SessionObserver for F
where
    F: FnMut(&SessionEvent, &[Entry]),
{
    fn on_change(&mut self, event: &SessionEvent, entries: &[Entry]) {
        self(event, entries)
    }
}

/// Synchronous yes/no gate consulted before a destructive delete.
pub trait ConfirmGate {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> ConfirmGate for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Declined,
    NotFound,
}

/// Knobs taken from [`Preferences`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub new_entry_strategy: Strategy,
    pub export_indent: usize,
    pub export_prefix: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions::from(&Preferences::default())
    }
}

impl From<&Preferences> for SessionOptions {
    fn from(preferences: &Preferences) -> Self {
        Self {
            new_entry_strategy: preferences.editor.new_entry_strategy,
            export_indent: usize::from(preferences.export.indent),
            export_prefix: preferences.export.file_prefix.clone(),
        }
    }
}

pub struct EditorSession {
    registry: EntryRegistry,
    file_name: Option<String>,
    options: SessionOptions,
    observers: Vec<Box<dyn SessionObserver>>,
}

impl fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorSession")
            .field("registry", &self.registry)
            .field("file_name", &self.file_name)
            .field("options", &self.options)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl EditorSession {
    /// Decodes `raw` into a fresh session. `name` is the display name used to
    /// derive the export file name.
    pub fn load(raw: &str, name: Option<&str>) -> Result<Self, LoadError> {
        let display_name = name.unwrap_or(DEFAULT_FILE_NAME);
        let entries = codec::decode(raw).map_err(|err| match err {
            DocumentError::Parse(source) => LoadError::Parse {
                name: display_name.to_string(),
                source,
            },
            other => LoadError::Format(other),
        })?;
        info!(name = display_name, count = entries.len(), "loaded lorebook");
        Ok(Self {
            registry: EntryRegistry::from_entries(entries),
            file_name: name.map(str::to_string),
            options: SessionOptions::default(),
            observers: Vec::new(),
        })
    }

    /// Reads and decodes a `.json` file from disk.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if !is_json {
            return Err(LoadError::InvalidFileType {
                path: path.to_path_buf(),
            });
        }
        let raw = fs::read_to_string(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path.file_name().and_then(|name| name.to_str());
        Self::load(&raw, name)
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn subscribe(&mut self, observer: impl SessionObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Entries in current order, for re-rendering.
    pub fn entries(&self) -> &[Entry] {
        self.registry.entries()
    }

    pub fn registry(&self) -> &EntryRegistry {
        &self.registry
    }

    pub fn entry(&self, uid: EntryUid) -> Option<&Entry> {
        self.registry.get(uid)
    }

    pub fn can_move_up(&self, uid: EntryUid) -> bool {
        self.registry.can_move_up(uid)
    }

    pub fn can_move_down(&self, uid: EntryUid) -> bool {
        self.registry.can_move_down(uid)
    }

    /// Adds a default entry using the configured strategy.
    pub fn add(&mut self, placement: Placement) -> EntryUid {
        self.add_with(placement, |_| {})
    }

    /// Adds an entry, letting `fill` set its fields before insertion.
    pub fn add_with(&mut self, placement: Placement, fill: impl FnOnce(&mut Entry)) -> EntryUid {
        let strategy = self.options.new_entry_strategy;
        let uid = self.registry.add(placement, |entry| {
            entry.strategy = strategy;
            fill(entry);
        });
        let index = self.registry.position(uid).unwrap_or_default();
        self.notify(SessionEvent::Added { uid, index });
        uid
    }

    pub fn duplicate(&mut self, uid: EntryUid) -> Option<EntryUid> {
        let copy = self.registry.duplicate(uid)?;
        self.notify(SessionEvent::Duplicated { source: uid, copy });
        Some(copy)
    }

    /// Deletes after `gate` approves. Nothing changes when the entry is
    /// unknown or the gate declines.
    pub fn delete(&mut self, uid: EntryUid, gate: &mut dyn ConfirmGate) -> DeleteOutcome {
        let Some(entry) = self.registry.get(uid) else {
            return DeleteOutcome::NotFound;
        };
        let prompt = delete_prompt(entry);
        if !gate.confirm(&prompt) {
            debug!(%uid, "delete declined");
            return DeleteOutcome::Declined;
        }
        if self.registry.remove(uid).is_none() {
            return DeleteOutcome::NotFound;
        }
        self.notify(SessionEvent::Removed { uid });
        DeleteOutcome::Deleted
    }

    pub fn move_up(&mut self, uid: EntryUid) -> bool {
        self.move_with(uid, |registry| registry.move_up(uid))
    }

    pub fn move_down(&mut self, uid: EntryUid) -> bool {
        self.move_with(uid, |registry| registry.move_down(uid))
    }

    pub fn move_to(&mut self, uid: EntryUid, target_index: usize) -> bool {
        self.move_with(uid, |registry| registry.move_to(uid, target_index))
    }

    fn move_with(&mut self, uid: EntryUid, op: impl FnOnce(&mut EntryRegistry) -> bool) -> bool {
        let Some(from) = self.registry.position(uid) else {
            return false;
        };
        if !op(&mut self.registry) {
            debug!(%uid, from, "move had no effect");
            return false;
        }
        let to = self.registry.position(uid).unwrap_or(from);
        self.notify(SessionEvent::Moved { uid, from, to });
        true
    }

    pub fn begin_drag(&self, uid: EntryUid) -> Option<DragSession> {
        DragSession::begin(&self.registry, uid)
    }

    /// Drops a gesture started with [`Self::begin_drag`] that is hovering
    /// the drop surface; returns the final index of the dragged entry.
    pub fn finish_drag(
        &mut self,
        drag: DragSession,
        pointer_y: f64,
        candidates: &[DropCandidate],
    ) -> Option<usize> {
        let uid = drag.dragged();
        let from = self.registry.position(uid)?;
        let to = drag.drop_at(&mut self.registry, pointer_y, candidates)?;
        if from != to {
            self.notify(SessionEvent::Moved { uid, from, to });
        }
        Some(to)
    }

    /// Applies a field edit; `false` for an unknown uid.
    pub fn edit(&mut self, uid: EntryUid, edit: impl FnOnce(&mut Entry)) -> bool {
        if !self.registry.update(uid, edit) {
            warn!(%uid, "edit on unknown entry ignored");
            return false;
        }
        self.notify(SessionEvent::Edited { uid });
        true
    }

    /// Toggles enabled state; returns the new enabled flag.
    pub fn toggle_enabled(&mut self, uid: EntryUid) -> Option<bool> {
        let mut enabled = None;
        self.edit(uid, |entry| enabled = Some(entry.toggle_enabled()));
        enabled
    }

    pub fn set_strategy(&mut self, uid: EntryUid, strategy: Strategy) -> bool {
        self.edit(uid, |entry| entry.strategy = strategy)
    }

    /// `edited_<name>.json`, or `edited_lorebook.json` without a known name.
    pub fn suggested_file_name(&self) -> String {
        export_file_name(self.file_name.as_deref(), &self.options.export_prefix)
    }

    /// Encodes the current order. Refuses to export an empty collection.
    pub fn export(&mut self) -> Result<ExportedDocument, ExportError> {
        if self.registry.is_empty() {
            return Err(ExportError::Empty);
        }
        self.registry.refresh_display_indices();
        let document = codec::encode(self.registry.entries());
        let text = codec::to_text(&document, self.options.export_indent)?;
        let file_name = self.suggested_file_name();
        info!(file = %file_name, count = self.registry.len(), "exported lorebook");
        Ok(ExportedDocument { file_name, text })
    }

    fn notify(&mut self, event: SessionEvent) {
        debug!(?event, "session changed");
        let entries = self.registry.entries();
        for observer in &mut self.observers {
            observer.on_change(&event, entries);
        }
    }
}

fn delete_prompt(entry: &Entry) -> String {
    format!(
        "Are you sure you want to delete \"{}\"? This cannot be undone.",
        entry.display_name()
    )
}

/// Derives the export name from the loaded name: a trailing `.json` is
/// dropped and the default name maps to `lorebook`.
pub fn export_file_name(loaded: Option<&str>, prefix: &str) -> String {
    let base = match loaded {
        Some(name) if !name.is_empty() && name != DEFAULT_FILE_NAME => strip_json_suffix(name),
        _ => "lorebook",
    };
    format!("{prefix}{base}.json")
}

fn strip_json_suffix(name: &str) -> &str {
    let split = name.len().saturating_sub(".json".len());
    match (name.get(..split), name.get(split..)) {
        (Some(stem), Some(suffix)) if suffix.eq_ignore_ascii_case(".json") => stem,
        _ => name,
    }
}
