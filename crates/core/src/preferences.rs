use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::strategy::Strategy;
use crate::util::write_atomic;

const PREFERENCES_VERSION: u32 = 1;
const MAX_EXPORT_INDENT: u8 = 8;

#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("failed to read preferences {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse preferences {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize preferences {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write preferences {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub editor: EditorPreferences,
    #[serde(default)]
    pub export: ExportPreferences,
}

fn default_version() -> u32 {
    PREFERENCES_VERSION
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            version: PREFERENCES_VERSION,
            editor: EditorPreferences::default(),
            export: ExportPreferences::default(),
        }
    }
}

impl Preferences {
    pub fn sanitize(&mut self) {
        if self.version == 0 {
            self.version = PREFERENCES_VERSION;
        }
        self.export.sanitize();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorPreferences {
    /// Ask before deleting an entry.
    #[serde(default = "default_true")]
    pub confirm_delete: bool,
    /// Strategy given to entries created with "add".
    #[serde(default = "default_new_entry_strategy")]
    pub new_entry_strategy: Strategy,
}

fn default_true() -> bool {
    true
}

fn default_new_entry_strategy() -> Strategy {
    Strategy::from_flags(false, true)
}

impl Default for EditorPreferences {
    fn default() -> Self {
        Self {
            confirm_delete: true,
            new_entry_strategy: default_new_entry_strategy(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportPreferences {
    /// Spaces per nesting level; `0` writes compact JSON.
    #[serde(default = "default_indent")]
    pub indent: u8,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

fn default_indent() -> u8 {
    2
}

fn default_file_prefix() -> String {
    "edited_".to_string()
}

impl Default for ExportPreferences {
    fn default() -> Self {
        Self {
            indent: default_indent(),
            file_prefix: default_file_prefix(),
        }
    }
}

impl ExportPreferences {
    fn sanitize(&mut self) {
        self.indent = self.indent.min(MAX_EXPORT_INDENT);
        if self.file_prefix.trim().is_empty() {
            self.file_prefix = default_file_prefix();
        }
    }
}

/// JSON-backed preferences file; a missing file yields defaults.
/// 以 JSON 儲存的偏好設定檔；檔案不存在時使用預設值。
#[derive(Debug)]
pub struct PreferencesStore {
    path: PathBuf,
    data: Preferences,
}

impl PreferencesStore {
    pub fn new(path: impl Into<PathBuf>, preferences: Preferences) -> Self {
        Self {
            path: path.into(),
            data: preferences,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PreferencesError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            debug!(path = %path.display(), "preferences absent, using defaults");
            let mut data = Preferences::default();
            data.sanitize();
            return Ok(Self { path, data });
        }

        let contents = fs::read_to_string(&path).map_err(|source| PreferencesError::Read {
            path: path.clone(),
            source,
        })?;
        let mut data: Preferences =
            serde_json::from_str(&contents).map_err(|source| PreferencesError::Parse {
                path: path.clone(),
                source,
            })?;
        data.sanitize();
        Ok(Self { path, data })
    }

    pub fn preferences(&self) -> &Preferences {
        &self.data
    }

    pub fn update<F>(&mut self, op: F) -> Result<(), PreferencesError>
    where
        F: FnOnce(&mut Preferences),
    {
        op(&mut self.data);
        self.data.sanitize();
        self.save()
    }

    pub fn save(&self) -> Result<(), PreferencesError> {
        let payload = serde_json::to_string_pretty(&self.data).map_err(|source| {
            PreferencesError::Serialize {
                path: self.path.clone(),
                source,
            }
        })?;
        write_atomic(&self.path, payload.as_bytes()).map_err(|source| PreferencesError::Write {
            path: self.path.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
