//! Ordered lorebook entry editing: model, mutations and the JSON document
//! format.
//! Lorebook 條目編輯核心：模型、變更操作與 JSON 文件格式。

mod util;

pub mod codec;
pub mod entry;
pub mod preferences;
pub mod registry;
pub mod reorder;
pub mod session;
pub mod strategy;
pub mod uid;

pub use codec::{decode, decode_value, encode, to_text, DocumentError};
pub use entry::{Entry, SelectiveLogic};
pub use preferences::{
    EditorPreferences, ExportPreferences, Preferences, PreferencesError, PreferencesStore,
};
pub use registry::{EntryRegistry, Placement, RegistryError};
pub use reorder::{resolve_drop_target, DragSession, DropCandidate, DropTarget};
pub use session::{
    export_file_name, ConfirmGate, DeleteOutcome, EditorSession, ExportError, ExportedDocument,
    LoadError, SessionEvent, SessionObserver, SessionOptions, DEFAULT_FILE_NAME,
};
pub use strategy::{ParseStrategyError, Strategy};
pub use uid::{next_uid, EntryUid};
pub use util::write_atomic;
