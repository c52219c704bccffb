use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::{Database, NodeId};

/// Name of the view state file inside the store directory.
pub const STATE_FILE: &str = ".state.json";

/// Persisted navigation state (written to .state.json)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ViewState {
    /// Folder that `ls`, `mkdir` and `new` default to
    #[serde(default)]
    pub current_folder_id: Option<NodeId>,
    /// Last search query
    #[serde(default)]
    pub last_search: Option<String>,
}

impl ViewState {
    /// The current folder if it is still a folder in `db`, else the
    /// QuickCopy root.
    pub fn current_folder<'a>(&'a self, db: &'a Database) -> &'a str {
        match self.current_folder_id.as_deref() {
            Some(id) if db.folder(id).is_some() => id,
            _ => db.quickcopy_root_id.as_str(),
        }
    }

    /// Drop a stale folder ID.
    pub fn validate(&mut self, db: &Database) {
        if let Some(id) = &self.current_folder_id
            && db.folder(id).is_none()
        {
            tracing::debug!(folder = %id, "stale current folder, resetting");
            self.current_folder_id = None;
        }
    }
}

/// Read .state.json from the store directory
pub fn read_view_state(store_dir: &Path) -> Option<ViewState> {
    let path = store_dir.join(STATE_FILE);
    let content = fs::read_to_string(&path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Write .state.json to the store directory
pub fn write_view_state(store_dir: &Path, state: &ViewState) -> Result<(), std::io::Error> {
    let path = store_dir.join(STATE_FILE);
    let content = serde_json::to_string_pretty(state)?;
    fs::write(&path, content)
}
