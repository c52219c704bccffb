//! An open store: the database, its directory, config, view state and the
//! document being edited, passed explicitly to everything that needs them.

pub mod document;
pub mod host;
pub mod schedule;
pub mod view;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::io::bundle_io::{self, BundleIoError};
use crate::io::config_io;
use crate::io::lock::{LockError, StoreLock};
use crate::io::recovery;
use crate::io::state::{self, ViewState};
use crate::io::store_io::{self, StoreError};
use crate::model::{Database, LookupError, NodeId, StoreConfig};
use crate::ops::bundle::{self, BundleError, ImportResult, MergeResult};
use crate::ops::favorites::FavoriteError;
use crate::ops::tree_ops::{self, DeleteResult, TreeError};
use crate::parse::LoadIssue;

pub use document::{CloseOutcome, DocTarget, DocumentError, OpenDocument};
pub use host::{ArgPath, Clipboard, Confirm, ConfirmChoice, PathPicker, StdoutClipboard, TerminalConfirm};
pub use schedule::ScheduledTask;

/// Error type for session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Favorite(#[from] FavoriteError),
    #[error(transparent)]
    Bundle(#[from] BundleError),
    #[error(transparent)]
    BundleIo(#[from] BundleIoError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("no document is open")]
    NoDocument,
}

pub struct Session {
    store_dir: PathBuf,
    pub db: Database,
    pub config: StoreConfig,
    pub view: ViewState,
    issues: Vec<LoadIssue>,
    created: bool,
    document: Option<OpenDocument>,
    _lock: Option<StoreLock>,
}

impl Session {
    /// Load the store for reading. Creates a blank store when none exists.
    pub fn open(store_dir: &Path) -> Result<Self, SessionError> {
        Self::load(store_dir, None)
    }

    /// Lock the store, then load it. The lock is held until the session is
    /// dropped.
    pub fn open_locked(store_dir: &Path) -> Result<Self, SessionError> {
        std::fs::create_dir_all(store_dir).map_err(StoreError::Io)?;
        let lock = StoreLock::acquire_default(store_dir)?;
        Self::load(store_dir, Some(lock))
    }

    fn load(store_dir: &Path, lock: Option<StoreLock>) -> Result<Self, SessionError> {
        let loaded = store_io::load_or_create(store_dir)?;
        let config = config_io::load_config(store_dir);
        let mut view = state::read_view_state(store_dir).unwrap_or_default();
        view.validate(&loaded.db);
        Ok(Session {
            store_dir: store_dir.to_path_buf(),
            db: loaded.db,
            config,
            view,
            issues: loaded.issues,
            created: loaded.created,
            document: None,
            _lock: lock,
        })
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Problems tolerated while loading.
    pub fn issues(&self) -> &[LoadIssue] {
        &self.issues
    }

    /// True when this session created the store.
    pub fn created(&self) -> bool {
        self.created
    }

    pub fn current_folder(&self) -> &str {
        self.view.current_folder(&self.db)
    }

    /// Resolve a unique ID prefix. `quickcopy` and `favorites` name the
    /// roots.
    pub fn resolve(&self, reference: &str) -> Result<NodeId, SessionError> {
        match reference {
            "quickcopy" => Ok(self.db.quickcopy_root_id.clone()),
            "favorites" => Ok(self.db.favorites_root_id.clone()),
            _ => Ok(self.db.resolve_prefix(reference)?.id.clone()),
        }
    }

    /// Save the database, then the view state. A view state failure is only
    /// logged.
    pub fn commit(&mut self) -> Result<(), SessionError> {
        store_io::save(&self.store_dir, &self.db)?;
        if let Err(e) = state::write_view_state(&self.store_dir, &self.view) {
            tracing::warn!(error = %e, "could not write view state");
        }
        Ok(())
    }

    pub fn change_folder(&mut self, folder_id: &str) -> Result<(), SessionError> {
        view::change_folder(&mut self.view, &self.db, folder_id)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Deletes and transfers
    // -----------------------------------------------------------------------

    /// Delete a subtree and save. The removed subtree goes to the recovery
    /// log as a bundle first.
    pub fn delete(&mut self, node_id: &str) -> Result<DeleteResult, SessionError> {
        let name = self
            .db
            .get(node_id)
            .map(|n| n.name.clone())
            .ok_or_else(|| TreeError::NotFound(node_id.to_string()))?;
        let snapshot = bundle::export_bundle(&self.db, node_id)?;

        let deleted = tree_ops::delete_subtree(&mut self.db, node_id)?;

        let body = serde_json::to_string_pretty(&snapshot.to_value()).map_err(StoreError::Json)?;
        recovery::log_deletion(&self.store_dir, &name, node_id, deleted.removed.len(), &body);
        view::retarget_after_delete(&mut self.view, &self.db, &deleted);
        if self
            .document
            .as_ref()
            .is_some_and(|doc| deleted.contains(doc.file_id()))
        {
            tracing::debug!("open document deleted, closing without saving");
            self.document = None;
        }
        self.commit()?;
        Ok(deleted)
    }

    /// Export a subtree, or the whole store when `node_id` is `None`.
    /// Returns the written path, or `None` when no path was chosen.
    pub fn export(
        &self,
        node_id: Option<&str>,
        picker: &mut dyn PathPicker,
    ) -> Result<Option<PathBuf>, SessionError> {
        let value = match node_id {
            Some(id) => bundle::export_bundle(&self.db, id)?.to_value(),
            None => bundle::export_store(&self.db),
        };
        let Some(path) = picker.pick("export") else {
            return Ok(None);
        };
        bundle_io::write_json_file(&path, &value)?;
        tracing::info!(path = %path.display(), "exported");
        Ok(Some(path))
    }

    /// Import a bundle under `into` (default: the current folder) and save.
    pub fn import(
        &mut self,
        picker: &mut dyn PathPicker,
        into: Option<&str>,
    ) -> Result<Option<ImportResult>, SessionError> {
        let Some(path) = picker.pick("import") else {
            return Ok(None);
        };
        let value = bundle_io::read_json_file(&path)?;
        let target = into.map_or_else(|| self.current_folder().to_string(), str::to_string);
        let result = bundle::import_bundle(&mut self.db, &value, &target)?;
        recovery::log_load_issues(&self.store_dir, &path, &result.issues);
        recovery::log_import(&self.store_dir, &path, &result.root_id, result.imported);
        self.commit()?;
        Ok(Some(result))
    }

    /// Merge an exported store under `into` (default: the current folder)
    /// and save.
    pub fn merge(
        &mut self,
        picker: &mut dyn PathPicker,
        into: Option<&str>,
    ) -> Result<Option<MergeResult>, SessionError> {
        let Some(path) = picker.pick("merge") else {
            return Ok(None);
        };
        let value = bundle_io::read_json_file(&path)?;
        let target = into.map_or_else(|| self.current_folder().to_string(), str::to_string);
        let result = bundle::merge_store(&mut self.db, &value, &target)?;
        recovery::log_load_issues(&self.store_dir, &path, &result.issues);
        recovery::log_import(&self.store_dir, &path, &result.root_id, result.imported);
        self.commit()?;
        Ok(Some(result))
    }

    // -----------------------------------------------------------------------
    // Open document
    // -----------------------------------------------------------------------

    fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.config.autosave.interval_secs)
    }

    /// Open a file for editing, closing the current document first. Returns
    /// false when the user cancelled closing the current one.
    pub fn open_document(
        &mut self,
        node_id: &str,
        now: Instant,
        confirm: &mut dyn Confirm,
    ) -> Result<bool, SessionError> {
        if self.document.is_some() && self.close_document(confirm)? == CloseOutcome::Cancelled {
            return Ok(false);
        }
        let doc = OpenDocument::open(&self.db, node_id, self.autosave_interval(), now)?;
        self.document = Some(doc);
        Ok(true)
    }

    pub fn document(&self) -> Option<&OpenDocument> {
        self.document.as_ref()
    }

    pub fn document_mut(&mut self) -> Result<&mut OpenDocument, SessionError> {
        self.document.as_mut().ok_or(SessionError::NoDocument)
    }

    /// Save the open document and persist the store.
    pub fn save_document(&mut self) -> Result<(), SessionError> {
        let doc = self.document.as_mut().ok_or(SessionError::NoDocument)?;
        doc.save(&mut self.db)?;
        self.commit()
    }

    /// Run the open document's autosave check. Returns true when it saved.
    pub fn tick(&mut self, now: Instant) -> Result<bool, SessionError> {
        let Some(doc) = self.document.as_mut() else {
            return Ok(false);
        };
        if !doc.tick(now, &mut self.db)? {
            return Ok(false);
        }
        self.commit()?;
        Ok(true)
    }

    pub fn close_document(&mut self, confirm: &mut dyn Confirm) -> Result<CloseOutcome, SessionError> {
        let doc = self.document.as_mut().ok_or(SessionError::NoDocument)?;
        let outcome = doc.close(confirm, &mut self.db)?;
        match outcome {
            CloseOutcome::Cancelled => return Ok(outcome),
            CloseOutcome::Saved => self.commit()?,
            CloseOutcome::Clean | CloseOutcome::Discarded => {}
        }
        self.document = None;
        Ok(outcome)
    }

    /// Best-effort final save. An autosaving document's unsaved draft is
    /// kept; every failure is logged and swallowed.
    pub fn shutdown(mut self) {
        if let Some(doc) = self.document.as_mut()
            && doc.draft().meta.autosave
            && doc.is_dirty()
            && let Err(e) = doc.save(&mut self.db)
        {
            tracing::warn!(error = %e, "could not save open document on shutdown");
        }
        if let Err(e) = self.commit() {
            tracing::warn!(error = %e, "could not save store on shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::recovery::{RecoveryCategory, read_recovery_entries};
    use crate::ops::tree_ops::{create_file, create_folder};
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Always(ConfirmChoice);

    impl Confirm for Always {
        fn ask(&mut self, _question: &str) -> ConfirmChoice {
            self.0
        }
    }

    fn session(tmp: &TempDir) -> Session {
        Session::open_locked(tmp.path()).unwrap()
    }

    #[test]
    fn test_open_creates_and_commit_persists() {
        let tmp = TempDir::new().unwrap();
        let mut s = session(&tmp);
        assert!(s.created());
        let root = s.db.quickcopy_root_id.clone();
        let folder = create_folder(&mut s.db, &root, "Deeds").unwrap();
        s.change_folder(&folder).unwrap();
        s.commit().unwrap();
        drop(s);

        let reopened = Session::open(tmp.path()).unwrap();
        assert!(!reopened.created());
        assert_eq!(reopened.current_folder(), folder);
        assert_eq!(reopened.db.get(&folder).unwrap().name, "Deeds");
    }

    #[test]
    fn test_resolve_aliases_and_prefixes() {
        let tmp = TempDir::new().unwrap();
        let s = session(&tmp);
        assert_eq!(s.resolve("quickcopy").unwrap(), s.db.quickcopy_root_id);
        assert_eq!(s.resolve("favorites").unwrap(), s.db.favorites_root_id);
        let prefix = &s.db.favorites_root_id[..8];
        assert_eq!(s.resolve(prefix).unwrap(), s.db.favorites_root_id);
        assert!(s.resolve("not-an-id").is_err());
    }

    #[test]
    fn test_delete_logs_bundle_and_retargets() {
        let tmp = TempDir::new().unwrap();
        let mut s = session(&tmp);
        let root = s.db.quickcopy_root_id.clone();
        let folder = create_folder(&mut s.db, &root, "Deeds").unwrap();
        let file = create_file(&mut s.db, &folder, "Grant").unwrap();
        s.change_folder(&folder).unwrap();
        s.open_document(&file, Instant::now(), &mut Always(ConfirmChoice::Yes)).unwrap();

        let deleted = s.delete(&folder).unwrap();
        assert!(deleted.contains(&file));
        assert_eq!(s.current_folder(), root);
        assert!(s.document().is_none());

        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries[0].category, RecoveryCategory::Delete);
        let body: serde_json::Value = serde_json::from_str(&entries[0].body).unwrap();
        assert_eq!(body["bundle_root_id"], folder.as_str());

        let mut picker = ArgPath(Some(tmp.path().join("restore.json")));
        std::fs::write(tmp.path().join("restore.json"), &entries[0].body).unwrap();
        let restored = s.import(&mut picker, None).unwrap().unwrap();
        assert_eq!(restored.imported, 2);
    }

    #[test]
    fn test_export_cancelled_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let s = session(&tmp);
        assert_eq!(s.export(None, &mut ArgPath(None)).unwrap(), None);

        let path: PathBuf = tmp.path().join("all.json");
        assert_eq!(s.export(None, &mut ArgPath(Some(path.clone()))).unwrap(), Some(path.clone()));
        assert!(path.exists());
    }

    #[test]
    fn test_merge_own_export() {
        let tmp = TempDir::new().unwrap();
        let mut s = session(&tmp);
        let root = s.db.quickcopy_root_id.clone();
        create_file(&mut s.db, &root, "Grant").unwrap();
        let path = tmp.path().join("all.json");
        s.export(None, &mut ArgPath(Some(path.clone()))).unwrap();

        let merged = s.merge(&mut ArgPath(Some(path)), None).unwrap().unwrap();
        assert_eq!(merged.imported, 2);
        assert_eq!(s.db.quickcopy_root().unwrap().children().len(), 2);
    }

    #[test]
    fn test_document_save_and_reopen_prompt() {
        let tmp = TempDir::new().unwrap();
        let mut s = session(&tmp);
        let root = s.db.quickcopy_root_id.clone();
        let a = create_file(&mut s.db, &root, "A").unwrap();
        let b = create_file(&mut s.db, &root, "B").unwrap();
        let now = Instant::now();

        s.open_document(&a, now, &mut Always(ConfirmChoice::Yes)).unwrap();
        s.document_mut().unwrap().set_read_text("draft").unwrap();

        assert!(!s.open_document(&b, now, &mut Always(ConfirmChoice::Cancel)).unwrap());
        assert_eq!(s.document().unwrap().file_id(), a);

        assert!(s.open_document(&b, now, &mut Always(ConfirmChoice::Yes)).unwrap());
        assert_eq!(s.document().unwrap().file_id(), b);
        drop(s);

        let reopened = Session::open(tmp.path()).unwrap();
        assert_eq!(reopened.db.get(&a).unwrap().content().unwrap().read_doc.text, "draft");
    }

    #[test]
    fn test_shutdown_keeps_autosave_draft() {
        let tmp = TempDir::new().unwrap();
        let mut s = session(&tmp);
        let root = s.db.quickcopy_root_id.clone();
        let file = create_file(&mut s.db, &root, "A").unwrap();
        s.open_document(&file, Instant::now(), &mut Always(ConfirmChoice::Yes)).unwrap();
        let doc = s.document_mut().unwrap();
        doc.set_autosave(true);
        doc.set_read_text("kept").unwrap();
        s.shutdown();

        let reopened = Session::open(tmp.path()).unwrap();
        assert_eq!(reopened.db.get(&file).unwrap().content().unwrap().read_doc.text, "kept");
    }
}
