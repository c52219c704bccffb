use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::io::recovery;
use crate::model::Database;
use crate::parse::{LoadIssue, parse_database, serialize_database_pretty};

/// Name of the store document inside the store directory.
pub const DATA_FILE: &str = "data.json";

/// Environment variable that overrides the store location.
pub const STORE_DIR_ENV: &str = "QC_STORE_DIR";

/// Directory created under the platform config dir.
pub const STORE_DIR_NAME: &str = "NotaryQuickCopy";

/// Error type for store I/O
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not determine a config directory; pass --store or set {STORE_DIR_ENV}")]
    NoConfigDir,
    #[error("could not read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("could not write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("{path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// A loaded store and whatever the loader had to tolerate.
#[derive(Debug)]
pub struct LoadedStore {
    pub db: Database,
    pub issues: Vec<LoadIssue>,
    /// True when no data file existed and a blank one was written
    pub created: bool,
}

/// Write to a temp file in the same directory, then rename over `path`.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// `--store` wins, then `QC_STORE_DIR`, then the platform config directory.
pub fn resolve_store_dir(explicit: Option<&Path>) -> Result<PathBuf, StoreError> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = std::env::var_os(STORE_DIR_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::config_dir()
        .map(|base| base.join(STORE_DIR_NAME))
        .ok_or(StoreError::NoConfigDir)
}

pub fn data_path(store_dir: &Path) -> PathBuf {
    store_dir.join(DATA_FILE)
}

/// Load `data.json`, creating the directory and a blank store when missing.
///
/// Tolerated problems are returned and also written to the recovery log. A
/// file that is not JSON at all is an error: overwriting it would lose data.
pub fn load_or_create(store_dir: &Path) -> Result<LoadedStore, StoreError> {
    fs::create_dir_all(store_dir).map_err(|source| StoreError::Write {
        path: store_dir.to_path_buf(),
        source,
    })?;
    let path = data_path(store_dir);

    if !path.exists() {
        let db = Database::blank();
        save(store_dir, &db)?;
        tracing::info!(path = %path.display(), "created blank store");
        return Ok(LoadedStore {
            db,
            issues: Vec::new(),
            created: true,
        });
    }

    let text = fs::read_to_string(&path).map_err(|source| StoreError::Read {
        path: path.clone(),
        source,
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
            path: path.clone(),
            source,
        })?;
    let (db, issues) = parse_database(&value);

    for issue in &issues {
        tracing::warn!(%issue, "load issue");
    }
    recovery::log_load_issues(store_dir, &path, &issues);
    tracing::debug!(nodes = db.nodes.len(), "store loaded");

    Ok(LoadedStore {
        db,
        issues,
        created: false,
    })
}

/// Serialize and atomically replace `data.json`. On failure the unsaved
/// JSON goes to the recovery log before the error is returned.
pub fn save(store_dir: &Path, db: &Database) -> Result<(), StoreError> {
    let path = data_path(store_dir);
    let text = serialize_database_pretty(db)?;
    if let Err(source) = atomic_write(&path, text.as_bytes()) {
        recovery::log_write_failure(store_dir, &path, &source, &text);
        return Err(StoreError::Write { path, source });
    }
    tracing::debug!(path = %path.display(), "store saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::recovery::{RecoveryCategory, read_recovery_entries};
    use crate::model::{FileContent, Node};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_missing_store_is_created() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join("store");
        let loaded = load_or_create(&dir).unwrap();
        assert!(loaded.created);
        assert!(data_path(&dir).exists());

        let again = load_or_create(&dir).unwrap();
        assert!(!again.created);
        assert_eq!(again.db, loaded.db);
    }

    #[test]
    fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let mut db = Database::blank();
        let root = db.quickcopy_root_id.clone();
        db.attach(&root, Node::file("f".into(), "Grant", FileContent::new()));
        save(tmp.path(), &db).unwrap();

        let text = fs::read_to_string(data_path(tmp.path())).unwrap();
        assert!(text.starts_with("{\n  \""));
        assert!(text.ends_with('\n'));

        let loaded = load_or_create(tmp.path()).unwrap();
        assert_eq!(loaded.db, db);
        assert!(loaded.issues.is_empty());
    }

    #[test]
    fn test_load_issues_reach_recovery_log() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            data_path(tmp.path()),
            r#"{"quickcopy_root_id": "q", "nodes": {"q": {"type": "folder", "name": "QuickCopy"}, "bad": 7}}"#,
        )
        .unwrap();
        let loaded = load_or_create(tmp.path()).unwrap();
        assert!(!loaded.issues.is_empty());

        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, RecoveryCategory::Parser);
    }

    #[test]
    fn test_corrupt_store_is_not_overwritten() {
        let tmp = TempDir::new().unwrap();
        fs::write(data_path(tmp.path()), "{ not json").unwrap();
        let err = load_or_create(tmp.path()).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert_eq!(fs::read_to_string(data_path(tmp.path())).unwrap(), "{ not json");
    }

    #[test]
    fn test_explicit_store_dir_wins() {
        let dir = resolve_store_dir(Some(Path::new("/tmp/qc-explicit"))).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/qc-explicit"));
    }

    #[test]
    fn test_atomic_write_replaces() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x.json");
        atomic_write(&path, b"one").unwrap();
        atomic_write(&path, b"two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }
}
