use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::io::store_io::atomic_write;

/// Error type for bundle file I/O
#[derive(Debug, thiserror::Error)]
pub enum BundleIoError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read a bundle or exported store as raw JSON. Shape checks happen in
/// `ops::bundle`.
pub fn read_json_file(path: &Path) -> Result<Value, BundleIoError> {
    let text = fs::read_to_string(path).map_err(|source| BundleIoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| BundleIoError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write pretty-printed JSON (2-space indent, trailing newline).
pub fn write_json_file(path: &Path, value: &Value) -> Result<(), BundleIoError> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    atomic_write(path, text.as_bytes()).map_err(|source| BundleIoError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("deeds.json");
        let value = json!({"bundle_root_id": "a", "nodes": {"a": {"type": "folder"}}});
        write_json_file(&path, &value).unwrap();
        assert!(fs::read_to_string(&path).unwrap().ends_with("}\n"));
        assert_eq!(read_json_file(&path).unwrap(), value);
    }

    #[test]
    fn test_read_errors_name_the_path() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("missing.json");
        let err = read_json_file(&missing).unwrap_err();
        assert!(err.to_string().contains("missing.json"));

        let broken = tmp.path().join("broken.json");
        fs::write(&broken, "[1,").unwrap();
        assert!(matches!(read_json_file(&broken), Err(BundleIoError::Parse { .. })));
    }
}
