use std::fs;
use std::path::{Path, PathBuf};

use crate::io::store_io::atomic_write;
use crate::model::config::StoreConfig;

/// Name of the config file inside the store directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Error type for config I/O
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config.toml: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("could not edit config.toml: {0}")]
    Edit(#[from] toml_edit::TomlError),
    #[error("unknown config key {0:?} (expected section.key, e.g. editor.font_size)")]
    UnknownKey(String),
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Keys `qc config` accepts, with the kind of value each takes.
const KEYS: &[(&str, ValueKind)] = &[
    ("autosave.interval_secs", ValueKind::Integer),
    ("editor.font_family", ValueKind::String),
    ("editor.font_size", ValueKind::Integer),
    ("display.show_ids", ValueKind::Bool),
    ("display.max_name_width", ValueKind::Integer),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    String,
    Integer,
    Bool,
}

pub fn config_path(store_dir: &Path) -> PathBuf {
    store_dir.join(CONFIG_FILE)
}

/// Read the config, returning both the parsed config and the raw
/// toml_edit document for formatting-preserving edits. A missing file
/// reads as all defaults.
pub fn read_config(store_dir: &Path) -> Result<(StoreConfig, toml_edit::DocumentMut), ConfigError> {
    let path = config_path(store_dir);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(source) => return Err(ConfigError::Read { path, source }),
    };
    let config: StoreConfig = toml::from_str(&text)?;
    let doc: toml_edit::DocumentMut = text.parse()?;
    Ok((config, doc))
}

/// Just the parsed config, falling back to defaults (with a warning) when
/// the file cannot be read.
pub fn load_config(store_dir: &Path) -> StoreConfig {
    match read_config(store_dir) {
        Ok((config, _)) => config,
        Err(e) => {
            tracing::warn!(error = %e, "using default config");
            StoreConfig::default()
        }
    }
}

/// Write the config document back to disk, preserving formatting.
pub fn write_config(store_dir: &Path, doc: &toml_edit::DocumentMut) -> Result<(), ConfigError> {
    let path = config_path(store_dir);
    atomic_write(&path, doc.to_string().as_bytes()).map_err(|source| ConfigError::Write { path, source })
}

fn split_key(key: &str) -> Result<(&str, &str, ValueKind), ConfigError> {
    let kind = KEYS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, kind)| *kind)
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
    let (section, name) = key
        .split_once('.')
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
    Ok((section, name, kind))
}

/// The effective value of a key, defaults included, as TOML text.
pub fn get_value(config: &StoreConfig, key: &str) -> Result<String, ConfigError> {
    split_key(key)?;
    let value = match key {
        "autosave.interval_secs" => config.autosave.interval_secs.to_string(),
        "editor.font_family" => format!("{:?}", config.editor.font_family),
        "editor.font_size" => config.editor.font_size.to_string(),
        "display.show_ids" => config.display.show_ids.to_string(),
        "display.max_name_width" => config.display.max_name_width.to_string(),
        _ => return Err(ConfigError::UnknownKey(key.to_string())),
    };
    Ok(value)
}

/// Set one key in the document. The new text must still parse as a
/// `StoreConfig`.
pub fn set_value(doc: &mut toml_edit::DocumentMut, key: &str, raw: &str) -> Result<(), ConfigError> {
    let (section, name, kind) = split_key(key)?;
    let invalid = |message: &str| ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    };
    let item = match kind {
        ValueKind::String => toml_edit::value(raw),
        ValueKind::Integer => {
            let n: i64 = raw.parse().map_err(|_| invalid("expected an integer"))?;
            if n <= 0 {
                return Err(invalid("must be positive"));
            }
            toml_edit::value(n)
        }
        ValueKind::Bool => match raw {
            "true" | "on" | "yes" => toml_edit::value(true),
            "false" | "off" | "no" => toml_edit::value(false),
            _ => return Err(invalid("expected true or false")),
        },
    };

    if !doc.contains_key(section) {
        doc[section] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc[section][name] = item;

    toml::from_str::<StoreConfig>(&doc.to_string())?;
    Ok(())
}
