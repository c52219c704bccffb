use serde::{Deserialize, Serialize};

/// Configuration from `config.toml` in the store directory. Every section
/// and key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub autosave: AutosaveConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutosaveConfig {
    /// Seconds between autosave checks of an open document
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        AutosaveConfig {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    8
}

/// Base font that formatting tags derive from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_font_size")]
    pub font_size: i32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        EditorConfig {
            font_family: default_font_family(),
            font_size: default_font_size(),
        }
    }
}

fn default_font_family() -> String {
    "Segoe UI".to_string()
}

fn default_font_size() -> i32 {
    11
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Show short node IDs next to names in listings
    #[serde(default = "default_true")]
    pub show_ids: bool,
    /// Names wider than this many terminal cells are truncated with `…`
    #[serde(default = "default_max_name_width")]
    pub max_name_width: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            show_ids: true,
            max_name_width: default_max_name_width(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_name_width() -> usize {
    48
}
