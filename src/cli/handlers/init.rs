use std::fs;
use std::path::Path;

use crate::cli::commands::InitArgs;
use crate::io::config_io;
use crate::io::store_io;
use crate::session::Session;

const CONFIG_TEMPLATE: &str = r##"# qc settings. Every key is optional; the values below are the defaults.
# Change one with: qc config <section.key> <value>

[autosave]
# Seconds between autosave checks of an open file
interval_secs = 8

[editor]
# Base font that bold, size and family formatting build on
font_family = "Segoe UI"
font_size = 11

[display]
# Show short IDs next to names in listings
show_ids = true
# Longer names are cut with "…"
max_name_width = 48
"##;

pub fn cmd_init(store_dir: &Path, args: InitArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(store_dir)?;
    let session = Session::open_locked(store_dir)?;

    let config_path = config_io::config_path(store_dir);
    let wrote_config = !config_path.exists();
    if wrote_config {
        store_io::atomic_write(&config_path, CONFIG_TEMPLATE.as_bytes())?;
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "store": store_dir.display().to_string(),
                "created": session.created(),
                "quickcopy_root_id": session.db.quickcopy_root_id,
                "favorites_root_id": session.db.favorites_root_id,
            }))?
        );
        return Ok(());
    }
    if session.created() {
        println!("created store at {}", store_dir.display());
    } else if !args.quiet {
        println!("store already exists at {}", store_dir.display());
    }
    if wrote_config && !args.quiet {
        println!("wrote {}", config_path.display());
    }
    Ok(())
}
