mod init;
pub use init::cmd_init;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::recovery;
use crate::io::state;
use crate::io::store_io;
use crate::model::{EditorConfig, TextIndex};
use crate::ops::favorites::{self, FavoriteChange};
use crate::ops::snippet_ops::MoveDirection;
use crate::ops::{check, search, tree_ops};
use crate::rich::FormatOp;
use crate::session::{
    ArgPath, Confirm, ConfirmChoice, DocTarget, DocumentError, OpenDocument, Session, StdoutClipboard,
    TerminalConfirm,
};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let store_dir = store_io::resolve_store_dir(cli.store.as_deref().map(Path::new))?;
    tracing::debug!(store = %store_dir.display(), "using store");
    let dir = store_dir.as_path();

    match cli.command {
        Commands::Init(args) => cmd_init(dir, args, json),

        // Read commands
        Commands::Tree(args) => cmd_tree(dir, args, json),
        Commands::Ls(args) => cmd_ls(dir, args, json),
        Commands::Favs => cmd_favs(dir, json),
        Commands::Show(args) => cmd_show(dir, args, json),
        Commands::Copy(args) => cmd_copy(dir, args),
        Commands::Search(args) => cmd_search(dir, args, json),
        Commands::Check => cmd_check(dir, json),
        Commands::Export(args) => cmd_export(dir, args),

        // Tree edits
        Commands::Cd(args) => cmd_cd(dir, args),
        Commands::Mkdir(args) => cmd_create(dir, args, true, json),
        Commands::New(args) => cmd_create(dir, args, false, json),
        Commands::Rename(args) => cmd_rename(dir, args),
        Commands::Rm(args) => cmd_rm(dir, args),
        Commands::Mv(args) => cmd_mv(dir, args),
        Commands::Fav(args) => cmd_fav(dir, args),

        // File edits
        Commands::Read(args) => cmd_read(dir, args),
        Commands::Snippet(cmd) => cmd_snippet(dir, cmd),
        Commands::Format(args) => cmd_format(dir, args),
        Commands::Lock(args) => cmd_lock(dir, args),
        Commands::Autosave(args) => cmd_autosave(dir, args),

        // Transfers
        Commands::Import(args) => cmd_import(dir, args, json),
        Commands::Merge(args) => cmd_merge(dir, args, json),

        // Maintenance
        Commands::Config(args) => cmd_config(dir, args),
        Commands::Recovery(cmd) => cmd_recovery(dir, cmd, json),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn print_json<T: Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Convert a 1-based snippet number.
fn snippet_index(n: usize) -> Result<usize, String> {
    n.checked_sub(1)
        .ok_or_else(|| "snippet numbers start at 1".to_string())
}

/// Folder from an optional reference, defaulting to the current folder.
fn folder_or_current(session: &Session, reference: Option<&str>) -> Result<String, Box<dyn std::error::Error>> {
    match reference {
        Some(r) => Ok(session.resolve(r)?),
        None => Ok(session.current_folder().to_string()),
    }
}

/// Lock the store, open a file, run an edit on it, save.
fn edit_file<T>(
    store_dir: &Path,
    reference: &str,
    edit: impl FnOnce(&mut OpenDocument, &EditorConfig) -> Result<T, DocumentError>,
) -> Result<T, Box<dyn std::error::Error>> {
    let mut session = Session::open_locked(store_dir)?;
    let id = session.resolve(reference)?;
    session.open_document(&id, Instant::now(), &mut TerminalConfirm { assume_yes: true })?;
    let editor = session.config.editor.clone();
    let out = edit(session.document_mut()?, &editor)?;
    session.save_document()?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_tree(store_dir: &Path, args: TreeArgs, json: bool) -> CmdResult {
    let session = Session::open(store_dir)?;
    let roots = match args.id {
        Some(reference) => vec![session.resolve(&reference)?],
        None => vec![
            session.db.quickcopy_root_id.clone(),
            session.db.favorites_root_id.clone(),
        ],
    };

    if json {
        let trees: Vec<TreeJson> = roots
            .iter()
            .filter_map(|id| tree_to_json(&session.db, id))
            .collect();
        return print_json(&trees);
    }
    for id in &roots {
        print!("{}", render_tree(&session.db, id, &session.config.display));
    }
    Ok(())
}

fn cmd_ls(store_dir: &Path, args: LsArgs, json: bool) -> CmdResult {
    let session = Session::open(store_dir)?;
    let folder = folder_or_current(&session, args.folder.as_deref())?;
    let children = tree_ops::sorted_children(&session.db, &folder)?;

    if json {
        let nodes: Vec<NodeJson> = children
            .iter()
            .map(|n| node_to_json(&session.db, n))
            .collect();
        return print_json(&nodes);
    }
    for child in children {
        println!("{}", format_node_line(&session.db, child, &session.config.display));
    }
    Ok(())
}

fn cmd_favs(store_dir: &Path, json: bool) -> CmdResult {
    let session = Session::open(store_dir)?;
    let favorites_root = session.db.favorites_root_id.clone();
    let favs = tree_ops::sorted_children(&session.db, &favorites_root)?;

    if json {
        let nodes: Vec<NodeJson> = favs.iter().map(|n| node_to_json(&session.db, n)).collect();
        return print_json(&nodes);
    }
    if favs.is_empty() {
        println!("no favorites");
    }
    for fav in favs {
        println!("{}", format_node_line(&session.db, fav, &session.config.display));
    }
    Ok(())
}

fn cmd_show(store_dir: &Path, args: IdArg, json: bool) -> CmdResult {
    let session = Session::open(store_dir)?;
    let id = session.resolve(&args.id)?;
    let node = tree_ops::resolve_file(&session.db, &id)?;
    let content = node
        .content()
        .ok_or_else(|| format!("not a file: {}", node.id))?;

    if json {
        return print_json(&file_to_json(&session.db, node, content));
    }
    print!("{}", render_file(&session.db, node, content));
    Ok(())
}

fn cmd_copy(store_dir: &Path, args: CopyArgs) -> CmdResult {
    let session = Session::open(store_dir)?;
    let id = session.resolve(&args.id)?;
    let index = snippet_index(args.n)?;
    let doc = OpenDocument::open(&session.db, &id, Duration::ZERO, Instant::now())?;
    doc.copy_snippet(index, &mut StdoutClipboard)?;
    Ok(())
}

fn cmd_search(store_dir: &Path, args: SearchArgs, json: bool) -> CmdResult {
    let mut session = Session::open(store_dir)?;
    let re = search::build_pattern(&args.query, args.regex)?;
    let hits = search::search_nodes(&session.db, &re, args.content);

    session.view.last_search = Some(args.query.clone());
    if let Err(e) = state::write_view_state(session.store_dir(), &session.view) {
        tracing::warn!(error = %e, "could not record last search");
    }

    if json {
        return print_json(&hits);
    }
    for hit in &hits {
        println!("{}", format_search_hit(&session.db, hit, &session.config.display));
    }
    Ok(())
}

fn cmd_check(store_dir: &Path, json: bool) -> CmdResult {
    let session = Session::open(store_dir)?;
    let result = check::check_store(&session.db);

    if json {
        print_json(&result)?;
    } else {
        print!("{}", render_check(&result));
    }
    if !result.valid {
        return Err(format!("store has {} error(s)", result.errors.len()).into());
    }
    Ok(())
}

fn cmd_export(store_dir: &Path, args: ExportArgs) -> CmdResult {
    let session = Session::open(store_dir)?;
    let (node, path) = match (args.all, args.id, args.path) {
        (Some(path), _, _) => (None, path),
        (None, Some(reference), Some(path)) => (Some(session.resolve(&reference)?), path),
        _ => return Err("usage: qc export <ID> <PATH>, or qc export --all <PATH>".into()),
    };
    let mut picker = ArgPath(Some(PathBuf::from(path)));
    if let Some(written) = session.export(node.as_deref(), &mut picker)? {
        println!("exported to {}", written.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tree edits
// ---------------------------------------------------------------------------

fn cmd_cd(store_dir: &Path, args: CdArgs) -> CmdResult {
    let mut session = Session::open_locked(store_dir)?;
    let id = session.resolve(&args.folder)?;
    session.change_folder(&id)?;
    state::write_view_state(session.store_dir(), &session.view)?;
    println!("{}", tree_ops::path_names(&session.db, &id).join(" / "));
    Ok(())
}

fn cmd_create(store_dir: &Path, args: CreateArgs, folder: bool, json: bool) -> CmdResult {
    let mut session = Session::open_locked(store_dir)?;
    let parent = folder_or_current(&session, args.parent.as_deref())?;
    let id = if folder {
        tree_ops::create_folder(&mut session.db, &parent, &args.name)?
    } else {
        tree_ops::create_file(&mut session.db, &parent, &args.name)?
    };
    session.commit()?;

    if json
        && let Some(node) = session.db.get(&id)
    {
        return print_json(&node_to_json(&session.db, node));
    }
    println!("{}", id);
    Ok(())
}

fn cmd_rename(store_dir: &Path, args: RenameArgs) -> CmdResult {
    let mut session = Session::open_locked(store_dir)?;
    let id = session.resolve(&args.id)?;
    let renamed = tree_ops::rename(&mut session.db, &id, &args.name)?;
    session.commit()?;
    if let Some(node) = session.db.get(&renamed) {
        println!("{}", format_node_line(&session.db, node, &session.config.display));
    }
    Ok(())
}

fn cmd_rm(store_dir: &Path, args: RmArgs) -> CmdResult {
    let mut session = Session::open_locked(store_dir)?;
    let id = session.resolve(&args.id)?;
    let node = session
        .db
        .get(&id)
        .ok_or_else(|| format!("node not found: {}", id))?;

    let question = if node.is_folder() {
        format!("Delete {:?} and everything in it?", node.name)
    } else {
        format!("Delete {:?}?", node.name)
    };
    let mut confirm = TerminalConfirm { assume_yes: args.yes };
    if confirm.ask(&question) != ConfirmChoice::Yes {
        println!("cancelled");
        return Ok(());
    }

    let deleted = session.delete(&id)?;
    println!("deleted {} node(s)", deleted.removed.len());
    Ok(())
}

fn cmd_mv(store_dir: &Path, args: MvArgs) -> CmdResult {
    let mut session = Session::open_locked(store_dir)?;
    let id = session.resolve(&args.id)?;
    let folder = session.resolve(&args.folder)?;
    tree_ops::move_node(&mut session.db, &id, &folder)?;
    session.commit()?;
    println!("{}", tree_ops::path_names(&session.db, &id).join(" / "));
    Ok(())
}

fn cmd_fav(store_dir: &Path, args: IdArg) -> CmdResult {
    let mut session = Session::open_locked(store_dir)?;
    let id = session.resolve(&args.id)?;
    let change = favorites::toggle_favorite(&mut session.db, &id)?;
    session.commit()?;
    match change {
        FavoriteChange::Added(shortcut) => println!("added favorite {}", shortcut),
        FavoriteChange::Removed(shortcut) => println!("removed favorite {}", shortcut),
        FavoriteChange::Unchanged => println!("unchanged"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// File edits
// ---------------------------------------------------------------------------

fn cmd_read(store_dir: &Path, args: ReadArgs) -> CmdResult {
    edit_file(store_dir, &args.id, |doc, _| doc.set_read_text(&args.text))?;
    Ok(())
}

fn cmd_snippet(store_dir: &Path, cmd: SnippetCmd) -> CmdResult {
    match cmd.action {
        SnippetAction::Add(args) => {
            let n = edit_file(store_dir, &args.id, |doc, _| {
                let index = doc.add_snippet()?;
                if let Some(text) = &args.text {
                    doc.set_snippet_text(index, text)?;
                }
                Ok(index + 1)
            })?;
            println!("added snippet {}", n);
        }
        SnippetAction::Rm(args) => {
            let index = snippet_index(args.n)?;
            edit_file(store_dir, &args.id, |doc, _| doc.remove_snippet(index))?;
            println!("removed snippet {}", args.n);
        }
        SnippetAction::Mv(args) => {
            let index = snippet_index(args.n)?;
            let direction = match args.direction.as_str() {
                "up" => MoveDirection::Up,
                "down" => MoveDirection::Down,
                other => return Err(format!("direction must be up or down, not {:?}", other).into()),
            };
            let moved = edit_file(store_dir, &args.id, |doc, _| doc.move_snippet(index, direction))?;
            println!("snippet {} is now {}", args.n, moved + 1);
        }
        SnippetAction::Set(args) => {
            let index = snippet_index(args.n)?;
            edit_file(store_dir, &args.id, |doc, _| doc.set_snippet_text(index, &args.text))?;
        }
    }
    Ok(())
}

fn format_op(args: &FormatArgs) -> Option<FormatOp> {
    if args.bold {
        Some(FormatOp::Bold)
    } else if args.underline {
        Some(FormatOp::Underline)
    } else if let Some(family) = &args.family {
        Some(FormatOp::Family(family.clone()))
    } else if let Some(size) = args.size {
        Some(FormatOp::Size(size))
    } else if let Some(color) = &args.color {
        Some(FormatOp::Color(color.clone()))
    } else if args.clear {
        Some(FormatOp::Clear)
    } else {
        None
    }
}

fn cmd_format(store_dir: &Path, args: FormatArgs) -> CmdResult {
    let target = match args.target.as_str() {
        "read" => DocTarget::Read,
        n => DocTarget::Snippet(snippet_index(
            n.parse()
                .map_err(|_| format!("target must be `read` or a snippet number, not {:?}", n))?,
        )?),
    };
    let start: TextIndex = args.start.parse()?;
    let end: TextIndex = args.end.parse()?;
    let op = format_op(&args).ok_or("no formatting option given")?;

    edit_file(store_dir, &args.id, |doc, editor| doc.format(target, start, end, &op, editor))?;
    Ok(())
}

fn cmd_lock(store_dir: &Path, args: LockArgs) -> CmdResult {
    let locked = !args.off;
    edit_file(store_dir, &args.id, |doc, _| {
        doc.set_locked(locked);
        Ok(())
    })?;
    println!("{}", if locked { "locked" } else { "unlocked" });
    Ok(())
}

fn cmd_autosave(store_dir: &Path, args: AutosaveArgs) -> CmdResult {
    let on = match args.state.as_str() {
        "on" => true,
        "off" => false,
        other => return Err(format!("autosave must be on or off, not {:?}", other).into()),
    };
    edit_file(store_dir, &args.id, |doc, _| {
        doc.set_autosave(on);
        Ok(())
    })?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Transfers
// ---------------------------------------------------------------------------

fn cmd_import(store_dir: &Path, args: TransferArgs, json: bool) -> CmdResult {
    let mut session = Session::open_locked(store_dir)?;
    let into = args.into.as_deref().map(|r| session.resolve(r)).transpose()?;
    let mut picker = ArgPath(Some(PathBuf::from(&args.path)));
    let Some(result) = session.import(&mut picker, into.as_deref())? else {
        return Ok(());
    };

    for issue in &result.issues {
        eprintln!("warning: {}", issue);
    }
    if json {
        return print_json(&serde_json::json!({
            "root_id": result.root_id,
            "imported": result.imported,
            "skipped": result.skipped,
        }));
    }
    println!("imported {} node(s) as {}", result.imported, result.root_id);
    if result.skipped > 0 {
        println!("skipped {} unreachable node(s)", result.skipped);
    }
    Ok(())
}

fn cmd_merge(store_dir: &Path, args: TransferArgs, json: bool) -> CmdResult {
    let mut session = Session::open_locked(store_dir)?;
    let into = args.into.as_deref().map(|r| session.resolve(r)).transpose()?;
    let mut picker = ArgPath(Some(PathBuf::from(&args.path)));
    let Some(result) = session.merge(&mut picker, into.as_deref())? else {
        return Ok(());
    };

    for issue in &result.issues {
        eprintln!("warning: {}", issue);
    }
    if json {
        return print_json(&serde_json::json!({
            "root_id": result.root_id,
            "imported": result.imported,
            "favorites_added": result.favorites_added,
            "favorites_skipped": result.favorites_skipped,
        }));
    }
    println!(
        "merged {} node(s) as {}, {} favorite(s) added",
        result.imported, result.root_id, result.favorites_added
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

fn cmd_config(store_dir: &Path, args: ConfigArgs) -> CmdResult {
    match args.value {
        None => {
            let (config, _) = config_io::read_config(store_dir)?;
            println!("{}", config_io::get_value(&config, &args.key)?);
        }
        Some(value) => {
            std::fs::create_dir_all(store_dir)?;
            let _lock = crate::io::lock::StoreLock::acquire_default(store_dir)?;
            let (_, mut doc) = config_io::read_config(store_dir)?;
            config_io::set_value(&mut doc, &args.key, &value)?;
            config_io::write_config(store_dir, &doc)?;
        }
    }
    Ok(())
}

fn parse_before(s: &str) -> Result<chrono::DateTime<chrono::Utc>, String> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&chrono::Utc));
    }
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid date {:?}, expected YYYY-MM-DD or RFC 3339", s))
}

fn cmd_recovery(store_dir: &Path, cmd: RecoveryCmd, json: bool) -> CmdResult {
    match cmd.action {
        Some(RecoveryAction::Path) => {
            println!("{}", recovery::recovery_log_path(store_dir).display());
        }
        Some(RecoveryAction::Prune(args)) => {
            let before = args.before.as_deref().map(parse_before).transpose()?;
            let removed = recovery::prune_recovery(store_dir, before, args.all)?;
            println!("pruned {} entr{}", removed, if removed == 1 { "y" } else { "ies" });
        }
        None => {
            let entries = recovery::read_recovery_entries(store_dir, Some(cmd.limit.unwrap_or(10)));
            if json {
                let values: Vec<serde_json::Value> = entries.iter().map(|e| e.to_json()).collect();
                return print_json(&values);
            }
            if entries.is_empty() {
                println!("recovery log is empty");
            }
            for entry in &entries {
                print!("{}", render_recovery_entry(entry));
            }
        }
    }
    Ok(())
}
