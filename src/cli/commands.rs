use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "qc", about = concat!("qc v", env!("CARGO_PKG_VERSION"), " - folders of copyable snippets"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use a different store directory (default: $QC_STORE_DIR, then the platform config dir)
    #[arg(long, global = true, value_name = "DIR")]
    pub store: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the store if it does not exist and print where it is
    Init(InitArgs),
    /// Print the folder tree
    Tree(TreeArgs),
    /// List a folder's contents
    Ls(LsArgs),
    /// Change the current folder
    Cd(CdArgs),
    /// Create a folder
    Mkdir(CreateArgs),
    /// Create a file
    New(CreateArgs),
    /// Rename a node
    Rename(RenameArgs),
    /// Delete a node and everything under it
    Rm(RmArgs),
    /// Move a node into another folder
    Mv(MvArgs),
    /// Toggle a file's favorite
    Fav(IdArg),
    /// List favorites
    Favs,
    /// Show a file's read document and snippets
    Show(IdArg),
    /// Print a snippet's text for the clipboard
    Copy(CopyArgs),
    /// Replace a file's read document text
    Read(ReadArgs),
    /// Add, remove, reorder or edit snippets
    Snippet(SnippetCmd),
    /// Format a range of a document
    Format(FormatArgs),
    /// Lock a file against edits, or unlock it
    Lock(LockArgs),
    /// Turn a file's autosave on or off
    Autosave(AutosaveArgs),
    /// Export a subtree, or the whole store, to a JSON file
    Export(ExportArgs),
    /// Import a bundle into a folder
    Import(TransferArgs),
    /// Merge an exported store into a folder
    Merge(TransferArgs),
    /// Search node names (and optionally document text)
    Search(SearchArgs),
    /// Validate store integrity
    Check,
    /// Read or set a config value
    Config(ConfigArgs),
    /// View or prune the recovery log
    Recovery(RecoveryCmd),
}

// ---------------------------------------------------------------------------
// Store and navigation args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Print nothing when the store already exists
    #[arg(long, short)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct TreeArgs {
    /// Folder to start from (default: both roots)
    pub id: Option<String>,
}

#[derive(Args)]
pub struct LsArgs {
    /// Folder to list (default: the current folder)
    pub folder: Option<String>,
}

#[derive(Args)]
pub struct CdArgs {
    /// Folder ID or prefix, `quickcopy` or `favorites`
    pub folder: String,
}

#[derive(Args)]
pub struct IdArg {
    /// Node ID or unique prefix
    pub id: String,
}

// ---------------------------------------------------------------------------
// Tree edit args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct CreateArgs {
    /// Name of the new node
    pub name: String,
    /// Parent folder (default: the current folder)
    #[arg(long = "in", value_name = "ID")]
    pub parent: Option<String>,
}

#[derive(Args)]
pub struct RenameArgs {
    /// Node ID or unique prefix
    pub id: String,
    /// New name (blank becomes "Untitled")
    pub name: String,
}

#[derive(Args)]
pub struct RmArgs {
    /// Node ID or unique prefix
    pub id: String,
    /// Don't ask for confirmation
    #[arg(long, short)]
    pub yes: bool,
}

#[derive(Args)]
pub struct MvArgs {
    /// Node to move
    pub id: String,
    /// Destination folder
    pub folder: String,
}

// ---------------------------------------------------------------------------
// File content args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct CopyArgs {
    /// File ID, prefix, or a favorite's shortcut
    pub id: String,
    /// Snippet number, starting at 1
    #[arg(default_value = "1")]
    pub n: usize,
}

#[derive(Args)]
pub struct ReadArgs {
    /// File ID or unique prefix
    pub id: String,
    /// New text (formatting that still fits is kept)
    pub text: String,
}

#[derive(Args)]
pub struct SnippetCmd {
    #[command(subcommand)]
    pub action: SnippetAction,
}

#[derive(Subcommand)]
pub enum SnippetAction {
    /// Append a blank snippet, optionally with text
    Add(SnippetAddArgs),
    /// Remove a snippet (a file keeps at least one)
    Rm(SnippetArgs),
    /// Move a snippet up or down
    Mv(SnippetMvArgs),
    /// Replace a snippet's text
    Set(SnippetSetArgs),
}

#[derive(Args)]
pub struct SnippetAddArgs {
    /// File ID or unique prefix
    pub id: String,
    /// Text for the new snippet
    pub text: Option<String>,
}

#[derive(Args)]
pub struct SnippetArgs {
    /// File ID or unique prefix
    pub id: String,
    /// Snippet number, starting at 1
    pub n: usize,
}

#[derive(Args)]
pub struct SnippetMvArgs {
    /// File ID or unique prefix
    pub id: String,
    /// Snippet number, starting at 1
    pub n: usize,
    /// Direction: "up" or "down"
    pub direction: String,
}

#[derive(Args)]
pub struct SnippetSetArgs {
    /// File ID or unique prefix
    pub id: String,
    /// Snippet number, starting at 1
    pub n: usize,
    /// New text (formatting that still fits is kept)
    pub text: String,
}

#[derive(Args)]
#[command(group(
    clap::ArgGroup::new("op")
        .required(true)
        .args(["bold", "underline", "family", "size", "color", "clear"])
))]
pub struct FormatArgs {
    /// File ID or unique prefix
    pub id: String,
    /// `read` or a snippet number starting at 1
    pub target: String,
    /// Start index, `line.column`
    pub start: String,
    /// End index, `line.column`
    pub end: String,
    /// Toggle bold
    #[arg(long)]
    pub bold: bool,
    /// Toggle underline
    #[arg(long)]
    pub underline: bool,
    /// Set the font family
    #[arg(long, value_name = "FAMILY")]
    pub family: Option<String>,
    /// Set the font size
    #[arg(long, value_name = "POINTS")]
    pub size: Option<i32>,
    /// Set the text colour (#rrggbb)
    #[arg(long, value_name = "HEX")]
    pub color: Option<String>,
    /// Remove all formatting in the range
    #[arg(long)]
    pub clear: bool,
}

#[derive(Args)]
pub struct LockArgs {
    /// File ID or unique prefix
    pub id: String,
    /// Unlock instead
    #[arg(long)]
    pub off: bool,
}

#[derive(Args)]
pub struct AutosaveArgs {
    /// File ID or unique prefix
    pub id: String,
    /// "on" or "off"
    pub state: String,
}

// ---------------------------------------------------------------------------
// Transfer args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ExportArgs {
    /// Node to export
    pub id: Option<String>,
    /// Output file
    pub path: Option<String>,
    /// Export the whole store to PATH instead, for `qc merge`
    #[arg(long, value_name = "PATH", conflicts_with_all = ["id", "path"])]
    pub all: Option<String>,
}

#[derive(Args)]
pub struct TransferArgs {
    /// JSON file to read
    pub path: String,
    /// Destination folder (default: the current folder)
    #[arg(long = "into", value_name = "ID")]
    pub into: Option<String>,
}

// ---------------------------------------------------------------------------
// Search, config, recovery
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct SearchArgs {
    /// Text to look for (case-insensitive)
    pub query: String,
    /// Treat the query as a regular expression
    #[arg(long)]
    pub regex: bool,
    /// Also search read documents and snippets
    #[arg(long)]
    pub content: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Key as section.name, e.g. editor.font_size
    pub key: String,
    /// New value (omit to read)
    pub value: Option<String>,
}

#[derive(Args)]
pub struct RecoveryCmd {
    #[command(subcommand)]
    pub action: Option<RecoveryAction>,
    /// Maximum number of entries to show (default: 10)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand)]
pub enum RecoveryAction {
    /// Remove old entries
    Prune(RecoveryPruneArgs),
    /// Print the path to the recovery log
    Path,
}

#[derive(Args)]
pub struct RecoveryPruneArgs {
    /// Remove entries before this date (YYYY-MM-DD or RFC 3339; default: 30 days ago)
    #[arg(long)]
    pub before: Option<String>,
    /// Remove all entries
    #[arg(long)]
    pub all: bool,
}
