use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use lorebook_core::{
    write_atomic, ConfirmGate, DeleteOutcome, EditorSession, Entry, EntryUid, Placement,
    Preferences, PreferencesStore, SelectiveLogic, SessionOptions, Strategy,
};
use tracing::debug;

const LOG_ENV: &str = "LOREBOOK_LOG";

#[derive(Parser)]
#[command(
    name = "lorebook",
    about = "Edit, reorder and export lorebook JSON documents",
    author,
    version
)]
struct Cli {
    /// Workspace root holding `.lorebook/preferences.json` (defaults to current directory).
    #[arg(long, global = true, value_name = "PATH")]
    workspace: Option<PathBuf>,
    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List entries in their current order.
    List(ListArgs),
    /// Load and re-export without changes.
    Normalize(TargetArgs),
    /// Add a new entry.
    Add(AddArgs),
    /// Duplicate an entry directly below itself.
    Duplicate(UidArgs),
    /// Delete an entry after confirmation.
    Delete(DeleteArgs),
    /// Move an entry.
    Move(MoveArgs),
    /// Enable or disable an entry.
    Toggle(UidArgs),
    /// Edit fields of an entry.
    Set(SetArgs),
    /// Inspect or change editor preferences.
    #[command(subcommand)]
    Preferences(PreferencesCommand),
}

#[derive(Args)]
struct ListArgs {
    /// Lorebook JSON file.
    #[arg(value_name = "FILE")]
    file: PathBuf,
}

#[derive(Args)]
struct TargetArgs {
    /// Lorebook JSON file.
    #[arg(value_name = "FILE")]
    file: PathBuf,
    /// Write the export here instead of `edited_<name>.json` next to FILE.
    #[arg(long, short = 'o', value_name = "PATH", conflicts_with = "in_place")]
    output: Option<PathBuf>,
    /// Overwrite FILE with the export.
    #[arg(long)]
    in_place: bool,
}

#[derive(Args)]
struct UidArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// Entry uid.
    #[arg(long, value_name = "UID")]
    uid: u64,
}

#[derive(Args)]
struct AddArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// Insert above this entry.
    #[arg(long, value_name = "UID", conflicts_with = "below")]
    above: Option<u64>,
    /// Insert below this entry.
    #[arg(long, value_name = "UID")]
    below: Option<u64>,
    #[arg(long)]
    comment: Option<String>,
    #[arg(long)]
    content: Option<String>,
    /// Comma-separated primary keywords.
    #[arg(long)]
    keys: Option<String>,
}

#[derive(Args)]
struct DeleteArgs {
    #[command(flatten)]
    entry: UidArgs,
    /// Skip the confirmation prompt.
    #[arg(long, short = 'y')]
    yes: bool,
}

#[derive(Args)]
struct MoveArgs {
    #[command(flatten)]
    entry: UidArgs,
    #[command(flatten)]
    direction: MoveDirection,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct MoveDirection {
    /// Swap with the previous entry.
    #[arg(long)]
    up: bool,
    /// Swap with the next entry.
    #[arg(long)]
    down: bool,
    /// Move to a 0-based index.
    #[arg(long, value_name = "INDEX")]
    to: Option<usize>,
}

#[derive(Args)]
struct SetArgs {
    #[command(flatten)]
    entry: UidArgs,
    #[arg(long)]
    comment: Option<String>,
    #[arg(long)]
    content: Option<String>,
    /// Comma-separated primary keywords.
    #[arg(long)]
    keys: Option<String>,
    /// Comma-separated secondary keywords.
    #[arg(long)]
    secondary_keys: Option<String>,
    #[arg(long, value_enum)]
    strategy: Option<StrategyChoice>,
    #[arg(long, value_enum)]
    logic: Option<LogicChoice>,
    #[arg(long, value_name = "true|false")]
    selective: Option<bool>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyChoice {
    Normal,
    Constant,
    Vectorized,
}

impl From<StrategyChoice> for Strategy {
    fn from(choice: StrategyChoice) -> Self {
        match choice {
            StrategyChoice::Normal => Strategy::Normal,
            StrategyChoice::Constant => Strategy::Constant,
            StrategyChoice::Vectorized => Strategy::Vectorized,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogicChoice {
    And,
    Not,
}

impl From<LogicChoice> for SelectiveLogic {
    fn from(choice: LogicChoice) -> Self {
        match choice {
            LogicChoice::And => SelectiveLogic::And,
            LogicChoice::Not => SelectiveLogic::Not,
        }
    }
}

#[derive(Subcommand)]
enum PreferencesCommand {
    /// Print the effective preferences as JSON.
    Show,
    /// Update one or more preferences.
    Set(PreferencesSetArgs),
}

#[derive(Args)]
struct PreferencesSetArgs {
    #[arg(long, value_name = "true|false")]
    confirm_delete: Option<bool>,
    #[arg(long, value_enum)]
    new_entry_strategy: Option<StrategyChoice>,
    /// Spaces per indent level in exports (0 = compact).
    #[arg(long, value_name = "N")]
    indent: Option<u8>,
    #[arg(long, value_name = "PREFIX")]
    file_prefix: Option<String>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Cli {
        workspace,
        verbose,
        command,
    } = Cli::parse();
    init_tracing(verbose);
    let workspace_root = resolve_workspace(workspace)?;
    match command {
        Commands::List(args) => execute_list(args),
        Commands::Preferences(subcommand) => {
            execute_preferences_command(subcommand, &workspace_root)
        }
        editing => {
            let store = load_preferences(&workspace_root)?;
            execute_edit(editing, store.preferences())
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_target(false)
        .try_init();
}

fn execute_list(args: ListArgs) -> Result<()> {
    let file = resolve_input_path(&args.file)?;
    let session = open_session(&file, &Preferences::default())?;
    if session.entries().is_empty() {
        println!("No entries in {}", file.display());
        return Ok(());
    }
    println!("{:>5}  {:<8}  {:<10}  ENTRY", "UID", "STATE", "STRATEGY");
    for entry in session.entries() {
        println!("{}", format_row(entry));
    }
    Ok(())
}

fn format_row(entry: &Entry) -> String {
    let state = if entry.is_enabled() { "enabled" } else { "disabled" };
    let mut row = format!(
        "{:>5}  {:<8}  {:<10}  {}",
        entry.uid(),
        state,
        entry.strategy,
        entry.summary_label()
    );
    if !entry.keys().is_empty() {
        row.push_str(&format!(" (keys: {})", entry.keys_text()));
    }
    if !entry.secondary_keys().is_empty() {
        row.push_str(&format!(" (secondary: {})", entry.secondary_keys_text()));
    }
    row
}

fn execute_edit(command: Commands, preferences: &Preferences) -> Result<()> {
    match command {
        Commands::Normalize(target) => {
            let (mut session, file) = open_target(&target, preferences)?;
            write_export(&mut session, &file, &target)
        }
        Commands::Add(args) => execute_add(args, preferences),
        Commands::Duplicate(args) => {
            let (mut session, file) = open_target(&args.target, preferences)?;
            let uid = require_entry(&session, args.uid)?;
            if let Some(copy) = session.duplicate(uid) {
                println!("Duplicated entry {uid} as {copy}");
            }
            write_export(&mut session, &file, &args.target)
        }
        Commands::Delete(args) => execute_delete(args, preferences),
        Commands::Move(args) => execute_move(args, preferences),
        Commands::Toggle(args) => {
            let (mut session, file) = open_target(&args.target, preferences)?;
            let uid = require_entry(&session, args.uid)?;
            if let Some(enabled) = session.toggle_enabled(uid) {
                let state = if enabled { "enabled" } else { "disabled" };
                println!("Entry {uid} is now {state}");
            }
            write_export(&mut session, &file, &args.target)
        }
        Commands::Set(args) => execute_set(args, preferences),
        Commands::List(_) | Commands::Preferences(_) => {
            unreachable!("non-editing commands are dispatched in run()")
        }
    }
}

fn execute_add(args: AddArgs, preferences: &Preferences) -> Result<()> {
    let (mut session, file) = open_target(&args.target, preferences)?;
    let placement = match (args.above, args.below) {
        (Some(uid), _) => Placement::Above(EntryUid::new(uid)),
        (None, Some(uid)) => Placement::Below(EntryUid::new(uid)),
        (None, None) => Placement::Bottom,
    };
    let uid = session.add_with(placement, |entry| {
        if let Some(comment) = args.comment {
            entry.comment = comment;
        }
        if let Some(content) = args.content {
            entry.content = content;
        }
        if let Some(keys) = args.keys.as_deref() {
            entry.set_keys_from_text(keys);
        }
    });
    let index = session.registry().position(uid).unwrap_or_default();
    println!("Added entry {uid} at index {index}");
    write_export(&mut session, &file, &args.target)
}

fn execute_delete(args: DeleteArgs, preferences: &Preferences) -> Result<()> {
    let target = &args.entry.target;
    let (mut session, file) = open_target(target, preferences)?;
    let uid = require_entry(&session, args.entry.uid)?;
    let skip_prompt = args.yes || !preferences.editor.confirm_delete;
    let mut gate: Box<dyn ConfirmGate> = if skip_prompt {
        Box::new(|_: &str| true)
    } else {
        Box::new(StdinGate)
    };
    match session.delete(uid, gate.as_mut()) {
        DeleteOutcome::Deleted => println!("Deleted entry {uid}"),
        DeleteOutcome::Declined => println!("Delete cancelled"),
        DeleteOutcome::NotFound => bail!("no entry with uid {uid}"),
    }
    write_export(&mut session, &file, target)
}

fn execute_move(args: MoveArgs, preferences: &Preferences) -> Result<()> {
    let target = &args.entry.target;
    let (mut session, file) = open_target(target, preferences)?;
    let uid = require_entry(&session, args.entry.uid)?;
    let moved = match (args.direction.up, args.direction.down, args.direction.to) {
        (true, _, _) => session.move_up(uid),
        (_, true, _) => session.move_down(uid),
        (_, _, Some(index)) => session.move_to(uid, index),
        _ => bail!("specify --up, --down or --to <INDEX>"),
    };
    match session.registry().position(uid) {
        Some(index) if moved => println!("Moved entry {uid} to index {index}"),
        Some(index) => println!("Entry {uid} stays at index {index}"),
        None => {}
    }
    write_export(&mut session, &file, target)
}

fn execute_set(args: SetArgs, preferences: &Preferences) -> Result<()> {
    let target = &args.entry.target;
    let (mut session, file) = open_target(target, preferences)?;
    let uid = require_entry(&session, args.entry.uid)?;
    session.edit(uid, |entry| {
        if let Some(comment) = args.comment.clone() {
            entry.comment = comment;
        }
        if let Some(content) = args.content.clone() {
            entry.content = content;
        }
        if let Some(keys) = args.keys.as_deref() {
            entry.set_keys_from_text(keys);
        }
        if let Some(keys) = args.secondary_keys.as_deref() {
            entry.set_secondary_keys_from_text(keys);
        }
        if let Some(strategy) = args.strategy {
            entry.strategy = strategy.into();
        }
        if let Some(logic) = args.logic {
            entry.selective_logic = logic.into();
        }
        if let Some(selective) = args.selective {
            entry.selective = selective;
        }
    });
    println!("Updated entry {uid}");
    write_export(&mut session, &file, target)
}

/// Reads a yes/no answer from stdin; anything but `y`/`yes` declines.
struct StdinGate;

impl ConfirmGate for StdinGate {
    fn confirm(&mut self, prompt: &str) -> bool {
        eprint!("{prompt} [y/N] ");
        let _ = io::stderr().flush();
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

fn open_target(target: &TargetArgs, preferences: &Preferences) -> Result<(EditorSession, PathBuf)> {
    let file = resolve_input_path(&target.file)?;
    let session = open_session(&file, preferences)?;
    Ok((session, file))
}

fn open_session(file: &Path, preferences: &Preferences) -> Result<EditorSession> {
    let session = EditorSession::load_file(file)
        .with_context(|| format!("failed to load {}", file.display()))?;
    Ok(session.with_options(SessionOptions::from(preferences)))
}

fn require_entry(session: &EditorSession, uid: u64) -> Result<EntryUid> {
    let uid = EntryUid::new(uid);
    if session.entry(uid).is_none() {
        bail!("no entry with uid {uid}");
    }
    Ok(uid)
}

fn write_export(session: &mut EditorSession, file: &Path, target: &TargetArgs) -> Result<()> {
    let document = session.export()?;
    let output = if target.in_place {
        file.to_path_buf()
    } else if let Some(path) = &target.output {
        resolve_input_path(path)?
    } else {
        file.with_file_name(&document.file_name)
    };
    debug!(output = %output.display(), "writing export");
    write_atomic(&output, document.text.as_bytes())
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!(
        "Exported {} entries to {}",
        session.entries().len(),
        output.display()
    );
    Ok(())
}

fn execute_preferences_command(command: PreferencesCommand, workspace_root: &Path) -> Result<()> {
    match command {
        PreferencesCommand::Show => {
            let store = load_preferences(workspace_root)?;
            let payload = serde_json::to_string_pretty(store.preferences())
                .context("failed to serialize preferences")?;
            println!("{payload}");
            Ok(())
        }
        PreferencesCommand::Set(args) => {
            let mut store = load_preferences(workspace_root)?;
            store
                .update(|prefs| {
                    if let Some(confirm) = args.confirm_delete {
                        prefs.editor.confirm_delete = confirm;
                    }
                    if let Some(strategy) = args.new_entry_strategy {
                        prefs.editor.new_entry_strategy = strategy.into();
                    }
                    if let Some(indent) = args.indent {
                        prefs.export.indent = indent;
                    }
                    if let Some(prefix) = args.file_prefix.clone() {
                        prefs.export.file_prefix = prefix;
                    }
                })
                .with_context(|| format!("failed to save {}", store.path().display()))?;
            println!("Saved preferences to {}", store.path().display());
            Ok(())
        }
    }
}

fn load_preferences(workspace_root: &Path) -> Result<PreferencesStore> {
    let path = preferences_path(workspace_root);
    PreferencesStore::load(&path)
        .with_context(|| format!("failed to load preferences from {}", path.display()))
}

fn preferences_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".lorebook").join("preferences.json")
}

fn resolve_workspace(workspace: Option<PathBuf>) -> Result<PathBuf> {
    match workspace {
        Some(path) => resolve_input_path(&path),
        None => std::env::current_dir().context("determine current directory"),
    }
}

fn resolve_input_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()
            .context("determine current directory")?
            .join(path))
    }
}
