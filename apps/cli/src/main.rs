use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tabhierarchy_settings::{SettingsStore, StoreSettings};
use tabhierarchy_tabs::{
    RestorePolicy, SerializedTabItem, TabCategory, TabItemId, TabRegistry, TabSnapshot,
    TabSnapshotStore,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const DATA_DIR: &str = ".tabhierarchy";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Parser)]
#[command(
    name = "tabhierarchy-cli",
    about = "Inspect and edit persisted tab hierarchies",
    author,
    version
)]
struct Cli {
    /// 指定工作區根目錄；預設為目前目錄。 / Workspace root (defaults to current directory).
    #[arg(long, global = true, value_name = "PATH")]
    workspace: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 開啟分頁，可選擇放在既有項目之下。 / Open a tab, optionally nested under an existing item.
    Open(OpenArgs),
    /// 將根項目掛到父項目之下。 / Attach a root item under a parent.
    Attach(AttachArgs),
    /// 將項目自父項目分離成為根項目。 / Detach an item from its parent.
    Detach(ItemArgs),
    /// 刪除項目及其所有子項目。 / Delete an item and its descendants.
    Delete(ItemArgs),
    /// 重新排列子項目。 / Reorder the children of an item.
    Reorder(ReorderArgs),
    /// 變更項目分類（會產生新的識別碼）。 / Change an item's category (issues a new id).
    Recategorize(RecategorizeArgs),
    /// 以樹狀列出所有分頁。 / Print every tab group as a tree.
    Show,
    /// 計算分頁總數。 / Count tabs across groups.
    Count(CountArgs),
    /// 以前序列出所有子孫。 / List descendants in pre-order.
    Flatten(ItemArgs),
    /// 匯出單一群組為 JSON。 / Export one group as JSON.
    Export(ExportArgs),
    /// 匯入單一群組 JSON。 / Import one group from JSON.
    Import(ImportArgs),
    /// 檢視或修改儲存設定。 / Show or change store settings.
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// 顯示目前設定。 / Print the current settings.
    Show,
    /// 修改一或多項設定。 / Change one or more settings.
    Set(SettingsSetArgs),
    /// 還原為預設設定。 / Restore the default settings.
    Reset,
}

#[derive(Args)]
struct SettingsSetArgs {
    /// 快照檔名（位於資料目錄內）。 / Snapshot file name inside the data directory.
    #[arg(long, value_name = "NAME")]
    snapshot_file: Option<String>,

    /// 是否以縮排格式輸出 JSON。 / Whether snapshots are pretty-printed.
    #[arg(long, value_name = "BOOL")]
    pretty_json: Option<bool>,

    /// 儲存前是否保留備份。 / Whether a `.bak` copy is kept before saving.
    #[arg(long, value_name = "BOOL")]
    keep_backup: Option<bool>,

    /// 還原時遇到損壞群組的處理方式。 / How malformed groups are handled on restore.
    #[arg(long, value_enum)]
    restore_policy: Option<PolicyChoice>,
}

#[derive(Args)]
struct OpenArgs {
    /// 分頁所指向的文件標記。 / Opaque reference of the tab's document.
    #[arg(value_name = "TAB_REF")]
    tab_ref: String,

    /// 父項目識別碼。 / Parent item id.
    #[arg(long, value_name = "ID")]
    parent: Option<TabItemId>,

    /// 項目分類。 / Item category.
    #[arg(long, value_enum, default_value_t = CategoryChoice::Open)]
    category: CategoryChoice,

    /// 插入位置；預設附加至末端。 / Insert position; defaults to the end.
    #[arg(long, requires = "parent")]
    index: Option<usize>,
}

#[derive(Args)]
struct AttachArgs {
    #[arg(value_name = "PARENT")]
    parent: TabItemId,

    #[arg(value_name = "CHILD")]
    child: TabItemId,

    /// 插入位置；預設附加至末端。 / Insert position; defaults to the end.
    #[arg(long)]
    index: Option<usize>,

    /// 允許自目前父項目移出。 / Move the child even if it already has a parent.
    #[arg(long = "move")]
    move_existing: bool,
}

#[derive(Args)]
struct ItemArgs {
    #[arg(value_name = "ID")]
    id: TabItemId,
}

#[derive(Args)]
struct ReorderArgs {
    #[arg(value_name = "PARENT")]
    parent: TabItemId,

    /// 完整的新子項目順序。 / The complete new child order.
    #[arg(value_name = "IDS", required = true)]
    ids: Vec<TabItemId>,
}

#[derive(Args)]
struct RecategorizeArgs {
    #[arg(value_name = "ID")]
    id: TabItemId,

    #[arg(value_enum)]
    category: CategoryChoice,
}

#[derive(Args)]
struct CountArgs {
    /// 要計算的根項目；預設為全部。 / Roots to count; defaults to all groups.
    #[arg(value_name = "IDS")]
    ids: Vec<TabItemId>,
}

#[derive(Args)]
struct ExportArgs {
    #[arg(value_name = "ID")]
    id: TabItemId,

    /// 輸出檔案路徑。 / Destination file path.
    #[arg(long, value_name = "FILE")]
    output: PathBuf,
}

#[derive(Args)]
struct ImportArgs {
    /// 輸入檔案路徑。 / Source JSON file.
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CategoryChoice {
    #[value(name = "saved", aliases = ["saved-tabs", "saved_tabs"])]
    Saved,
    #[value(name = "open", aliases = ["open-tabs", "open_tabs"])]
    Open,
    Unknown,
}

impl From<CategoryChoice> for TabCategory {
    fn from(choice: CategoryChoice) -> Self {
        match choice {
            CategoryChoice::Saved => TabCategory::SavedTabs,
            CategoryChoice::Open => TabCategory::OpenTabs,
            CategoryChoice::Unknown => TabCategory::Unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyChoice {
    SkipMalformed,
    Strict,
}

impl From<PolicyChoice> for RestorePolicy {
    fn from(choice: PolicyChoice) -> Self {
        match choice {
            PolicyChoice::SkipMalformed => RestorePolicy::SkipMalformed,
            PolicyChoice::Strict => RestorePolicy::Strict,
        }
    }
}

/// Registry restored from the workspace snapshot, plus the store it is written back to.
struct Session {
    store: TabSnapshotStore,
    registry: TabRegistry,
}

impl Session {
    fn open(workspace_root: &Path) -> Result<Self> {
        let data_dir = workspace_root.join(DATA_DIR);
        let settings = load_settings(workspace_root)?;
        let settings = settings.settings();

        let store = TabSnapshotStore::new(settings.snapshot_path(&data_dir))
            .with_pretty_json(settings.pretty_json)
            .with_backup(settings.keep_backup);
        let snapshot = store
            .load()
            .with_context(|| format!("failed to load tabs from {}", store.path().display()))?
            .unwrap_or_else(|| TabSnapshot::new(Vec::new()));
        let outcome = snapshot
            .restore(settings.restore_policy)
            .context("failed to restore tab snapshot")?;
        for issue in &outcome.issues {
            match issue.group {
                Some(group) => eprintln!("warning: skipped tab group {group}: {}", issue.message),
                None => eprintln!("warning: {}", issue.message),
            }
        }
        debug!(roots = outcome.roots.len(), "restored tab session");
        Ok(Self {
            store,
            registry: outcome.registry,
        })
    }

    fn persist(&self) -> Result<()> {
        let snapshot = TabSnapshot::capture_all(&self.registry)?;
        self.store
            .save(&snapshot)
            .with_context(|| format!("failed to save tabs to {}", self.store.path().display()))
    }
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let Cli { workspace, command } = Cli::parse();
    let workspace_root = resolve_workspace(workspace)?;
    let command = match command {
        Commands::Settings(subcommand) => {
            return execute_settings_command(subcommand, &workspace_root)
        }
        command => command,
    };
    let mut session = Session::open(&workspace_root)?;
    let registry = &mut session.registry;

    let mutated = match command {
        Commands::Open(args) => {
            let id = registry.create_node(args.tab_ref, args.category.into());
            if let Some(parent) = args.parent {
                registry.attach_child(parent, id, args.index)?;
            }
            println!("{id}");
            true
        }
        Commands::Attach(args) => {
            if args.move_existing {
                registry.reparent(args.child, args.parent, args.index)?;
            } else {
                registry.attach_child(args.parent, args.child, args.index)?;
            }
            true
        }
        Commands::Detach(args) => {
            registry.detach_child(args.id)?;
            true
        }
        Commands::Delete(args) => {
            let removed = registry.delete_subtree(args.id)?;
            println!("Removed {} tab item(s)", removed.len());
            true
        }
        Commands::Reorder(args) => {
            registry.reorder_children(args.parent, &args.ids)?;
            true
        }
        Commands::Recategorize(args) => {
            let id = registry.change_category(args.id, args.category.into())?;
            println!("{id}");
            true
        }
        Commands::Show => {
            print_tree(registry)?;
            false
        }
        Commands::Count(args) => {
            let total = if args.ids.is_empty() {
                registry.total_tabs(registry.roots())?
            } else {
                registry.total_tabs(&args.ids)?
            };
            println!("{total}");
            false
        }
        Commands::Flatten(args) => {
            for id in registry.flatten(args.id)? {
                if let Some(node) = registry.lookup(id) {
                    println!("{id} {}", node.tab_reference());
                }
            }
            false
        }
        Commands::Export(args) => {
            export_group(registry, args)?;
            false
        }
        Commands::Import(args) => {
            let input = resolve_input_path(&args.input)?;
            if !input.exists() {
                bail!("group file '{}' does not exist", input.display());
            }
            let contents = fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let form = SerializedTabItem::from_json(&contents)?;
            let root = registry.decode(&form)?;
            println!("{root}");
            true
        }
        Commands::Settings(_) => false,
    };

    if mutated {
        session.persist()?;
    }
    Ok(())
}

fn execute_settings_command(command: SettingsCommand, workspace_root: &Path) -> Result<()> {
    let mut store = load_settings(workspace_root)?;
    match command {
        SettingsCommand::Show => {}
        SettingsCommand::Set(args) => {
            store
                .update(|settings| {
                    if let Some(name) = &args.snapshot_file {
                        settings.snapshot_file = name.clone();
                    }
                    if let Some(pretty) = args.pretty_json {
                        settings.pretty_json = pretty;
                    }
                    if let Some(keep) = args.keep_backup {
                        settings.keep_backup = keep;
                    }
                    if let Some(policy) = args.restore_policy {
                        settings.restore_policy = policy.into();
                    }
                })
                .with_context(|| format!("failed to save settings to {}", store.path().display()))?;
        }
        SettingsCommand::Reset => {
            store
                .overwrite(StoreSettings::default())
                .with_context(|| format!("failed to save settings to {}", store.path().display()))?;
        }
    }
    print_settings(store.settings());
    Ok(())
}

fn print_settings(settings: &StoreSettings) {
    let policy = match settings.restore_policy {
        RestorePolicy::SkipMalformed => "skip-malformed",
        RestorePolicy::Strict => "strict",
    };
    println!("snapshot_file = {}", settings.snapshot_file);
    println!("pretty_json = {}", settings.pretty_json);
    println!("keep_backup = {}", settings.keep_backup);
    println!("restore_policy = {policy}");
}

fn load_settings(workspace_root: &Path) -> Result<SettingsStore> {
    let settings_path = settings_path(workspace_root);
    SettingsStore::load(&settings_path)
        .with_context(|| format!("failed to load settings from {}", settings_path.display()))
}

fn settings_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(DATA_DIR).join(SETTINGS_FILE)
}

fn print_tree(registry: &TabRegistry) -> Result<()> {
    if registry.is_empty() {
        println!("No tabs");
        return Ok(());
    }
    for root in registry.roots() {
        let mut stack = vec![(*root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = registry.lookup(id) else {
                continue;
            };
            let indent = "  ".repeat(depth);
            if node.children().is_empty() {
                println!(
                    "{indent}{id} [{}] {}",
                    node.category(),
                    node.tab_reference()
                );
            } else {
                println!(
                    "{indent}{id} [{}] {} ({} items)",
                    node.category(),
                    node.tab_reference(),
                    registry.item_count(id)?
                );
            }
            stack.extend(node.children().iter().rev().map(|child| (*child, depth + 1)));
        }
    }
    Ok(())
}

fn export_group(registry: &TabRegistry, args: ExportArgs) -> Result<()> {
    let json = registry.encode(args.id)?.to_json()?;
    let output = resolve_input_path(&args.output)?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&output, json)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Exported {} to {}", args.id, output.display());
    Ok(())
}

fn resolve_workspace(workspace: Option<PathBuf>) -> Result<PathBuf> {
    match workspace {
        Some(path) => {
            if path.is_absolute() {
                Ok(path)
            } else {
                Ok(std::env::current_dir()
                    .context("determine current directory")?
                    .join(path))
            }
        }
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
