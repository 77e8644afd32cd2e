use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use log::{info, warn};

use randora::app::App;
use randora::collection::LoadStatus;
use randora::config::AppConfig;
use randora::error::{self, AppError};
use randora::event::{Event, EventHandler};
use randora::fs::watcher::FsWatcher;
use randora::ordering::{SortKey, ViewSpec};
use randora::rename::RenameParams;
use randora::session::SessionStore;

/// Image folder slideshow with random playback and batch renaming.
#[derive(Parser, Debug)]
#[command(name = "randora", version, about)]
struct Cli {
    /// Path to a config file (overrides the default search)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the images of a folder in view order
    List {
        /// Folder to list (defaults to the most recent one)
        folder: Option<PathBuf>,
        #[command(flatten)]
        view: ViewArgs,
        /// Also print size and keywords
        #[arg(short, long)]
        long: bool,
    },
    /// Show the images of a folder one after another
    Play {
        /// Folder to play (defaults to the most recent one)
        folder: Option<PathBuf>,
        #[command(flatten)]
        view: ViewArgs,
        /// Random order without immediate repeats
        #[arg(long, conflicts_with = "sequential")]
        random: bool,
        /// Play in view order
        #[arg(long)]
        sequential: bool,
        /// Seed for a reproducible random order
        #[arg(long)]
        seed: Option<u64>,
        /// Delay between two images in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Stop after this many images
        #[arg(long)]
        count: Option<usize>,
        /// Disable filesystem watcher (auto-refresh)
        #[arg(long)]
        no_watcher: bool,
    },
    /// Rename the images of a folder to PREFIX + number, in view order
    Rename {
        folder: PathBuf,
        #[arg(long)]
        prefix: String,
        #[arg(long, default_value_t = 1, allow_hyphen_values = true)]
        start: i64,
        #[arg(long, default_value_t = 1, allow_hyphen_values = true)]
        step: i64,
        /// Zero-pad numbers to this many digits
        #[arg(long)]
        pad: Option<usize>,
        #[command(flatten)]
        view: ViewArgs,
        /// Print the plan without renaming anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Print recently opened folders
    Recent,
}

#[derive(Args, Debug)]
struct ViewArgs {
    /// Sort order
    #[arg(long, value_enum)]
    sort: Option<SortKey>,
    /// Only include images tagged with this keyword
    #[arg(long)]
    keyword: Option<String>,
}

impl Command {
    /// Config values set by flags of this command.
    fn overrides(&self) -> AppConfig {
        let mut cfg = AppConfig::default();
        match self {
            Command::List { view, .. } => {
                cfg.playback.sort = view.sort.map(|k| k.as_str().to_string());
            }
            Command::Play {
                view,
                random,
                sequential,
                interval_ms,
                no_watcher,
                ..
            } => {
                cfg.playback.sort = view.sort.map(|k| k.as_str().to_string());
                cfg.playback.random = match (*random, *sequential) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                };
                cfg.playback.interval_ms = *interval_ms;
                if *no_watcher {
                    cfg.watcher.enabled = Some(false);
                }
            }
            Command::Rename { view, pad, .. } => {
                cfg.playback.sort = view.sort.map(|k| k.as_str().to_string());
                cfg.rename.pad_width = *pad;
            }
            Command::Recent => {}
        }
        cfg
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    // RUST_LOG, when set, wins over the -v flags.
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let overrides = cli.command.overrides();
    let config = AppConfig::load(cli.config.as_deref(), Some(&overrides));
    let session_store = match config.session_path() {
        Some(path) => Some(SessionStore::new(path, config.recent_limit())),
        None => {
            warn!("no config directory; session is not persisted");
            None
        }
    };
    let app = App::new(config.extensions(), session_store);

    match cli.command {
        Command::List { folder, view, long } => list(app, &config, folder, view, long),
        Command::Play {
            folder,
            view,
            seed,
            count,
            ..
        } => {
            let app = app.with_seed(seed).with_limit(count);
            play(app, &config, folder, view).await
        }
        Command::Rename {
            folder,
            prefix,
            start,
            step,
            view,
            dry_run,
            ..
        } => {
            let params = RenameParams::new(prefix, start, step).with_pad_width(config.pad_width());
            rename_folder(app, &config, folder, view, params, dry_run).await
        }
        Command::Recent => {
            for folder in &app.session().recent_folders {
                println!("{}", folder.display());
            }
            Ok(())
        }
    }
}

/// The CLI folder, or the most recently opened one.
fn resolve_folder(app: &App, folder: Option<PathBuf>) -> error::Result<PathBuf> {
    folder
        .or_else(|| app.session().recent_folders.first().cloned())
        .ok_or_else(|| AppError::InvalidPath("no folder given and no recent folder".into()))
}

/// Sort from flags/config, falling back to the last session's choice.
fn view_spec(app: &App, config: &AppConfig, view: ViewArgs) -> ViewSpec {
    let key = if config.playback.sort.is_some() {
        config.sort_key()
    } else {
        app.session().last_sort_spec.key
    };
    ViewSpec::new(key, view.keyword)
}

fn list(
    mut app: App,
    config: &AppConfig,
    folder: Option<PathBuf>,
    view: ViewArgs,
    long: bool,
) -> error::Result<()> {
    let folder = resolve_folder(&app, folder)?;
    let spec = view_spec(&app, config, view);
    let random = app.session().random_mode_enabled;
    app.open_folder(&folder, spec, random)?;

    let collection = app.store().collection();
    for id in app.view().ids() {
        let Some(entry) = collection.get(*id) else {
            continue;
        };
        if long {
            let keywords: Vec<&str> = entry.keywords().iter().map(String::as_str).collect();
            println!(
                "{}\t{}\t{}",
                entry.path().display(),
                entry.size(),
                keywords.join(",")
            );
        } else {
            println!("{}", entry.path().display());
        }
    }
    app.save_session()?;
    Ok(())
}

async fn play(mut app: App, config: &AppConfig, folder: Option<PathBuf>, view: ViewArgs) -> error::Result<()> {
    let folder = resolve_folder(&app, folder)?;
    let spec = view_spec(&app, config, view);
    let random = config
        .random()
        .unwrap_or(app.session().random_mode_enabled);

    if app.open_folder(&folder, spec, random)? == LoadStatus::Empty {
        warn!("{} has no matching images; waiting for changes", folder.display());
    }

    let mut events = EventHandler::new(Duration::from_millis(config.interval_ms().max(1)));
    let event_tx = events.sender();

    // Initialize filesystem watcher (unless disabled)
    let watcher = match app.folder() {
        Some(loaded) if config.watcher_enabled() => match FsWatcher::new(
            loaded,
            Duration::from_millis(config.debounce_ms()),
            config.extensions(),
            event_tx.clone(),
        ) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!("watcher unavailable: {}", e);
                None
            }
        },
        _ => None,
    };
    if watcher.is_none() {
        info!("folder changes will not be picked up");
    }

    loop {
        match events.next().await? {
            Event::Tick => match app.advance() {
                Ok(Some(path)) => println!("{}", path.display()),
                Ok(None) => {}
                Err(e) => warn!("playback: {}", e),
            },
            Event::FsChange(paths) => app.handle_fs_change(paths, &event_tx),
            Event::ScanComplete(outcome) => app.handle_scan_complete(outcome, &event_tx),
            Event::Quit => app.quit(),
        }

        if app.should_quit {
            break;
        }
    }

    app.save_session()?;
    Ok(())
}

async fn rename_folder(
    mut app: App,
    config: &AppConfig,
    folder: PathBuf,
    view: ViewArgs,
    params: RenameParams,
    dry_run: bool,
) -> error::Result<()> {
    let spec = view_spec(&app, config, view);
    let random = app.session().random_mode_enabled;
    app.open_folder(&folder, spec, random)?;

    let plan = app.plan_rename(&params)?;
    for step in plan.mapping() {
        println!("{} -> {}", step.source.display(), step.target_name);
    }
    if dry_run {
        return Ok(());
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("cancelling rename");
            cancel_flag.store(true, Ordering::Relaxed);
        }
    });

    let result = tokio::task::block_in_place(|| app.execute_rename(&plan, &cancel));
    app.save_session()?;
    let report = result?;

    if report.is_success() {
        println!("renamed {} files", report.succeeded.len());
    } else {
        for (path, reason) in &report.failed {
            eprintln!("failed: {}: {}", path.display(), reason);
        }
        eprintln!("all files restored");
    }
    report.ensure_success()
}
