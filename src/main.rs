use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use playdex::config::{self, CatalogConfig};
use playdex::editor::ExternalEditor;
use playdex::error::CatalogError;
use playdex::importer::{HaltReason, ImportHooks, ImportSettings, ImportSummary, Importer};
use playdex::library::{Library, YamlLibrary};
use playdex::lock;
use playdex::log::LogLevel;
use playdex::merge::summarize;
use playdex::prompt::StdTerminal;
use playdex::source::{builtin_registry, select_tasks, CandidateProvider, CandidateSource};
use playdex::types::{Achievement, Game};
use playdex::{log_debug, log_error, log_info};

#[derive(Parser)]
#[command(name = "playdex", about = "Personal game catalog with metadata import")]
struct Cli {
    /// Path to config file (defaults to $XDG_CONFIG_HOME/playdex/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log verbosity level (error, warn, info, debug)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import games from the enabled sources
    Import {
        /// Number of concurrent metadata lookups
        #[arg(long)]
        threads: Option<usize>,
        /// Re-import games already in the library and review their changes
        #[arg(short, long)]
        force: bool,
    },
    /// List stored games
    List,
    /// Show the achievements of one game
    Achievements {
        /// Game ID
        id: u64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.log_level.parse::<LogLevel>() {
        Ok(level) => playdex::log::set_log_level(level),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Import { threads, force } => handle_import(config_path, threads, force).await,
        Commands::List => handle_list(config_path),
        Commands::Achievements { id } => handle_achievements(config_path, id),
    };

    if let Err(e) = result {
        log_error!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn handle_import(
    config_path: Option<&Path>,
    threads: Option<usize>,
    force: bool,
) -> Result<(), CatalogError> {
    let config = config::load_config(config_path)?;
    let registry = builtin_registry(&config)?;
    let enabled = registry.enabled(&config.plugins)?;

    let library_path = config.library_path();
    let library_lock = lock::try_acquire(&library_path)?;
    log_debug!("Locked {}", library_lock.library().display());
    let library = YamlLibrary::open(&library_path)?;

    let existing: HashSet<String> = library
        .list_all()?
        .iter()
        .filter_map(Game::identity)
        .collect();
    let tasks = select_tasks(&enabled.tasks, &existing, force);
    if tasks.is_empty() {
        println!("No new games found to import");
        return Ok(());
    }
    log_info!("Looking up metadata for {} game(s)", tasks.len());

    let settings = import_settings(&config, threads, force);
    let lookup: Arc<dyn CandidateSource> = Arc::new(CandidateProvider::new(enabled.search));
    let runtime = tokio::runtime::Handle::current();

    let summary = tokio::task::spawn_blocking(move || -> Result<ImportSummary, CatalogError> {
        let mut library = library;
        let mut terminal = StdTerminal::new();
        let mut editor = ExternalEditor::from_env();
        let hooks = ImportHooks {
            on_imported: Some(Box::new(|game: &Game| {
                log_debug!("Imported game {} \"{}\"", game.id, game.title())
            })),
            on_existing: Some(Box::new(|game: &Game| {
                log_debug!("Found existing game {} \"{}\"", game.id, game.title())
            })),
            tick: None,
        };
        let summary = Importer::new(&mut library, &mut terminal, &mut editor, lookup, settings)
            .with_hooks(hooks)
            .run(&runtime, tasks);
        summary
    })
    .await
    .map_err(|e| CatalogError::Worker(format!("import panicked: {}", e)))??;

    print_summary(&summary);
    Ok(())
}

fn import_settings(config: &CatalogConfig, threads: Option<usize>, force: bool) -> ImportSettings {
    ImportSettings {
        threads: config.resolve_threads(threads),
        queue_capacity: config.import.queue_capacity,
        prompt_existing: force,
        max_edit_attempts: config.import.max_edit_attempts,
    }
}

fn print_summary(summary: &ImportSummary) {
    if summary.updated > 0 {
        println!("Updated metadata for {} games", summary.updated);
    }
    if summary.created > 0 {
        println!("Imported {} games", summary.created);
    }
    if summary.created == 0 && summary.updated == 0 {
        println!("No new games found to import");
    }
    if summary.halt_reason == HaltReason::Quit {
        log_info!("Import ended early; remaining games were not processed");
    }
}

fn handle_list(config_path: Option<&Path>) -> Result<(), CatalogError> {
    let config = config::load_config(config_path)?;
    let library = YamlLibrary::open(&config.library_path())?;
    let games = library.list_all()?;

    if games.is_empty() {
        println!("Library is empty");
        return Ok(());
    }
    for game in &games {
        println!("{:>5}  {}", game.id, summarize(&game.fields));
    }
    Ok(())
}

fn handle_achievements(config_path: Option<&Path>, id: u64) -> Result<(), CatalogError> {
    let config = config::load_config(config_path)?;
    let library = YamlLibrary::open(&config.library_path())?;
    let game = library.get(id)?.ok_or(CatalogError::GameNotFound(id))?;
    let mut achievements = library.achievements(id)?;

    println!("{}", summarize(&game.fields));
    if achievements.is_empty() {
        println!("  No achievements");
        return Ok(());
    }

    achievements.sort_by(|a, b| {
        b.achieved
            .cmp(&a.achieved)
            .then_with(|| display_name(a).cmp(display_name(b)))
    });
    let unlocked = achievements.iter().filter(|a| a.achieved).count();
    println!("  {}/{} unlocked", unlocked, achievements.len());
    for achievement in &achievements {
        println!("  {}", format_achievement(achievement));
    }
    Ok(())
}

fn display_name(achievement: &Achievement) -> &str {
    achievement
        .name
        .as_deref()
        .unwrap_or(achievement.api_name.as_str())
}

fn format_achievement(achievement: &Achievement) -> String {
    let mark = if achievement.achieved { "x" } else { " " };
    let mut line = format!("[{}] {}", mark, display_name(achievement));
    if let Some(description) = achievement.description.as_deref().filter(|d| !d.is_empty()) {
        line.push_str(&format!(" - {}", description));
    }
    if achievement.achieved && achievement.unlock_time > 0 {
        if let Some(when) = chrono::DateTime::from_timestamp(achievement.unlock_time, 0) {
            line.push_str(&format!(" (unlocked {})", when.format("%Y-%m-%d %H:%M")));
        }
    }
    line
}
