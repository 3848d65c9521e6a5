//! taskstore CLI binary entry point.

use clap::Parser;
use taskstore::cli::{commands, Cli, Commands, LockCommands};
use taskstore::config::StoreConfig;
use taskstore::error::Result;
use taskstore::store::TaskService;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "TASKSTORE_LOG";

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        eprintln!("Hint: {}", e.recovery_suggestion());
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run(cli: Cli) -> Result<()> {
    let service = build_service(cli.file)?;

    match cli.command {
        Commands::List(args) => commands::handle_list(&service, args.json).await,
        Commands::Show(args) => commands::handle_show(&service, &args.id).await,
        Commands::New(args) => commands::handle_new(&service, &args.agent, &args.fields).await,
        Commands::Set(args) => commands::handle_set(&service, &args.id, &args.fields).await,
        Commands::Lock(lock) => match lock.command {
            LockCommands::Status => commands::handle_lock_status(&service).await,
            LockCommands::Clear { force } => commands::handle_lock_clear(&service, force).await,
        },
    }
}

fn build_service(file: Option<std::path::PathBuf>) -> Result<TaskService> {
    let mut config = StoreConfig::discover()?;
    // --file is taken relative to the caller's directory, not the workspace.
    if let Some(file) = file {
        config = config.with_tasks_file(file);
    }
    tracing::debug!(paths = ?config.paths, "resolved store paths");
    Ok(TaskService::new(config))
}
