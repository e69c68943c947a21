//! Rolewright CLI entrypoint.
//!
//! This is the main entrypoint for the rolewright command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use rolewright::catalog::CapabilityCatalog;
use rolewright::cli::{Cli, Commands, OutputFormatter};
use rolewright::config::{
    ConfigParser, ConfigValidator, RunConfig, StoreBackend, find_config_file,
};
use rolewright::error::{ReconcileError, Result, RolewrightError};
use rolewright::inventory::{
    DynamoInventoryStore, INVENTORY_DIR, InventoryStore, LocalInventoryStore, first_named,
    list_servers, list_software,
};
use rolewright::planner::{DeclaredBuckets, PromptBuckets};
use rolewright::workflow::{RunMode, RunRequest, RunStatus, Workflow};

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point. Returns false when the command ran but failed.
async fn run(cli: Cli) -> Result<bool> {
    let formatter = OutputFormatter::new(cli.output);
    let config_path = cli.config.as_ref();

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force).map(|()| true),
        Commands::Validate { warnings } => cmd_validate(config_path, warnings),
        Commands::Roles => cmd_roles(config_path, &formatter).map(|()| true),
        Commands::Servers => cmd_servers(config_path, &formatter).await.map(|()| true),
        Commands::Status { server } => cmd_status(config_path, server.as_deref(), &formatter)
            .await
            .map(|()| true),
        Commands::Plan => cmd_plan(config_path, &formatter).await,
        Commands::Apply { yes, prompt_buckets } => {
            cmd_apply(config_path, yes, prompt_buckets, &formatter).await
        }
    }
}

/// Initialize a new project.
fn cmd_init(path: &Path, force: bool) -> Result<()> {
    info!("Initializing new rolewright project in: {}", path.display());

    let config_path = path.join("rolewright.yaml");
    let env_path = path.join(".env.example");
    let gitignore_path = path.join(".gitignore");

    // Check if files exist
    if !force && config_path.exists() {
        eprintln!("Run file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    // Create directory if needed
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    std::fs::write(&config_path, include_str!("../templates/rolewright.yaml"))?;
    eprintln!("Created: {}", config_path.display());

    std::fs::write(&env_path, include_str!("../templates/.env.example"))?;
    eprintln!("Created: {}", env_path.display());

    // Generated artifacts and the local inventory stay out of version control
    let entries = [".env", INVENTORY_DIR, "inventory.yml", "main.yml"];
    if gitignore_path.exists() {
        let existing = std::fs::read_to_string(&gitignore_path)?;
        let missing: Vec<&str> = entries
            .iter()
            .copied()
            .filter(|entry| !existing.lines().any(|line| line.trim_end_matches('/') == *entry))
            .collect();
        if !missing.is_empty() {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&gitignore_path)?;
            writeln!(file, "\n# rolewright")?;
            for entry in missing {
                writeln!(file, "{entry}")?;
            }
            eprintln!("Updated: {}", gitignore_path.display());
        }
    } else {
        std::fs::write(&gitignore_path, format!("{}\n", entries.join("\n")))?;
        eprintln!("Created: {}", gitignore_path.display());
    }

    eprintln!("\nProject initialized successfully!");
    eprintln!("Next steps:");
    eprintln!("  1. Add roles under roles/<role>/tasks/<platform>.yml");
    eprintln!("  2. Edit rolewright.yaml with your targets");
    eprintln!("  3. Run 'rolewright validate' to check your run file");
    eprintln!("  4. Run 'rolewright plan' to preview the generated playbook");
    eprintln!("  5. Run 'rolewright apply' to install the software");

    Ok(())
}

/// Validate the run file.
fn cmd_validate(config_path: Option<&PathBuf>, show_warnings: bool) -> Result<bool> {
    let config_file = resolve_config_path(config_path)?;
    info!("Validating run file: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(base_dir(&config_file));
    parser.load_dotenv()?;
    let config = parser.load_with_env(&config_file)?;

    let result = ConfigValidator::new().check(&config);

    if result.is_valid() {
        eprintln!("Run file is valid!");
    } else {
        eprintln!("Run file has {} error(s):", result.error_count());
        for error in &result.errors {
            eprintln!("  - {}: {}", error.field, error.message);
        }
    }

    if show_warnings && !result.warnings.is_empty() {
        eprintln!("\nWarnings:");
        for warning in &result.warnings {
            eprintln!("  - {warning}");
        }
    }

    eprintln!("\nRun file summary:");
    eprintln!("  Store: {:?}", config.store.backend);
    eprintln!("  Roles: {}", config.catalog.roles_dir);
    eprintln!("  Executor: {}", config.executor.program);
    eprintln!("  Targets: {}", config.target_names().join(", "));

    Ok(result.is_valid())
}

/// List the capability catalog.
fn cmd_roles(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let (config, base) = load_config(config_path)?;
    let roles_dir = RunConfig::resolve_path(Some(&base), &config.catalog.roles_dir);
    let catalog = CapabilityCatalog::discover(&roles_dir, config.catalog.default_platform)?;

    println!("{}", formatter.format_roles(&catalog));
    Ok(())
}

/// List stored servers.
async fn cmd_servers(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let (config, base) = load_config(config_path)?;
    let store = open_store(&config, &base).await?;

    let servers = list_servers(store.as_ref()).await?;
    println!("{}", formatter.format_servers(&servers));
    Ok(())
}

/// Show recorded installation statuses.
async fn cmd_status(
    config_path: Option<&PathBuf>,
    server: Option<&str>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, base) = load_config(config_path)?;
    let store = open_store(&config, &base).await?;

    let servers = list_servers(store.as_ref()).await?;
    let software = match server {
        Some(name) => {
            let record = first_named(servers.iter().cloned(), name).ok_or_else(|| {
                RolewrightError::Reconcile(ReconcileError::NotFound {
                    name: name.to_string(),
                })
            })?;
            list_software(store.as_ref(), Some(&record.instance_id)).await?
        }
        None => list_software(store.as_ref(), None).await?,
    };

    println!("{}", formatter.format_status(&servers, &software));
    Ok(())
}

/// Show what a run would do.
async fn cmd_plan(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<bool> {
    let (config, base) = load_config(config_path)?;
    let store = open_store(&config, &base).await?;
    let workflow = Workflow::from_config(&config, Some(&base), store.as_ref());

    let mut buckets = DeclaredBuckets::from_declarations(&config.targets);
    let report = workflow
        .run(
            RunRequest {
                targets: &config.targets,
                buckets: &mut buckets,
            },
            RunMode::DryRun,
        )
        .await?;

    println!("{}", formatter.format_report(&report));
    Ok(report.succeeded())
}

/// Install the requested software.
async fn cmd_apply(
    config_path: Option<&PathBuf>,
    auto_approve: bool,
    prompt_buckets: bool,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let (config, base) = load_config(config_path)?;
    let store = open_store(&config, &base).await?;
    let workflow = Workflow::from_config(&config, Some(&base), store.as_ref());

    // Preview first; prompted answers are kept for the real run
    let mut buckets = DeclaredBuckets::from_declarations(&config.targets);
    let preview = if prompt_buckets {
        let mut prompt = PromptBuckets::new(buckets, std::io::stdin().lock(), std::io::stderr());
        let report = workflow
            .run(
                RunRequest {
                    targets: &config.targets,
                    buckets: &mut prompt,
                },
                RunMode::DryRun,
            )
            .await?;
        buckets = prompt.into_declared();
        report
    } else {
        workflow
            .run(
                RunRequest {
                    targets: &config.targets,
                    buckets: &mut buckets,
                },
                RunMode::DryRun,
            )
            .await?
    };

    if preview.status == RunStatus::NothingToDo {
        println!("{}", formatter.format_report(&preview));
        return Ok(true);
    }

    if !auto_approve {
        eprintln!("{}", formatter.format_report(&preview));
        eprint!("Do you want to apply this plan? [y/N]: ");
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            eprintln!("Apply cancelled.");
            return Ok(true);
        }
    }

    let report = workflow
        .run(
            RunRequest {
                targets: &config.targets,
                buckets: &mut buckets,
            },
            RunMode::Apply,
        )
        .await?;

    println!("{}", formatter.format_report(&report));
    Ok(report.succeeded())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the run file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Directory relative paths in the run file are resolved against.
fn base_dir(config_file: &Path) -> PathBuf {
    config_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Loads and validates the run file.
fn load_config(config_path: Option<&PathBuf>) -> Result<(RunConfig, PathBuf)> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading run file from: {}", config_file.display());

    let base = base_dir(&config_file);
    let parser = ConfigParser::new().with_base_path(&base);
    parser.load_dotenv()?;

    let config = parser.load_with_env(&config_file)?;

    let result = ConfigValidator::new().validate(&config)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }

    Ok((config, base))
}

/// Creates the inventory store selected by the run file.
async fn open_store(config: &RunConfig, base: &Path) -> Result<Box<dyn InventoryStore>> {
    let store: Box<dyn InventoryStore> = match config.store.backend {
        StoreBackend::Local => {
            let local = config.store.path.as_deref().map_or_else(
                || LocalInventoryStore::with_base_dir(base.join(INVENTORY_DIR)),
                |path| LocalInventoryStore::with_path(RunConfig::resolve_path(Some(base), path)),
            );
            Box::new(local)
        }
        StoreBackend::Dynamodb => Box::new(DynamoInventoryStore::new(&config.store).await?),
    };

    debug!("Using {} inventory", store.backend_type());
    Ok(store)
}
