use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flowctl::client::WorkflowApi;
use flowctl::config::{Config, Instance};
use flowctl::harness::{IntegrationReport, StepStatus};

#[derive(Parser)]
#[command(name = "flowctl")]
#[command(about = "Version control and CI/CD for n8n workflow documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: ./flowctl.toml, then ~/.config/flowctl/config.toml)
    #[arg(long, global = true, env = "FLOWCTL_CONFIG")]
    config: Option<PathBuf>,

    /// Do all local work but never send a request
    #[arg(long, global = true)]
    dry_run: bool,

    /// Print a machine-readable summary on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate workflow files (default: every *.json in the workflows dir)
    Validate {
        files: Vec<PathBuf>,
    },
    /// Export workflows from the instance into local files
    Export {
        /// Workflow id to export (repeatable; default: all)
        #[arg(long = "id")]
        ids: Vec<String>,
        /// Output directory (default: the workflows dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Create or update workflows on the instance
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Send documents even when they fail validation
        #[arg(long)]
        skip_validation: bool,
    },
    /// Create, verify, activate and delete a workflow on the test instance
    IntegrationTest {
        /// Workflow file (default: first file in the workflows dir)
        file: Option<PathBuf>,
    },
    /// Offline suite: validation, dry-run deploy and a mock-server round trip
    Test {
        files: Vec<PathBuf>,
    },
    /// Run the mock API server until Ctrl+C
    MockServer {
        #[arg(short, long, default_value = "5678")]
        port: u16,
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Workflow file to preload (repeatable)
        #[arg(long)]
        seed: Vec<PathBuf>,
        /// Accept only this API key (default: any key except the sentinel)
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr; stdout carries summaries
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "flowctl=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        cmd_completions(shell)?;
        return Ok(ExitCode::SUCCESS);
    }

    let json = cli.json;
    match run(cli).await {
        Ok(true) => Ok(ExitCode::SUCCESS),
        Ok(false) => Ok(ExitCode::FAILURE),
        Err(e) if json => {
            let body = match e.downcast_ref::<flowctl::Error>() {
                Some(err) => err.to_json(),
                None => serde_json::json!({
                    "success": false,
                    "error": {"code": "ERROR", "message": e.to_string()}
                }),
            };
            print_json(&body)?;
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e),
    }
}

/// Run the selected command. `Ok(false)` means it ran but recorded failures.
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if cli.dry_run {
        config.dry_run = true;
    }
    let json = cli.json;

    let passed = match cli.command {
        Commands::Validate { files } => cmd_validate(&config, files, json)?,
        Commands::Export { ids, output } => cmd_export(&config, ids, output, json).await?,
        Commands::Import {
            files,
            skip_validation,
        } => cmd_import(&config, &files, skip_validation, json).await?,
        Commands::IntegrationTest { file } => cmd_integration_test(&config, file, json).await?,
        Commands::Test { files } => cmd_test(&config, files, json).await?,
        Commands::MockServer {
            port,
            host,
            seed,
            api_key,
        } => cmd_mock_server(&host, port, &seed, api_key).await?,
        Commands::Completions { .. } => true,
    };

    Ok(passed)
}

/// Shell completion variants
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

impl From<CompletionShell> for Shell {
    fn from(shell: CompletionShell) -> Self {
        match shell {
            CompletionShell::Bash => Shell::Bash,
            CompletionShell::Zsh => Shell::Zsh,
            CompletionShell::Fish => Shell::Fish,
            CompletionShell::PowerShell => Shell::PowerShell,
            CompletionShell::Elvish => Shell::Elvish,
        }
    }
}

fn cmd_completions(shell: CompletionShell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    let shell: Shell = shell.into();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Explicit files, or every workflow file in the configured directory.
fn resolve_files(config: &Config, files: Vec<PathBuf>) -> anyhow::Result<Vec<PathBuf>> {
    if !files.is_empty() {
        return Ok(files);
    }
    let found = flowctl::workflow::discover_workflow_files(&config.workflows_dir)?;
    if found.is_empty() {
        anyhow::bail!(
            "No workflow files found in {}",
            config.workflows_dir.display()
        );
    }
    Ok(found)
}

/// API for the given instance, or a recorder in dry-run mode.
fn remote_api(config: &Config, instance: Instance) -> anyhow::Result<Box<dyn WorkflowApi>> {
    Ok(flowctl::client::connect(config, instance)?)
}

fn print_failures(failures: &[flowctl::sync::ItemFailure]) {
    for failure in failures {
        println!("  ✗ {}: {}", failure.item, failure.message);
    }
}

fn print_integration(report: &IntegrationReport) {
    println!("Integration test: {}", report.workflow);
    for step in &report.steps {
        let mark = match step.status {
            StepStatus::Passed => "✓",
            StepStatus::Warning => "!",
            StepStatus::Failed => "✗",
            StepStatus::Skipped => "-",
        };
        match &step.detail {
            Some(detail) => println!("  {} {:<10} {}", mark, step.step, detail),
            None => println!("  {} {}", mark, step.step),
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_validate(config: &Config, files: Vec<PathBuf>, json: bool) -> anyhow::Result<bool> {
    use flowctl::workflow::validate_paths;

    let paths = resolve_files(config, files)?;
    let summary = validate_paths(&paths);

    if json {
        print_json(&summary)?;
        return Ok(summary.all_passed());
    }

    for file in &summary.reports {
        let mark = if file.report.passed() { "✓" } else { "✗" };
        println!("{} {}", mark, file.path.display());
        for error in &file.report.errors {
            println!("    error: {}", error);
        }
        for warning in &file.report.warnings {
            println!("    warning: {}", warning);
        }
    }
    println!();
    println!(
        "Validated {} file(s): {} passed, {} failed, {} warning(s)",
        summary.files, summary.passed, summary.failed, summary.warnings
    );

    Ok(summary.all_passed())
}

async fn cmd_export(
    config: &Config,
    ids: Vec<String>,
    output: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<bool> {
    use flowctl::sync::Exporter;

    let api = remote_api(config, Instance::Primary)?;
    let output_dir = output.unwrap_or_else(|| config.workflows_dir.clone());
    let exporter = Exporter::new(api.as_ref(), &output_dir).with_dry_run(config.dry_run);

    let ids = (!ids.is_empty()).then_some(ids);
    let summary = exporter.export(ids.as_deref()).await?;

    if json {
        print_json(&summary)?;
        return Ok(summary.all_succeeded());
    }

    let label = if config.dry_run { "Would write" } else { "Exported" };
    for path in &summary.written {
        println!("  {}: {}", label, path.display());
    }
    print_failures(&summary.failures);
    println!();
    println!(
        "✓ Exported {} workflow(s) to {} ({} failed)",
        summary.exported,
        output_dir.display(),
        summary.failed
    );

    Ok(summary.all_succeeded())
}

async fn cmd_import(
    config: &Config,
    files: &[PathBuf],
    skip_validation: bool,
    json: bool,
) -> anyhow::Result<bool> {
    use flowctl::sync::Deployer;

    let api = remote_api(config, Instance::Primary)?;
    let summary = Deployer::new(api.as_ref())
        .with_validation(!skip_validation)
        .deploy(files)
        .await;

    if json {
        print_json(&summary)?;
        return Ok(summary.all_succeeded());
    }

    for record in &summary.records {
        match &record.id {
            Some(id) => println!("  {} {} (id {})", record.action, record.path.display(), id),
            None => println!("  {} {}", record.action, record.path.display()),
        }
    }
    print_failures(&summary.failures);
    println!();
    println!(
        "Imported {} workflow(s): {} created, {} updated, {} failed",
        summary.imported, summary.created, summary.updated, summary.failed
    );

    Ok(summary.all_succeeded())
}

async fn cmd_integration_test(
    config: &Config,
    file: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<bool> {
    use flowctl::harness::run_integration_test;
    use flowctl::workflow::parse_document_file;

    if config.dry_run {
        println!("Dry run: integration test against the test instance skipped");
        return Ok(true);
    }

    let api = remote_api(config, Instance::Test)?;
    let path = match file {
        Some(path) => path,
        None => resolve_files(config, Vec::new())?.remove(0),
    };
    let document = parse_document_file(&path)?;
    let report = run_integration_test(api.as_ref(), &document).await;

    if json {
        print_json(&report)?;
    } else {
        print_integration(&report);
    }
    Ok(report.passed())
}

async fn cmd_test(config: &Config, files: Vec<PathBuf>, json: bool) -> anyhow::Result<bool> {
    use flowctl::harness::run_suite;

    let paths = resolve_files(config, files)?;
    let report = run_suite(&paths).await?;

    if json {
        print_json(&report)?;
        return Ok(report.passed());
    }

    println!(
        "Validation: {} passed, {} failed, {} warning(s)",
        report.validation.passed, report.validation.failed, report.validation.warnings
    );
    for file in report.validation.reports.iter().filter(|r| !r.report.passed()) {
        println!("  ✗ {}", file.path.display());
        for error in &file.report.errors {
            println!("    error: {}", error);
        }
    }
    println!(
        "Dry-run deploy: {} created, {} updated, {} failed",
        report.deploy.created, report.deploy.updated, report.deploy.failed
    );
    match &report.integration {
        Some(integration) => print_integration(integration),
        None => println!("Integration test: skipped (no valid workflow)"),
    }
    println!();
    if report.passed() {
        println!("✓ All checks passed");
    } else {
        println!("✗ Some checks failed");
    }

    Ok(report.passed())
}

async fn cmd_mock_server(
    host: &str,
    port: u16,
    seed: &[PathBuf],
    api_key: Option<String>,
) -> anyhow::Result<bool> {
    use flowctl::mock::{create_router, serve, MockAuthConfig, MockStore};
    use flowctl::workflow::parse_document_file;
    use tokio::sync::RwLock;

    let mut store = MockStore::new();
    let documents = seed
        .iter()
        .map(|p| parse_document_file(Path::new(p)))
        .collect::<flowctl::Result<Vec<_>>>()?;
    store.seed(documents)?;
    let seeded = store.len();

    let auth = match api_key {
        Some(key) => MockAuthConfig::requiring(key),
        None => MockAuthConfig::default(),
    };
    let router = create_router(Arc::new(RwLock::new(store)), auth);

    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    let addr = listener.local_addr()?;

    println!("Mock API server running on http://{}", addr);
    println!();
    println!("Seeded workflows: {}", seeded);
    println!();
    println!("Endpoints:");
    println!("  GET    /healthz");
    println!("  GET    /api/v1/workflows");
    println!("  POST   /api/v1/workflows");
    println!("  GET    /api/v1/workflows/{{id}}");
    println!("  PUT    /api/v1/workflows/{{id}}");
    println!("  DELETE /api/v1/workflows/{{id}}");
    println!("  POST   /api/v1/workflows/{{id}}/activate");
    println!("  POST   /api/v1/workflows/{{id}}/deactivate");
    println!();
    println!("Press Ctrl+C to stop");

    serve(listener, router, shutdown_signal()).await?;

    println!("Server stopped.");
    Ok(true)
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    println!("\nShutting down gracefully...");
}
