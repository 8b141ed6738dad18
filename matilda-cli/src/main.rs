//! MATILDA CLI - Command-line interface for TGD discovery

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::*;
use tracing_subscriber::EnvFilter;

use matilda_core::config::LoggingConfig;
use matilda_core::{
    create_demo_database, write_artifacts, Config, DemoKind, DiscoveryOutcome, DiscoveryRun,
    MatildaError, RunStatus,
};

#[derive(Parser)]
#[command(name = "matilda")]
#[command(about = "MATILDA - Approximate TGD discovery over relational databases")]
#[command(version)]
struct Cli {
    /// Run discovery using the given YAML configuration file
    #[arg(long, value_name = "PATH", conflicts_with_all = ["demo", "database"])]
    config: Option<PathBuf>,

    /// Run against a bundled demo schema
    /// (perfect_database or imperfect_database)
    #[arg(long, value_name = "NAME", conflicts_with = "database")]
    demo: Option<String>,

    /// Shortcut to point at a single SQLite file with default settings
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    // Usage errors are configuration errors (exit 3); clap's default exit
    // code of 2 is reserved for partial success.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
                _ => 3,
            };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };
    match run(cli) {
        Ok(status) => match status {
            RunStatus::Success => ExitCode::SUCCESS,
            RunStatus::Partial => ExitCode::from(2),
        },
        Err(e) => {
            let code = e.exit_code();
            eprintln!("{} {} (exit code {})", "error:".red().bold(), e, code);
            ExitCode::from(code as u8)
        }
    }
}

fn run(cli: Cli) -> Result<RunStatus, MatildaError> {
    let config = resolve_config(&cli)?;
    let _log_guard = init_logging(&config.logging, cli.verbose)?;

    if config.mlflow.use_tracking {
        tracing::info!(
            uri = config.mlflow.tracking_uri.as_deref().unwrap_or(""),
            "experiment tracking requested; delegated to external collector"
        );
    }

    println!(
        "{} Discovering TGDs in {}...",
        "→".blue(),
        config.database.display_name()?
    );
    let discovery = DiscoveryRun::new(config.clone())?;
    let outcome = discovery.execute()?;
    let (json_path, _md_path) = write_artifacts(&outcome, &config.results.output_dir)?;

    print_summary(&outcome);
    println!("{} Results written to {}", "→".blue(), json_path.display());
    Ok(outcome.status)
}

fn resolve_config(cli: &Cli) -> Result<Config, MatildaError> {
    if let Some(path) = &cli.config {
        println!(
            "{} Loading configuration from {}...",
            "→".blue(),
            path.display()
        );
        return Config::from_yaml_file(path);
    }
    if let Some(name) = &cli.demo {
        let kind: DemoKind = name.parse()?;
        let db_path = std::env::temp_dir().join(format!(
            "matilda_{}_{}.db",
            kind.database_name(),
            std::process::id()
        ));
        println!(
            "{} Building demo database {}...",
            "→".blue(),
            db_path.display()
        );
        create_demo_database(kind, &db_path)?;
        return Ok(Config::for_database(&db_path));
    }
    if let Some(path) = &cli.database {
        return Ok(Config::for_database(path));
    }
    Err(MatildaError::Config(
        "one of --config, --demo, or --database is required".to_string(),
    ))
}

fn init_logging(
    logging: &LoggingConfig,
    verbose: bool,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, MatildaError> {
    let directive = if verbose {
        "matilda_core=debug,matilda=debug".to_string()
    } else {
        logging.level.clone()
    };
    let filter = EnvFilter::try_new(&directive)
        .map_err(|e| MatildaError::Config(format!("logging.level: {}", e)))?;

    match &logging.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::never(dir, "matilda.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

fn print_summary(outcome: &DiscoveryOutcome) {
    match outcome.status {
        RunStatus::Success => println!(
            "{} Discovery complete: {} rule(s) in {:.2}s",
            "✓".green(),
            outcome.rules.len(),
            outcome.elapsed.as_secs_f64()
        ),
        RunStatus::Partial => println!(
            "{} Discovery cancelled ({}): {} rule(s) accepted before the stop",
            "!".yellow(),
            outcome
                .trigger
                .map(|t| t.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            outcome.rules.len()
        ),
    }
    for accepted in outcome.rules.iter().take(10) {
        println!(
            "  {}  (support {}, confidence {:.4})",
            accepted.rule.tgd_string().bold(),
            accepted.support,
            accepted.confidence
        );
    }
    if outcome.rules.len() > 10 {
        println!("  … and {} more", outcome.rules.len() - 10);
    }
}
