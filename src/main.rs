use anyhow::Result;
use arrmigrate::backend::{ApiBackend, MigrationBackend};
use arrmigrate::config::Configuration;
use arrmigrate::http::HttpClient;
use arrmigrate::models::{ConnectionConfig, ImportReport};
use arrmigrate::monitor::{Completion, ImportOutcome, MonitorView, Progress};
use arrmigrate::preview::PreviewFilter;
use arrmigrate::{Wizard, WizardOptions};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Preview rows to list (overrides display.filter)
    #[arg(short, long, value_enum)]
    filter: Option<PreviewFilter>,

    /// Run the import after the preview instead of stopping there
    #[arg(long)]
    execute: bool,

    /// Write the final import report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(&cli.log_level)
        .init();

    info!("Starting arrmigrate v{}", env!("CARGO_PKG_VERSION"));

    let config = Configuration::from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    let options = WizardOptions {
        default_filter: cli.filter.unwrap_or_else(|| config.display.filter()),
        max_errors: config.display.max_errors(),
    };
    let backend = ApiBackend::new(HttpClient::new()?, config.target.clone());
    let mut wizard = Wizard::new(backend, options);

    let result = run(&mut wizard, &config, &cli).await;
    if result.is_err() {
        wizard.abandon().await;
    }
    result
}

async fn run<B: MigrationBackend>(wizard: &mut Wizard<B>, config: &Configuration, cli: &Cli) -> Result<()> {
    wizard.set_source_type(config.source.source_type)?;

    let connection = match config.source.connection()? {
        Some(connection) => connection,
        None => {
            let Some(db_path) = wizard.detect_source_database().await else {
                anyhow::bail!(
                    "No {} database found; set source.dbPath or source.url/apikey",
                    config.source.source_type
                );
            };
            info!("Using detected database {}", db_path.display());
            ConnectionConfig::Sqlite {
                source_type: config.source.source_type,
                db_path,
            }
        }
    };

    wizard.connect(connection).await?;
    wizard.apply_overrides(&config.mapping)?;

    if !wizard.can_request_preview() {
        for folder in wizard.mapping().unmapped_root_folders() {
            warn!("Root folder not mapped: {}", folder.path);
        }
        for profile in wizard.mapping().unmapped_profiles() {
            warn!("Quality profile not mapped: {}", profile.name);
        }
        anyhow::bail!("Mapping incomplete; add entries under mapping in {}", cli.config);
    }

    let session = wizard.request_preview().await?;
    let counts = session.counts();
    println!(
        "{} items: {} new, {} duplicate, {} skip ({} selected)",
        counts.all,
        counts.new,
        counts.duplicate,
        counts.skip,
        session.selection().len()
    );
    for row in session.visible_rows() {
        let year = row.year.map_or_else(String::new, |y| format!(" ({})", y));
        let reason = row.skip_reason.map_or_else(String::new, |r| format!(": {}", r));
        println!("  [{}] {}{}{}", row.status, row.title, year, reason);
    }

    if !cli.execute {
        info!("Dry run finished; pass --execute to import");
        wizard.abandon().await;
        return Ok(());
    }

    if !wizard.can_start_import() {
        anyhow::bail!("Nothing to import");
    }
    wizard.start_import().await?;

    let mut completion = None;
    while completion.is_none() {
        completion = wizard.watch_import(log_progress).await?;
    }
    if let Some(completion) = &completion {
        print_completion(completion, wizard.options().max_errors);
    }

    let report = wizard.handle_done().await?;
    if let (Some(path), Some(report)) = (&cli.report, &report) {
        write_report(path, report)?;
    }
    Ok(())
}

fn log_progress(view: &MonitorView) {
    if let MonitorView::Running { progress, title, subtitle } = view {
        let label = title.as_deref().unwrap_or("Importing");
        match progress {
            Progress::Indeterminate => info!("{}", label),
            Progress::Percent(p) => info!("{}: {:.0}%", label, p),
        }
        if let Some(subtitle) = subtitle {
            info!("  {}", subtitle);
        }
    }
}

fn print_completion(completion: &Completion, max_errors: usize) {
    println!("Import {}", completion.status);
    if let Some(report) = completion.outcome.report() {
        println!(
            "  movies: {} created, {} skipped, {} errored",
            report.movies_created, report.movies_skipped, report.movies_errored
        );
        println!(
            "  series: {} created, {} skipped, {} errored",
            report.series_created, report.series_skipped, report.series_errored
        );
        println!("  files: {} of {} imported", report.files_imported, report.files_total);
    }
    if let ImportOutcome::PartialFailure(_) = completion.outcome {
        let (shown, hidden) = completion.outcome.visible_errors(max_errors);
        println!("  errors:");
        for e in shown {
            println!("    {}", e);
        }
        if hidden > 0 {
            println!("    ... and {} more", hidden);
        }
    }
}

fn write_report(path: &Path, report: &ImportReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    info!("Report written to {}", path.display());
    Ok(())
}
