use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use dealings_scraper::cancel::{self, Cancel};
use dealings_scraper::config::Settings;
use dealings_scraper::observer::TracingObserver;
use dealings_scraper::{db, pipeline, Extractor, RunReport, SinkDispatcher};

#[derive(Parser)]
#[command(name = "dealings_scraper", about = "Directors' dealings scraper")]
struct Cli {
    /// Settings file (default: ./dealings.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Override the stock code stamped on every record
    #[arg(long, global = true)]
    stock_code: Option<String>,
    /// Override the target page
    #[arg(long, global = true)]
    url: Option<String>,
    /// SQLite store path
    #[arg(long, global = true)]
    sqlite: Option<PathBuf>,
    /// Append records as JSON lines to this file
    #[arg(long, global = true)]
    json: Option<PathBuf>,
    /// Do not print records to stdout
    #[arg(long, global = true)]
    no_console: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the target page and dispatch its dealings
    Run,
    /// Extract dealings from a saved HTML page
    Extract {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Show stored dealings for the stock code
    Show {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

impl Cli {
    fn settings(&self) -> Result<Settings> {
        let mut settings =
            Settings::load(self.config.as_deref()).context("Failed to load settings")?;
        if let Some(code) = &self.stock_code {
            settings.target.stock_code = code.clone();
        }
        if let Some(url) = &self.url {
            settings.target.url = url.clone();
        }
        if let Some(path) = &self.sqlite {
            settings.sinks.sqlite_path = Some(path.clone());
        }
        if let Some(path) = &self.json {
            settings.sinks.json_path = Some(path.clone());
        }
        if self.no_console {
            settings.sinks.console = false;
        }
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = cli.settings()?;

    let result = match &cli.command {
        Commands::Run => {
            let mut sinks = open_sinks(&settings)?;
            let cancel = interrupt_signal();
            let report =
                pipeline::run(&settings, &mut sinks, &TracingObserver, cancel).await?;
            summarize(&report);
            Ok(())
        }
        Commands::Extract { file } => {
            let html = tokio::fs::read_to_string(file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let extractor = Extractor::new(&settings.extract, &settings.target.stock_code)?;
            let mut sinks = open_sinks(&settings)?;
            let mut cancel = interrupt_signal();
            let report = pipeline::process_document(
                &file.display().to_string(),
                &html,
                &extractor,
                &mut sinks,
                &TracingObserver,
                &settings.pipeline,
                &mut cancel,
            )
            .await?;
            summarize(&report);
            Ok(())
        }
        Commands::Show { limit } => show(&settings, *limit),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        info!("Done in {}", format_duration(elapsed));
    }

    result
}

fn open_sinks(settings: &Settings) -> Result<SinkDispatcher> {
    let sinks = SinkDispatcher::from_settings(&settings.sinks, &settings.pipeline)
        .context("Failed to open the dealings store")?;
    if sinks.is_empty() {
        warn!("No sinks configured; records will only be counted");
    } else {
        info!("Sinks: {}", sinks.names().join(", "));
    }
    Ok(sinks)
}

/// Ctrl-C raises the cancellation signal instead of killing the process.
fn interrupt_signal() -> Cancel {
    let (handle, cancel) = cancel::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            handle.cancel();
        }
    });
    cancel
}

fn summarize(report: &RunReport) {
    info!(
        "{}: {} rows, {} records, {} delivered, {} row errors, {} sink errors",
        report.run_id,
        report.rows_seen,
        report.records,
        report.delivered,
        report.row_errors.len(),
        report.sink_errors.len()
    );
    if !report.is_clean() {
        warn!("Run finished with errors; see warnings above");
    }
}

fn show(settings: &Settings, limit: usize) -> Result<()> {
    let Some(path) = &settings.sinks.sqlite_path else {
        bail!("No SQLite store configured (use --sqlite or sinks.sqlite_path)");
    };
    let conn = db::connect(path).with_context(|| format!("Failed to open {}", path.display()))?;
    db::init_schema(&conn)?;

    let code = &settings.target.stock_code;
    let rows = db::fetch_recent(&conn, code, limit)?;
    if rows.is_empty() {
        println!("No dealings stored for {}. Run 'run' first.", code);
        return Ok(());
    }

    println!(
        "{:>5} | {:<12} | {:<24} | {:<10} | {:>14} | {:>10} | {:>9}",
        "#", "Date", "Beneficiary", "Type", "Value", "Volume", "Price"
    );
    println!("{}", "-".repeat(102));
    for r in &rows {
        let d = &r.dealing;
        println!(
            "{:>5} | {:<12} | {:<24} | {:<10} | {:>14} | {:>10} | {:>9.2}",
            r.id,
            truncate(d.date(), 12),
            truncate(d.beneficiary(), 24),
            truncate(d.deal_type(), 10),
            d.value(),
            d.volume(),
            d.price()
        );
    }
    println!("\n{} dealings for {}", rows.len(), code);
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
