use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

use job_harvest::db;
use job_harvest::pagination::PaginationController;
use job_harvest::session::WebDriverSession;
use job_harvest::strategy::Strategy;
use job_harvest::{ExtractionOrchestrator, SiteConfig};

#[derive(Parser)]
#[command(name = "job_harvest", about = "Extract job listings from rendered career sites")]
struct Cli {
    /// SQLite database path
    #[arg(long, global = true, default_value = db::DEFAULT_DB_PATH)]
    db: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape each site file in turn and store the records
    Run {
        /// Site descriptor (TOML), repeatable
        #[arg(short, long = "site", required = true)]
        sites: Vec<PathBuf>,
        /// Override the site's page budget
        #[arg(short = 'n', long)]
        max_pages: Option<usize>,
        /// Override the wait timeout, in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Fetch per-listing details where the site supports it
        #[arg(long)]
        details: bool,
        /// WebDriver endpoint (e.g. http://localhost:9515)
        #[arg(long)]
        webdriver: Option<String>,
        /// Show the browser window
        #[arg(long)]
        headful: bool,
        /// Print records as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Validate site files without opening a browser
    Check {
        #[arg(short, long = "site", required = true)]
        sites: Vec<PathBuf>,
    },
    /// Show per-company counts
    Stats,
}

struct Overrides {
    max_pages: Option<usize>,
    timeout: Option<u64>,
    details: bool,
    webdriver: Option<String>,
    headful: bool,
}

impl Overrides {
    fn apply(&self, site: &mut SiteConfig) -> Result<()> {
        if let Some(n) = self.max_pages {
            site.run.max_pages = n;
        }
        if let Some(t) = self.timeout {
            site.run.timeout_secs = t;
        }
        if self.details {
            site.run.fetch_full_details = true;
        }
        if let Some(url) = &self.webdriver {
            site.session.webdriver_url = url.clone();
        }
        if self.headful {
            site.session.headless = false;
        }
        site.run.validate().context("Invalid run options")?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            sites,
            max_pages,
            timeout,
            details,
            webdriver,
            headful,
            json,
        } => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let overrides = Overrides {
                max_pages,
                timeout,
                details,
                webdriver,
                headful,
            };

            let pb = ProgressBar::new(sites.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .context("Invalid progress template")?
                    .progress_chars("#>-"),
            );

            let mut failed = 0;
            for path in &sites {
                pb.set_message(path.display().to_string());
                match run_site(&conn, path, &overrides, json).await {
                    Ok(line) => pb.println(line),
                    Err(e) => {
                        error!("{}: {:#}", path.display(), e);
                        failed += 1;
                    }
                }
                pb.inc(1);
            }
            pb.finish_and_clear();

            if failed > 0 {
                anyhow::bail!("{} of {} sites failed", failed, sites.len());
            }
            Ok(())
        }
        Commands::Check { sites } => {
            for path in &sites {
                let site = SiteConfig::load(path)
                    .with_context(|| format!("Invalid site file {}", path.display()))?;
                let names: Vec<&str> = site.strategies.iter().map(|s| s.name()).collect();
                println!(
                    "{}: {} start URL(s), strategies [{}], max {} pages",
                    site.company,
                    site.start_urls.len(),
                    names.join(" -> "),
                    site.run.max_pages
                );
            }
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let s = db::fetch_stats(&conn)?;
            println!("Jobs: {}", s.jobs);
            println!("Runs: {}", s.runs);
            if !s.companies.is_empty() {
                println!();
                println!("{:<28} | {:>6} | {:<22} | {:<22}", "Company", "Jobs", "Last run", "Stopped by");
                println!("{}", "-".repeat(86));
                for c in &s.companies {
                    println!(
                        "{:<28} | {:>6} | {:<22} | {:<22}",
                        truncate(&c.company, 28),
                        c.jobs,
                        c.last_run.as_deref().map(|t| truncate(t, 19)).unwrap_or_else(|| "-".into()),
                        c.last_reason.as_deref().unwrap_or("-"),
                    );
                }
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Scrape one site end to end. Returns the summary line to print.
async fn run_site(conn: &rusqlite::Connection, path: &Path, overrides: &Overrides, json: bool) -> Result<String> {
    let mut site =
        SiteConfig::load(path).with_context(|| format!("Invalid site file {}", path.display()))?;
    overrides.apply(&mut site)?;

    let started = Utc::now();
    info!("Scraping {} ({} start URLs)", site.company, site.start_urls.len());
    let session = WebDriverSession::connect(&site.session)
        .await
        .context("Failed to start browser session")?;
    let mut paginator = PaginationController::new(
        site.pagination.clone(),
        site.run.timeout(),
        site.run.poll_interval(),
    );
    let outcome = ExtractionOrchestrator::from_site(&site)
        .run(session, &mut paginator, &site.start_urls)
        .await;

    let saved = db::save_run(conn, &site.company, &outcome, started)?;
    if json {
        for record in &outcome.records {
            println!("{}", serde_json::to_string(record)?);
        }
    }

    let mut line = format!(
        "{}: {} records ({} new, {} updated) over {} pages, stopped by {}",
        site.company,
        outcome.records.len(),
        saved.inserted,
        saved.updated,
        outcome.pages,
        outcome.reason
    );
    if let Some(e) = &outcome.error {
        line.push_str(&format!(" ({})", e));
    }
    Ok(line)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
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
