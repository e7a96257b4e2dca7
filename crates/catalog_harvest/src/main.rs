use std::path::PathBuf;

use anyhow::{Context, Result};
use catalog_harvest::harvest::FetchConfig;
use catalog_harvest::{HarvestConfig, Harvester, JsonSnapshotStore, RateLimitedFetcher, Stage};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "catalog_harvest")]
#[command(about = "Scrape faculties, subjects, courses and class schedules from the course catalogue")]
struct Args {
    /// JSON config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory the record sets are written to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Seconds to wait before every request
    #[arg(long)]
    delay_secs: Option<f64>,

    /// Only crawl these faculty codes (repeatable)
    #[arg(long = "faculty")]
    faculties: Vec<String>,

    /// Start at this stage, loading earlier stages from their snapshots
    #[arg(long, default_value = "faculties")]
    resume_from: Stage,

    /// Fail a stage that skips more than this many items
    #[arg(long)]
    max_skips: Option<usize>,

    /// Record unreachable pages as skips instead of aborting
    #[arg(long)]
    skip_failed_pages: bool,
}

impl Args {
    fn into_config(self) -> Result<(HarvestConfig, Stage)> {
        let mut config = match &self.config {
            Some(path) => HarvestConfig::load_from_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => HarvestConfig::default(),
        };

        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(delay) = self.delay_secs {
            config.request_delay_secs = delay;
        }
        if !self.faculties.is_empty() {
            config.faculty_allow_list = self.faculties;
        }
        if self.max_skips.is_some() {
            config.max_skips_per_stage = self.max_skips;
        }
        config.skip_failed_pages |= self.skip_failed_pages;

        config.validate().context("invalid configuration")?;
        Ok((config, self.resume_from))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("catalog_harvest=info")),
        )
        .init();

    let (config, resume_from) = Args::parse().into_config()?;
    info!(
        catalog = %config.catalog_url,
        delay_secs = config.request_delay_secs,
        faculties = ?config.faculty_allow_list,
        resume_from = %resume_from,
        "Starting catalogue harvest"
    );

    let fetcher = RateLimitedFetcher::with_config(FetchConfig::from(&config))
        .context("building HTTP client")?;
    let store = JsonSnapshotStore::new(config.output_dir.clone());
    let harvester = Harvester::new(fetcher, store, config);

    let output = harvester.run(resume_from).await.context("harvest failed")?;

    let skipped: usize = output.manifest.stages.iter().map(|s| s.report.skipped.len()).sum();
    info!(
        faculties = output.faculties.len(),
        subjects = output.subjects.len(),
        courses = output.courses.len(),
        schedules = output.schedules.len(),
        skipped = skipped,
        "Harvest finished"
    );

    Ok(())
}
