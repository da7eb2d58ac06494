//! One harvest run: browser up, harvest, browser down, export.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use article_harvest::{HarvestEngine, HarvestReport};

use crate::chromium::ChromiumSurface;
use crate::export;
use crate::settings::Settings;
use crate::transfer::HttpAssetTransfer;

/// File name of the export inside a run directory.
pub const RESULTS_FILE: &str = "results.csv";

/// Lowercase ASCII alphanumerics, everything else collapsed into single dashes.
pub fn query_slug(query: &str) -> String {
    let mut slug = String::with_capacity(query.len());
    for c in query.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "query".to_string()
    } else {
        slug.to_string()
    }
}

/// `<root>/<query-slug>-<timestamp>`
pub fn run_dir(root: &Path, query: &str, at: DateTime<Local>) -> PathBuf {
    root.join(format!("{}-{}", query_slug(query), at.format("%Y%m%d-%H%M%S")))
}

/// Write the report's records into the run directory.
pub fn export_report(run_dir: &Path, report: &HarvestReport) -> Result<PathBuf> {
    let path = run_dir.join(RESULTS_FILE);
    export::write_records(&path, &report.records)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[derive(Debug)]
pub struct RunSummary {
    pub report: HarvestReport,
    pub run_dir: PathBuf,
    pub export_path: PathBuf,
}

/// Harvest `query` over the last `months` months and export the records.
pub async fn run(settings: &Settings, query: &str, months: u32) -> Result<RunSummary> {
    let run_dir = run_dir(&settings.output_root, query, Local::now());
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create run directory {}", run_dir.display()))?;
    tracing::info!("run directory {}", run_dir.display());

    let config = settings.harvest_config(&run_dir);
    let surface = ChromiumSurface::launch(settings).await?;
    let assets = HttpAssetTransfer::new(Duration::from_millis(settings.wait_timeout_ms));
    let engine = HarvestEngine::new(surface, assets, config);

    let outcome = match engine.open_session().await {
        Ok(()) => engine.harvest(query, months).await,
        Err(e) => Err(e),
    };

    if let Err(e) = engine.into_surface().shutdown().await {
        tracing::warn!("browser did not shut down cleanly: {e:#}");
    }

    let report = outcome.with_context(|| format!("harvest for {query:?} failed"))?;
    let export_path = export_report(&run_dir, &report)?;
    tracing::info!(
        "wrote {} records to {}",
        report.records.len(),
        export_path.display()
    );

    Ok(RunSummary {
        report,
        run_dir,
        export_path,
    })
}
