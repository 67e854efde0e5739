//! Step commands and their console summaries.

use std::path::Path;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use super::icons::{dim_arrow, error, info, success, warn};
use crate::config::Settings;
use crate::emit::EmitStats;
use crate::enrich::EnrichStats;
use crate::ingest::IngestStats;
use crate::pipeline::{Pipeline, Step};

fn create_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {prefix:.bold} {pos} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Run `f` under a spinner, reporting failure before handing the error back.
async fn with_spinner<T, F, Fut>(step: Step, f: F) -> anyhow::Result<T>
where
    F: FnOnce(ProgressBar) -> Fut,
    Fut: std::future::Future<Output = crate::error::Result<T>>,
{
    let pb = create_spinner();
    pb.set_prefix(step.as_str());
    let result = f(pb.clone()).await;
    pb.finish_and_clear();

    result.map_err(|e| {
        eprintln!("{} {} failed: {}", error(), step, e);
        e.into()
    })
}

pub async fn cmd_download(settings: &Settings, archive: Option<&Path>) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(settings);
    match archive {
        Some(path) => println!("{} Reading archive {}", info(), path.display()),
        None => println!("{} Fetching {}", info(), settings.data_url),
    }

    let p = &pipeline;
    let stats = with_spinner(Step::Download, |pb| async move {
        p.download(archive, &pb).await
    })
    .await?;

    print_ingest_summary(&stats);
    if let Some(store) = pipeline.store_path(Step::Download) {
        println!("  {} {}", dim_arrow(), store.display());
    }
    Ok(())
}

pub async fn cmd_enrich(settings: &Settings) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(settings);
    let geocoder = pipeline.geocoder()?;
    println!(
        "{} Enriching records using {}",
        info(),
        settings.geocoder_url.as_deref().unwrap_or_default()
    );

    let (p, geocoder) = (&pipeline, &geocoder);
    let stats = with_spinner(Step::Enrich, |pb| async move {
        p.enrich(geocoder, &pb).await
    })
    .await?;

    print_enrich_summary(&stats);
    Ok(())
}

pub async fn cmd_transform(settings: &Settings) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(settings);
    let mut writer = pipeline.dataset_writer().await?;
    println!("{} Writing dataset to {}", info(), writer.dir().display());

    let (p, writer) = (&pipeline, &mut writer);
    let stats = with_spinner(Step::Transform, |pb| async move {
        p.transform(writer, &pb).await
    })
    .await?;

    print_emit_summary(&stats);
    Ok(())
}

pub async fn cmd_run(settings: &Settings, archive: Option<&Path>) -> anyhow::Result<()> {
    // Fail before downloading anything if enrichment could never start
    Pipeline::new(settings).geocoder()?;

    cmd_download(settings, archive).await?;
    cmd_enrich(settings).await?;
    cmd_transform(settings).await
}

pub fn cmd_config(settings: &Settings) -> anyhow::Result<()> {
    print!("{}", settings.to_toml()?);
    Ok(())
}

fn print_ingest_summary(stats: &IngestStats) {
    println!("\n{} Download complete:", success());
    println!("  Archive entries:  {}", style(stats.entries).dim());
    println!("  Records written:  {}", style(stats.records).green());
    if stats.empty > 0 {
        println!("  Empty entries:    {}", style(stats.empty).yellow());
    }
    if stats.bytes_fetched > 0 {
        println!("  Bytes fetched:    {}", style(stats.bytes_fetched).dim());
    }
}

fn print_enrich_summary(stats: &EnrichStats) {
    println!("\n{} Enrichment complete:", success());
    println!("  Records read:     {}", style(stats.read).dim());
    println!("  Records written:  {}", style(stats.written).green());
    if stats.filtered > 0 {
        println!("  Records filtered: {}", style(stats.filtered).dim());
    }
    println!("  Geocoded:         {}", style(stats.found).green());
    if stats.not_found > 0 {
        println!(
            "  {} Not geocoded:   {}",
            warn(),
            style(stats.not_found).yellow()
        );
    }
    if stats.no_address > 0 {
        println!("  Without address:  {}", style(stats.no_address).dim());
    }
}

fn print_emit_summary(stats: &EmitStats) {
    println!("\n{} Transform complete:", success());
    println!("  Documents:        {}", style(stats.objects).green());
    println!("  Relations:        {}", style(stats.relations).green());
    if stats.logs > 0 {
        println!(
            "  {} Geocode failures: {}",
            warn(),
            style(stats.logs).yellow()
        );
    }
}
