//! Step layout and orchestration.
//!
//! Download and enrich each own a directory under the data dir and publish
//! their records there as `records.ndjson`. Enrich reads the download store,
//! transform reads the enrich store and writes the dataset into the output
//! directory.

use std::fmt;
use std::path::{Path, PathBuf};

use indicatif::ProgressBar;

use crate::config::Settings;
use crate::emit::{run_transform, DatasetWriter, EmitStats, ItemWriter};
use crate::enrich::{run_enrich, EnrichStats};
use crate::error::{PipelineError, Result};
use crate::geocode::{Geocoder, HttpGeocoder};
use crate::ingest::{ingest_file, ingest_remote, HttpArchiveFetcher, IngestStats};
use crate::store::RECORDS_FILENAME;

/// A pipeline step, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Download,
    Enrich,
    Transform,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::Download, Step::Enrich, Step::Transform];

    /// Name of the step, also used as its directory name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Download => "download",
            Step::Enrich => "enrich",
            Step::Transform => "transform",
        }
    }

    /// Whether the step publishes a record store for the next step.
    pub fn publishes_records(&self) -> bool {
        !matches!(self, Step::Transform)
    }

    /// The step whose store this step reads, if any.
    pub fn previous(&self) -> Option<Step> {
        match self {
            Step::Download => None,
            Step::Enrich => Some(Step::Download),
            Step::Transform => Some(Step::Enrich),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistics for a full run.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub ingest: IngestStats,
    pub enrich: EnrichStats,
    pub emit: EmitStats,
}

/// Runs steps against the directory layout described by `Settings`.
pub struct Pipeline<'a> {
    settings: &'a Settings,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline over the layout described by `settings`.
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Directory `step` writes into.
    ///
    /// Transform writes straight into the configured output directory.
    pub fn step_dir(&self, step: Step) -> PathBuf {
        match step {
            Step::Transform => self.settings.output_dir.clone(),
            _ => self.settings.data_dir.join(step.as_str()),
        }
    }

    /// Path of the record store published by `step`, if it publishes one.
    pub fn store_path(&self, step: Step) -> Option<PathBuf> {
        step.publishes_records()
            .then(|| self.step_dir(step).join(RECORDS_FILENAME))
    }

    fn published_store(&self, step: Step) -> Result<PathBuf> {
        self.store_path(step).ok_or_else(|| {
            PipelineError::Config(format!("step '{}' publishes no record store", step))
        })
    }

    /// Store that `step` reads from. Fails when the previous step never ran.
    fn input_for(&self, step: Step) -> Result<PathBuf> {
        let previous = step.previous().ok_or_else(|| {
            PipelineError::Config(format!("step '{}' has no input store", step))
        })?;
        let path = self.published_store(previous)?;
        if !path.is_file() {
            return Err(PipelineError::Config(format!(
                "no {} output at {}; run '{}' first",
                previous,
                path.display(),
                previous
            )));
        }
        Ok(path)
    }

    /// Build the HTTP geocoder. Fails when no geocoder URL is configured.
    pub fn geocoder(&self) -> Result<HttpGeocoder> {
        let url = self.settings.geocoder_url.as_deref().ok_or_else(|| {
            PipelineError::Config(
                "no geocoder URL configured (set geocoder_url, EMIGRANT_GEOCODER_URL or --geocoder-url)"
                    .to_string(),
            )
        })?;
        HttpGeocoder::new(url, &self.settings.user_agent, self.settings.timeout())
    }

    /// Build the fetcher for the configured archive URL.
    pub fn fetcher(&self) -> Result<HttpArchiveFetcher> {
        HttpArchiveFetcher::new(
            self.settings.data_url.as_str(),
            &self.settings.user_agent,
            self.settings.timeout(),
        )
    }

    /// Open the dataset writer over the transform step's directory.
    pub async fn dataset_writer(&self) -> Result<DatasetWriter> {
        Ok(DatasetWriter::create(&self.step_dir(Step::Transform)).await?)
    }

    /// Ingest the local `archive`, or fetch the configured one when `None`.
    pub async fn download(&self, archive: Option<&Path>, pb: &ProgressBar) -> Result<IngestStats> {
        let output = self.published_store(Step::Download)?;
        match archive {
            Some(path) => ingest_file(path, &output, pb).await,
            None => {
                let fetcher = self.fetcher()?;
                ingest_remote(&fetcher, &self.step_dir(Step::Download), &output, pb).await
            }
        }
    }

    /// Enrich the download store into the enrich store.
    pub async fn enrich(&self, geocoder: &dyn Geocoder, pb: &ProgressBar) -> Result<EnrichStats> {
        let input = self.input_for(Step::Enrich)?;
        run_enrich(
            &input,
            &self.published_store(Step::Enrich)?,
            geocoder,
            self.settings.progress_interval,
            pb,
        )
        .await
    }

    /// Emit the enrich store through `writer`.
    pub async fn transform(
        &self,
        writer: &mut dyn ItemWriter,
        pb: &ProgressBar,
    ) -> Result<EmitStats> {
        let input = self.input_for(Step::Transform)?;
        run_transform(&input, writer, pb).await
    }

    /// Run every step in order, stopping at the first failure.
    pub async fn run_all(
        &self,
        archive: Option<&Path>,
        geocoder: &dyn Geocoder,
        writer: &mut dyn ItemWriter,
        pb: &ProgressBar,
    ) -> Result<RunStats> {
        let mut stats = RunStats::default();
        for step in Step::ALL {
            tracing::info!("Starting step '{}'", step);
            pb.set_prefix(step.as_str());
            match step {
                Step::Download => stats.ingest = self.download(archive, pb).await?,
                Step::Enrich => stats.enrich = self.enrich(geocoder, pb).await?,
                Step::Transform => stats.emit = self.transform(writer, pb).await?,
            }
        }
        Ok(stats)
    }
}
