//! Ingestion: archive entries to the download step's record store.

mod archive;
mod fetch;

pub use archive::{archive_entries, maybe_gunzip, open_archive, ArchiveEntry};
pub use fetch::{ArchiveFetcher, HttpArchiveFetcher};

use std::path::Path;

use futures::{Stream, TryStreamExt};
use indicatif::ProgressBar;

use crate::error::Result;
use crate::store::NdjsonWriter;

/// Statistics collected during ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Archive entries seen.
    pub entries: usize,
    /// Records written to the store.
    pub records: usize,
    /// Entries skipped because their payload was empty.
    pub empty: usize,
    /// Bytes fetched from the remote archive (0 for local archives).
    pub bytes_fetched: u64,
}

/// Fetch the archive, then ingest it into `output`.
///
/// The archive is spooled to a temporary file inside `spool_dir`, which is
/// removed once ingestion finishes or fails.
pub async fn ingest_remote(
    fetcher: &dyn ArchiveFetcher,
    spool_dir: &Path,
    output: &Path,
    pb: &ProgressBar,
) -> Result<IngestStats> {
    tokio::fs::create_dir_all(spool_dir).await?;
    let spool = tempfile::Builder::new()
        .prefix("archive-")
        .suffix(".tar.gz")
        .tempfile_in(spool_dir)?;

    pb.set_message(format!("fetching {}", fetcher.location()));
    let bytes_fetched = fetcher.fetch_to(spool.path()).await?;

    let mut stats = ingest_file(spool.path(), output, pb).await?;
    stats.bytes_fetched = bytes_fetched;
    Ok(stats)
}

/// Ingest a local `.tar` or `.tar.gz` archive into `output`.
pub async fn ingest_file(archive: &Path, output: &Path, pb: &ProgressBar) -> Result<IngestStats> {
    tracing::info!("Reading archive {}", archive.display());
    let entries = open_archive(archive)?;
    ingest_entries(entries, output, pb).await
}

/// Append every non-empty entry's record to the store at `output`, in order.
///
/// The store is only published when every entry was read and parsed.
pub async fn ingest_entries<S>(entries: S, output: &Path, pb: &ProgressBar) -> Result<IngestStats>
where
    S: Stream<Item = Result<ArchiveEntry>>,
{
    futures::pin_mut!(entries);

    let mut writer = NdjsonWriter::create(output).await?;
    let mut stats = IngestStats::default();
    pb.set_message("reading entries");

    while let Some(entry) = entries.try_next().await? {
        stats.entries += 1;
        pb.inc(1);
        match entry.record {
            Some(record) => {
                writer.append(&record).await?;
                stats.records += 1;
            }
            None => stats.empty += 1,
        }
    }

    writer.finish().await?;
    tracing::info!(
        "Ingested {} records from {} entries ({} empty)",
        stats.records,
        stats.entries,
        stats.empty
    );
    Ok(stats)
}
