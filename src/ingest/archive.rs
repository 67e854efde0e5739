//! Reading source records out of a (possibly gzipped) tar archive.
//!
//! Decompression and tar parsing are blocking, so they run on a blocking
//! worker that hands entries to the async side through a channel with room
//! for a single entry. The worker cannot read ahead of the consumer by more
//! than one entry, and entries come out in archive order.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use futures::stream::{self, Stream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{PipelineError, Result};
use crate::models::SourceRecord;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One archive entry, parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    /// Path of the entry inside the archive.
    pub path: String,
    /// The parsed record, or `None` for an empty payload.
    pub record: Option<SourceRecord>,
}

/// Stream the entries of the archive file at `path`.
pub fn open_archive(path: &Path) -> Result<impl Stream<Item = Result<ArchiveEntry>>> {
    let file = File::open(path)
        .map_err(|e| PipelineError::Archive(format!("{}: {}", path.display(), e)))?;
    Ok(archive_entries(file))
}

/// Stream the entries of a tar archive read from `reader`.
///
/// The reader is gunzipped first when it starts with the gzip magic bytes.
pub fn archive_entries<R>(reader: R) -> impl Stream<Item = Result<ArchiveEntry>>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);

    let worker = tokio::task::spawn_blocking(move || {
        if let Err(e) = scan_archive(reader, &tx) {
            let _ = tx.blocking_send(Err(e));
        }
    });

    stream::try_unfold(
        (rx, Some(worker)),
        |(mut rx, worker): (mpsc::Receiver<Result<ArchiveEntry>>, Option<JoinHandle<()>>)| async move {
            match rx.recv().await {
                Some(Ok(entry)) => Ok(Some((entry, (rx, worker)))),
                Some(Err(e)) => Err(e),
                None => {
                    // Channel closed: the worker is done, surface a panic if it had one.
                    if let Some(worker) = worker {
                        worker.await?;
                    }
                    Ok(None)
                }
            }
        },
    )
}

/// Wrap `reader` in a gzip decoder when the payload is gzipped.
pub fn maybe_gunzip<R>(reader: R) -> std::io::Result<Box<dyn Read + Send>>
where
    R: Read + Send + 'static,
{
    let mut buffered = BufReader::new(reader);
    let is_gzip = buffered.fill_buf()?.starts_with(&GZIP_MAGIC);

    if is_gzip {
        Ok(Box::new(GzDecoder::new(buffered)))
    } else {
        Ok(Box::new(buffered))
    }
}

fn archive_error(e: std::io::Error) -> PipelineError {
    PipelineError::Archive(e.to_string())
}

fn scan_archive<R>(reader: R, tx: &mpsc::Sender<Result<ArchiveEntry>>) -> Result<()>
where
    R: Read + Send + 'static,
{
    let mut archive = tar::Archive::new(maybe_gunzip(reader).map_err(archive_error)?);

    for entry in archive.entries().map_err(archive_error)? {
        let mut entry = entry.map_err(archive_error)?;
        let parsed = read_entry(&mut entry)?;

        // Send blocks until the consumer has taken the previous entry.
        if tx.blocking_send(Ok(parsed)).is_err() {
            tracing::debug!("Archive consumer went away, stopping scan");
            return Ok(());
        }
    }

    Ok(())
}

fn read_entry<R: Read>(entry: &mut tar::Entry<'_, R>) -> Result<ArchiveEntry> {
    let path = entry
        .path()
        .map_err(archive_error)?
        .to_string_lossy()
        .into_owned();

    if !entry.header().entry_type().is_file() {
        return Ok(ArchiveEntry { path, record: None });
    }

    let mut payload = String::new();
    entry.read_to_string(&mut payload).map_err(|e| {
        PipelineError::Archive(format!("failed to read entry '{}': {}", path, e))
    })?;

    if payload.is_empty() {
        tracing::debug!("Skipping empty archive entry {}", path);
        return Ok(ArchiveEntry { path, record: None });
    }

    let record = serde_json::from_str(&payload)
        .map_err(|e| PipelineError::parse_entry("download", &path, e))?;

    Ok(ArchiveEntry {
        path,
        record: Some(record),
    })
}
