//! Newline-delimited JSON intermediate stores.
//!
//! Each step writes one store that the next step reads. Readers are lazy
//! streams that parse one line per pull. Writers stage output in a
//! `.partial` file and only move it into place on [`NdjsonWriter::finish`],
//! so a step that fails never leaves a store the next step would trust.

use std::path::{Path, PathBuf};

use futures::stream::{self, Stream};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

use crate::error::{PipelineError, Result};

/// File name of a step's store inside its step directory.
pub const RECORDS_FILENAME: &str = "records.ndjson";

/// Stream the records of a store in file order.
///
/// Blank lines are skipped. A malformed line ends the stream with a
/// [`PipelineError::Parse`] naming `stage` and the 1-based line number.
pub async fn read_records<T>(
    path: &Path,
    stage: &'static str,
) -> Result<impl Stream<Item = Result<T>>>
where
    T: DeserializeOwned,
{
    let file = File::open(path).await?;
    let lines = BufReader::new(file).lines();

    Ok(stream::try_unfold(
        (lines, 0usize),
        move |(mut lines, mut line_no)| async move {
            while let Some(line) = lines.next_line().await? {
                line_no += 1;
                if line.trim().is_empty() {
                    continue;
                }
                let record = serde_json::from_str(&line)
                    .map_err(|e| PipelineError::parse_line(stage, line_no, e))?;
                return Ok(Some((record, (lines, line_no))));
            }
            Ok::<_, PipelineError>(None)
        },
    ))
}

/// Appends serialized records, one per line.
pub struct NdjsonWriter {
    writer: BufWriter<File>,
    partial_path: PathBuf,
    final_path: PathBuf,
    written: usize,
}

impl NdjsonWriter {
    /// Start a new store at `path`, creating parent directories as needed.
    pub async fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial_path = partial_path(path);
        let file = File::create(&partial_path).await?;

        Ok(Self {
            writer: BufWriter::new(file),
            partial_path,
            final_path: path.to_path_buf(),
            written: 0,
        })
    }

    pub async fn append<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let mut line = serde_json::to_vec(record).map_err(|e| PipelineError::Io(e.into()))?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.written += 1;
        Ok(())
    }

    /// Flush and publish the store under its final name.
    pub async fn finish(mut self) -> Result<PathBuf> {
        self.writer.flush().await?;
        self.writer.get_mut().sync_all().await?;
        tokio::fs::rename(&self.partial_path, &self.final_path).await?;
        tracing::debug!(
            "Wrote {} records to {}",
            self.written,
            self.final_path.display()
        );
        Ok(self.final_path)
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| RECORDS_FILENAME.into());
    name.push(".partial");
    path.with_file_name(name)
}
