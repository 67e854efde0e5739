//! Writer capability for emission items.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::WriteError;
use crate::models::EmissionItem;

/// Durable sink for emission items.
///
/// `write` takes `&mut self`, so a writer can only ever have one write in
/// flight. A returned `Ok` means the item has been persisted.
#[async_trait]
pub trait ItemWriter: Send {
    async fn write(&mut self, item: &EmissionItem) -> Result<(), WriteError>;

    /// Called once after the last item was written.
    async fn close(&mut self) -> Result<(), WriteError> {
        Ok(())
    }
}

/// Writes items into per-type NDJSON files of a dataset directory:
/// `objects.ndjson`, `relations.ndjson` and `logs.ndjson`.
pub struct DatasetWriter {
    dir: PathBuf,
    objects: BufWriter<File>,
    relations: BufWriter<File>,
    logs: BufWriter<File>,
}

impl DatasetWriter {
    pub const OBJECTS_FILENAME: &'static str = "objects.ndjson";
    pub const RELATIONS_FILENAME: &'static str = "relations.ndjson";
    pub const LOGS_FILENAME: &'static str = "logs.ndjson";

    /// Create the dataset directory and truncate its item files.
    pub async fn create(dir: &Path) -> Result<Self, WriteError> {
        tokio::fs::create_dir_all(dir).await?;

        Ok(Self {
            dir: dir.to_path_buf(),
            objects: open_truncated(&dir.join(Self::OBJECTS_FILENAME)).await?,
            relations: open_truncated(&dir.join(Self::RELATIONS_FILENAME)).await?,
            logs: open_truncated(&dir.join(Self::LOGS_FILENAME)).await?,
        })
    }

    /// Directory the item files live in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn target(&mut self, item: &EmissionItem) -> &mut BufWriter<File> {
        match item {
            EmissionItem::Object(_) => &mut self.objects,
            EmissionItem::Relation(_) => &mut self.relations,
            EmissionItem::Log(_) => &mut self.logs,
        }
    }
}

async fn open_truncated(path: &Path) -> Result<BufWriter<File>, WriteError> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .await?;
    Ok(BufWriter::new(file))
}

#[async_trait]
impl ItemWriter for DatasetWriter {
    async fn write(&mut self, item: &EmissionItem) -> Result<(), WriteError> {
        let mut line = serde_json::to_vec(item)?;
        line.push(b'\n');

        let target = self.target(item);
        target.write_all(&line).await?;
        target.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), WriteError> {
        for writer in [&mut self.objects, &mut self.relations, &mut self.logs] {
            writer.flush().await?;
            writer.get_mut().sync_all().await?;
        }
        Ok(())
    }
}
