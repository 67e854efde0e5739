//! Transform/emit: enriched records to document, relation and log items.

mod transform;
mod writer;

pub use transform::{derive_items, RecordItems};
pub use writer::{DatasetWriter, ItemWriter};

use std::path::Path;

use futures::future;
use futures::stream::{self, Stream, TryStreamExt};
use indicatif::ProgressBar;

use crate::error::{PipelineError, Result};
use crate::models::{EmissionItem, EnrichedRecord};
use crate::store::read_records;

/// Statistics collected during emission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitStats {
    pub objects: usize,
    pub relations: usize,
    pub logs: usize,
}

impl EmitStats {
    fn count(&mut self, item: &EmissionItem) {
        match item {
            EmissionItem::Object(_) => self.objects += 1,
            EmissionItem::Relation(_) => self.relations += 1,
            EmissionItem::Log(_) => self.logs += 1,
        }
    }

    /// Number of items delivered, of every kind.
    pub fn total(&self) -> usize {
        self.objects + self.relations + self.logs
    }
}

/// Flatten enriched records into the ordered stream of emission items.
///
/// Records without an export document produce nothing. Each record's items
/// are contiguous: its document, then its relation or log.
pub fn emission_items<S>(records: S) -> impl Stream<Item = Result<EmissionItem>>
where
    S: Stream<Item = Result<EnrichedRecord>>,
{
    records
        .try_filter(|enriched| future::ready(enriched.record.has_export_document()))
        .map_ok(|enriched| {
            stream::iter(
                derive_items(&enriched)
                    .into_items()
                    .map(Ok::<_, PipelineError>),
            )
        })
        .try_flatten()
}

/// Emit every record of the store at `input` through `writer`.
pub async fn run_transform(
    input: &Path,
    writer: &mut dyn ItemWriter,
    pb: &ProgressBar,
) -> Result<EmitStats> {
    tracing::info!("Transforming {}", input.display());
    let records = read_records::<EnrichedRecord>(input, "transform").await?;
    deliver(emission_items(records), writer, pb).await
}

/// Hand items to `writer` one at a time, in order.
///
/// Each write completes before the next item is pulled. The first failure
/// stops delivery and is returned; nothing after it is attempted.
pub async fn deliver<S>(
    items: S,
    writer: &mut dyn ItemWriter,
    pb: &ProgressBar,
) -> Result<EmitStats>
where
    S: Stream<Item = Result<EmissionItem>>,
{
    futures::pin_mut!(items);
    let mut stats = EmitStats::default();

    while let Some(item) = items.try_next().await? {
        if let Err(e) = writer.write(&item).await {
            tracing::error!(
                "Writer rejected {} for record {} after {} items: {}",
                item.kind(),
                item.record_id(),
                stats.total(),
                e
            );
            return Err(PipelineError::Write(e));
        }
        stats.count(&item);
        pb.inc(1);
    }

    writer.close().await?;
    tracing::info!(
        "Emitted {} objects, {} relations, {} logs",
        stats.objects,
        stats.relations,
        stats.logs
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WriteError;
    use crate::models::{GeocodeMatch, GeocodeOutcome, NormalizedFields, SourceRecord};
    use async_trait::async_trait;
    use serde_json::json;

    /// Records items and rejects the write with the given 1-based index.
    #[derive(Default)]
    struct RecordingWriter {
        items: Vec<EmissionItem>,
        attempts: usize,
        fail_at: Option<usize>,
        closed: bool,
    }

    #[async_trait]
    impl ItemWriter for RecordingWriter {
        async fn write(&mut self, item: &EmissionItem) -> std::result::Result<(), WriteError> {
            self.attempts += 1;
            if self.fail_at == Some(self.attempts) {
                return Err(WriteError::Rejected("disk full".to_string()));
            }
            self.items.push(item.clone());
            Ok(())
        }

        async fn close(&mut self) -> std::result::Result<(), WriteError> {
            self.closed = true;
            Ok(())
        }
    }

    fn enriched(id: &str, geocode: Option<GeocodeOutcome>) -> EnrichedRecord {
        let record: SourceRecord = serde_json::from_value(json!({
            "id": id,
            "export_document": {"export_fields": []}
        }))
        .unwrap();
        EnrichedRecord::new(record, NormalizedFields::new(), geocode)
    }

    fn found(id: &str) -> Option<GeocodeOutcome> {
        Some(GeocodeOutcome::Found(GeocodeMatch::new(id, None)))
    }

    fn failed() -> Option<GeocodeOutcome> {
        Some(GeocodeOutcome::NotFound {
            error: "no match".to_string(),
        })
    }

    #[tokio::test]
    async fn test_items_are_ordered_per_record() {
        let records = stream::iter(vec![
            Ok(enriched("r1", found("A1"))),
            Ok(enriched("r2", failed())),
            Ok(enriched("r3", None)),
        ]);
        let items: Vec<EmissionItem> = emission_items(records).try_collect().await.unwrap();

        let shape: Vec<(&str, &str)> = items.iter().map(|i| (i.kind(), i.record_id())).collect();
        assert_eq!(
            shape,
            vec![
                ("object", "r1"),
                ("relation", "r1"),
                ("object", "r2"),
                ("log", "r2"),
                ("object", "r3"),
            ]
        );
    }

    #[tokio::test]
    async fn test_never_both_relation_and_log() {
        let records = stream::iter(vec![
            Ok(enriched("r1", found("A1"))),
            Ok(enriched("r2", failed())),
            Ok(enriched("r3", None)),
        ]);
        let items: Vec<EmissionItem> = emission_items(records).try_collect().await.unwrap();

        for id in ["r1", "r2", "r3"] {
            let kinds: Vec<&str> = items
                .iter()
                .filter(|i| i.record_id() == id)
                .map(|i| i.kind())
                .collect();
            assert!(!(kinds.contains(&"relation") && kinds.contains(&"log")));
            assert_eq!(kinds.iter().filter(|k| **k == "object").count(), 1);
        }
    }

    #[tokio::test]
    async fn test_records_without_export_document_are_dropped() {
        let mut bare = enriched("r0", None);
        bare.record.export_document = None;
        let records = stream::iter(vec![Ok(bare), Ok(enriched("r1", None))]);

        let items: Vec<EmissionItem> = emission_items(records).try_collect().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].record_id(), "r1");
    }

    #[tokio::test]
    async fn test_write_failure_stops_delivery() {
        // Ten items: five records that each yield a document and a relation.
        let records: Vec<Result<EnrichedRecord>> = (1..=5)
            .map(|n| Ok(enriched(&format!("r{}", n), found(&format!("A{}", n)))))
            .collect();
        let mut writer = RecordingWriter {
            fail_at: Some(3),
            ..Default::default()
        };

        let result = deliver(
            emission_items(stream::iter(records)),
            &mut writer,
            &ProgressBar::hidden(),
        )
        .await;

        assert!(matches!(
            result,
            Err(PipelineError::Write(WriteError::Rejected(_)))
        ));
        assert_eq!(writer.attempts, 3);
        assert_eq!(writer.items.len(), 2);
        assert!(!writer.closed);
    }

    #[tokio::test]
    async fn test_upstream_error_stops_delivery() {
        let records = stream::iter(vec![
            Ok(enriched("r1", None)),
            Err(PipelineError::Task("boom".to_string())),
            Ok(enriched("r3", None)),
        ]);
        let mut writer = RecordingWriter::default();

        let result = deliver(emission_items(records), &mut writer, &ProgressBar::hidden()).await;
        assert!(matches!(result, Err(PipelineError::Task(_))));
        assert_eq!(writer.items.len(), 1);
    }

    #[tokio::test]
    async fn test_run_transform_counts_items() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("records.ndjson");
        let lines: String = [
            enriched("r1", found("A1")),
            enriched("r2", failed()),
            enriched("r3", None),
        ]
        .iter()
        .map(|r| format!("{}\n", serde_json::to_string(r).unwrap()))
        .collect();
        std::fs::write(&input, lines).unwrap();

        let mut writer = RecordingWriter::default();
        let stats = run_transform(&input, &mut writer, &ProgressBar::hidden())
            .await
            .unwrap();

        assert_eq!(
            stats,
            EmitStats {
                objects: 3,
                relations: 1,
                logs: 1
            }
        );
        assert!(writer.closed);
    }
}
