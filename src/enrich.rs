//! Enrichment: normalize fields and geocode each record's address.

use std::path::Path;

use futures::{Stream, TryStreamExt};
use indicatif::ProgressBar;

use crate::error::Result;
use crate::extract::extract_fields;
use crate::geocode::Geocoder;
use crate::models::{CanonicalField, EnrichedRecord, GeocodeOutcome, SourceRecord};
use crate::store::{read_records, NdjsonWriter};

/// Default number of records between progress log lines.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 1000;

/// Statistics collected during enrichment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichStats {
    /// Records read from the input store.
    pub read: usize,
    /// Records dropped for lacking an export document.
    pub filtered: usize,
    /// Records written to the output store.
    pub written: usize,
    /// Records whose address was geocoded.
    pub found: usize,
    /// Records whose address could not be geocoded.
    pub not_found: usize,
    /// Records without an address.
    pub no_address: usize,
}

impl EnrichStats {
    fn record(&mut self, outcome: Option<&GeocodeOutcome>) {
        self.written += 1;
        match outcome {
            Some(GeocodeOutcome::Found(_)) => self.found += 1,
            Some(GeocodeOutcome::NotFound { .. }) => self.not_found += 1,
            None => self.no_address += 1,
        }
    }
}

/// Enrich a single record.
///
/// A geocoder failure is recorded in the outcome rather than returned.
/// Records without an address get no outcome at all.
pub async fn enrich_record(record: SourceRecord, geocoder: &dyn Geocoder) -> EnrichedRecord {
    let fields = extract_fields(record.export_fields());

    let geocode = match fields.first_text(CanonicalField::Address) {
        Some(address) => Some(match geocoder.geocode(&address).await {
            Ok(result) => GeocodeOutcome::Found(result),
            Err(e) => {
                tracing::warn!("Record {}: geocoding '{}' failed: {}", record.id, address, e);
                GeocodeOutcome::NotFound {
                    error: e.to_string(),
                }
            }
        }),
        None => None,
    };

    EnrichedRecord::new(record, fields, geocode)
}

/// Enrich every record of the store at `input` into the store at `output`.
pub async fn run_enrich(
    input: &Path,
    output: &Path,
    geocoder: &dyn Geocoder,
    progress_interval: usize,
    pb: &ProgressBar,
) -> Result<EnrichStats> {
    tracing::info!("Enriching {} -> {}", input.display(), output.display());
    let records = read_records::<SourceRecord>(input, "enrich").await?;
    enrich_stream(records, output, geocoder, progress_interval, pb).await
}

/// Enrich records pulled from `records`, preserving their order.
pub async fn enrich_stream<S>(
    records: S,
    output: &Path,
    geocoder: &dyn Geocoder,
    progress_interval: usize,
    pb: &ProgressBar,
) -> Result<EnrichStats>
where
    S: Stream<Item = Result<SourceRecord>>,
{
    futures::pin_mut!(records);

    let interval = progress_interval.max(1);
    let mut writer = NdjsonWriter::create(output).await?;
    let mut stats = EnrichStats::default();

    while let Some(record) = records.try_next().await? {
        stats.read += 1;
        pb.inc(1);

        if !record.has_export_document() {
            stats.filtered += 1;
            continue;
        }

        let enriched = enrich_record(record, geocoder).await;
        stats.record(enriched.geocode.as_ref());
        writer.append(&enriched).await?;

        if stats.read % interval == 0 {
            tracing::info!(
                "Enriched {} of {} records read ({} geocoded, {} not found)",
                stats.written,
                stats.read,
                stats.found,
                stats.not_found
            );
        }
    }

    writer.finish().await?;
    tracing::info!(
        "Enrichment done: {} written, {} filtered, {} geocoded, {} not found, {} without address",
        stats.written,
        stats.filtered,
        stats.found,
        stats.not_found,
        stats.no_address
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeocodeError;
    use crate::models::GeocodeMatch;
    use crate::store::RECORDS_FILENAME;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Resolves addresses starting with a digit, records every call.
    #[derive(Default)]
    struct ScriptedGeocoder {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Geocoder for ScriptedGeocoder {
        async fn geocode(&self, address: &str) -> std::result::Result<GeocodeMatch, GeocodeError> {
            self.calls.lock().unwrap().push(address.to_string());
            if address.starts_with(|c: char| c.is_ascii_digit()) {
                Ok(GeocodeMatch::new(format!("addr:{}", address), None))
            } else {
                Err(GeocodeError::NotFound(address.to_string()))
            }
        }
    }

    fn record(value: serde_json::Value) -> SourceRecord {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_found_outcome() {
        let geocoder = ScriptedGeocoder::default();
        let enriched = enrich_record(
            record(json!({"id": "r1", "export_document": {"export_fields": [
                {"name": "Street Address", "value": "12 Main St"}
            ]}})),
            &geocoder,
        )
        .await;

        let outcome = enriched.geocode.unwrap();
        assert_eq!(outcome.matched().unwrap().address_id(), "addr:12 Main St");
    }

    #[tokio::test]
    async fn test_not_found_outcome_is_data() {
        let geocoder = ScriptedGeocoder::default();
        let enriched = enrich_record(
            record(json!({"id": "r1", "export_document": {"export_fields": [
                {"name": "Street Address", "value": "Corner of Elm"}
            ]}})),
            &geocoder,
        )
        .await;

        assert_eq!(
            enriched.geocode,
            Some(GeocodeOutcome::NotFound {
                error: "No match found for address: Corner of Elm".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_no_address_means_no_outcome() {
        let geocoder = ScriptedGeocoder::default();
        let enriched = enrich_record(
            record(json!({"id": "r1", "export_document": {"export_fields": [
                {"name": "Mortgager", "value": "John Doe"}
            ]}})),
            &geocoder,
        )
        .await;

        assert!(enriched.geocode.is_none());
        assert!(geocoder.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_address_geocodes_first_value() {
        let geocoder = ScriptedGeocoder::default();
        enrich_record(
            record(json!({"id": "r1", "export_document": {"export_fields": [
                {"name": "Street Address", "value": "12 Main St"},
                {"name": "Street Address", "value": "12 Main St, Annex"}
            ]}})),
            &geocoder,
        )
        .await;

        assert_eq!(*geocoder.calls.lock().unwrap(), vec!["12 Main St".to_string()]);
    }

    #[tokio::test]
    async fn test_run_enrich_filters_and_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("download").join(RECORDS_FILENAME);
        let output = dir.path().join("enrich").join(RECORDS_FILENAME);
        std::fs::create_dir_all(input.parent().unwrap()).unwrap();

        let lines = [
            json!({"id": "a", "export_document": {"export_fields": [{"name": "Street Address", "value": "1 A St"}]}}),
            json!({"id": "skip"}),
            json!({"id": "b", "export_document": {"export_fields": [{"name": "Street Address", "value": "Nowhere"}]}}),
            json!({"id": "c", "export_document": {"export_fields": []}}),
        ];
        let contents: String = lines.iter().map(|l| format!("{}\n", l)).collect();
        std::fs::write(&input, contents).unwrap();

        let geocoder = ScriptedGeocoder::default();
        let stats = run_enrich(&input, &output, &geocoder, 2, &ProgressBar::hidden())
            .await
            .unwrap();

        assert_eq!(
            stats,
            EnrichStats {
                read: 4,
                filtered: 1,
                written: 3,
                found: 1,
                not_found: 1,
                no_address: 1,
            }
        );

        let written: Vec<EnrichedRecord> = read_records(&output, "transform")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let ids: Vec<&str> = written.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(written[0].geocode.as_ref().unwrap().is_found());
        assert!(written[1].geocode.as_ref().unwrap().error().is_some());
        assert!(written[2].geocode.is_none());
    }

    #[tokio::test]
    async fn test_malformed_input_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.ndjson");
        let output = dir.path().join("out.ndjson");
        std::fs::write(&input, "{\"id\": \"a\", \"export_document\": {}}\nnope\n").unwrap();

        let result = run_enrich(
            &input,
            &output,
            &ScriptedGeocoder::default(),
            DEFAULT_PROGRESS_INTERVAL,
            &ProgressBar::hidden(),
        )
        .await;

        assert!(matches!(
            result,
            Err(crate::error::PipelineError::Parse { stage: "enrich", .. })
        ));
        assert!(!output.exists());
    }
}
