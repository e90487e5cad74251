//! Ingestion lens
//!
//! Drives source readers into a [`NetblockDatabase`]. Each source is replaced
//! wholesale: new records are staged in batched transactions, and once the
//! whole input has been read the old rows are swapped for the staged ones in a
//! single transaction. A source that fails at any point keeps its previous
//! generation. Indexes are dropped at the start of a run and rebuilt once after
//! the last source.
//!
//! A failed source is logged, recorded in the [`IngestReport`], and skipped;
//! the rest of the run continues.
//!
//! # Example
//!
//! ```rust,ignore
//! use georipe::database::{DatasetFamily, NetblockDatabase};
//! use georipe::datasets::RegistrySource;
//! use georipe::lens::ingest::{IngestLens, RegistryInput};
//!
//! let db = NetblockDatabase::open_in_dir("~/.georipe", DatasetFamily::Registry)?;
//! let lens = IngestLens::new(&db);
//! let report = lens.ingest_registries(&[
//!     RegistryInput::new(RegistrySource::Ripe, "ripe.db.gz"),
//!     RegistryInput::new(RegistrySource::Arin, "arin.db.gz"),
//! ])?;
//! println!("{} records", report.total_records());
//! ```

use crate::database::netblocks::{DatasetFamily, NetblockDatabase, NetblockRecord, Source};
use crate::datasets::geoip::{load_locations, AsnReader, GeoBlockReader};
use crate::datasets::registry::RegistrySource;
use crate::datasets::whois::{ParseStats, WhoisParser};
use crate::error::NetblockError;
use crate::range::AddressParsing;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Read};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Records per insert transaction
pub const DEFAULT_BATCH_SIZE: usize = 25_000;

// =============================================================================
// Progress Tracking Types
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IngestProgress {
    /// A source's input was opened and staging has begun
    Started { source: Source, input: String },
    /// Emitted after every committed batch
    Update {
        source: Source,
        records: u64,
        elapsed_secs: f64,
    },
    Completed {
        source: Source,
        records: u64,
        duration_secs: f64,
    },
    Failed { source: Source, error: String },
    AsnApplied { updated: u64 },
    IndexesRebuilt { duration_secs: f64 },
}

pub type IngestProgressCallback = Arc<dyn Fn(IngestProgress) + Send + Sync>;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOptions {
    pub batch_size: usize,
    pub address_parsing: AddressParsing,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            address_parsing: AddressParsing::Strict,
        }
    }
}

/// One registry dump to ingest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryInput {
    pub registry: RegistrySource,
    /// Local path, optionally `.gz`/`.bz2` compressed
    pub path: String,
}

impl RegistryInput {
    pub fn new(registry: RegistrySource, path: impl Into<String>) -> Self {
        Self {
            registry,
            path: path.into(),
        }
    }
}

/// Geolocation table files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoInput {
    pub blocks: String,
    pub locations: String,
    pub asn: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub source: Option<Source>,
    pub input: String,
    /// Records inserted
    pub records: u64,
    /// Previous rows swapped out
    pub replaced: u64,
    /// Input rows dropped (malformed ranges, unallocated blocks)
    pub skipped: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_stats: Option<ParseStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceOutcome {
    fn failed(source: Source, input: &str, err: &anyhow::Error) -> Self {
        Self {
            source: Some(source),
            input: input.to_string(),
            error: Some(err.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AsnOutcome {
    pub input: String,
    pub updated: u64,
    pub skipped: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    pub outcomes: Vec<SourceOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn: Option<AsnOutcome>,
}

impl IngestReport {
    pub fn total_records(&self) -> u64 {
        self.outcomes.iter().map(|o| o.records).sum()
    }

    pub fn failed(&self) -> Vec<&SourceOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some()).collect()
    }

    pub fn is_success(&self) -> bool {
        self.failed().is_empty() && self.asn.as_ref().is_none_or(|a| a.error.is_none())
    }
}

/// Open a local, possibly compressed, input file
///
/// Failure is [`NetblockError::SourceUnavailable`] so callers can tell a
/// missing input apart from a failed load.
pub fn open_input(path: &str, source_name: &str) -> Result<Box<dyn BufRead + Send>> {
    let reader = oneio::get_reader(path).map_err(|e| NetblockError::SourceUnavailable {
        source_name: source_name.to_string(),
        reason: format!("{}: {}", path, e),
    })?;
    Ok(Box::new(BufReader::new(reader)))
}

// =============================================================================
// Lens
// =============================================================================

pub struct IngestLens<'a> {
    db: &'a NetblockDatabase,
    options: IngestOptions,
    callback: Option<IngestProgressCallback>,
}

impl<'a> IngestLens<'a> {
    pub fn new(db: &'a NetblockDatabase) -> Self {
        Self {
            db,
            options: IngestOptions::default(),
            callback: None,
        }
    }

    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_progress(mut self, callback: IngestProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    fn notify(&self, progress: IngestProgress) {
        if let Some(ref cb) = self.callback {
            cb(progress);
        }
    }

    fn require_family(&self, family: DatasetFamily) -> Result<()> {
        if self.db.family() != family {
            return Err(anyhow!(
                "cannot load {} data into the {} database",
                family,
                self.db.family()
            ));
        }
        Ok(())
    }

    /// Ingest registry dumps in order, then rebuild indexes once
    pub fn ingest_registries(&self, inputs: &[RegistryInput]) -> Result<IngestReport> {
        self.require_family(DatasetFamily::Registry)?;
        self.db.drop_indexes()?;

        let mut report = IngestReport::default();
        for input in inputs {
            let source = input.registry.source();
            let outcome = open_input(&input.path, source.as_str()).and_then(|reader| {
                self.ingest_registry_reader(input.registry, reader, &input.path)
            });
            match outcome {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => {
                    error!("{} ingestion failed: {}", source, e);
                    self.notify(IngestProgress::Failed {
                        source,
                        error: e.to_string(),
                    });
                    report
                        .outcomes
                        .push(SourceOutcome::failed(source, &input.path, &e));
                }
            }
        }

        self.rebuild_indexes()?;
        Ok(report)
    }

    /// Replace one registry's rows with the records read from `reader`
    ///
    /// Does not touch indexes; callers loading several sources should drop
    /// and rebuild them around the whole run.
    pub fn ingest_registry_reader<R: BufRead>(
        &self,
        registry: RegistrySource,
        reader: R,
        input_name: &str,
    ) -> Result<SourceOutcome> {
        self.require_family(DatasetFamily::Registry)?;
        let source = registry.source();

        let mut parser = WhoisParser::new(reader, registry.format(), source)
            .with_address_parsing(self.options.address_parsing);
        let (records, replaced) = self.store_records(
            source,
            input_name,
            parser
                .by_ref()
                .map(|r| r.map_err(|e| anyhow!("Failed to read {}: {}", input_name, e))),
        )?;

        let stats = parser.stats().clone();
        Ok(SourceOutcome {
            source: Some(source),
            input: input_name.to_string(),
            records,
            replaced,
            skipped: stats.malformed_ranges + stats.unallocated_groups,
            parse_stats: Some(stats),
            error: None,
        })
    }

    /// Load geolocation blocks joined with locations, then apply ASN data
    pub fn ingest_geolocation(&self, input: &GeoInput) -> Result<IngestReport> {
        self.require_family(DatasetFamily::Geolocation)?;
        let source = Source::Geolocation;
        let mut report = IngestReport::default();

        let opened = open_input(&input.locations, source.as_str()).and_then(|locations| {
            let blocks = open_input(&input.blocks, source.as_str())?;
            Ok((locations, blocks))
        });
        let outcome = opened.and_then(|(locations, blocks)| {
            self.db.drop_indexes()?;
            let result = self.ingest_geolocation_readers(blocks, locations, &input.blocks);
            first_error(result, self.rebuild_indexes())
        });

        match outcome {
            Ok(outcome) => report.outcomes.push(outcome),
            Err(e) => {
                error!("{} ingestion failed: {}", source, e);
                self.notify(IngestProgress::Failed {
                    source,
                    error: e.to_string(),
                });
                report
                    .outcomes
                    .push(SourceOutcome::failed(source, &input.blocks, &e));
                return Ok(report);
            }
        }

        if let Some(asn_path) = &input.asn {
            let asn = open_input(asn_path, "asn").and_then(|reader| self.apply_asn(reader, asn_path));
            report.asn = Some(match asn {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("ASN enrichment failed: {}", e);
                    AsnOutcome {
                        input: asn_path.clone(),
                        error: Some(e.to_string()),
                        ..Default::default()
                    }
                }
            });
        }

        Ok(report)
    }

    /// Replace geolocation rows from already opened block and location tables
    pub fn ingest_geolocation_readers<B: Read, L: Read>(
        &self,
        blocks: B,
        locations: L,
        input_name: &str,
    ) -> Result<SourceOutcome> {
        self.require_family(DatasetFamily::Geolocation)?;

        let locations = load_locations(locations)?;
        info!("loaded {} geolocation locations", locations.len());

        let mut reader = GeoBlockReader::new(blocks, &locations)?
            .with_address_parsing(self.options.address_parsing);
        let (records, replaced) =
            self.store_records(Source::Geolocation, input_name, reader.by_ref())?;
        if reader.decode_errors() > 0 {
            warn!(
                "{} geolocation rows had undecodable bytes dropped",
                reader.decode_errors()
            );
        }

        Ok(SourceOutcome {
            source: Some(Source::Geolocation),
            input: input_name.to_string(),
            records,
            replaced,
            skipped: reader.skipped(),
            parse_stats: None,
            error: None,
        })
    }

    /// Set ASN and organization on stored networks with identical CIDR text
    pub fn apply_asn<R: Read>(&self, reader: R, input_name: &str) -> Result<AsnOutcome> {
        self.require_family(DatasetFamily::Geolocation)?;
        let repo = self.db.networks();
        let mut rows = AsnReader::new(reader)?;

        let mut updated = 0u64;
        let mut batch = Vec::with_capacity(self.options.batch_size.min(DEFAULT_BATCH_SIZE));
        for row in rows.by_ref() {
            batch.push(row?);
            if batch.len() >= self.options.batch_size {
                updated += repo.update_asn_batch(&batch)? as u64;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            updated += repo.update_asn_batch(&batch)? as u64;
        }

        info!("applied ASN data to {} geolocation networks", updated);
        self.notify(IngestProgress::AsnApplied { updated });
        Ok(AsnOutcome {
            input: input_name.to_string(),
            updated,
            skipped: rows.skipped(),
            error: None,
        })
    }

    /// Stage `records` in batches, then swap them in for `source`'s rows
    ///
    /// Returns `(inserted, replaced)`. On any error the staged rows are
    /// discarded and the stored rows of `source` are untouched.
    fn store_records<I>(&self, source: Source, input_name: &str, records: I) -> Result<(u64, u64)>
    where
        I: Iterator<Item = Result<NetblockRecord>>,
    {
        let repo = self.db.networks();
        let start_time = Instant::now();

        self.notify(IngestProgress::Started {
            source,
            input: input_name.to_string(),
        });
        let leftover = repo.discard_staged(source)?;
        if leftover > 0 {
            warn!("discarded {} {} records staged by an earlier run", leftover, source);
        }

        let staged = self
            .stage_records(source, records, start_time)
            .and_then(|inserted| Ok((inserted, repo.promote_staged(source)? as u64)));
        let (inserted, replaced) = match staged {
            Ok(counts) => counts,
            Err(e) => {
                if let Err(cleanup) = repo.discard_staged(source) {
                    error!("failed to discard staged {} records: {}", source, cleanup);
                }
                return Err(e);
            }
        };

        self.db.record_source_update(source, inserted)?;

        let duration_secs = start_time.elapsed().as_secs_f64();
        info!(
            "stored {} {} records ({} replaced) in {:.2}s",
            inserted, source, replaced, duration_secs
        );
        self.notify(IngestProgress::Completed {
            source,
            records: inserted,
            duration_secs,
        });
        Ok((inserted, replaced))
    }

    fn stage_records<I>(&self, source: Source, records: I, start_time: Instant) -> Result<u64>
    where
        I: Iterator<Item = Result<NetblockRecord>>,
    {
        let repo = self.db.networks();
        let batch_size = self.options.batch_size.max(1);
        let mut inserted = 0u64;
        let mut batch = Vec::with_capacity(batch_size.min(DEFAULT_BATCH_SIZE));
        for record in records {
            batch.push(record?);
            if batch.len() >= batch_size {
                inserted += repo.stage_batch(source, &batch)? as u64;
                batch.clear();
                self.notify(IngestProgress::Update {
                    source,
                    records: inserted,
                    elapsed_secs: start_time.elapsed().as_secs_f64(),
                });
            }
        }
        if !batch.is_empty() {
            inserted += repo.stage_batch(source, &batch)? as u64;
        }
        Ok(inserted)
    }

    fn rebuild_indexes(&self) -> Result<()> {
        let start_time = Instant::now();
        self.db.rebuild_indexes()?;
        self.notify(IngestProgress::IndexesRebuilt {
            duration_secs: start_time.elapsed().as_secs_f64(),
        });
        Ok(())
    }
}

/// The ingestion result, unless it succeeded and the index rebuild did not
///
/// When both failed the rebuild error is logged and the ingestion error wins.
fn first_error<T>(result: Result<T>, rebuilt: Result<()>) -> Result<T> {
    match (result, rebuilt) {
        (Ok(value), rebuilt) => rebuilt.map(|_| value),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(rebuild)) => {
            error!("index rebuild failed after ingestion error: {}", rebuild);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use std::sync::Mutex;

    const RIPE: &str = "\
inetnum: 10.0.0.0 - 10.255.255.255
netname: TEN
country: NL

inetnum: 10.1.0.0/16
netname: TEN-ONE
country: NL

";

    const APNIC: &str = "\
inetnum: 1.0.0.0 - 1.0.0.255
netname: APNIC-LABS
descr: Research prefix
country: AU

";

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> String {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn test_ingest_registries() {
        let dir = tempfile::tempdir().unwrap();
        let ripe = write_file(&dir, "ripe.db", RIPE);
        let apnic = write_file(&dir, "apnic.db", APNIC);

        let db = NetblockDatabase::open_in_memory(DatasetFamily::Registry).unwrap();
        let report = IngestLens::new(&db)
            .ingest_registries(&[
                RegistryInput::new(RegistrySource::Ripe, ripe),
                RegistryInput::new(RegistrySource::Apnic, apnic),
            ])
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.total_records(), 3);
        assert_eq!(db.networks().count_by_source(Source::Ripe).unwrap(), 2);
        assert_eq!(db.index_names().unwrap().len(), 3);
    }

    #[test]
    fn test_missing_source_keeps_old_rows() {
        let db = NetblockDatabase::open_in_memory(DatasetFamily::Registry).unwrap();
        let lens = IngestLens::new(&db);
        lens.ingest_registry_reader(RegistrySource::Ripe, Cursor::new(RIPE), "ripe")
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let apnic = write_file(&dir, "apnic.db", APNIC);
        let missing = dir.path().join("missing.db.gz");

        let report = lens
            .ingest_registries(&[
                RegistryInput::new(RegistrySource::Ripe, missing.to_str().unwrap()),
                RegistryInput::new(RegistrySource::Apnic, apnic),
            ])
            .unwrap();

        let failed = report.failed();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].source, Some(Source::Ripe));
        assert!(failed[0].error.as_deref().unwrap().contains("unavailable"));

        // previous ripe generation untouched, apnic still loaded
        assert_eq!(db.networks().count_by_source(Source::Ripe).unwrap(), 2);
        assert_eq!(db.networks().count_by_source(Source::Apnic).unwrap(), 1);
    }

    #[test]
    fn test_reingest_replaces_source() {
        let db = NetblockDatabase::open_in_memory(DatasetFamily::Registry).unwrap();
        let lens = IngestLens::new(&db);
        lens.ingest_registry_reader(RegistrySource::Ripe, Cursor::new(RIPE), "ripe")
            .unwrap();
        lens.ingest_registry_reader(RegistrySource::Apnic, Cursor::new(APNIC), "apnic")
            .unwrap();

        let outcome = lens
            .ingest_registry_reader(RegistrySource::Ripe, Cursor::new(RIPE), "ripe")
            .unwrap();
        assert_eq!(outcome.replaced, 2);
        assert_eq!(outcome.records, 2);
        assert_eq!(db.networks().count().unwrap(), 3);
    }

    #[test]
    fn test_batches_report_progress() {
        let db = NetblockDatabase::open_in_memory(DatasetFamily::Registry).unwrap();
        let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let lens = IngestLens::new(&db)
            .with_options(IngestOptions {
                batch_size: 1,
                ..Default::default()
            })
            .with_progress(Arc::new(move |p: IngestProgress| {
                let name = match p {
                    IngestProgress::Started { .. } => "started",
                    IngestProgress::Update { .. } => "update",
                    IngestProgress::Completed { .. } => "completed",
                    _ => "other",
                };
                sink.lock().unwrap().push(name.to_string());
            }));

        lens.ingest_registry_reader(RegistrySource::Ripe, Cursor::new(RIPE), "ripe")
            .unwrap();
        assert_eq!(
            *events.lock().unwrap(),
            vec!["started", "update", "update", "completed"]
        );
        assert_eq!(db.get_meta("source.ripe.records").unwrap(), Some("2".to_string()));
    }

    struct ResetConnection;

    impl Read for ResetConnection {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("connection reset"))
        }
    }

    fn staged_rows(db: &NetblockDatabase, table: &str) -> u64 {
        db.connection()
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })
            .unwrap()
    }

    #[test]
    fn test_failure_mid_input_keeps_previous_generation() {
        let db = NetblockDatabase::open_in_memory(DatasetFamily::Registry).unwrap();
        let lens = IngestLens::new(&db).with_options(IngestOptions {
            batch_size: 1,
            ..Default::default()
        });
        lens.ingest_registry_reader(RegistrySource::Ripe, Cursor::new(RIPE), "ripe")
            .unwrap();

        let next = "inetnum: 10.2.0.0/16\nnetname: NEW\n\ninetnum: 10.3.0.0/16\nnetname: NEWER\n\n";
        let reader = BufReader::new(Cursor::new(next).chain(ResetConnection));
        let err = lens
            .ingest_registry_reader(RegistrySource::Ripe, reader, "ripe")
            .unwrap_err();
        assert!(err.to_string().contains("connection reset"));

        let names: Vec<String> = db
            .networks()
            .select_where(&[])
            .unwrap()
            .iter()
            .map(|r| r.field("netname"))
            .collect();
        assert_eq!(names, vec!["TEN", "TEN-ONE"]);
        assert_eq!(staged_rows(&db, "registry_networks_staging"), 0);
        assert_eq!(db.get_meta("source.ripe.records").unwrap(), Some("2".to_string()));
    }

    #[test]
    fn test_geolocation_undecodable_bytes_not_fatal() {
        let locations = "geoname_id,continent_name,country_name,city_name\n2759794,Europe,Netherlands,Amsterdam\n";
        let db = NetblockDatabase::open_in_memory(DatasetFamily::Geolocation).unwrap();
        let lens = IngestLens::new(&db);

        let first = "network,geoname_id,latitude,longitude\n9.0.0.0/24,2759794,52.37,4.89\n9.0.1.0/24,2759794,52.37,4.89\n";
        lens.ingest_geolocation_readers(first.as_bytes(), locations.as_bytes(), "first")
            .unwrap();
        assert_eq!(db.networks().count().unwrap(), 2);

        let mut second = b"network,geoname_id,latitude,longitude\n".to_vec();
        second.extend_from_slice(b"2.0.0.0/24,2759794,52.37,4.89\n");
        second.extend_from_slice(b"2.0.1.0/24,2759794,52.37,\xff\xfe4.89\n");
        second.extend_from_slice(b"2.0.2.0/24,2759794,52.37,4.89\n");
        let outcome = lens
            .ingest_geolocation_readers(second.as_slice(), locations.as_bytes(), "second")
            .unwrap();

        assert_eq!(outcome.records, 3);
        assert_eq!(outcome.replaced, 2);
        let rows = db.networks().lookup_containing(0x0200_0101).unwrap();
        assert_eq!(rows[0].field("longitude"), "4.89");
        assert_eq!(rows[0].field("city"), "amsterdam");
    }

    #[test]
    fn test_ingestion_error_wins_over_rebuild_error() {
        let both: Result<()> = first_error(Err(anyhow!("bad input")), Err(anyhow!("no index")));
        assert_eq!(both.unwrap_err().to_string(), "bad input");

        let rebuild_only = first_error(Ok(7), Err(anyhow!("no index")));
        assert_eq!(rebuild_only.unwrap_err().to_string(), "no index");

        assert_eq!(first_error(Ok(7), Ok(())).unwrap(), 7);
    }

    #[test]
    fn test_wrong_family_rejected() {
        let db = NetblockDatabase::open_in_memory(DatasetFamily::Geolocation).unwrap();
        let result =
            IngestLens::new(&db).ingest_registry_reader(RegistrySource::Ripe, Cursor::new(RIPE), "ripe");
        assert!(result.is_err());
    }

    #[test]
    fn test_geolocation_with_asn() {
        let dir = tempfile::tempdir().unwrap();
        let locations = write_file(
            &dir,
            "GeoLite2-City-Locations-en.csv",
            "geoname_id,continent_name,country_name,city_name\n2759794,Europe,Netherlands,Amsterdam\n",
        );
        let blocks = write_file(
            &dir,
            "GeoLite2-City-Blocks-IPv4.csv",
            "network,geoname_id,latitude,longitude\n2.0.0.0/24,2759794,52.37,4.89\n2.0.1.0/24,2759794,52.37,4.89\n",
        );
        let asn = write_file(
            &dir,
            "GeoLite2-ASN-Blocks-IPv4.csv",
            "network,autonomous_system_number,autonomous_system_organization\n2.0.0.0/24,3215,Orange\n",
        );

        let db = NetblockDatabase::open_in_memory(DatasetFamily::Geolocation).unwrap();
        let report = IngestLens::new(&db)
            .ingest_geolocation(&GeoInput {
                blocks,
                locations,
                asn: Some(asn),
            })
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.total_records(), 2);
        assert_eq!(report.asn.as_ref().unwrap().updated, 1);

        let rows = db.networks().lookup_containing(0x0200_0001).unwrap();
        assert_eq!(rows[0].field("city"), "amsterdam");
        assert_eq!(rows[0].field("organization"), "Orange");
    }

    #[test]
    fn test_geolocation_missing_locations() {
        let db = NetblockDatabase::open_in_memory(DatasetFamily::Geolocation).unwrap();
        let report = IngestLens::new(&db)
            .ingest_geolocation(&GeoInput {
                blocks: "/nonexistent/blocks.csv".to_string(),
                locations: "/nonexistent/locations.csv".to_string(),
                asn: None,
            })
            .unwrap();
        assert!(!report.is_success());
        assert_eq!(db.index_names().unwrap().len(), 3);
    }
}
