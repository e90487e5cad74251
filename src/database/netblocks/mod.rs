//! Netblock database storage
//!
//! One SQLite file per dataset family:
//! - registry (WHOIS) netblocks in `rir.sqlite3`
//! - geolocation netblocks in `geoip.sqlite3`
//!
//! Each file holds a single range-keyed table plus a meta table recording the
//! schema version and, per source, when it was last ingested and how many
//! records that run produced.

mod repository;
mod types;

pub use repository::{AsnAssignment, NetblockRepository, SqlClause};
pub use types::{
    Attributes, DatasetFamily, GeoAttributes, NetblockRecord, RegistryAttributes, Source,
    MULTI_VALUE_SEPARATOR,
};

use crate::database::core::{DatabaseConn, SchemaManager, SchemaStatus};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Per-source ingestion bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    pub source: Source,
    /// Records currently stored for the source
    pub records: u64,
    /// Records produced by the last completed ingestion
    pub last_ingested: Option<u64>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Handle to one dataset family's store
///
/// Every operation takes this handle explicitly; there is no shared global
/// connection.
pub struct NetblockDatabase {
    db: DatabaseConn,
    family: DatasetFamily,
}

impl NetblockDatabase {
    /// Open the store at the specified path
    ///
    /// If the database doesn't exist, it will be created and initialized.
    /// If the schema is outdated or corrupted, it will be reset and data will
    /// need to be ingested again.
    pub fn open(path: &str, family: DatasetFamily) -> Result<Self> {
        let db = DatabaseConn::open_path(path)?;
        let schema = SchemaManager::new(&db.conn, family);

        match schema.check_status()? {
            SchemaStatus::Current => {
                info!("{} database schema is current", family);
            }
            SchemaStatus::NotInitialized => {
                info!("Initializing {} database schema", family);
                schema.initialize()?;
            }
            SchemaStatus::NeedsMigration { from, to } => {
                info!(
                    "{} database needs migration from v{} to v{}, resetting",
                    family, from, to
                );
                schema.reset()?;
                schema.initialize()?;
            }
            SchemaStatus::Incompatible {
                database_version,
                required_version,
            } => {
                info!(
                    "{} database schema incompatible (db: v{}, required: v{}), resetting",
                    family, database_version, required_version
                );
                schema.reset()?;
                schema.initialize()?;
            }
            SchemaStatus::Corrupted => {
                info!("{} database schema corrupted, resetting", family);
                schema.reset()?;
                schema.initialize()?;
            }
        }

        Ok(Self { db, family })
    }

    /// Open an existing store as it is
    ///
    /// Never initializes or resets: a store whose schema is not current is
    /// an error and its file is left untouched.
    pub fn open_existing(path: &str, family: DatasetFamily) -> Result<Self> {
        let db = DatabaseConn::open_path(path)?;
        match SchemaManager::new(&db.conn, family).check_status()? {
            SchemaStatus::Current => Ok(Self { db, family }),
            status => Err(anyhow!(
                "{} database at '{}' is not usable ({:?})",
                family,
                path,
                status
            )),
        }
    }

    /// Open the family's standard file inside a data directory
    pub fn open_in_dir(data_dir: &str, family: DatasetFamily) -> Result<Self> {
        ensure_data_dir(data_dir)?;
        let path = Path::new(data_dir).join(family.file_name());
        let path = path
            .to_str()
            .ok_or_else(|| anyhow!("Invalid database path under '{}'", data_dir))?;
        Self::open(path, family)
    }

    /// Create an in-memory store (for testing)
    pub fn open_in_memory(family: DatasetFamily) -> Result<Self> {
        let db = DatabaseConn::open_in_memory()?;
        SchemaManager::new(&db.conn, family).initialize()?;
        Ok(Self { db, family })
    }

    pub fn family(&self) -> DatasetFamily {
        self.family
    }

    pub fn networks(&self) -> NetblockRepository<'_> {
        NetblockRepository::new(&self.db.conn, self.family)
    }

    /// Get the underlying database connection (for advanced queries)
    pub fn connection(&self) -> &rusqlite::Connection {
        &self.db.conn
    }

    fn schema(&self) -> SchemaManager<'_> {
        SchemaManager::new(&self.db.conn, self.family)
    }

    pub fn drop_indexes(&self) -> Result<()> {
        self.schema().drop_indexes()
    }

    pub fn rebuild_indexes(&self) -> Result<()> {
        self.schema().create_indexes()?;
        self.db
            .execute("ANALYZE")
            .map_err(|e| anyhow!("Failed to analyze {} database: {}", self.family, e))?;
        Ok(())
    }

    pub fn index_names(&self) -> Result<Vec<String>> {
        self.schema().existing_indexes()
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        self.schema().get_meta(key)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.schema().set_meta(key, value)
    }

    /// Record a completed ingestion of `source`
    pub fn record_source_update(&self, source: Source, records: u64) -> Result<()> {
        self.set_meta(
            &format!("source.{}.updated_at", source),
            &Utc::now().to_rfc3339(),
        )?;
        self.set_meta(&format!("source.{}.records", source), &records.to_string())
    }

    /// Counts and last update for every source of this family
    pub fn source_info(&self) -> Result<Vec<SourceInfo>> {
        let repo = self.networks();
        let mut infos = Vec::new();
        for source in self.family.sources() {
            let updated_at = self
                .get_meta(&format!("source.{}.updated_at", source))?
                .and_then(|ts| DateTime::parse_from_rfc3339(&ts).ok())
                .map(|ts| ts.with_timezone(&Utc));
            let last_ingested = self
                .get_meta(&format!("source.{}.records", source))?
                .and_then(|count| count.parse().ok());
            infos.push(SourceInfo {
                source,
                records: repo.count_by_source(source)?,
                last_ingested,
                updated_at,
            });
        }
        Ok(infos)
    }
}

/// Ensure the data directory exists
pub fn ensure_data_dir(data_dir: &str) -> Result<()> {
    std::fs::create_dir_all(data_dir)
        .map_err(|e| anyhow!("Failed to create data directory '{}': {}", data_dir, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = NetblockDatabase::open_in_memory(DatasetFamily::Registry).unwrap();
        assert!(db.networks().is_empty());
        assert_eq!(db.family(), DatasetFamily::Registry);
    }

    #[test]
    fn test_open_in_dir_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let data_dir = data_dir.to_str().unwrap();

        {
            let db = NetblockDatabase::open_in_dir(data_dir, DatasetFamily::Geolocation).unwrap();
            db.set_meta("marker", "kept").unwrap();
        }
        assert!(dir.path().join("data").join("geoip.sqlite3").exists());

        let db = NetblockDatabase::open_in_dir(data_dir, DatasetFamily::Geolocation).unwrap();
        assert_eq!(db.get_meta("marker").unwrap(), Some("kept".to_string()));
    }

    #[test]
    fn test_rebuild_indexes() {
        let db = NetblockDatabase::open_in_memory(DatasetFamily::Registry).unwrap();
        db.drop_indexes().unwrap();
        assert!(db.index_names().unwrap().is_empty());
        db.rebuild_indexes().unwrap();
        assert_eq!(db.index_names().unwrap().len(), 3);
    }

    #[test]
    fn test_source_info() {
        let db = NetblockDatabase::open_in_memory(DatasetFamily::Registry).unwrap();
        db.record_source_update(Source::Apnic, 42).unwrap();

        let infos = db.source_info().unwrap();
        assert_eq!(infos.len(), 5);

        let apnic = infos.iter().find(|i| i.source == Source::Apnic).unwrap();
        assert_eq!(apnic.last_ingested, Some(42));
        assert!(apnic.updated_at.is_some());

        let ripe = infos.iter().find(|i| i.source == Source::Ripe).unwrap();
        assert_eq!(ripe.last_ingested, None);
        assert_eq!(ripe.records, 0);
    }
}
