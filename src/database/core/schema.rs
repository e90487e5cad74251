//! Database schema management
//!
//! Each dataset family lives in its own SQLite file with one netblock table,
//! its range indexes, and a meta table for schema version and per-source
//! bookkeeping.

use crate::database::netblocks::DatasetFamily;
use anyhow::{anyhow, Result};
use rusqlite::Connection;

/// Current schema version
/// Increment this when making breaking schema changes
pub const SCHEMA_VERSION: u32 = 1;

/// Schema definitions for all tables
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    /// SQL for creating the meta table (tracks schema version and source updates)
    pub const META_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS georipe_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );
    "#;

    /// SQL for creating the registry (WHOIS) netblock table
    pub const REGISTRY_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS registry_networks (
            ip_begin INTEGER NOT NULL,
            ip_end INTEGER NOT NULL,
            inetnum TEXT,
            netname TEXT NOT NULL DEFAULT '',
            descr TEXT NOT NULL DEFAULT '',
            city TEXT NOT NULL DEFAULT '',
            country TEXT NOT NULL DEFAULT '',
            notify TEXT NOT NULL DEFAULT '',
            address TEXT NOT NULL DEFAULT '',
            phone TEXT NOT NULL DEFAULT '',
            source TEXT NOT NULL
        );
    "#;

    /// SQL for creating the geolocation netblock table
    pub const GEOIP_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS geoip_networks (
            ip_begin INTEGER NOT NULL,
            ip_end INTEGER NOT NULL,
            network TEXT,
            continent TEXT NOT NULL DEFAULT '',
            country TEXT NOT NULL DEFAULT '',
            city TEXT NOT NULL DEFAULT '',
            latitude REAL,
            longitude REAL,
            asn TEXT NOT NULL DEFAULT '',
            organization TEXT NOT NULL DEFAULT '',
            source TEXT NOT NULL
        );
    "#;

    pub const REGISTRY_INDEXES: &'static [(&'static str, &'static str)] = &[
        (
            "idx_registry_ip_begin",
            "CREATE INDEX IF NOT EXISTS idx_registry_ip_begin ON registry_networks(ip_begin DESC, ip_end)",
        ),
        (
            "idx_registry_ip_end",
            "CREATE INDEX IF NOT EXISTS idx_registry_ip_end ON registry_networks(ip_end)",
        ),
        (
            "idx_registry_inetnum",
            "CREATE INDEX IF NOT EXISTS idx_registry_inetnum ON registry_networks(inetnum)",
        ),
    ];

    pub const GEOIP_INDEXES: &'static [(&'static str, &'static str)] = &[
        (
            "idx_geoip_ip_begin",
            "CREATE INDEX IF NOT EXISTS idx_geoip_ip_begin ON geoip_networks(ip_begin DESC, ip_end)",
        ),
        (
            "idx_geoip_ip_end",
            "CREATE INDEX IF NOT EXISTS idx_geoip_ip_end ON geoip_networks(ip_end)",
        ),
        (
            "idx_geoip_network",
            "CREATE INDEX IF NOT EXISTS idx_geoip_network ON geoip_networks(network)",
        ),
    ];

    pub fn table(family: DatasetFamily) -> &'static str {
        match family {
            DatasetFamily::Registry => Self::REGISTRY_TABLE,
            DatasetFamily::Geolocation => Self::GEOIP_TABLE,
        }
    }

    /// `(name, create statement)` pairs for the family's indexes
    pub fn indexes(family: DatasetFamily) -> &'static [(&'static str, &'static str)] {
        match family {
            DatasetFamily::Registry => Self::REGISTRY_INDEXES,
            DatasetFamily::Geolocation => Self::GEOIP_INDEXES,
        }
    }
}

/// Schema manager for one dataset family's database
///
/// Handles schema initialization, version checking, index maintenance and
/// metadata.
pub struct SchemaManager<'a> {
    conn: &'a Connection,
    family: DatasetFamily,
}

impl<'a> SchemaManager<'a> {
    pub fn new(conn: &'a Connection, family: DatasetFamily) -> Self {
        Self { conn, family }
    }

    /// Initialize the database schema
    ///
    /// Creates the meta table, the netblock table and its indexes if they
    /// don't exist, and records the schema version.
    pub fn initialize(&self) -> Result<()> {
        self.conn
            .execute(SchemaDefinitions::META_TABLE, [])
            .map_err(|e| anyhow!("Failed to create meta table: {}", e))?;

        self.set_meta("schema_version", &SCHEMA_VERSION.to_string())?;
        self.set_meta("family", &self.family.to_string())?;

        self.conn
            .execute(SchemaDefinitions::table(self.family), [])
            .map_err(|e| anyhow!("Failed to create {} table: {}", self.family.table(), e))?;

        self.create_indexes()
    }

    /// Create the range and CIDR-text indexes
    pub fn create_indexes(&self) -> Result<()> {
        for (name, index_sql) in SchemaDefinitions::indexes(self.family) {
            self.conn
                .execute(index_sql, [])
                .map_err(|e| anyhow!("Failed to create index {}: {}", name, e))?;
        }
        Ok(())
    }

    /// Drop the family's indexes ahead of a bulk load
    pub fn drop_indexes(&self) -> Result<()> {
        for (name, _) in SchemaDefinitions::indexes(self.family) {
            self.conn
                .execute(&format!("DROP INDEX IF EXISTS {}", name), [])
                .map_err(|e| anyhow!("Failed to drop index {}: {}", name, e))?;
        }
        Ok(())
    }

    /// Names of the family's indexes currently present
    pub fn existing_indexes(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND tbl_name=?1")
            .map_err(|e| anyhow!("Failed to list indexes: {}", e))?;
        let rows = stmt
            .query_map([self.family.table()], |row| row.get::<_, String>(0))
            .map_err(|e| anyhow!("Failed to list indexes: {}", e))?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        names.sort();
        Ok(names)
    }

    /// Check the current schema status
    pub fn check_status(&self) -> Result<SchemaStatus> {
        if !self.table_exists("georipe_meta") {
            return Ok(SchemaStatus::NotInitialized);
        }

        let current_version = self.get_schema_version()?;

        if current_version == SCHEMA_VERSION {
            if self.verify_integrity()? {
                Ok(SchemaStatus::Current)
            } else {
                Ok(SchemaStatus::Corrupted)
            }
        } else if current_version < SCHEMA_VERSION {
            Ok(SchemaStatus::NeedsMigration {
                from: current_version,
                to: SCHEMA_VERSION,
            })
        } else {
            Ok(SchemaStatus::Incompatible {
                database_version: current_version,
                required_version: SCHEMA_VERSION,
            })
        }
    }

    fn table_exists(&self, table: &str) -> bool {
        let exists: i32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table],
                |row| row.get(0),
            )
            .unwrap_or(0);
        exists > 0
    }

    fn get_schema_version(&self) -> Result<u32> {
        let version = self
            .get_meta("schema_version")?
            .unwrap_or_else(|| "0".to_string());

        version
            .parse()
            .map_err(|e| anyhow!("Invalid schema version: {}", e))
    }

    /// The netblock table must exist and the file must belong to this family
    fn verify_integrity(&self) -> Result<bool> {
        if !self.table_exists(self.family.table()) {
            return Ok(false);
        }
        let family = self.get_meta("family")?;
        Ok(family.as_deref() == Some(self.family.to_string().as_str()))
    }

    /// Set a metadata value
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO georipe_meta (key, value, updated_at) VALUES (?1, ?2, strftime('%s', 'now'))",
                [key, value],
            )
            .map_err(|e| anyhow!("Failed to set meta value: {}", e))?;
        Ok(())
    }

    /// Get a metadata value
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let result: Result<String, _> = self.conn.query_row(
            "SELECT value FROM georipe_meta WHERE key = ?1",
            [key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(anyhow!("Failed to get meta value: {}", e)),
        }
    }

    /// Reset the database by dropping all tables
    pub fn reset(&self) -> Result<()> {
        self.drop_indexes()?;
        for table in [
            "registry_networks",
            "registry_networks_staging",
            "geoip_networks",
            "geoip_networks_staging",
            "georipe_meta",
        ] {
            self.conn
                .execute(&format!("DROP TABLE IF EXISTS {}", table), [])
                .map_err(|e| anyhow!("Failed to drop table {}: {}", table, e))?;
        }
        Ok(())
    }
}

/// Status of the database schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatus {
    /// Database is not initialized (fresh database)
    NotInitialized,

    /// Schema is current and valid
    Current,

    /// Schema needs migration from an older version
    NeedsMigration { from: u32, to: u32 },

    /// Database is from a newer version (incompatible)
    Incompatible {
        database_version: u32,
        required_version: u32,
    },

    /// Schema is corrupted (missing table or wrong family)
    Corrupted,
}
