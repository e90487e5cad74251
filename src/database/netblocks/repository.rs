//! Netblock repository
//!
//! SQLite storage for normalized netblocks, keyed by inclusive
//! `(ip_begin, ip_end)` integer ranges.
//!
//! # Query Modes
//!
//! - **Containing**: the smallest stored range holding an address
//! - **Covering**: the smallest stored range enclosing a range (exact match wins)
//! - **Exact**: rows with exactly the given range
//! - **Nested**: every row enclosed by a range
//! - **Substring**: case-insensitive `LIKE` on a text column
//!
//! Containing and covering lookups return every row (one per source) that
//! shares the winning range: among enclosing ranges, the largest `ip_begin`,
//! then the smallest `ip_end`. Stored ranges are CIDR blocks, which either nest
//! or are disjoint, so this is the smallest enclosing range. The lookup walks
//! the `(ip_begin DESC, ip_end)` index and stops at the first hit.

use crate::database::netblocks::types::{
    Attributes, DatasetFamily, GeoAttributes, NetblockRecord, RegistryAttributes, Source,
};
use crate::range::Ipv4Range;
use anyhow::{anyhow, Result};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A `WHERE` fragment with its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlClause {
    pub sql: String,
    pub params: Vec<Value>,
}

impl SqlClause {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Rows sharing the smallest stored range that encloses `range`
    pub fn covering(table: &str, range: Ipv4Range) -> Self {
        Self::new(
            format!("(ip_begin, ip_end) = ({})", innermost_enclosing_sql(table)),
            vec![
                Value::Integer(range.begin as i64),
                Value::Integer(range.end as i64),
            ],
        )
    }

    /// Rows with exactly `range`
    pub fn exact(range: Ipv4Range) -> Self {
        Self::new(
            "(ip_begin = ? AND ip_end = ?)",
            vec![
                Value::Integer(range.begin as i64),
                Value::Integer(range.end as i64),
            ],
        )
    }

    /// Rows lying fully inside `range`
    pub fn nested(range: Ipv4Range) -> Self {
        Self::new(
            "(ip_begin >= ? AND ip_end <= ?)",
            vec![
                Value::Integer(range.begin as i64),
                Value::Integer(range.end as i64),
            ],
        )
    }

    /// Case-insensitive substring match on `column`
    ///
    /// `column` must already be validated against the family's columns.
    /// `%` and `_` inside `pattern` keep their `LIKE` meaning.
    pub fn substring(column: &str, pattern: &str, negate: bool) -> Self {
        let op = if negate { "NOT LIKE" } else { "LIKE" };
        Self::new(
            format!("(COALESCE({}, '') {} ?)", column, op),
            vec![Value::Text(format!("%{}%", pattern))],
        )
    }
}

/// Innermost enclosing range, two parameters: begin then end
fn innermost_enclosing_sql(table: &str) -> String {
    format!(
        "SELECT ip_begin, ip_end FROM {} WHERE ip_begin <= ? AND ip_end >= ? \
         ORDER BY ip_begin DESC, ip_end ASC LIMIT 1",
        table
    )
}

/// ASN and organization for one geolocation network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsnAssignment {
    pub network: String,
    pub asn: String,
    pub organization: String,
}

/// Repository for netblock data operations
#[derive(Clone, Copy)]
pub struct NetblockRepository<'a> {
    conn: &'a Connection,
    family: DatasetFamily,
}

impl<'a> NetblockRepository<'a> {
    pub fn new(conn: &'a Connection, family: DatasetFamily) -> Self {
        Self { conn, family }
    }

    pub fn family(&self) -> DatasetFamily {
        self.family
    }

    /// Check if the netblock table exists
    pub fn tables_exist(&self) -> bool {
        let exists: i32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [self.family.table()],
                |row| row.get(0),
            )
            .unwrap_or(0);
        exists > 0
    }

    pub fn is_empty(&self) -> bool {
        if !self.tables_exist() {
            return true;
        }
        self.count().unwrap_or(0) == 0
    }

    /// Total number of stored records
    pub fn count(&self) -> Result<u64> {
        if !self.tables_exist() {
            return Ok(0);
        }
        self.conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {}", self.family.table()),
                [],
                |row| row.get(0),
            )
            .map_err(|e| anyhow!("Failed to count {} records: {}", self.family, e))
    }

    /// Number of stored records for one source
    pub fn count_by_source(&self, source: Source) -> Result<u64> {
        if !self.tables_exist() {
            return Ok(0);
        }
        self.conn
            .query_row(
                &format!(
                    "SELECT COUNT(*) FROM {} WHERE source = ?1",
                    self.family.table()
                ),
                [source.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| anyhow!("Failed to count records for {}: {}", source, e))
    }

    /// Insert a batch of records in one transaction
    ///
    /// Records of the wrong family or with `ip_begin > ip_end` are skipped.
    /// Returns the number of rows inserted.
    pub fn insert_batch(&self, records: &[NetblockRecord]) -> Result<usize> {
        self.insert_rows(self.family.table(), records, None)
    }

    /// Insert a batch of `source` records into the staging table
    ///
    /// Staged rows are invisible to lookups until [`Self::promote_staged`]
    /// swaps them in. Records of any other source are skipped.
    pub fn stage_batch(&self, source: Source, records: &[NetblockRecord]) -> Result<usize> {
        self.ensure_staging()?;
        self.insert_rows(&self.staging_table(), records, Some(source))
    }

    /// Replace `source`'s rows with its staged rows in one transaction
    ///
    /// Returns the number of previous rows removed.
    pub fn promote_staged(&self, source: Source) -> Result<usize> {
        self.ensure_staging()?;
        let table = self.family.table();
        let staging = self.staging_table();
        let columns = self.family.columns().join(", ");

        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| anyhow!("Failed to begin transaction: {}", e))?;

        let replaced = tx
            .execute(
                &format!("DELETE FROM {} WHERE source = ?1", table),
                [source.as_str()],
            )
            .map_err(|e| anyhow!("Failed to delete records for {}: {}", source, e))?;
        let promoted = tx
            .execute(
                &format!(
                    "INSERT INTO {table} ({columns}) SELECT {columns} FROM {staging} WHERE source = ?1",
                ),
                [source.as_str()],
            )
            .map_err(|e| anyhow!("Failed to promote staged {} records: {}", source, e))?;
        tx.execute(
            &format!("DELETE FROM {} WHERE source = ?1", staging),
            [source.as_str()],
        )
        .map_err(|e| anyhow!("Failed to clear staged {} records: {}", source, e))?;

        tx.commit()
            .map_err(|e| anyhow!("Failed to commit {} replacement: {}", source, e))?;
        debug!(
            "replaced {} {} records with {} staged",
            replaced, source, promoted
        );
        Ok(replaced)
    }

    /// Drop any staged rows of `source`, returning how many were removed
    pub fn discard_staged(&self, source: Source) -> Result<usize> {
        self.ensure_staging()?;
        self.conn
            .execute(
                &format!("DELETE FROM {} WHERE source = ?1", self.staging_table()),
                [source.as_str()],
            )
            .map_err(|e| anyhow!("Failed to discard staged {} records: {}", source, e))
    }

    fn staging_table(&self) -> String {
        format!("{}_staging", self.family.table())
    }

    /// Create the staging table with the main table's columns
    fn ensure_staging(&self) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} AS SELECT * FROM {} WHERE 0",
                    self.staging_table(),
                    self.family.table()
                ),
                [],
            )
            .map_err(|e| anyhow!("Failed to create {} staging table: {}", self.family, e))?;
        Ok(())
    }

    fn insert_rows(
        &self,
        table: &str,
        records: &[NetblockRecord],
        only: Option<Source>,
    ) -> Result<usize> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| anyhow!("Failed to begin transaction: {}", e))?;

        let mut inserted = 0usize;
        {
            let mut stmt = tx
                .prepare(&self.insert_sql(table))
                .map_err(|e| anyhow!("Failed to prepare insert statement: {}", e))?;

            for record in records {
                if record.ip_begin > record.ip_end {
                    warn!("skipping reversed range {}", record.range_text());
                    continue;
                }
                if only.is_some_and(|source| source != record.source) {
                    warn!("skipping {} record staged for another source", record.source);
                    continue;
                }
                let result = match &record.attributes {
                    Attributes::Registry(attrs) if self.family == DatasetFamily::Registry => stmt
                        .execute(params![
                            record.ip_begin,
                            record.ip_end,
                            record.cidr,
                            attrs.netname,
                            attrs.descr,
                            attrs.city,
                            attrs.country,
                            attrs.notify,
                            attrs.address,
                            attrs.phone,
                            record.source.as_str(),
                        ]),
                    Attributes::Geolocation(attrs)
                        if self.family == DatasetFamily::Geolocation =>
                    {
                        stmt.execute(params![
                            record.ip_begin,
                            record.ip_end,
                            record.cidr,
                            attrs.continent,
                            attrs.country,
                            attrs.city,
                            attrs.latitude,
                            attrs.longitude,
                            attrs.asn,
                            attrs.organization,
                            record.source.as_str(),
                        ])
                    }
                    _ => {
                        warn!(
                            "skipping {} record for {} store",
                            record.family(),
                            self.family
                        );
                        continue;
                    }
                };
                result.map_err(|e| anyhow!("Failed to insert {}: {}", record.range_text(), e))?;
                inserted += 1;
            }
        }

        tx.commit()
            .map_err(|e| anyhow!("Failed to commit batch: {}", e))?;
        Ok(inserted)
    }

    fn insert_sql(&self, table: &str) -> String {
        let columns = self.family.columns();
        let placeholders = vec!["?"; columns.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders
        )
    }

    /// Set ASN and organization on existing geolocation rows by exact CIDR text
    ///
    /// Never inserts. Returns the number of rows updated.
    pub fn update_asn_batch(&self, assignments: &[AsnAssignment]) -> Result<usize> {
        if self.family != DatasetFamily::Geolocation {
            return Err(anyhow!("ASN assignments only apply to geolocation data"));
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| anyhow!("Failed to begin transaction: {}", e))?;

        let mut updated = 0usize;
        {
            let mut stmt = tx
                .prepare(
                    "UPDATE geoip_networks SET asn = ?1, organization = ?2 WHERE network = ?3",
                )
                .map_err(|e| anyhow!("Failed to prepare update statement: {}", e))?;
            for assignment in assignments {
                updated += stmt
                    .execute(params![
                        assignment.asn,
                        assignment.organization,
                        assignment.network
                    ])
                    .map_err(|e| anyhow!("Failed to update {}: {}", assignment.network, e))?;
            }
        }

        tx.commit()
            .map_err(|e| anyhow!("Failed to commit ASN batch: {}", e))?;
        Ok(updated)
    }

    /// Select all rows matching every clause, ordered by range then source
    pub fn select_where(&self, clauses: &[SqlClause]) -> Result<Vec<NetblockRecord>> {
        if !self.tables_exist() {
            return Ok(Vec::new());
        }

        let mut sql = format!(
            "SELECT {} FROM {}",
            self.family.columns().join(", "),
            self.family.table()
        );
        if !clauses.is_empty() {
            let conditions: Vec<&str> = clauses.iter().map(|c| c.sql.as_str()).collect();
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY ip_begin, ip_end, source");

        let params: Vec<&Value> = clauses.iter().flat_map(|c| c.params.iter()).collect();

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| anyhow!("Failed to prepare query: {}", e))?;
        let family = self.family;
        let rows = stmt
            .query_map(params_from_iter(params), |row| row_to_record(row, family))
            .map_err(|e| anyhow!("Failed to run query: {}", e))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(|e| anyhow!("Failed to read row: {}", e))?);
        }
        Ok(results)
    }

    /// Rows sharing the smallest stored range that contains `addr`
    pub fn lookup_containing(&self, addr: u32) -> Result<Vec<NetblockRecord>> {
        self.lookup_covering(Ipv4Range::single(addr))
    }

    /// Rows sharing the smallest stored range that encloses `range`
    pub fn lookup_covering(&self, range: Ipv4Range) -> Result<Vec<NetblockRecord>> {
        self.select_where(&[SqlClause::covering(self.family.table(), range)])
    }

    pub fn lookup_exact(&self, range: Ipv4Range) -> Result<Vec<NetblockRecord>> {
        self.select_where(&[SqlClause::exact(range)])
    }

    /// Every row lying inside `range`
    pub fn lookup_nested(&self, range: Ipv4Range) -> Result<Vec<NetblockRecord>> {
        self.select_where(&[SqlClause::nested(range)])
    }
}

fn row_to_record(row: &Row<'_>, family: DatasetFamily) -> rusqlite::Result<NetblockRecord> {
    let source_text: String = row.get(10)?;
    let source: Source = source_text
        .parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, e.into()))?;

    let attributes = match family {
        DatasetFamily::Registry => Attributes::Registry(RegistryAttributes {
            netname: row.get(3)?,
            descr: row.get(4)?,
            city: row.get(5)?,
            country: row.get(6)?,
            notify: row.get(7)?,
            address: row.get(8)?,
            phone: row.get(9)?,
        }),
        DatasetFamily::Geolocation => Attributes::Geolocation(GeoAttributes {
            continent: row.get(3)?,
            country: row.get(4)?,
            city: row.get(5)?,
            latitude: row.get(6)?,
            longitude: row.get(7)?,
            asn: row.get(8)?,
            organization: row.get(9)?,
        }),
    };

    Ok(NetblockRecord {
        ip_begin: row.get(0)?,
        ip_end: row.get(1)?,
        cidr: row.get(2)?,
        source,
        attributes,
    })
}
