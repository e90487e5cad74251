//! Query lens
//!
//! Answers attribute constraints over a netblock store. A query is an ordered
//! list of `(attribute, candidate values)` pairs plus an output projection.
//! Every combination of one value per attribute (cartesian product, in
//! attribute order then value order) is run as its own conjunctive lookup and
//! the results are concatenated without deduplication.
//!
//! Attribute names select the lookup:
//!
//! | Attribute | Lookup |
//! |-----------|--------|
//! | `ipaddr` | rows sharing the smallest range containing the address |
//! | `inetnum` / `network` | rows sharing the smallest range enclosing the value |
//! | `inetnums` / `networks` | rows inside the value |
//! | `<field>` | case-insensitive substring of the field |
//! | `no_<field>` | negated substring |
//! | `square`, `circle` | geographic area (geolocation only) |
//!
//! # Example
//!
//! ```rust,ignore
//! use georipe::database::{DatasetFamily, NetblockDatabase};
//! use georipe::lens::query::{NetblockQuery, QueryLens};
//!
//! let db = NetblockDatabase::open_in_dir("~/.georipe", DatasetFamily::Registry)?;
//! let query = NetblockQuery::new()
//!     .constraint("country", ["NL", "BE"])
//!     .constraint("no_descr", ["hosting"])
//!     .project(["inetnum", "netname", "country"]);
//!
//! for row in QueryLens::new(&db).search(&query)? {
//!     println!("{:?}", row?);
//! }
//! ```

mod predicate;
mod values;

pub use predicate::{
    parse_coordinate, ConstraintKind, Predicate, ADDRESS_ATTRIBUTE, KM_PER_DEGREE,
    NEGATION_PREFIX,
};
pub use values::{expand_values, STDIN_SENTINEL};

use crate::database::netblocks::{
    DatasetFamily, NetblockDatabase, NetblockRecord, NetblockRepository,
};
use crate::range::AddressParsing;
use anyhow::{anyhow, Result};
use itertools::Itertools;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::io::BufRead;
use tracing::debug;

// =============================================================================
// Query
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetblockQuery {
    constraints: Vec<(String, Vec<String>)>,
    projection: Vec<String>,
    address_parsing: AddressParsing,
}

impl NetblockQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add candidate values for an attribute
    ///
    /// Values for an attribute already present are appended to it, keeping the
    /// attribute's original position.
    pub fn constraint<I, S>(mut self, attribute: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_constraint(attribute, values);
        self
    }

    pub fn add_constraint<I, S>(&mut self, attribute: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into);
        match self.constraints.iter_mut().find(|(name, _)| name == attribute) {
            Some((_, existing)) => existing.extend(values),
            None => self
                .constraints
                .push((attribute.to_string(), values.collect())),
        }
    }

    /// Output fields in order; duplicates allowed, unknown names render empty
    pub fn project<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn address_parsing(mut self, mode: AddressParsing) -> Self {
        self.address_parsing = mode;
        self
    }

    pub fn constraints(&self) -> &[(String, Vec<String>)] {
        &self.constraints
    }

    /// The projection, or the family's default when none was given
    pub fn projection(&self, family: DatasetFamily) -> Vec<String> {
        if self.projection.is_empty() {
            family.default_projection()
        } else {
            self.projection.clone()
        }
    }

    /// Replace file names and `-` among the values with the values they name
    pub fn expand_inputs<R: BufRead>(mut self, input: &mut R) -> Result<Self> {
        for (_, values) in self.constraints.iter_mut() {
            *values = expand_values(values, input)?;
        }
        Ok(self)
    }
}

/// Split a `field=value` argument
pub fn parse_constraint_arg(arg: &str) -> Result<(String, String)> {
    match arg.split_once('=') {
        Some((field, value)) if !field.trim().is_empty() => {
            Ok((field.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(anyhow!(
            "invalid constraint '{}', expected FIELD=VALUE",
            arg
        )),
    }
}

// =============================================================================
// Result rows
// =============================================================================

/// One output row: projected field names and their values, in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultRow {
    fields: Vec<(String, String)>,
}

impl ResultRow {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    pub fn from_record(record: &NetblockRecord, projection: &[String]) -> Self {
        Self {
            fields: projection
                .iter()
                .map(|name| (name.clone(), record.field(name)))
                .collect(),
        }
    }

    /// First value for `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn values(&self) -> Vec<&str> {
        self.fields.iter().map(|(_, v)| v.as_str()).collect()
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

// =============================================================================
// Lens
// =============================================================================

pub struct QueryLens<'a> {
    db: &'a NetblockDatabase,
}

impl<'a> QueryLens<'a> {
    pub fn new(db: &'a NetblockDatabase) -> Self {
        Self { db }
    }

    /// Compile every constraint value up front
    ///
    /// Returns one predicate tuple per product combination. A malformed
    /// address or unknown field fails here, before any lookup runs.
    pub fn compile(&self, query: &NetblockQuery) -> Result<Vec<Vec<Predicate>>> {
        let family = self.db.family();
        let mut compiled: Vec<Vec<Predicate>> = Vec::with_capacity(query.constraints.len());
        for (attribute, values) in &query.constraints {
            let kind = ConstraintKind::resolve(family, attribute)?;
            let predicates = values
                .iter()
                .map(|v| kind.bind(v, query.address_parsing))
                .collect::<Result<Vec<_>, _>>()?;
            compiled.push(predicates);
        }

        if compiled.is_empty() {
            return Ok(vec![Vec::new()]);
        }
        if compiled.iter().any(|p| p.is_empty()) {
            return Ok(Vec::new());
        }
        Ok(compiled.into_iter().multi_cartesian_product().collect())
    }

    /// Matching records, one lookup per product tuple as the iterator advances
    pub fn records(&self, query: &NetblockQuery) -> Result<RecordStream<'a>> {
        let tuples = self.compile(query)?;
        debug!("query expands to {} lookups", tuples.len());
        Ok(RecordStream {
            repo: self.db.networks(),
            tuples: tuples.into_iter(),
            current: Vec::new().into_iter(),
        })
    }

    /// Matching rows projected onto the query's fields
    pub fn search(&self, query: &NetblockQuery) -> Result<QueryResults<'a>> {
        Ok(QueryResults {
            records: self.records(query)?,
            projection: query.projection(self.db.family()),
        })
    }

    pub fn search_all(&self, query: &NetblockQuery) -> Result<Vec<ResultRow>> {
        self.search(query)?.collect()
    }
}

/// Lazy sequence of matching records; not restartable
pub struct RecordStream<'a> {
    repo: NetblockRepository<'a>,
    tuples: std::vec::IntoIter<Vec<Predicate>>,
    current: std::vec::IntoIter<NetblockRecord>,
}

impl Iterator for RecordStream<'_> {
    type Item = Result<NetblockRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.current.next() {
                return Some(Ok(record));
            }
            let tuple = self.tuples.next()?;
            let family = self.repo.family();
            let clauses: Vec<_> = tuple.iter().map(|p| p.to_clause(family)).collect();
            match self.repo.select_where(&clauses) {
                Ok(records) => self.current = records.into_iter(),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Lazy sequence of projected rows
pub struct QueryResults<'a> {
    records: RecordStream<'a>,
    projection: Vec<String>,
}

impl QueryResults<'_> {
    pub fn projection(&self) -> &[String] {
        &self.projection
    }
}

impl Iterator for QueryResults<'_> {
    type Item = Result<ResultRow>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(record.map(|r| ResultRow::from_record(&r, &self.projection)))
    }
}
