#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! georipe - IPv4 netblock registry and geolocation search
//!
//! georipe loads regional internet registry (WHOIS) dumps and geolocation CSV
//! tables into range-indexed SQLite stores, then answers attribute queries
//! over them: which block contains an address, which blocks sit inside a
//! range, which blocks mention a country or organization, and which blocks
//! enclose a given one. It can be used as both a command-line application and
//! a library.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | (none) | Library: ingestion, store, queries | `rusqlite`, `oneio`, `csv` |
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | The `georipe` binary | All above + `clap`, `indicatif` |
//!
//! # Architecture
//!
//! - **[`range`]**: IPv4 address, CIDR and range conversions
//! - **[`datasets`]**: WHOIS block parser and geolocation CSV readers
//! - **[`database`]**: SQLite stores, one per dataset family
//! - **[`lens`]**: ingestion, query engine and ancestor discovery
//! - **[`config`]**: configuration management
//! - **[`error`]**: domain error taxonomy
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use georipe::database::{DatasetFamily, NetblockDatabase};
//! use georipe::datasets::RegistrySource;
//! use georipe::lens::ingest::{IngestLens, RegistryInput};
//! use georipe::lens::query::{NetblockQuery, QueryLens};
//!
//! let db = NetblockDatabase::open_in_dir("~/.georipe", DatasetFamily::Registry)?;
//!
//! // Load a RIPE dump, replacing any earlier RIPE records
//! IngestLens::new(&db).ingest_registries(&[RegistryInput::new(
//!     RegistrySource::Ripe,
//!     "ripe.db.inetnum.gz",
//! )])?;
//!
//! // Smallest block containing an address, restricted to Dutch records
//! let query = NetblockQuery::new()
//!     .constraint("ipaddr", ["193.0.6.139"])
//!     .constraint("country", ["NL"])
//!     .project(["inetnum", "netname", "descr"]);
//!
//! for row in QueryLens::new(&db).search(&query)? {
//!     println!("{:?}", row?);
//! }
//! ```

pub mod config;
pub mod database;
pub mod datasets;
pub mod error;
pub mod lens;
pub mod range;

// =============================================================================
// Configuration
// =============================================================================

pub use config::{format_size, get_store_info, GeoripeConfig, StoreInfo};

// =============================================================================
// Errors and ranges
// =============================================================================

pub use error::NetblockError;
pub use range::{
    cidr_to_range, parse_address, parse_range_spec, range_to_cidr, range_to_cidrs,
    AddressParsing, Ipv4Range,
};

// =============================================================================
// Database
// =============================================================================

pub use database::{
    Attributes, DatabaseConn, DatasetFamily, GeoAttributes, NetblockDatabase, NetblockRecord,
    NetblockRepository, RegistryAttributes, SchemaDefinitions, SchemaManager, SchemaStatus,
    Source, SourceInfo, SCHEMA_VERSION,
};

// =============================================================================
// Lenses
// =============================================================================

pub use lens::ancestors::{format_tree, AncestorEntry, AncestorLens};
pub use lens::ingest::{IngestLens, IngestProgress, IngestReport};
pub use lens::query::{NetblockQuery, QueryLens, ResultRow};
pub use lens::utils::{summarize, OutputFormat};
