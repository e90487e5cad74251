//! Database module
//!
//! Range-indexed SQLite storage for netblock records, organized into:
//!
//! - **core**: connection wrapper, schema definitions and management
//! - **netblocks**: record types, the range repository and the per-family store
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/           # Foundation
//! │   ├── connection  # SQLite DatabaseConn wrapper
//! │   └── schema      # table/index definitions, schema status
//! │
//! └── netblocks/      # Range index store
//!     ├── types       # NetblockRecord, Source, DatasetFamily
//!     └── repository  # range lookups and batched writes
//! ```
//!
//! Ranges are stored as integer `[ip_begin, ip_end]` pairs, so containment and
//! nesting are plain comparisons served by the begin/end indexes.
//!
//! # Usage
//!
//! ```rust,ignore
//! use georipe::database::{DatasetFamily, NetblockDatabase};
//!
//! let db = NetblockDatabase::open_in_dir("~/.georipe", DatasetFamily::Registry)?;
//! for record in db.networks().lookup_containing(0xC100_068B)? {
//!     println!("{} {}", record.range_text(), record.field("netname"));
//! }
//! ```

pub mod core;
pub mod netblocks;

pub use core::{DatabaseConn, SchemaDefinitions, SchemaManager, SchemaStatus, SCHEMA_VERSION};

pub use netblocks::{
    ensure_data_dir, AsnAssignment, Attributes, DatasetFamily, GeoAttributes, NetblockDatabase,
    NetblockRecord, NetblockRepository, RegistryAttributes, Source, SourceInfo, SqlClause,
    MULTI_VALUE_SEPARATOR,
};
