//! Lens module
//!
//! High-level operations over a [`NetblockDatabase`](crate::database::NetblockDatabase).
//! Lenses hold business logic only; the CLI decides how to render what they
//! return.
//!
//! | Lens | Purpose |
//! |------|---------|
//! | `IngestLens` | load registry dumps and geolocation tables |
//! | `QueryLens` | attribute constraints, containment and nesting lookups |
//! | `AncestorLens` | chain of enclosing netblocks for a record |
//!
//! # Usage
//!
//! ```rust,ignore
//! use georipe::database::{DatasetFamily, NetblockDatabase};
//! use georipe::lens::ancestors::AncestorLens;
//! use georipe::lens::query::{NetblockQuery, QueryLens};
//!
//! let db = NetblockDatabase::open_in_dir("~/.georipe", DatasetFamily::Registry)?;
//! let query = NetblockQuery::new().constraint("ipaddr", ["193.0.6.139"]);
//!
//! for record in QueryLens::new(&db).records(&query)? {
//!     let record = record?;
//!     for entry in AncestorLens::new(&db).ancestors(&record)? {
//!         println!("{} {}", entry.depth, entry.record.range_text());
//!     }
//! }
//! ```

pub mod ancestors;
pub mod ingest;
pub mod query;
pub mod utils;
