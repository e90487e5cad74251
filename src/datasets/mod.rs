//! Source dataset readers
//!
//! Turn raw registry dumps and geolocation CSV tables into
//! [`NetblockRecord`](crate::database::netblocks::NetblockRecord)s.

pub mod geoip;
pub mod registry;
pub mod whois;

pub use geoip::{
    load_locations, locations_file_name, AsnReader, GeoBlockReader, GeoLocation, LocationMap,
    ASN_BLOCKS_FILE_NAME, BLOCKS_FILE_NAME,
};
pub use registry::{RegistrySource, WhoisFormat, UNALLOCATED_NETNAMES};
pub use whois::{decode_line, decode_line_lossy, ParseStats, WhoisParser};
