//! GeoLite2-style CSV geolocation tables
//!
//! - locations: `geoname_id` to continent/country/city, one file per language
//! - blocks: `network`, `geoname_id`, `latitude`, `longitude`
//! - ASN blocks: `network`, `autonomous_system_number`, `autonomous_system_organization`
//!
//! Columns are looked up by header name, so extra columns and column order do
//! not matter. Fields are decoded permissively: bytes that are not valid UTF-8
//! are dropped and the row is kept. Short rows read as empty trailing cells.

use crate::database::netblocks::{AsnAssignment, Attributes, GeoAttributes, NetblockRecord, Source};
use crate::datasets::whois::decode_line_lossy;
use crate::range::{cidr_to_range_with, AddressParsing};
use anyhow::{anyhow, Context, Result};
use csv::{ByteRecord, ByteRecordsIntoIter};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Read;
use tracing::{debug, warn};

pub const BLOCKS_FILE_NAME: &str = "GeoLite2-City-Blocks-IPv4.csv";
pub const ASN_BLOCKS_FILE_NAME: &str = "GeoLite2-ASN-Blocks-IPv4.csv";

/// Locations file for a language code such as `en` or `de`
pub fn locations_file_name(language: &str) -> String {
    format!("GeoLite2-City-Locations-{}.csv", language)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub continent: String,
    pub country: String,
    pub city: String,
}

pub type LocationMap = HashMap<String, GeoLocation>;

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new().flexible(true).from_reader(reader)
}

fn column(headers: &ByteRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| decode_line_lossy(h).trim() == name)
        .ok_or_else(|| anyhow!("CSV input has no '{}' column", name))
}

fn cell(record: &ByteRecord, idx: usize) -> Cow<'_, str> {
    let bytes = record.get(idx).unwrap_or_default();
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text.trim()),
        Err(_) => Cow::Owned(decode_line_lossy(bytes).trim().to_string()),
    }
}

/// True if any field of the row held bytes that are not valid UTF-8
fn has_undecodable(record: &ByteRecord) -> bool {
    record.iter().any(|field| std::str::from_utf8(field).is_err())
}

/// Load the locations table, lowercasing every name
pub fn load_locations<R: Read>(reader: R) -> Result<LocationMap> {
    let mut reader = csv_reader(reader);
    let headers = reader
        .byte_headers()
        .context("Failed to read locations CSV headers")?
        .clone();
    let id_idx = column(&headers, "geoname_id")?;
    let continent_idx = column(&headers, "continent_name")?;
    let country_idx = column(&headers, "country_name")?;
    let city_idx = column(&headers, "city_name")?;

    let mut locations = LocationMap::new();
    for record in reader.byte_records() {
        let record = record.context("Failed to read locations CSV row")?;
        if has_undecodable(&record) {
            debug!("dropped undecodable bytes in location {}", cell(&record, id_idx));
        }
        locations.insert(
            cell(&record, id_idx).into_owned(),
            GeoLocation {
                continent: cell(&record, continent_idx).to_lowercase(),
                country: cell(&record, country_idx).to_lowercase(),
                city: cell(&record, city_idx).to_lowercase(),
            },
        );
    }
    Ok(locations)
}

/// Streams the blocks table as geolocation records joined with `locations`
///
/// Rows whose network does not parse are skipped and counted.
pub struct GeoBlockReader<'m, R: Read> {
    records: ByteRecordsIntoIter<R>,
    network_idx: usize,
    geoname_idx: usize,
    latitude_idx: usize,
    longitude_idx: usize,
    locations: &'m LocationMap,
    mode: AddressParsing,
    skipped: u64,
    decode_errors: u64,
}

impl<'m, R: Read> GeoBlockReader<'m, R> {
    pub fn new(reader: R, locations: &'m LocationMap) -> Result<Self> {
        let mut reader = csv_reader(reader);
        let headers = reader
            .byte_headers()
            .context("Failed to read blocks CSV headers")?
            .clone();

        Ok(Self {
            network_idx: column(&headers, "network")?,
            geoname_idx: column(&headers, "geoname_id")?,
            latitude_idx: column(&headers, "latitude")?,
            longitude_idx: column(&headers, "longitude")?,
            records: reader.into_byte_records(),
            locations,
            mode: AddressParsing::Strict,
            skipped: 0,
            decode_errors: 0,
        })
    }

    pub fn with_address_parsing(mut self, mode: AddressParsing) -> Self {
        self.mode = mode;
        self
    }

    /// Rows dropped because their network was malformed
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Rows kept after dropping undecodable bytes
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors
    }

    fn to_record(&self, row: &ByteRecord) -> Option<NetblockRecord> {
        let network = cell(row, self.network_idx);
        let range = match cidr_to_range_with(&network, self.mode) {
            Ok(range) => range,
            Err(e) => {
                warn!("skipping geolocation block: {}", e);
                return None;
            }
        };

        let location = self
            .locations
            .get(&*cell(row, self.geoname_idx))
            .cloned()
            .unwrap_or_default();

        Some(NetblockRecord::new(
            range,
            Source::Geolocation,
            Attributes::Geolocation(GeoAttributes {
                continent: location.continent,
                country: location.country,
                city: location.city,
                latitude: cell(row, self.latitude_idx).parse().ok(),
                longitude: cell(row, self.longitude_idx).parse().ok(),
                asn: String::new(),
                organization: String::new(),
            }),
        ))
    }
}

impl<R: Read> Iterator for GeoBlockReader<'_, R> {
    type Item = Result<NetblockRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let row = match self.records.next()? {
                Ok(row) => row,
                Err(e) => return Some(Err(anyhow!("Failed to read blocks CSV row: {}", e))),
            };
            if has_undecodable(&row) {
                self.decode_errors += 1;
            }
            match self.to_record(&row) {
                Some(record) => return Some(Ok(record)),
                None => self.skipped += 1,
            }
        }
    }
}

/// Streams the ASN table as update rows keyed by canonical CIDR text
pub struct AsnReader<R: Read> {
    records: ByteRecordsIntoIter<R>,
    network_idx: usize,
    asn_idx: usize,
    organization_idx: usize,
    skipped: u64,
}

impl<R: Read> AsnReader<R> {
    pub fn new(reader: R) -> Result<Self> {
        let mut reader = csv_reader(reader);
        let headers = reader
            .byte_headers()
            .context("Failed to read ASN CSV headers")?
            .clone();

        Ok(Self {
            network_idx: column(&headers, "network")?,
            asn_idx: column(&headers, "autonomous_system_number")?,
            organization_idx: column(&headers, "autonomous_system_organization")?,
            records: reader.into_byte_records(),
            skipped: 0,
        })
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl<R: Read> Iterator for AsnReader<R> {
    type Item = Result<AsnAssignment>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let row = match self.records.next()? {
                Ok(row) => row,
                Err(e) => return Some(Err(anyhow!("Failed to read ASN CSV row: {}", e))),
            };
            let network = cell(&row, self.network_idx);
            match cidr_to_range_with(&network, AddressParsing::Strict)
                .ok()
                .and_then(|range| range.to_cidr())
            {
                Some(network) => {
                    return Some(Ok(AsnAssignment {
                        network,
                        asn: cell(&row, self.asn_idx).into_owned(),
                        organization: cell(&row, self.organization_idx).into_owned(),
                    }))
                }
                None => {
                    warn!("skipping ASN row with malformed network '{}'", network);
                    self.skipped += 1;
                }
            }
        }
    }
}
