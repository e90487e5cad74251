//! Netblock record types
//!
//! Every dataset is normalized into [`NetblockRecord`]: an inclusive address
//! range, the source it came from and a fixed attribute struct for its family.

use crate::error::NetblockError;
use crate::range::Ipv4Range;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Separator used when a registry field appears more than once in a block
pub const MULTI_VALUE_SEPARATOR: &str = "; ";

/// Origin of a stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Ripe,
    Afrinic,
    Apnic,
    Lacnic,
    Arin,
    Geolocation,
}

impl Source {
    pub const REGISTRIES: [Source; 5] = [
        Source::Ripe,
        Source::Afrinic,
        Source::Apnic,
        Source::Lacnic,
        Source::Arin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Ripe => "ripe",
            Source::Afrinic => "afrinic",
            Source::Apnic => "apnic",
            Source::Lacnic => "lacnic",
            Source::Arin => "arin",
            Source::Geolocation => "geolocation",
        }
    }

    pub fn family(&self) -> DatasetFamily {
        match self {
            Source::Geolocation => DatasetFamily::Geolocation,
            _ => DatasetFamily::Registry,
        }
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ripe" => Ok(Source::Ripe),
            "afrinic" => Ok(Source::Afrinic),
            "apnic" => Ok(Source::Apnic),
            "lacnic" => Ok(Source::Lacnic),
            "arin" => Ok(Source::Arin),
            "geolocation" | "geoip" => Ok(Source::Geolocation),
            _ => Err(format!(
                "Unknown source: {}. Valid sources: ripe, afrinic, apnic, lacnic, arin, geolocation",
                s
            )),
        }
    }
}

/// Dataset family: decides table, range field name and attribute set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetFamily {
    Registry,
    Geolocation,
}

const REGISTRY_FIELDS: &[&str] = &[
    "netname", "descr", "city", "country", "notify", "address", "phone",
];

const GEO_FIELDS: &[&str] = &[
    "continent",
    "country",
    "city",
    "latitude",
    "longitude",
    "asn",
    "organization",
];

impl DatasetFamily {
    pub fn table(&self) -> &'static str {
        match self {
            DatasetFamily::Registry => "registry_networks",
            DatasetFamily::Geolocation => "geoip_networks",
        }
    }

    /// Column holding the CIDR text, also the name of the parent-lookup constraint
    pub fn range_field(&self) -> &'static str {
        match self {
            DatasetFamily::Registry => "inetnum",
            DatasetFamily::Geolocation => "network",
        }
    }

    /// Name of the nested-lookup constraint
    pub fn nested_field(&self) -> &'static str {
        match self {
            DatasetFamily::Registry => "inetnums",
            DatasetFamily::Geolocation => "networks",
        }
    }

    pub fn attribute_fields(&self) -> &'static [&'static str] {
        match self {
            DatasetFamily::Registry => REGISTRY_FIELDS,
            DatasetFamily::Geolocation => GEO_FIELDS,
        }
    }

    /// Text-searchable columns: range field, attributes and source
    pub fn searchable_fields(&self) -> Vec<&'static str> {
        let mut fields = vec![self.range_field()];
        fields.extend_from_slice(self.attribute_fields());
        fields.push("source");
        fields
    }

    /// Every stored column in table order
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = vec!["ip_begin", "ip_end"];
        columns.extend(self.searchable_fields());
        columns
    }

    /// Resolve user-facing aliases to a stored column name
    pub fn resolve_field(&self, name: &str) -> Option<&'static str> {
        let name = match (self, name) {
            (DatasetFamily::Geolocation, "org") => "organization",
            (DatasetFamily::Geolocation, "lat") => "latitude",
            (DatasetFamily::Geolocation, "long" | "lon") => "longitude",
            (_, other) => other,
        };
        self.columns().into_iter().find(|c| *c == name)
    }

    pub fn validate_field(&self, name: &str) -> Result<&'static str, NetblockError> {
        self.searchable_fields()
            .into_iter()
            .find(|f| Some(*f) == self.resolve_field(name))
            .ok_or_else(|| NetblockError::UnknownField(name.to_string()))
    }

    /// Fields shown when the caller asks for no explicit projection
    pub fn default_projection(&self) -> Vec<String> {
        let fields: &[&str] = match self {
            DatasetFamily::Registry => &[
                "inetnum", "netname", "descr", "country", "notify", "address", "phone",
            ],
            DatasetFamily::Geolocation => &[
                "network",
                "asn",
                "organization",
                "continent",
                "country",
                "city",
                "latitude",
                "longitude",
            ],
        };
        fields.iter().map(|f| f.to_string()).collect()
    }

    pub fn sources(&self) -> Vec<Source> {
        match self {
            DatasetFamily::Registry => Source::REGISTRIES.to_vec(),
            DatasetFamily::Geolocation => vec![Source::Geolocation],
        }
    }

    /// Default database file name inside the data directory
    pub fn file_name(&self) -> &'static str {
        match self {
            DatasetFamily::Registry => "rir.sqlite3",
            DatasetFamily::Geolocation => "geoip.sqlite3",
        }
    }
}

impl Display for DatasetFamily {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetFamily::Registry => write!(f, "registry"),
            DatasetFamily::Geolocation => write!(f, "geolocation"),
        }
    }
}

/// Attributes of a registry (WHOIS) record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryAttributes {
    pub netname: String,
    pub descr: String,
    pub city: String,
    pub country: String,
    pub notify: String,
    pub address: String,
    pub phone: String,
}

impl RegistryAttributes {
    fn slot(&mut self, field: &str) -> Option<&mut String> {
        match field {
            "netname" => Some(&mut self.netname),
            "descr" => Some(&mut self.descr),
            "city" => Some(&mut self.city),
            "country" => Some(&mut self.country),
            "notify" => Some(&mut self.notify),
            "address" => Some(&mut self.address),
            "phone" => Some(&mut self.phone),
            _ => None,
        }
    }

    /// Append a value, joining repeated fields with `"; "`
    ///
    /// Returns false if the field is not a registry attribute.
    pub fn push_value(&mut self, field: &str, value: &str) -> bool {
        match self.slot(field) {
            Some(slot) => {
                if !slot.is_empty() {
                    slot.push_str(MULTI_VALUE_SEPARATOR);
                }
                slot.push_str(value);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        match field {
            "netname" => Some(&self.netname),
            "descr" => Some(&self.descr),
            "city" => Some(&self.city),
            "country" => Some(&self.country),
            "notify" => Some(&self.notify),
            "address" => Some(&self.address),
            "phone" => Some(&self.phone),
            _ => None,
        }
    }
}

/// Attributes of a geolocation record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoAttributes {
    pub continent: String,
    pub country: String,
    pub city: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub asn: String,
    pub organization: String,
}

impl GeoAttributes {
    pub fn get(&self, field: &str) -> Option<String> {
        let value = match field {
            "continent" => self.continent.clone(),
            "country" => self.country.clone(),
            "city" => self.city.clone(),
            "latitude" => self.latitude.map(|v| v.to_string()).unwrap_or_default(),
            "longitude" => self.longitude.map(|v| v.to_string()).unwrap_or_default(),
            "asn" => self.asn.clone(),
            "organization" => self.organization.clone(),
            _ => return None,
        };
        Some(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Attributes {
    Registry(RegistryAttributes),
    Geolocation(GeoAttributes),
}

impl Attributes {
    pub fn family(&self) -> DatasetFamily {
        match self {
            Attributes::Registry(_) => DatasetFamily::Registry,
            Attributes::Geolocation(_) => DatasetFamily::Geolocation,
        }
    }

    pub fn get(&self, field: &str) -> Option<String> {
        match self {
            Attributes::Registry(attrs) => attrs.get(field).map(|v| v.to_string()),
            Attributes::Geolocation(attrs) => attrs.get(field),
        }
    }
}

/// A normalized netblock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetblockRecord {
    pub ip_begin: u32,
    pub ip_end: u32,
    /// Canonical CIDR text, `None` if the range is not one aligned block
    pub cidr: Option<String>,
    pub source: Source,
    pub attributes: Attributes,
}

impl NetblockRecord {
    /// Build a record for `range`, filling in its canonical CIDR text
    pub fn new(range: Ipv4Range, source: Source, attributes: Attributes) -> Self {
        Self {
            ip_begin: range.begin,
            ip_end: range.end,
            cidr: range.to_cidr(),
            source,
            attributes,
        }
    }

    pub fn range(&self) -> Ipv4Range {
        Ipv4Range {
            begin: self.ip_begin,
            end: self.ip_end,
        }
    }

    pub fn family(&self) -> DatasetFamily {
        self.attributes.family()
    }

    /// Range as CIDR text, or `a - b` when it is not a single block
    pub fn range_text(&self) -> String {
        match &self.cidr {
            Some(cidr) => cidr.clone(),
            None => self.range().to_string(),
        }
    }

    /// Value of a named field as text; unknown names yield an empty string
    pub fn field(&self, name: &str) -> String {
        let family = self.family();
        let Some(column) = family.resolve_field(name) else {
            return String::new();
        };
        match column {
            "ip_begin" => Ipv4Addr::from(self.ip_begin).to_string(),
            "ip_end" => Ipv4Addr::from(self.ip_end).to_string(),
            "source" => self.source.to_string(),
            c if c == family.range_field() => self.range_text(),
            c => self.attributes.get(c).unwrap_or_default(),
        }
    }
}
