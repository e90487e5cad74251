//! Regional registry catalogue
//!
//! Each registry publishes a WHOIS dump whose blocks are keyed by a range
//! field (`inetnum` for most, `route` for ARIN's routing registry) and carry a
//! registry-specific subset of attributes.

use crate::database::netblocks::Source;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Netnames marking blocks that the registry does not manage
pub const UNALLOCATED_NETNAMES: &[&str] = &["NON-RIPE-NCC-MANAGED-ADDRESS-BLOCK"];

/// Block layout of one WHOIS dump: key field and the attributes to keep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoisFormat {
    pub key_field: String,
    pub fields: Vec<String>,
    /// Groups whose netname is listed here are skipped
    pub unallocated_netnames: Vec<String>,
}

impl WhoisFormat {
    pub fn new(key_field: &str, fields: &[&str]) -> Self {
        Self {
            key_field: key_field.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            unallocated_netnames: UNALLOCATED_NETNAMES
                .iter()
                .map(|n| n.to_string())
                .collect(),
        }
    }

    pub fn is_unallocated(&self, netname: &str) -> bool {
        self.unallocated_netnames.iter().any(|n| n == netname)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrySource {
    Ripe,
    Apnic,
    Afrinic,
    Lacnic,
    Arin,
}

impl RegistrySource {
    pub const ALL: [RegistrySource; 5] = [
        RegistrySource::Ripe,
        RegistrySource::Apnic,
        RegistrySource::Afrinic,
        RegistrySource::Lacnic,
        RegistrySource::Arin,
    ];

    pub fn source(&self) -> Source {
        match self {
            RegistrySource::Ripe => Source::Ripe,
            RegistrySource::Apnic => Source::Apnic,
            RegistrySource::Afrinic => Source::Afrinic,
            RegistrySource::Lacnic => Source::Lacnic,
            RegistrySource::Arin => Source::Arin,
        }
    }

    /// Published dump location; fetching it is left to the caller
    pub fn dump_url(&self) -> &'static str {
        match self {
            RegistrySource::Ripe => "ftp://ftp.ripe.net/ripe/dbase/ripe.db.gz",
            RegistrySource::Apnic => "https://ftp.apnic.net/apnic/whois/apnic.db.inetnum.gz",
            RegistrySource::Afrinic => "https://ftp.afrinic.net/dbase/afrinic.db.gz",
            RegistrySource::Lacnic => "https://ftp.lacnic.net/lacnic/dbase/lacnic.db.gz",
            RegistrySource::Arin => "https://ftp.arin.net/pub/rr/arin.db.gz",
        }
    }

    pub fn format(&self) -> WhoisFormat {
        match self {
            RegistrySource::Ripe | RegistrySource::Afrinic => WhoisFormat::new(
                "inetnum",
                &["netname", "descr", "country", "notify", "address", "phone"],
            ),
            RegistrySource::Apnic => {
                WhoisFormat::new("inetnum", &["netname", "descr", "country"])
            }
            RegistrySource::Lacnic => WhoisFormat::new("inetnum", &["country", "city"]),
            RegistrySource::Arin => WhoisFormat::new("route", &["descr", "notify"]),
        }
    }
}

impl Display for RegistrySource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source())
    }
}

impl FromStr for RegistrySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<Source>()? {
            Source::Ripe => Ok(RegistrySource::Ripe),
            Source::Apnic => Ok(RegistrySource::Apnic),
            Source::Afrinic => Ok(RegistrySource::Afrinic),
            Source::Lacnic => Ok(RegistrySource::Lacnic),
            Source::Arin => Ok(RegistrySource::Arin),
            Source::Geolocation => Err(format!("{} is not a registry", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formats() {
        assert_eq!(RegistrySource::Arin.format().key_field, "route");
        assert_eq!(
            RegistrySource::Lacnic.format().fields,
            vec!["country".to_string(), "city".to_string()]
        );
        for registry in RegistrySource::ALL {
            assert!(registry.format().is_unallocated("NON-RIPE-NCC-MANAGED-ADDRESS-BLOCK"));
            assert!(registry.dump_url().ends_with(".gz"));
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!("afrinic".parse::<RegistrySource>(), Ok(RegistrySource::Afrinic));
        assert!("geolocation".parse::<RegistrySource>().is_err());
        assert_eq!(RegistrySource::Apnic.to_string(), "apnic");
    }
}
