//! Constraint compilation
//!
//! A constraint attribute is resolved once into a [`ConstraintKind`]; each of
//! its candidate values is then bound into a [`Predicate`]. Predicates render
//! to SQL clauses over the family's table.

use crate::database::netblocks::{DatasetFamily, SqlClause};
use crate::error::NetblockError;
use crate::range::{parse_address, parse_range_spec, AddressParsing, Ipv4Range};
use rusqlite::types::Value;
use serde::Serialize;

/// Attribute name that selects point containment
pub const ADDRESS_ATTRIBUTE: &str = "ipaddr";
/// Prefix that negates a substring constraint
pub const NEGATION_PREFIX: &str = "no_";
pub const SQUARE_ATTRIBUTE: &str = "square";
pub const CIRCLE_ATTRIBUTE: &str = "circle";

/// Kilometres per degree of latitude
pub const KM_PER_DEGREE: f64 = 110.574;

/// What a constraint attribute asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Address,
    Parent,
    Nested,
    Contains(&'static str),
    NotContains(&'static str),
    Square,
    Circle,
}

impl ConstraintKind {
    pub fn resolve(family: DatasetFamily, attribute: &str) -> Result<Self, NetblockError> {
        let attribute = attribute.trim();
        if attribute == ADDRESS_ATTRIBUTE {
            return Ok(ConstraintKind::Address);
        }
        if attribute == family.range_field() {
            return Ok(ConstraintKind::Parent);
        }
        if attribute == family.nested_field() {
            return Ok(ConstraintKind::Nested);
        }
        if family == DatasetFamily::Geolocation {
            match attribute {
                SQUARE_ATTRIBUTE => return Ok(ConstraintKind::Square),
                CIRCLE_ATTRIBUTE => return Ok(ConstraintKind::Circle),
                _ => {}
            }
        }
        match attribute.strip_prefix(NEGATION_PREFIX) {
            Some(field) => family
                .validate_field(field)
                .map(ConstraintKind::NotContains)
                .map_err(|_| NetblockError::UnknownField(attribute.to_string())),
            None => family.validate_field(attribute).map(ConstraintKind::Contains),
        }
    }

    pub fn bind(&self, value: &str, mode: AddressParsing) -> Result<Predicate, NetblockError> {
        let predicate = match *self {
            ConstraintKind::Address => Predicate::Containment(parse_address(value, mode)?),
            ConstraintKind::Parent => Predicate::Parent(parse_span(value, mode)?),
            ConstraintKind::Nested => Predicate::Nested(parse_span(value, mode)?),
            ConstraintKind::Contains(field) => Predicate::Contains {
                field,
                pattern: value.to_string(),
            },
            ConstraintKind::NotContains(field) => Predicate::NotContains {
                field,
                pattern: value.to_string(),
            },
            ConstraintKind::Square => parse_square(value)?,
            ConstraintKind::Circle => parse_circle(value)?,
        };
        Ok(predicate)
    }
}

/// One compiled constraint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Predicate {
    /// Rows sharing the smallest range containing the address
    Containment(u32),
    /// Rows sharing the smallest range enclosing the range
    Parent(Ipv4Range),
    /// Rows inside the range
    Nested(Ipv4Range),
    Contains {
        field: &'static str,
        pattern: String,
    },
    NotContains {
        field: &'static str,
        pattern: String,
    },
    WithinBox {
        lat_min: f64,
        lat_max: f64,
        lon_min: f64,
        lon_max: f64,
    },
    WithinRadius {
        latitude: f64,
        longitude: f64,
        radius_deg: f64,
    },
}

impl Predicate {
    pub fn to_clause(&self, family: DatasetFamily) -> SqlClause {
        match self {
            Predicate::Containment(addr) => {
                SqlClause::covering(family.table(), Ipv4Range::single(*addr))
            }
            Predicate::Parent(range) => SqlClause::covering(family.table(), *range),
            Predicate::Nested(range) => SqlClause::nested(*range),
            Predicate::Contains { field, pattern } => SqlClause::substring(field, pattern, false),
            Predicate::NotContains { field, pattern } => {
                SqlClause::substring(field, pattern, true)
            }
            Predicate::WithinBox {
                lat_min,
                lat_max,
                lon_min,
                lon_max,
            } => SqlClause::new(
                "(latitude BETWEEN ? AND ? AND longitude BETWEEN ? AND ?)",
                vec![
                    Value::Real(*lat_min),
                    Value::Real(*lat_max),
                    Value::Real(*lon_min),
                    Value::Real(*lon_max),
                ],
            ),
            Predicate::WithinRadius {
                latitude,
                longitude,
                radius_deg,
            } => SqlClause::new(
                "(((latitude - ?) * (latitude - ?) + (longitude - ?) * (longitude - ?)) <= ?)",
                vec![
                    Value::Real(*latitude),
                    Value::Real(*latitude),
                    Value::Real(*longitude),
                    Value::Real(*longitude),
                    Value::Real(radius_deg * radius_deg),
                ],
            ),
        }
    }
}

/// A CIDR, endpoint range or address as one contiguous span
fn parse_span(value: &str, mode: AddressParsing) -> Result<Ipv4Range, NetblockError> {
    let ranges = parse_range_spec(value, mode)?;
    match (ranges.first(), ranges.last()) {
        (Some(first), Some(last)) => Ok(Ipv4Range {
            begin: first.begin,
            end: last.end,
        }),
        _ => Err(NetblockError::malformed(value, "empty range")),
    }
}

/// Parse a coordinate with an optional hemisphere letter (`52.3N`, `W4.9`)
pub fn parse_coordinate(text: &str) -> Option<f64> {
    let upper = text.trim().to_uppercase();
    let mut sign = 1.0;
    let mut number = upper.as_str();
    for hemisphere in ['N', 'S', 'E', 'W'] {
        if let Some(rest) = number
            .strip_suffix(hemisphere)
            .or_else(|| number.strip_prefix(hemisphere))
        {
            if matches!(hemisphere, 'S' | 'W') {
                sign = -1.0;
            }
            number = rest;
            break;
        }
    }
    number.trim().parse::<f64>().ok().map(|v| v * sign)
}

fn coordinates(value: &str, expected: usize) -> Result<Vec<f64>, NetblockError> {
    let parts: Vec<&str> = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != expected {
        return Err(NetblockError::InvalidArea(value.to_string()));
    }
    parts
        .iter()
        .map(|p| parse_coordinate(p).ok_or_else(|| NetblockError::InvalidArea(value.to_string())))
        .collect()
}

/// `lat1 lon1 lat2 lon2`, corners in any order
fn parse_square(value: &str) -> Result<Predicate, NetblockError> {
    let c = coordinates(value, 4)?;
    Ok(Predicate::WithinBox {
        lat_min: c[0].min(c[2]),
        lat_max: c[0].max(c[2]),
        lon_min: c[1].min(c[3]),
        lon_max: c[1].max(c[3]),
    })
}

/// `lat lon radius_km`
fn parse_circle(value: &str) -> Result<Predicate, NetblockError> {
    let c = coordinates(value, 3)?;
    if c[2] < 0.0 {
        return Err(NetblockError::InvalidArea(value.to_string()));
    }
    Ok(Predicate::WithinRadius {
        latitude: c[0],
        longitude: c[1],
        radius_deg: c[2] / KM_PER_DEGREE,
    })
}
