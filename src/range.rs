//! IPv4 range codec
//!
//! Converts between textual forms (`a.b.c.d/n`, `a.b.c.d - e.f.g.h`, bare
//! addresses) and inclusive `[begin, end]` integer ranges.

use crate::error::NetblockError;
use ipnet::{Ipv4Net, Ipv4Subnets};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;

/// How to treat addresses with fewer than four octets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressParsing {
    /// Exactly four octets are required
    #[default]
    Strict,
    /// Missing trailing octets are filled with zero (`10.0` is `10.0.0.0`)
    Lenient,
}

/// Inclusive IPv4 range, `begin <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ipv4Range {
    pub begin: u32,
    pub end: u32,
}

impl Ipv4Range {
    pub fn new(begin: u32, end: u32) -> Result<Self, NetblockError> {
        if begin > end {
            return Err(NetblockError::malformed(
                &format!("{} - {}", Ipv4Addr::from(begin), Ipv4Addr::from(end)),
                "range end is below range begin",
            ));
        }
        Ok(Self { begin, end })
    }

    pub fn single(addr: u32) -> Self {
        Self {
            begin: addr,
            end: addr,
        }
    }

    /// The whole IPv4 space
    pub fn full() -> Self {
        Self {
            begin: 0,
            end: u32::MAX,
        }
    }

    pub fn is_full(&self) -> bool {
        self.begin == 0 && self.end == u32::MAX
    }

    /// Number of addresses in the range, zero if `begin > end`
    pub fn size(&self) -> u64 {
        if self.begin > self.end {
            return 0;
        }
        (self.end - self.begin) as u64 + 1
    }

    pub fn contains(&self, addr: u32) -> bool {
        self.begin <= addr && addr <= self.end
    }

    /// True if `other` lies fully inside this range
    pub fn covers(&self, other: &Ipv4Range) -> bool {
        self.begin <= other.begin && other.end <= self.end
    }

    /// The range extended by one address below, if there is room
    pub fn widen_low(&self) -> Option<Ipv4Range> {
        self.begin.checked_sub(1).map(|begin| Ipv4Range {
            begin,
            end: self.end,
        })
    }

    /// The range extended by one address above, if there is room
    pub fn widen_high(&self) -> Option<Ipv4Range> {
        self.end.checked_add(1).map(|end| Ipv4Range {
            begin: self.begin,
            end,
        })
    }

    /// Canonical CIDR text when the range is a single aligned block
    pub fn to_cidr(&self) -> Option<String> {
        range_to_cidr(self.begin, self.end)
    }

    /// Minimal ordered list of CIDR blocks covering the range
    pub fn to_cidrs(&self) -> Vec<Ipv4Net> {
        range_to_cidrs(self.begin, self.end)
    }
}

impl Display for Ipv4Range {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} - {}",
            Ipv4Addr::from(self.begin),
            Ipv4Addr::from(self.end)
        )
    }
}

/// Parse a dotted-quad address into its integer form
pub fn parse_address(text: &str, mode: AddressParsing) -> Result<u32, NetblockError> {
    let trimmed = text.trim();
    let parts: Vec<&str> = trimmed.split('.').collect();

    if parts.len() > 4 {
        return Err(NetblockError::malformed(trimmed, "more than four octets"));
    }
    if parts.len() < 4 && mode == AddressParsing::Strict {
        return Err(NetblockError::malformed(trimmed, "expected four octets"));
    }

    let mut value: u32 = 0;
    for i in 0..4 {
        let octet = match parts.get(i) {
            Some(part) => parse_octet(trimmed, part)?,
            None => 0,
        };
        value = (value << 8) | octet as u32;
    }
    Ok(value)
}

fn parse_octet(input: &str, part: &str) -> Result<u8, NetblockError> {
    if part.is_empty() {
        return Err(NetblockError::malformed(input, "empty octet"));
    }
    if !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NetblockError::malformed(
            input,
            format!("non-numeric octet '{}'", part),
        ));
    }
    part.parse::<u8>().map_err(|_| {
        NetblockError::malformed(input, format!("octet '{}' out of range 0-255", part))
    })
}

/// Parse `a.b.c.d/n` (mask defaults to 32) into its inclusive range
pub fn cidr_to_range(text: &str) -> Result<Ipv4Range, NetblockError> {
    cidr_to_range_with(text, AddressParsing::Strict)
}

pub fn cidr_to_range_with(text: &str, mode: AddressParsing) -> Result<Ipv4Range, NetblockError> {
    let trimmed = text.trim();
    let (addr_text, mask) = match trimmed.split_once('/') {
        Some((addr, mask_text)) => {
            let mask_text = mask_text.trim();
            if mask_text.is_empty() || !mask_text.bytes().all(|b| b.is_ascii_digit()) {
                return Err(NetblockError::malformed(trimmed, "non-numeric mask"));
            }
            let mask: u32 = mask_text
                .parse()
                .map_err(|_| NetblockError::malformed(trimmed, "mask out of range 0-32"))?;
            if mask > 32 {
                return Err(NetblockError::malformed(trimmed, "mask out of range 0-32"));
            }
            (addr, mask)
        }
        None => (trimmed, 32),
    };

    let addr = parse_address(addr_text, mode)?;
    let host_mask: u32 = ((1u64 << (32 - mask)) - 1) as u32;
    let begin = addr & !host_mask;
    Ok(Ipv4Range {
        begin,
        end: begin | host_mask,
    })
}

/// Decompose `[begin, end]` into the minimal ordered set of CIDR blocks
///
/// Each block is the largest one aligned at the current start that does not
/// run past `end`. Returns an empty list when `begin > end`.
pub fn range_to_cidrs(begin: u32, end: u32) -> Vec<Ipv4Net> {
    if begin > end {
        return Vec::new();
    }
    Ipv4Subnets::new(Ipv4Addr::from(begin), Ipv4Addr::from(end), 0).collect()
}

/// Canonical CIDR text for `[begin, end]` if it is exactly one block
pub fn range_to_cidr(begin: u32, end: u32) -> Option<String> {
    let nets = range_to_cidrs(begin, end);
    match nets.as_slice() {
        [net] => Some(net.to_string()),
        _ => None,
    }
}

/// Parse a registry range field: a CIDR, an `a.b.c.d - e.f.g.h` endpoint pair,
/// or a bare address
///
/// Endpoint pairs are decomposed into aligned blocks, so the result is one or
/// more ranges that each map to a single CIDR.
pub fn parse_range_spec(text: &str, mode: AddressParsing) -> Result<Vec<Ipv4Range>, NetblockError> {
    let trimmed = text.trim();
    if trimmed.contains('/') {
        return Ok(vec![cidr_to_range_with(trimmed, mode)?]);
    }

    match trimmed.split_once('-') {
        Some((from, to)) => {
            let begin = parse_address(from, mode)?;
            let end = parse_address(to, mode)?;
            if begin > end {
                return Err(NetblockError::malformed(
                    trimmed,
                    "range end is below range begin",
                ));
            }
            Ok(range_to_cidrs(begin, end)
                .into_iter()
                .map(|net| Ipv4Range {
                    begin: u32::from(net.network()),
                    end: u32::from(net.broadcast()),
                })
                .collect())
        }
        None => Ok(vec![Ipv4Range::single(parse_address(trimmed, mode)?)]),
    }
}
