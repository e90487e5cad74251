//! Streaming parser for WHOIS bulk dumps
//!
//! A dump is a sequence of blank-line separated blocks of `key: value` lines.
//! The parser keeps only blocks that start a range with the format's key
//! field, collects the declared attributes, and emits one [`NetblockRecord`]
//! per CIDR block of the range once the block is terminated by a blank line.
//!
//! Lines are decoded permissively: byte sequences that are not valid UTF-8 are
//! dropped and the rest of the line is kept.

use crate::database::netblocks::{Attributes, NetblockRecord, RegistryAttributes, Source};
use crate::datasets::registry::WhoisFormat;
use crate::error::NetblockError;
use crate::range::{parse_range_spec, AddressParsing, Ipv4Range};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::BufRead;
use tracing::{debug, warn};

/// Counters describing what the parser did with its input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseStats {
    pub lines: u64,
    pub records: u64,
    pub groups: u64,
    pub unallocated_groups: u64,
    pub malformed_ranges: u64,
    pub decode_errors: u64,
    pub incomplete_groups: u64,
}

/// Decode a raw line, failing on any invalid UTF-8
pub fn decode_line(bytes: &[u8], line: u64) -> Result<&str, NetblockError> {
    std::str::from_utf8(bytes).map_err(|_| NetblockError::DecodeError { line })
}

/// Decode a raw line keeping only its valid UTF-8 parts
pub fn decode_line_lossy(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

/// Value of `line` if it is a `<name>:` line
fn field_value<'l>(line: &'l str, name: &str) -> Option<&'l str> {
    line.strip_prefix(name)?.strip_prefix(':').map(str::trim)
}

struct RecordGroup {
    ranges: Vec<Ipv4Range>,
    attributes: RegistryAttributes,
    started_at: u64,
}

enum ParserState {
    Seeking,
    Accumulating(RecordGroup),
}

/// Iterator over the records of a WHOIS dump
pub struct WhoisParser<R: BufRead> {
    reader: R,
    format: WhoisFormat,
    source: Source,
    mode: AddressParsing,
    state: ParserState,
    pending: VecDeque<NetblockRecord>,
    buf: Vec<u8>,
    done: bool,
    stats: ParseStats,
}

impl<R: BufRead> WhoisParser<R> {
    pub fn new(reader: R, format: WhoisFormat, source: Source) -> Self {
        Self {
            reader,
            format,
            source,
            mode: AddressParsing::Strict,
            state: ParserState::Seeking,
            pending: VecDeque::new(),
            buf: Vec::new(),
            done: false,
            stats: ParseStats::default(),
        }
    }

    pub fn with_address_parsing(mut self, mode: AddressParsing) -> Self {
        self.mode = mode;
        self
    }

    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }

    fn handle_line(&mut self, line: &str) {
        let line = line.trim_end_matches(['\r', '\n']);

        if line.trim().is_empty() {
            if let ParserState::Accumulating(group) =
                std::mem::replace(&mut self.state, ParserState::Seeking)
            {
                self.emit(group);
            }
            return;
        }

        if let Some(value) = field_value(line, &self.format.key_field) {
            match parse_range_spec(value, self.mode) {
                Ok(ranges) => match &mut self.state {
                    ParserState::Accumulating(group) => group.ranges = ranges,
                    ParserState::Seeking => {
                        self.state = ParserState::Accumulating(RecordGroup {
                            ranges,
                            attributes: RegistryAttributes::default(),
                            started_at: self.stats.lines,
                        })
                    }
                },
                Err(e) => {
                    warn!("{}: skipping block at line {}: {}", self.source, self.stats.lines, e);
                    self.stats.malformed_ranges += 1;
                    self.state = ParserState::Seeking;
                }
            }
            return;
        }

        if let ParserState::Accumulating(group) = &mut self.state {
            for field in &self.format.fields {
                if let Some(value) = field_value(line, field) {
                    if !value.is_empty() {
                        group.attributes.push_value(field, value);
                    }
                    break;
                }
            }
        }
    }

    fn emit(&mut self, group: RecordGroup) {
        self.stats.groups += 1;
        if self.format.is_unallocated(&group.attributes.netname) {
            self.stats.unallocated_groups += 1;
            return;
        }
        for range in group.ranges {
            self.stats.records += 1;
            self.pending.push_back(NetblockRecord::new(
                range,
                self.source,
                Attributes::Registry(group.attributes.clone()),
            ));
        }
    }

    fn finish(&mut self) {
        if let ParserState::Accumulating(group) =
            std::mem::replace(&mut self.state, ParserState::Seeking)
        {
            self.stats.incomplete_groups += 1;
            debug!(
                "{}: {}",
                self.source,
                NetblockError::IncompleteGroup {
                    line: group.started_at
                }
            );
        }
    }
}

impl<R: BufRead> Iterator for WhoisParser<R> {
    type Item = std::io::Result<NetblockRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(Ok(record));
            }
            if self.done {
                return None;
            }

            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    self.finish();
                }
                Ok(_) => {
                    self.stats.lines += 1;
                    let line = match decode_line(&self.buf, self.stats.lines) {
                        Ok(line) => line.to_string(),
                        Err(e) => {
                            debug!("{}: {}", self.source, e);
                            self.stats.decode_errors += 1;
                            decode_line_lossy(&self.buf)
                        }
                    };
                    self.handle_line(&line);
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::registry::RegistrySource;
    use std::io::Cursor;

    fn parse(input: &[u8], registry: RegistrySource) -> (Vec<NetblockRecord>, ParseStats) {
        let mut parser = WhoisParser::new(Cursor::new(input), registry.format(), registry.source());
        let records: Vec<NetblockRecord> = parser.by_ref().map(|r| r.unwrap()).collect();
        (records, parser.stats().clone())
    }

    const RIPE_DUMP: &str = "\
% comment header

inetnum:        82.129.219.120 - 82.129.219.127
netname:        EXAMPLE-NET
descr:          Example customer
descr:          Second office
country:        NL
admin-c:        XX1-RIPE
source:         RIPE

inetnum:        0.0.0.0 - 0.255.255.255
netname:        NON-RIPE-NCC-MANAGED-ADDRESS-BLOCK
descr:          not managed

inetnum:        10.0.0.0 - 10.0.2.255
netname:        SPLIT-NET
country:        DE

";

    #[test]
    fn test_parse_blocks() {
        let (records, stats) = parse(RIPE_DUMP.as_bytes(), RegistrySource::Ripe);

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].cidr.as_deref(), Some("82.129.219.120/29"));
        assert_eq!(records[0].field("descr"), "Example customer; Second office");
        assert_eq!(records[0].field("country"), "NL");
        assert_eq!(records[0].source, Source::Ripe);

        // endpoint range decomposed into /23 + /24 sharing attributes
        assert_eq!(records[1].cidr.as_deref(), Some("10.0.0.0/23"));
        assert_eq!(records[2].cidr.as_deref(), Some("10.0.2.0/24"));
        assert_eq!(records[2].field("netname"), "SPLIT-NET");

        assert_eq!(stats.groups, 3);
        assert_eq!(stats.unallocated_groups, 1);
    }

    #[test]
    fn test_unterminated_group_is_discarded() {
        let input = "inetnum: 10.0.0.0 - 10.0.0.255\nnetname: FIRST\n\ninetnum: 10.0.1.0 - 10.0.1.255\nnetname: LAST\n";
        let (records, stats) = parse(input.as_bytes(), RegistrySource::Ripe);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field("netname"), "FIRST");
        assert_eq!(stats.incomplete_groups, 1);
    }

    #[test]
    fn test_malformed_range_skips_group() {
        let input = "inetnum: 10.0.0.300 - 10.0.0.255\nnetname: BAD\n\ninetnum: 10.0.1.0/24\nnetname: GOOD\n\n";
        let (records, stats) = parse(input.as_bytes(), RegistrySource::Ripe);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field("netname"), "GOOD");
        assert_eq!(stats.malformed_ranges, 1);
    }

    #[test]
    fn test_invalid_utf8_is_dropped() {
        let mut input = b"inetnum: 10.0.0.0/24\ndescr: Caf".to_vec();
        input.extend_from_slice(&[0xff, 0xfe]);
        input.extend_from_slice(b"e Bar\n\n");

        let (records, stats) = parse(&input, RegistrySource::Ripe);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field("descr"), "Cafe Bar");
        assert_eq!(stats.decode_errors, 1);
    }

    #[test]
    fn test_arin_route_key_and_undeclared_fields() {
        let input = "route: 192.0.2.0/24\ndescr: Example route\ncountry: US\nnotify: noc@example.net\n\nroute6: 2001:db8::/32\ndescr: ignored\n\n";
        let (records, _) = parse(input.as_bytes(), RegistrySource::Arin);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field("inetnum"), "192.0.2.0/24");
        assert_eq!(records[0].field("descr"), "Example route");
        // country is not collected for ARIN
        assert_eq!(records[0].field("country"), "");
        assert_eq!(records[0].field("notify"), "noc@example.net");
    }

    #[test]
    fn test_crlf_and_empty_values() {
        let input = "inetnum: 10.0.0.0/24\r\nnetname:\r\ncountry: FR\r\n\r\n";
        let (records, _) = parse(input.as_bytes(), RegistrySource::Ripe);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field("netname"), "");
        assert_eq!(records[0].field("country"), "FR");
    }

    #[test]
    fn test_lenient_key_field() {
        let input = "inetnum: 10.1/16\nnetname: SHORT\n\n";
        let mut parser = WhoisParser::new(
            Cursor::new(input.as_bytes()),
            RegistrySource::Lacnic.format(),
            Source::Lacnic,
        );
        assert_eq!(parser.by_ref().count(), 0);
        assert_eq!(parser.stats().malformed_ranges, 1);

        let parser = WhoisParser::new(
            Cursor::new(input.as_bytes()),
            RegistrySource::Lacnic.format(),
            Source::Lacnic,
        )
        .with_address_parsing(AddressParsing::Lenient);
        let records: Vec<_> = parser.map(|r| r.unwrap()).collect();
        assert_eq!(records[0].cidr.as_deref(), Some("10.1.0.0/16"));
    }
}
