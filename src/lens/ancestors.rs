//! Ancestor discovery
//!
//! Walks up the chain of enclosing netblocks from a record. Each step widens
//! the current range by one address on either side, asks the store for the
//! smallest enclosing range of each widened range, and keeps the tighter of
//! the two. The walk stops when nothing encloses the current range or the
//! range already spans the whole address space.

use crate::database::netblocks::{NetblockDatabase, NetblockRecord};
use crate::range::Ipv4Range;
use anyhow::Result;
use serde::Serialize;
use std::fmt::Write;
use tracing::debug;

/// One enclosing record and its distance from the starting record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AncestorEntry {
    pub depth: usize,
    pub record: NetblockRecord,
}

pub struct AncestorLens<'a> {
    db: &'a NetblockDatabase,
}

impl<'a> AncestorLens<'a> {
    pub fn new(db: &'a NetblockDatabase) -> Self {
        Self { db }
    }

    /// Enclosing records from the closest (depth 1) outwards
    pub fn ancestors(&self, record: &NetblockRecord) -> Result<Vec<AncestorEntry>> {
        let mut chain = Vec::new();
        let mut current = record.clone();

        while !current.range().is_full() {
            let Some(parent) = self.parent_of(&current)? else {
                break;
            };
            debug!(
                "{} is enclosed by {}",
                current.range_text(),
                parent.range_text()
            );
            chain.push(AncestorEntry {
                depth: chain.len() + 1,
                record: parent.clone(),
            });
            current = parent;
        }

        Ok(chain)
    }

    /// Closest record strictly enclosing `record`
    fn parent_of(&self, record: &NetblockRecord) -> Result<Option<NetblockRecord>> {
        let repo = self.db.networks();
        let range = record.range();

        let mut best: Option<Vec<NetblockRecord>> = None;
        for widened in [range.widen_low(), range.widen_high()].into_iter().flatten() {
            let found = repo.lookup_covering(widened)?;
            let Some(first) = found.first() else {
                continue;
            };
            let replace = match best.as_ref().and_then(|rows| rows.first()) {
                Some(current) => tighter(&first.range(), &current.range()),
                None => true,
            };
            if replace {
                best = Some(found);
            }
        }

        Ok(best.and_then(|rows| pick_row(rows, record)))
    }
}

/// Smaller span wins; on equal span the later-starting range wins
fn tighter(candidate: &Ipv4Range, current: &Ipv4Range) -> bool {
    (candidate.size(), std::cmp::Reverse(candidate.begin))
        < (current.size(), std::cmp::Reverse(current.begin))
}

/// Among rows sharing a range prefer the child's source
fn pick_row(rows: Vec<NetblockRecord>, child: &NetblockRecord) -> Option<NetblockRecord> {
    let index = rows
        .iter()
        .position(|r| r.source == child.source)
        .unwrap_or(0);
    rows.into_iter().nth(index)
}

/// Render a record and its ancestors as an indented tree, one space per depth
pub fn format_tree(record: &NetblockRecord, ancestors: &[AncestorEntry], field: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", tree_line(record, field));
    for entry in ancestors {
        let _ = writeln!(
            out,
            "{}{}",
            " ".repeat(entry.depth),
            tree_line(&entry.record, field)
        );
    }
    out
}

fn tree_line(record: &NetblockRecord, field: &str) -> String {
    let value = record.field(field);
    if value.is_empty() {
        record.range_text()
    } else {
        format!("{} {}", record.range_text(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::netblocks::{Attributes, DatasetFamily, RegistryAttributes, Source};
    use crate::range::cidr_to_range;

    fn record(cidr: &str, netname: &str, source: Source) -> NetblockRecord {
        NetblockRecord::new(
            cidr_to_range(cidr).unwrap(),
            source,
            Attributes::Registry(RegistryAttributes {
                netname: netname.to_string(),
                ..Default::default()
            }),
        )
    }

    fn names(chain: &[AncestorEntry]) -> Vec<String> {
        chain.iter().map(|e| e.record.range_text()).collect()
    }

    #[test]
    fn test_ancestor_chain() {
        let db = NetblockDatabase::open_in_memory(DatasetFamily::Registry).unwrap();
        let child = record("10.1.2.0/24", "CHILD", Source::Ripe);
        db.networks()
            .insert_batch(&[
                record("10.0.0.0/8", "EIGHT", Source::Ripe),
                record("10.1.0.0/16", "SIXTEEN", Source::Ripe),
                child.clone(),
                record("192.168.0.0/16", "OTHER", Source::Ripe),
            ])
            .unwrap();

        let chain = AncestorLens::new(&db).ancestors(&child).unwrap();
        assert_eq!(names(&chain), vec!["10.1.0.0/16", "10.0.0.0/8"]);
        assert_eq!(chain[0].depth, 1);
        assert_eq!(chain[1].depth, 2);
    }

    #[test]
    fn test_edge_aligned_child() {
        let db = NetblockDatabase::open_in_memory(DatasetFamily::Registry).unwrap();
        let child = record("0.0.0.0/24", "LOW", Source::Ripe);
        db.networks()
            .insert_batch(&[record("0.0.0.0/8", "ZERO", Source::Ripe), child.clone()])
            .unwrap();

        let chain = AncestorLens::new(&db).ancestors(&child).unwrap();
        assert_eq!(names(&chain), vec!["0.0.0.0/8"]);
    }

    #[test]
    fn test_no_ancestors_and_full_range() {
        let db = NetblockDatabase::open_in_memory(DatasetFamily::Registry).unwrap();
        let lonely = record("10.0.0.0/24", "LONELY", Source::Ripe);
        db.networks().insert_batch(&[lonely.clone()]).unwrap();
        assert!(AncestorLens::new(&db).ancestors(&lonely).unwrap().is_empty());

        let everything = record("0.0.0.0/0", "ALL", Source::Ripe);
        assert!(AncestorLens::new(&db)
            .ancestors(&everything)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_prefers_same_source() {
        let db = NetblockDatabase::open_in_memory(DatasetFamily::Registry).unwrap();
        let child = record("10.0.0.0/24", "CHILD", Source::Ripe);
        db.networks()
            .insert_batch(&[
                record("10.0.0.0/16", "RIPE-PARENT", Source::Ripe),
                record("10.0.0.0/16", "APNIC-PARENT", Source::Apnic),
                child.clone(),
            ])
            .unwrap();

        let chain = AncestorLens::new(&db).ancestors(&child).unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].record.field("netname"), "RIPE-PARENT");
    }

    #[test]
    fn test_format_tree() {
        let child = record("10.1.2.0/24", "CHILD", Source::Ripe);
        let chain = vec![
            AncestorEntry {
                depth: 1,
                record: record("10.1.0.0/16", "SIXTEEN", Source::Ripe),
            },
            AncestorEntry {
                depth: 2,
                record: record("10.0.0.0/8", "", Source::Ripe),
            },
        ];
        assert_eq!(
            format_tree(&child, &chain, "netname"),
            "10.1.2.0/24 CHILD\n 10.1.0.0/16 SIXTEEN\n  10.0.0.0/8\n"
        );
    }
}
