//! Common utility functions for lens modules
//!
//! Output format selection and result summaries shared by the registry and
//! geolocation commands.

use crate::lens::query::ResultRow;
use crate::range::{parse_range_spec, AddressParsing, Ipv4Range};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Output format shared by every georipe command
///
/// Tables go through `tabled`; the JSON variants serialize result rows as
/// ordered objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Pretty table with borders (default)
    #[default]
    Table,
    /// Markdown table format
    Markdown,
    /// Compact JSON (single line per object)
    Json,
    /// Pretty-printed JSON with indentation
    JsonPretty,
    /// JSON Lines format (one JSON object per line, for streaming)
    JsonLine,
    /// Pipe-separated values with header
    Psv,
}

impl OutputFormat {
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json | Self::JsonPretty | Self::JsonLine)
    }

    /// Rendered with `tabled` (rounded or markdown style)
    pub fn is_table(&self) -> bool {
        matches!(self, Self::Table | Self::Markdown)
    }

    /// Accepted names, for error messages
    pub fn all_names() -> &'static [&'static str] {
        &[
            "table",
            "markdown",
            "json",
            "json-pretty",
            "json-line",
            "psv",
        ]
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
            Self::JsonPretty => write!(f, "json-pretty"),
            Self::JsonLine => write!(f, "json-line"),
            Self::Psv => write!(f, "psv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "pretty" => Ok(Self::Table),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "json-pretty" | "jsonpretty" => Ok(Self::JsonPretty),
            "json-line" | "jsonline" | "jsonl" | "ndjson" => Ok(Self::JsonLine),
            "psv" | "pipe" => Ok(Self::Psv),
            _ => Err(format!(
                "Unknown output format '{}'. Valid formats: {}",
                s,
                Self::all_names().join(", ")
            )),
        }
    }
}

/// Collapse result rows into one summary row
///
/// The range field reports how many distinct addresses the rows cover (the
/// union of their ranges, as `"<n> ip"`); every other projected field reports
/// how many distinct non-empty values it took.
pub fn summarize(rows: &[ResultRow], projection: &[String], range_field: &str) -> ResultRow {
    let fields = projection
        .iter()
        .map(|name| {
            let value = if name == range_field {
                format!("{} ip", address_count(rows, name))
            } else {
                let distinct: HashSet<&str> = rows
                    .iter()
                    .filter_map(|row| row.get(name))
                    .filter(|v| !v.is_empty())
                    .collect();
                distinct.len().to_string()
            };
            (name.clone(), value)
        })
        .collect();
    ResultRow::new(fields)
}

/// Render rows as a table with the projection as header
#[cfg(feature = "display")]
pub fn format_rows_table(rows: &[ResultRow], projection: &[String], markdown: bool) -> String {
    use tabled::builder::Builder;
    use tabled::settings::Style;

    let mut builder = Builder::default();
    builder.push_record(projection.iter().cloned());
    for row in rows {
        builder.push_record(row.values());
    }

    let mut table = builder.build();
    if markdown {
        table.with(Style::markdown());
    } else {
        table.with(Style::rounded());
    }
    table.to_string()
}

/// Render rows in `format`, one row per line for JSON Lines and PSV
#[cfg(feature = "display")]
pub fn render_rows(
    rows: &[ResultRow],
    projection: &[String],
    format: OutputFormat,
) -> serde_json::Result<String> {
    if format.is_table() {
        return Ok(format_rows_table(
            rows,
            projection,
            format == OutputFormat::Markdown,
        ));
    }
    match format {
        OutputFormat::JsonPretty => serde_json::to_string_pretty(rows),
        OutputFormat::JsonLine => {
            let lines = rows
                .iter()
                .map(serde_json::to_string)
                .collect::<serde_json::Result<Vec<_>>>()?;
            Ok(lines.join("\n"))
        }
        OutputFormat::Psv => {
            let mut lines = vec![projection.join("|")];
            lines.extend(rows.iter().map(|row| row.values().join("|")));
            Ok(lines.join("\n"))
        }
        _ => serde_json::to_string(rows),
    }
}

/// Number of addresses in the union of the rows' ranges
fn address_count(rows: &[ResultRow], field: &str) -> u64 {
    let mut ranges: Vec<Ipv4Range> = rows
        .iter()
        .filter_map(|row| row.get(field))
        .filter_map(|text| parse_range_spec(text, AddressParsing::Strict).ok())
        .flatten()
        .collect();
    ranges.sort();

    let mut total = 0u64;
    let mut merged: Option<Ipv4Range> = None;
    for range in ranges {
        merged = match merged {
            Some(current) if (range.begin as u64) <= current.end as u64 + 1 => Some(Ipv4Range {
                begin: current.begin,
                end: current.end.max(range.end),
            }),
            Some(current) => {
                total += current.size();
                Some(range)
            }
            None => Some(range),
        };
    }
    total + merged.map(|r| r.size()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(
            OutputFormat::from_str("table").unwrap(),
            OutputFormat::Table
        );
        assert_eq!(
            OutputFormat::from_str("pretty").unwrap(),
            OutputFormat::Table
        );
        assert_eq!(
            OutputFormat::from_str("markdown").unwrap(),
            OutputFormat::Markdown
        );
        assert_eq!(
            OutputFormat::from_str("md").unwrap(),
            OutputFormat::Markdown
        );
        assert_eq!(OutputFormat::from_str("json").unwrap(), OutputFormat::Json);
        assert_eq!(
            OutputFormat::from_str("json-pretty").unwrap(),
            OutputFormat::JsonPretty
        );
        assert_eq!(
            OutputFormat::from_str("json-line").unwrap(),
            OutputFormat::JsonLine
        );
        assert_eq!(
            OutputFormat::from_str("jsonl").unwrap(),
            OutputFormat::JsonLine
        );
        assert_eq!(OutputFormat::from_str("psv").unwrap(), OutputFormat::Psv);
        assert!(OutputFormat::from_str("invalid").is_err());
    }

    #[test]
    fn test_output_format_display() {
        assert_eq!(OutputFormat::Table.to_string(), "table");
        assert_eq!(OutputFormat::Markdown.to_string(), "markdown");
        assert_eq!(OutputFormat::Json.to_string(), "json");
        assert_eq!(OutputFormat::JsonPretty.to_string(), "json-pretty");
        assert_eq!(OutputFormat::JsonLine.to_string(), "json-line");
        assert_eq!(OutputFormat::Psv.to_string(), "psv");
    }

    #[test]
    fn test_output_format_is_json() {
        assert!(!OutputFormat::Table.is_json());
        assert!(!OutputFormat::Markdown.is_json());
        assert!(OutputFormat::Json.is_json());
        assert!(OutputFormat::JsonPretty.is_json());
        assert!(OutputFormat::JsonLine.is_json());
        assert!(!OutputFormat::Psv.is_json());
    }

    #[test]
    fn test_output_format_is_table() {
        assert!(OutputFormat::Table.is_table());
        assert!(OutputFormat::Markdown.is_table());
        assert!(!OutputFormat::Json.is_table());
        assert!(!OutputFormat::JsonPretty.is_table());
        assert!(!OutputFormat::JsonLine.is_table());
        assert!(!OutputFormat::Psv.is_table());
    }

    fn row(network: &str, country: &str) -> ResultRow {
        ResultRow::new(vec![
            ("network".to_string(), network.to_string()),
            ("country".to_string(), country.to_string()),
        ])
    }

    #[test]
    fn test_summarize_counts() {
        let rows = vec![
            row("10.0.0.0/24", "nl"),
            row("10.0.0.128/25", "nl"),
            row("10.0.1.0/24", "de"),
            row("10.0.3.0 - 10.0.3.9", ""),
        ];
        let projection = vec!["network".to_string(), "country".to_string()];
        let summary = summarize(&rows, &projection, "network");
        assert_eq!(summary.get("network"), Some("522 ip"));
        assert_eq!(summary.get("country"), Some("2"));
    }

    #[test]
    fn test_summarize_empty() {
        let projection = vec!["inetnum".to_string(), "netname".to_string()];
        let summary = summarize(&[], &projection, "inetnum");
        assert_eq!(summary.values(), vec!["0 ip", "0"]);
    }

    #[cfg(feature = "display")]
    #[test]
    fn test_format_rows_table() {
        let projection = vec!["network".to_string(), "country".to_string()];
        let table = format_rows_table(&[row("10.0.0.0/24", "nl")], &projection, true);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("network"));
        assert!(lines[2].contains("10.0.0.0/24"));
    }

    #[cfg(feature = "display")]
    #[test]
    fn test_render_rows_formats() {
        let projection = vec!["network".to_string(), "country".to_string()];
        let rows = vec![row("10.0.0.0/24", "nl"), row("10.0.1.0/24", "")];

        let psv = render_rows(&rows, &projection, OutputFormat::Psv).unwrap();
        assert_eq!(psv, "network|country\n10.0.0.0/24|nl\n10.0.1.0/24|");

        let jsonl = render_rows(&rows, &projection, OutputFormat::JsonLine).unwrap();
        assert_eq!(
            jsonl,
            "{\"network\":\"10.0.0.0/24\",\"country\":\"nl\"}\n{\"network\":\"10.0.1.0/24\",\"country\":\"\"}"
        );

        let json = render_rows(&rows, &projection, OutputFormat::Json).unwrap();
        assert!(json.starts_with('['));

        let table = render_rows(&rows, &projection, OutputFormat::Table).unwrap();
        assert!(table.contains("10.0.1.0/24"));
        assert!(!table.contains('{'));
    }
}
