//! Candidate value expansion
//!
//! A constraint value may stand for many values: the name of an existing file
//! expands to its lines, and `-` expands to the lines of the caller's input
//! stream (normally stdin). Blank lines are dropped.

use anyhow::{anyhow, Result};
use std::io::BufRead;
use std::path::Path;

/// Value that reads candidates from the input stream
pub const STDIN_SENTINEL: &str = "-";

pub fn expand_values<R: BufRead>(values: &[String], input: &mut R) -> Result<Vec<String>> {
    let mut expanded = Vec::new();
    for value in values {
        if value == STDIN_SENTINEL {
            for line in input.lines() {
                let line = line.map_err(|e| anyhow!("Failed to read query values: {}", e))?;
                push_line(&mut expanded, &line);
            }
        } else if Path::new(value).is_file() {
            let lines = oneio::read_lines(value)
                .map_err(|e| anyhow!("Failed to read values from '{}': {}", value, e))?;
            for line in lines {
                let line = line.map_err(|e| anyhow!("Failed to read values from '{}': {}", value, e))?;
                push_line(&mut expanded, &line);
            }
        } else {
            expanded.push(value.clone());
        }
    }
    Ok(expanded)
}

fn push_line(values: &mut Vec<String>, line: &str) {
    let line = line.trim();
    if !line.is_empty() {
        values.push(line.to_string());
    }
}
