//! Domain error taxonomy
//!
//! Storage and I/O failures travel as `anyhow::Error`. The variants here are the
//! conditions callers are expected to match on, either directly or through
//! `anyhow::Error::downcast_ref::<NetblockError>()`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetblockError {
    /// Address or range text that does not denote a valid IPv4 range
    #[error("malformed address '{input}': {reason}")]
    MalformedAddress { input: String, reason: String },

    /// Input line contained bytes that are not valid UTF-8
    #[error("undecodable bytes on line {line}")]
    DecodeError { line: u64 },

    /// A source input could not be opened
    #[error("source '{source_name}' unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// A record group was still open at end of input
    #[error("record group starting at line {line} not terminated before end of input")]
    IncompleteGroup { line: u64 },

    /// A query constraint names a field the dataset does not declare
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// A geographic area filter could not be parsed
    #[error("invalid area filter '{0}'")]
    InvalidArea(String),
}

impl NetblockError {
    pub fn malformed(input: &str, reason: impl Into<String>) -> Self {
        NetblockError::MalformedAddress {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}
