//! Remote pricing file layout.
//!
//! The provider publishes one JSON document per sailing at
//! `{year}/{month}/{lineId}/{vesselKey}/{cruiseCode}.{ext}`, optionally
//! below a namespace directory (e.g. `/isell_json/2025/05/3/1234/...`).

use chrono::{Datelike, NaiveDate};

use crate::error::CoreError;
use crate::types::DbId;

/// File extension of pricing documents.
pub const DOCUMENT_EXTENSION: &str = "json";

/// A parsed remote document path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    pub year: i32,
    pub month: u32,
    pub line_id: DbId,
    pub vessel_key: String,
    pub cruise_code: String,
    pub extension: String,
}

impl RemotePath {
    /// Parse a remote path, reading the fixed segments from the end so
    /// that a leading slash or namespace prefix is tolerated.
    pub fn parse(path: &str) -> Result<Self, CoreError> {
        let segments: Vec<&str> = path
            .trim()
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        if segments.len() < 5 {
            return Err(invalid(path, "expected at least 5 path segments"));
        }
        let tail = &segments[segments.len() - 5..];

        let year: i32 = tail[0]
            .parse()
            .ok()
            .filter(|y| (2000..=2100).contains(y) && tail[0].len() == 4)
            .ok_or_else(|| invalid(path, "year segment is not a 4-digit year"))?;
        let month: u32 = tail[1]
            .parse()
            .ok()
            .filter(|m| (1..=12).contains(m))
            .ok_or_else(|| invalid(path, "month segment is not 1-12"))?;
        let line_id: DbId = tail[2]
            .parse()
            .map_err(|_| invalid(path, "line id segment is not numeric"))?;
        let vessel_key = tail[3].to_string();
        let (cruise_code, extension) = tail[4]
            .rsplit_once('.')
            .filter(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
            .ok_or_else(|| invalid(path, "file name has no extension"))?;

        Ok(Self {
            year,
            month,
            line_id,
            vessel_key,
            cruise_code: cruise_code.to_string(),
            extension: extension.to_string(),
        })
    }
}

fn invalid(path: &str, reason: &str) -> CoreError {
    CoreError::Validation(format!("Invalid remote path '{path}': {reason}"))
}

/// Exact remote file name of the pricing document for a cruise code.
pub fn document_file_name(cruise_code: &str) -> String {
    format!("{cruise_code}.{DOCUMENT_EXTENSION}")
}

/// Candidate directories for one vessel, in the order they are tried:
///
/// 1. sailing month, with namespace
/// 2. sailing month, without namespace
/// 3. current calendar month, with namespace
/// 4. current calendar month, without namespace
///
/// Duplicates (sailing month equal to the current month, or an empty
/// namespace) are dropped while preserving order.
pub fn candidate_directories(
    namespace: &str,
    external_line_id: DbId,
    vessel_key: &str,
    sailing_date: NaiveDate,
    today: NaiveDate,
) -> Vec<String> {
    let namespace = namespace.trim_matches('/');
    let months = [
        (sailing_date.year(), sailing_date.month()),
        (today.year(), today.month()),
    ];

    let mut out: Vec<String> = Vec::with_capacity(4);
    for (year, month) in months {
        let base = format!("{year}/{month:02}/{external_line_id}/{vessel_key}");
        let mut variants = Vec::with_capacity(2);
        if !namespace.is_empty() {
            variants.push(format!("/{namespace}/{base}"));
        }
        variants.push(format!("/{base}"));
        for dir in variants {
            if !out.contains(&dir) {
                out.push(dir);
            }
        }
    }
    out
}
