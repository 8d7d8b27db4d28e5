//! Inbound change-notification normalization.
//!
//! The provider's notifications are loosely shaped: the line id may sit
//! under one of several field names, as a number, a numeric string, or a
//! list; alternatively only a list of changed file paths is sent. This
//! module reduces any payload to a [`NotificationTarget`].

use std::collections::BTreeSet;

use serde_json::Value;

use crate::remote_path::RemotePath;
use crate::types::DbId;

/// Field names that carry an explicit line id.
pub const LINE_ID_FIELDS: &[&str] = &[
    "lineid",
    "lineId",
    "line_id",
    "cruiselineid",
    "cruiseLineId",
    "cruise_line_id",
];

/// Field names that carry a list of changed remote paths.
pub const PATH_FIELDS: &[&str] = &["paths", "files"];

/// Field names that carry the event name.
pub const EVENT_FIELDS: &[&str] = &["event", "event_type", "eventType"];

/// Where the line ids of a notification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineIdSource {
    /// Taken from an explicit line id field.
    Explicit,
    /// Derived positionally from remote file paths.
    Paths,
    /// Nothing usable was found.
    None,
}

/// Normalized notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTarget {
    /// Distinct external line ids, ascending.
    pub external_line_ids: Vec<DbId>,
    pub source: LineIdSource,
    pub event: Option<String>,
    /// Line ids found in paths but discarded because an explicit field won.
    pub overridden_path_ids: Vec<DbId>,
    /// Paths that could not be parsed.
    pub rejected_paths: Vec<String>,
}

impl NotificationTarget {
    pub fn is_empty(&self) -> bool {
        self.external_line_ids.is_empty()
    }
}

/// Normalize a notification payload.
///
/// An explicit line id field takes precedence over ids derived from
/// paths. Derived ids are only used when no explicit field yields any id.
pub fn normalize(payload: &Value) -> NotificationTarget {
    let explicit = explicit_line_ids(payload);
    let (path_ids, rejected_paths) = path_line_ids(payload);
    let event = EVENT_FIELDS
        .iter()
        .find_map(|f| payload.get(*f).and_then(Value::as_str))
        .map(str::to_string);

    if !explicit.is_empty() {
        let overridden_path_ids = path_ids.difference(&explicit).copied().collect();
        return NotificationTarget {
            external_line_ids: explicit.into_iter().collect(),
            source: LineIdSource::Explicit,
            event,
            overridden_path_ids,
            rejected_paths,
        };
    }

    let source = if path_ids.is_empty() {
        LineIdSource::None
    } else {
        LineIdSource::Paths
    };
    NotificationTarget {
        external_line_ids: path_ids.into_iter().collect(),
        source,
        event,
        overridden_path_ids: Vec::new(),
        rejected_paths,
    }
}

fn explicit_line_ids(payload: &Value) -> BTreeSet<DbId> {
    let mut ids = BTreeSet::new();
    for field in LINE_ID_FIELDS {
        match payload.get(*field) {
            Some(Value::Array(items)) => ids.extend(items.iter().filter_map(as_line_id)),
            Some(value) => ids.extend(as_line_id(value)),
            None => {}
        }
    }
    ids
}

fn path_line_ids(payload: &Value) -> (BTreeSet<DbId>, Vec<String>) {
    let mut ids = BTreeSet::new();
    let mut rejected = Vec::new();
    for field in PATH_FIELDS {
        let Some(Value::Array(items)) = payload.get(*field) else {
            continue;
        };
        for item in items {
            let Some(path) = item.as_str() else {
                rejected.push(item.to_string());
                continue;
            };
            match RemotePath::parse(path) {
                Ok(parsed) if parsed.line_id > 0 => {
                    ids.insert(parsed.line_id);
                }
                _ => rejected.push(path.to_string()),
            }
        }
    }
    (ids, rejected)
}

/// Accept positive integers and numeric strings.
fn as_line_id(value: &Value) -> Option<DbId> {
    let id = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<DbId>().ok(),
        _ => None,
    }?;
    (id > 0).then_some(id)
}
