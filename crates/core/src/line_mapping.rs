//! External ↔ internal cruise line identifier mapping.
//!
//! The inventory provider identifies cruise lines with its own numeric
//! ids, which mostly coincide with ours. [`LineIdMapping`] holds the
//! exceptions as an explicit bidirectional table; any id not listed maps
//! to itself.

use std::collections::HashMap;

use crate::error::CoreError;
use crate::types::DbId;

/// Bidirectional line id lookup with an identity default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineIdMapping {
    to_internal: HashMap<DbId, DbId>,
    to_external: HashMap<DbId, DbId>,
}

impl LineIdMapping {
    /// Build a mapping from `(external, internal)` pairs.
    ///
    /// Rejects a pair list that names the same external id twice, or maps
    /// two external ids onto one internal id: either would make the
    /// reverse lookup ambiguous.
    pub fn from_pairs(
        pairs: impl IntoIterator<Item = (DbId, DbId)>,
    ) -> Result<Self, CoreError> {
        let mut mapping = Self::default();
        for (external, internal) in pairs {
            if mapping.to_internal.insert(external, internal).is_some() {
                return Err(CoreError::Validation(format!(
                    "External line id {external} is mapped more than once"
                )));
            }
            if mapping.to_external.insert(internal, external).is_some() {
                return Err(CoreError::Validation(format!(
                    "Internal line id {internal} is the target of more than one external id"
                )));
            }
        }
        Ok(mapping)
    }

    /// Parse the `LINE_ID_MAP` format: comma-separated `external:internal`
    /// pairs, e.g. `"3:22, 7:7"`. An empty string yields the identity map.
    pub fn parse(spec: &str) -> Result<Self, CoreError> {
        let mut pairs = Vec::new();
        for entry in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (ext, int) = entry.split_once(':').ok_or_else(|| {
                CoreError::Validation(format!(
                    "Invalid line id mapping entry '{entry}', expected 'external:internal'"
                ))
            })?;
            pairs.push((parse_id(ext, entry)?, parse_id(int, entry)?));
        }
        Self::from_pairs(pairs)
    }

    /// Translate a provider line id to our internal line id.
    pub fn to_internal(&self, external: DbId) -> DbId {
        self.to_internal.get(&external).copied().unwrap_or(external)
    }

    /// Translate an internal line id back to the provider's id.
    pub fn to_external(&self, internal: DbId) -> DbId {
        self.to_external.get(&internal).copied().unwrap_or(internal)
    }

    /// Number of explicit (non-identity) entries.
    pub fn len(&self) -> usize {
        self.to_internal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_internal.is_empty()
    }
}

fn parse_id(raw: &str, entry: &str) -> Result<DbId, CoreError> {
    raw.trim().parse::<DbId>().map_err(|_| {
        CoreError::Validation(format!(
            "Invalid line id '{}' in mapping entry '{entry}'",
            raw.trim()
        ))
    })
}
