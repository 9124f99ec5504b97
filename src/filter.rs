/// Detection filter: which classes the engine is asked for on each frame.
///
/// The filter is read from the session on every frame and mapped to class IDs
/// fresh each time; nothing here is cached.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::classes::ClassTable;

pub const ALL_SENTINEL: &str = "all";

/// Currently selected detection scope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActiveFilter {
    #[default]
    All,
    Class(String),
}

impl ActiveFilter {
    /// Parse a user selection. Missing, empty or unknown names fall back to `All`.
    pub fn parse(input: Option<&str>, table: &ClassTable) -> Self {
        match input.map(str::trim) {
            Some(name) if !name.is_empty() && name != ALL_SENTINEL && table.contains_name(name) => {
                ActiveFilter::Class(name.to_string())
            }
            _ => ActiveFilter::All,
        }
    }

    /// Whether a detection of class `name` passes this filter.
    pub fn admits(&self, name: &str) -> bool {
        match self {
            ActiveFilter::All => true,
            ActiveFilter::Class(selected) => selected == name,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActiveFilter::All => ALL_SENTINEL,
            ActiveFilter::Class(name) => name,
        }
    }
}

impl fmt::Display for ActiveFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ActiveFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Class IDs the engine should consider for this frame.
///
/// `All` yields the full target list; a single class yields its ID, or an
/// empty set when the name is not in the table.
pub fn effective_class_ids(filter: &ActiveFilter, table: &ClassTable) -> Vec<u32> {
    match filter {
        ActiveFilter::All => table.target_ids().to_vec(),
        ActiveFilter::Class(name) => table.ids_named(name),
    }
}
