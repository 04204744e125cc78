//! Parse configuration and the per-struct sibling symbol table.

use smallvec::SmallVec;

use binmap_core::{Value, DEFAULT_LENGTH_CAP};

/// Tunable parse policy.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Safety cap for `bytes`/`string` lengths and array counts
    pub length_cap: u64,
    /// Sanity bound on records emitted by a stream parse
    pub max_records: Option<u64>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            length_cap: DEFAULT_LENGTH_CAP,
            max_records: None,
        }
    }
}

/// Decoded sibling values of the struct currently being parsed, for
/// `length_from` and `length: <name>` references.
///
/// Visibility is strictly positional: a name is present only after
/// its field parsed. Structs are small, so a linear scan over a
/// small-vector beats a map and keeps lookup order-independent.
#[derive(Debug, Default)]
pub(crate) struct SymbolTable {
    entries: SmallVec<[(String, Value); 8]>,
}

impl SymbolTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record a decoded sibling. A repeated name shadows the earlier
    /// entry, matching positional visibility.
    pub(crate) fn insert(&mut self, name: &str, value: Value) {
        if name.is_empty() {
            return;
        }
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
        } else {
            self.entries.push((name.to_string(), value));
        }
    }

    /// Look up an earlier sibling by name.
    pub(crate) fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_by_position() {
        let mut table = SymbolTable::new();
        assert!(table.get("count").is_none());
        table.insert("count", Value::UInt(3));
        assert_eq!(table.get("count"), Some(&Value::UInt(3)));
    }

    #[test]
    fn test_shadowing() {
        let mut table = SymbolTable::new();
        table.insert("n", Value::UInt(1));
        table.insert("n", Value::UInt(2));
        assert_eq!(table.get("n"), Some(&Value::UInt(2)));
    }

    #[test]
    fn test_anonymous_not_recorded() {
        let mut table = SymbolTable::new();
        table.insert("", Value::UInt(9));
        assert!(table.get("").is_none());
    }
}
