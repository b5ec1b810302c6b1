use std::collections::HashMap;

use serde_json::{Map, Value};

/// A record stored under one [`SharedMemory`] key: arbitrary fields plus an
/// optional `_meta` describing origin/purpose (`spec.md` §3).
pub type Record = Map<String, Value>;

/// Run-scoped symbol table populated during preconditions and read-only
/// thereafter (`spec.md` §3, §9 "Run-scoped shared state").
///
/// Keys beginning with `_` are private to the core and excluded from the
/// public projections the Context Assembler builds for agents.
#[derive(Debug, Clone, Default)]
pub struct SharedMemory {
    entries: HashMap<String, Record>,
}

impl SharedMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, record: Record) {
        self.entries.insert(name.into(), record);
    }

    pub fn get(&self, name: &str) -> Option<&Record> {
        self.entries.get(name)
    }

    pub fn is_private(name: &str) -> bool {
        name.starts_with('_')
    }

    /// Entries visible to planners/validators/critics — everything except
    /// `_`-prefixed core-private keys.
    pub fn public_entries(&self) -> impl Iterator<Item = (&String, &Record)> {
        self.entries.iter().filter(|(key, _)| !Self::is_private(key))
    }

    pub fn all_entries(&self) -> impl Iterator<Item = (&String, &Record)> {
        self.entries.iter()
    }

    /// Resolves a dot-separated path like `user.email` against a stored
    /// record, used by the Probe Broker to expand `{{variable.path}}`
    /// templates (`spec.md` §4.6).
    pub fn resolve_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let root = segments.next()?;
        let record = self.entries.get(root)?;
        let mut current = record.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}
