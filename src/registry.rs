//! Classification registry: which MMSIs are tracked, under which name and line.

use time::OffsetDateTime;

use crate::fleet::{normalize_name, FleetTable};
use crate::model::{ClassificationEntry, Mmsi};
use crate::store::RegistryDoc;

/// Result of applying an identity message to the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentityChange {
    /// Name belongs to no tracked fleet; nothing to write.
    Unrecognized { name: String },
    /// Same name and line as the existing entry; nothing to write.
    Unchanged,
    /// First entry for this MMSI.
    Discovered(ClassificationEntry),
    /// Existing entry with a new name or line.
    Updated {
        previous: ClassificationEntry,
        entry: ClassificationEntry,
    },
}

impl IdentityChange {
    pub fn entry(&self) -> Option<&ClassificationEntry> {
        match self {
            IdentityChange::Discovered(entry) | IdentityChange::Updated { entry, .. } => {
                Some(entry)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    fleets: FleetTable,
    entries: RegistryDoc,
}

impl Registry {
    pub fn new(fleets: FleetTable, entries: RegistryDoc) -> Self {
        Self { fleets, entries }
    }

    pub fn get(&self, mmsi: Mmsi) -> Option<&ClassificationEntry> {
        self.entries.get(&mmsi)
    }

    pub fn contains(&self, mmsi: Mmsi) -> bool {
        self.entries.contains_key(&mmsi)
    }

    pub fn entries(&self) -> &RegistryDoc {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Classifies an identity message without touching the registry.
    pub fn classify(&self, mmsi: Mmsi, raw_name: &str, now: OffsetDateTime) -> IdentityChange {
        let name = normalize_name(raw_name);
        let Some(line) = self.fleets.classify(&name) else {
            return IdentityChange::Unrecognized { name };
        };
        match self.entries.get(&mmsi) {
            None => IdentityChange::Discovered(ClassificationEntry {
                name,
                line,
                discovered_at: now,
                updated_at: now,
            }),
            Some(existing) if existing.name == name && existing.line == line => {
                IdentityChange::Unchanged
            }
            Some(existing) => IdentityChange::Updated {
                previous: existing.clone(),
                entry: ClassificationEntry {
                    name,
                    line,
                    discovered_at: existing.discovered_at,
                    updated_at: now,
                },
            },
        }
    }

    /// Stores the entry carried by `change`, returning the entry it replaced.
    pub fn apply(&mut self, mmsi: Mmsi, change: &IdentityChange) -> Option<ClassificationEntry> {
        let entry = change.entry()?;
        self.entries.insert(mmsi, entry.clone())
    }

    /// Undoes [`Registry::apply`] after a failed write.
    pub fn revert(&mut self, mmsi: Mmsi, previous: Option<ClassificationEntry>) {
        match previous {
            Some(entry) => {
                self.entries.insert(mmsi, entry);
            }
            None => {
                self.entries.remove(&mmsi);
            }
        }
    }
}
