//! Durable stores: registry document, snapshot document, track history.

mod document;
mod history;
mod layout;

use std::collections::BTreeMap;

pub use document::{load_json_or_default, write_json_atomic};
pub use history::{read_track_file, HistoryStore, TrackMode};
pub use layout::{parse_track_file_name, track_file_name, StoreLayout};

use crate::error::{Error, Result};
use crate::model::{ClassificationEntry, Mmsi, TrackPoint, VesselSnapshot};

pub type RegistryDoc = BTreeMap<Mmsi, ClassificationEntry>;
pub type SnapshotDoc = BTreeMap<Mmsi, VesselSnapshot>;

/// Everything read back from disk at startup.
#[derive(Debug, Default)]
pub struct LoadedState {
    pub registry: RegistryDoc,
    pub snapshots: SnapshotDoc,
    /// Last recorded point per registered vessel that has any history.
    pub last_points: BTreeMap<Mmsi, TrackPoint>,
}

#[derive(Debug)]
pub struct Store {
    layout: StoreLayout,
    history: HistoryStore,
}

impl Store {
    /// Opens (creating if needed) a data root. Existing files are not read.
    pub fn open(layout: StoreLayout) -> Result<Self> {
        let tracks = layout.tracks_dir();
        std::fs::create_dir_all(&tracks).map_err(|err| Error::io(&tracks, err))?;
        Ok(Self {
            history: HistoryStore::new(layout.clone()),
            layout,
        })
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Loads all three stores. Absent files load as empty.
    pub fn load(&self) -> Result<LoadedState> {
        let registry: RegistryDoc = load_json_or_default(&self.layout.registry_path())?;
        let snapshots: SnapshotDoc = load_json_or_default(&self.layout.snapshot_path())?;
        let mut last_points = BTreeMap::new();
        for mmsi in registry.keys() {
            if let Some(point) = self.history.last_point(*mmsi)? {
                last_points.insert(*mmsi, point);
            }
        }
        Ok(LoadedState {
            registry,
            snapshots,
            last_points,
        })
    }

    pub fn write_registry(&self, registry: &RegistryDoc) -> Result<()> {
        write_json_atomic(&self.layout.registry_path(), registry)
    }

    pub fn write_snapshots(&self, snapshots: &SnapshotDoc) -> Result<()> {
        write_json_atomic(&self.layout.snapshot_path(), snapshots)
    }

    pub fn append_point(&mut self, mmsi: Mmsi, point: &TrackPoint) -> Result<()> {
        self.history.append(mmsi, point)
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FleetLine;
    use time::macros::datetime;

    #[test]
    fn load_empty_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(StoreLayout::new(dir.path().join("data"))).expect("open");
        let state = store.load().expect("load");
        assert!(state.registry.is_empty());
        assert!(state.snapshots.is_empty());
        assert!(state.last_points.is_empty());
    }

    #[test]
    fn registry_keys_are_mmsi_strings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(StoreLayout::new(dir.path())).expect("open");
        let at = datetime!(2025-12-14 01:00:00 UTC);
        let mut registry = RegistryDoc::new();
        registry.insert(
            Mmsi(311_000_123),
            ClassificationEntry {
                name: "ICON OF THE SEAS".to_string(),
                line: FleetLine::Royal,
                discovered_at: at,
                updated_at: at,
            },
        );
        store.write_registry(&registry).expect("write");

        let raw = std::fs::read_to_string(store.layout().registry_path()).expect("read");
        assert!(raw.contains("\"311000123\""), "{raw}");
        assert!(raw.contains("\"line\": \"royal\""), "{raw}");
        assert_eq!(store.load().expect("load").registry, registry);
    }
}
