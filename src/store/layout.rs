use std::path::{Path, PathBuf};

use crate::model::Mmsi;

pub const REGISTRY_FILE: &str = "registry.json";
pub const SNAPSHOT_FILE: &str = "ships.json";
pub const TRACKS_DIR: &str = "tracks";
const TRACK_EXT: &str = "jsonl";

/// On-disk layout of a tracker data root:
///
/// ```text
/// <root>/registry.json
/// <root>/ships.json
/// <root>/tracks/<mmsi>.jsonl
/// ```
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry_path(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.root.join(SNAPSHOT_FILE)
    }

    pub fn tracks_dir(&self) -> PathBuf {
        self.root.join(TRACKS_DIR)
    }

    pub fn track_path(&self, mmsi: Mmsi) -> PathBuf {
        self.tracks_dir().join(track_file_name(mmsi))
    }
}

pub fn track_file_name(mmsi: Mmsi) -> String {
    format!("{}.{}", mmsi.get(), TRACK_EXT)
}

/// Inverse of [`track_file_name`]; `None` for anything that is not a track file.
pub fn parse_track_file_name(name: &str) -> Option<Mmsi> {
    let stem = name.strip_suffix(TRACK_EXT)?.strip_suffix('.')?;
    stem.parse::<u64>().ok().and_then(Mmsi::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_paths() {
        let layout = StoreLayout::new("/data/ships");
        assert_eq!(layout.registry_path(), PathBuf::from("/data/ships/registry.json"));
        assert_eq!(layout.snapshot_path(), PathBuf::from("/data/ships/ships.json"));
        assert_eq!(
            layout.track_path(Mmsi(311_000_123)),
            PathBuf::from("/data/ships/tracks/311000123.jsonl")
        );
    }

    #[test]
    fn track_file_names() {
        assert_eq!(parse_track_file_name("311000123.jsonl"), Some(Mmsi(311_000_123)));
        assert_eq!(parse_track_file_name("311000123.jsonl.tmp"), None);
        assert_eq!(parse_track_file_name("0.jsonl"), None);
        assert_eq!(parse_track_file_name("abc.jsonl"), None);
    }
}
