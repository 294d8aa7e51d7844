use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::warn;

use crate::error::{Error, Result};
use crate::model::{Mmsi, TrackPoint};
use crate::store::layout::{parse_track_file_name, StoreLayout};

/// Which part of a vessel's history to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackMode {
    /// Only the points of the highest trip id present.
    #[default]
    CurrentTrip,
    AllTrips,
}

/// Append-only per-vessel track files, one JSON object per line.
///
/// Every append is a single `write_all` of a complete `\n`-terminated line.
/// Readers only trust newline-terminated lines, so a line still being
/// written is invisible rather than torn.
#[derive(Debug)]
pub struct HistoryStore {
    layout: StoreLayout,
    writers: HashMap<Mmsi, File>,
}

impl HistoryStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self {
            layout,
            writers: HashMap::new(),
        }
    }

    pub fn path(&self, mmsi: Mmsi) -> PathBuf {
        self.layout.track_path(mmsi)
    }

    pub fn append(&mut self, mmsi: Mmsi, point: &TrackPoint) -> Result<()> {
        let path = self.layout.track_path(mmsi);
        let mut line = serde_json::to_vec(point).map_err(|err| Error::json(&path, err))?;
        line.push(b'\n');

        let file = match self.writers.entry(mmsi) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(open_for_append(&path)?),
        };
        if let Err(err) = file.write_all(&line).and_then(|_| file.flush()) {
            // Reopen next time; the failed tail is terminated by open_for_append.
            self.writers.remove(&mmsi);
            return Err(Error::io(&path, err));
        }
        Ok(())
    }

    /// Reads recorded points in file order, keeping at most the last `limit`.
    pub fn read(&self, mmsi: Mmsi, mode: TrackMode, limit: Option<usize>) -> Result<Vec<TrackPoint>> {
        let mut points = read_track_file(&self.layout.track_path(mmsi))?;
        if mode == TrackMode::CurrentTrip {
            if let Some(current) = points.iter().map(|p| p.trip_id).max() {
                points.retain(|p| p.trip_id == current);
            }
        }
        if let Some(limit) = limit {
            if points.len() > limit {
                points.drain(..points.len() - limit);
            }
        }
        Ok(points)
    }

    pub fn last_point(&self, mmsi: Mmsi) -> Result<Option<TrackPoint>> {
        Ok(read_track_file(&self.layout.track_path(mmsi))?.pop())
    }

    /// Vessels that have a track file.
    pub fn vessels(&self) -> Result<Vec<Mmsi>> {
        let dir = self.layout.tracks_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(Error::io(&dir, err)),
        };
        let mut vessels = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| Error::io(&dir, err))?;
            if let Some(mmsi) = entry.file_name().to_str().and_then(parse_track_file_name) {
                vessels.push(mmsi);
            }
        }
        vessels.sort_unstable();
        Ok(vessels)
    }
}

/// Opens a track file for appending. If a previous process died mid-append
/// the file ends without a newline; terminate that fragment so the next
/// record starts on its own line.
fn open_for_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| Error::io(parent, err))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .map_err(|err| Error::io(path, err))?;
    let len = file.metadata().map_err(|err| Error::io(path, err))?.len();
    if len > 0 {
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))
            .and_then(|_| file.read_exact(&mut last))
            .map_err(|err| Error::io(path, err))?;
        if last[0] != b'\n' {
            warn!("terminating partial trailing record in {}", path.display());
            file.write_all(b"\n").map_err(|err| Error::io(path, err))?;
        }
    }
    Ok(file)
}

/// Parses complete lines of a track file. A missing file is an empty track;
/// an unterminated last line and unparsable lines are skipped.
pub fn read_track_file(path: &Path) -> Result<Vec<TrackPoint>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(Error::io(path, err)),
    };
    let mut reader = BufReader::new(file);
    let mut points = Vec::new();
    let mut buf = Vec::new();
    let mut line_no = 0usize;
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|err| Error::io(path, err))?;
        if read == 0 || buf.last() != Some(&b'\n') {
            break;
        }
        line_no += 1;
        let line = &buf[..buf.len() - 1];
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<TrackPoint>(line) {
            Ok(point) => points.push(point),
            Err(err) => warn!("skipping bad record {}:{}: {}", path.display(), line_no, err),
        }
    }
    Ok(points)
}
