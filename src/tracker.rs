//! The single owned tracker state: registry, segmenter, snapshots and stores.
//!
//! A `Tracker` is opened once at startup, loads every store from disk, and is
//! then driven one message at a time. Each call writes through to disk before
//! it returns, and in-memory state only advances once those writes succeed.

use std::path::Path;

use log::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::fleet::FleetTable;
use crate::model::{ClassificationEntry, Mmsi, PositionReport, TrackPoint, TripState, VesselSnapshot};
use crate::registry::{IdentityChange, Registry};
use crate::segment::{Decision, DropReason, SegmentationConfig, Segmenter};
use crate::store::{HistoryStore, SnapshotDoc, Store, StoreLayout};

/// What happened to a position report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionOutcome {
    Accepted(Decision),
    Dropped(DropReason),
}

/// Running counters, logged by the feed on disconnect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub identities: u64,
    pub discovered: u64,
    pub renamed: u64,
    pub positions: u64,
    pub accepted: u64,
    pub recorded: u64,
    pub trips_started: u64,
    pub dropped_untracked: u64,
    pub dropped_missing_position: u64,
    pub dropped_implausible_speed: u64,
}

pub struct Tracker<C: Clock = SystemClock> {
    clock: C,
    registry: Registry,
    segmenter: Segmenter,
    snapshots: SnapshotDoc,
    store: Store,
    stats: TrackerStats,
}

impl Tracker<SystemClock> {
    /// Opens the data root at `root` with the built-in fleet table and default
    /// segmentation thresholds.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(
            StoreLayout::new(root.as_ref()),
            FleetTable::builtin(),
            SegmentationConfig::default(),
            SystemClock,
        )
    }
}

impl<C: Clock> Tracker<C> {
    /// Opens a data root and rebuilds in-memory state from it.
    ///
    /// Trip state is recovered from each vessel's last recorded point. When
    /// the snapshot holds a later report, that report becomes the basis for
    /// the next decision while the trip id still comes from history.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for unusable thresholds, `Error::Io` if the
    /// root cannot be created or read, and `Error::Json` if the registry or
    /// snapshot document is corrupt.
    pub fn open_with(
        layout: StoreLayout,
        fleets: FleetTable,
        config: SegmentationConfig,
        clock: C,
    ) -> Result<Self> {
        config.validate()?;
        let store = Store::open(layout)?;
        let loaded = store.load()?;

        let mut snapshots = loaded.snapshots;
        snapshots.retain(|mmsi, _| {
            let known = loaded.registry.contains_key(mmsi);
            if !known {
                warn!("ignoring snapshot for unregistered MMSI={mmsi}");
            }
            known
        });
        for (mmsi, entry) in &loaded.registry {
            snapshots
                .entry(*mmsi)
                .or_insert_with(|| VesselSnapshot::placeholder(entry));
        }

        let mut segmenter = Segmenter::new(config);
        for (mmsi, point) in &loaded.last_points {
            let mut state = TripState {
                trip_id: point.trip_id,
                last_observed_at: point.ts,
                last_lat: point.lat,
                last_lon: point.lon,
            };
            let later_report = snapshots.get(mmsi).and_then(|snap| {
                let (lat, lon) = snap.position()?;
                let at = snap.observed_at?;
                (at > point.ts).then_some((at, lat, lon))
            });
            if let Some((at, lat, lon)) = later_report {
                state.last_observed_at = at;
                state.last_lat = lat;
                state.last_lon = lon;
            }
            segmenter.restore(*mmsi, state);
        }

        info!(
            "loaded {} registered vessels, {} with trip history, from {}",
            loaded.registry.len(),
            segmenter.len(),
            store.layout().root().display()
        );

        Ok(Self {
            clock,
            registry: Registry::new(fleets, loaded.registry),
            segmenter,
            snapshots,
            store,
            stats: TrackerStats::default(),
        })
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn snapshots(&self) -> &SnapshotDoc {
        &self.snapshots
    }

    pub fn snapshot(&self, mmsi: Mmsi) -> Option<&VesselSnapshot> {
        self.snapshots.get(&mmsi)
    }

    pub fn trip_state(&self, mmsi: Mmsi) -> Option<&TripState> {
        self.segmenter.state(mmsi)
    }

    pub fn history(&self) -> &HistoryStore {
        self.store.history()
    }

    pub fn layout(&self) -> &StoreLayout {
        self.store.layout()
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    /// Applies a static identity message.
    ///
    /// Unrecognized and unchanged identities write nothing. A first sighting
    /// writes the registry and a placeholder snapshot; a rename rewrites the
    /// registry and refreshes the snapshot's name and line.
    ///
    /// # Errors
    ///
    /// Returns the store error if a write fails; the registry is left as it
    /// was before the call.
    pub fn observe_identity(&mut self, mmsi: Mmsi, raw_name: &str) -> Result<IdentityChange> {
        self.stats.identities += 1;
        let now = self.clock.now();
        let change = self.registry.classify(mmsi, raw_name, now);
        let Some(entry) = change.entry().cloned() else {
            if let IdentityChange::Unrecognized { name } = &change {
                debug!("ignoring identity MMSI={mmsi} name='{name}'");
            }
            return Ok(change);
        };

        let replaced = self.registry.apply(mmsi, &change);
        if let Err(err) = self.store.write_registry(self.registry.entries()) {
            self.registry.revert(mmsi, replaced);
            return Err(err);
        }

        match &change {
            IdentityChange::Discovered(_) => {
                self.stats.discovered += 1;
                info!("[DISCOVERED] line={} MMSI={} name='{}'", entry.line, mmsi, entry.name);
            }
            IdentityChange::Updated { previous, .. } => {
                self.stats.renamed += 1;
                info!(
                    "[UPDATED] MMSI={} '{}' [{}] -> '{}' [{}]",
                    mmsi, previous.name, previous.line, entry.name, entry.line
                );
            }
            _ => {}
        }

        self.refresh_snapshot_identity(mmsi, &entry)?;
        Ok(change)
    }

    fn refresh_snapshot_identity(&mut self, mmsi: Mmsi, entry: &ClassificationEntry) -> Result<()> {
        let next = match self.snapshots.get(&mmsi) {
            Some(snap) if snap.name == entry.name && snap.line == entry.line => return Ok(()),
            Some(snap) => VesselSnapshot {
                name: entry.name.clone(),
                line: entry.line,
                ..snap.clone()
            },
            None => VesselSnapshot::placeholder(entry),
        };
        self.put_snapshot(mmsi, next).map(|_| ())
    }

    /// Applies a position report.
    ///
    /// Dropped reports (untracked vessel, missing position, implausible speed)
    /// change nothing. Accepted reports always overwrite the snapshot, append
    /// a track point when the decimation rule says so, and then advance the
    /// vessel's trip state.
    ///
    /// # Errors
    ///
    /// Returns the store error if a write fails. Trip state is not advanced
    /// and the snapshot is rolled back for a report whose writes did not all
    /// succeed.
    pub fn observe_position(&mut self, mmsi: Mmsi, report: &PositionReport) -> Result<PositionOutcome> {
        self.stats.positions += 1;
        let now = self.clock.now();
        let tracked = self.registry.contains(mmsi);
        let plan = match self.segmenter.plan(mmsi, tracked, report, now) {
            Ok(plan) => plan,
            Err(reason) => {
                self.count_drop(reason);
                debug!("dropping position MMSI={mmsi}: {}", reason.as_str());
                return Ok(PositionOutcome::Dropped(reason));
            }
        };
        let Some((name, line)) = self
            .registry
            .get(mmsi)
            .map(|entry| (entry.name.clone(), entry.line))
        else {
            return Ok(PositionOutcome::Dropped(DropReason::Untracked));
        };

        let replaced = self.put_snapshot(
            mmsi,
            VesselSnapshot {
                name: name.clone(),
                line,
                lat: Some(plan.lat),
                lon: Some(plan.lon),
                speed: plan.speed,
                course: plan.course,
                observed_at: Some(plan.at),
            },
        )?;

        let decision = plan.decision;
        if decision.record {
            let point = TrackPoint {
                trip_id: decision.trip_id,
                ts: plan.at,
                lat: plan.lat,
                lon: plan.lon,
                speed: plan.speed,
                course: plan.course,
            };
            if let Err(err) = self.store.append_point(mmsi, &point) {
                self.restore_snapshot(mmsi, replaced);
                return Err(err);
            }
            self.stats.recorded += 1;
        }

        self.segmenter.commit(&plan);
        self.stats.accepted += 1;

        if decision.new_trip {
            self.stats.trips_started += 1;
            info!("[TRIP] {name} [{line}] MMSI={mmsi} trip={}", decision.trip_id);
        }
        debug!(
            "{name} [{line}] MMSI={mmsi} lat={:.6} lon={:.6} sog={:?} cog={:?} trip={} recorded={}",
            plan.lat, plan.lon, plan.speed, plan.course, decision.trip_id, decision.record
        );
        Ok(PositionOutcome::Accepted(decision))
    }

    /// Replaces and persists a snapshot, returning the one it replaced. On a
    /// failed write the in-memory map is left as it was.
    fn put_snapshot(&mut self, mmsi: Mmsi, snapshot: VesselSnapshot) -> Result<Option<VesselSnapshot>> {
        let previous = self.snapshots.insert(mmsi, snapshot);
        if let Err(err) = self.store.write_snapshots(&self.snapshots) {
            self.reinstate(mmsi, previous);
            return Err(err);
        }
        Ok(previous)
    }

    /// Undoes a persisted [`Tracker::put_snapshot`] after a later write of the
    /// same message failed.
    fn restore_snapshot(&mut self, mmsi: Mmsi, previous: Option<VesselSnapshot>) {
        self.reinstate(mmsi, previous);
        if let Err(err) = self.store.write_snapshots(&self.snapshots) {
            error!("failed to roll back snapshot for MMSI={mmsi}: {err}");
        }
    }

    fn reinstate(&mut self, mmsi: Mmsi, previous: Option<VesselSnapshot>) {
        match previous {
            Some(previous) => {
                self.snapshots.insert(mmsi, previous);
            }
            None => {
                self.snapshots.remove(&mmsi);
            }
        }
    }

    fn count_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::Untracked => self.stats.dropped_untracked += 1,
            DropReason::MissingPosition => self.stats.dropped_missing_position += 1,
            DropReason::ImplausibleSpeed => self.stats.dropped_implausible_speed += 1,
        }
    }
}
