//! Cruise-fleet AIS tracker.
//!
//! Consumes a live AIS position/identity feed, keeps a registry of vessels
//! that belong to the configured cruise lines, and segments their movement
//! into trips persisted as append-only JSON-lines history next to atomically
//! rewritten registry and snapshot documents.

pub mod clock;
pub mod error;
pub mod fleet;
pub mod geo;
pub mod model;
pub mod registry;
pub mod segment;
pub mod store;
pub mod tracker;

#[cfg(feature = "feed")]
pub mod feed;
#[cfg(feature = "voyage")]
pub mod voyage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use fleet::{normalize_name, FleetTable};
pub use model::{
    ClassificationEntry, FleetLine, Mmsi, PositionReport, TrackPoint, TripState, VesselSnapshot,
};
pub use registry::{IdentityChange, Registry};
pub use segment::{Decision, DropReason, SegmentationConfig, Segmenter};
pub use store::{HistoryStore, Store, StoreLayout, TrackMode};
pub use tracker::{PositionOutcome, Tracker, TrackerStats};
