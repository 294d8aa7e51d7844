//! Records shared by the registry, the segmenter and the stores.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// A snapshot older than this is reported as offline.
pub const OFFLINE_AFTER: Duration = Duration::minutes(15);

/// Maritime Mobile Service Identity: the stable key of a vessel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mmsi(pub u64);

impl Mmsi {
    /// Upstream uses 0 for "not set"; it never identifies a vessel.
    pub fn new(raw: u64) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Mmsi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Mmsi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s
            .trim()
            .parse::<u64>()
            .map_err(|err| format!("invalid MMSI {s:?}: {err}"))?;
        Mmsi::new(raw).ok_or_else(|| "MMSI 0 does not identify a vessel".to_string())
    }
}

/// Fleet a tracked vessel belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FleetLine {
    Royal,
    Carnival,
    Ncl,
    Msc,
    Virgin,
    Disney,
}

impl FleetLine {
    pub const ALL: [FleetLine; 6] = [
        FleetLine::Royal,
        FleetLine::Carnival,
        FleetLine::Ncl,
        FleetLine::Msc,
        FleetLine::Virgin,
        FleetLine::Disney,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FleetLine::Royal => "royal",
            FleetLine::Carnival => "carnival",
            FleetLine::Ncl => "ncl",
            FleetLine::Msc => "msc",
            FleetLine::Virgin => "virgin",
            FleetLine::Disney => "disney",
        }
    }
}

impl fmt::Display for FleetLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FleetLine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FleetLine::ALL
            .into_iter()
            .find(|line| line.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown fleet line: {s}"))
    }
}

/// Registry record: which fleet an MMSI belongs to and under what name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationEntry {
    pub name: String,
    pub line: FleetLine,
    #[serde(with = "time::serde::rfc3339")]
    pub discovered_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Most recent known state of a vessel.
///
/// Position fields stay `None` until the first accepted position report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselSnapshot {
    pub name: String,
    pub line: FleetLine,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub speed: Option<f64>,
    pub course: Option<f64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub observed_at: Option<OffsetDateTime>,
}

impl VesselSnapshot {
    pub fn placeholder(entry: &ClassificationEntry) -> Self {
        Self {
            name: entry.name.clone(),
            line: entry.line,
            lat: None,
            lon: None,
            speed: None,
            course: None,
            observed_at: None,
        }
    }

    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.lat?, self.lon?))
    }

    pub fn is_offline(&self, now: OffsetDateTime) -> bool {
        match self.observed_at {
            Some(at) => now - at > OFFLINE_AFTER,
            None => true,
        }
    }
}

/// Per-vessel segmentation basis: the trip in progress and the previous report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripState {
    pub trip_id: u64,
    pub last_observed_at: OffsetDateTime,
    pub last_lat: f64,
    pub last_lon: f64,
}

/// One durably recorded position. Lines of `tracks/<mmsi>.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub trip_id: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    pub lat: f64,
    pub lon: f64,
    pub speed: Option<f64>,
    pub course: Option<f64>,
}

/// Position fields of an inbound report, before validation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionReport {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub speed: Option<f64>,
    pub course: Option<f64>,
}

impl PositionReport {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat: Some(lat),
            lon: Some(lon),
            speed: None,
            course: None,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_course(mut self, course: f64) -> Self {
        self.course = Some(course);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn mmsi_zero_is_not_an_id() {
        assert_eq!(Mmsi::new(0), None);
        assert_eq!(Mmsi::new(311_000_123), Some(Mmsi(311_000_123)));
        assert_eq!(" 311000123 ".parse::<Mmsi>(), Ok(Mmsi(311_000_123)));
        assert!("0".parse::<Mmsi>().is_err());
        assert!("abc".parse::<Mmsi>().is_err());
    }

    #[test]
    fn fleet_line_round_trips_through_str() {
        for line in FleetLine::ALL {
            assert_eq!(line.as_str().parse::<FleetLine>(), Ok(line));
        }
        assert!("princess".parse::<FleetLine>().is_err());
    }

    #[test]
    fn placeholder_snapshot_is_offline() {
        let at = datetime!(2025-12-14 01:00:00 UTC);
        let entry = ClassificationEntry {
            name: "DISNEY WISH".to_string(),
            line: FleetLine::Disney,
            discovered_at: at,
            updated_at: at,
        };
        let mut snapshot = VesselSnapshot::placeholder(&entry);
        assert!(snapshot.is_offline(at));
        assert_eq!(snapshot.position(), None);

        snapshot.lat = Some(28.4);
        snapshot.lon = Some(-80.6);
        snapshot.observed_at = Some(at);
        assert!(!snapshot.is_offline(at + Duration::minutes(15)));
        assert!(snapshot.is_offline(at + Duration::minutes(16)));
    }

    #[test]
    fn track_point_serializes_rfc3339() {
        let point = TrackPoint {
            trip_id: 2,
            ts: datetime!(2025-12-14 01:14:54 UTC),
            lat: 25.77,
            lon: -80.17,
            speed: Some(12.5),
            course: None,
        };
        let line = serde_json::to_string(&point).expect("serialize");
        assert!(line.contains("\"ts\":\"2025-12-14T01:14:54Z\""), "{line}");
        let back: TrackPoint = serde_json::from_str(&line).expect("parse");
        assert_eq!(back, point);
    }
}
