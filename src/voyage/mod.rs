//! Offline voyage analytics over recorded history: port calls, next-port
//! guess, ETA and a rough confidence figure.

mod ports;
mod predict;
mod stops;

use serde::Serialize;

use crate::model::{Mmsi, TrackPoint, VesselSnapshot};

pub use ports::{Port, PortCatalog};
pub use predict::{confidence_score, estimate_eta_hours, predict_next_port, NextPort, PredictParams};
pub use stops::{detect_port_stops, PortStop, StopParams};

#[derive(Debug, Clone, Serialize)]
pub struct VoyageSummary {
    pub mmsi: Mmsi,
    pub snapshot: Option<VesselSnapshot>,
    pub trip_id: Option<u64>,
    pub points: usize,
    pub last_port: Option<PortStop>,
    pub stops: Vec<PortStop>,
    pub next_port: Option<NextPort>,
    pub eta_hours: Option<f64>,
    pub confidence: f64,
}

/// Builds a summary from a vessel's snapshot and recorded points.
///
/// The current position comes from the snapshot when it has one, otherwise
/// from the last recorded point.
pub fn summarize(
    mmsi: Mmsi,
    snapshot: Option<&VesselSnapshot>,
    points: &[TrackPoint],
    ports: &PortCatalog,
) -> VoyageSummary {
    let stops = detect_port_stops(points, ports, &StopParams::default());
    let last_port = stops.last().cloned();

    let last_point = points.last();
    let current = snapshot
        .and_then(|snap| {
            let (lat, lon) = snap.position()?;
            Some((lat, lon, snap.speed, snap.course))
        })
        .or_else(|| last_point.map(|p| (p.lat, p.lon, p.speed, p.course)));

    let (next_port, eta_hours, heading_known) = match current {
        Some((lat, lon, speed, course)) => {
            let next = predict_next_port(lat, lon, course, ports, &PredictParams::default());
            let eta = estimate_eta_hours(next.as_ref().map(|n| n.distance_km), speed)
                .map(|h| (h * 10.0).round() / 10.0);
            (next, eta, course.is_some())
        }
        None => (None, None, false),
    };

    VoyageSummary {
        mmsi,
        snapshot: snapshot.cloned(),
        trip_id: points.iter().map(|p| p.trip_id).max(),
        points: points.len(),
        confidence: confidence_score(points.len(), last_port.is_some(), heading_known),
        last_port,
        stops,
        next_port,
        eta_hours,
    }
}
