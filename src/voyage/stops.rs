use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::model::TrackPoint;
use crate::voyage::ports::PortCatalog;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopParams {
    /// Maximum distance to the nearest port for a point to count as "at" it.
    pub near_km: f64,
    /// Points faster than this end a stop. Missing speed counts as stopped.
    pub slow_kn: f64,
    pub min_dwell: Duration,
}

impl Default for StopParams {
    fn default() -> Self {
        Self {
            near_km: 6.0,
            slow_kn: 1.2,
            min_dwell: Duration::minutes(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortStop {
    pub name: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub arrived_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub departed_at: OffsetDateTime,
    pub dwell_minutes: i64,
    pub min_distance_km: f64,
}

struct OpenStop {
    port: usize,
    start: OffsetDateTime,
    end: OffsetDateTime,
    min_km: f64,
}

/// Finds port calls in the latest trip of `points`: consecutive slow points
/// near the same port, lasting at least `min_dwell`. Points are expected in
/// recorded (time) order.
pub fn detect_port_stops(points: &[TrackPoint], ports: &PortCatalog, params: &StopParams) -> Vec<PortStop> {
    let mut stops = Vec::new();
    let Some(latest_trip) = points.iter().map(|p| p.trip_id).max() else {
        return stops;
    };
    if ports.is_empty() {
        return stops;
    }

    let mut current: Option<OpenStop> = None;
    for point in points.iter().filter(|p| p.trip_id == latest_trip) {
        let near = ports
            .nearest(point.lat, point.lon)
            .filter(|(_, km)| *km <= params.near_km);
        let slow = point.speed.unwrap_or(0.0) <= params.slow_kn;

        let (port, km) = match near {
            Some(hit) if slow => hit,
            _ => {
                if let Some(open) = current.take() {
                    close_stop(open, ports, params, &mut stops);
                }
                continue;
            }
        };

        match current.as_mut() {
            Some(open) if open.port == port => {
                open.end = point.ts;
                open.min_km = open.min_km.min(km);
            }
            _ => {
                if let Some(open) = current.take() {
                    close_stop(open, ports, params, &mut stops);
                }
                current = Some(OpenStop {
                    port,
                    start: point.ts,
                    end: point.ts,
                    min_km: km,
                });
            }
        }
    }
    if let Some(open) = current {
        close_stop(open, ports, params, &mut stops);
    }
    stops
}

fn close_stop(open: OpenStop, ports: &PortCatalog, params: &StopParams, stops: &mut Vec<PortStop>) {
    let dwell = open.end - open.start;
    if dwell < params.min_dwell {
        return;
    }
    let Some(port) = ports.get(open.port) else {
        return;
    };
    stops.push(PortStop {
        name: port.name.clone(),
        country: port.country.clone(),
        lat: port.lat,
        lon: port.lon,
        arrived_at: open.start,
        departed_at: open.end,
        dwell_minutes: (dwell.as_seconds_f64() / 60.0).round() as i64,
        min_distance_km: (open.min_km * 100.0).round() / 100.0,
    });
}
