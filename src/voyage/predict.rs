use serde::Serialize;

use crate::geo::{angle_diff, bearing_deg, haversine_km};
use crate::voyage::ports::PortCatalog;

const KNOT_KMH: f64 = 1.852;
/// Below this speed a vessel is considered not under way and gets no ETA.
const MIN_ETA_SPEED_KN: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictParams {
    pub max_km: f64,
    pub heading_weight: f64,
    pub distance_weight: f64,
}

impl Default for PredictParams {
    fn default() -> Self {
        Self {
            max_km: 900.0,
            heading_weight: 0.65,
            distance_weight: 0.35,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextPort {
    pub name: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub distance_km: f64,
    pub heading_diff_deg: Option<f64>,
    pub score: f64,
}

/// Picks the most likely next port among those within `max_km`.
///
/// With a known course the score blends heading agreement and proximity;
/// without one, proximity alone decides.
pub fn predict_next_port(
    lat: f64,
    lon: f64,
    course: Option<f64>,
    ports: &PortCatalog,
    params: &PredictParams,
) -> Option<NextPort> {
    let candidates: Vec<(usize, f64)> = ports
        .ports()
        .iter()
        .enumerate()
        .map(|(idx, p)| (idx, haversine_km(lat, lon, p.lat, p.lon)))
        .filter(|(_, km)| *km <= params.max_km)
        .collect();

    let dmax = candidates.iter().map(|(_, km)| *km).fold(0.0_f64, f64::max);
    let dmax = if dmax > 0.0 { dmax } else { 1.0 };

    let mut best: Option<(usize, f64, f64, Option<f64>)> = None;
    for (idx, km) in candidates {
        let port = &ports.ports()[idx];
        let dist_score = 1.0 - km / dmax;
        let (score, diff) = match course {
            Some(course) => {
                let diff = angle_diff(course, bearing_deg(lat, lon, port.lat, port.lon));
                let heading_score = (1.0 - diff / 180.0).max(0.0);
                (
                    params.heading_weight * heading_score + params.distance_weight * dist_score,
                    Some(diff),
                )
            }
            None => (dist_score, None),
        };
        if best.map_or(true, |(_, _, best_score, _)| score > best_score) {
            best = Some((idx, km, score, diff));
        }
    }

    let (idx, km, score, diff) = best?;
    let port = ports.get(idx)?;
    Some(NextPort {
        name: port.name.clone(),
        country: port.country.clone(),
        lat: port.lat,
        lon: port.lon,
        distance_km: round_to(km, 1),
        heading_diff_deg: diff.map(|d| round_to(d, 1)),
        score: round_to(score, 3),
    })
}

/// Hours to cover `distance_km` at `speed_kn`, or `None` when either is
/// unknown or the vessel is barely moving.
pub fn estimate_eta_hours(distance_km: Option<f64>, speed_kn: Option<f64>) -> Option<f64> {
    let distance_km = distance_km?;
    let speed = speed_kn.unwrap_or(0.0);
    if speed <= MIN_ETA_SPEED_KN {
        return None;
    }
    Some(distance_km / (speed * KNOT_KMH))
}

/// Rough confidence in a prediction: more history, a known last port call
/// and a known heading each add to a 0.35 base, capped at 0.95.
pub fn confidence_score(points_count: usize, has_last_port: bool, heading_known: bool) -> f64 {
    let mut score = 0.35 + (points_count as f64 / 1200.0).min(0.35);
    if has_last_port {
        score += 0.15;
    }
    if heading_known {
        score += 0.10;
    }
    round_to(score.min(0.95), 2)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voyage::ports::Port;

    fn port(name: &str, lat: f64, lon: f64) -> Port {
        Port {
            name: name.to_string(),
            country: String::new(),
            lat,
            lon,
        }
    }

    fn catalog() -> PortCatalog {
        PortCatalog::new(vec![
            port("North", 27.0, -79.0),
            port("East", 25.0, -76.0),
            port("Far", 60.0, 10.0),
        ])
    }

    #[test]
    fn heading_decides_between_candidates() {
        let next = predict_next_port(25.0, -79.0, Some(90.0), &catalog(), &PredictParams::default())
            .expect("prediction");
        assert_eq!(next.name, "East");
        assert!(next.heading_diff_deg.expect("diff") < 2.0);

        let next = predict_next_port(25.0, -79.0, Some(0.0), &catalog(), &PredictParams::default())
            .expect("prediction");
        assert_eq!(next.name, "North");
    }

    #[test]
    fn without_course_nearest_wins() {
        let next = predict_next_port(25.0, -79.0, None, &catalog(), &PredictParams::default())
            .expect("prediction");
        assert_eq!(next.name, "North");
        assert_eq!(next.heading_diff_deg, None);
        assert!(next.distance_km > 200.0 && next.distance_km < 250.0);
    }

    #[test]
    fn nothing_in_range() {
        assert!(predict_next_port(-40.0, 20.0, Some(0.0), &catalog(), &PredictParams::default()).is_none());
    }

    #[test]
    fn eta_and_confidence() {
        assert_eq!(estimate_eta_hours(Some(185.2), Some(10.0)), Some(10.0));
        assert_eq!(estimate_eta_hours(Some(100.0), Some(2.0)), None);
        assert_eq!(estimate_eta_hours(None, Some(20.0)), None);
        assert_eq!(estimate_eta_hours(Some(100.0), None), None);

        assert_eq!(confidence_score(0, false, false), 0.35);
        assert_eq!(confidence_score(600, true, false), 0.75);
        assert_eq!(confidence_score(5000, true, true), 0.95);
    }
}
