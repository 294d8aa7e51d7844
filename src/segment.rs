//! Trip segmentation and track decimation.
//!
//! Every accepted report is compared against the vessel's previous *report*
//! (not its previous recorded point) to answer two independent questions:
//!
//! - does this report open a new trip (long silence or a large jump)?
//! - should this report be written to the track (enough time or distance)?
//!
//! The basis is advanced on every accepted report, recorded or not.

use std::collections::HashMap;

use time::{Duration, OffsetDateTime};

use crate::geo::haversine_km;
use crate::model::{Mmsi, PositionReport, TripState};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentationConfig {
    /// Silence after which the next report starts a new trip.
    pub new_trip_gap: Duration,
    /// Jump from the previous report that starts a new trip.
    pub new_trip_jump_km: f64,
    /// Record a point at least this often.
    pub min_point_interval: Duration,
    /// Record a point whenever the vessel moved this far.
    pub min_point_distance_m: f64,
    /// Speed over ground above which a report is discarded as noise.
    pub max_speed_kn: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            new_trip_gap: Duration::hours(6),
            new_trip_jump_km: 150.0,
            min_point_interval: Duration::seconds(60),
            min_point_distance_m: 200.0,
            max_speed_kn: 80.0,
        }
    }
}

impl SegmentationConfig {
    /// Rejects thresholds that would make every report a new trip or a drop.
    pub fn validate(&self) -> crate::error::Result<()> {
        let bad = |what: &str| Err(crate::error::Error::Config(format!("{what} must be positive")));
        if self.new_trip_gap <= Duration::ZERO {
            return bad("new_trip_gap");
        }
        if !(self.new_trip_jump_km > 0.0) {
            return bad("new_trip_jump_km");
        }
        if self.min_point_interval < Duration::ZERO || !(self.min_point_distance_m >= 0.0) {
            return Err(crate::error::Error::Config(
                "point decimation thresholds must not be negative".to_string(),
            ));
        }
        if !(self.max_speed_kn > 0.0) {
            return bad("max_speed_kn");
        }
        Ok(())
    }
}

/// Why a position report was discarded. No state changes for a dropped report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Untracked,
    MissingPosition,
    ImplausibleSpeed,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DropReason::Untracked => "untracked",
            DropReason::MissingPosition => "missing position",
            DropReason::ImplausibleSpeed => "implausible speed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub trip_id: u64,
    pub new_trip: bool,
    pub record: bool,
}

/// A validated report together with the decision taken for it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plan {
    pub mmsi: Mmsi,
    pub lat: f64,
    pub lon: f64,
    pub speed: Option<f64>,
    pub course: Option<f64>,
    pub at: OffsetDateTime,
    pub decision: Decision,
}

/// Applies the validation order: tracked, then position present, then speed.
pub fn validate(
    tracked: bool,
    report: &PositionReport,
    config: &SegmentationConfig,
) -> Result<(f64, f64), DropReason> {
    if !tracked {
        return Err(DropReason::Untracked);
    }
    let (Some(lat), Some(lon)) = (
        report.lat.filter(|v| v.is_finite()),
        report.lon.filter(|v| v.is_finite()),
    ) else {
        return Err(DropReason::MissingPosition);
    };
    if matches!(report.speed, Some(speed) if speed > config.max_speed_kn) {
        return Err(DropReason::ImplausibleSpeed);
    }
    Ok((lat, lon))
}

/// Trip and record decisions for a report at `(lat, lon, now)` given the
/// previous report's state.
pub fn decide(
    prev: Option<&TripState>,
    lat: f64,
    lon: f64,
    now: OffsetDateTime,
    config: &SegmentationConfig,
) -> Decision {
    let Some(prev) = prev else {
        return Decision {
            trip_id: 1,
            new_trip: true,
            record: true,
        };
    };

    // A clock step backwards counts as no time passing.
    let elapsed = (now - prev.last_observed_at).max(Duration::ZERO);
    let moved_km = haversine_km(prev.last_lat, prev.last_lon, lat, lon);

    let new_trip = elapsed >= config.new_trip_gap || moved_km >= config.new_trip_jump_km;
    let record =
        elapsed >= config.min_point_interval || moved_km * 1000.0 >= config.min_point_distance_m;

    Decision {
        trip_id: if new_trip { prev.trip_id + 1 } else { prev.trip_id },
        new_trip,
        record,
    }
}

/// In-memory trip state for every vessel that has reported a position.
#[derive(Debug, Default)]
pub struct Segmenter {
    config: SegmentationConfig,
    trips: HashMap<Mmsi, TripState>,
}

impl Segmenter {
    pub fn new(config: SegmentationConfig) -> Self {
        Self {
            config,
            trips: HashMap::new(),
        }
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    pub fn state(&self, mmsi: Mmsi) -> Option<&TripState> {
        self.trips.get(&mmsi)
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    /// Seeds state recovered from disk.
    pub fn restore(&mut self, mmsi: Mmsi, state: TripState) {
        self.trips.insert(mmsi, state);
    }

    /// Validates a report and decides its trip and record flags without
    /// mutating anything. Call [`Segmenter::commit`] once the plan is durable.
    ///
    /// `Plan::at` is `now`, or the previous report's time if the clock has
    /// stepped back since.
    pub fn plan(
        &self,
        mmsi: Mmsi,
        tracked: bool,
        report: &PositionReport,
        now: OffsetDateTime,
    ) -> Result<Plan, DropReason> {
        let (lat, lon) = validate(tracked, report, &self.config)?;
        let prev = self.trips.get(&mmsi);
        let decision = decide(prev, lat, lon, now, &self.config);
        // Track timestamps stay non-decreasing across a clock step back.
        let at = prev.map_or(now, |prev| now.max(prev.last_observed_at));
        Ok(Plan {
            mmsi,
            lat,
            lon,
            speed: report.speed,
            course: report.course,
            at,
            decision,
        })
    }

    /// Makes the planned report the basis for the vessel's next decision.
    pub fn commit(&mut self, plan: &Plan) {
        self.trips.insert(
            plan.mmsi,
            TripState {
                trip_id: plan.decision.trip_id,
                last_observed_at: plan.at,
                last_lat: plan.lat,
                last_lon: plan.lon,
            },
        );
    }

    /// Plans and commits in one step.
    pub fn observe(
        &mut self,
        mmsi: Mmsi,
        tracked: bool,
        report: &PositionReport,
        now: OffsetDateTime,
    ) -> Result<Decision, DropReason> {
        let plan = self.plan(mmsi, tracked, report, now)?;
        self.commit(&plan);
        Ok(plan.decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2025-12-14 00:00:00 UTC);
    const MMSI: Mmsi = Mmsi(311_000_123);

    // ~0.009 degrees of latitude per kilometre.
    fn north_of(lat: f64, metres: f64) -> f64 {
        lat + metres / 1000.0 / 111.195
    }

    #[test]
    fn first_report_opens_trip_one_and_records() {
        let mut seg = Segmenter::default();
        let d = seg
            .observe(MMSI, true, &PositionReport::new(25.0, -80.0), T0)
            .expect("accepted");
        assert_eq!(d, Decision { trip_id: 1, new_trip: true, record: true });
    }

    #[test]
    fn decimation_against_previous_report() {
        let mut seg = Segmenter::default();
        let lat0 = 25.0;
        seg.observe(MMSI, true, &PositionReport::new(lat0, -80.0), T0)
            .expect("first");

        let lat1 = north_of(lat0, 50.0);
        let d = seg
            .observe(MMSI, true, &PositionReport::new(lat1, -80.0), T0 + Duration::seconds(30))
            .expect("second");
        assert_eq!(d, Decision { trip_id: 1, new_trip: false, record: false });

        let lat2 = north_of(lat1, 250.0);
        let d = seg
            .observe(MMSI, true, &PositionReport::new(lat2, -80.0), T0 + Duration::seconds(40))
            .expect("third");
        assert_eq!(d, Decision { trip_id: 1, new_trip: false, record: true });
    }

    #[test]
    fn time_alone_forces_a_record() {
        let mut seg = Segmenter::default();
        seg.observe(MMSI, true, &PositionReport::new(25.0, -80.0), T0)
            .expect("first");
        let d = seg
            .observe(MMSI, true, &PositionReport::new(25.0, -80.0), T0 + Duration::seconds(60))
            .expect("second");
        assert!(d.record);
        assert!(!d.new_trip);
    }

    #[test]
    fn long_gap_opens_new_trip() {
        let mut seg = Segmenter::default();
        seg.observe(MMSI, true, &PositionReport::new(25.0, -80.0), T0)
            .expect("first");
        let d = seg
            .observe(
                MMSI,
                true,
                &PositionReport::new(north_of(25.0, 5_000.0), -80.0),
                T0 + Duration::hours(7),
            )
            .expect("second");
        assert_eq!(d, Decision { trip_id: 2, new_trip: true, record: true });
    }

    #[test]
    fn large_jump_opens_new_trip() {
        let mut seg = Segmenter::default();
        seg.observe(MMSI, true, &PositionReport::new(25.0, -80.0), T0)
            .expect("first");
        let d = seg
            .observe(
                MMSI,
                true,
                &PositionReport::new(north_of(25.0, 151_000.0), -80.0),
                T0 + Duration::seconds(10),
            )
            .expect("second");
        assert_eq!(d.trip_id, 2);
        assert!(d.new_trip);
    }

    #[test]
    fn just_under_thresholds_stays_in_trip() {
        let prev = TripState {
            trip_id: 4,
            last_observed_at: T0,
            last_lat: 25.0,
            last_lon: -80.0,
        };
        let config = SegmentationConfig::default();
        let d = decide(
            Some(&prev),
            north_of(25.0, 149_000.0),
            -80.0,
            T0 + Duration::hours(6) - Duration::seconds(1),
            &config,
        );
        assert_eq!(d.trip_id, 4);
        assert!(!d.new_trip);
    }

    #[test]
    fn clock_step_back_is_not_elapsed_time() {
        let prev = TripState {
            trip_id: 1,
            last_observed_at: T0,
            last_lat: 25.0,
            last_lon: -80.0,
        };
        let d = decide(
            Some(&prev),
            25.0,
            -80.0,
            T0 - Duration::hours(8),
            &SegmentationConfig::default(),
        );
        assert_eq!(d, Decision { trip_id: 1, new_trip: false, record: false });
    }

    #[test]
    fn validation_order_and_no_mutation_on_drop() {
        let mut seg = Segmenter::default();
        let no_lat = PositionReport {
            lat: None,
            lon: Some(-80.0),
            speed: Some(500.0),
            course: None,
        };
        assert_eq!(seg.observe(MMSI, false, &no_lat, T0), Err(DropReason::Untracked));
        assert_eq!(seg.observe(MMSI, true, &no_lat, T0), Err(DropReason::MissingPosition));

        let fast = PositionReport::new(25.0, -80.0).with_speed(80.1);
        assert_eq!(seg.observe(MMSI, true, &fast, T0), Err(DropReason::ImplausibleSpeed));
        assert!(seg.state(MMSI).is_none());

        let at_ceiling = PositionReport::new(25.0, -80.0).with_speed(80.0);
        assert!(seg.observe(MMSI, true, &at_ceiling, T0).is_ok());
        assert_eq!(seg.len(), 1);
    }

    #[test]
    fn plan_does_not_advance_until_commit() {
        let mut seg = Segmenter::default();
        let plan = seg
            .plan(MMSI, true, &PositionReport::new(25.0, -80.0), T0)
            .expect("plan");
        assert!(seg.state(MMSI).is_none());
        seg.commit(&plan);
        let state = seg.state(MMSI).expect("state");
        assert_eq!(state.trip_id, 1);
        assert_eq!(state.last_observed_at, T0);
    }

    #[test]
    fn config_validation() {
        assert!(SegmentationConfig::default().validate().is_ok());
        let zero_gap = SegmentationConfig {
            new_trip_gap: Duration::ZERO,
            ..SegmentationConfig::default()
        };
        assert!(zero_gap.validate().is_err());
        let nan_speed = SegmentationConfig {
            max_speed_kn: f64::NAN,
            ..SegmentationConfig::default()
        };
        assert!(nan_speed.validate().is_err());
    }

    #[test]
    fn clock_step_back_keeps_basis_time() {
        let mut seg = Segmenter::default();
        seg.observe(MMSI, true, &PositionReport::new(25.0, -80.0), T0)
            .expect("first");
        let report = PositionReport::new(north_of(25.0, 1100.0), -80.0);
        let plan = seg
            .plan(MMSI, true, &report, T0 - Duration::hours(1))
            .expect("plan");
        assert_eq!(plan.at, T0);
        assert_eq!(plan.decision, Decision { trip_id: 1, new_trip: false, record: true });
        seg.commit(&plan);
        assert_eq!(seg.state(MMSI).map(|s| s.last_observed_at), Some(T0));
    }
}
