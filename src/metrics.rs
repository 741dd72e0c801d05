//! # Water Level Metrics
//!
//! Converts a calibrated distance into water height, percent full and a
//! time-normalised rate of change against the previous sample.
//!
//! ## Rate Calculation
//! ```text
//! rate_cm_per_min = (height - last_height) / (elapsed_ms / 60_000)
//! ```
//! The rate is 0 on the first sample and whenever the elapsed time is not
//! positive (duplicate or out-of-order timestamps). The baseline is replaced
//! after every computation, including those that defaulted the rate.

use serde::Serialize;
use tokio::time::Instant;

/// Height and time of the previous sample.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Baseline {
    height_cm: f32,
    taken_at: Instant,
}

/// Inter-sample state carried from one cycle to the next.
///
/// Height and timestamp are stored together, so one can never be set without
/// the other.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WaterState {
    baseline: Option<Baseline>,
}

impl WaterState {
    /// Empty state, as at boot.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_height_cm(&self) -> Option<f32> {
        self.baseline.map(|b| b.height_cm)
    }

    pub fn last_timestamp(&self) -> Option<Instant> {
        self.baseline.map(|b| b.taken_at)
    }

    pub fn is_empty(&self) -> bool {
        self.baseline.is_none()
    }
}

/// Metrics derived from one distance sample.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct WaterMetrics {
    /// 0..=100
    pub percent: f32,
    /// >= 0
    pub height_cm: f32,
    pub rate_cm_per_min: f32,
}

/// Derive metrics from a calibrated distance and return them with the next state.
///
/// Deterministic for identical inputs; never panics or divides by zero.
pub fn compute(
    calibrated_distance_cm: f32,
    tank_depth_cm: f32,
    state: WaterState,
    now: Instant,
) -> (WaterMetrics, WaterState) {
    let height_cm = (tank_depth_cm - calibrated_distance_cm).max(0.0);

    let percent = if tank_depth_cm > 0.0 {
        (height_cm / tank_depth_cm * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    let rate_cm_per_min = state
        .baseline
        .and_then(|last| {
            // None when `now` precedes the baseline
            let elapsed = now.checked_duration_since(last.taken_at)?;
            let minutes = elapsed.as_secs_f64() / 60.0;
            (minutes > 0.0).then(|| ((height_cm - last.height_cm) as f64 / minutes) as f32)
        })
        .unwrap_or(0.0);

    let next = WaterState {
        baseline: Some(Baseline {
            height_cm,
            taken_at: now,
        }),
    };

    (
        WaterMetrics {
            percent,
            height_cm,
            rate_cm_per_min,
        },
        next,
    )
}

/// Owns the [`WaterState`] for a tank of fixed depth.
#[derive(Debug)]
pub struct WaterMetricsEngine {
    tank_depth_cm: f32,
    state: WaterState,
}

impl WaterMetricsEngine {
    pub fn new(tank_depth_cm: f32) -> Self {
        Self {
            tank_depth_cm,
            state: WaterState::new(),
        }
    }

    /// Compute metrics and replace the stored state unconditionally.
    pub fn update(&mut self, calibrated_distance_cm: f32, now: Instant) -> WaterMetrics {
        let (metrics, next) = compute(calibrated_distance_cm, self.tank_depth_cm, self.state, now);
        self.state = next;
        metrics
    }

    pub fn state(&self) -> WaterState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_reference_tank_scenario() {
        // depth 30, offset 35, raw 40 -> calibrated 5
        let calibrated = crate::range::calibrate(40.0, 35.0);
        let (m, _) = compute(calibrated, 30.0, WaterState::new(), Instant::now());
        assert_eq!(m.height_cm, 25.0);
        assert!(approx(m.percent, 83.333), "percent was {}", m.percent);
    }

    #[test]
    fn test_first_sample_has_zero_rate_and_sets_baseline() {
        let now = Instant::now();
        let (m, state) = compute(10.0, 30.0, WaterState::new(), now);
        assert_eq!(m.rate_cm_per_min, 0.0);
        assert_eq!(state.last_height_cm(), Some(20.0));
        assert_eq!(state.last_timestamp(), Some(now));
    }

    #[test]
    fn test_rate_over_thirty_seconds() {
        let t0 = Instant::now();
        let (_, state) = compute(20.0, 30.0, WaterState::new(), t0); // 10 cm
        let (m, _) = compute(14.0, 30.0, state, t0 + Duration::from_secs(30)); // 16 cm
        assert!(approx(m.rate_cm_per_min, 12.0), "rate was {}", m.rate_cm_per_min);
    }

    #[test]
    fn test_zero_elapsed_time_yields_zero_rate() {
        let t0 = Instant::now();
        let (_, state) = compute(20.0, 30.0, WaterState::new(), t0);
        let (m, state) = compute(5.0, 30.0, state, t0);
        assert_eq!(m.rate_cm_per_min, 0.0);
        // Baseline still moves forward
        assert_eq!(state.last_height_cm(), Some(25.0));
    }

    #[test]
    fn test_backwards_timestamp_yields_zero_rate() {
        let t0 = Instant::now();
        let later = t0 + Duration::from_secs(60);
        let (_, state) = compute(20.0, 30.0, WaterState::new(), later);
        let (m, state) = compute(10.0, 30.0, state, t0);
        assert_eq!(m.rate_cm_per_min, 0.0);
        assert_eq!(state.last_timestamp(), Some(t0));
    }

    #[test]
    fn test_percent_and_height_bounds() {
        let now = Instant::now();
        for depth in [1.0_f32, 12.5, 30.0, 200.0] {
            let mut d = 0.0;
            while d <= depth {
                let (m, _) = compute(d, depth, WaterState::new(), now);
                assert!((0.0..=100.0).contains(&m.percent));
                assert!((0.0..=depth).contains(&m.height_cm));
                d += depth / 7.0;
            }
        }
        // Distance beyond the tank floor clamps to empty
        let (m, _) = compute(80.0, 30.0, WaterState::new(), now);
        assert_eq!((m.height_cm, m.percent), (0.0, 0.0));
    }

    #[test]
    fn test_non_positive_depth_reports_zero_percent() {
        let (m, _) = compute(0.0, 0.0, WaterState::new(), Instant::now());
        assert_eq!(m.percent, 0.0);
        assert_eq!(m.height_cm, 0.0);
        let (m, _) = compute(0.0, -10.0, WaterState::new(), Instant::now());
        assert_eq!(m.percent, 0.0);
    }

    #[test]
    fn test_compute_is_deterministic() {
        let t0 = Instant::now();
        let (_, state) = compute(12.0, 30.0, WaterState::new(), t0);
        let t1 = t0 + Duration::from_secs(90);
        assert_eq!(compute(9.0, 30.0, state, t1), compute(9.0, 30.0, state, t1));
    }

    #[test]
    fn test_engine_replaces_state_every_update() {
        let t0 = Instant::now();
        let mut engine = WaterMetricsEngine::new(30.0);
        assert!(engine.state().is_empty());
        engine.update(20.0, t0);
        let m = engine.update(26.0, t0 + Duration::from_secs(120));
        assert!(approx(m.rate_cm_per_min, -3.0));
        assert_eq!(engine.state().last_height_cm(), Some(4.0));
    }
}
