//! # Reporting Cycle
//!
//! The top-level control loop. One cycle samples every sensor, derives the water
//! metrics, decides whether the uplink is usable, reports, and then sleeps until
//! the next cycle.
//!
//! ```text
//! Initializing ─▶ SamplingReady ─▶ Reporting ─▶ Idle ─┐
//!                      ▲                              │
//!                      └──────────────────────────────┘
//!                 (shutdown while Idle) ─▶ Terminated
//! ```
//!
//! ## Failure Policy
//! Nothing that happens inside a cycle ends the loop:
//! - **Sensor faults**: climate falls back to zeros, a distance fault skips the
//!   water fields, a rain ADC fault repeats the previous average
//! - **No link**: a state, reported on the LED and LCD
//! - **Upload failure**: logged and shown on the LCD; the next cycle sends fresh values
//! - **Display/LED faults**: logged and dropped
//!
//! The loop only ends on an external shutdown signal, which is observed between
//! cycles.

use crate::climate::{ClimateProbe, ClimateReader};
use crate::config::Config;
use crate::connectivity::{ConnectivityGate, GateDecision, LinkStatus};
use crate::display::StatusDisplay;
use crate::indicator::{Indicator, PulsePattern};
use crate::metrics::{WaterMetrics, WaterMetricsEngine, WaterState};
use crate::rain::{RainAdc, RainAverager};
use crate::range::{DistanceProbe, RangeSampler};
use crate::telemetry::TelemetrySink;
use crate::{Report, SensorFrame};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Pause after the boot banner and before the goodbye screen is cleared.
pub const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// LCD message while the gate is cooling down.
pub const RETRY_ALERT: &str = "WiFi not connected. Reconnecting...";

/// LCD message when the link was up but the upload did not go through.
pub const UPLOAD_FAILED_ALERT: &str = "Upload failed";

/// Phase of the reporting state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    SamplingReady,
    Reporting,
    Idle,
    Terminated,
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Report uploaded
    Reported,
    /// Link was up but the upload failed
    SendFailed,
    /// No usable link; upload skipped
    Offline,
}

/// Everything one cycle produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleSummary {
    pub frame: SensorFrame,
    pub metrics: Option<WaterMetrics>,
    pub report: Report,
    pub link: GateDecision,
    pub outcome: CycleOutcome,
}

/// Timing and tuning values the cycle needs, taken from [`Config`].
#[derive(Debug, Clone, Copy)]
pub struct CycleSettings {
    pub tank_depth_cm: f32,
    pub sensor_offset_cm: f32,
    pub report_interval: Duration,
    pub rain_window: usize,
    pub climate_attempts: u32,
    pub climate_backoff: Duration,
    pub reconnect_cooldown: Duration,
    pub connect_timeout: Duration,
}

impl From<&Config> for CycleSettings {
    fn from(config: &Config) -> Self {
        Self {
            tank_depth_cm: config.tank.depth_cm,
            sensor_offset_cm: config.tank.sensor_offset_cm,
            report_interval: config.report_interval(),
            rain_window: config.sampling.rain_window,
            climate_attempts: config.sampling.climate_retries,
            climate_backoff: config.climate_backoff(),
            reconnect_cooldown: config.reconnect_cooldown(),
            connect_timeout: config.connect_timeout(),
        }
    }
}

/// The collaborators a cycle drives.
pub struct Peripherals<D, A, C, L, T, S, I> {
    pub range: D,
    pub rain: A,
    pub climate: C,
    pub link: L,
    pub telemetry: T,
    pub display: S,
    pub indicator: I,
}

/// Owns all cycle state and the singleton display/link resources.
pub struct ReportingCycle<D, A, C, L, T, S, I> {
    settings: CycleSettings,
    range: RangeSampler<D>,
    rain: RainAverager<A>,
    climate: ClimateReader<C>,
    engine: WaterMetricsEngine,
    gate: ConnectivityGate<L>,
    telemetry: T,
    display: S,
    indicator: I,
    phase: Phase,
    cycles: u64,
}

impl<D, A, C, L, T, S, I> ReportingCycle<D, A, C, L, T, S, I>
where
    D: DistanceProbe,
    A: RainAdc,
    C: ClimateProbe,
    L: LinkStatus,
    T: TelemetrySink,
    S: StatusDisplay,
    I: Indicator,
{
    pub fn new(settings: CycleSettings, parts: Peripherals<D, A, C, L, T, S, I>) -> Self {
        Self {
            range: RangeSampler::new(parts.range, settings.sensor_offset_cm),
            rain: RainAverager::new(parts.rain, settings.rain_window),
            climate: ClimateReader::new(parts.climate),
            engine: WaterMetricsEngine::new(settings.tank_depth_cm),
            gate: ConnectivityGate::new(
                parts.link,
                settings.reconnect_cooldown,
                settings.connect_timeout,
            ),
            telemetry: parts.telemetry,
            display: parts.display,
            indicator: parts.indicator,
            settings,
            phase: Phase::Initializing,
            cycles: 0,
        }
    }

    /// Boot sequence: banner, settle, first connection attempt, boot blink.
    pub async fn start(&mut self) {
        info!("Initializing system...");
        self.phase = Phase::Initializing;
        self.alert("Initializing system...").await;
        tokio::time::sleep(SETTLE_DELAY).await;

        let link = self.gate.check(Instant::now()).await;
        info!(?link, "Initial link check");

        self.blink(PulsePattern::BOOT).await;
        self.phase = Phase::SamplingReady;
    }

    /// Run one sample → compute → report pass.
    pub async fn run_once(&mut self) -> CycleSummary {
        self.phase = Phase::SamplingReady;
        self.cycles += 1;

        let frame = self.sample().await;

        let metrics = frame
            .distance_cm
            .map(|distance| self.engine.update(distance, Instant::now()));
        let report = Report::new(&frame, metrics.as_ref());
        log_readings(&frame, metrics.as_ref());

        self.phase = Phase::Reporting;
        let link = self.gate.check(Instant::now()).await;

        let outcome = if link.is_usable() {
            match self.telemetry.send(&report).await {
                Ok(()) => {
                    self.show_readings(&frame, metrics.as_ref()).await;
                    self.blink(PulsePattern::SUCCESS).await;
                    CycleOutcome::Reported
                }
                Err(e) => {
                    error!("Failed to send data: {}", e);
                    self.alert(UPLOAD_FAILED_ALERT).await;
                    self.blink(PulsePattern::OFFLINE).await;
                    CycleOutcome::SendFailed
                }
            }
        } else {
            if let GateDecision::Cooling { remaining } = link {
                warn!(?remaining, "WiFi not connected. Reconnecting...");
                self.alert(RETRY_ALERT).await;
            }
            let state = self.gate.state(Instant::now());
            info!(?state, "Offline. Skipping telemetry update.");
            self.blink(PulsePattern::OFFLINE).await;
            CycleOutcome::Offline
        };

        info!(cycle = self.cycles, ?outcome, "Cycle complete");
        self.phase = Phase::Idle;

        CycleSummary {
            frame,
            metrics,
            report,
            link,
            outcome,
        }
    }

    /// Boot, then cycle until `shutdown` resolves, then run the shutdown sequence.
    ///
    /// The shutdown signal is only observed while idling between cycles.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.start().await;

        loop {
            self.run_once().await;
            tokio::select! {
                _ = tokio::time::sleep(self.settings.report_interval) => {}
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        self.stop().await;
    }

    /// Goodbye banner, clear the LCD, switch the LED off.
    pub async fn stop(&mut self) {
        info!("Terminating...");
        self.alert("Terminating...").await;
        tokio::time::sleep(SETTLE_DELAY).await;
        if let Err(e) = self.display.clear().await {
            warn!("LCD unavailable: {}", e);
        }
        if let Err(e) = self.indicator.release() {
            warn!("LED unavailable: {}", e);
        }
        self.phase = Phase::Terminated;
        info!("Finished.");
    }

    async fn sample(&mut self) -> SensorFrame {
        let rain_avg = self.rain.sample();
        let climate = self
            .climate
            .read_or_zero(self.settings.climate_attempts, self.settings.climate_backoff)
            .await;
        let distance_cm = match self.range.sample() {
            Ok(d) => Some(d),
            Err(e) => {
                warn!("Distance reading skipped this cycle: {}", e);
                None
            }
        };

        SensorFrame {
            distance_cm,
            rain_avg,
            temperature_c: climate.temperature_c,
            humidity_pct: climate.humidity_pct,
        }
    }

    async fn alert(&mut self, text: &str) {
        if let Err(e) = self.display.show_alert(text).await {
            warn!("LCD unavailable: {}", e);
        }
    }

    async fn show_readings(&mut self, frame: &SensorFrame, metrics: Option<&WaterMetrics>) {
        let shown = self
            .display
            .show_readings(
                frame.temperature_c,
                frame.humidity_pct,
                metrics.map(|m| m.height_cm),
            )
            .await;
        if let Err(e) = shown {
            warn!("LCD unavailable: {}", e);
        }
    }

    async fn blink(&mut self, pattern: PulsePattern) {
        if let Err(e) = self.indicator.pulse(pattern).await {
            warn!("LED unavailable: {}", e);
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn water_state(&self) -> WaterState {
        self.engine.state()
    }

    pub fn gate(&self) -> &ConnectivityGate<L> {
        &self.gate
    }

    pub fn telemetry(&self) -> &T {
        &self.telemetry
    }

    pub fn display(&self) -> &S {
        &self.display
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    pub fn climate(&self) -> &ClimateReader<C> {
        &self.climate
    }
}

fn log_readings(frame: &SensorFrame, metrics: Option<&WaterMetrics>) {
    info!(
        temperature_c = frame.temperature_c,
        humidity_pct = frame.humidity_pct,
        rain_avg = frame.rain_avg,
        "Climate and rain"
    );
    match (frame.distance_cm, metrics) {
        (Some(distance), Some(m)) => info!(
            height_cm = m.height_cm,
            percent = m.percent,
            rate_cm_per_min = m.rate_cm_per_min,
            distance_cm = distance,
            "Water"
        ),
        _ => info!("Water: no distance reading"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.sampling.report_interval_secs = 60;
        config.network.reconnect_cooldown_ms = 2_500;
        let settings = CycleSettings::from(&config);
        assert_eq!(settings.report_interval, Duration::from_secs(60));
        assert_eq!(settings.reconnect_cooldown, Duration::from_millis(2_500));
        assert_eq!(settings.climate_backoff, Duration::from_millis(150));
        assert_eq!(settings.climate_attempts, 3);
        assert_eq!(settings.tank_depth_cm, 30.0);
        assert_eq!(settings.sensor_offset_cm, 35.0);
    }
}
