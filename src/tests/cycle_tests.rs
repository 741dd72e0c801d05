use super::fakes::*;
use std::time::Duration;
use tank_monitor_lib::connectivity::GateDecision;
use tank_monitor_lib::cycle::{CycleOutcome, Phase, RETRY_ALERT, UPLOAD_FAILED_ALERT};
use tank_monitor_lib::indicator::PulsePattern;
use tokio::time::{sleep, Instant};

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-2
}

/// Reference tank: depth 30 cm, sensor 35 cm above the rim, 40 cm raw reading.
#[tokio::test(start_paused = true)]
async fn reference_tank_reports_all_six_fields() {
    let mut cycle = build(settings(), parts(&[Some(40.0)]));
    let summary = cycle.run_once().await;

    assert_eq!(summary.outcome, CycleOutcome::Reported);
    assert_eq!(summary.link, GateDecision::Connected);
    assert_eq!(summary.frame.distance_cm, Some(5.0));

    let sent = &cycle.telemetry().attempts;
    assert_eq!(sent.len(), 1);
    let report = sent[0];
    assert_eq!(report.height_cm, Some(25.0));
    assert!(approx(report.percent.unwrap(), 83.33));
    assert_eq!(report.rate_cm_per_min, Some(0.0));
    assert_eq!(report.rain_avg, 512);
    assert_eq!(report.humidity_pct, 71.0);
    assert_eq!(report.temperature_c, 29.0);

    assert_eq!(cycle.display().readings, vec![(29.0, 71.0, Some(25.0))]);
    assert_eq!(cycle.indicator().patterns, vec![PulsePattern::SUCCESS]);
    assert_eq!(cycle.phase(), Phase::Idle);
}

/// 10 cm → 16 cm over 30 s is 12 cm/min.
#[tokio::test(start_paused = true)]
async fn rate_is_normalised_to_minutes_between_cycles() {
    let mut cycle = build(settings(), parts(&[Some(55.0), Some(49.0)]));

    let first = cycle.run_once().await;
    assert_eq!(first.metrics.unwrap().height_cm, 10.0);
    assert_eq!(first.metrics.unwrap().rate_cm_per_min, 0.0);

    sleep(Duration::from_secs(30)).await;

    let second = cycle.run_once().await;
    let metrics = second.metrics.unwrap();
    assert_eq!(metrics.height_cm, 16.0);
    assert!(approx(metrics.rate_cm_per_min, 12.0), "rate {}", metrics.rate_cm_per_min);
}

/// A failed upload is not retried in the same cycle; the next cycle sends fresh values.
#[tokio::test(start_paused = true)]
async fn send_failure_does_not_stop_next_cycle() {
    let mut p = parts(&[Some(55.0), Some(49.0)]);
    p.telemetry.fail_next = 1;
    let mut cycle = build(settings(), p);

    assert_eq!(cycle.run_once().await.outcome, CycleOutcome::SendFailed);
    assert_eq!(cycle.telemetry().attempts.len(), 1);

    sleep(Duration::from_secs(60)).await;

    assert_eq!(cycle.run_once().await.outcome, CycleOutcome::Reported);
    let attempts = &cycle.telemetry().attempts;
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[1].height_cm, Some(16.0));
}

/// A failed upload is visible on the LCD and LED, not shown as a success.
#[tokio::test(start_paused = true)]
async fn failed_upload_is_signalled_on_display_and_led() {
    let mut p = parts(&[Some(40.0)]);
    p.telemetry.fail_next = 1;
    let mut cycle = build(settings(), p);

    let failed = cycle.run_once().await;
    assert_eq!(failed.outcome, CycleOutcome::SendFailed);
    assert_eq!(cycle.display().alerts, vec![UPLOAD_FAILED_ALERT.to_string()]);
    assert!(cycle.display().readings.is_empty());
    assert_eq!(cycle.indicator().patterns, vec![PulsePattern::OFFLINE]);

    let recovered = cycle.run_once().await;
    assert_eq!(recovered.outcome, CycleOutcome::Reported);
    assert_eq!(cycle.display().alerts.len(), 1);
    assert_eq!(cycle.display().readings, vec![(29.0, 71.0, Some(25.0))]);
    assert_eq!(
        cycle.indicator().patterns,
        vec![PulsePattern::OFFLINE, PulsePattern::SUCCESS]
    );
}

/// Offline cycles skip the upload, blink the offline pattern and respect the cooldown.
#[tokio::test(start_paused = true)]
async fn offline_cycles_respect_reconnect_cooldown() {
    let mut s = settings();
    s.reconnect_cooldown = Duration::from_secs(10);
    let mut p = parts(&[Some(40.0)]);
    p.link = FakeLink::down(false);
    let mut cycle = build(s, p);

    let first = cycle.run_once().await;
    assert_eq!(first.link, GateDecision::ReconnectFailed);
    assert_eq!(first.outcome, CycleOutcome::Offline);
    assert_eq!(cycle.gate().link().reconnects, 1);

    sleep(Duration::from_secs(3)).await;
    let second = cycle.run_once().await;
    assert!(matches!(second.link, GateDecision::Cooling { .. }));
    assert_eq!(second.outcome, CycleOutcome::Offline);
    assert_eq!(cycle.gate().link().reconnects, 1);
    assert_eq!(cycle.display().alerts, vec![RETRY_ALERT.to_string()]);

    sleep(Duration::from_secs(10)).await;
    let third = cycle.run_once().await;
    assert_eq!(third.link, GateDecision::ReconnectFailed);
    assert_eq!(cycle.gate().link().reconnects, 2);

    assert!(cycle.telemetry().attempts.is_empty());
    assert_eq!(cycle.indicator().patterns, vec![PulsePattern::OFFLINE; 3]);
    // Metrics keep flowing while offline
    assert!(cycle.water_state().last_height_cm().is_some());
}

#[tokio::test(start_paused = true)]
async fn successful_reconnect_reports_in_same_cycle() {
    let mut p = parts(&[Some(40.0)]);
    p.link = FakeLink::down(true);
    let mut cycle = build(settings(), p);

    let summary = cycle.run_once().await;
    assert_eq!(summary.link, GateDecision::Reconnected);
    assert_eq!(summary.outcome, CycleOutcome::Reported);
    assert_eq!(cycle.telemetry().attempts.len(), 1);
}

/// Climate probe exhaustion reports zeros after the bounded retries.
#[tokio::test(start_paused = true)]
async fn dead_climate_probe_reports_zero() {
    let mut p = parts(&[Some(40.0)]);
    p.climate = FlakyClimate::dead();
    let mut cycle = build(settings(), p);

    let start = Instant::now();
    let summary = cycle.run_once().await;
    // 3 attempts, 150 ms between them
    assert_eq!(start.elapsed(), Duration::from_millis(300));
    assert_eq!(cycle.climate().probe().calls, 3);

    assert_eq!(summary.outcome, CycleOutcome::Reported);
    assert_eq!(summary.report.temperature_c, 0.0);
    assert_eq!(summary.report.humidity_pct, 0.0);
    assert_eq!(summary.report.height_cm, Some(25.0));
}

/// A distance timeout skips the water fields but keeps the previous baseline.
#[tokio::test(start_paused = true)]
async fn distance_fault_skips_water_fields() {
    let mut cycle = build(settings(), parts(&[Some(55.0), None, Some(49.0)]));

    cycle.run_once().await;
    let baseline = cycle.water_state();

    sleep(Duration::from_secs(30)).await;
    let faulted = cycle.run_once().await;
    assert_eq!(faulted.outcome, CycleOutcome::Reported);
    assert!(faulted.metrics.is_none());
    assert_eq!(faulted.report.percent, None);
    assert_eq!(faulted.report.height_cm, None);
    assert_eq!(faulted.report.rate_cm_per_min, None);
    assert_eq!(faulted.report.rain_avg, 512);
    assert_eq!(cycle.water_state(), baseline);
    assert_eq!(cycle.display().readings[1], (29.0, 71.0, None));

    sleep(Duration::from_secs(30)).await;
    let recovered = cycle.run_once().await;
    // 6 cm over the full minute since the last good sample
    assert!(approx(recovered.metrics.unwrap().rate_cm_per_min, 6.0));
}

#[tokio::test(start_paused = true)]
async fn broken_display_is_not_fatal() {
    let mut p = parts(&[Some(40.0)]);
    p.display.broken = true;
    let mut cycle = build(settings(), p);

    cycle.start().await;
    let summary = cycle.run_once().await;
    assert_eq!(summary.outcome, CycleOutcome::Reported);
    assert!(cycle.display().readings.is_empty());
    assert_eq!(cycle.telemetry().attempts.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn boot_sequence_connects_and_blinks() {
    let mut p = parts(&[Some(40.0)]);
    p.link = FakeLink::down(true);
    let mut cycle = build(settings(), p);
    assert_eq!(cycle.phase(), Phase::Initializing);

    let start = Instant::now();
    cycle.start().await;
    assert_eq!(start.elapsed(), Duration::from_secs(2));
    assert_eq!(cycle.display().alerts, vec!["Initializing system...".to_string()]);
    assert_eq!(cycle.gate().link().reconnects, 1);
    assert_eq!(cycle.indicator().patterns, vec![PulsePattern::BOOT]);
    assert_eq!(cycle.phase(), Phase::SamplingReady);
}

/// The loop runs until shutdown, then shows the goodbye banner and releases the LED.
#[tokio::test(start_paused = true)]
async fn run_stops_cleanly_on_shutdown() {
    let mut s = settings();
    s.report_interval = Duration::from_secs(60);
    let mut cycle = build(s, parts(&[Some(40.0)]));

    // Boot takes 2 s, cycles at 2 s and 62 s, shutdown while idling at 100 s
    cycle.run(sleep(Duration::from_secs(100))).await;

    assert_eq!(cycle.cycles(), 2);
    assert_eq!(cycle.telemetry().attempts.len(), 2);
    assert_eq!(cycle.phase(), Phase::Terminated);
    assert_eq!(
        cycle.display().alerts,
        vec!["Initializing system...".to_string(), "Terminating...".to_string()]
    );
    assert_eq!(cycle.display().clears, 1);
    assert!(cycle.indicator().released);
    assert!(!cycle.indicator().lit);
}
