//! # Reporting Cycle Scenario Tests
//!
//! End-to-end checks of the control loop against recording fakes. Every test
//! runs with tokio's clock paused, so retry backoffs, report intervals and the
//! boot/shutdown delays cost no wall time.

mod cycle_tests;
