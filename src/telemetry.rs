//! # ThingSpeak Telemetry Uplink
//!
//! Each cycle uploads six fields with a single HTTP GET to the ThingSpeak
//! `update` endpoint. Uploads are best-effort: there is no retry inside a cycle,
//! the next cycle simply sends fresh values.
//!
//! ## Field Mapping
//! | Field  | Value                       |
//! |--------|-----------------------------|
//! | field1 | percent full                |
//! | field2 | water height (cm)           |
//! | field3 | rate of change (cm/min)     |
//! | field4 | rain ADC moving average     |
//! | field5 | relative humidity (%)       |
//! | field6 | temperature (°C)            |
//!
//! Water fields are omitted when the distance probe faulted that cycle.
//!
//! ## Error Handling
//! - **Transport failures**: DNS, connect, timeout → [`SendError::Http`]
//! - **Non-200 status**: → [`SendError::Status`]
//! - **Body `0`**: ThingSpeak's answer to rate-limited or rejected updates → [`SendError::Rejected`]

use crate::config::TelemetryConfig;
use crate::Report;
use reqwest::{StatusCode, Url};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while uploading a report.
#[derive(Error, Debug)]
pub enum SendError {
    /// HTTP request failed (network, DNS, timeout)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with something other than 200
    #[error("HTTP status {0}")]
    Status(u16),

    /// Server accepted the request but did not store the entry
    #[error("update rejected by server")]
    Rejected,

    /// Endpoint from config could not be parsed
    #[error("invalid endpoint: {0}")]
    Endpoint(String),
}

/// Destination for per-cycle reports.
#[allow(async_fn_in_trait)]
pub trait TelemetrySink {
    async fn send(&mut self, report: &Report) -> Result<(), SendError>;
}

/// Build the ThingSpeak update URL for a report.
pub fn update_url(endpoint: &str, api_key: &str, report: &Report) -> Result<Url, SendError> {
    let base = format!("{}/update", endpoint.trim_end_matches('/'));

    let mut params: Vec<(&str, String)> = vec![("api_key", api_key.to_string())];
    let water = [
        ("field1", report.percent),
        ("field2", report.height_cm),
        ("field3", report.rate_cm_per_min),
    ];
    for (name, value) in water {
        if let Some(v) = value {
            params.push((name, format!("{:.2}", v)));
        }
    }
    params.push(("field4", report.rain_avg.to_string()));
    params.push(("field5", format!("{:.1}", report.humidity_pct)));
    params.push(("field6", format!("{:.1}", report.temperature_c)));

    Url::parse_with_params(&base, &params).map_err(|e| SendError::Endpoint(e.to_string()))
}

/// Uploads reports to a ThingSpeak channel.
pub struct ThingSpeakSink {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl ThingSpeakSink {
    pub fn new(config: &TelemetryConfig) -> Result<Self, SendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.write_api_key.clone(),
        })
    }
}

impl TelemetrySink for ThingSpeakSink {
    async fn send(&mut self, report: &Report) -> Result<(), SendError> {
        let url = update_url(&self.endpoint, &self.api_key, report)?;
        debug!(endpoint = %self.endpoint, "Sending data to ThingSpeak");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(SendError::Status(status.as_u16()));
        }

        // Body is the new entry id, or "0" when the update was not stored
        let body = response.text().await?;
        if body.trim() == "0" {
            return Err(SendError::Rejected);
        }
        info!(entry = body.trim(), "Data sent successfully");
        Ok(())
    }
}

/// Logs reports instead of uploading them (no API key configured).
#[derive(Debug, Default)]
pub struct LogSink {
    sent: u64,
}

impl LogSink {
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl TelemetrySink for LogSink {
    async fn send(&mut self, report: &Report) -> Result<(), SendError> {
        self.sent += 1;
        match serde_json::to_string(report) {
            Ok(json) => info!(report = %json, "Telemetry (log only)"),
            Err(_) => info!(?report, "Telemetry (log only)"),
        }
        Ok(())
    }
}

/// The uplink chosen at startup.
pub enum Uplink {
    ThingSpeak(ThingSpeakSink),
    Log(LogSink),
}

impl Uplink {
    /// ThingSpeak when an API key is configured, log-only otherwise.
    pub fn from_config(config: &TelemetryConfig) -> Result<Self, SendError> {
        if config.write_api_key.trim().is_empty() {
            info!("No ThingSpeak API key configured, telemetry will only be logged");
            Ok(Uplink::Log(LogSink::default()))
        } else {
            Ok(Uplink::ThingSpeak(ThingSpeakSink::new(config)?))
        }
    }
}

impl TelemetrySink for Uplink {
    async fn send(&mut self, report: &Report) -> Result<(), SendError> {
        match self {
            Uplink::ThingSpeak(sink) => sink.send(report).await,
            Uplink::Log(sink) => sink.send(report).await,
        }
    }
}
