//! # Linux Kernel-Interface Collaborators
//!
//! Collaborators that talk to the kernel through plain files and commands, so
//! they need no extra crates and work on any Pi image:
//!
//! - [`IioClimateProbe`]: DHT11 through the `dht11` device-tree overlay, which
//!   exposes `in_temp_input` and `in_humidityrelative_input` in milli-units
//! - [`NetLink`]: link state from `/sys/class/net/<if>/operstate`, reconnects by
//!   running a configurable command (e.g. `wpa_cli -i wlan0 reconnect`)

use crate::climate::{ClimateError, ClimateProbe, ClimateReading};
use crate::connectivity::LinkStatus;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Interval between link checks while waiting for a reconnect.
const RECONNECT_POLL: Duration = Duration::from_secs(1);

/// DHT11 read through the Linux IIO subsystem.
pub struct IioClimateProbe {
    device: PathBuf,
}

impl IioClimateProbe {
    pub fn new<P: AsRef<Path>>(device: P) -> Self {
        Self {
            device: device.as_ref().to_path_buf(),
        }
    }

    fn read_milli(&self, name: &str) -> Result<f32, ClimateError> {
        let path = self.device.join(name);
        // The driver answers EIO on a checksum failure, which is the usual transient
        let raw = fs::read_to_string(&path)
            .map_err(|e| ClimateError::Bus(format!("{}: {}", path.display(), e)))?;
        let milli: i32 = raw
            .trim()
            .parse()
            .map_err(|_| ClimateError::Bus(format!("{}: bad value {:?}", path.display(), raw.trim())))?;
        Ok(milli as f32 / 1000.0)
    }
}

impl ClimateProbe for IioClimateProbe {
    fn measure(&mut self) -> Result<ClimateReading, ClimateError> {
        let temperature_c = self.read_milli("in_temp_input")?;
        let humidity_pct = self.read_milli("in_humidityrelative_input")?;
        Ok(ClimateReading {
            temperature_c,
            humidity_pct,
        })
    }
}

/// Network interface watched through sysfs.
pub struct NetLink {
    operstate: PathBuf,
    reconnect_command: Vec<String>,
}

impl NetLink {
    /// Watch `interface` under `/sys/class/net`.
    pub fn new(interface: &str, reconnect_command: Vec<String>) -> Self {
        Self::with_root("/sys/class/net", interface, reconnect_command)
    }

    pub fn with_root<P: AsRef<Path>>(root: P, interface: &str, reconnect_command: Vec<String>) -> Self {
        Self {
            operstate: root.as_ref().join(interface).join("operstate"),
            reconnect_command,
        }
    }

    async fn request_reconnect(&self) -> bool {
        let Some((program, args)) = self.reconnect_command.split_first() else {
            return true;
        };
        match Command::new(program).args(args).status().await {
            Ok(status) if status.success() => true,
            Ok(status) => {
                warn!(%status, command = %program, "Reconnect command failed");
                false
            }
            Err(e) => {
                warn!(command = %program, "Could not run reconnect command: {}", e);
                false
            }
        }
    }
}

impl LinkStatus for NetLink {
    fn is_connected(&mut self) -> bool {
        match fs::read_to_string(&self.operstate) {
            Ok(state) => state.trim() == "up",
            Err(e) => {
                debug!(path = %self.operstate.display(), "operstate unreadable: {}", e);
                false
            }
        }
    }

    async fn reconnect(&mut self, timeout: Duration) -> bool {
        if !self.request_reconnect().await {
            return false;
        }

        let deadline = Instant::now() + timeout;
        loop {
            if self.is_connected() {
                return true;
            }
            if Instant::now() >= deadline {
                warn!(?timeout, "Connection timed out");
                return false;
            }
            tokio::time::sleep(RECONNECT_POLL).await;
        }
    }
}
