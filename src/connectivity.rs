//! # Network Availability Gate
//!
//! Decides whether the telemetry uplink can be used this cycle. A lost link is
//! a state, not an error: the gate reconnects at most once per cooldown so a
//! missing access point does not get hammered every cycle.
//!
//! ```text
//!   Connected ──(link drops)──▶ Ready ──(attempt fails)──▶ Cooling
//!       ▲                         ▲                           │
//!       └────(attempt succeeds)───┴───(cooldown elapsed)──────┘
//! ```

use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// The link collaborator (WiFi association is owned by the OS).
#[allow(async_fn_in_trait)]
pub trait LinkStatus {
    fn is_connected(&mut self) -> bool;

    /// Try to bring the link up, giving up after `timeout`.
    async fn reconnect(&mut self, timeout: Duration) -> bool;
}

/// Observable state of the gate at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    /// Down, and a reconnect is not yet permitted
    Cooling,
    /// Down, and a reconnect may be attempted
    Ready,
}

/// Outcome of one [`ConnectivityGate::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Link was already up
    Connected,
    /// Link was down and the reconnect attempt succeeded
    Reconnected,
    /// Link is down and the cooldown has not elapsed
    Cooling { remaining: Duration },
    /// Link is down and the reconnect attempt failed
    ReconnectFailed,
}

impl GateDecision {
    /// True if the uplink can be used right now.
    pub fn is_usable(self) -> bool {
        matches!(self, GateDecision::Connected | GateDecision::Reconnected)
    }
}

/// Reconnect bookkeeping.
#[derive(Debug, Clone, Copy)]
pub struct ConnectivityState {
    last_attempt: Option<Instant>,
    cooldown: Duration,
}

impl ConnectivityState {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            last_attempt: None,
            cooldown,
        }
    }

    /// Time left before the next attempt is permitted (zero if permitted now).
    ///
    /// A `now` earlier than the last attempt counts as zero elapsed time.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_attempt {
            None => Duration::ZERO,
            Some(last) => {
                let elapsed = now.saturating_duration_since(last);
                self.cooldown.saturating_sub(elapsed)
            }
        }
    }

    pub fn attempt_permitted(&self, now: Instant) -> bool {
        self.remaining(now).is_zero()
    }

    pub fn record_attempt(&mut self, now: Instant) {
        self.last_attempt = Some(now);
    }

    pub fn last_attempt(&self) -> Option<Instant> {
        self.last_attempt
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

/// Enforces the reconnect cooldown in front of a [`LinkStatus`].
pub struct ConnectivityGate<L> {
    link: L,
    state: ConnectivityState,
    connect_timeout: Duration,
}

impl<L: LinkStatus> ConnectivityGate<L> {
    pub fn new(link: L, cooldown: Duration, connect_timeout: Duration) -> Self {
        Self {
            link,
            state: ConnectivityState::new(cooldown),
            connect_timeout,
        }
    }

    /// Current state without side effects on the cooldown.
    pub fn state(&mut self, now: Instant) -> LinkState {
        if self.link.is_connected() {
            LinkState::Connected
        } else if self.state.attempt_permitted(now) {
            LinkState::Ready
        } else {
            LinkState::Cooling
        }
    }

    /// Reuse the link, or attempt a reconnect if the cooldown allows it.
    pub async fn check(&mut self, now: Instant) -> GateDecision {
        if self.link.is_connected() {
            return GateDecision::Connected;
        }

        let remaining = self.state.remaining(now);
        if !remaining.is_zero() {
            return GateDecision::Cooling { remaining };
        }

        self.state.record_attempt(now);
        info!(timeout = ?self.connect_timeout, "Link down, attempting reconnect");
        if self.link.reconnect(self.connect_timeout).await {
            info!("Link reconnected");
            GateDecision::Reconnected
        } else {
            warn!(
                cooldown = ?self.state.cooldown(),
                "Reconnect failed, holding off until cooldown elapses"
            );
            GateDecision::ReconnectFailed
        }
    }

    /// True if the link is usable now.
    pub async fn ensure_connected(&mut self, now: Instant) -> bool {
        self.check(now).await.is_usable()
    }

    pub fn connectivity(&self) -> &ConnectivityState {
        &self.state
    }

    pub fn link(&self) -> &L {
        &self.link
    }
}
