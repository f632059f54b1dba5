use crate::core::events::{Request, Timer};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Never started, or stopped on purpose.
    Disconnected,
    Connecting,
    Connected,
    /// Lost the connection, a backoff reconnect is pending.
    Reconnecting,
    /// Gave up; only an explicit restart connects again.
    Exhausted,
}

/// Owns the world feed connection lifecycle and its exponential backoff.
#[derive(Debug)]
pub struct ReconnectSupervisor {
    attempts: u32,
    max_attempts: u32,
    base_delay: Duration,
    status: ConnectionStatus,
    // A connection handle exists and has to be ended before spawning a new one.
    live: bool,
}

impl ReconnectSupervisor {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        ReconnectSupervisor {
            attempts: 0,
            max_attempts,
            base_delay,
            status: ConnectionStatus::Disconnected,
            live: false,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// `BASE_DELAY * 2^(attempt-1)`, saturating at `Duration::MAX`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt.saturating_sub(1))
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }

    /// Explicit (re)start. Also the only way out of `Exhausted`.
    pub fn start(&mut self) -> Vec<Request> {
        if self.status == ConnectionStatus::Exhausted {
            info!("Manual restart after exhausted reconnection attempts.");
            self.attempts = 0;
        }
        self.spawn()
    }

    /// A refresh wants a connection; only acts when nothing is in flight.
    pub fn ensure_started(&mut self) -> Vec<Request> {
        match self.status {
            ConnectionStatus::Disconnected => {
                info!("Feed not connected, starting it.");
                self.spawn()
            }
            _ => vec![],
        }
    }

    pub fn on_connected(&mut self) {
        self.attempts = 0;
        self.live = true;
        self.status = ConnectionStatus::Connected;
    }

    pub fn on_disconnected(&mut self, reason: &str) -> Option<Request> {
        self.live = false;
        match self.status {
            // Already waiting for a reconnect or given up.
            ConnectionStatus::Reconnecting | ConnectionStatus::Exhausted => return None,
            _ => {}
        }

        if self.attempts < self.max_attempts {
            self.attempts += 1;
            let delay = self.delay_for(self.attempts);
            self.status = ConnectionStatus::Reconnecting;
            warn!(
                "Feed disconnected ({}). Reconnect attempt {}/{} in {} seconds",
                reason,
                self.attempts,
                self.max_attempts,
                delay.as_secs()
            );
            Some(Request::Schedule {
                after: delay,
                timer: Timer::Reconnect {
                    attempt: self.attempts,
                },
            })
        } else {
            self.status = ConnectionStatus::Exhausted;
            error!("Max reconnection attempts reached. Please restart manually.");
            None
        }
    }

    /// A backoff timer fired; superseded ones are ignored.
    pub fn on_reconnect_due(&mut self, attempt: u32) -> Vec<Request> {
        if self.status != ConnectionStatus::Reconnecting || attempt != self.attempts {
            return vec![];
        }
        info!("Attempting to reconnect feed...");
        self.spawn()
    }

    /// Ends the connection on purpose; no reconnect follows.
    pub fn stop(&mut self, reason: &str) -> Vec<Request> {
        self.status = ConnectionStatus::Disconnected;
        match std::mem::replace(&mut self.live, false) {
            true => vec![Request::Disconnect(reason.to_string())],
            false => vec![],
        }
    }

    fn spawn(&mut self) -> Vec<Request> {
        let mut requests = Vec::with_capacity(2);
        if self.live {
            requests.push(Request::Disconnect("restarting".to_string()));
        }
        requests.push(Request::Connect);
        self.live = true;
        self.status = ConnectionStatus::Connecting;
        requests
    }
}
