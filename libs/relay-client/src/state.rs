//! Connection state machine, free of I/O and timers.
//!
//! The driver feeds it what happened (dial finished, socket closed, timer
//! fired) and performs whatever [`Step`] it returns.

use std::fmt;
use std::time::Duration;

use crate::policy::ReconnectPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
    Fallback,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the driver must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Idle,
    /// Open a transport now.
    Dial,
    /// Flush the outbound queue over the freshly opened transport.
    Flush,
    /// Dial again after `delay`. `attempt` is 1-based.
    Retry { attempt: u32, delay: Duration },
    /// Enter fallback after the delay unless something else happens first.
    FallbackAfter(Duration),
    /// Stop reconnecting; the application should poll REST.
    Fallback,
}

#[derive(Debug)]
pub struct Reliability {
    policy: ReconnectPolicy,
    state: ConnectionState,
    attempts: u32,
    /// Set by `disconnect()`, cleared by `connect()`.
    manual: bool,
    /// The current dial is a reconnect after an abnormal close.
    reconnecting: bool,
}

impl Reliability {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            attempts: 0,
            manual: false,
            reconnecting: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Explicit `connect()`: clears the manual flag and the retry counter.
    pub fn connect(&mut self) -> Step {
        self.manual = false;
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => Step::Idle,
            _ => {
                self.attempts = 0;
                self.reconnecting = false;
                self.state = ConnectionState::Connecting;
                Step::Dial
            }
        }
    }

    /// Explicit `disconnect()`: suppresses reconnection until the next `connect()`.
    pub fn disconnect(&mut self) -> Step {
        self.manual = true;
        self.attempts = 0;
        self.reconnecting = false;
        self.state = ConnectionState::Disconnected;
        Step::Idle
    }

    pub fn opened(&mut self) -> Step {
        if self.state != ConnectionState::Connecting {
            return Step::Idle;
        }
        self.state = ConnectionState::Connected;
        self.attempts = 0;
        self.reconnecting = false;
        Step::Flush
    }

    /// Dial timed out or errored before the socket opened.
    pub fn connect_failed(&mut self) -> Step {
        if self.state != ConnectionState::Connecting {
            return Step::Idle;
        }
        if self.reconnecting {
            return self.schedule_reconnect();
        }
        self.state = ConnectionState::Error;
        Step::FallbackAfter(self.policy.fallback_delay)
    }

    /// The post-error pause ran out.
    pub fn fallback_elapsed(&mut self) -> Step {
        if self.state != ConnectionState::Error {
            return Step::Idle;
        }
        self.state = ConnectionState::Fallback;
        Step::Fallback
    }

    /// An open socket closed. Clean closes and manual disconnects do not
    /// reconnect.
    pub fn closed(&mut self, clean: bool) -> Step {
        if self.state != ConnectionState::Connected {
            return Step::Idle;
        }
        if clean || self.manual {
            self.state = ConnectionState::Disconnected;
            return Step::Idle;
        }
        self.schedule_reconnect()
    }

    /// The backoff timer fired.
    pub fn reconnect_due(&mut self) -> Step {
        if self.manual || self.state != ConnectionState::Disconnected {
            return Step::Idle;
        }
        self.state = ConnectionState::Connecting;
        self.reconnecting = true;
        Step::Dial
    }

    fn schedule_reconnect(&mut self) -> Step {
        self.attempts += 1;
        self.reconnecting = false;
        if self.attempts > self.policy.max_attempts {
            self.state = ConnectionState::Fallback;
            return Step::Fallback;
        }
        self.state = ConnectionState::Disconnected;
        Step::Retry {
            attempt: self.attempts,
            delay: self.policy.delay_for(self.attempts),
        }
    }
}
