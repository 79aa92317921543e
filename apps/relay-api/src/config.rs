use std::fmt;
use std::str::FromStr;

use hyperlocal_common::snowflake::MAX_WORKER_ID;

use crate::gateway::DEFAULT_OUTBOUND_BUFFER;

/// Deployment profile. One binary serves every environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    /// Log filter used when `RUST_LOG` is not set.
    pub fn default_log_filter(self) -> &'static str {
        match self {
            Self::Development => "relay_api=debug,tower_http=debug,info",
            Self::Test => "relay_api=warn,warn",
            Self::Production => "relay_api=info,warn",
        }
    }

    /// Whether `/health` includes relay stats.
    pub fn exposes_stats(self) -> bool {
        !matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown environment {other:?}")),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Production => "production",
        })
    }
}

/// Relay configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP/WebSocket server binds to.
    pub port: u16,
    pub environment: Environment,
    /// Capacity of each connection's outbound buffer.
    pub outbound_buffer: usize,
    /// Bearer token required by `POST /api/v1/broadcast` when set.
    pub broadcast_token: Option<String>,
    /// Worker bits embedded in connection ids.
    pub worker_id: u16,
}

/// An environment variable that was set but not used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub var: &'static str,
    pub value: String,
    pub reason: &'static str,
}

impl Config {
    /// Load configuration from environment variables. Every variable is
    /// optional; invalid values fall back to the default and are returned as
    /// warnings so they can be logged once tracing is up.
    pub fn from_env() -> (Self, Vec<ConfigWarning>) {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> (Self, Vec<ConfigWarning>) {
        let mut vars = Vars {
            lookup,
            warnings: Vec::new(),
        };
        let config = Self {
            port: vars.parsed("PORT", |_: &u16| true).unwrap_or(3001),
            environment: vars
                .parsed("RELAY_ENV", |_: &Environment| true)
                .unwrap_or(Environment::Development),
            outbound_buffer: vars
                .parsed("OUTBOUND_BUFFER", |n: &usize| *n > 0)
                .unwrap_or(DEFAULT_OUTBOUND_BUFFER),
            broadcast_token: (vars.lookup)("BROADCAST_TOKEN").filter(|s| !s.is_empty()),
            worker_id: vars
                .parsed("WORKER_ID", |id: &u16| *id <= MAX_WORKER_ID)
                .unwrap_or(0),
        };
        (config, vars.warnings)
    }
}

struct Vars<F> {
    lookup: F,
    warnings: Vec<ConfigWarning>,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn parsed<T: FromStr>(&mut self, var: &'static str, in_range: impl Fn(&T) -> bool) -> Option<T> {
        let raw = (self.lookup)(var)?;
        let reason = match raw.trim().parse::<T>() {
            Ok(value) if in_range(&value) => return Some(value),
            Ok(_) => "out of range",
            Err(_) => "unparsable",
        };
        self.warnings.push(ConfigWarning {
            var,
            value: raw,
            reason,
        });
        None
    }
}
