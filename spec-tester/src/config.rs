//! Run configuration.
//!
//! A [`Config`] is built once from the command line and shared read-only by
//! everything that runs afterwards.

use std::path::PathBuf;
use std::time::Duration;

use crate::target::{RunMode, Targets};

/// Default per-read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default upper bound on one external client run in server-harness mode.
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(3);

/// Default ceiling for generated header lists.
pub const DEFAULT_MAX_HEADER_LEN: usize = 4000;

/// First port handed out in server-harness mode.
pub const DEFAULT_FROM_PORT: u16 = 30000;

#[derive(Debug, Clone)]
pub struct Config {
    /// Target host (client driver) or listen address (server harness).
    pub host: String,
    pub port: u16,
    /// Request path used by scenarios that send a real request.
    pub path: String,
    /// Deadline for every single read on a connection.
    pub timeout: Duration,
    /// Upper bound used when generating oversized header lists.
    pub max_header_len: usize,
    pub junit_report: Option<PathBuf>,
    pub strict: bool,
    pub dry_run: bool,
    pub tls: bool,
    /// Skip certificate verification when dialing.
    pub insecure: bool,
    pub verbose: bool,
    pub cert_file: Option<PathBuf>,
    pub cert_key_file: Option<PathBuf>,
    /// Command line of the client under test; the case URL is appended.
    pub exec: Option<String>,
    pub from_port: u16,
    pub exec_timeout: Duration,
    pub targets: Targets,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 80,
            path: "/".to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_header_len: DEFAULT_MAX_HEADER_LEN,
            junit_report: None,
            strict: false,
            dry_run: false,
            tls: false,
            insecure: false,
            verbose: false,
            cert_file: None,
            cert_key_file: None,
            exec: None,
            from_port: DEFAULT_FROM_PORT,
            exec_timeout: DEFAULT_EXEC_TIMEOUT,
            targets: Targets::default(),
        }
    }
}

impl Config {
    /// The standard port for the configured transport.
    pub fn default_port(tls: bool) -> u16 {
        if tls { 443 } else { 80 }
    }

    /// `host:port`, with IPv6 literals bracketed.
    pub fn addr(&self) -> String {
        join_host_port(&self.host, self.port)
    }

    pub fn scheme(&self) -> &'static str {
        if self.tls { "https" } else { "http" }
    }

    /// Value of `:authority`, leaving out the port when it is the default.
    pub fn authority(&self) -> String {
        if self.port == Self::default_port(self.tls) {
            self.host.clone()
        } else {
            self.addr()
        }
    }

    pub fn run_mode(&self, path: &str) -> RunMode {
        self.targets.run_mode(path)
    }
}

pub(crate) fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
