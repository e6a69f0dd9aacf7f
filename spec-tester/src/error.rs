//! Error types.
//!
//! [`TestError`] is what a scenario returns; it separates the outcomes a
//! case can record (skip, mismatch, timeout) from the ones that make every
//! later verdict untrustworthy. [`RunError`] is what aborts a whole run.

use std::fmt;
use std::io;
use std::path::PathBuf;

use h2probe_wire::FrameError;

/// Structured expected-vs-actual diagnostic of a failed case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Every terminal condition that would have been accepted.
    pub expected: Vec<String>,
    /// What was observed instead.
    pub actual: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected {}, got {}",
            self.expected.join(" or "),
            self.actual
        )
    }
}

/// Outcome of a scenario other than success.
#[derive(Debug)]
pub enum TestError {
    /// A precondition made the scenario inapplicable.
    Skipped,
    /// The peer did something other than what the requirement allows.
    Mismatch(Mismatch),
    /// A read deadline expired outside of a verifier.
    Timeout,
    /// Connection preface or SETTINGS exchange went wrong.
    Handshake(String),
    Io(io::Error),
    Frame(FrameError),
    /// The peer's traffic could not be interpreted at all.
    Protocol(String),
}

impl TestError {
    /// Whether this error aborts the run instead of being recorded.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            TestError::Skipped | TestError::Mismatch(_) | TestError::Timeout
        )
    }
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestError::Skipped => write!(f, "skipped"),
            TestError::Mismatch(m) => write!(f, "{m}"),
            TestError::Timeout => write!(f, "Timeout"),
            TestError::Handshake(msg) => write!(f, "handshake failed: {msg}"),
            TestError::Io(e) => write!(f, "I/O error: {e}"),
            TestError::Frame(e) => write!(f, "frame error: {e}"),
            TestError::Protocol(msg) => write!(f, "protocol error: {msg}"),
        }
    }
}

impl std::error::Error for TestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TestError::Io(e) => Some(e),
            TestError::Frame(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TestError {
    fn from(e: io::Error) -> Self {
        TestError::Io(e)
    }
}

impl From<FrameError> for TestError {
    fn from(e: FrameError) -> Self {
        TestError::Frame(e)
    }
}

impl From<Mismatch> for TestError {
    fn from(m: Mismatch) -> Self {
        TestError::Mismatch(m)
    }
}

/// A condition that ends the run before every selected case has a verdict.
#[derive(Debug)]
pub enum RunError {
    Dial {
        addr: String,
        source: io::Error,
    },
    Bind {
        addr: String,
        source: io::Error,
    },
    Tls(String),
    /// A scenario returned a fatal error.
    Scenario {
        path: String,
        source: TestError,
    },
    /// Server harness: the client under test never produced a verdict.
    NoResult {
        path: String,
    },
    /// Server harness: not enough ports above the configured base.
    PortRange {
        from: u16,
        count: usize,
    },
    Report {
        path: PathBuf,
        source: io::Error,
    },
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Dial { addr, source } => write!(f, "failed to connect to {addr}: {source}"),
            RunError::Bind { addr, source } => write!(f, "failed to listen on {addr}: {source}"),
            RunError::Tls(msg) => write!(f, "TLS setup failed: {msg}"),
            RunError::Scenario { path, source } => write!(f, "{path}: {source}"),
            RunError::NoResult { path } => {
                write!(f, "{path}: no result received from the client under test")
            }
            RunError::PortRange { from, count } => {
                write!(f, "cannot assign {count} ports starting at {from}")
            }
            RunError::Report { path, source } => {
                write!(f, "failed to write report {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Dial { source, .. }
            | RunError::Bind { source, .. }
            | RunError::Report { source, .. } => Some(source),
            RunError::Scenario { source, .. } => Some(source),
            _ => None,
        }
    }
}
