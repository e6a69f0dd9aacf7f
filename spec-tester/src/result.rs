//! Per-case results.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Mismatch, TestError};

/// How a result counts towards the per-group totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Skipped,
    /// The peer reacted in a way the requirement does not allow.
    Failed(Mismatch),
    /// The case could not reach a verdict, e.g. the handshake timed out.
    Error(String),
}

/// The recorded result of one executed case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    pub outcome: Outcome,
    pub duration: Duration,
    /// Local address of the engine's side of the connection, if known.
    pub source_addr: Option<SocketAddr>,
}

impl TestResult {
    pub fn passed(duration: Duration) -> Self {
        Self {
            outcome: Outcome::Passed,
            duration,
            source_addr: None,
        }
    }

    /// Classify what a scenario returned.
    ///
    /// Fatal errors are handed back unchanged: they never become a result.
    pub fn new(result: Result<(), TestError>, duration: Duration) -> Result<Self, TestError> {
        let outcome = match result {
            Ok(()) => Outcome::Passed,
            Err(TestError::Skipped) => Outcome::Skipped,
            Err(TestError::Mismatch(mismatch)) => Outcome::Failed(mismatch),
            Err(TestError::Timeout) => Outcome::Error(TestError::Timeout.to_string()),
            Err(fatal) => return Err(fatal),
        };
        Ok(Self {
            outcome,
            duration,
            source_addr: None,
        })
    }

    pub fn with_source(mut self, addr: Option<SocketAddr>) -> Self {
        self.source_addr = addr;
        self
    }

    pub fn verdict(&self) -> Verdict {
        match self.outcome {
            Outcome::Passed => Verdict::Passed,
            Outcome::Skipped => Verdict::Skipped,
            Outcome::Failed(_) | Outcome::Error(_) => Verdict::Failed,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.verdict() == Verdict::Failed
    }
}
