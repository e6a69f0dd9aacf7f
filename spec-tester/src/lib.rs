//! h2probe: an HTTP/2 conformance test engine.
//!
//! The engine drives an implementation under test through frame sequences,
//! many of them deliberately malformed, and checks that the peer reacts the
//! way RFC 7540 requires. It runs in one of two modes:
//!
//! - **client driver** ([`runner`]): h2probe dials a server once per test
//!   case and runs the case's scenario against the fresh connection.
//! - **server harness** ([`server`]): h2probe opens one listener per test
//!   case and launches an external client process against each listener in
//!   turn, synchronising with it through a one-shot completion signal.
//!
//! Both modes share the same test tree ([`group`]), target selection
//! ([`target`]), connection wrapper ([`connection`]) and verification
//! primitives ([`verifier`]).
//!
//! # Usage
//!
//! ```bash
//! h2probe --host 127.0.0.1 --port 8080 http2/6.5
//! h2probed --exec "curl --http2-prior-knowledge" client/6.7
//! ```

pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod group;
pub mod helpers;
pub mod report;
pub mod result;
pub mod runner;
pub mod server;
pub mod suite;
pub mod target;
pub mod transport;
pub mod verifier;

pub use config::Config;
pub use connection::{Conn, Request, Role};
pub use error::{Mismatch, RunError, TestError};
pub use event::{Event, EventKind};
pub use group::{CaseId, Counts, GroupBuilder, GroupId, Spec, TestCase, TestGroup};
pub use result::{Outcome, TestResult, Verdict};
pub use runner::{ServerScenario, ServerSpec};
pub use server::{ClientScenario, ClientSpec, Server};
pub use target::{RunMode, Targets};

pub use h2probe_wire as wire;

/// Boxed future returned by scenario functions.
pub use futures::future::BoxFuture;
