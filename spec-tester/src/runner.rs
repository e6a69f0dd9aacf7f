//! Client-driver mode: h2probe dials the server under test once per case.
//!
//! Cases run strictly one after another. Each gets a fresh connection that
//! is closed as soon as its scenario returns, whatever the outcome.

use std::time::Instant;

use futures::future::BoxFuture;
use tracing::debug;

use crate::config::Config;
use crate::connection::Conn;
use crate::error::{RunError, TestError};
use crate::group::{Spec, TestCase};
use crate::report::Console;
use crate::result::TestResult;

/// A scenario run against a server: the connection is dialed but nothing
/// has been sent yet, so the scenario decides how the preface goes.
pub type ServerScenario =
    for<'a> fn(&'a Config, &'a mut Conn) -> BoxFuture<'a, Result<(), TestError>>;

/// The test tree for probing servers.
pub type ServerSpec = Spec<ServerScenario>;

/// Walk the selected part of `spec`, running (or, on a dry run, listing)
/// every selected case.
///
/// Stops at the first fatal scenario error. Mismatches never stop the run.
pub async fn run(spec: &ServerSpec, config: &Config, console: &Console) -> Result<(), RunError> {
    for selected in spec.select(config) {
        console.group(selected.group);
        for case in selected.cases {
            if config.dry_run {
                console.dry_run(case);
                continue;
            }
            run_case(spec, config, console, case).await?;
        }
    }
    Ok(())
}

/// Dial, run one scenario, close, and record the result.
pub async fn run_case(
    spec: &ServerSpec,
    config: &Config,
    console: &Console,
    case: &TestCase<ServerScenario>,
) -> Result<TestResult, RunError> {
    let mut conn = Conn::dial(config).await.map_err(|source| RunError::Dial {
        addr: config.addr(),
        source,
    })?;
    debug!(case = case.path(), local_addr = ?conn.local_addr(), "running");

    let started = Instant::now();
    let outcome = (case.run())(config, &mut conn).await;
    let duration = started.elapsed();
    conn.close().await;

    let result = TestResult::new(outcome, duration)
        .map_err(|source| RunError::Scenario {
            path: case.path().to_string(),
            source,
        })?
        .with_source(conn.local_addr());

    console.result(case, &result);
    spec.record(case, result.clone());
    Ok(result)
}
