//! Command-line plumbing shared by the `h2probe` and `h2probed` binaries.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::RunError;
use crate::group::Spec;
use crate::report::{self, Console};
use crate::target::{InvalidSelector, Targets};

/// Flags both modes accept.
#[derive(Debug, Args)]
pub struct CommonArgs {
    /// Test paths to run, e.g. `http2/6.5` or `http2/6.5/2`. Runs everything
    /// when none are given.
    pub specs: Vec<String>,

    /// Target host (h2probe) or listen address (h2probed).
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Target or listen port. Defaults to 80, or 443 with --tls.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Seconds to wait for each frame.
    #[arg(short = 'o', long, default_value_t = 2)]
    pub timeout: u64,

    /// Also run cases that check SHOULD-level requirements.
    #[arg(short = 'S', long)]
    pub strict: bool,

    /// List the selected cases without running them.
    #[arg(long)]
    pub dryrun: bool,

    /// Connect over TLS.
    #[arg(short = 't', long)]
    pub tls: bool,

    /// Log every frame sent and received.
    #[arg(short, long)]
    pub verbose: bool,

    /// Write a JUnit XML report to this file.
    #[arg(short, long)]
    pub junit_report: Option<PathBuf>,
}

impl CommonArgs {
    /// The part of the run configuration these flags determine.
    pub fn config(&self) -> Result<Config, InvalidSelector> {
        Ok(Config {
            host: self.host.clone(),
            port: self.port.unwrap_or(Config::default_port(self.tls)),
            timeout: Duration::from_secs(self.timeout),
            junit_report: self.junit_report.clone(),
            strict: self.strict,
            dry_run: self.dryrun,
            tls: self.tls,
            verbose: self.verbose,
            targets: Targets::new(&self.specs)?,
            ..Config::default()
        })
    }
}

/// Log to stderr, filtered by `RUST_LOG` when set.
pub fn init_tracing(verbose: bool) {
    let fallback = if verbose { "warn,h2probe=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Print the summary and failures and write the JUnit report. Returns
/// whether every executed case passed or was skipped.
pub fn finish<F>(
    spec: &Spec<F>,
    config: &Config,
    console: &Console,
    started: Instant,
) -> Result<bool, RunError> {
    if config.dry_run {
        return Ok(true);
    }
    println!();
    console.failures(spec);
    console.summary(spec, started.elapsed());
    if let Some(path) = &config.junit_report {
        report::write_junit(spec, path)?;
    }
    Ok(spec.root().counts().failed == 0)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        common: CommonArgs,
    }

    #[test]
    fn tls_changes_the_default_port() {
        let cli = Cli::parse_from(["h2probe", "--tls", "http2/6.5"]);
        let config = cli.common.config().unwrap();
        assert_eq!(config.port, 443);
        assert_eq!(config.scheme(), "https");
        assert_eq!(config.run_mode("http2/6.5/1"), crate::target::RunMode::All);
    }

    #[test]
    fn bad_selector_is_rejected() {
        let cli = Cli::parse_from(["h2probe", "http2/6.x/"]);
        assert!(cli.common.config().is_err());
    }
}
