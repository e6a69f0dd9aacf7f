//! Probe an HTTP/2 client by serving it one listener per case.
//!
//! ```bash
//! h2probed --exec "curl --http2-prior-knowledge" client/6.7
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use h2probe::cli::{self, CommonArgs};
use h2probe::config::{Config, DEFAULT_FROM_PORT};
use h2probe::report::Console;
use h2probe::server::{self, Launcher, ProcessLauncher};
use h2probe::suite;

#[derive(Parser)]
#[command(name = "h2probed", version)]
#[command(about = "Conformance testing tool for HTTP/2 clients")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// PEM certificate chain served with --tls.
    #[arg(short, long)]
    cert_file: Option<PathBuf>,

    /// PEM private key for --cert-file.
    #[arg(long)]
    cert_key_file: Option<PathBuf>,

    /// First port to listen on; each case takes the next one.
    #[arg(short, long, default_value_t = DEFAULT_FROM_PORT)]
    from_port: u16,

    /// Client command to run for each case. The case URL is appended.
    #[arg(short, long)]
    exec: String,

    /// Seconds to wait for the client to finish one case.
    #[arg(long, default_value_t = 3)]
    exec_timeout: u64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    cli::init_tracing(cli.common.verbose);
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let launcher: Arc<dyn Launcher> = Arc::new(
        ProcessLauncher::new(&cli.exec, cli.common.verbose).ok_or("--exec must name a command")?,
    );
    let config = Arc::new(Config {
        cert_file: cli.cert_file,
        cert_key_file: cli.cert_key_file,
        exec: Some(cli.exec),
        from_port: cli.from_port,
        exec_timeout: Duration::from_secs(cli.exec_timeout),
        ..cli.common.config()?
    });

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let spec = Arc::new(suite::client_spec());
    let console = Console::new();
    let started = Instant::now();
    rt.block_on(server::run(spec.clone(), config.clone(), console, launcher))?;
    Ok(cli::finish(&spec, &config, &console, started)?)
}
