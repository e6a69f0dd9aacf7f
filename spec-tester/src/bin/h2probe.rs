//! Probe an HTTP/2 server.
//!
//! ```bash
//! h2probe --host 127.0.0.1 --port 8080 http2/6.5
//! ```

use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use h2probe::cli::{self, CommonArgs};
use h2probe::config::{Config, DEFAULT_MAX_HEADER_LEN};
use h2probe::report::Console;
use h2probe::{runner, suite};

#[derive(Parser)]
#[command(name = "h2probe", version)]
#[command(about = "Conformance testing tool for HTTP/2 servers")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Request path used by cases that send a real request.
    #[arg(short = 'P', long, default_value = "/")]
    path: String,

    /// Length of each generated dummy header value.
    #[arg(short, long = "max-header-length", default_value_t = DEFAULT_MAX_HEADER_LEN)]
    max_header_length: usize,

    /// Don't verify the server's certificate.
    #[arg(short = 'k', long)]
    insecure: bool,
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
    let config = Config {
        path: cli.path,
        max_header_len: cli.max_header_length,
        insecure: cli.insecure,
        ..cli.common.config()?
    };

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let spec = suite::server_spec();
    let console = Console::new();
    let started = Instant::now();
    rt.block_on(runner::run(&spec, &config, &console))?;
    Ok(cli::finish(&spec, &config, &console, started)?)
}
