//! Server-harness mode: h2probe plays the server and an external client is
//! launched against it once per case.
//!
//! Every selected case gets its own port and listener for the whole run.
//! The coordinator in [`Server::run`] launches the client under test
//! against one case at a time and waits on that case's
//! [`CompletionSignal`], which the listener fires once the scenario has a
//! result. Because each listener only knows its own case, a client pointed
//! at one port can never complete another case.

use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::BoxFuture;
use h2probe_wire::ErrorCode;
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, warn};

use crate::config::{Config, join_host_port};
use crate::connection::{Conn, Request, Role};
use crate::error::{RunError, TestError};
use crate::group::{CaseId, GroupId, Spec};
use crate::report::Console;
use crate::result::TestResult;
use crate::transport;

/// A scenario run against a client. The handshake is done and the client's
/// first request has been read when it starts.
pub type ClientScenario = for<'a> fn(
    &'a Config,
    &'a mut Conn,
    &'a Request,
) -> BoxFuture<'a, Result<(), TestError>>;

/// The test tree for probing clients.
pub type ClientSpec = Spec<ClientScenario>;

/// How long a finished connection stays open so the client can read the
/// final GOAWAY.
const TEARDOWN_GRACE: Duration = Duration::from_secs(1);

// =============================================================================
// Completion signal
// =============================================================================

/// Fires at most once. The coordinator waits on it; a listener, or the
/// coordinator itself on timeout, fires it.
#[derive(Debug)]
pub struct CompletionSignal {
    tx: Mutex<Option<oneshot::Sender<()>>>,
    rx: Mutex<Option<oneshot::Receiver<()>>>,
}

impl CompletionSignal {
    pub fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Returns `false` if the signal had already fired.
    pub fn fire(&self) -> bool {
        match self.tx.lock().take() {
            Some(tx) => {
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    pub fn is_fired(&self) -> bool {
        self.tx.lock().is_none()
    }

    /// Wait up to `limit` for the signal. On timeout the signal is fired
    /// here so that it still fires exactly once. Returns whether someone
    /// else fired it in time.
    pub async fn wait(&self, limit: Duration) -> bool {
        let Some(rx) = self.rx.lock().take() else {
            return self.is_fired();
        };
        match tokio::time::timeout(limit, rx).await {
            Ok(Ok(())) => true,
            _ => !self.fire(),
        }
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Launching the client under test
// =============================================================================

/// Starts one client-under-test run against `url`. Resolves with the exit
/// code, which is informational only.
pub trait Launcher: Send + Sync {
    fn launch(&self, url: String) -> BoxFuture<'static, io::Result<Option<i32>>>;
}

/// Runs an external command with the case URL appended as last argument.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: String,
    args: Vec<String>,
    verbose: bool,
}

impl ProcessLauncher {
    /// Split `command` on whitespace. Returns `None` for an empty command.
    pub fn new(command: &str, verbose: bool) -> Option<Self> {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words.next()?;
        Some(Self {
            program,
            args: words.collect(),
            verbose,
        })
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, url: String) -> BoxFuture<'static, io::Result<Option<i32>>> {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args).arg(url).kill_on_drop(true);
        command.stdin(Stdio::null());
        if !self.verbose {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
        async move {
            let status = command.status().await?;
            Ok(status.code())
        }
        .boxed()
    }
}

// =============================================================================
// Listeners and coordinator
// =============================================================================

/// One case bound to one port.
#[derive(Debug)]
pub struct Slot {
    pub case: CaseId,
    pub port: u16,
    pub signal: CompletionSignal,
}

/// The running listeners of one harness run. Dropping it stops them.
pub struct Server {
    spec: Arc<ClientSpec>,
    config: Arc<Config>,
    console: Console,
    /// Entered groups in document order, with the slots of the cases that
    /// run in each.
    plan: Vec<(GroupId, Vec<Arc<Slot>>)>,
    listeners: Vec<JoinHandle<()>>,
}

impl Server {
    /// Assign ports to the selected cases and start one listener per port.
    pub async fn listen(
        spec: Arc<ClientSpec>,
        config: Arc<Config>,
        console: Console,
    ) -> Result<Self, RunError> {
        let acceptor = if config.tls {
            Some(transport::acceptor(&config)?)
        } else {
            None
        };

        let selection: Vec<(GroupId, Vec<CaseId>)> = spec
            .select(&config)
            .into_iter()
            .map(|s| (s.group.id(), s.cases.iter().map(|c| c.id()).collect()))
            .collect();
        let count: usize = selection.iter().map(|(_, cases)| cases.len()).sum();
        if usize::from(config.from_port) + count > usize::from(u16::MAX) + 1 {
            return Err(RunError::PortRange {
                from: config.from_port,
                count,
            });
        }

        let mut plan = Vec::with_capacity(selection.len());
        let mut listeners = Vec::with_capacity(count);
        let mut port = config.from_port;
        for (group, cases) in selection {
            let mut slots = Vec::with_capacity(cases.len());
            for case in cases {
                let addr = join_host_port(&config.host, port);
                let listener = TcpListener::bind(&addr)
                    .await
                    .map_err(|source| RunError::Bind { addr, source })?;
                let slot = Arc::new(Slot {
                    case,
                    port,
                    signal: CompletionSignal::new(),
                });
                listeners.push(tokio::spawn(accept_loop(
                    listener,
                    acceptor.clone(),
                    spec.clone(),
                    config.clone(),
                    slot.clone(),
                )));
                slots.push(slot);
                port = port.wrapping_add(1);
            }
            plan.push((group, slots));
        }

        Ok(Self {
            spec,
            config,
            console,
            plan,
            listeners,
        })
    }

    /// Every case with its assigned port, in run order.
    pub fn assignments(&self) -> impl Iterator<Item = &Slot> {
        self.plan
            .iter()
            .flat_map(|(_, slots)| slots.iter().map(|slot| slot.as_ref()))
    }

    /// The URL the client under test is pointed at for `slot`.
    pub fn url(&self, slot: &Slot) -> String {
        format!(
            "{}://{}/{}",
            self.config.scheme(),
            join_host_port(&self.config.host, slot.port),
            self.spec.case(slot.case).path()
        )
    }

    /// Launch the client under test against each case in turn.
    ///
    /// A case that ends without a result, because the client never
    /// connected or never completed the handshake, ends the run.
    pub async fn run(&self, launcher: Arc<dyn Launcher>) -> Result<(), RunError> {
        for (group, slots) in &self.plan {
            self.console.group(self.spec.group(*group));
            for slot in slots {
                let case = self.spec.case(slot.case);
                let url = self.url(slot);
                debug!(case = case.path(), %url, "launching client");

                let client = tokio::spawn(launcher.launch(url));
                if !slot.signal.wait(self.config.exec_timeout).await {
                    debug!(case = case.path(), "client did not complete in time");
                }
                if client.is_finished() {
                    match client.await {
                        Ok(Ok(code)) => debug!(case = case.path(), ?code, "client exited"),
                        Ok(Err(e)) => warn!(case = case.path(), error = %e, "failed to run client"),
                        Err(e) => warn!(case = case.path(), error = %e, "client task failed"),
                    }
                } else {
                    client.abort();
                }

                let Some(result) = case.result() else {
                    return Err(RunError::NoResult {
                        path: case.path().to_string(),
                    });
                };
                self.console.result(case, &result);
            }
        }
        Ok(())
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        for listener in &self.listeners {
            listener.abort();
        }
    }
}

/// Run the selected client cases: list them on a dry run, otherwise start
/// the listeners and drive `launcher` through every case.
pub async fn run(
    spec: Arc<ClientSpec>,
    config: Arc<Config>,
    console: Console,
    launcher: Arc<dyn Launcher>,
) -> Result<(), RunError> {
    if config.dry_run {
        for selected in spec.select(&config) {
            console.group(selected.group);
            for case in selected.cases {
                console.dry_run(case);
            }
        }
        return Ok(());
    }
    let server = Server::listen(spec, config, console).await?;
    server.run(launcher).await
}

async fn accept_loop(
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    spec: Arc<ClientSpec>,
    config: Arc<Config>,
    slot: Arc<Slot>,
) {
    loop {
        let (tcp, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(port = slot.port, error = %e, "accept failed");
                continue;
            }
        };
        debug!(port = slot.port, %peer, "accepted");
        tokio::spawn(serve(
            tcp,
            acceptor.clone(),
            spec.clone(),
            config.clone(),
            slot.clone(),
        ));
    }
}

/// Handle one inbound connection for `slot`'s case.
async fn serve(
    tcp: TcpStream,
    acceptor: Option<TlsAcceptor>,
    spec: Arc<ClientSpec>,
    config: Arc<Config>,
    slot: Arc<Slot>,
) {
    let case = spec.case(slot.case);
    let local_addr = tcp.local_addr().ok();
    let stream = match transport::accept(acceptor.as_ref(), tcp, config.timeout).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(case = case.path(), error = %e, "accept failed");
            return;
        }
    };
    let mut conn = Conn::new(stream, Role::Server, &config);
    if let Some(addr) = local_addr {
        conn.set_local_addr(addr);
    }

    let last_stream_id = match exchange(&spec, &config, &slot, &mut conn).await {
        Ok(stream_id) => {
            slot.signal.fire();
            stream_id
        }
        Err(e) => {
            warn!(case = case.path(), error = %e, "no result from client connection");
            0
        }
    };

    if !conn.is_closed() {
        if let Err(e) = conn
            .write_goaway(last_stream_id, ErrorCode::NO_ERROR, &[])
            .await
        {
            debug!(error = %e, "failed to send GOAWAY");
        }
        tokio::time::sleep(TEARDOWN_GRACE).await;
    }
    conn.close().await;
}

/// Handshake, read the request, run the scenario and record its result.
/// Returns the request's stream id.
async fn exchange(
    spec: &ClientSpec,
    config: &Config,
    slot: &Slot,
    conn: &mut Conn,
) -> Result<u32, TestError> {
    conn.handshake().await?;
    let request = conn.read_request().await?;
    let case = spec.case(slot.case);

    let started = Instant::now();
    let outcome = (case.run())(config, conn, &request).await;
    let result = TestResult::new(outcome, started.elapsed())?.with_source(conn.local_addr());
    spec.record(case, result);
    Ok(request.stream_id)
}
