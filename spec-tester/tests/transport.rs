//! Dialing and accepting, with and without TLS.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use h2probe::report::Console;
use h2probe::wire::CLIENT_PREFACE;
use h2probe::{Config, RunError, Targets, runner, suite, transport};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const STALL: Duration = Duration::from_millis(200);

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn tls_config(port: u16, timeout: Duration) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port,
        timeout,
        tls: true,
        insecure: true,
        cert_file: Some(fixture("cert.pem")),
        cert_key_file: Some(fixture("key.pem")),
        ..Config::default()
    }
}

#[tokio::test]
async fn tls_dial_and_accept_agree_on_h2() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = tls_config(listener.local_addr().unwrap().port(), Duration::from_secs(2));
    let acceptor = transport::acceptor(&config).unwrap();

    let server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let Ok(mut stream) = transport::accept(Some(&acceptor), tcp, Duration::from_secs(2)).await
        else {
            panic!("TLS accept failed");
        };
        let mut preface = [0u8; 24];
        stream.read_exact(&mut preface).await.unwrap();
        preface
    });

    let Ok((mut stream, local_addr)) = transport::connect(&config).await else {
        panic!("TLS dial failed");
    };
    assert!(local_addr.ip().is_loopback());
    stream.write_all(CLIENT_PREFACE).await.unwrap();
    stream.flush().await.unwrap();
    assert_eq!(&server.await.unwrap()[..], CLIENT_PREFACE);
}

#[tokio::test]
async fn stalled_tls_server_is_a_dial_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    // Accept the TCP connection but never answer the ClientHello.
    let holder = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(tcp);
    });

    let config = Config {
        targets: Targets::new(&["http2/6.7/1"]).unwrap(),
        ..tls_config(port, STALL)
    };
    let started = Instant::now();
    let err = runner::run(&suite::server_spec(), &config, &Console::quiet())
        .await
        .unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(2));
    match err {
        RunError::Dial { source, .. } => {
            assert_eq!(source.kind(), std::io::ErrorKind::TimedOut);
        }
        other => panic!("unexpected error {other}"),
    }
    holder.abort();
}

#[tokio::test]
async fn silent_client_is_a_tls_accept_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let acceptor = transport::acceptor(&tls_config(addr.port(), STALL)).unwrap();

    // Connects and then never sends a ClientHello.
    let _client = TcpStream::connect(addr).await.unwrap();
    let (tcp, _) = listener.accept().await.unwrap();

    let started = Instant::now();
    let Err(err) = transport::accept(Some(&acceptor), tcp, STALL).await else {
        panic!("accept must not succeed without a ClientHello");
    };
    assert_eq!(err.kind(), std::io::ErrorKind::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn plain_accept_needs_no_handshake() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let mut client = TcpStream::connect(addr).await.unwrap();
    let (tcp, _) = listener.accept().await.unwrap();

    let Ok(mut stream) = transport::accept(None, tcp, STALL).await else {
        panic!("plain accept failed");
    };
    client.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");
}
