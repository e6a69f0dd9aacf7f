//! Establishing the byte stream a [`Conn`](crate::Conn) runs on.
//!
//! Plain TCP or TLS with ALPN `h2`, dialed (client driver) or accepted
//! (server harness). Everything is erased to [`BoxStream`] so the connection
//! wrapper never cares which one it got.

use std::fs::File;
use std::io::{self, BufReader};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::config::Config;
use crate::error::RunError;

const ALPN_H2: &[u8] = b"h2";

/// Any duplex byte stream a connection can run on.
pub trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

pub type BoxStream = Box<dyn Stream>;

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Dial the configured target. Returns the stream and its local address.
///
/// TCP connect and the TLS handshake together get one read timeout.
pub async fn connect(config: &Config) -> io::Result<(BoxStream, SocketAddr)> {
    tokio::time::timeout(config.timeout, dial(config))
        .await
        .map_err(|_| timed_out("connect"))?
}

async fn dial(config: &Config) -> io::Result<(BoxStream, SocketAddr)> {
    let tcp = TcpStream::connect(config.addr()).await?;
    tcp.set_nodelay(true)?;
    let local_addr = tcp.local_addr()?;

    if !config.tls {
        return Ok((Box::new(tcp), local_addr));
    }

    let connector = TlsConnector::from(client_tls_config(config)?);
    let server_name = ServerName::try_from(config.host.clone())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let tls = connector.connect(server_name, tcp).await?;
    if tls.get_ref().1.alpn_protocol() != Some(ALPN_H2) {
        return Err(io::Error::other("protocol negotiation failed"));
    }
    Ok((Box::new(tls), local_addr))
}

fn client_tls_config(config: &Config) -> io::Result<Arc<rustls::ClientConfig>> {
    let provider = provider();
    let builder = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(io::Error::other)?;

    let mut tls = if config.insecure {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert(provider)))
            .with_no_client_auth()
    } else {
        let roots = rustls::RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.into(),
        };
        builder.with_root_certificates(roots).with_no_client_auth()
    };
    tls.alpn_protocols = vec![ALPN_H2.to_vec()];
    Ok(Arc::new(tls))
}

/// Build the acceptor used by every listener in server-harness mode.
pub fn acceptor(config: &Config) -> Result<TlsAcceptor, RunError> {
    let (Some(cert_file), Some(key_file)) = (&config.cert_file, &config.cert_key_file) else {
        return Err(RunError::Tls(
            "--cert-file and --cert-key-file are required with --tls".to_string(),
        ));
    };
    let certs = load_certs(cert_file)
        .map_err(|e| RunError::Tls(format!("{}: {e}", cert_file.display())))?;
    let key = load_key(key_file).map_err(|e| RunError::Tls(format!("{}: {e}", key_file.display())))?;

    let mut tls = rustls::ServerConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| RunError::Tls(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| RunError::Tls(e.to_string()))?;
    tls.alpn_protocols = vec![ALPN_H2.to_vec()];
    Ok(TlsAcceptor::from(Arc::new(tls)))
}

/// Finish accepting an inbound connection, with TLS if configured. The TLS
/// handshake must complete within `timeout`.
pub async fn accept(
    acceptor: Option<&TlsAcceptor>,
    tcp: TcpStream,
    timeout: Duration,
) -> io::Result<BoxStream> {
    tcp.set_nodelay(true)?;
    let Some(acceptor) = acceptor else {
        return Ok(Box::new(tcp));
    };
    let tls = tokio::time::timeout(timeout, acceptor.accept(tcp))
        .await
        .map_err(|_| timed_out("TLS accept"))??;
    if tls.get_ref().1.alpn_protocol() != Some(ALPN_H2) {
        return Err(io::Error::other("protocol negotiation failed"));
    }
    Ok(Box::new(tls))
}

fn timed_out(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, format!("{what} timed out"))
}

fn load_certs(path: &Path) -> io::Result<Vec<CertificateDer<'static>>> {
    let mut reader = BufReader::new(File::open(path)?);
    rustls_pemfile::certs(&mut reader).collect()
}

fn load_key(path: &Path) -> io::Result<rustls::pki_types::PrivateKeyDer<'static>> {
    let mut reader = BufReader::new(File::open(path)?);
    rustls_pemfile::private_key(&mut reader)?
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "no private key found"))
}

/// Certificate verifier for `--insecure`: signatures are still checked,
/// the chain and name are not.
#[derive(Debug)]
struct AcceptAnyCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
