use std::sync::Arc;

use hyper_util::rt::TokioIo;
use rustls::ClientConfig;
use rustls::pki_types::ServerName;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;

use crate::config::Config;

use super::tls::{CredentialError, Credentials};

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("failed to load TLS credentials: {0}")]
    Credentials(#[from] CredentialError),

    #[error("invalid server name: {0}")]
    InvalidServerName(String),

    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] tonic::transport::Error),
}

/// Build a channel to the ledger service described by `config`.
///
/// The channel is lazy: nothing is dialed until the first call, so the
/// connection attempt itself counts against that call's deadline.
pub fn connect(config: &Config) -> Result<Channel, ConnectError> {
    match &config.tls {
        Some(files) => {
            let tls = Credentials::load(files)?.client_config()?;
            connect_tls(config.dial_host(), config.port, tls)
        }
        None => connect_plaintext(config.dial_host(), config.port),
    }
}

pub fn connect_plaintext(host: &str, port: u16) -> Result<Channel, ConnectError> {
    Ok(endpoint(host, port)?.connect_lazy())
}

/// Build a channel that performs the given TLS handshake on every dial.
/// `host` is both the address to dial and the name the server certificate
/// must be valid for.
pub fn connect_tls(
    host: &str,
    port: u16,
    tls: Arc<ClientConfig>,
) -> Result<Channel, ConnectError> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| ConnectError::InvalidServerName(host.to_string()))?;
    let connector = TlsConnector::from(tls);
    let addr = format!("{}:{}", host, port);

    let channel = endpoint(host, port)?.connect_with_connector_lazy(service_fn(move |_: Uri| {
        let connector = connector.clone();
        let server_name = server_name.clone();
        let addr = addr.clone();
        async move {
            let stream = TcpStream::connect(addr.as_str()).await?;
            stream.set_nodelay(true)?;
            let tls = connector.connect(server_name, stream).await?;
            Ok::<_, std::io::Error>(TokioIo::new(tls))
        }
    }));
    Ok(channel)
}

fn endpoint(host: &str, port: u16) -> Result<Endpoint, ConnectError> {
    // TLS is layered on by the connector, so tonic itself speaks plain h2.
    Ok(Endpoint::from_shared(format!("http://{}:{}", host, port))?)
}
