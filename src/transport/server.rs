use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tonic::transport::Server;
use tracing::{debug, info, warn};

use crate::application::LedgerService;
use crate::config::Config;
use crate::rpc::BankHandler;

use super::tls::{CredentialError, Credentials};

/// Completed handshakes waiting to be picked up by the gRPC server.
const HANDSHAKE_BACKLOG: usize = 128;

/// A peer that has not finished the handshake by then is dropped.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("failed to load TLS credentials: {0}")]
    Credentials(#[from] CredentialError),

    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("gRPC server failed: {0}")]
    Transport(#[from] tonic::transport::Error),
}

/// The ledger service bound to its listening socket, ready to serve.
///
/// Binding and credential loading happen up front so that every startup
/// failure surfaces before a single request is accepted.
pub struct LedgerServer {
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    handler: BankHandler,
}

impl LedgerServer {
    pub async fn bind(config: &Config, service: LedgerService) -> Result<Self, ServeError> {
        let acceptor = match &config.tls {
            Some(files) => {
                let credentials = Credentials::load(files)?;
                Some(TlsAcceptor::from(credentials.server_config()?))
            }
            None => None,
        };

        let listener = TcpListener::bind((config.bind_host(), config.port))
            .await
            .map_err(|source| ServeError::Bind {
                addr: format!("{}:{}", config.bind_host(), config.port),
                source,
            })?;

        Ok(Self {
            listener,
            acceptor,
            handler: BankHandler::new(service),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `signal` resolves, then drain in-flight requests.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<(), ServeError>
    where
        F: Future<Output = ()> + Send,
    {
        if let Ok(addr) = self.local_addr() {
            info!(%addr, mtls = self.acceptor.is_some(), "server listening");
        }

        let router = Server::builder().add_service(self.handler.into_server());

        let result = match self.acceptor {
            Some(acceptor) => {
                let (tx, rx) = mpsc::channel(HANDSHAKE_BACKLOG);
                let accept_loop = tokio::spawn(accept_tls(self.listener, acceptor, tx));
                let result = router
                    .serve_with_incoming_shutdown(ReceiverStream::new(rx), signal)
                    .await;
                accept_loop.abort();
                result
            }
            None => {
                router
                    .serve_with_incoming_shutdown(TcpListenerStream::new(self.listener), signal)
                    .await
            }
        };

        info!("listener closed");
        Ok(result?)
    }
}

/// Accept TCP connections and run each TLS handshake on its own task, so a
/// slow or failing peer never holds up the next one.
async fn accept_tls(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    tx: mpsc::Sender<io::Result<TlsStream<TcpStream>>>,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(error = %err, "failed to accept connection");
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            }
        };
        if let Err(err) = stream.set_nodelay(true) {
            debug!(%peer, error = %err, "failed to set TCP_NODELAY");
        }

        let acceptor = acceptor.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
                Ok(Ok(tls)) => {
                    debug!(%peer, "mutual TLS handshake completed");
                    // The server may already be shutting down.
                    let _ = tx.send(Ok(tls)).await;
                }
                Ok(Err(err)) => warn!(%peer, error = %err, "mutual TLS handshake rejected"),
                Err(_) => warn!(%peer, "mutual TLS handshake timed out"),
            }
        });
    }
}
