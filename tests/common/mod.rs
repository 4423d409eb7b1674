// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose, SanType,
};
use tally::application::LedgerService;
use tally::config::{Config, TlsFiles};
use tally::rpc::BankServiceClient;
use tally::storage::Ledger;
use tally::transport::{self, LedgerServer, ServeError};
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tonic::transport::Channel;

pub const LOCALHOST: &str = "127.0.0.1";

/// A throwaway certificate authority that issues leaf certificates into a
/// temporary directory.
pub struct TestPki {
    pub dir: TempDir,
    ca_cert: Certificate,
    ca_key: KeyPair,
}

impl TestPki {
    pub fn new(name: &str) -> Result<Self> {
        let mut params = CertificateParams::new(Vec::<String>::new())?;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params
            .distinguished_name
            .push(DnType::CommonName, format!("{} test CA", name));
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];

        let ca_key = KeyPair::generate()?;
        let ca_cert = params.self_signed(&ca_key)?;

        let dir = TempDir::new()?;
        fs::write(dir.path().join("ca.pem"), ca_cert.pem())?;

        Ok(Self {
            dir,
            ca_cert,
            ca_key,
        })
    }

    /// Issue a server certificate valid for `localhost` and `127.0.0.1`.
    pub fn issue_server(&self, name: &str) -> Result<TlsFiles> {
        self.issue(name, ExtendedKeyUsagePurpose::ServerAuth)
    }

    pub fn issue_client(&self, name: &str) -> Result<TlsFiles> {
        self.issue(name, ExtendedKeyUsagePurpose::ClientAuth)
    }

    fn issue(&self, name: &str, usage: ExtendedKeyUsagePurpose) -> Result<TlsFiles> {
        let mut params = CertificateParams::new(vec!["localhost".to_string()])?;
        params
            .subject_alt_names
            .push(SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        params.distinguished_name.push(DnType::CommonName, name);
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        params.extended_key_usages = vec![usage];

        let key = KeyPair::generate()?;
        let cert = params.signed_by(&key, &self.ca_cert, &self.ca_key)?;

        let files = TlsFiles {
            ca_file: self.dir.path().join("ca.pem"),
            key_file: self.dir.path().join(format!("{}-key.pem", name)),
            cert_file: self.dir.path().join(format!("{}.pem", name)),
        };
        fs::write(&files.cert_file, cert.pem())?;
        fs::write(&files.key_file, key.serialize_pem())?;
        Ok(files)
    }
}

/// A ledger server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub ledger: Arc<Ledger>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), ServeError>>,
}

impl TestServer {
    pub async fn start(tls: Option<TlsFiles>) -> Result<Self> {
        Self::start_with_ledger(tls, Arc::new(Ledger::new())).await
    }

    pub async fn start_with_ledger(tls: Option<TlsFiles>, ledger: Arc<Ledger>) -> Result<Self> {
        let config = Config {
            host: LOCALHOST.to_string(),
            port: 0,
            tls,
        };
        let server = LedgerServer::bind(&config, LedgerService::new(Arc::clone(&ledger))).await?;
        let addr = server.local_addr()?;

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve_with_shutdown(async {
            let _ = rx.await;
        }));

        Ok(Self {
            addr,
            ledger,
            shutdown: Some(tx),
            handle,
        })
    }

    /// Client-side configuration pointing at this server.
    pub fn client_config(&self, tls: Option<TlsFiles>) -> Config {
        Config {
            host: LOCALHOST.to_string(),
            port: self.addr.port(),
            tls,
        }
    }

    pub fn client(&self, tls: Option<TlsFiles>) -> Result<BankServiceClient<Channel>> {
        let channel = transport::connect(&self.client_config(tls))?;
        Ok(BankServiceClient::new(channel))
    }

    /// Signal shutdown and wait for the drain. Clients that are still alive
    /// may keep a connection open, so the wait is bounded.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match tokio::time::timeout(Duration::from_secs(5), &mut self.handle).await {
            Ok(result) => result??,
            Err(_) => self.handle.abort(),
        }
        Ok(())
    }
}

/// Server and client credentials issued by the same CA.
pub struct MtlsFixture {
    pub pki: TestPki,
    pub server: TlsFiles,
    pub client: TlsFiles,
}

impl MtlsFixture {
    pub fn new() -> Result<Self> {
        let pki = TestPki::new("tally")?;
        let server = pki.issue_server("server")?;
        let client = pki.issue_client("client")?;
        Ok(Self {
            pki,
            server,
            client,
        })
    }
}
