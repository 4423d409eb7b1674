mod common;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use common::{LOCALHOST, MtlsFixture, TestPki, TestServer};
use rustls::{ClientConfig, RootCertStore};
use tally::application::LedgerService;
use tally::config::{Config, TlsFiles};
use tally::rpc::BankServiceClient;
use tally::rpc::proto::{CreateAccountRequest, GetBalanceRequest};
use tally::storage::Ledger;
use tally::transport::tls::PROTOCOL_VERSIONS;
use tally::transport::{CredentialError, Credentials, LedgerServer, ServeError, connect_tls};
use tonic::transport::Channel;

fn roots(ca_file: &Path) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut BufReader::new(File::open(ca_file)?)) {
        roots.add(cert?)?;
    }
    Ok(roots)
}

/// A client that trusts the server but presents no certificate.
fn anonymous_client_config(ca_file: &Path) -> Result<Arc<ClientConfig>> {
    let mut config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_protocol_versions(PROTOCOL_VERSIONS)?
            .with_root_certificates(roots(ca_file)?)
            .with_no_client_auth();
    config.alpn_protocols = vec![b"h2".to_vec()];
    Ok(Arc::new(config))
}

/// Attempt one call; true only if the server actually answered.
async fn call_succeeds(channel: Channel) -> bool {
    let mut client = BankServiceClient::new(channel);
    let call = client.create_account(CreateAccountRequest {
        account_id: "intruder".into(),
    });
    matches!(
        tokio::time::timeout(Duration::from_secs(5), call).await,
        Ok(Ok(_))
    )
}

#[tokio::test]
async fn test_client_with_trusted_certificate_is_served() -> Result<()> {
    let fixture = MtlsFixture::new()?;
    let server = TestServer::start(Some(fixture.server.clone())).await?;

    let tls = Credentials::load(&fixture.client)?.client_config()?;
    let channel = connect_tls(LOCALHOST, server.addr.port(), tls)?;

    assert!(call_succeeds(channel).await);
    assert!(server.ledger.contains("intruder"));
    server.stop().await
}

#[tokio::test]
async fn test_client_without_certificate_is_rejected() -> Result<()> {
    let fixture = MtlsFixture::new()?;
    let server = TestServer::start(Some(fixture.server.clone())).await?;

    let tls = anonymous_client_config(&fixture.client.ca_file)?;
    let channel = connect_tls(LOCALHOST, server.addr.port(), tls)?;

    assert!(!call_succeeds(channel).await);
    assert!(server.ledger.is_empty());
    server.stop().await
}

#[tokio::test]
async fn test_client_signed_by_untrusted_ca_is_rejected() -> Result<()> {
    let fixture = MtlsFixture::new()?;
    let server = TestServer::start(Some(fixture.server.clone())).await?;

    // Trusts the right CA, but its own certificate comes from another one.
    let rogue = TestPki::new("rogue")?;
    let rogue_client = rogue.issue_client("client")?;
    let files = TlsFiles {
        ca_file: fixture.client.ca_file.clone(),
        ..rogue_client
    };

    let tls = Credentials::load(&files)?.client_config()?;
    let channel = connect_tls(LOCALHOST, server.addr.port(), tls)?;

    assert!(!call_succeeds(channel).await);
    assert!(server.ledger.is_empty());
    server.stop().await
}

#[tokio::test]
async fn test_client_rejects_server_from_untrusted_ca() -> Result<()> {
    let fixture = MtlsFixture::new()?;
    let server = TestServer::start(Some(fixture.server.clone())).await?;

    // Valid client identity, but only trusts a different CA.
    let other = TestPki::new("other")?;
    let files = TlsFiles {
        ca_file: other.dir.path().join("ca.pem"),
        ..fixture.client.clone()
    };

    let tls = Credentials::load(&files)?.client_config()?;
    let channel = connect_tls(LOCALHOST, server.addr.port(), tls)?;

    assert!(!call_succeeds(channel).await);
    assert!(server.ledger.is_empty());
    server.stop().await
}

#[tokio::test]
async fn test_plaintext_client_cannot_reach_mtls_server() -> Result<()> {
    let fixture = MtlsFixture::new()?;
    let server = TestServer::start(Some(fixture.server.clone())).await?;

    let channel = tally::transport::connect_plaintext(LOCALHOST, server.addr.port())?;

    assert!(!call_succeeds(channel).await);
    assert!(server.ledger.is_empty());
    server.stop().await
}

#[tokio::test]
async fn test_rejected_handshakes_leave_server_serving() -> Result<()> {
    let fixture = MtlsFixture::new()?;
    let server = TestServer::start(Some(fixture.server.clone())).await?;

    // Established before any bad peer shows up, reused afterwards.
    let mut trusted = server.client(Some(fixture.client.clone()))?;
    trusted
        .create_account(CreateAccountRequest {
            account_id: "A1".into(),
        })
        .await?;

    let anonymous = anonymous_client_config(&fixture.client.ca_file)?;
    let bad_peers = [
        connect_tls(LOCALHOST, server.addr.port(), anonymous)?,
        tally::transport::connect_plaintext(LOCALHOST, server.addr.port())?,
    ];
    for channel in bad_peers {
        assert!(!call_succeeds(channel).await);
    }

    let balance = trusted
        .get_balance(GetBalanceRequest {
            account_id: "A1".into(),
        })
        .await?
        .into_inner();
    assert_eq!(balance.balance, 0);

    // A fresh handshake still completes.
    let tls = Credentials::load(&fixture.client)?.client_config()?;
    let channel = connect_tls(LOCALHOST, server.addr.port(), tls)?;
    assert!(call_succeeds(channel).await);

    assert_eq!(server.ledger.len(), 2);
    assert!(server.ledger.contains("intruder"));
    server.stop().await
}

#[tokio::test]
async fn test_server_refuses_to_start_without_credentials() -> Result<()> {
    let fixture = MtlsFixture::new()?;
    let files = TlsFiles {
        key_file: fixture.pki.dir.path().join("missing-key.pem"),
        ..fixture.server.clone()
    };
    let config = Config {
        host: LOCALHOST.to_string(),
        port: 0,
        tls: Some(files),
    };

    let result = LedgerServer::bind(&config, LedgerService::new(Arc::new(Ledger::new()))).await;
    assert!(matches!(
        result,
        Err(ServeError::Credentials(CredentialError::Read { .. }))
    ));
    Ok(())
}

#[tokio::test]
async fn test_server_refuses_to_start_on_busy_port() -> Result<()> {
    let server = TestServer::start(None).await?;
    let config = Config::plaintext(LOCALHOST, server.addr.port());

    let result = LedgerServer::bind(&config, LedgerService::new(Arc::new(Ledger::new()))).await;
    assert!(matches!(result, Err(ServeError::Bind { .. })));
    server.stop().await
}

#[tokio::test]
async fn test_key_file_without_key_is_rejected() -> Result<()> {
    let fixture = MtlsFixture::new()?;
    // A certificate where the key should be.
    let files = TlsFiles {
        key_file: fixture.client.cert_file.clone(),
        ..fixture.client.clone()
    };

    let err = Credentials::load(&files).unwrap_err();
    assert!(matches!(err, CredentialError::NoPrivateKey(_)));
    Ok(())
}
