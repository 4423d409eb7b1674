//! Mutual TLS credential builder.
//!
//! Credential material is read from PEM files exactly once and turned into
//! rustls configurations for either end of the connection. Both ends are
//! pinned to TLS 1.3 and advertise `h2`, since gRPC runs over HTTP/2.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::{VerifierBuilderError, WebPkiClientVerifier};
use rustls::{ClientConfig, RootCertStore, ServerConfig, SupportedProtocolVersion};
use thiserror::Error;

use crate::config::TlsFiles;

/// The only protocol version either side will negotiate.
pub static PROTOCOL_VERSIONS: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];

const ALPN_H2: &[u8] = b"h2";

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed PEM in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates found in {}", .0.display())]
    NoCertificates(PathBuf),

    #[error("no private key found in {}", .0.display())]
    NoPrivateKey(PathBuf),

    #[error("invalid trusted certificate in {}: {source}", .path.display())]
    InvalidTrustAnchor {
        path: PathBuf,
        #[source]
        source: rustls::Error,
    },

    #[error("failed to build client certificate verifier: {0}")]
    Verifier(#[from] VerifierBuilderError),

    #[error("TLS configuration rejected: {0}")]
    Tls(#[from] rustls::Error),
}

/// Certificate chain, private key and trusted issuers, loaded once at startup.
#[derive(Debug)]
pub struct Credentials {
    cert_chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    roots: Arc<RootCertStore>,
}

impl Credentials {
    /// Read and parse the three PEM files.
    pub fn load(files: &TlsFiles) -> Result<Self, CredentialError> {
        let cert_chain = read_certs(&files.cert_file)?;
        let key = read_private_key(&files.key_file)?;

        let mut roots = RootCertStore::empty();
        for cert in read_certs(&files.ca_file)? {
            roots
                .add(cert)
                .map_err(|source| CredentialError::InvalidTrustAnchor {
                    path: files.ca_file.clone(),
                    source,
                })?;
        }

        Ok(Self {
            cert_chain,
            key,
            roots: Arc::new(roots),
        })
    }

    /// Listening side: present our chain and demand a certificate signed by
    /// one of the trusted issuers from every peer.
    pub fn server_config(&self) -> Result<Arc<ServerConfig>, CredentialError> {
        let provider = provider();
        let verifier =
            WebPkiClientVerifier::builder_with_provider(Arc::clone(&self.roots), Arc::clone(&provider))
                .build()?;

        let mut config = ServerConfig::builder_with_provider(provider)
            .with_protocol_versions(PROTOCOL_VERSIONS)?
            .with_client_cert_verifier(verifier)
            .with_single_cert(self.cert_chain.clone(), self.key.clone_key())?;
        config.alpn_protocols = vec![ALPN_H2.to_vec()];

        Ok(Arc::new(config))
    }

    /// Connecting side: verify the server against the trusted issuers and
    /// present our own chain when asked.
    pub fn client_config(&self) -> Result<Arc<ClientConfig>, CredentialError> {
        let mut config = ClientConfig::builder_with_provider(provider())
            .with_protocol_versions(PROTOCOL_VERSIONS)?
            .with_root_certificates(Arc::clone(&self.roots))
            .with_client_auth_cert(self.cert_chain.clone(), self.key.clone_key())?;
        config.alpn_protocols = vec![ALPN_H2.to_vec()];

        Ok(Arc::new(config))
    }
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn open(path: &Path) -> Result<BufReader<File>, CredentialError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| CredentialError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, CredentialError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| CredentialError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if certs.is_empty() {
        return Err(CredentialError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, CredentialError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| CredentialError::Parse {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| CredentialError::NoPrivateKey(path.to_path_buf()))
}
