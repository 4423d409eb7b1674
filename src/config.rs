use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("mutual TLS is enabled but --{0} was not given")]
    MissingTlsPath(&'static str),
}

/// Paths to the PEM files that make up the mutual TLS credential material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    /// Trusted-issuer bundle used to verify the peer.
    pub ca_file: PathBuf,
    /// Private key matching `cert_file`.
    pub key_file: PathBuf,
    /// Certificate chain presented to the peer.
    pub cert_file: PathBuf,
}

/// Process configuration, assembled once at startup and passed down explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Interface to bind (server) or host to dial (client). Empty means
    /// all interfaces when listening and `localhost` when dialing.
    pub host: String,
    pub port: u16,
    /// `Some` when mutual TLS is enabled.
    pub tls: Option<TlsFiles>,
}

impl Config {
    pub const DEFAULT_PORT: u16 = 8080;

    /// Plaintext configuration, mostly useful for tests and local runs.
    pub fn plaintext(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            tls: None,
        }
    }

    /// Build a configuration from raw settings. The three paths are only
    /// required when `tls_enabled` is set.
    pub fn from_parts(
        host: String,
        port: u16,
        tls_enabled: bool,
        ca_file: Option<PathBuf>,
        key_file: Option<PathBuf>,
        cert_file: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let tls = if tls_enabled {
            Some(TlsFiles {
                ca_file: ca_file.ok_or(ConfigError::MissingTlsPath("ca-file"))?,
                key_file: key_file.ok_or(ConfigError::MissingTlsPath("key-file"))?,
                cert_file: cert_file.ok_or(ConfigError::MissingTlsPath("cert-file"))?,
            })
        } else {
            None
        };

        Ok(Self { host, port, tls })
    }

    pub fn tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    pub fn bind_host(&self) -> &str {
        if self.host.is_empty() { "0.0.0.0" } else { &self.host }
    }

    pub fn dial_host(&self) -> &str {
        if self.host.is_empty() { "localhost" } else { &self.host }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host={:?} port={}", self.host, self.port)?;
        match &self.tls {
            Some(files) => write!(
                f,
                " tls=on ca_file={} key_file={} cert_file={}",
                files.ca_file.display(),
                files.key_file.display(),
                files.cert_file.display()
            ),
            None => write!(f, " tls=off"),
        }
    }
}
