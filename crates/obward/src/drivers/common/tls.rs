//! TLS configuration for PostgreSQL target connections.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{self, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use serde::{Deserialize, Serialize};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{info, warn};

use crate::error::{Result, WardError};

/// SSL verification modes, matching PostgreSQL's `sslmode` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    /// Plain TCP.
    #[default]
    Disable,
    /// Encrypt, but accept any server certificate.
    Require,
    /// Verify the certificate chain against the bundled web roots.
    VerifyCa,
    /// Verify the certificate chain and the hostname.
    VerifyFull,
}

impl SslMode {
    pub fn requires_tls(&self) -> bool {
        !matches!(self, SslMode::Disable)
    }
}

impl FromStr for SslMode {
    type Err = WardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "disable" | "" => Ok(SslMode::Disable),
            "require" => Ok(SslMode::Require),
            "verify-ca" => Ok(SslMode::VerifyCa),
            "verify-full" => Ok(SslMode::VerifyFull),
            other => Err(WardError::Config(format!(
                "Invalid ssl_mode '{}'. Valid values: disable, require, verify-ca, verify-full",
                other
            ))),
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SslMode::Disable => "disable",
            SslMode::Require => "require",
            SslMode::VerifyCa => "verify-ca",
            SslMode::VerifyFull => "verify-full",
        };
        f.write_str(s)
    }
}

/// Builds the rustls connector used by the deadpool manager.
pub struct TlsBuilder {
    ssl_mode: SslMode,
    provider: Arc<CryptoProvider>,
}

impl TlsBuilder {
    pub fn new(ssl_mode: SslMode) -> Self {
        Self {
            ssl_mode,
            provider: Arc::new(crypto::ring::default_provider()),
        }
    }

    /// Returns `None` when TLS is disabled.
    pub fn build(&self) -> Result<Option<MakeRustlsConnect>> {
        if !self.ssl_mode.requires_tls() {
            return Ok(None);
        }
        Ok(Some(MakeRustlsConnect::new(self.client_config()?)))
    }

    fn client_config(&self) -> Result<ClientConfig> {
        let builder = ClientConfig::builder_with_provider(self.provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| WardError::Config(format!("TLS setup failed: {}", e)))?;

        let config = match self.ssl_mode {
            SslMode::Disable => {
                return Err(WardError::Config(
                    "Cannot build TLS config for ssl_mode=disable".into(),
                ))
            }
            SslMode::Require => {
                warn!(
                    "ssl_mode=require encrypts the connection but does not verify the \
                     server certificate; use verify-full outside development"
                );
                builder
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(AcceptAnyCert {
                        schemes: self
                            .provider
                            .signature_verification_algorithms
                            .supported_schemes(),
                    }))
                    .with_no_client_auth()
            }
            SslMode::VerifyCa | SslMode::VerifyFull => {
                // rustls always checks the hostname, so verify-ca behaves as verify-full.
                info!("ssl_mode={}: certificate verification enabled", self.ssl_mode);
                let mut roots = rustls::RootCertStore::empty();
                roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
                builder.with_root_certificates(roots).with_no_client_auth()
            }
        };

        Ok(config)
    }
}

/// Certificate verifier for `ssl_mode=require`: accepts any certificate.
#[derive(Debug)]
struct AcceptAnyCert {
    schemes: Vec<SignatureScheme>,
}

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.schemes.clone()
    }
}
