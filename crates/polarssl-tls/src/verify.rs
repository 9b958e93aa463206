//! Server certificate policy for the three verify modes.
//!
//! - `None`: certificates are accepted unchecked; handshake signatures are
//!   still verified against the presented key.
//! - `Optional`: the chain and name are checked, a failure is recorded and
//!   the handshake continues.
//! - `Required`: a failure aborts the handshake.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use polarssl_types::{AuthMode, SslError};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, DigitallySignedStruct, RootCertStore, SignatureScheme};

/// Outcome of server certificate verification for one handshake.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VerifyStatus {
    /// No certificate has been examined yet.
    #[default]
    Pending,
    /// Verification is disabled (`AuthMode::None`).
    Skipped,
    Passed,
    /// The certificate was rejected; carries the reason.
    Failed(String),
}

impl VerifyStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, VerifyStatus::Passed | VerifyStatus::Skipped)
    }
}

impl fmt::Display for VerifyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyStatus::Pending => f.write_str("pending"),
            VerifyStatus::Skipped => f.write_str("skipped"),
            VerifyStatus::Passed => f.write_str("ok"),
            VerifyStatus::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Slot the verifier writes its outcome into, read back by the session.
pub type VerifySlot = Arc<Mutex<VerifyStatus>>;

fn record(slot: &VerifySlot, status: VerifyStatus) {
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = status;
}

/// Accepts any certificate but still checks handshake signatures.
#[derive(Debug)]
pub struct NoVerifier {
    provider: Arc<CryptoProvider>,
}

impl NoVerifier {
    pub fn new(provider: Arc<CryptoProvider>) -> Self {
        NoVerifier { provider }
    }
}

impl ServerCertVerifier for NoVerifier {
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
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

/// Checks the chain only; a name mismatch is not an error.
///
/// Used when the caller never set a hostname, so there is nothing to
/// compare the certificate against.
#[derive(Debug)]
pub struct HostnameIgnoringVerifier {
    inner: Arc<dyn ServerCertVerifier>,
}

impl HostnameIgnoringVerifier {
    pub fn new(inner: Arc<dyn ServerCertVerifier>) -> Self {
        HostnameIgnoringVerifier { inner }
    }
}

impl ServerCertVerifier for HostnameIgnoringVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        match self
            .inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
        {
            Err(rustls::Error::InvalidCertificate(
                CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. },
            )) => Ok(ServerCertVerified::assertion()),
            other => other,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Records the inner verifier's verdict; enforces it only when `enforce`.
#[derive(Debug)]
pub struct RecordingVerifier {
    inner: Arc<dyn ServerCertVerifier>,
    slot: VerifySlot,
    enforce: bool,
}

impl RecordingVerifier {
    pub fn new(inner: Arc<dyn ServerCertVerifier>, slot: VerifySlot, enforce: bool) -> Self {
        RecordingVerifier {
            inner,
            slot,
            enforce,
        }
    }
}

impl ServerCertVerifier for RecordingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        match self
            .inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
        {
            Ok(verified) => {
                record(&self.slot, VerifyStatus::Passed);
                Ok(verified)
            }
            Err(e) => {
                record(&self.slot, VerifyStatus::Failed(e.to_string()));
                if self.enforce {
                    Err(e)
                } else {
                    Ok(ServerCertVerified::assertion())
                }
            }
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Trust anchors from `ca_chain`, or the bundled web PKI roots when empty.
pub fn root_store(ca_chain: &[CertificateDer<'static>]) -> Result<RootCertStore, SslError> {
    if ca_chain.is_empty() {
        return Ok(RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        });
    }
    let mut roots = RootCertStore::empty();
    for cert in ca_chain {
        roots
            .add(cert.clone())
            .map_err(|e| SslError::Config(format!("CA chain: {e}")))?;
    }
    Ok(roots)
}

/// Verifier implementing `mode`. `check_name` is false when no hostname was set.
pub fn server_verifier(
    mode: AuthMode,
    ca_chain: &[CertificateDer<'static>],
    provider: Arc<CryptoProvider>,
    check_name: bool,
    slot: VerifySlot,
) -> Result<Arc<dyn ServerCertVerifier>, SslError> {
    if mode == AuthMode::None {
        record(&slot, VerifyStatus::Skipped);
        return Ok(Arc::new(NoVerifier::new(provider)));
    }
    record(&slot, VerifyStatus::Pending);

    let roots = Arc::new(root_store(ca_chain)?);
    let mut verifier: Arc<dyn ServerCertVerifier> =
        WebPkiServerVerifier::builder_with_provider(roots, provider)
            .build()
            .map_err(|e| SslError::Config(format!("verifier: {e}")))?;
    if !check_name {
        verifier = Arc::new(HostnameIgnoringVerifier::new(verifier));
    }
    Ok(Arc::new(RecordingVerifier::new(
        verifier,
        slot,
        mode == AuthMode::Required,
    )))
}
