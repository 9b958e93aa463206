//! Session options with builder pattern.

use std::fmt;

use polarssl_types::SslError;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use zeroize::Zeroize;

/// Client certificate chain (leaf first) and its private key.
pub struct ClientIdentity {
    pub chain: Vec<CertificateDer<'static>>,
    pub key: PrivateKeyDer<'static>,
}

impl Clone for ClientIdentity {
    fn clone(&self) -> Self {
        ClientIdentity {
            chain: self.chain.clone(),
            key: self.key.clone_key(),
        }
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("chain", &format!("[{} certificates]", self.chain.len()))
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Options applied to a session before its handshake.
#[derive(Clone, Default)]
pub struct SslOptions {
    /// Read timeout in milliseconds. 0 blocks indefinitely.
    pub read_timeout: u64,
    /// ALPN protocols, in preference order.
    pub alpn_protocols: Vec<Vec<u8>>,
    /// Trust anchors. Empty selects the bundled web PKI roots.
    pub ca_chain: Vec<CertificateDer<'static>>,
    /// Certificate and key presented when the server asks for one.
    pub client_identity: Option<ClientIdentity>,
    /// Expected server name, sent as SNI and checked against the certificate.
    pub hostname: Option<String>,
}

impl fmt::Debug for SslOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SslOptions")
            .field("read_timeout", &self.read_timeout)
            .field(
                "alpn_protocols",
                &self
                    .alpn_protocols
                    .iter()
                    .map(|p| String::from_utf8_lossy(p).into_owned())
                    .collect::<Vec<_>>(),
            )
            .field("ca_chain", &format!("[{} certificates]", self.ca_chain.len()))
            .field("client_identity", &self.client_identity)
            .field("hostname", &self.hostname)
            .finish()
    }
}

impl SslOptions {
    pub fn builder() -> SslOptionsBuilder {
        SslOptionsBuilder::default()
    }
}

/// Builder for `SslOptions`. PEM inputs are parsed by [`SslOptionsBuilder::build`].
#[derive(Default)]
pub struct SslOptionsBuilder {
    read_timeout: u64,
    alpn_protocols: Vec<Vec<u8>>,
    ca_chain_pem: Option<String>,
    client_cert_pem: Option<String>,
    client_key_pem: Option<String>,
    hostname: Option<String>,
}

impl Drop for SslOptionsBuilder {
    fn drop(&mut self) {
        if let Some(key) = self.client_key_pem.as_mut() {
            key.zeroize();
        }
    }
}

impl SslOptionsBuilder {
    pub fn read_timeout(mut self, millis: u64) -> Self {
        self.read_timeout = millis;
        self
    }

    pub fn alpn_protocols<I, P>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        self.alpn_protocols = protocols.into_iter().map(|p| p.as_ref().to_vec()).collect();
        self
    }

    /// PEM bundle of trusted CA certificates.
    pub fn ca_chain(mut self, pem: impl Into<String>) -> Self {
        self.ca_chain_pem = Some(pem.into());
        self
    }

    /// PEM client certificate chain. Requires [`Self::client_key`].
    pub fn client_cert(mut self, pem: impl Into<String>) -> Self {
        self.client_cert_pem = Some(pem.into());
        self
    }

    /// PEM client private key (PKCS#8, PKCS#1 or SEC1). Requires [`Self::client_cert`].
    pub fn client_key(mut self, pem: impl Into<String>) -> Self {
        self.client_key_pem = Some(pem.into());
        self
    }

    pub fn hostname(mut self, name: impl Into<String>) -> Self {
        self.hostname = Some(name.into());
        self
    }

    pub fn build(mut self) -> Result<SslOptions, SslError> {
        let ca_chain = match self.ca_chain_pem.as_deref() {
            Some(pem) => parse_certificates(pem, "CA chain")?,
            None => Vec::new(),
        };

        let client_identity = match (self.client_cert_pem.as_deref(), self.client_key_pem.as_deref()) {
            (None, None) => None,
            (Some(_), None) => {
                return Err(SslError::InvalidArgument(
                    "client certificate given without a private key".into(),
                ))
            }
            (None, Some(_)) => {
                return Err(SslError::InvalidArgument(
                    "client private key given without a certificate".into(),
                ))
            }
            (Some(cert), Some(key)) => Some(ClientIdentity {
                chain: parse_certificates(cert, "client certificate")?,
                key: parse_private_key(key)?,
            }),
        };

        if let Some(name) = self.hostname.as_deref() {
            if name.is_empty() {
                return Err(SslError::InvalidArgument("empty hostname".into()));
            }
        }

        Ok(SslOptions {
            read_timeout: self.read_timeout,
            alpn_protocols: std::mem::take(&mut self.alpn_protocols),
            ca_chain,
            client_identity,
            hostname: self.hostname.take(),
        })
    }
}

/// Every certificate in a PEM bundle. A bundle with none is an error.
pub fn parse_certificates(pem: &str, what: &str) -> Result<Vec<CertificateDer<'static>>, SslError> {
    let certs = rustls_pemfile::certs(&mut pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SslError::Config(format!("{what}: {e}")))?;
    if certs.is_empty() {
        return Err(SslError::Config(format!("{what}: no certificates found")));
    }
    Ok(certs)
}

/// The first private key in a PEM document.
pub fn parse_private_key(pem: &str) -> Result<PrivateKeyDer<'static>, SslError> {
    rustls_pemfile::private_key(&mut pem.as_bytes())
        .map_err(|e| SslError::Config(format!("private key: {e}")))?
        .ok_or_else(|| SslError::Config("private key: no key found".into()))
}
