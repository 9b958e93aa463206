//! Endpoint roles and certificate verification modes.
//!
//! The integer values are part of the public contract and match the
//! mbedTLS `MBEDTLS_SSL_IS_*` / `MBEDTLS_SSL_VERIFY_*` constants.

use std::fmt;

use crate::error::SslError;

pub const SSL_IS_CLIENT: i32 = 0;
pub const SSL_IS_SERVER: i32 = 1;

pub const SSL_VERIFY_NONE: i32 = 0;
pub const SSL_VERIFY_OPTIONAL: i32 = 1;
pub const SSL_VERIFY_REQUIRED: i32 = 2;

/// The role of a TLS endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum Endpoint {
    #[default]
    Client = SSL_IS_CLIENT,
    Server = SSL_IS_SERVER,
}

/// Peer certificate verification policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum AuthMode {
    /// Do not check the peer certificate.
    None = SSL_VERIFY_NONE,
    /// Check the certificate, record the result, keep going on failure.
    Optional = SSL_VERIFY_OPTIONAL,
    /// Abort the handshake if the certificate does not verify.
    #[default]
    Required = SSL_VERIFY_REQUIRED,
}

impl Endpoint {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl AuthMode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for Endpoint {
    type Error = SslError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            SSL_IS_CLIENT => Ok(Endpoint::Client),
            SSL_IS_SERVER => Ok(Endpoint::Server),
            other => Err(SslError::InvalidArgument(format!(
                "unknown endpoint {other}"
            ))),
        }
    }
}

impl TryFrom<i32> for AuthMode {
    type Error = SslError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            SSL_VERIFY_NONE => Ok(AuthMode::None),
            SSL_VERIFY_OPTIONAL => Ok(AuthMode::Optional),
            SSL_VERIFY_REQUIRED => Ok(AuthMode::Required),
            other => Err(SslError::InvalidArgument(format!(
                "unknown authmode {other}"
            ))),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Client => f.write_str("client"),
            Endpoint::Server => f.write_str("server"),
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::None => f.write_str("none"),
            AuthMode::Optional => f.write_str("optional"),
            AuthMode::Required => f.write_str("required"),
        }
    }
}
