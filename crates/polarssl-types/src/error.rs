use crate::codes;

/// Entropy and DRBG errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid argument")]
    InvalidArg,
    #[error("type mismatch: expected {expected}, got {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    // Entropy errors
    #[error("entropy: repetition count test failed")]
    EntropyRctFailure,
    #[error("entropy: adaptive proportion test failed")]
    EntropyAptFailure,
    #[error("entropy: no noise source available")]
    EntropyNoSource,

    // DRBG errors
    #[error("drbg: invalid state")]
    DrbgInvalidState,
    #[error("drbg: failed to obtain entropy")]
    DrbgEntropyFail,
    #[error("drbg: request too large: {0} bytes")]
    DrbgRequestTooBig(usize),
    #[error("self test failed: {0}")]
    SelfTestFailed(&'static str),
}

/// TLS session errors.
#[derive(Debug, thiserror::Error)]
pub enum SslError {
    /// An argument had the wrong dynamic type.
    #[error("type mismatch: expected {expected}, got {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// A required argument was not supplied.
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("configuration error: {0}")]
    Config(String),
    /// Operation not valid in the current session state.
    #[error("{op}: not valid in state {state}")]
    InvalidState { op: &'static str, state: &'static str },
    #[error("endpoint role not supported")]
    UnsupportedEndpoint,
    /// The transport did not become ready within the read timeout.
    #[error("read timed out")]
    Timeout,
    /// A per-attempt callback aborted the operation.
    #[error("aborted by callback: {0}")]
    Aborted(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Protocol failure. The session is no longer usable.
    #[error("handshake failed: {reason} [{code}, -0x{:04x}]", magnitude(.code))]
    Handshake { code: i32, reason: String },
    #[error("end of stream reached")]
    EndOfStream,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

fn magnitude(code: &i32) -> u32 {
    code.unsigned_abs()
}

impl SslError {
    /// Build a protocol failure carrying a reason code.
    pub fn handshake(code: i32, reason: impl Into<String>) -> Self {
        SslError::Handshake {
            code,
            reason: reason.into(),
        }
    }

    /// The numeric reason code, if this error carries one.
    pub fn code(&self) -> Option<i32> {
        match self {
            SslError::Handshake { code, .. } => Some(*code),
            SslError::Timeout => Some(codes::SSL_TIMEOUT),
            SslError::InvalidArgument(_) => Some(codes::SSL_BAD_INPUT_DATA),
            _ => None,
        }
    }

    /// Whether this error came from a per-attempt callback.
    pub fn is_aborted(&self) -> bool {
        matches!(self, SslError::Aborted(_))
    }
}
