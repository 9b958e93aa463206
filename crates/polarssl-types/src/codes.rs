//! Numeric reason codes attached to session errors.
//!
//! Values follow the mbedTLS error space so that callers porting code from a
//! PolarSSL/mbedTLS binding can keep matching on the same numbers.

/// Peer closed the transport without a close-notify alert.
pub const SSL_CONN_EOF: i32 = -0x7280;
/// Peer sent a close-notify alert.
pub const SSL_PEER_CLOSE_NOTIFY: i32 = -0x7880;
/// Read operation timed out.
pub const SSL_TIMEOUT: i32 = -0x6800;
/// Transport would block on a read.
pub const SSL_WANT_READ: i32 = -0x6900;
/// Transport would block on a write.
pub const SSL_WANT_WRITE: i32 = -0x6880;
/// A fatal alert message was received from the peer.
pub const SSL_FATAL_ALERT_MESSAGE: i32 = -0x7780;
/// Peer certificate failed verification.
pub const X509_CERT_VERIFY_FAILED: i32 = -0x2700;
/// Handshake could not be completed (negotiation failure).
pub const SSL_HANDSHAKE_FAILURE: i32 = -0x6E00;
/// A message arrived that is not valid at this point of the protocol.
pub const SSL_UNEXPECTED_MESSAGE: i32 = -0x7700;
/// Internal error in the protocol engine.
pub const SSL_INTERNAL_ERROR: i32 = -0x6C00;
/// A record could not be parsed or decrypted.
pub const SSL_INVALID_RECORD: i32 = -0x7200;
/// Bad input parameters.
pub const SSL_BAD_INPUT_DATA: i32 = -0x7100;
/// Sending on the transport failed.
pub const NET_SEND_FAILED: i32 = -0x004E;
/// Receiving on the transport failed.
pub const NET_RECV_FAILED: i32 = -0x004C;

/// Short symbolic name for a reason code, used in log output.
pub fn name(code: i32) -> &'static str {
    match code {
        SSL_CONN_EOF => "SSL_CONN_EOF",
        SSL_PEER_CLOSE_NOTIFY => "SSL_PEER_CLOSE_NOTIFY",
        SSL_TIMEOUT => "SSL_TIMEOUT",
        SSL_WANT_READ => "SSL_WANT_READ",
        SSL_WANT_WRITE => "SSL_WANT_WRITE",
        SSL_FATAL_ALERT_MESSAGE => "SSL_FATAL_ALERT_MESSAGE",
        X509_CERT_VERIFY_FAILED => "X509_CERT_VERIFY_FAILED",
        SSL_HANDSHAKE_FAILURE => "SSL_HANDSHAKE_FAILURE",
        SSL_UNEXPECTED_MESSAGE => "SSL_UNEXPECTED_MESSAGE",
        SSL_INTERNAL_ERROR => "SSL_INTERNAL_ERROR",
        SSL_INVALID_RECORD => "SSL_INVALID_RECORD",
        SSL_BAD_INPUT_DATA => "SSL_BAD_INPUT_DATA",
        NET_SEND_FAILED => "NET_SEND_FAILED",
        NET_RECV_FAILED => "NET_RECV_FAILED",
        _ => "UNKNOWN",
    }
}
