//! TLS client session driven over a [`Transport`].
//!
//! The session owns the protocol engine and two ciphertext buffers:
//! `outbound` holds records the engine produced but the transport has not
//! taken yet, `inbound` holds received bytes the engine has not consumed.
//! Would-block conditions never escape as errors: the session waits for
//! readiness, optionally in slices with a caller hook run before each one.

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::io::{self, Read, Write};
use std::os::fd::RawFd;
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};

use polarssl_crypto::drbg::describe;
use polarssl_crypto::CtrDrbg;
use polarssl_types::{codes, AuthMode, Endpoint, SslError};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection};

use crate::config::SslOptions;
use crate::debug::DebugContext;
use crate::rng;
use crate::transport::{Interest, IoOutcome, Readiness, Transport};
use crate::verify::{self, VerifySlot, VerifyStatus};

/// Upper bound on one wait slice when a hook is installed.
const HOOK_SLICE: Duration = Duration::from_millis(50);

/// Ciphertext read from the transport per receive.
const RECV_CHUNK: usize = 16 * 1024;

/// Error a hook returns to abort the running operation.
pub type HookError = Box<dyn Error + Send + Sync>;

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    /// RNG and transport are bound; the handshake may start.
    Configured,
    Handshaking,
    Established,
    CloseNotified,
    Closed,
    /// A protocol or transport failure ended the session. Terminal.
    Failed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Uninitialized => "UNINITIALIZED",
            SessionState::Configured => "CONFIGURED",
            SessionState::Handshaking => "HANDSHAKING",
            SessionState::Established => "ESTABLISHED",
            SessionState::CloseNotified => "CLOSE_NOTIFIED",
            SessionState::Closed => "CLOSED",
            SessionState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The session operation a wait belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Handshake,
    Read,
    Write,
    CloseNotify,
}

/// Passed to the hook once per wait cycle, before the wait slice.
#[derive(Debug, Clone)]
pub struct WaitCycle {
    pub operation: Operation,
    pub interest: Interest,
    /// 1 for the first wait of the operation.
    pub attempt: u32,
    /// Time since the operation started.
    pub elapsed: Duration,
}

type Hook<'h> = &'h mut dyn FnMut(&WaitCycle) -> Result<(), HookError>;

/// Per-operation wait bookkeeping.
struct Pacer<'h> {
    operation: Operation,
    hook: Option<Hook<'h>>,
    started: Instant,
    attempts: u32,
}

impl<'h> Pacer<'h> {
    fn new(operation: Operation, hook: Option<Hook<'h>>) -> Self {
        Pacer {
            operation,
            hook,
            started: Instant::now(),
            attempts: 0,
        }
    }
}

/// What a receive attempt produced.
enum Received {
    Bytes,
    Eof,
}

/// A TLS client session.
///
/// ```no_run
/// use std::net::TcpStream;
/// use std::sync::Arc;
/// use polarssl_crypto::{CtrDrbg, EntropyConfig, EntropySource};
/// use polarssl_tls::{AuthMode, SslSession};
///
/// let entropy = Arc::new(EntropySource::new(EntropyConfig::default()));
/// let drbg = Arc::new(CtrDrbg::new(entropy)?);
/// let mut ssl = SslSession::new();
/// ssl.set_authmode(AuthMode::Required)?;
/// ssl.set_hostname("example.com")?;
/// ssl.set_rng(drbg)?;
/// ssl.set_socket(TcpStream::connect("example.com:443")?)?;
/// ssl.handshake()?;
/// ssl.write(b"GET / HTTP/1.0\r\n\r\n")?;
/// while let Some(chunk) = ssl.read(4096)? {
///     print!("{}", String::from_utf8_lossy(&chunk));
/// }
/// ssl.close_notify()?;
/// ssl.close()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct SslSession {
    state: SessionState,
    endpoint: Endpoint,
    authmode: AuthMode,
    options: SslOptions,
    /// Mode requested by `set_blocking` or detected on the bound transport.
    blocking: bool,
    rng: Option<Arc<CtrDrbg>>,
    transport: Option<Box<dyn Transport>>,
    debug: Arc<DebugContext>,
    conn: Option<ClientConnection>,
    outbound: Vec<u8>,
    inbound: Vec<u8>,
    verify_slot: VerifySlot,
    eof: bool,
    /// Transport EOF seen by `bytes_available`, not yet reported by `read`.
    transport_eof: bool,
}

impl Default for SslSession {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SslSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SslSession")
            .field("state", &self.state)
            .field("endpoint", &self.endpoint)
            .field("authmode", &self.authmode)
            .field("options", &self.options)
            .field("blocking", &self.blocking)
            .field("rng", &self.rng.is_some())
            .field("transport", &self.transport.is_some())
            .field("eof", &self.eof)
            .finish_non_exhaustive()
    }
}

impl SslSession {
    pub fn new() -> Self {
        Self::with_options(SslOptions::default())
    }

    pub fn with_options(options: SslOptions) -> Self {
        SslSession {
            state: SessionState::Uninitialized,
            endpoint: Endpoint::Client,
            authmode: AuthMode::Required,
            options,
            blocking: true,
            rng: None,
            transport: None,
            debug: DebugContext::shared(),
            conn: None,
            outbound: Vec::new(),
            inbound: Vec::new(),
            verify_slot: VerifySlot::default(),
            eof: false,
            transport_eof: false,
        }
    }

    // ---------------------------------------------------------------------
    // Configuration
    // ---------------------------------------------------------------------

    fn require_unstarted(&self, op: &'static str) -> Result<(), SslError> {
        match self.state {
            SessionState::Uninitialized | SessionState::Configured => Ok(()),
            state => Err(SslError::InvalidState {
                op,
                state: state.as_str(),
            }),
        }
    }

    fn refresh_configured(&mut self) {
        if self.rng.is_some() && self.transport.is_some() {
            self.state = SessionState::Configured;
        }
    }

    pub fn set_endpoint(&mut self, endpoint: Endpoint) -> Result<(), SslError> {
        self.require_unstarted("set_endpoint")?;
        self.endpoint = endpoint;
        Ok(())
    }

    pub fn set_authmode(&mut self, mode: AuthMode) -> Result<(), SslError> {
        self.require_unstarted("set_authmode")?;
        self.authmode = mode;
        Ok(())
    }

    /// Bind the DRBG the engine draws randomness from.
    pub fn set_rng(&mut self, drbg: Arc<CtrDrbg>) -> Result<(), SslError> {
        self.require_unstarted("set_rng")?;
        self.rng = Some(drbg);
        self.refresh_configured();
        Ok(())
    }

    /// [`Self::set_rng`] for a dynamically typed value; accepts `Arc<CtrDrbg>`.
    pub fn set_rng_dyn(&mut self, value: &dyn Any) -> Result<(), SslError> {
        let drbg = value
            .downcast_ref::<Arc<CtrDrbg>>()
            .ok_or(SslError::TypeMismatch {
                expected: "CtrDrbg",
                found: describe(value),
            })?;
        self.set_rng(Arc::clone(drbg))
    }

    /// Bind the transport. Its current blocking mode is adopted.
    pub fn set_socket<T: Transport + 'static>(&mut self, transport: T) -> Result<(), SslError> {
        self.require_unstarted("set_socket")?;
        self.blocking = !transport.is_nonblocking()?;
        self.transport = Some(Box::new(transport));
        self.refresh_configured();
        Ok(())
    }

    pub fn set_hostname(&mut self, hostname: impl Into<String>) -> Result<(), SslError> {
        self.require_unstarted("set_hostname")?;
        let hostname = hostname.into();
        if hostname.is_empty() {
            return Err(SslError::InvalidArgument("empty hostname".into()));
        }
        self.options.hostname = Some(hostname);
        Ok(())
    }

    /// Switch the bound transport between blocking and non-blocking mode.
    pub fn set_blocking(&mut self, blocking: bool) -> Result<(), SslError> {
        self.require_unstarted("set_blocking")?;
        if let Some(transport) = self.transport.as_mut() {
            transport.set_nonblocking(!blocking)?;
        }
        self.blocking = blocking;
        Ok(())
    }

    /// Read timeout in milliseconds; 0 waits indefinitely.
    pub fn set_read_timeout(&mut self, millis: u64) -> Result<(), SslError> {
        self.require_unstarted("set_read_timeout")?;
        self.options.read_timeout = millis;
        Ok(())
    }

    /// Trace into `ctx` instead of the process-wide context.
    pub fn set_debug_context(&mut self, ctx: Arc<DebugContext>) {
        self.debug = ctx;
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn authmode(&self) -> AuthMode {
        self.authmode
    }

    pub fn read_timeout(&self) -> u64 {
        self.options.read_timeout
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    pub fn hostname(&self) -> Option<&str> {
        self.options.hostname.as_deref()
    }

    pub fn options(&self) -> &SslOptions {
        &self.options
    }

    /// Whether end-of-stream has been reported by `read`.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Descriptor of the bound transport, if it has one.
    pub fn fileno(&self) -> Option<RawFd> {
        self.transport.as_ref()?.raw_fd()
    }

    /// Negotiated ALPN protocol.
    pub fn alpn_protocol(&self) -> Option<&[u8]> {
        self.conn.as_ref()?.alpn_protocol()
    }

    pub fn protocol_version(&self) -> Option<rustls::ProtocolVersion> {
        self.conn.as_ref()?.protocol_version()
    }

    pub fn cipher_suite(&self) -> Option<rustls::CipherSuite> {
        self.conn
            .as_ref()?
            .negotiated_cipher_suite()
            .map(|suite| suite.suite())
    }

    /// Certificate verification outcome of the last handshake.
    pub fn verify_result(&self) -> VerifyStatus {
        self.verify_slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ---------------------------------------------------------------------
    // Handshake
    // ---------------------------------------------------------------------

    /// Run the handshake to completion.
    pub fn handshake(&mut self) -> Result<(), SslError> {
        self.drive_handshake(Pacer::new(Operation::Handshake, None))
    }

    /// Run the handshake, calling `hook` before every wait slice.
    ///
    /// An `Err` from the hook aborts with [`SslError::Aborted`] and leaves
    /// the session in `Handshaking`, so the handshake can be resumed.
    pub fn handshake_with<F>(&mut self, mut hook: F) -> Result<(), SslError>
    where
        F: FnMut(&WaitCycle) -> Result<(), HookError>,
    {
        self.drive_handshake(Pacer::new(Operation::Handshake, Some(&mut hook)))
    }

    fn drive_handshake(&mut self, mut pacer: Pacer<'_>) -> Result<(), SslError> {
        match self.state {
            SessionState::Configured => {
                if self.endpoint == Endpoint::Server {
                    return Err(SslError::UnsupportedEndpoint);
                }
                self.start_engine()?;
            }
            SessionState::Handshaking => {}
            state => {
                return Err(SslError::InvalidState {
                    op: "handshake",
                    state: state.as_str(),
                })
            }
        }
        let drbg = self.bound_rng("handshake")?;
        let _scope = rng::bind(&drbg);

        loop {
            match self.flush(&mut pacer) {
                Ok(()) => {}
                Err(e @ (SslError::Io(_) | SslError::Transport(_))) => {
                    return Err(self.fail(codes::NET_SEND_FAILED, format!("send: {e}")))
                }
                Err(e) => return Err(e),
            }

            if !self.engine()?.is_handshaking() {
                self.state = SessionState::Established;
                ssl_debug!(
                    self.debug,
                    2,
                    "handshake complete: {:?} {:?}",
                    self.protocol_version(),
                    self.cipher_suite()
                );
                return Ok(());
            }

            if self.inbound.is_empty() {
                match self.receive(Interest::Readable, &mut pacer) {
                    Ok(Received::Bytes) => {}
                    Ok(Received::Eof) => {
                        return Err(self.fail(
                            codes::SSL_CONN_EOF,
                            "connection closed during handshake".into(),
                        ))
                    }
                    Err(e @ (SslError::Io(_) | SslError::Transport(_))) => {
                        return Err(self.fail(codes::NET_RECV_FAILED, format!("recv: {e}")))
                    }
                    Err(e) => return Err(e),
                }
            }

            if let Err(e) = self.process_inbound() {
                self.flush_alert();
                return Err(self.fail(reason_code(&e), e.to_string()));
            }
        }
    }

    fn start_engine(&mut self) -> Result<(), SslError> {
        let drbg = self.bound_rng("handshake")?;
        let transport = self.transport.as_ref().ok_or(SslError::InvalidState {
            op: "handshake",
            state: self.state.as_str(),
        })?;
        self.blocking = !transport.is_nonblocking()?;

        let provider = rng::provider();
        let hostname = self.options.hostname.clone();
        let verifier = verify::server_verifier(
            self.authmode,
            &self.options.ca_chain,
            Arc::clone(&provider),
            hostname.is_some(),
            Arc::clone(&self.verify_slot),
        )?;

        let builder = ClientConfig::builder_with_provider(provider)
            .with_protocol_versions(rustls::ALL_VERSIONS)
            .map_err(|e| SslError::Config(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(verifier);
        let mut config = match self.options.client_identity.as_ref() {
            Some(identity) => builder
                .with_client_auth_cert(identity.chain.clone(), identity.key.clone_key())
                .map_err(|e| SslError::Config(format!("client certificate: {e}")))?,
            None => builder.with_no_client_auth(),
        };
        config.alpn_protocols = self.options.alpn_protocols.clone();
        config.enable_sni = hostname.is_some();

        let server_name = match hostname {
            Some(name) => ServerName::try_from(name)
                .map_err(|e| SslError::InvalidArgument(format!("hostname: {e}")))?,
            // placeholder only; SNI is off and name checks are skipped
            None => ServerName::try_from("localhost")
                .map_err(|e| SslError::InvalidArgument(format!("hostname: {e}")))?,
        };

        let conn = {
            let _scope = rng::bind(&drbg);
            ClientConnection::new(Arc::new(config), server_name)
        };
        match conn {
            Ok(conn) => {
                self.conn = Some(conn);
                self.outbound.clear();
                self.inbound.clear();
                self.eof = false;
                self.transport_eof = false;
                self.state = SessionState::Handshaking;
                ssl_debug!(self.debug, 2, "=> handshake");
                Ok(())
            }
            Err(e) => Err(self.fail(reason_code(&e), e.to_string())),
        }
    }

    // ---------------------------------------------------------------------
    // Application data
    // ---------------------------------------------------------------------

    /// Encrypt and send all of `data`. Returns `data.len()` once flushed.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, SslError> {
        self.write_inner(data, Pacer::new(Operation::Write, None))
    }

    /// [`Self::write`] with a hook run before every wait slice.
    pub fn write_with<F>(&mut self, data: &[u8], mut hook: F) -> Result<usize, SslError>
    where
        F: FnMut(&WaitCycle) -> Result<(), HookError>,
    {
        self.write_inner(data, Pacer::new(Operation::Write, Some(&mut hook)))
    }

    fn write_inner(&mut self, data: &[u8], mut pacer: Pacer<'_>) -> Result<usize, SslError> {
        self.require_established("write")?;
        let drbg = self.bound_rng("write")?;
        let _scope = rng::bind(&drbg);

        let mut consumed = 0;
        while consumed < data.len() {
            consumed += self.engine()?.writer().write(&data[consumed..])?;
            self.flush(&mut pacer)?;
        }
        self.flush(&mut pacer)?;
        ssl_debug!(self.debug, 4, "wrote {} bytes", consumed);
        Ok(consumed)
    }

    /// Read up to `max_len` decrypted bytes.
    ///
    /// Returns `Ok(None)` the first time the end of the stream is seen
    /// (close_notify from the peer or transport EOF); later calls fail with
    /// [`SslError::EndOfStream`]. `max_len == 0` returns an empty chunk
    /// without touching the transport.
    pub fn read(&mut self, max_len: i64) -> Result<Option<Vec<u8>>, SslError> {
        self.read_inner(max_len, Pacer::new(Operation::Read, None))
    }

    /// [`Self::read`] with a hook run before every wait slice.
    pub fn read_with<F>(&mut self, max_len: i64, mut hook: F) -> Result<Option<Vec<u8>>, SslError>
    where
        F: FnMut(&WaitCycle) -> Result<(), HookError>,
    {
        self.read_inner(max_len, Pacer::new(Operation::Read, Some(&mut hook)))
    }

    fn read_inner(&mut self, max_len: i64, mut pacer: Pacer<'_>) -> Result<Option<Vec<u8>>, SslError> {
        self.require_established("read")?;
        let max_len = usize::try_from(max_len)
            .map_err(|_| SslError::InvalidArgument(format!("negative read length {max_len}")))?;
        if self.eof {
            return Err(SslError::EndOfStream);
        }
        if max_len == 0 {
            return Ok(Some(Vec::new()));
        }
        let drbg = self.bound_rng("read")?;
        let _scope = rng::bind(&drbg);

        let mut buf = vec![0u8; max_len];
        loop {
            let result = self.engine()?.reader().read(&mut buf);
            match result {
                Ok(0) => return Ok(self.end_of_stream("close_notify received")),
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(Some(buf));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(self.end_of_stream("peer closed without close_notify"))
                }
                Err(e) => return Err(SslError::Io(e)),
            }

            // key updates and alerts may be waiting to go out
            self.flush(&mut pacer)?;

            if self.inbound.is_empty() {
                if self.transport_eof {
                    self.transport_eof = false;
                    return Ok(self.end_of_stream("transport closed"));
                }
                if let Received::Eof = self.receive(Interest::Readable, &mut pacer)? {
                    return Ok(self.end_of_stream("transport closed"));
                }
            }
            if let Err(e) = self.process_inbound() {
                self.flush_alert();
                return Err(self.fail(reason_code(&e), e.to_string()));
            }
        }
    }

    fn end_of_stream(&mut self, why: &str) -> Option<Vec<u8>> {
        ssl_debug!(self.debug, 2, "end of stream: {}", why);
        self.eof = true;
        None
    }

    /// Decrypted bytes ready to be read without blocking.
    ///
    /// Ciphertext already sitting in the transport is pulled in first.
    pub fn bytes_available(&mut self) -> Result<usize, SslError> {
        self.require_established("bytes_available")?;
        let drbg = self.bound_rng("bytes_available")?;
        let _scope = rng::bind(&drbg);

        if !self.eof && !self.transport_eof && self.inbound.is_empty() {
            let mut chunk = vec![0u8; RECV_CHUNK];
            let transport = self.transport_mut()?;
            let ready = transport.is_nonblocking()?
                || transport.wait(Interest::Readable, Some(Duration::ZERO))? == Readiness::Ready;
            let outcome = ready.then(|| transport.recv(&mut chunk));
            match outcome {
                Some(IoOutcome::Data(n)) => self.inbound.extend_from_slice(&chunk[..n]),
                Some(IoOutcome::Eof) => {
                    ssl_debug!(self.debug, 2, "transport EOF seen while polling");
                    self.transport_eof = true;
                }
                Some(IoOutcome::Failed(e)) => return Err(SslError::Io(e)),
                Some(IoOutcome::WouldBlock) | None => {}
            }
        }

        match self.process_inbound() {
            Ok(pending) => Ok(pending),
            Err(e) => Err(self.fail(reason_code(&e), e.to_string())),
        }
    }

    // ---------------------------------------------------------------------
    // Shutdown
    // ---------------------------------------------------------------------

    /// Send a close_notify alert. The transport stays open.
    pub fn close_notify(&mut self) -> Result<(), SslError> {
        self.require_established("close_notify")?;
        let drbg = self.bound_rng("close_notify")?;
        let _scope = rng::bind(&drbg);

        self.engine()?.send_close_notify();
        if let Err(e) = self.flush(&mut Pacer::new(Operation::CloseNotify, None)) {
            // the peer may already be gone
            ssl_debug!(self.debug, 2, "close_notify not delivered: {}", e);
        }
        self.state = SessionState::CloseNotified;
        Ok(())
    }

    /// Release the engine and buffered data. Idempotent.
    ///
    /// A failed session stays `Failed`.
    pub fn close(&mut self) -> Result<(), SslError> {
        match self.state {
            SessionState::Uninitialized => {
                return Err(SslError::InvalidState {
                    op: "close",
                    state: self.state.as_str(),
                })
            }
            SessionState::Failed => {}
            _ => self.state = SessionState::Closed,
        }
        self.release();
        Ok(())
    }

    fn release(&mut self) {
        self.conn = None;
        self.outbound.clear();
        self.inbound.clear();
    }

    /// Enter `Failed` and build the matching error.
    fn fail(&mut self, code: i32, reason: String) -> SslError {
        ssl_debug!(self.debug, 1, "{} failed: {} ({})", self.state, reason, codes::name(code));
        self.release();
        self.state = SessionState::Failed;
        SslError::handshake(code, reason)
    }

    // ---------------------------------------------------------------------
    // I/O plumbing
    // ---------------------------------------------------------------------

    fn require_established(&self, op: &'static str) -> Result<(), SslError> {
        if self.state == SessionState::Established {
            Ok(())
        } else {
            Err(SslError::InvalidState {
                op,
                state: self.state.as_str(),
            })
        }
    }

    fn bound_rng(&self, op: &'static str) -> Result<Arc<CtrDrbg>, SslError> {
        self.rng.clone().ok_or(SslError::InvalidState {
            op,
            state: self.state.as_str(),
        })
    }

    fn engine(&mut self) -> Result<&mut ClientConnection, SslError> {
        let state = self.state.as_str();
        self.conn.as_mut().ok_or(SslError::InvalidState {
            op: "engine",
            state,
        })
    }

    fn transport_mut(&mut self) -> Result<&mut Box<dyn Transport>, SslError> {
        let state = self.state.as_str();
        self.transport.as_mut().ok_or(SslError::InvalidState {
            op: "transport",
            state,
        })
    }

    /// Move every record the engine has queued onto the transport.
    fn flush(&mut self, pacer: &mut Pacer<'_>) -> Result<(), SslError> {
        loop {
            if let Some(conn) = self.conn.as_mut() {
                while conn.wants_write() {
                    conn.write_tls(&mut self.outbound)?;
                }
            }
            if self.outbound.is_empty() {
                return Ok(());
            }
            let state = self.state.as_str();
            let transport = self.transport.as_mut().ok_or(SslError::InvalidState {
                op: "flush",
                state,
            })?;
            let outcome = transport.send(&self.outbound);
            match outcome {
                IoOutcome::Data(n) => {
                    self.outbound.drain(..n);
                }
                IoOutcome::WouldBlock => self.wait(Interest::Writable, pacer)?,
                IoOutcome::Eof => return Err(SslError::Transport("peer closed the connection".into())),
                IoOutcome::Failed(e) => return Err(SslError::Io(e)),
            }
        }
    }

    /// Push a queued fatal alert out without waiting.
    ///
    /// The session is about to fail, so a transport that is not ready, or
    /// has gone away, just means the alert is dropped.
    fn flush_alert(&mut self) {
        if let Some(conn) = self.conn.as_mut() {
            while conn.wants_write() {
                if conn.write_tls(&mut self.outbound).is_err() {
                    break;
                }
            }
        }
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        while !self.outbound.is_empty() {
            match transport.send(&self.outbound) {
                IoOutcome::Data(n) => {
                    self.outbound.drain(..n);
                }
                outcome => {
                    ssl_debug!(self.debug, 3, "alert not delivered: {:?}", outcome);
                    return;
                }
            }
        }
    }

    /// Receive at least one byte of ciphertext into `inbound`.
    fn receive(&mut self, interest: Interest, pacer: &mut Pacer<'_>) -> Result<Received, SslError> {
        let mut chunk = vec![0u8; RECV_CHUNK];
        loop {
            if self.blocking {
                // a blocking recv cannot honour the timeout or the hook
                self.wait(interest, pacer)?;
            }
            let outcome = self.transport_mut()?.recv(&mut chunk);
            match outcome {
                IoOutcome::Data(n) => {
                    self.inbound.extend_from_slice(&chunk[..n]);
                    ssl_debug!(self.debug, 4, "received {} bytes", n);
                    return Ok(Received::Bytes);
                }
                IoOutcome::Eof => return Ok(Received::Eof),
                IoOutcome::WouldBlock if self.blocking => continue,
                IoOutcome::WouldBlock => self.wait(interest, pacer)?,
                IoOutcome::Failed(e) => return Err(SslError::Io(e)),
            }
        }
    }

    /// Wait for readiness in `interest`.
    ///
    /// With a hook: one hook call per slice of at most `HOOK_SLICE`, until
    /// ready or the hook fails. Without: a single wait bounded by the read
    /// timeout when reading.
    fn wait(&mut self, interest: Interest, pacer: &mut Pacer<'_>) -> Result<(), SslError> {
        let read_timeout = match (interest, self.options.read_timeout) {
            (Interest::Readable, ms) if ms > 0 => Some(Duration::from_millis(ms)),
            _ => None,
        };
        let transport = self
            .transport
            .as_mut()
            .ok_or(SslError::InvalidState {
                op: "wait",
                state: self.state.as_str(),
            })?;

        if let Some(hook) = pacer.hook.as_mut() {
            loop {
                pacer.attempts += 1;
                let cycle = WaitCycle {
                    operation: pacer.operation,
                    interest,
                    attempt: pacer.attempts,
                    elapsed: pacer.started.elapsed(),
                };
                hook(&cycle).map_err(SslError::Aborted)?;
                if transport.wait(interest, Some(HOOK_SLICE))? == Readiness::Ready {
                    return Ok(());
                }
            }
        }

        pacer.attempts += 1;
        match transport.wait(interest, read_timeout)? {
            Readiness::Ready => Ok(()),
            Readiness::TimedOut if read_timeout.is_some() => {
                ssl_debug!(self.debug, 3, "{:?} timed out", pacer.operation);
                Err(SslError::Timeout)
            }
            // spurious wakeup of an unbounded wait
            Readiness::TimedOut => Ok(()),
        }
    }

    /// Feed buffered ciphertext to the engine. Returns decrypted bytes pending.
    fn process_inbound(&mut self) -> Result<usize, rustls::Error> {
        let Some(conn) = self.conn.as_mut() else {
            return Ok(0);
        };
        let mut state = conn.process_new_packets()?;
        while !self.inbound.is_empty() && conn.wants_read() {
            let consumed = match conn.read_tls(&mut &self.inbound[..]) {
                Ok(n) => n,
                Err(e) => return Err(rustls::Error::General(e.to_string())),
            };
            self.inbound.drain(..consumed);
            state = conn.process_new_packets()?;
            if consumed == 0 {
                break;
            }
        }
        Ok(state.plaintext_bytes_to_read())
    }
}

impl Drop for SslSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// mbedTLS-style reason code for an engine error.
pub fn reason_code(err: &rustls::Error) -> i32 {
    match err {
        rustls::Error::InvalidCertificate(_) | rustls::Error::NoCertificatesPresented => {
            codes::X509_CERT_VERIFY_FAILED
        }
        rustls::Error::AlertReceived(_) => codes::SSL_FATAL_ALERT_MESSAGE,
        rustls::Error::InappropriateMessage { .. }
        | rustls::Error::InappropriateHandshakeMessage { .. } => codes::SSL_UNEXPECTED_MESSAGE,
        rustls::Error::InvalidMessage(_) | rustls::Error::DecryptError => codes::SSL_INVALID_RECORD,
        rustls::Error::PeerIncompatible(_) | rustls::Error::PeerMisbehaved(_) => {
            codes::SSL_HANDSHAKE_FAILURE
        }
        _ => codes::SSL_INTERNAL_ERROR,
    }
}
