#![forbid(unsafe_code)]
#![doc = "TLS client session core for polarssl-rs: handshake, record I/O and shutdown over caller-supplied transports."]

pub mod config;
#[macro_use]
pub mod debug;
pub mod kx;
pub mod rng;
pub mod session;
pub mod transport;
pub mod verify;

pub use config::{ClientIdentity, SslOptions, SslOptionsBuilder};
pub use debug::DebugContext;
pub use polarssl_types::{codes, AuthMode, Endpoint, SslError};
pub use session::{HookError, Operation, SessionState, SslSession, WaitCycle};
pub use transport::{Interest, IoOutcome, Readiness, Transport};
pub use verify::VerifyStatus;
