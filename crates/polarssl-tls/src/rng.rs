//! Bridge from the TLS engine's random source to a session's DRBG.
//!
//! The engine asks a process-wide [`SecureRandom`] for bytes. That object
//! forwards to whichever [`CtrDrbg`] the current thread has bound with
//! [`bind`]; sessions bind their DRBG for the duration of every operation,
//! so concurrent sessions on different threads never mix generators.

use std::cell::RefCell;
use std::sync::Arc;

use polarssl_crypto::CtrDrbg;
use rustls::crypto::{CryptoProvider, GetRandomFailed, SecureRandom};

use crate::kx;

thread_local! {
    static BOUND: RefCell<Option<Arc<CtrDrbg>>> = const { RefCell::new(None) };
}

#[derive(Debug)]
struct DrbgRandom;

static DRBG_RANDOM: DrbgRandom = DrbgRandom;

impl SecureRandom for DrbgRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<(), GetRandomFailed> {
        let bound = BOUND.with(|b| b.borrow().clone());
        match bound {
            Some(drbg) => drbg.fill(buf).map_err(|_| GetRandomFailed),
            // outside a session operation, e.g. a config built by the caller
            None => rustls::crypto::ring::default_provider()
                .secure_random
                .fill(buf),
        }
    }
}

/// Fill `buf` from the bound DRBG, as the engine's random source would.
pub fn fill(buf: &mut [u8]) -> Result<(), rustls::Error> {
    DRBG_RANDOM
        .fill(buf)
        .map_err(|_| rustls::Error::FailedToGetRandomBytes)
}

/// The ring provider with its random source and key exchange groups
/// replaced by DRBG-backed ones.
pub fn provider() -> Arc<CryptoProvider> {
    let mut provider = rustls::crypto::ring::default_provider();
    provider.secure_random = &DRBG_RANDOM;
    provider.kx_groups = kx::ALL_KX_GROUPS.to_vec();
    Arc::new(provider)
}

/// Restores the previous binding when dropped.
#[must_use = "the binding is removed when the guard is dropped"]
pub struct RngScope {
    previous: Option<Arc<CtrDrbg>>,
}

/// Bind `drbg` as this thread's engine random source until the guard drops.
pub fn bind(drbg: &Arc<CtrDrbg>) -> RngScope {
    let previous = BOUND.with(|b| b.borrow_mut().replace(Arc::clone(drbg)));
    RngScope { previous }
}

impl Drop for RngScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        BOUND.with(|b| *b.borrow_mut() = previous);
    }
}

/// Whether this thread currently has a DRBG bound.
pub fn is_bound() -> bool {
    BOUND.with(|b| b.borrow().is_some())
}
