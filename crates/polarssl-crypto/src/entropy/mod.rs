//! Entropy accumulator feeding the DRBG.
//!
//! Pipeline, per gather:
//! 1. Raw noise is read from every registered [`NoiseSource`]
//! 2. Each raw byte runs through the source's health tests (RCT + APT)
//! 3. The raw block is conditioned with SHA-256
//! 4. Conditioned blocks are appended to a zeroizing pool
//!
//! The accumulator is internally locked, so one `Arc<EntropySource>` can
//! seed several generators.
//!
//! # Example
//!
//! ```
//! use polarssl_crypto::entropy::{EntropyConfig, EntropySource};
//!
//! let es = EntropySource::new(EntropyConfig::default());
//! es.gather().expect("gather failed");
//! let mut seed = [0u8; 48];
//! es.get_entropy(&mut seed).expect("entropy acquisition failed");
//! ```

pub mod conditioning;
pub mod health;
pub mod pool;

pub use health::HealthMonitor;
pub use pool::EntropyPool;

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use polarssl_types::CryptoError;
use zeroize::Zeroize;

/// A pluggable provider of raw noise.
pub trait NoiseSource: Send {
    /// Human-readable name, used in diagnostics.
    fn name(&self) -> &str;

    /// Minimum entropy per byte in bits (1–8).
    fn min_entropy_per_byte(&self) -> u32;

    /// Fill `buf` with raw noise. Returns the number of bytes written;
    /// 0 means the source is exhausted for now.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CryptoError>;
}

/// The operating system generator, via `getrandom`.
pub struct SystemNoiseSource;

impl NoiseSource for SystemNoiseSource {
    fn name(&self) -> &str {
        "system"
    }

    fn min_entropy_per_byte(&self) -> u32 {
        8
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CryptoError> {
        getrandom::getrandom(buf).map_err(|_| CryptoError::DrbgEntropyFail)?;
        Ok(buf.len())
    }
}

#[derive(Debug, Clone)]
pub struct EntropyConfig {
    /// Pool capacity in bytes. Default: 4096.
    pub pool_capacity: usize,
    /// Run the continuous health tests on raw noise. Default: true.
    pub enable_health_tests: bool,
    /// RCT cutoff. Default: 21.
    pub rct_cutoff: u32,
    /// APT window size. Default: 512.
    pub apt_window_size: u32,
    /// APT cutoff. Default: 410.
    pub apt_cutoff: u32,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        EntropyConfig {
            pool_capacity: pool::DEFAULT_POOL_CAPACITY,
            enable_health_tests: true,
            rct_cutoff: health::DEFAULT_RCT_CUTOFF,
            apt_window_size: health::DEFAULT_APT_WINDOW,
            apt_cutoff: health::DEFAULT_APT_CUTOFF,
        }
    }
}

struct SourceSlot {
    source: Box<dyn NoiseSource>,
    health: Option<HealthMonitor>,
}

impl SourceSlot {
    /// Read, test and condition one block from this source.
    fn conditioned_block(&mut self) -> Result<[u8; conditioning::CONDITIONED_LEN], CryptoError> {
        let needed = conditioning::raw_bytes_needed(self.source.min_entropy_per_byte())
            .ok_or(CryptoError::DrbgEntropyFail)?;
        let mut raw = vec![0u8; needed];
        let mut filled = 0;
        while filled < needed {
            let n = self.source.read(&mut raw[filled..])?;
            if n == 0 {
                raw.zeroize();
                return Err(CryptoError::DrbgEntropyFail);
            }
            if let Some(monitor) = self.health.as_mut() {
                if let Err(e) = monitor.check(&raw[filled..filled + n]) {
                    // a later gather starts from a clean window
                    monitor.reset();
                    raw.zeroize();
                    return Err(e);
                }
            }
            filled += n;
        }
        let block = conditioning::condition(&raw);
        raw.zeroize();
        Ok(block)
    }
}

struct Accumulator {
    pool: EntropyPool,
    sources: Vec<SourceSlot>,
}

impl Accumulator {
    fn gather(&mut self) -> Result<(), CryptoError> {
        if self.sources.is_empty() {
            return Err(CryptoError::EntropyNoSource);
        }
        // Every source must deliver before anything reaches the pool.
        let mut blocks = Vec::with_capacity(self.sources.len());
        for slot in self.sources.iter_mut() {
            match slot.conditioned_block() {
                Ok(block) => blocks.push(block),
                Err(e) => {
                    blocks.zeroize();
                    return Err(e);
                }
            }
        }
        for block in &blocks {
            self.pool.push(block);
        }
        blocks.zeroize();
        Ok(())
    }
}

/// Shared entropy accumulator.
pub struct EntropySource {
    config: EntropyConfig,
    inner: Mutex<Accumulator>,
}

impl EntropySource {
    /// Accumulator backed by the OS generator.
    pub fn new(config: EntropyConfig) -> Self {
        Self::with_source(config, Box::new(SystemNoiseSource))
    }

    /// Accumulator backed by a single custom source.
    pub fn with_source(config: EntropyConfig, source: Box<dyn NoiseSource>) -> Self {
        let es = Self::empty(config);
        es.add_source(source);
        es
    }

    /// Accumulator with no sources registered. `gather` fails until one is added.
    pub fn empty(config: EntropyConfig) -> Self {
        EntropySource {
            inner: Mutex::new(Accumulator {
                pool: EntropyPool::new(config.pool_capacity),
                sources: Vec::new(),
            }),
            config,
        }
    }

    /// Register an additional noise source.
    pub fn add_source(&self, source: Box<dyn NoiseSource>) {
        let health = self.config.enable_health_tests.then(|| {
            HealthMonitor::new(
                self.config.rct_cutoff,
                self.config.apt_window_size,
                self.config.apt_cutoff,
            )
        });
        self.lock().sources.push(SourceSlot { source, health });
    }

    pub fn source_count(&self) -> usize {
        self.lock().sources.len()
    }

    /// Conditioned bytes currently buffered.
    pub fn available(&self) -> usize {
        self.lock().pool.len()
    }

    /// Pull one conditioned block from every source into the pool.
    ///
    /// On failure nothing is added; the call can be retried.
    pub fn gather(&self) -> Result<(), CryptoError> {
        self.lock().gather()
    }

    /// Fill `buf` with conditioned entropy, gathering as needed.
    pub fn get_entropy(&self, buf: &mut [u8]) -> Result<(), CryptoError> {
        let mut acc = self.lock();
        if buf.len() > acc.pool.capacity() {
            return Err(CryptoError::InvalidArg);
        }
        while acc.pool.len() < buf.len() {
            acc.gather()?;
        }
        let read = acc.pool.pop(buf);
        debug_assert_eq!(read, buf.len());
        Ok(())
    }

    /// Start-up health test (SP 800-90B §4.3): run the continuous tests over
    /// `STARTUP_TEST_SAMPLES` bytes of every source, then discard them.
    pub fn startup_test(&self) -> Result<(), CryptoError> {
        let mut acc = self.lock();
        let mut sample = vec![0u8; health::STARTUP_TEST_SAMPLES];
        for slot in acc.sources.iter_mut() {
            let mut filled = 0;
            while filled < sample.len() {
                let n = slot.source.read(&mut sample[filled..])?;
                if n == 0 {
                    return Err(CryptoError::DrbgEntropyFail);
                }
                filled += n;
            }
            let mut monitor = HealthMonitor::new(
                self.config.rct_cutoff,
                self.config.apt_window_size,
                self.config.apt_cutoff,
            );
            monitor.check(&sample)?;
            if let Some(live) = slot.health.as_mut() {
                live.reset();
            }
        }
        sample.zeroize();
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Accumulator> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for EntropySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let acc = self.lock();
        let names: Vec<&str> = acc.sources.iter().map(|s| s.source.name()).collect();
        f.debug_struct("EntropySource")
            .field("sources", &names)
            .field("available", &acc.pool.len())
            .finish_non_exhaustive()
    }
}
