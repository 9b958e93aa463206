//! Continuous health tests for raw noise (NIST SP 800-90B §4.4).
//!
//! - Repetition Count Test catches a source stuck on one value.
//! - Adaptive Proportion Test catches a source that favours one value
//!   within a window.

use polarssl_types::CryptoError;

/// RCT cutoff for H = 1 bit/sample and α = 2⁻²⁰.
pub const DEFAULT_RCT_CUTOFF: u32 = 21;
pub const DEFAULT_APT_WINDOW: u32 = 512;
/// APT cutoff for H = 1 bit/sample, W = 512 and α = 2⁻²⁰.
pub const DEFAULT_APT_CUTOFF: u32 = 410;
/// Samples drawn by the start-up test (SP 800-90B §4.3).
pub const STARTUP_TEST_SAMPLES: usize = 1024;

/// Repetition Count Test.
#[derive(Debug, Clone)]
pub struct RepetitionCount {
    cutoff: u32,
    previous: Option<u8>,
    run: u32,
}

impl RepetitionCount {
    pub fn new(cutoff: u32) -> Self {
        RepetitionCount {
            cutoff,
            previous: None,
            run: 0,
        }
    }

    pub fn feed(&mut self, sample: u8) -> Result<(), CryptoError> {
        if self.previous == Some(sample) {
            self.run += 1;
            if self.run >= self.cutoff {
                return Err(CryptoError::EntropyRctFailure);
            }
        } else {
            self.previous = Some(sample);
            self.run = 1;
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.run = 0;
    }
}

/// Adaptive Proportion Test.
///
/// The first sample of each window is the reference; the window fails when
/// the reference value occurs `cutoff` times before the window closes.
#[derive(Debug, Clone)]
pub struct AdaptiveProportion {
    window: u32,
    cutoff: u32,
    reference: Option<u8>,
    seen: u32,
    hits: u32,
}

impl AdaptiveProportion {
    pub fn new(window: u32, cutoff: u32) -> Self {
        AdaptiveProportion {
            window,
            cutoff,
            reference: None,
            seen: 0,
            hits: 0,
        }
    }

    pub fn feed(&mut self, sample: u8) -> Result<(), CryptoError> {
        let Some(reference) = self.reference else {
            self.reference = Some(sample);
            self.seen = 1;
            self.hits = 1;
            return Ok(());
        };

        if sample == reference {
            self.hits += 1;
            if self.hits >= self.cutoff {
                return Err(CryptoError::EntropyAptFailure);
            }
        }
        self.seen += 1;
        if self.seen >= self.window {
            self.reset();
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.reference = None;
        self.seen = 0;
        self.hits = 0;
    }
}

/// Both continuous tests, run on every raw byte of one noise source.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    rct: RepetitionCount,
    apt: AdaptiveProportion,
}

impl HealthMonitor {
    pub fn new(rct_cutoff: u32, apt_window: u32, apt_cutoff: u32) -> Self {
        HealthMonitor {
            rct: RepetitionCount::new(rct_cutoff),
            apt: AdaptiveProportion::new(apt_window, apt_cutoff),
        }
    }

    pub fn check(&mut self, raw: &[u8]) -> Result<(), CryptoError> {
        for &sample in raw {
            self.rct.feed(sample)?;
            self.apt.feed(sample)?;
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.rct.reset();
        self.apt.reset();
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_RCT_CUTOFF, DEFAULT_APT_WINDOW, DEFAULT_APT_CUTOFF)
    }
}
