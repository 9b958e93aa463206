//! CTR-DRBG (Counter-mode Deterministic Random Bit Generator).
//!
//! NIST SP 800-90A §10.2 with AES-256 and the Block_Cipher_df derivation
//! function, without prediction resistance. Parameters follow mbedTLS:
//! 48 bytes of entropy plus a 16-byte nonce at instantiation, at most 1024
//! bytes per internal generate call and an automatic reseed from the bound
//! entropy source every 10 000 requests.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes256;
use polarssl_types::CryptoError;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::entropy::EntropySource;

/// AES-256 key length in bytes.
const KEY_LEN: usize = 32;
/// AES block size in bytes.
const BLOCK_LEN: usize = 16;
/// Seed length = key length + block length.
const SEED_LEN: usize = KEY_LEN + BLOCK_LEN;

/// Entropy bytes requested from the source at (re)seed.
pub const ENTROPY_LEN: usize = 48;
/// Nonce bytes requested from the source at instantiation.
pub const NONCE_LEN: usize = 16;
/// Largest output produced by one internal generate call.
pub const MAX_REQUEST: usize = 1024;
/// Largest personalization string or additional input accepted.
pub const MAX_INPUT: usize = 256;
/// Generate calls allowed between reseeds.
pub const RESEED_INTERVAL: u64 = 10_000;

/// Working state (Key, V, reseed_counter) of SP 800-90A §10.2.1.
struct DrbgState {
    key: [u8; KEY_LEN],
    v: [u8; BLOCK_LEN],
    reseed_counter: u64,
}

impl Drop for DrbgState {
    fn drop(&mut self) {
        self.key.zeroize();
        self.v.zeroize();
    }
}

fn cipher(key: &[u8; KEY_LEN]) -> Aes256 {
    Aes256::new(GenericArray::from_slice(key))
}

fn encrypt_in_place(cipher: &Aes256, block: &mut [u8; BLOCK_LEN]) {
    cipher.encrypt_block(GenericArray::from_mut_slice(block));
}

/// Increment a 128-bit big-endian counter.
fn increment_counter(v: &mut [u8; BLOCK_LEN]) {
    for byte in v.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
}

impl DrbgState {
    fn blank() -> Self {
        DrbgState {
            key: [0u8; KEY_LEN],
            v: [0u8; BLOCK_LEN],
            reseed_counter: 0,
        }
    }

    /// CTR_DRBG_Update (§10.2.1.2).
    fn update(&mut self, provided: &[u8; SEED_LEN]) {
        let aes = cipher(&self.key);
        let mut temp = [0u8; SEED_LEN];
        for chunk in temp.chunks_mut(BLOCK_LEN) {
            increment_counter(&mut self.v);
            let mut block = self.v;
            encrypt_in_place(&aes, &mut block);
            chunk.copy_from_slice(&block);
        }
        for (t, p) in temp.iter_mut().zip(provided.iter()) {
            *t ^= p;
        }
        self.key.copy_from_slice(&temp[..KEY_LEN]);
        self.v.copy_from_slice(&temp[KEY_LEN..]);
        temp.zeroize();
    }

    /// Instantiate with df (§10.2.1.3.2).
    fn instantiate(&mut self, entropy: &[u8], nonce: &[u8], personalization: &[u8]) {
        let mut seed_material = block_cipher_df(&[entropy, nonce, personalization]);
        self.key = [0u8; KEY_LEN];
        self.v = [0u8; BLOCK_LEN];
        self.update(&seed_material);
        self.reseed_counter = 1;
        seed_material.zeroize();
    }

    /// Reseed with df (§10.2.1.4.2).
    fn reseed(&mut self, entropy: &[u8], additional: &[u8]) {
        let mut seed_material = block_cipher_df(&[entropy, additional]);
        self.update(&seed_material);
        self.reseed_counter = 1;
        seed_material.zeroize();
    }

    /// Generate with df (§10.2.1.5.2). `out` is at most `MAX_REQUEST` bytes.
    fn generate(&mut self, out: &mut [u8], additional: &[u8]) {
        debug_assert!(out.len() <= MAX_REQUEST);
        let mut adin = [0u8; SEED_LEN];
        if !additional.is_empty() {
            adin = block_cipher_df(&[additional]);
            self.update(&adin);
        }

        let aes = cipher(&self.key);
        for chunk in out.chunks_mut(BLOCK_LEN) {
            increment_counter(&mut self.v);
            let mut block = self.v;
            encrypt_in_place(&aes, &mut block);
            chunk.copy_from_slice(&block[..chunk.len()]);
            block.zeroize();
        }

        self.update(&adin);
        self.reseed_counter += 1;
        adin.zeroize();
    }
}

/// Block_Cipher_df (§10.3.2), producing `SEED_LEN` bytes from the
/// concatenation of `inputs`.
fn block_cipher_df(inputs: &[&[u8]]) -> [u8; SEED_LEN] {
    let input_len: usize = inputs.iter().map(|i| i.len()).sum();

    // S = L || N || input || 0x80, zero-padded to a whole block
    let mut s = Vec::with_capacity(8 + input_len + BLOCK_LEN);
    s.extend_from_slice(&(input_len as u32).to_be_bytes());
    s.extend_from_slice(&(SEED_LEN as u32).to_be_bytes());
    for input in inputs {
        s.extend_from_slice(input);
    }
    s.push(0x80);
    s.resize(s.len().div_ceil(BLOCK_LEN) * BLOCK_LEN, 0);

    let df_key: [u8; KEY_LEN] = std::array::from_fn(|i| i as u8);
    let bcc_cipher = cipher(&df_key);

    let mut temp = [0u8; SEED_LEN];
    for (i, out) in temp.chunks_mut(BLOCK_LEN).enumerate() {
        // BCC(K, IV || S) with IV = be32(i) || 0^96
        let mut chain = [0u8; BLOCK_LEN];
        chain[..4].copy_from_slice(&(i as u32).to_be_bytes());
        encrypt_in_place(&bcc_cipher, &mut chain);
        for block in s.chunks(BLOCK_LEN) {
            for (c, b) in chain.iter_mut().zip(block) {
                *c ^= b;
            }
            encrypt_in_place(&bcc_cipher, &mut chain);
        }
        out.copy_from_slice(&chain);
    }

    let mut k = [0u8; KEY_LEN];
    k.copy_from_slice(&temp[..KEY_LEN]);
    let mut x = [0u8; BLOCK_LEN];
    x.copy_from_slice(&temp[KEY_LEN..]);
    let out_cipher = cipher(&k);

    let mut result = [0u8; SEED_LEN];
    for out in result.chunks_mut(BLOCK_LEN) {
        encrypt_in_place(&out_cipher, &mut x);
        out.copy_from_slice(&x);
    }

    s.zeroize();
    temp.zeroize();
    k.zeroize();
    x.zeroize();
    result
}

/// Thread-safe CTR-DRBG seeded from an [`EntropySource`].
///
/// Share it between sessions as `Arc<CtrDrbg>`; every draw takes the
/// internal lock.
pub struct CtrDrbg {
    state: Mutex<DrbgState>,
    entropy: Option<Arc<EntropySource>>,
    reseed_interval: u64,
}

impl CtrDrbg {
    /// Seed a new generator from `entropy`.
    pub fn new(entropy: Arc<EntropySource>) -> Result<Self, CryptoError> {
        Self::with_personalization(entropy, &[])
    }

    /// Seed a new generator from `entropy`, mixing in a personalization string.
    pub fn with_personalization(
        entropy: Arc<EntropySource>,
        personalization: &[u8],
    ) -> Result<Self, CryptoError> {
        if personalization.len() > MAX_INPUT {
            return Err(CryptoError::InvalidArg);
        }
        let mut seed = [0u8; ENTROPY_LEN + NONCE_LEN];
        entropy.get_entropy(&mut seed)?;

        let mut state = DrbgState::blank();
        state.instantiate(&seed[..ENTROPY_LEN], &seed[ENTROPY_LEN..], personalization);
        seed.zeroize();

        Ok(CtrDrbg {
            state: Mutex::new(state),
            entropy: Some(entropy),
            reseed_interval: RESEED_INTERVAL,
        })
    }

    /// Construct from a dynamically typed argument, as an embedding layer
    /// would pass it. Accepts `Arc<EntropySource>` only.
    pub fn from_dyn(
        entropy: Option<&dyn Any>,
        personalization: Option<&[u8]>,
    ) -> Result<Self, CryptoError> {
        let arg = entropy.ok_or(CryptoError::MissingArgument("entropy"))?;
        let source = arg
            .downcast_ref::<Arc<EntropySource>>()
            .ok_or(CryptoError::TypeMismatch {
                expected: "EntropySource",
                found: describe(arg),
            })?;
        Self::with_personalization(Arc::clone(source), personalization.unwrap_or_default())
    }

    /// Deterministic instantiation from caller-supplied seed inputs.
    ///
    /// No entropy source is bound: once the reseed interval is exhausted,
    /// generation fails until [`CtrDrbg::reseed_with_entropy`] is called.
    pub fn from_seed_material(
        entropy: &[u8],
        nonce: &[u8],
        personalization: &[u8],
    ) -> Result<Self, CryptoError> {
        if entropy.is_empty() {
            return Err(CryptoError::InvalidArg);
        }
        if personalization.len() > MAX_INPUT {
            return Err(CryptoError::InvalidArg);
        }
        let mut state = DrbgState::blank();
        state.instantiate(entropy, nonce, personalization);
        Ok(CtrDrbg {
            state: Mutex::new(state),
            entropy: None,
            reseed_interval: RESEED_INTERVAL,
        })
    }

    /// Override the number of generate calls allowed between reseeds.
    pub fn with_reseed_interval(mut self, interval: u64) -> Self {
        self.reseed_interval = interval.max(1);
        self
    }

    /// Fill `out` with random bytes.
    pub fn fill(&self, out: &mut [u8]) -> Result<(), CryptoError> {
        self.fill_with_input(out, &[])
    }

    /// Fill `out`, mixing `additional` into every internal generate call.
    pub fn fill_with_input(&self, out: &mut [u8], additional: &[u8]) -> Result<(), CryptoError> {
        if additional.len() > MAX_INPUT {
            return Err(CryptoError::InvalidArg);
        }
        let mut state = self.lock();
        for chunk in out.chunks_mut(MAX_REQUEST) {
            if state.reseed_counter > self.reseed_interval {
                self.reseed_locked(&mut state, &[])?;
            }
            state.generate(chunk, additional);
        }
        Ok(())
    }

    /// `n` random bytes.
    pub fn random_bytes(&self, n: usize) -> Result<Vec<u8>, CryptoError> {
        let mut out = vec![0u8; n];
        self.fill(&mut out)?;
        Ok(out)
    }

    /// Reseed from the bound entropy source.
    pub fn reseed(&self, additional: &[u8]) -> Result<(), CryptoError> {
        if additional.len() > MAX_INPUT {
            return Err(CryptoError::InvalidArg);
        }
        let mut state = self.lock();
        self.reseed_locked(&mut state, additional)
    }

    /// Reseed from caller-supplied entropy.
    pub fn reseed_with_entropy(&self, entropy: &[u8], additional: &[u8]) -> Result<(), CryptoError> {
        if entropy.is_empty() || additional.len() > MAX_INPUT {
            return Err(CryptoError::InvalidArg);
        }
        self.lock().reseed(entropy, additional);
        Ok(())
    }

    /// Whether an entropy source is bound for automatic reseeding.
    pub fn has_entropy_source(&self) -> bool {
        self.entropy.is_some()
    }

    fn reseed_locked(&self, state: &mut DrbgState, additional: &[u8]) -> Result<(), CryptoError> {
        let source = self.entropy.as_ref().ok_or(CryptoError::DrbgInvalidState)?;
        let mut fresh = [0u8; ENTROPY_LEN];
        source.get_entropy(&mut fresh)?;
        state.reseed(&fresh, additional);
        fresh.zeroize();
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, DrbgState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Known-answer self test.
    ///
    /// Checks instantiate/generate against the NIST CAVP vector for
    /// AES-256 with df (no reseed, count 0), then a personalization,
    /// additional-input and reseed sequence.
    pub fn self_test() -> Result<(), CryptoError> {
        let drbg = Self::from_seed_material(&kat::ENTROPY, &kat::NONCE, &[])?;
        let mut out = [0u8; 64];
        drbg.fill(&mut out)?;
        drbg.fill(&mut out)?;
        if !bool::from(out.ct_eq(&kat::RETURNED_BITS)) {
            return Err(CryptoError::SelfTestFailed("ctr_drbg generate"));
        }

        let entropy: [u8; 32] = std::array::from_fn(|i| i as u8);
        let nonce: [u8; 16] = std::array::from_fn(|i| 32 + i as u8);
        let drbg = Self::from_seed_material(&entropy, &nonce, kat::PERSONALIZATION)?;
        let mut first = [0u8; 32];
        drbg.fill_with_input(&mut first, kat::ADDITIONAL)?;
        if !bool::from(first.ct_eq(&kat::PERSONALIZED_OUTPUT)) {
            return Err(CryptoError::SelfTestFailed("ctr_drbg personalization"));
        }

        let reseed_entropy: [u8; 32] = std::array::from_fn(|i| 64 + i as u8);
        drbg.reseed_with_entropy(&reseed_entropy, kat::RESEED_INPUT)?;
        let mut second = [0u8; 32];
        drbg.fill(&mut second)?;
        if !bool::from(second.ct_eq(&kat::RESEEDED_OUTPUT)) {
            return Err(CryptoError::SelfTestFailed("ctr_drbg reseed"));
        }
        Ok(())
    }
}

impl fmt::Debug for CtrDrbg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CtrDrbg")
            .field("reseed_interval", &self.reseed_interval)
            .field("entropy", &self.entropy.is_some())
            .finish_non_exhaustive()
    }
}

/// Best-effort name for a value of unknown type, for error messages.
pub fn describe(value: &dyn Any) -> &'static str {
    if value.is::<Arc<EntropySource>>() || value.is::<EntropySource>() {
        "EntropySource"
    } else if value.is::<Arc<CtrDrbg>>() || value.is::<CtrDrbg>() {
        "CtrDrbg"
    } else if value.is::<String>() || value.is::<&'static str>() {
        "String"
    } else if value.is::<i32>() || value.is::<i64>() || value.is::<usize>() {
        "Integer"
    } else if value.is::<()>() {
        "nil"
    } else {
        "unknown type"
    }
}

mod kat {
    pub(super) const ENTROPY: [u8; 32] = [
        0x36, 0x40, 0x19, 0x40, 0xfa, 0x8b, 0x1f, 0xba, 0x91, 0xa1, 0x66, 0x1f,
        0x21, 0x1d, 0x78, 0xa0, 0xb9, 0x38, 0x9a, 0x74, 0xe5, 0xbc, 0xcf, 0xec,
        0xe8, 0xd7, 0x66, 0xaf, 0x1a, 0x6d, 0x3b, 0x14,
    ];
    pub(super) const NONCE: [u8; 16] = [
        0x49, 0x6f, 0x25, 0xb0, 0xf1, 0x30, 0x1b, 0x4f, 0x50, 0x1b, 0xe3, 0x03,
        0x80, 0xa1, 0x37, 0xeb,
    ];
    /// Output of the second 64-byte generate call.
    pub(super) const RETURNED_BITS: [u8; 64] = [
        0x58, 0x62, 0xeb, 0x38, 0xbd, 0x55, 0x8d, 0xd9, 0x78, 0xa6, 0x96, 0xe6,
        0xdf, 0x16, 0x47, 0x82, 0xdd, 0xd8, 0x87, 0xe7, 0xe9, 0xa6, 0xc9, 0xf3,
        0xf1, 0xfb, 0xaf, 0xb7, 0x89, 0x41, 0xb5, 0x35, 0xa6, 0x49, 0x12, 0xdf,
        0xd2, 0x24, 0xc6, 0xdc, 0x74, 0x54, 0xe5, 0x25, 0x0b, 0x3d, 0x97, 0x16,
        0x5e, 0x16, 0x26, 0x0c, 0x2f, 0xaf, 0x1c, 0xc7, 0x73, 0x5c, 0xb7, 0x5f,
        0xb4, 0xf0, 0x7e, 0x1d,
    ];

    pub(super) const PERSONALIZATION: &[u8] = b"polarssl-rs self test";
    pub(super) const ADDITIONAL: &[u8] = b"additional input 1";
    pub(super) const RESEED_INPUT: &[u8] = b"reseed input";
    pub(super) const PERSONALIZED_OUTPUT: [u8; 32] = [
        0xca, 0xc4, 0xf7, 0xe2, 0x33, 0x44, 0x8c, 0x31, 0x05, 0xb9, 0xc6, 0x5d,
        0x78, 0x8b, 0x92, 0x93, 0xc2, 0x4c, 0xf0, 0xfc, 0x94, 0xa7, 0x68, 0x92,
        0x01, 0x13, 0x71, 0xf9, 0x63, 0x28, 0x27, 0xda,
    ];
    pub(super) const RESEEDED_OUTPUT: [u8; 32] = [
        0x91, 0x37, 0xa6, 0xf0, 0xa3, 0xe4, 0xc3, 0xc3, 0x6d, 0xe6, 0xa9, 0xbc,
        0xbd, 0x76, 0x17, 0xdc, 0x6b, 0x17, 0x0b, 0xa0, 0xd6, 0xc8, 0xec, 0xed,
        0xff, 0x1e, 0xf8, 0x25, 0x99, 0x6c, 0x46, 0x98,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::{EntropyConfig, NoiseSource};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn system_entropy() -> Arc<EntropySource> {
        Arc::new(EntropySource::new(EntropyConfig::default()))
    }

    #[test]
    fn test_self_test_passes() {
        CtrDrbg::self_test().unwrap();
    }

    #[test]
    fn test_block_cipher_df_vector() {
        let expected: [u8; SEED_LEN] = [
            0x1e, 0x80, 0xcf, 0xb9, 0x7c, 0xdf, 0xb7, 0xee, 0x43, 0x71, 0xb4, 0x73,
            0xc7, 0xc7, 0x35, 0xdc, 0x35, 0xc1, 0xe0, 0xfa, 0x68, 0x1f, 0x7c, 0x49,
            0x02, 0xd9, 0x71, 0x86, 0xe2, 0xce, 0x3e, 0x5d, 0xd0, 0x13, 0x82, 0xd7,
            0x4c, 0x94, 0x45, 0xf2, 0x6e, 0xd9, 0x3a, 0x01, 0x44, 0xfd, 0xa4, 0x25,
        ];
        assert_eq!(block_cipher_df(&[b"abc"]), expected);
        // split inputs concatenate
        assert_eq!(block_cipher_df(&[b"a", b"bc"]), expected);
    }

    #[test]
    fn test_nist_vector_first_block_differs_from_second() {
        let drbg = CtrDrbg::from_seed_material(&kat::ENTROPY, &kat::NONCE, &[]).unwrap();
        let first = drbg.random_bytes(64).unwrap();
        let second = drbg.random_bytes(64).unwrap();
        assert_ne!(first, second);
        assert_eq!(second, kat::RETURNED_BITS);
    }

    #[test]
    fn test_seeded_from_entropy_source() {
        let drbg = CtrDrbg::new(system_entropy()).unwrap();
        assert!(drbg.has_entropy_source());
        let a = drbg.random_bytes(32).unwrap();
        let b = drbg.random_bytes(32).unwrap();
        assert_ne!(a, b);
        assert!(a.iter().any(|&x| x != 0));
    }

    #[test]
    fn test_personalization_changes_output() {
        let entropy = [0x5Au8; 48];
        let nonce = [0xA5u8; 16];
        let plain = CtrDrbg::from_seed_material(&entropy, &nonce, &[]).unwrap();
        let personal = CtrDrbg::from_seed_material(&entropy, &nonce, b"device-42").unwrap();
        assert_ne!(plain.random_bytes(32).unwrap(), personal.random_bytes(32).unwrap());
    }

    #[test]
    fn test_large_request_is_split() {
        let drbg = CtrDrbg::from_seed_material(&[1u8; 48], &[2u8; 16], &[]).unwrap();
        let out = drbg.random_bytes(3 * MAX_REQUEST + 7).unwrap();
        assert_eq!(out.len(), 3 * MAX_REQUEST + 7);
        assert_eq!(drbg.lock().reseed_counter, 5);
    }

    #[test]
    fn test_from_dyn_argument_checks() {
        assert!(matches!(
            CtrDrbg::from_dyn(None, None),
            Err(CryptoError::MissingArgument("entropy"))
        ));

        let not_entropy = String::from("entropy");
        match CtrDrbg::from_dyn(Some(&not_entropy as &dyn Any), None) {
            Err(CryptoError::TypeMismatch { expected, found }) => {
                assert_eq!(expected, "EntropySource");
                assert_eq!(found, "String");
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let es = system_entropy();
        let drbg = CtrDrbg::from_dyn(Some(&es as &dyn Any), Some(&b"pers"[..])).unwrap();
        assert_eq!(drbg.random_bytes(16).unwrap().len(), 16);
    }

    #[test]
    fn test_oversized_inputs_rejected() {
        let long = [0u8; MAX_INPUT + 1];
        assert!(CtrDrbg::with_personalization(system_entropy(), &long).is_err());
        let drbg = CtrDrbg::new(system_entropy()).unwrap();
        let mut out = [0u8; 16];
        assert!(drbg.fill_with_input(&mut out, &long).is_err());
    }

    #[test]
    fn test_seed_only_generator_needs_manual_reseed() {
        let drbg = CtrDrbg::from_seed_material(&[3u8; 48], &[4u8; 16], &[])
            .unwrap()
            .with_reseed_interval(2);
        drbg.random_bytes(8).unwrap();
        drbg.random_bytes(8).unwrap();
        assert!(matches!(
            drbg.random_bytes(8),
            Err(CryptoError::DrbgInvalidState)
        ));
        drbg.reseed_with_entropy(&[9u8; 48], b"").unwrap();
        drbg.random_bytes(8).unwrap();
    }

    struct TallySource(Arc<AtomicUsize>);

    impl NoiseSource for TallySource {
        fn name(&self) -> &str {
            "tally"
        }
        fn min_entropy_per_byte(&self) -> u32 {
            8
        }
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, CryptoError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            getrandom::getrandom(buf).map_err(|_| CryptoError::DrbgEntropyFail)?;
            Ok(buf.len())
        }
    }

    #[test]
    fn test_automatic_reseed_pulls_entropy() {
        let reads = Arc::new(AtomicUsize::new(0));
        let config = EntropyConfig {
            pool_capacity: 64,
            ..Default::default()
        };
        let es = Arc::new(EntropySource::with_source(config, Box::new(TallySource(reads.clone()))));
        let drbg = CtrDrbg::new(Arc::clone(&es)).unwrap().with_reseed_interval(1);
        let after_seed = reads.load(Ordering::SeqCst);

        drbg.random_bytes(16).unwrap();
        drbg.random_bytes(16).unwrap();
        drbg.random_bytes(16).unwrap();
        assert!(reads.load(Ordering::SeqCst) > after_seed);
    }

    #[test]
    fn test_reseed_changes_stream() {
        let a = CtrDrbg::from_seed_material(&[7u8; 48], &[8u8; 16], &[]).unwrap();
        let b = CtrDrbg::from_seed_material(&[7u8; 48], &[8u8; 16], &[]).unwrap();
        b.reseed_with_entropy(&[1u8; 48], b"extra").unwrap();
        assert_ne!(a.random_bytes(32).unwrap(), b.random_bytes(32).unwrap());
    }

    #[test]
    fn test_shared_between_threads() {
        let drbg = Arc::new(CtrDrbg::new(system_entropy()).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let drbg = Arc::clone(&drbg);
                std::thread::spawn(move || drbg.random_bytes(64).unwrap())
            })
            .collect();
        let outputs: Vec<Vec<u8>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for i in 0..outputs.len() {
            for j in i + 1..outputs.len() {
                assert_ne!(outputs[i], outputs[j]);
            }
        }
    }

    #[test]
    fn test_increment_counter() {
        let mut v = [0u8; BLOCK_LEN];
        increment_counter(&mut v);
        assert_eq!(v[BLOCK_LEN - 1], 1);

        v = [0u8; BLOCK_LEN];
        v[BLOCK_LEN - 1] = 0xFF;
        increment_counter(&mut v);
        assert_eq!(v[BLOCK_LEN - 2..], [1, 0]);

        v = [0xFF; BLOCK_LEN];
        increment_counter(&mut v);
        assert_eq!(v, [0u8; BLOCK_LEN]);
    }
}
