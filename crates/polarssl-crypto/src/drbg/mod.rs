//! Deterministic random bit generators.

mod ctr_drbg;

pub use ctr_drbg::{
    describe, CtrDrbg, ENTROPY_LEN, MAX_INPUT, MAX_REQUEST, NONCE_LEN, RESEED_INTERVAL,
};
