#![forbid(unsafe_code)]
#![doc = "Entropy accumulation and CTR-DRBG random generation for polarssl-rs."]

pub mod drbg;
pub mod entropy;

pub use drbg::CtrDrbg;
pub use entropy::{EntropyConfig, EntropySource, NoiseSource};
pub use polarssl_types::CryptoError;
