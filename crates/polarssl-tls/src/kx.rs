//! Key exchange groups whose ephemeral private keys come from the DRBG.
//!
//! The engine's stock groups draw their scalars from the system RNG. These
//! replacements pull the secret bytes through [`rng::fill`], so a session's
//! key shares are produced by the same generator as its client random.

use p256::elliptic_curve::sec1::ToEncodedPoint;
use rustls::crypto::{ActiveKeyExchange, SharedSecret, SupportedKxGroup};
use rustls::{NamedGroup, PeerMisbehaved};
use zeroize::Zeroizing;

use crate::rng;

pub static X25519: &dyn SupportedKxGroup = &X25519Group;
pub static SECP256R1: &dyn SupportedKxGroup = &P256Group;

/// Groups offered by sessions, in preference order.
pub static ALL_KX_GROUPS: &[&dyn SupportedKxGroup] = &[X25519, SECP256R1];

fn invalid_share() -> rustls::Error {
    PeerMisbehaved::InvalidKeyShare.into()
}

#[derive(Debug)]
struct X25519Group;

impl SupportedKxGroup for X25519Group {
    fn start(&self) -> Result<Box<dyn ActiveKeyExchange>, rustls::Error> {
        let mut seed = Zeroizing::new([0u8; 32]);
        rng::fill(&mut seed[..])?;
        let secret = x25519_dalek::StaticSecret::from(*seed);
        let public = x25519_dalek::PublicKey::from(&secret);
        Ok(Box::new(X25519Exchange { secret, public }))
    }

    fn name(&self) -> NamedGroup {
        NamedGroup::X25519
    }
}

struct X25519Exchange {
    secret: x25519_dalek::StaticSecret,
    public: x25519_dalek::PublicKey,
}

impl ActiveKeyExchange for X25519Exchange {
    fn complete(self: Box<Self>, peer_pub_key: &[u8]) -> Result<SharedSecret, rustls::Error> {
        let peer: [u8; 32] = peer_pub_key.try_into().map_err(|_| invalid_share())?;
        let shared = self
            .secret
            .diffie_hellman(&x25519_dalek::PublicKey::from(peer));
        // low-order peer points give an all-zero secret
        if !shared.was_contributory() {
            return Err(invalid_share());
        }
        Ok(SharedSecret::from(&shared.as_bytes()[..]))
    }

    fn pub_key(&self) -> &[u8] {
        self.public.as_bytes()
    }

    fn group(&self) -> NamedGroup {
        NamedGroup::X25519
    }
}

#[derive(Debug)]
struct P256Group;

impl SupportedKxGroup for P256Group {
    fn start(&self) -> Result<Box<dyn ActiveKeyExchange>, rustls::Error> {
        // out-of-range candidates (>= n, or zero) are redrawn
        let secret = loop {
            let mut candidate = Zeroizing::new([0u8; 32]);
            rng::fill(&mut candidate[..])?;
            if let Ok(secret) = p256::SecretKey::from_slice(&candidate[..]) {
                break secret;
            }
        };
        let public = secret
            .public_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        Ok(Box::new(P256Exchange { secret, public }))
    }

    fn name(&self) -> NamedGroup {
        NamedGroup::secp256r1
    }
}

struct P256Exchange {
    secret: p256::SecretKey,
    /// Uncompressed SEC1 point.
    public: Vec<u8>,
}

impl ActiveKeyExchange for P256Exchange {
    fn complete(self: Box<Self>, peer_pub_key: &[u8]) -> Result<SharedSecret, rustls::Error> {
        // TLS 1.3 only allows the uncompressed form
        if peer_pub_key.first() != Some(&0x04) {
            return Err(invalid_share());
        }
        let peer = p256::PublicKey::from_sec1_bytes(peer_pub_key).map_err(|_| invalid_share())?;
        let shared = p256::ecdh::diffie_hellman(self.secret.to_nonzero_scalar(), peer.as_affine());
        Ok(SharedSecret::from(&shared.raw_secret_bytes()[..]))
    }

    fn pub_key(&self) -> &[u8] {
        &self.public
    }

    fn group(&self) -> NamedGroup {
        NamedGroup::secp256r1
    }
}
