//! Software crypto provider: SHA-2 via `sha2`, RSA PKCS#1 v1.5 via `rsa`.

use rsa::{BigUint, Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest as _, Sha256, Sha384};

use super::{CryptoProvider, Digest, HashAlgorithm, SignatureAlgorithm};
use crate::log::logger::log_debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct SoftCrypto;

impl SoftCrypto {
    pub const fn new() -> Self {
        SoftCrypto
    }
}

/// Decode `modulus || exponent(be32)`.
fn decode_public_key(alg: SignatureAlgorithm, encoded: &[u8]) -> Option<RsaPublicKey> {
    if encoded.len() != alg.public_key_len() {
        return None;
    }
    let (modulus, exponent) = encoded.split_at(alg.signature_len());
    let e = u32::from_be_bytes([exponent[0], exponent[1], exponent[2], exponent[3]]);
    RsaPublicKey::new(BigUint::from_bytes_be(modulus), BigUint::from(e)).ok()
}

impl CryptoProvider for SoftCrypto {
    fn hash(&self, alg: HashAlgorithm, data: &[u8]) -> Digest {
        let out = match alg {
            HashAlgorithm::Sha256 => Digest::from_slice(Sha256::digest(data).as_slice()),
            HashAlgorithm::Sha384 => Digest::from_slice(Sha384::digest(data).as_slice()),
        };
        // Both outputs fit MAX_DIGEST_LEN.
        out.unwrap_or(Digest { bytes: [0u8; super::MAX_DIGEST_LEN], len: 0 })
    }

    fn verify_signature(
        &self,
        digest: &[u8],
        alg: SignatureAlgorithm,
        signature: &[u8],
        public_key: &[u8],
    ) -> bool {
        if digest.len() != alg.hash().digest_len() || signature.len() != alg.signature_len() {
            return false;
        }
        let Some(key) = decode_public_key(alg, public_key) else {
            log_debug("crypto", "trust anchor does not decode as an RSA key");
            return false;
        };
        let scheme = match alg {
            SignatureAlgorithm::Rsa2048Sha256 => Pkcs1v15Sign::new::<Sha256>(),
            SignatureAlgorithm::Rsa3072Sha384 => Pkcs1v15Sign::new::<Sha384>(),
        };
        key.verify(scheme, digest, signature).is_ok()
    }
}
