//! Crypto provider seam
//!
//! The container loader never implements hash or signature math itself; it
//! asks a `CryptoProvider`. `soft::SoftCrypto` is the software provider
//! (sha2 + rsa). Platforms with hardware engines implement the trait directly.

#[cfg(feature = "soft-crypto")]
pub mod soft;

#[cfg(feature = "soft-crypto")]
pub use soft::SoftCrypto;

/// Largest digest produced by any supported algorithm (SHA-384).
pub const MAX_DIGEST_LEN: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
}

impl HashAlgorithm {
    pub const fn digest_len(self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Rsa2048Sha256,
    Rsa3072Sha384,
}

impl SignatureAlgorithm {
    pub const fn hash(self) -> HashAlgorithm {
        match self {
            SignatureAlgorithm::Rsa2048Sha256 => HashAlgorithm::Sha256,
            SignatureAlgorithm::Rsa3072Sha384 => HashAlgorithm::Sha384,
        }
    }

    /// Signature length in bytes (modulus size).
    pub const fn signature_len(self) -> usize {
        match self {
            SignatureAlgorithm::Rsa2048Sha256 => 256,
            SignatureAlgorithm::Rsa3072Sha384 => 384,
        }
    }

    /// Encoded trust-anchor length: modulus + 4-byte exponent.
    pub const fn public_key_len(self) -> usize {
        self.signature_len() + 4
    }
}

/// Fixed-capacity digest value; no heap needed.
#[derive(Clone, Copy)]
pub struct Digest {
    bytes: [u8; MAX_DIGEST_LEN],
    len: usize,
}

impl Digest {
    /// Copy `bytes` into a digest. Returns `None` if longer than any
    /// supported digest.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > MAX_DIGEST_LEN {
            return None;
        }
        let mut d = Digest { bytes: [0u8; MAX_DIGEST_LEN], len: bytes.len() };
        d.bytes[..bytes.len()].copy_from_slice(bytes);
        Some(d)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl core::fmt::Debug for Digest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for b in self.as_slice() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Hash and signature primitives consumed by the authenticator.
pub trait CryptoProvider {
    fn hash(&self, alg: HashAlgorithm, data: &[u8]) -> Digest;

    /// Verify `signature` over an already computed `digest` with the encoded
    /// `public_key` (see `config::TrustAnchors`).
    fn verify_signature(
        &self,
        digest: &[u8],
        alg: SignatureAlgorithm,
        signature: &[u8],
        public_key: &[u8],
    ) -> bool;
}

impl<T: CryptoProvider + ?Sized> CryptoProvider for &T {
    fn hash(&self, alg: HashAlgorithm, data: &[u8]) -> Digest {
        (**self).hash(alg, data)
    }

    fn verify_signature(
        &self,
        digest: &[u8],
        alg: SignatureAlgorithm,
        signature: &[u8],
        public_key: &[u8],
    ) -> bool {
        (**self).verify_signature(digest, alg, signature, public_key)
    }
}

/// Constant-time equality over equal-length slices. Length mismatch is not
/// secret and returns early.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut x = 0u8;
    for i in 0..a.len() {
        x |= a[i] ^ b[i];
    }
    x == 0
}
