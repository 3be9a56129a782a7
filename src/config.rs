//! Platform configuration for the container loader
//!
//! Supplies the registry capacity, the verified-boot policy and the trust
//! anchors used for signature schemes. Values normally come from the
//! platform's firmware configuration data; `Default` mirrors a production
//! build with verified boot enabled.

use crate::crypto::SignatureAlgorithm;
use crate::error::{ContainerError, Result};

/// Compile-time storage capacity of the registry.
pub const DEFAULT_MAX_CONTAINERS: usize = 8;

/// Upper bound for any single decompressed image (16 MiB).
pub const DEFAULT_MAX_IMAGE_SIZE: usize = 16 * 1024 * 1024;

/// Loader configuration structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Maximum number of simultaneously registered containers.
    /// Clamped by the registry's storage capacity.
    pub max_containers: usize,

    /// When false, authentication of non-`none` components is skipped
    /// (auth-type tags are still range-checked).
    pub verified_boot: bool,

    /// Cap applied to decompressed output and owned load buffers.
    pub max_image_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_containers: DEFAULT_MAX_CONTAINERS,
            verified_boot: true,
            max_image_size: DEFAULT_MAX_IMAGE_SIZE,
        }
    }
}

impl LoaderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_containers == 0 || self.max_image_size == 0 {
            return Err(ContainerError::InvalidArgument);
        }
        Ok(())
    }
}

/// Platform public keys for the signature schemes.
///
/// Encoding: big-endian modulus (256 bytes for RSA-2048, 384 for RSA-3072)
/// followed by a 4-byte big-endian public exponent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrustAnchors<'k> {
    pub rsa2048: Option<&'k [u8]>,
    pub rsa3072: Option<&'k [u8]>,
}

impl<'k> TrustAnchors<'k> {
    pub const fn none() -> Self {
        Self { rsa2048: None, rsa3072: None }
    }

    /// Key for `alg`, checked against the expected encoded length.
    pub fn key_for(&self, alg: SignatureAlgorithm) -> Result<&'k [u8]> {
        let key = match alg {
            SignatureAlgorithm::Rsa2048Sha256 => self.rsa2048,
            SignatureAlgorithm::Rsa3072Sha384 => self.rsa3072,
        }
        .ok_or(ContainerError::SecurityViolation)?;
        if key.len() != alg.public_key_len() {
            return Err(ContainerError::SecurityViolation);
        }
        Ok(key)
    }
}
