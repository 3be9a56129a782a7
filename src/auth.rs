//! Component and container authentication
//!
//! Pure functions over byte slices plus the platform trust anchors; no shared
//! state, so independent payloads can be checked from any execution context.
//!
//! Policy:
//! - Hash schemes compare a fresh digest against the record's `hash_data` in
//!   constant time.
//! - Signature schemes verify an RSA PKCS#1 v1.5 signature over the payload
//!   digest with the platform key; an optional `hash_data` digest is checked
//!   first.
//! - A mono-signed container is authenticated once, over the stored inner
//!   container, when it is registered. Per-component tags inside it are
//!   range-checked but carry no trust. A wrapper declaring no scheme is
//!   refused while verified boot is on.
//! - With verified boot disabled by platform policy, only the tag range check
//!   remains.

use crate::config::{LoaderConfig, TrustAnchors};
use crate::crypto::{ct_eq, CryptoProvider, HashAlgorithm};
use crate::error::{ContainerError, Result};
use crate::layout::{AuthType, ComponentEntry, MonoSignRegion};
use crate::log::logger::{log_debug, log_trace, log_warn};

pub struct Authenticator<'k, C> {
    crypto: C,
    anchors: TrustAnchors<'k>,
    verified_boot: bool,
}

impl<'k, C: CryptoProvider> Authenticator<'k, C> {
    pub fn new(crypto: C, anchors: TrustAnchors<'k>) -> Self {
        Self { crypto, anchors, verified_boot: true }
    }

    pub fn with_config(crypto: C, anchors: TrustAnchors<'k>, config: &LoaderConfig) -> Self {
        Self { crypto, anchors, verified_boot: config.verified_boot }
    }

    pub fn crypto(&self) -> &C {
        &self.crypto
    }

    pub fn verified_boot(&self) -> bool {
        self.verified_boot
    }

    /// Authenticate `payload` under the raw scheme tag `auth_type`.
    ///
    /// `expected` is the digest for hash schemes and the signature for
    /// signature schemes.
    pub fn authenticate(&self, payload: &[u8], auth_type: u8, expected: &[u8]) -> Result<()> {
        let auth = AuthType::try_from(auth_type)?;
        if auth == AuthType::None {
            return Ok(());
        }
        if !self.verified_boot {
            log_trace("auth", "verified boot disabled; skipping check");
            return Ok(());
        }
        match auth.signature_algorithm() {
            None => {
                let alg = auth.hash_algorithm().ok_or(ContainerError::Unsupported)?;
                self.check_digest(alg, payload, expected)
            }
            Some(alg) => {
                if expected.len() != alg.signature_len() {
                    log_warn("auth", "signature length does not match scheme");
                    return Err(ContainerError::SecurityViolation);
                }
                let key = self.anchors.key_for(alg).map_err(|e| {
                    log_warn("auth", "no trust anchor for signature scheme");
                    e
                })?;
                let digest = self.crypto.hash(alg.hash(), payload);
                if self.crypto.verify_signature(digest.as_slice(), alg, expected, key) {
                    log_debug("auth", "signature verified");
                    Ok(())
                } else {
                    log_warn("auth", "signature verification failed");
                    Err(ContainerError::SecurityViolation)
                }
            }
        }
    }

    fn check_digest(&self, alg: HashAlgorithm, payload: &[u8], expected: &[u8]) -> Result<()> {
        let digest = self.crypto.hash(alg, payload);
        if ct_eq(digest.as_slice(), expected) {
            log_trace("auth", "digest match");
            Ok(())
        } else {
            log_warn("auth", "digest mismatch");
            Err(ContainerError::SecurityViolation)
        }
    }

    /// Authenticate a component whose digest covers `target` (stored payload
    /// or decompressed image, as the record declares). `signature` is the
    /// trailing signature split off the stored region (empty for hash schemes).
    pub fn verify_component(
        &self,
        entry: &ComponentEntry<'_>,
        target: &[u8],
        signature: &[u8],
    ) -> Result<()> {
        let auth = entry.auth()?;
        let hash_size = entry.hash_size();
        match auth {
            AuthType::None => Ok(()),
            AuthType::Sha256 | AuthType::Sha384 => {
                let alg = auth.hash_algorithm().ok_or(ContainerError::Unsupported)?;
                if hash_size != alg.digest_len() {
                    return Err(ContainerError::InvalidFormat);
                }
                self.authenticate(target, entry.auth_type, entry.hash_data)
            }
            AuthType::SigRsa2048Sha256 | AuthType::SigRsa3072Sha384 => {
                let alg = auth.hash_algorithm().ok_or(ContainerError::Unsupported)?;
                if hash_size != 0 && hash_size != alg.digest_len() {
                    return Err(ContainerError::InvalidFormat);
                }
                if hash_size != 0 && self.verified_boot {
                    self.check_digest(alg, target, entry.hash_data)?;
                }
                self.authenticate(target, entry.auth_type, signature)
            }
        }
    }

    /// One check over the whole signed inner container of a mono-signed image.
    ///
    /// The wrapper stands in for every component check inside it, so with
    /// verified boot on it must carry a real scheme.
    pub fn verify_mono(&self, region: &MonoSignRegion<'_>) -> Result<()> {
        if region.auth_type == AuthType::None && self.verified_boot {
            log_warn("auth", "mono-sign wrapper declares no authentication");
            return Err(ContainerError::SecurityViolation);
        }
        self.authenticate(region.signed, region.auth_type as u8, region.auth_block)
    }
}
