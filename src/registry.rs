//! Container registry
//!
//! Fixed-capacity table of the containers currently known to the boot flow.
//! The registry is an explicit handle (no hidden singleton) with lifecycle
//! `Uninitialized -> Active -> TornDown`; every operation outside the
//! `Active` window fails with `NotReady`.
//!
//! Entries borrow the container images (`&'a [u8]`): the registry never owns
//! or frees container memory, and the shared borrow guarantees the bytes that
//! were validated at registration stay unchanged while registered.
//! Unregistering keeps the relative order of the remaining entries.

use heapless::Vec;

use crate::auth::Authenticator;
use crate::config::{LoaderConfig, DEFAULT_MAX_CONTAINERS};
use crate::crypto::CryptoProvider;
use crate::error::{ContainerError, Result};
use crate::layout::{parse_container, ContainerBody, ContainerListHeader, Header};
use crate::log::logger::{log_args, log_error, log_info, log_warn};

/// Registry lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    Uninitialized,
    Active,
    TornDown,
}

/// One registered container: its signature, the cached header and the
/// backing image.
#[derive(Debug, Clone, Copy)]
pub struct ContainerEntry<'a> {
    pub signature: u32,
    pub header: Header,
    image: &'a [u8],
}

impl<'a> ContainerEntry<'a> {
    /// Base address of the container image.
    pub fn base(&self) -> usize {
        self.image.as_ptr() as usize
    }

    pub fn image(&self) -> &'a [u8] {
        self.image
    }

    pub fn is_mono_signed(&self) -> bool {
        self.header.is_mono_signed()
    }

    /// Plain container body (inner container for mono-signed images).
    pub fn body(&self) -> Result<ContainerBody<'a>> {
        let bytes = self
            .image
            .get(self.header.body_offset()..)
            .ok_or(ContainerError::InvalidFormat)?;
        Ok(ContainerBody::from_validated(*self.header.inner(), bytes))
    }
}

/// Registry handle. `N` is the compile-time storage capacity; the configured
/// `max_containers` may lower it.
pub struct ContainerRegistry<'a, const N: usize = DEFAULT_MAX_CONTAINERS> {
    state: RegistryState,
    limit: usize,
    entries: Vec<ContainerEntry<'a>, N>,
}

impl<'a, const N: usize> Default for ContainerRegistry<'a, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, const N: usize> ContainerRegistry<'a, N> {
    pub const fn new() -> Self {
        Self { state: RegistryState::Uninitialized, limit: N, entries: Vec::new() }
    }

    /// Open the registration window. Idempotent while active; a torn-down
    /// registry stays closed.
    pub fn init(&mut self, config: &LoaderConfig) -> Result<()> {
        config.validate()?;
        match self.state {
            RegistryState::Uninitialized => {
                self.limit = config.max_containers.min(N);
                self.state = RegistryState::Active;
                log_args(
                    ::log::Level::Info,
                    "container",
                    format_args!("registry active, capacity {}", self.limit),
                );
                Ok(())
            }
            RegistryState::Active => Ok(()),
            RegistryState::TornDown => Err(ContainerError::NotReady),
        }
    }

    /// Close the window and drop every entry.
    pub fn teardown(&mut self) {
        self.entries.clear();
        self.state = RegistryState::TornDown;
        log_info("container", "registry torn down");
    }

    pub fn state(&self) -> RegistryState {
        self.state
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state == RegistryState::Active {
            Ok(())
        } else {
            Err(ContainerError::NotReady)
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.limit
    }

    /// Registered entries in registration order.
    pub fn entries(&self) -> &[ContainerEntry<'a>] {
        &self.entries
    }

    /// Header of the `ContainerList` view of this registry.
    pub fn list_header(&self) -> ContainerListHeader {
        ContainerListHeader::for_count(self.entries.len())
    }

    pub fn find(&self, signature: u32) -> Result<&ContainerEntry<'a>> {
        self.ensure_active()?;
        self.entries
            .iter()
            .find(|e| e.signature == signature)
            .ok_or(ContainerError::NotFound)
    }

    /// Validate the container at `image` and append it. Mono-signed images
    /// are authenticated here, once. Any failure leaves the registry
    /// unchanged. Returns the registered signature.
    pub fn register_container<C: CryptoProvider>(
        &mut self,
        image: &'a [u8],
        auth: &Authenticator<'_, C>,
    ) -> Result<u32> {
        self.ensure_active()?;
        if self.entries.len() >= self.limit {
            log_warn("container", "registry full");
            return Err(ContainerError::OutOfCapacity);
        }

        let parsed = parse_container(image).map_err(|e| {
            log_error("container", e.as_str());
            e
        })?;
        let signature = parsed.header.signature();
        if self.entries.iter().any(|e| e.signature == signature) {
            log_warn("container", "signature already registered");
            return Err(ContainerError::InvalidArgument);
        }
        if let Some(region) = parsed.mono.as_ref() {
            auth.verify_mono(region).map_err(|e| {
                log_warn("container", "mono-signed container failed authentication");
                e
            })?;
        }

        self.entries
            .push(ContainerEntry { signature, header: parsed.header, image })
            .map_err(|_| ContainerError::OutOfCapacity)?;
        log_args(
            ::log::Level::Info,
            "container",
            format_args!(
                "registered {:08x} ({} components{})",
                signature,
                parsed.header.inner().count,
                if parsed.header.is_mono_signed() { ", mono-signed" } else { "" }
            ),
        );
        Ok(signature)
    }

    /// Remove the entry for `signature`. The container memory is untouched.
    pub fn unregister_container(&mut self, signature: u32) -> Result<()> {
        self.ensure_active()?;
        let idx = self
            .entries
            .iter()
            .position(|e| e.signature == signature)
            .ok_or(ContainerError::NotFound)?;
        self.entries.remove(idx);
        log_args(
            ::log::Level::Info,
            "container",
            format_args!("unregistered {:08x}", signature),
        );
        Ok(())
    }
}

/// Registry shared between execution contexts (e.g. cores brought up before
/// the OS). Lookups hold the read guard; register and unregister hold the
/// write guard.
pub type SharedRegistry<'a, const N: usize> = spin::RwLock<ContainerRegistry<'a, N>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrustAnchors;
    use crate::layout::{signature_32, AuthType};
    use crate::testing::{mock_anchors, mono_sign, ComponentSpec, ContainerBuilder, MockCrypto};
    use alloc::vec::Vec as AllocVec;

    fn auth() -> Authenticator<'static, MockCrypto> {
        Authenticator::new(MockCrypto, mock_anchors())
    }

    fn image(sig: u32) -> AllocVec<u8> {
        ContainerBuilder::new(sig)
            .component(signature_32(b'C', b'M', b'P', b'A'), b"alpha", AuthType::Sha256)
            .build()
    }

    fn active<'a, const N: usize>() -> ContainerRegistry<'a, N> {
        let mut reg = ContainerRegistry::new();
        reg.init(&LoaderConfig::default()).unwrap();
        reg
    }

    #[test]
    fn not_ready_before_init_and_after_teardown() {
        let img = image(signature_32(b'B', b'O', b'O', b'T'));
        let mut reg: ContainerRegistry<'_, 4> = ContainerRegistry::new();
        assert_eq!(reg.register_container(&img, &auth()), Err(ContainerError::NotReady));
        assert_eq!(reg.unregister_container(1), Err(ContainerError::NotReady));
        reg.init(&LoaderConfig::default()).unwrap();
        reg.register_container(&img, &auth()).unwrap();
        reg.teardown();
        assert!(reg.is_empty());
        assert_eq!(reg.state(), RegistryState::TornDown);
        assert_eq!(reg.find(signature_32(b'B', b'O', b'O', b'T')).err(), Some(ContainerError::NotReady));
        assert_eq!(reg.init(&LoaderConfig::default()), Err(ContainerError::NotReady));
    }

    #[test]
    fn register_and_count() {
        let imgs: AllocVec<_> = (1u8..=3).map(|i| image(signature_32(b'C', b'T', b'0', i))).collect();
        let mut reg: ContainerRegistry<'_, 4> = active();
        for img in &imgs {
            reg.register_container(img, &auth()).unwrap();
        }
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.list_header().count, 3);
        assert_eq!(reg.list_header().total_length, 16 + 3 * 16);
    }

    #[test]
    fn capacity_clamped_by_config() {
        let imgs: AllocVec<_> = (1u8..=3).map(|i| image(signature_32(b'C', b'T', b'0', i))).collect();
        let mut reg: ContainerRegistry<'_, 8> = ContainerRegistry::new();
        reg.init(&LoaderConfig { max_containers: 2, ..LoaderConfig::default() }).unwrap();
        assert_eq!(reg.capacity(), 2);
        reg.register_container(&imgs[0], &auth()).unwrap();
        reg.register_container(&imgs[1], &auth()).unwrap();
        assert_eq!(reg.register_container(&imgs[2], &auth()), Err(ContainerError::OutOfCapacity));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn duplicate_signature_rejected() {
        let a = image(signature_32(b'B', b'O', b'O', b'T'));
        let b = image(signature_32(b'B', b'O', b'O', b'T'));
        let mut reg: ContainerRegistry<'_, 4> = active();
        reg.register_container(&a, &auth()).unwrap();
        assert_eq!(reg.register_container(&b, &auth()), Err(ContainerError::InvalidArgument));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn malformed_image_leaves_registry_unchanged() {
        let good = image(signature_32(b'G', b'O', b'O', b'D'));
        let mut bad = image(signature_32(b'B', b'A', b'D', b'!'));
        bad.truncate(bad.len() - 1);
        let mut reg: ContainerRegistry<'_, 4> = active();
        reg.register_container(&good, &auth()).unwrap();
        assert_eq!(reg.register_container(&bad, &auth()), Err(ContainerError::InvalidFormat));
        assert_eq!(reg.len(), 1);
        assert!(reg.find(signature_32(b'G', b'O', b'O', b'D')).is_ok());
    }

    #[test]
    fn digestless_hash_record_rejected_at_registration() {
        let img = ContainerBuilder::new(signature_32(b'B', b'O', b'O', b'T'))
            .raw_component(ComponentSpec::raw(
                signature_32(b'C', b'M', b'P', b'A'),
                b"alpha",
                AuthType::Sha256 as u8,
                &[],
            ))
            .build();
        let mut reg: ContainerRegistry<'_, 4> = active();
        assert_eq!(reg.register_container(&img, &auth()), Err(ContainerError::InvalidFormat));
        assert!(reg.is_empty());
    }

    #[test]
    fn unregister_preserves_order() {
        let imgs: AllocVec<_> = (1u8..=3).map(|i| image(signature_32(b'C', b'T', b'0', i))).collect();
        let mut reg: ContainerRegistry<'_, 4> = active();
        for img in &imgs {
            reg.register_container(img, &auth()).unwrap();
        }
        reg.unregister_container(signature_32(b'C', b'T', b'0', 2)).unwrap();
        let sigs: AllocVec<u32> = reg.entries().iter().map(|e| e.signature).collect();
        assert_eq!(sigs, [signature_32(b'C', b'T', b'0', 1), signature_32(b'C', b'T', b'0', 3)]);
        assert_eq!(
            reg.unregister_container(signature_32(b'C', b'T', b'0', 2)),
            Err(ContainerError::NotFound)
        );
    }

    #[test]
    fn mono_signed_registration_authenticates() {
        let inner = image(signature_32(b'M', b'O', b'N', b'O'));
        let good = mono_sign(&inner, AuthType::SigRsa2048Sha256);
        let mut tampered = good.clone();
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;

        let mut reg: ContainerRegistry<'_, 4> = active();
        assert_eq!(reg.register_container(&tampered, &auth()), Err(ContainerError::SecurityViolation));
        assert!(reg.is_empty());
        assert_eq!(reg.register_container(&good, &auth()), Ok(signature_32(b'M', b'O', b'N', b'O')));
        assert!(reg.entries()[0].is_mono_signed());
    }

    #[test]
    fn mono_wrapper_without_scheme_rejected() {
        let inner = ContainerBuilder::new(signature_32(b'M', b'O', b'N', b'O'))
            .component(signature_32(b'K', b'E', b'R', b'N'), b"kernel", AuthType::Sha256)
            .tamper_payload(signature_32(b'K', b'E', b'R', b'N'))
            .build();
        let img = mono_sign(&inner, AuthType::None);
        let mut reg: ContainerRegistry<'_, 4> = active();
        assert_eq!(reg.register_container(&img, &auth()), Err(ContainerError::SecurityViolation));
        assert!(reg.is_empty());
    }

    #[test]
    fn mono_signed_without_anchor_fails() {
        let inner = image(signature_32(b'M', b'O', b'N', b'O'));
        let img = mono_sign(&inner, AuthType::SigRsa3072Sha384);
        let a = Authenticator::new(MockCrypto, TrustAnchors::none());
        let mut reg: ContainerRegistry<'_, 4> = active();
        assert_eq!(reg.register_container(&img, &a), Err(ContainerError::SecurityViolation));
    }

    #[test]
    fn shared_registry_reads_nest() {
        let img = image(signature_32(b'B', b'O', b'O', b'T'));
        let shared: SharedRegistry<'_, 4> = spin::RwLock::new(active());
        shared.write().register_container(&img, &auth()).unwrap();
        let outer = shared.read();
        let inner = shared.read();
        assert_eq!(outer.len(), inner.len());
    }
}
