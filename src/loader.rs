//! Component loader for NØNOS boot stages.
//!
//! Pipeline per call: Locate, Copy, Authenticate, Decompress (or Decompress
//! before Authenticate when the component's digest covers the decompressed
//! image). The observer is told about each stage before its work starts.
//! Nothing is held across an observer call, so the observer may look up or
//! load other components through the same loader.

use alloc::vec::Vec;
use zeroize::Zeroize;

use crate::auth::Authenticator;
use crate::config::{LoaderConfig, TrustAnchors, DEFAULT_MAX_CONTAINERS};
use crate::crypto::CryptoProvider;
use crate::decompress::Decompressor;
use crate::error::{ContainerError, Result};
use crate::locate::LocatedComponent;
use crate::log::logger::{log_args, log_debug, log_warn};
use crate::registry::{ContainerRegistry, RegistryState};

/// Pipeline stage ids as reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoadStage {
    Locate = 1,
    Copy = 2,
    Authenticate = 3,
    Decompress = 4,
}

impl LoadStage {
    pub fn id(self) -> u8 {
        self as u8
    }
}

/// Progress observer. Any `FnMut(LoadStage)` qualifies.
pub trait LoadObserver {
    fn on_stage(&mut self, stage: LoadStage);
}

impl<F: FnMut(LoadStage)> LoadObserver for F {
    fn on_stage(&mut self, stage: LoadStage) {
        self(stage)
    }
}

fn silent(_stage: LoadStage) {}

/// Where a loaded component ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loaded<'a> {
    /// Zero-copy: authenticated bytes in container memory.
    InPlace(&'a [u8]),
    /// Final image occupies `buffer[..len]`.
    Buffer { len: usize },
}

impl<'a> Loaded<'a> {
    pub fn len(&self) -> usize {
        match self {
            Loaded::InPlace(bytes) => bytes.len(),
            Loaded::Buffer { len } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Registry, authenticator and codec bundled behind the boot-flow surface.
pub struct ComponentLoader<'a, 'k, C, D, const N: usize = DEFAULT_MAX_CONTAINERS> {
    registry: ContainerRegistry<'a, N>,
    auth: Authenticator<'k, C>,
    decompressor: D,
    config: LoaderConfig,
}

impl<'a, 'k, C: CryptoProvider, D: Decompressor, const N: usize> ComponentLoader<'a, 'k, C, D, N> {
    pub fn new(crypto: C, anchors: TrustAnchors<'k>, decompressor: D, config: LoaderConfig) -> Self {
        Self {
            registry: ContainerRegistry::new(),
            auth: Authenticator::with_config(crypto, anchors, &config),
            decompressor,
            config,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.registry.init(&self.config)
    }

    pub fn teardown(&mut self) {
        self.registry.teardown();
    }

    pub fn state(&self) -> RegistryState {
        self.registry.state()
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn registry(&self) -> &ContainerRegistry<'a, N> {
        &self.registry
    }

    pub fn authenticator(&self) -> &Authenticator<'k, C> {
        &self.auth
    }

    pub fn register_container(&mut self, image: &'a [u8]) -> Result<u32> {
        self.registry.register_container(image, &self.auth)
    }

    pub fn unregister_container(&mut self, signature: u32) -> Result<()> {
        self.registry.unregister_container(signature)
    }

    pub fn locate_component_entry(&self, container: u32, component: u32) -> Result<LocatedComponent<'a>> {
        self.registry.locate_component_entry(container, component)
    }

    /// Stored payload bytes, not authenticated.
    pub fn locate_component(&self, container: u32, component: u32) -> Result<&'a [u8]> {
        self.registry.locate_component(container, component)
    }

    pub fn get_next_available_component(&self, container: u32, name: Option<&mut u32>) -> Result<()> {
        self.registry.get_next_available_component(container, name)
    }

    /// Load without progress reporting.
    pub fn load_component(
        &self,
        container: u32,
        component: u32,
        buffer: Option<&mut [u8]>,
    ) -> Result<Loaded<'a>> {
        self.load_component_with_callback(container, component, buffer, silent)
    }

    /// Full pipeline. With `buffer` the final image is written to
    /// `buffer[..len]`; without it the component is authenticated in place
    /// and returned zero-copy.
    ///
    /// On any failure after the Copy stage the buffer is zeroed.
    pub fn load_component_with_callback<O: LoadObserver>(
        &self,
        container: u32,
        component: u32,
        buffer: Option<&mut [u8]>,
        mut observer: O,
    ) -> Result<Loaded<'a>> {
        observer.on_stage(LoadStage::Locate);
        let hit = self.locate_component_entry(container, component)?;

        let result = match buffer {
            None => self.load_in_place(&hit, &mut observer).map(Loaded::InPlace),
            Some(buffer) if buffer.len() < hit.payload.len() => Err(ContainerError::BufferTooSmall),
            Some(buffer) => {
                let stored = hit.payload;
                observer.on_stage(LoadStage::Copy);
                buffer[..stored.len()].copy_from_slice(stored);
                let filled = self.finish_in_buffer(&hit, buffer, &mut observer);
                if filled.is_err() {
                    buffer.zeroize();
                }
                filled.map(|len| Loaded::Buffer { len })
            }
        };

        match &result {
            Ok(loaded) => log_args(
                ::log::Level::Debug,
                "loader",
                format_args!("{:08x}/{:08x} loaded, {} bytes", container, component, loaded.len()),
            ),
            Err(e) => log_args(
                ::log::Level::Warn,
                "loader",
                format_args!("{:08x}/{:08x}: {}", container, component, e.as_str()),
            ),
        }
        result
    }

    /// Load into a freshly allocated buffer sized to the final image.
    ///
    /// A stored component larger than `max_image_size` is `OutOfCapacity`:
    /// the platform cap, not a caller buffer, is what it exceeds.
    pub fn load_component_owned(&self, container: u32, component: u32) -> Result<Vec<u8>> {
        self.load_component_owned_with_callback(container, component, silent)
    }

    pub fn load_component_owned_with_callback<O: LoadObserver>(
        &self,
        container: u32,
        component: u32,
        mut observer: O,
    ) -> Result<Vec<u8>> {
        observer.on_stage(LoadStage::Locate);
        let hit = self.locate_component_entry(container, component)?;
        if hit.payload.len() > self.config.max_image_size {
            log_warn("loader", "component exceeds image size cap");
            return Err(ContainerError::OutOfCapacity);
        }

        observer.on_stage(LoadStage::Copy);
        let stored = hit.payload.to_vec();
        if !hit.component.is_compressed() {
            self.authenticate(&hit, &stored, &mut observer)?;
            return Ok(stored);
        }
        if hit.component.hashes_decompressed() {
            let image = self.decompress(&stored, &mut observer)?;
            self.authenticate(&hit, &image, &mut observer)?;
            Ok(image)
        } else {
            self.authenticate(&hit, &stored, &mut observer)?;
            self.decompress(&stored, &mut observer)
        }
    }

    fn load_in_place(&self, hit: &LocatedComponent<'a>, observer: &mut dyn LoadObserver) -> Result<&'a [u8]> {
        if hit.component.hashes_decompressed() && !hit.covered_by_container() {
            log_warn("loader", "zero-copy load of a component hashed after decompression");
            return Err(ContainerError::InvalidArgument);
        }
        self.authenticate(hit, hit.payload, observer)?;
        Ok(hit.payload)
    }

    /// Stages after Copy; `buffer[..hit.payload.len()]` already holds the
    /// stored bytes.
    fn finish_in_buffer(
        &self,
        hit: &LocatedComponent<'a>,
        buffer: &mut [u8],
        observer: &mut dyn LoadObserver,
    ) -> Result<usize> {
        let stored_len = hit.payload.len();
        if !hit.component.is_compressed() {
            self.authenticate(hit, &buffer[..stored_len], observer)?;
            return Ok(stored_len);
        }

        let hash_after = hit.component.hashes_decompressed();
        if !hash_after {
            self.authenticate(hit, &buffer[..stored_len], observer)?;
        }
        let image = self.decompress(&buffer[..stored_len], observer)?;
        let out = buffer.get_mut(..image.len()).ok_or(ContainerError::BufferTooSmall)?;
        out.copy_from_slice(&image);
        if hash_after {
            self.authenticate(hit, out, observer)?;
        }
        Ok(image.len())
    }

    fn authenticate(&self, hit: &LocatedComponent<'a>, bytes: &[u8], observer: &mut dyn LoadObserver) -> Result<()> {
        observer.on_stage(LoadStage::Authenticate);
        if hit.covered_by_container() {
            log_debug("loader", "covered by container signature");
            return Ok(());
        }
        self.auth.verify_component(&hit.component, bytes, hit.signature)
    }

    fn decompress(&self, stored: &[u8], observer: &mut dyn LoadObserver) -> Result<Vec<u8>> {
        observer.on_stage(LoadStage::Decompress);
        let image = self.decompressor.decompress(stored).map_err(|e| {
            log_args(::log::Level::Warn, "loader", format_args!("{}", e));
            ContainerError::from(e)
        })?;
        if image.len() > self.config.max_image_size {
            return Err(ContainerError::DecompressFailure);
        }
        Ok(image)
    }
}
