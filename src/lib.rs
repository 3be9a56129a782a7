#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod auth;
pub mod config;
pub mod crypto;
pub mod decompress;
pub mod error;
pub mod layout;
pub mod loader;
pub mod locate;
pub mod log;
pub mod registry;

// Image builders and mock crypto
#[cfg(any(test, feature = "testvectors"))]
pub mod testing;

pub use auth::Authenticator;
pub use config::{LoaderConfig, TrustAnchors};
pub use crypto::CryptoProvider;
pub use decompress::{DecodeError, Decompressor, NoDecompressor};
pub use error::{ContainerError, Result};
pub use layout::{signature_32, AuthType, Header, COMPONENT_NAME_START};
pub use loader::{ComponentLoader, LoadObserver, LoadStage, Loaded};
pub use locate::LocatedComponent;
pub use registry::{ContainerEntry, ContainerRegistry, SharedRegistry};

#[cfg(feature = "lz4")]
pub use decompress::Lz4Decompressor;
#[cfg(feature = "soft-crypto")]
pub use crypto::SoftCrypto;
