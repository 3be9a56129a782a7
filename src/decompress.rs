//! Decompression provider seam
//!
//! Compressed components are stored as an LZ4 block preceded by the
//! decompressed length as a little-endian `u32`. The loader only sees the
//! `Decompressor` trait; `Lz4Decompressor` is the built-in codec.

use alloc::vec::Vec;
use thiserror::Error;

use crate::error::ContainerError;

/// Length of the decompressed-size prefix in front of an LZ4 block.
pub const SIZE_PREFIX_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("decode: missing size prefix")]
    Truncated,
    #[error("decode: declared size {declared} exceeds limit {limit}")]
    TooLarge { declared: usize, limit: usize },
    #[error("decode: corrupt block")]
    Corrupt,
    #[error("decode: no codec available")]
    Unavailable,
}

impl From<DecodeError> for ContainerError {
    fn from(_: DecodeError) -> Self {
        ContainerError::DecompressFailure
    }
}

pub trait Decompressor {
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, DecodeError>;
}

impl<T: Decompressor + ?Sized> Decompressor for &T {
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, DecodeError> {
        (**self).decompress(input)
    }
}

/// Read the decompressed-size prefix.
pub fn declared_size(input: &[u8]) -> Result<usize, DecodeError> {
    let prefix = input.get(..SIZE_PREFIX_LEN).ok_or(DecodeError::Truncated)?;
    Ok(u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize)
}

/// Refuses every compressed component. For platforms that ship no codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDecompressor;

impl Decompressor for NoDecompressor {
    fn decompress(&self, _input: &[u8]) -> Result<Vec<u8>, DecodeError> {
        Err(DecodeError::Unavailable)
    }
}

#[cfg(feature = "lz4")]
pub use self::lz4::Lz4Decompressor;

#[cfg(feature = "lz4")]
mod lz4 {
    use super::*;
    use crate::config::LoaderConfig;
    use crate::log::logger::log_args;

    /// LZ4 block codec with an output cap checked before allocation.
    #[derive(Debug, Clone, Copy)]
    pub struct Lz4Decompressor {
        pub max_output: usize,
    }

    impl Lz4Decompressor {
        pub const fn new(max_output: usize) -> Self {
            Self { max_output }
        }

        pub fn from_config(config: &LoaderConfig) -> Self {
            Self::new(config.max_image_size)
        }
    }

    impl Default for Lz4Decompressor {
        fn default() -> Self {
            Self::from_config(&LoaderConfig::default())
        }
    }

    impl Decompressor for Lz4Decompressor {
        fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, DecodeError> {
            let declared = declared_size(input)?;
            if declared > self.max_output {
                return Err(DecodeError::TooLarge { declared, limit: self.max_output });
            }
            let out = lz4_flex::block::decompress(&input[SIZE_PREFIX_LEN..], declared)
                .map_err(|_| DecodeError::Corrupt)?;
            if out.len() != declared {
                return Err(DecodeError::Corrupt);
            }
            log_args(
                ::log::Level::Trace,
                "loader",
                format_args!("lz4: {} -> {} bytes", input.len(), out.len()),
            );
            Ok(out)
        }
    }
}
