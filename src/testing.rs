//! Test vectors for the container loader
//!
//! Builders for plain and mono-signed container images, plus `MockCrypto`: a
//! provider with real SHA-2 digests and a keyed, deterministic stand-in for
//! RSA signatures so signed images can be produced without key generation.
//! Compiled for this crate's own tests and with the opt-in `testvectors`
//! feature; never part of a default build.

#![allow(dead_code)]

use alloc::vec::Vec;
use sha2::{Digest as _, Sha256, Sha384};
use zerocopy::byteorder::U32;
use zerocopy::AsBytes;

use crate::config::TrustAnchors;
use crate::crypto::{ct_eq, CryptoProvider, Digest, HashAlgorithm, SignatureAlgorithm};
use crate::layout::{
    AuthType, ComponentAttributes, ContainerFlags, ContainerHeader, RawComponentEntry,
    CONTAINER_HEADER_SIZE, CONTAINER_MONO_SIGN_SIGNATURE,
};

const fn mock_key<const L: usize>(seed: u8) -> [u8; L] {
    let mut key = [0u8; L];
    let mut i = 0;
    while i < L {
        key[i] = seed ^ (i as u8).wrapping_mul(29).wrapping_add((i >> 8) as u8);
        i += 1;
    }
    key
}

/// Mock trust anchors, same encoded lengths as real RSA keys.
pub static MOCK_RSA2048_KEY: [u8; 260] = mock_key::<260>(0x5C);
pub static MOCK_RSA3072_KEY: [u8; 388] = mock_key::<388>(0xA3);

pub fn mock_anchors() -> TrustAnchors<'static> {
    TrustAnchors { rsa2048: Some(&MOCK_RSA2048_KEY), rsa3072: Some(&MOCK_RSA3072_KEY) }
}

/// Deterministic "signature" of `digest` under `key`.
pub fn mock_sign(digest: &[u8], alg: SignatureAlgorithm, key: &[u8]) -> Vec<u8> {
    (0..alg.signature_len())
        .map(|i| {
            let d = if digest.is_empty() { 0 } else { digest[i % digest.len()] };
            let k = if key.is_empty() { 0 } else { key[i % key.len()] };
            d ^ k ^ i as u8
        })
        .collect()
}

/// SHA-2 from `sha2`; signatures valid iff they match `mock_sign`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockCrypto;

impl CryptoProvider for MockCrypto {
    fn hash(&self, alg: HashAlgorithm, data: &[u8]) -> Digest {
        let out = match alg {
            HashAlgorithm::Sha256 => Digest::from_slice(Sha256::digest(data).as_slice()),
            HashAlgorithm::Sha384 => Digest::from_slice(Sha384::digest(data).as_slice()),
        };
        out.unwrap_or_else(|| unreachable!("sha2 digest wider than MAX_DIGEST_LEN"))
    }

    fn verify_signature(
        &self,
        digest: &[u8],
        alg: SignatureAlgorithm,
        signature: &[u8],
        public_key: &[u8],
    ) -> bool {
        digest.len() == alg.hash().digest_len()
            && public_key.len() == alg.public_key_len()
            && ct_eq(signature, &mock_sign(digest, alg, public_key))
    }
}

fn mock_key_for(alg: SignatureAlgorithm) -> &'static [u8] {
    match alg {
        SignatureAlgorithm::Rsa2048Sha256 => &MOCK_RSA2048_KEY,
        SignatureAlgorithm::Rsa3072Sha384 => &MOCK_RSA3072_KEY,
    }
}

/// Auth material for `target` under `auth`: (hash_data, trailing signature).
fn seal(target: &[u8], auth: AuthType, with_digest: bool) -> (Vec<u8>, Vec<u8>) {
    let Some(hash) = auth.hash_algorithm() else {
        return (Vec::new(), Vec::new());
    };
    let digest = MockCrypto.hash(hash, target);
    match auth.signature_algorithm() {
        None => (digest.as_slice().to_vec(), Vec::new()),
        Some(alg) => {
            let sig = mock_sign(digest.as_slice(), alg, mock_key_for(alg));
            let hash_data = if with_digest { digest.as_slice().to_vec() } else { Vec::new() };
            (hash_data, sig)
        }
    }
}

/// One component record plus its stored bytes.
#[derive(Debug, Clone)]
pub struct ComponentSpec {
    pub name: u32,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
    pub attribute: u8,
    pub alignment: u8,
    pub auth_type: u8,
    pub hash_data: Vec<u8>,
}

impl ComponentSpec {
    /// Record with arbitrary fields; nothing is computed.
    pub fn raw(name: u32, payload: &[u8], auth_type: u8, hash_data: &[u8]) -> Self {
        Self {
            name,
            payload: payload.to_vec(),
            signature: Vec::new(),
            attribute: 0,
            alignment: 0,
            auth_type,
            hash_data: hash_data.to_vec(),
        }
    }

    fn stored(&self) -> Vec<u8> {
        let mut v = self.payload.clone();
        v.extend_from_slice(&self.signature);
        v
    }
}

/// Builds a plain container: header, table, data region.
#[derive(Debug, Clone)]
pub struct ContainerBuilder {
    signature: u32,
    version: u16,
    image_type: u8,
    components: Vec<ComponentSpec>,
}

impl ContainerBuilder {
    pub fn new(signature: u32) -> Self {
        Self { signature, version: 1, image_type: 0, components: Vec::new() }
    }

    pub fn image_type(mut self, image_type: u8) -> Self {
        self.image_type = image_type;
        self
    }

    /// Component authenticated over `payload` with `auth`.
    pub fn component(self, name: u32, payload: &[u8], auth: AuthType) -> Self {
        self.sealed(name, payload, payload, auth, 0, false)
    }

    /// Signed component that also carries the payload digest in `hash_data`.
    pub fn signed_component_with_digest(self, name: u32, payload: &[u8], auth: AuthType) -> Self {
        self.sealed(name, payload, payload, auth, 0, true)
    }

    /// LZ4-compressed component. `hash_decompressed` selects whether the
    /// digest covers the decompressed image or the stored block.
    #[cfg(feature = "lz4")]
    pub fn compressed_component(self, name: u32, image: &[u8], auth: AuthType, hash_decompressed: bool) -> Self {
        let stored = lz4_flex::block::compress_prepend_size(image);
        let mut attribute = ComponentAttributes::COMPRESSED;
        if hash_decompressed {
            attribute |= ComponentAttributes::HASH_DECOMPRESSED;
        }
        let target = if hash_decompressed { image } else { &stored[..] };
        self.sealed(name, &stored, target, auth, attribute.bits(), false)
    }

    /// Compressed component without a codec: the stored block is the image
    /// behind a size prefix, which only an LZ4 decoder would accept.
    #[cfg(not(feature = "lz4"))]
    pub fn compressed_component(self, name: u32, image: &[u8], auth: AuthType, hash_decompressed: bool) -> Self {
        let mut stored = (image.len() as u32).to_le_bytes().to_vec();
        stored.extend_from_slice(image);
        let mut attribute = ComponentAttributes::COMPRESSED;
        if hash_decompressed {
            attribute |= ComponentAttributes::HASH_DECOMPRESSED;
        }
        let target = if hash_decompressed { image } else { &stored[..] };
        self.sealed(name, &stored, target, auth, attribute.bits(), false)
    }

    fn sealed(
        mut self,
        name: u32,
        payload: &[u8],
        target: &[u8],
        auth: AuthType,
        attribute: u8,
        with_digest: bool,
    ) -> Self {
        let (hash_data, signature) = seal(target, auth, with_digest);
        self.components.push(ComponentSpec {
            name,
            payload: payload.to_vec(),
            signature,
            attribute,
            alignment: 0,
            auth_type: auth as u8,
            hash_data,
        });
        self
    }

    pub fn raw_component(mut self, spec: ComponentSpec) -> Self {
        self.components.push(spec);
        self
    }

    /// Append `!` to a component's payload after its auth data was computed.
    pub fn tamper_payload(mut self, name: u32) -> Self {
        if let Some(c) = self.components.iter_mut().find(|c| c.name == name) {
            c.payload.push(b'!');
        }
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut table = Vec::new();
        let mut data = Vec::new();
        for c in &self.components {
            let stored = c.stored();
            let raw = RawComponentEntry {
                name: U32::new(c.name),
                offset: U32::new(data.len() as u32),
                size: U32::new(stored.len() as u32),
                attribute: c.attribute,
                alignment: c.alignment,
                auth_type: c.auth_type,
                hash_size: c.hash_data.len() as u8,
            };
            table.extend_from_slice(raw.as_bytes());
            table.extend_from_slice(&c.hash_data);
            data.extend_from_slice(&stored);
        }
        let data_offset = CONTAINER_HEADER_SIZE + table.len();
        assert!(data_offset <= u16::MAX as usize, "component table too large");

        let header = ContainerHeader {
            signature: self.signature,
            version: self.version,
            data_offset: data_offset as u16,
            data_size: data.len() as u32,
            auth_type: AuthType::None as u8,
            image_type: self.image_type,
            flags: 0,
            count: self.components.len() as u8,
        };
        let mut image = header.to_raw().as_bytes().to_vec();
        image.extend_from_slice(&table);
        image.extend_from_slice(&data);
        image
    }
}

/// Wrap a plain container in a mono-sign wrapper authenticated with `auth`.
pub fn mono_sign(inner: &[u8], auth: AuthType) -> Vec<u8> {
    let auth_block = match auth.signature_algorithm() {
        Some(_) => seal(inner, auth, false).1,
        None => seal(inner, auth, false).0,
    };
    let wrapper_offset = CONTAINER_HEADER_SIZE + auth_block.len();
    let outer = ContainerHeader {
        signature: CONTAINER_MONO_SIGN_SIGNATURE,
        version: 1,
        data_offset: wrapper_offset as u16,
        data_size: inner.len() as u32,
        auth_type: auth as u8,
        image_type: 0,
        flags: ContainerFlags::MONO_SIGNING.bits(),
        count: 0,
    };
    let mut image = outer.to_raw().as_bytes().to_vec();
    image.extend_from_slice(&auth_block);
    image.extend_from_slice(inner);
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{parse_container, signature_32};

    #[test]
    fn mock_signature_is_keyed() {
        let d = MockCrypto.hash(HashAlgorithm::Sha256, b"x");
        let alg = SignatureAlgorithm::Rsa2048Sha256;
        let sig = mock_sign(d.as_slice(), alg, &MOCK_RSA2048_KEY);
        assert!(MockCrypto.verify_signature(d.as_slice(), alg, &sig, &MOCK_RSA2048_KEY));
        let mut other = MOCK_RSA2048_KEY;
        other[0] ^= 1;
        assert!(!MockCrypto.verify_signature(d.as_slice(), alg, &sig, &other));
    }

    #[test]
    fn built_image_parses() {
        let img = ContainerBuilder::new(signature_32(b'T', b'E', b'S', b'T'))
            .component(1, b"one", AuthType::Sha384)
            .signed_component_with_digest(2, b"two", AuthType::SigRsa3072Sha384)
            .build();
        let parsed = parse_container(&img).unwrap();
        let entries: Vec<_> = parsed.body.table().map(|e| e.unwrap()).collect();
        assert_eq!(entries[0].hash_size(), 48);
        assert_eq!(entries[1].hash_size(), 48);
        assert_eq!(entries[1].size as usize, 3 + 384);
    }

    #[test]
    fn mono_wrapper_parses() {
        let inner = ContainerBuilder::new(signature_32(b'T', b'E', b'S', b'T'))
            .component(1, b"one", AuthType::None)
            .build();
        let img = mono_sign(&inner, AuthType::Sha256);
        let parsed = parse_container(&img).unwrap();
        assert_eq!(parsed.mono.unwrap().auth_block.len(), 32);
        assert_eq!(parsed.mono.unwrap().signed, &inner[..]);
    }
}
