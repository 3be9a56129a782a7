//! Container binary layout (packed, little-endian, bounds-checked)
//
// On-wire layout (packed, little-endian):
//   struct ContainerHeader {          // 16 bytes
//     u32 signature;                  // container 4CC, or "_SG_" for a mono-sign wrapper
//     u16 version;
//     u16 data_offset;                // start of the data region, from container base
//     u32 data_size;                  // data region length
//     u8  auth_type;                  // container-wide scheme (mono-signing only)
//     u8  image_type;
//     u8  flags;                      // bit0 = mono-signing
//     u8  count;                      // component records in the table
//   }
//   struct ComponentEntry {           // 16 bytes + hash_size
//     u32 name;
//     u32 offset;                     // relative to the data region
//     u32 size;                       // stored bytes, incl. a trailing signature
//     u8  attribute;                  // bit0 compressed, bit1 hash-decompressed, bit7 reserved
//     u8  alignment;
//     u8  auth_type;
//     u8  hash_size;
//     u8  hash_data[hash_size];
//   }
//
// Plain container: header, then the component table, then (at data_offset) the
// data region. Mono-signed container: an outer "_SG_" header whose data_offset
// points at an inner plain container of data_size bytes; the auth block (digest
// or signature over the inner container) sits right after the outer header.
//
// Nothing here trusts a field before it has been range-checked against the
// backing slice; records are walked with an explicit byte cursor.

use bitflags::bitflags;
use zerocopy::byteorder::{LittleEndian, U16, U32};
use zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned};

use crate::crypto::{HashAlgorithm, SignatureAlgorithm};
use crate::error::{ContainerError, Result};

/// `SIGNATURE_32` packing: first character in the lowest byte.
pub const fn signature_32(a: u8, b: u8, c: u8, d: u8) -> u32 {
    u32::from_le_bytes([a, b, c, d])
}

pub const CONTAINER_LIST_SIGNATURE: u32 = signature_32(b'C', b'T', b'N', b'L');
pub const CONTAINER_BOOT_SIGNATURE: u32 = signature_32(b'B', b'O', b'O', b'T');
pub const CONTAINER_MONO_SIGN_SIGNATURE: u32 = signature_32(b'_', b'S', b'G', b'_');

pub const CONTAINER_HEADER_SIZE: usize = core::mem::size_of::<RawContainerHeader>();
pub const COMPONENT_ENTRY_FIXED_SIZE: usize = core::mem::size_of::<RawComponentEntry>();
pub const CONTAINER_LIST_HEADER_SIZE: usize = core::mem::size_of::<RawContainerList>();
/// Size of one registry record in the `ContainerList` layout.
pub const CONTAINER_LIST_ENTRY_SIZE: usize = 16;

/// Cursor value meaning "start of table" for component enumeration.
pub const COMPONENT_NAME_START: u32 = 0;

bitflags! {
    /// Flags for `ContainerHeader`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ContainerFlags: u8 {
        const MONO_SIGNING = 1 << 0;
    }
}

bitflags! {
    /// Attributes for `ComponentEntry`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ComponentAttributes: u8 {
        const COMPRESSED        = 1 << 0;
        const HASH_DECOMPRESSED = 1 << 1;
        const RESERVED          = 1 << 7;
    }
}

/// Recognized authentication schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthType {
    None = 0,
    Sha256 = 1,
    Sha384 = 2,
    SigRsa2048Sha256 = 3,
    SigRsa3072Sha384 = 4,
}

impl TryFrom<u8> for AuthType {
    type Error = ContainerError;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(AuthType::None),
            1 => Ok(AuthType::Sha256),
            2 => Ok(AuthType::Sha384),
            3 => Ok(AuthType::SigRsa2048Sha256),
            4 => Ok(AuthType::SigRsa3072Sha384),
            _ => Err(ContainerError::Unsupported),
        }
    }
}

impl AuthType {
    /// Hash the scheme computes over the payload, if any.
    pub const fn hash_algorithm(self) -> Option<HashAlgorithm> {
        match self {
            AuthType::None => None,
            AuthType::Sha256 | AuthType::SigRsa2048Sha256 => Some(HashAlgorithm::Sha256),
            AuthType::Sha384 | AuthType::SigRsa3072Sha384 => Some(HashAlgorithm::Sha384),
        }
    }

    pub const fn signature_algorithm(self) -> Option<SignatureAlgorithm> {
        match self {
            AuthType::SigRsa2048Sha256 => Some(SignatureAlgorithm::Rsa2048Sha256),
            AuthType::SigRsa3072Sha384 => Some(SignatureAlgorithm::Rsa3072Sha384),
            _ => None,
        }
    }

    /// Bytes of signature trailing a signed payload (0 for non-signature schemes).
    pub const fn signature_len(self) -> usize {
        match self.signature_algorithm() {
            Some(alg) => alg.signature_len(),
            None => 0,
        }
    }

    /// Size of the auth block a mono-sign wrapper carries for this scheme:
    /// the digest for hash schemes, the signature for signature schemes.
    pub const fn auth_block_len(self) -> usize {
        match self {
            AuthType::None => 0,
            AuthType::Sha256 | AuthType::Sha384 => match self.hash_algorithm() {
                Some(h) => h.digest_len(),
                None => 0,
            },
            AuthType::SigRsa2048Sha256 | AuthType::SigRsa3072Sha384 => self.signature_len(),
        }
    }
}

/// Raw on-wire container header.
#[repr(C)]
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy)]
pub struct RawContainerHeader {
    pub signature: U32<LittleEndian>,
    pub version: U16<LittleEndian>,
    pub data_offset: U16<LittleEndian>,
    pub data_size: U32<LittleEndian>,
    pub auth_type: u8,
    pub image_type: u8,
    pub flags: u8,
    pub count: u8,
}

/// Raw fixed part of a component record; `hash_size` bytes follow it.
#[repr(C)]
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy)]
pub struct RawComponentEntry {
    pub name: U32<LittleEndian>,
    pub offset: U32<LittleEndian>,
    pub size: U32<LittleEndian>,
    pub attribute: u8,
    pub alignment: u8,
    pub auth_type: u8,
    pub hash_size: u8,
}

/// Raw `ContainerList` header; `count` 16-byte records follow it.
#[repr(C)]
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy)]
pub struct RawContainerList {
    pub signature: U32<LittleEndian>,
    pub reserved: U32<LittleEndian>,
    pub total_length: U32<LittleEndian>,
    pub count: U32<LittleEndian>,
}

/// Decoded container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub signature: u32,
    pub version: u16,
    pub data_offset: u16,
    pub data_size: u32,
    /// Raw tag; decode with `AuthType::try_from`.
    pub auth_type: u8,
    pub image_type: u8,
    pub flags: u8,
    pub count: u8,
}

impl ContainerHeader {
    /// Read the fixed header at the start of `bytes`.
    pub fn read(bytes: &[u8]) -> Result<Self> {
        let (raw, _) = LayoutVerified::<_, RawContainerHeader>::new_unaligned_from_prefix(bytes)
            .ok_or(ContainerError::InvalidFormat)?;
        Ok(ContainerHeader::from(*raw))
    }

    pub fn container_flags(&self) -> Result<ContainerFlags> {
        ContainerFlags::from_bits(self.flags).ok_or(ContainerError::InvalidFormat)
    }

    pub fn is_mono_signed(&self) -> bool {
        self.flags & ContainerFlags::MONO_SIGNING.bits() != 0
    }

    /// End of the data region relative to the container base.
    pub fn extent(&self) -> usize {
        self.data_offset as usize + self.data_size as usize
    }

    pub fn to_raw(&self) -> RawContainerHeader {
        RawContainerHeader {
            signature: U32::new(self.signature),
            version: U16::new(self.version),
            data_offset: U16::new(self.data_offset),
            data_size: U32::new(self.data_size),
            auth_type: self.auth_type,
            image_type: self.image_type,
            flags: self.flags,
            count: self.count,
        }
    }
}

impl From<RawContainerHeader> for ContainerHeader {
    fn from(raw: RawContainerHeader) -> Self {
        ContainerHeader {
            signature: raw.signature.get(),
            version: raw.version.get(),
            data_offset: raw.data_offset.get(),
            data_size: raw.data_size.get(),
            auth_type: raw.auth_type,
            image_type: raw.image_type,
            flags: raw.flags,
            count: raw.count,
        }
    }
}

/// View of one variable-length component record. `hash_data` borrows the
/// container memory; nothing is copied out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentEntry<'a> {
    pub name: u32,
    pub offset: u32,
    pub size: u32,
    pub attribute: u8,
    pub alignment: u8,
    /// Raw tag; decode with `auth()`.
    pub auth_type: u8,
    pub hash_data: &'a [u8],
    /// Byte offset of this record from the start of the table.
    pub record_offset: usize,
}

impl<'a> ComponentEntry<'a> {
    pub fn hash_size(&self) -> usize {
        self.hash_data.len()
    }

    pub fn attributes(&self) -> ComponentAttributes {
        ComponentAttributes::from_bits_truncate(self.attribute)
    }

    pub fn is_compressed(&self) -> bool {
        self.attributes().contains(ComponentAttributes::COMPRESSED)
    }

    /// Digest covers the decompressed image rather than the stored bytes.
    pub fn hashes_decompressed(&self) -> bool {
        self.is_compressed() && self.attributes().contains(ComponentAttributes::HASH_DECOMPRESSED)
    }

    pub fn auth(&self) -> Result<AuthType> {
        AuthType::try_from(self.auth_type)
    }

    /// Total bytes the record occupies in the table.
    pub fn record_len(&self) -> usize {
        COMPONENT_ENTRY_FIXED_SIZE + self.hash_data.len()
    }

    /// Split the stored region into payload and trailing signature (empty for
    /// non-signature schemes).
    pub fn split_region<'r>(&self, region: &'r [u8]) -> Result<(&'r [u8], &'r [u8])> {
        let sig_len = self.auth()?.signature_len();
        if region.len() < sig_len {
            return Err(ContainerError::InvalidFormat);
        }
        Ok(region.split_at(region.len() - sig_len))
    }
}

/// Sequential cursor over a component table. Records are variable length, so
/// the only way to reach record `n` is to walk records `0..n`.
#[derive(Debug, Clone)]
pub struct ComponentTable<'a> {
    table: &'a [u8],
    cursor: usize,
    remaining: u8,
}

impl<'a> ComponentTable<'a> {
    pub fn new(table: &'a [u8], count: u8) -> Self {
        Self { table, cursor: 0, remaining: count }
    }

    /// Current byte offset from the start of the table.
    pub fn position(&self) -> usize {
        self.cursor
    }

    fn read_next(&mut self) -> Result<ComponentEntry<'a>> {
        let rest = self.table.get(self.cursor..).ok_or(ContainerError::InvalidFormat)?;
        let (raw, tail) = LayoutVerified::<_, RawComponentEntry>::new_unaligned_from_prefix(rest)
            .ok_or(ContainerError::InvalidFormat)?;
        let hash_size = raw.hash_size as usize;
        let hash_data = tail.get(..hash_size).ok_or(ContainerError::InvalidFormat)?;
        let entry = ComponentEntry {
            name: raw.name.get(),
            offset: raw.offset.get(),
            size: raw.size.get(),
            attribute: raw.attribute,
            alignment: raw.alignment,
            auth_type: raw.auth_type,
            hash_data,
            record_offset: self.cursor,
        };
        self.cursor += entry.record_len();
        Ok(entry)
    }
}

impl<'a> Iterator for ComponentTable<'a> {
    type Item = Result<ComponentEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        match self.read_next() {
            Ok(e) => {
                self.remaining -= 1;
                Some(Ok(e))
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining as usize))
    }
}

impl<'a> core::iter::FusedIterator for ComponentTable<'a> {}

/// A validated plain container (header + table + data region).
#[derive(Debug, Clone, Copy)]
pub struct ContainerBody<'a> {
    pub header: ContainerHeader,
    bytes: &'a [u8],
}

impl<'a> ContainerBody<'a> {
    /// Validate a plain container occupying `bytes`.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let header = ContainerHeader::read(bytes)?;
        if header.signature == 0
            || header.signature == CONTAINER_LIST_SIGNATURE
            || header.signature == CONTAINER_MONO_SIGN_SIGNATURE
        {
            return Err(ContainerError::InvalidFormat);
        }
        let flags = header.container_flags()?;
        if flags.contains(ContainerFlags::MONO_SIGNING) {
            return Err(ContainerError::InvalidFormat);
        }
        let data_offset = header.data_offset as usize;
        if data_offset < CONTAINER_HEADER_SIZE || header.extent() > bytes.len() {
            return Err(ContainerError::InvalidFormat);
        }
        let body = ContainerBody { header, bytes };
        body.validate_table()?;
        Ok(body)
    }

    /// Rebuild a body from a header that already passed `parse` over the same
    /// bytes.
    pub(crate) fn from_validated(header: ContainerHeader, bytes: &'a [u8]) -> Self {
        ContainerBody { header, bytes }
    }

    fn validate_table(&self) -> Result<()> {
        let data_size = self.header.data_size as u64;
        let mut table = self.table();
        let mut seen = 0usize;
        while let Some(entry) = table.next() {
            let entry = entry?;
            if entry.name == COMPONENT_NAME_START {
                return Err(ContainerError::InvalidFormat);
            }
            if entry.offset as u64 + entry.size as u64 > data_size {
                return Err(ContainerError::InvalidFormat);
            }
            check_auth_data(&entry)?;
            // Names are unique within one container.
            let mut earlier = self.table().take(seen);
            if earlier.any(|e| matches!(e, Ok(e) if e.name == entry.name)) {
                return Err(ContainerError::InvalidFormat);
            }
            seen += 1;
        }
        if seen != self.header.count as usize {
            return Err(ContainerError::InvalidFormat);
        }
        Ok(())
    }

    /// Component table bytes: from the end of the header up to the data region.
    pub fn table_bytes(&self) -> &'a [u8] {
        self.bytes
            .get(CONTAINER_HEADER_SIZE..self.header.data_offset as usize)
            .unwrap_or(&[])
    }

    pub fn table(&self) -> ComponentTable<'a> {
        ComponentTable::new(self.table_bytes(), self.header.count)
    }

    pub fn data(&self) -> &'a [u8] {
        self.bytes
            .get(self.header.data_offset as usize..self.header.extent())
            .unwrap_or(&[])
    }

    /// Everything the container declares: header, table and data.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes.get(..self.header.extent()).unwrap_or(&[])
    }

    /// Stored bytes of `entry`, including any trailing signature.
    pub fn component_region(&self, entry: &ComponentEntry<'_>) -> Result<&'a [u8]> {
        let start = entry.offset as usize;
        let end = start
            .checked_add(entry.size as usize)
            .ok_or(ContainerError::InvalidFormat)?;
        self.data().get(start..end).ok_or(ContainerError::InvalidFormat)
    }
}

/// Auth data must match the record's scheme: hash schemes carry exactly one
/// digest, signature schemes an optional digest plus a trailing signature.
/// Unknown tags are left for the locator to report as `Unsupported`.
fn check_auth_data(entry: &ComponentEntry<'_>) -> Result<()> {
    let Ok(auth) = entry.auth() else {
        return Ok(());
    };
    let digest_len = auth.hash_algorithm().map_or(0, |h| h.digest_len());
    let hash_ok = match auth {
        AuthType::None => true,
        AuthType::Sha256 | AuthType::Sha384 => entry.hash_size() == digest_len,
        AuthType::SigRsa2048Sha256 | AuthType::SigRsa3072Sha384 => {
            entry.hash_size() == 0 || entry.hash_size() == digest_len
        }
    };
    if !hash_ok || (entry.size as usize) < auth.signature_len() {
        return Err(ContainerError::InvalidFormat);
    }
    Ok(())
}

/// Container header as resolved at lookup time. The mono-sign indirection is
/// handled here once; everything downstream works on the inner body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header {
    Direct(ContainerHeader),
    MonoSigned {
        wrapper_offset: usize,
        wrapper: ContainerHeader,
        inner: ContainerHeader,
    },
}

impl Header {
    /// Signature the container registers under.
    pub fn signature(&self) -> u32 {
        self.inner().signature
    }

    /// The plain container header (inner one for mono-signed images).
    pub fn inner(&self) -> &ContainerHeader {
        match self {
            Header::Direct(h) => h,
            Header::MonoSigned { inner, .. } => inner,
        }
    }

    /// Offset of the plain container from the image base.
    pub fn body_offset(&self) -> usize {
        match self {
            Header::Direct(_) => 0,
            Header::MonoSigned { wrapper_offset, .. } => *wrapper_offset,
        }
    }

    pub fn is_mono_signed(&self) -> bool {
        matches!(self, Header::MonoSigned { .. })
    }

    /// Bytes occupied by the whole image, wrapper included.
    pub fn extent(&self) -> usize {
        match self {
            Header::Direct(h) => h.extent(),
            Header::MonoSigned { wrapper, .. } => wrapper.extent(),
        }
    }
}

/// Mono-sign wrapper resolved against its image.
#[derive(Debug, Clone, Copy)]
pub struct MonoSignRegion<'a> {
    pub auth_type: AuthType,
    /// Digest (hash schemes) or signature (signature schemes).
    pub auth_block: &'a [u8],
    /// The signed inner container bytes.
    pub signed: &'a [u8],
}

/// Parsed container image.
#[derive(Debug, Clone, Copy)]
pub struct ParsedContainer<'a> {
    pub header: Header,
    pub body: ContainerBody<'a>,
    pub mono: Option<MonoSignRegion<'a>>,
}

/// Resolve `image` into its header variant and plain body, validating the
/// full structure.
pub fn parse_container(image: &[u8]) -> Result<ParsedContainer<'_>> {
    let outer = ContainerHeader::read(image)?;
    if outer.signature != CONTAINER_MONO_SIGN_SIGNATURE {
        let body = ContainerBody::parse(image)?;
        return Ok(ParsedContainer { header: Header::Direct(body.header), body, mono: None });
    }

    let flags = outer.container_flags()?;
    if !flags.contains(ContainerFlags::MONO_SIGNING) || outer.count != 0 {
        return Err(ContainerError::InvalidFormat);
    }
    let auth_type = AuthType::try_from(outer.auth_type)?;
    let wrapper_offset = outer.data_offset as usize;
    let auth_end = CONTAINER_HEADER_SIZE + auth_type.auth_block_len();
    if wrapper_offset < auth_end || outer.extent() > image.len() {
        return Err(ContainerError::InvalidFormat);
    }
    let auth_block = image
        .get(CONTAINER_HEADER_SIZE..auth_end)
        .ok_or(ContainerError::InvalidFormat)?;
    let signed = image
        .get(wrapper_offset..outer.extent())
        .ok_or(ContainerError::InvalidFormat)?;
    let body = ContainerBody::parse(signed)?;
    Ok(ParsedContainer {
        header: Header::MonoSigned { wrapper_offset, wrapper: outer, inner: body.header },
        body,
        mono: Some(MonoSignRegion { auth_type, auth_block, signed }),
    })
}

/// `ContainerList` header as handed to later boot stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerListHeader {
    pub signature: u32,
    pub total_length: u32,
    pub count: u32,
}

impl ContainerListHeader {
    pub fn for_count(count: usize) -> Self {
        let total = CONTAINER_LIST_HEADER_SIZE + count * CONTAINER_LIST_ENTRY_SIZE;
        Self {
            signature: CONTAINER_LIST_SIGNATURE,
            total_length: total as u32,
            count: count as u32,
        }
    }

    pub fn to_raw(&self) -> RawContainerList {
        RawContainerList {
            signature: U32::new(self.signature),
            reserved: U32::new(0),
            total_length: U32::new(self.total_length),
            count: U32::new(self.count),
        }
    }

    pub fn read(bytes: &[u8]) -> Result<Self> {
        let (raw, _) = LayoutVerified::<_, RawContainerList>::new_unaligned_from_prefix(bytes)
            .ok_or(ContainerError::InvalidFormat)?;
        if raw.signature.get() != CONTAINER_LIST_SIGNATURE {
            return Err(ContainerError::InvalidFormat);
        }
        Ok(Self {
            signature: raw.signature.get(),
            total_length: raw.total_length.get(),
            count: raw.count.get(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn header(sig: u32, data_offset: u16, data_size: u32, count: u8) -> ContainerHeader {
        ContainerHeader {
            signature: sig,
            version: 1,
            data_offset,
            data_size,
            auth_type: 0,
            image_type: 0,
            flags: 0,
            count,
        }
    }

    fn record(name: u32, offset: u32, size: u32, auth: u8, hash: &[u8]) -> Vec<u8> {
        let raw = RawComponentEntry {
            name: U32::new(name),
            offset: U32::new(offset),
            size: U32::new(size),
            attribute: 0,
            alignment: 0,
            auth_type: auth,
            hash_size: hash.len() as u8,
        };
        let mut v = raw.as_bytes().to_vec();
        v.extend_from_slice(hash);
        v
    }

    #[test]
    fn raw_sizes() {
        assert_eq!(CONTAINER_HEADER_SIZE, 16);
        assert_eq!(COMPONENT_ENTRY_FIXED_SIZE, 16);
        assert_eq!(CONTAINER_LIST_HEADER_SIZE, 16);
    }

    #[test]
    fn signature_packing() {
        assert_eq!(CONTAINER_BOOT_SIGNATURE.to_le_bytes(), *b"BOOT");
        assert_eq!(CONTAINER_MONO_SIGN_SIGNATURE.to_le_bytes(), *b"_SG_");
    }

    #[test]
    fn header_roundtrip_fields() {
        let h = header(CONTAINER_BOOT_SIGNATURE, 64, 100, 2);
        let raw = h.to_raw();
        let back = ContainerHeader::read(raw.as_bytes()).unwrap();
        assert_eq!(back, h);
        assert_eq!(back.extent(), 164);
    }

    #[test]
    fn truncated_header_rejected() {
        assert_eq!(ContainerHeader::read(&[0u8; 15]), Err(ContainerError::InvalidFormat));
    }

    #[test]
    fn table_walk_skips_hash_bytes() {
        let mut table = record(0x41, 0, 4, 1, &[0xAA; 32]);
        table.extend(record(0x42, 4, 2, 0, &[]));
        table.extend(record(0x43, 6, 1, 2, &[0xBB; 48]));
        let entries: Vec<_> = ComponentTable::new(&table, 3).map(|e| e.unwrap()).collect();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].name, 0x42);
        assert_eq!(entries[1].record_offset, 16 + 32);
        assert_eq!(entries[2].record_offset, 16 + 32 + 16);
        assert_eq!(entries[2].hash_data, &[0xBB; 48]);
    }

    #[test]
    fn table_walk_stops_on_truncation() {
        let mut table = record(0x41, 0, 4, 1, &[0xAA; 32]);
        table.truncate(40);
        let mut it = ComponentTable::new(&table, 2);
        assert_eq!(it.next(), Some(Err(ContainerError::InvalidFormat)));
        assert_eq!(it.next(), None);
    }

    fn plain_image(records: &[Vec<u8>], data: &[u8], count: u8) -> Vec<u8> {
        let table_len: usize = records.iter().map(|r| r.len()).sum();
        let data_offset = (CONTAINER_HEADER_SIZE + table_len) as u16;
        let h = header(CONTAINER_BOOT_SIGNATURE, data_offset, data.len() as u32, count);
        let mut img = h.to_raw().as_bytes().to_vec();
        for r in records {
            img.extend_from_slice(r);
        }
        img.extend_from_slice(data);
        img
    }

    #[test]
    fn plain_body_parses() {
        let img = plain_image(&[record(0x41, 0, 3, 0, &[]), record(0x42, 3, 2, 0, &[])], b"abcde", 2);
        let parsed = parse_container(&img).unwrap();
        assert!(!parsed.header.is_mono_signed());
        assert_eq!(parsed.header.signature(), CONTAINER_BOOT_SIGNATURE);
        let b = parsed.body.table().nth(1).unwrap().unwrap();
        assert_eq!(parsed.body.component_region(&b).unwrap(), b"de");
    }

    #[test]
    fn count_mismatch_rejected() {
        let img = plain_image(&[record(0x41, 0, 3, 0, &[])], b"abc", 2);
        assert_eq!(parse_container(&img).err(), Some(ContainerError::InvalidFormat));
    }

    #[test]
    fn payload_outside_data_rejected() {
        let img = plain_image(&[record(0x41, 2, 3, 0, &[])], b"abc", 1);
        assert_eq!(parse_container(&img).err(), Some(ContainerError::InvalidFormat));
    }

    #[test]
    fn duplicate_names_rejected() {
        let img = plain_image(&[record(0x41, 0, 1, 0, &[]), record(0x41, 1, 1, 0, &[])], b"ab", 2);
        assert_eq!(parse_container(&img).err(), Some(ContainerError::InvalidFormat));
    }

    #[test]
    fn extent_overflow_rejected() {
        let mut img = plain_image(&[record(0x41, 0, 1, 0, &[])], b"a", 1);
        img.pop();
        assert_eq!(parse_container(&img).err(), Some(ContainerError::InvalidFormat));
    }

    #[test]
    fn hash_size_must_match_scheme() {
        // SHA-256 without its digest.
        let img = plain_image(&[record(0x41, 0, 1, 1, &[])], b"a", 1);
        assert_eq!(parse_container(&img).err(), Some(ContainerError::InvalidFormat));
        // SHA-384 record carrying a SHA-256-sized digest.
        let img = plain_image(&[record(0x41, 0, 1, 2, &[0u8; 32])], b"a", 1);
        assert_eq!(parse_container(&img).err(), Some(ContainerError::InvalidFormat));
        // Signature scheme: digest optional, but only at the right length.
        let data = [0u8; 256];
        let img = plain_image(&[record(0x41, 0, 256, 3, &[])], &data, 1);
        assert!(parse_container(&img).is_ok());
        let img = plain_image(&[record(0x41, 0, 256, 3, &[0u8; 32])], &data, 1);
        assert!(parse_container(&img).is_ok());
        let img = plain_image(&[record(0x41, 0, 256, 3, &[0u8; 48])], &data, 1);
        assert_eq!(parse_container(&img).err(), Some(ContainerError::InvalidFormat));
    }

    #[test]
    fn signed_record_must_hold_its_signature() {
        let data = [0u8; 255];
        let img = plain_image(&[record(0x41, 0, 255, 3, &[])], &data, 1);
        assert_eq!(parse_container(&img).err(), Some(ContainerError::InvalidFormat));
    }

    #[test]
    fn unknown_flags_rejected() {
        let mut img = plain_image(&[record(0x41, 0, 1, 0, &[])], b"a", 1);
        img[14] = 0x80;
        assert_eq!(parse_container(&img).err(), Some(ContainerError::InvalidFormat));
    }

    #[test]
    fn reserved_attribute_is_ignored() {
        let mut r = record(0x41, 0, 1, 0, &[]);
        r[12] = ComponentAttributes::RESERVED.bits();
        let img = plain_image(&[r], b"a", 1);
        let parsed = parse_container(&img).unwrap();
        let e = parsed.body.table().next().unwrap().unwrap();
        assert!(!e.is_compressed());
        assert!(e.attributes().contains(ComponentAttributes::RESERVED));
    }

    #[test]
    fn unknown_auth_type_is_unsupported() {
        let r = record(0x41, 0, 1, 9, &[]);
        let img = plain_image(&[r], b"a", 1);
        let parsed = parse_container(&img).unwrap();
        let e = parsed.body.table().next().unwrap().unwrap();
        assert_eq!(e.auth(), Err(ContainerError::Unsupported));
    }

    #[test]
    fn mono_wrapper_resolves_inner() {
        let inner = plain_image(&[record(0x41, 0, 3, 0, &[])], b"abc", 1);
        let digest = [0x11u8; 32];
        let wrapper_offset = CONTAINER_HEADER_SIZE + digest.len();
        let outer = ContainerHeader {
            signature: CONTAINER_MONO_SIGN_SIGNATURE,
            version: 1,
            data_offset: wrapper_offset as u16,
            data_size: inner.len() as u32,
            auth_type: AuthType::Sha256 as u8,
            image_type: 0,
            flags: ContainerFlags::MONO_SIGNING.bits(),
            count: 0,
        };
        let mut img = outer.to_raw().as_bytes().to_vec();
        img.extend_from_slice(&digest);
        img.extend_from_slice(&inner);

        let parsed = parse_container(&img).unwrap();
        assert!(parsed.header.is_mono_signed());
        assert_eq!(parsed.header.signature(), CONTAINER_BOOT_SIGNATURE);
        assert_eq!(parsed.header.body_offset(), wrapper_offset);
        let mono = parsed.mono.unwrap();
        assert_eq!(mono.auth_block, &digest);
        assert_eq!(mono.signed, &inner[..]);
    }

    #[test]
    fn mono_marker_without_flag_rejected() {
        let mut h = header(CONTAINER_MONO_SIGN_SIGNATURE, 16, 0, 0);
        h.flags = 0;
        let img = h.to_raw().as_bytes().to_vec();
        assert_eq!(parse_container(&img).err(), Some(ContainerError::InvalidFormat));
    }

    #[test]
    fn list_header_layout() {
        let h = ContainerListHeader::for_count(3);
        assert_eq!(h.total_length, 16 + 3 * 16);
        let raw = h.to_raw();
        assert_eq!(&raw.as_bytes()[0..4], b"CTNL");
        assert_eq!(ContainerListHeader::read(raw.as_bytes()).unwrap(), h);
    }
}
