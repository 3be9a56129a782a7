//! Component locator
//!
//! Resolves `(container signature, component name)` to the container entry
//! and the component record. Every lookup re-scans the registry and walks the
//! component table from the start, so no cursor survives between calls and a
//! caller may re-enter the locator from a load callback.

use crate::error::{ContainerError, Result};
use crate::layout::{AuthType, ComponentEntry, ComponentTable, COMPONENT_NAME_START};
use crate::log::logger::log_args;
use crate::registry::{ContainerEntry, ContainerRegistry};

/// A located component. `payload` excludes any trailing signature, which is
/// in `signature`.
#[derive(Debug, Clone, Copy)]
pub struct LocatedComponent<'a> {
    pub container: ContainerEntry<'a>,
    pub component: ComponentEntry<'a>,
    pub payload: &'a [u8],
    pub signature: &'a [u8],
}

impl<'a> LocatedComponent<'a> {
    /// True when the container's mono-signature already vouches for the
    /// component and its own auth tag is advisory.
    pub fn covered_by_container(&self) -> bool {
        self.container.is_mono_signed()
    }

    /// Scheme that decides trust for this component.
    pub fn effective_auth(&self) -> Result<AuthType> {
        if self.covered_by_container() {
            Ok(AuthType::None)
        } else {
            self.component.auth()
        }
    }
}

impl<'a, const N: usize> ContainerRegistry<'a, N> {
    /// Find the container entry and component record for `name`.
    ///
    /// Fails `Unsupported` when the container's or the component's auth tag
    /// is outside the recognized range; this runs before any crypto.
    pub fn locate_component_entry(
        &self,
        container_signature: u32,
        component_name: u32,
    ) -> Result<LocatedComponent<'a>> {
        let container = *self.find(container_signature)?;
        let body = container.body()?;
        AuthType::try_from(body.header.auth_type)?;

        let component = find_in_table(body.table(), component_name)?;
        component.auth()?;

        let region = body.component_region(&component)?;
        let (payload, signature) = component.split_region(region)?;
        log_args(
            ::log::Level::Trace,
            "locate",
            format_args!(
                "{:08x}/{:08x} at +{:#x}, {} bytes",
                container_signature,
                component_name,
                component.offset,
                payload.len()
            ),
        );
        Ok(LocatedComponent { container, component, payload, signature })
    }

    /// Address-only lookup: the component's stored bytes, unauthenticated.
    pub fn locate_component(&self, container_signature: u32, component_name: u32) -> Result<&'a [u8]> {
        Ok(self.locate_component_entry(container_signature, component_name)?.payload)
    }

    /// Component names of a container in table order.
    pub fn components(&self, container_signature: u32) -> Result<ComponentNames<'a>> {
        let body = self.find(container_signature)?.body()?;
        Ok(ComponentNames { table: body.table() })
    }

    /// Stateless enumeration. `*name == COMPONENT_NAME_START` yields the
    /// first component; otherwise `*name` is replaced by the component after
    /// it. `NotFound` at the end of the table or for an unknown cursor name.
    pub fn get_next_available_component(
        &self,
        container_signature: u32,
        name: Option<&mut u32>,
    ) -> Result<()> {
        let name = name.ok_or(ContainerError::InvalidArgument)?;
        let body = self.find(container_signature)?.body()?;
        let mut table = body.table();

        if *name != COMPONENT_NAME_START {
            find_in_table(table.by_ref(), *name)?;
        }
        match table.next() {
            Some(next) => {
                *name = next?.name;
                Ok(())
            }
            None => Err(ContainerError::NotFound),
        }
    }
}

fn find_in_table<'a>(table: impl Iterator<Item = Result<ComponentEntry<'a>>>, name: u32) -> Result<ComponentEntry<'a>> {
    for entry in table {
        let entry = entry?;
        if entry.name == name {
            return Ok(entry);
        }
    }
    Err(ContainerError::NotFound)
}

/// Iterator over component names.
pub struct ComponentNames<'a> {
    table: ComponentTable<'a>,
}

impl<'a> Iterator for ComponentNames<'a> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        // Registered tables were fully validated; a read error ends the walk.
        self.table.next()?.ok().map(|e| e.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Authenticator;
    use crate::config::LoaderConfig;
    use crate::layout::{signature_32, COMPONENT_ENTRY_FIXED_SIZE};
    use crate::testing::{mock_anchors, mono_sign, ContainerBuilder, ComponentSpec, MockCrypto};
    use alloc::vec;
    use alloc::vec::Vec;

    const BOOT: u32 = signature_32(b'B', b'O', b'O', b'T');
    const CMPA: u32 = signature_32(b'C', b'M', b'P', b'A');
    const CMPB: u32 = signature_32(b'C', b'M', b'P', b'B');
    const CMPC: u32 = signature_32(b'C', b'M', b'P', b'C');

    fn registry<'a>(images: &[&'a [u8]]) -> ContainerRegistry<'a, 4> {
        let auth = Authenticator::new(MockCrypto, mock_anchors());
        let mut reg = ContainerRegistry::new();
        reg.init(&LoaderConfig::default()).unwrap();
        for &img in images {
            reg.register_container(img, &auth).unwrap();
        }
        reg
    }

    #[test]
    fn variable_length_walk_finds_second() {
        let a = vec![0xA5u8; 100];
        let b = vec![0x5Au8; 50];
        let img = ContainerBuilder::new(BOOT)
            .component(CMPA, &a, AuthType::Sha256)
            .component(CMPB, &b, AuthType::Sha256)
            .build();
        let reg = registry(&[&img[..]]);
        let hit = reg.locate_component_entry(BOOT, CMPB).unwrap();
        assert_eq!(hit.component.name, CMPB);
        assert_eq!(hit.component.offset, 100);
        assert_eq!(hit.component.size, 50);
        assert_eq!(hit.component.record_offset, COMPONENT_ENTRY_FIXED_SIZE + 32);
        assert_eq!(hit.payload, &b[..]);
        assert!(hit.signature.is_empty());
    }

    #[test]
    fn missing_container_or_component() {
        let img = ContainerBuilder::new(BOOT).component(CMPA, b"a", AuthType::None).build();
        let reg = registry(&[&img[..]]);
        assert_eq!(reg.locate_component_entry(0x1234, CMPA).err(), Some(ContainerError::NotFound));
        assert_eq!(reg.locate_component_entry(BOOT, CMPC).err(), Some(ContainerError::NotFound));
    }

    #[test]
    fn unknown_component_auth_is_unsupported() {
        let img = ContainerBuilder::new(BOOT)
            .raw_component(ComponentSpec::raw(CMPA, b"abc", 9, &[]))
            .build();
        let reg = registry(&[&img[..]]);
        assert_eq!(reg.locate_component_entry(BOOT, CMPA).err(), Some(ContainerError::Unsupported));
    }

    #[test]
    fn signed_component_splits_trailing_signature() {
        let img = ContainerBuilder::new(BOOT)
            .component(CMPA, b"kernel-bytes", AuthType::SigRsa2048Sha256)
            .build();
        let reg = registry(&[&img[..]]);
        let hit = reg.locate_component_entry(BOOT, CMPA).unwrap();
        assert_eq!(hit.payload, b"kernel-bytes");
        assert_eq!(hit.signature.len(), 256);
        assert_eq!(hit.component.size as usize, 12 + 256);
        assert_eq!(reg.locate_component(BOOT, CMPA).unwrap(), b"kernel-bytes");
    }

    #[test]
    fn mono_signed_lookup_goes_through_wrapper() {
        let inner = ContainerBuilder::new(BOOT)
            .component(CMPA, b"one", AuthType::None)
            .component(CMPB, b"two", AuthType::Sha256)
            .build();
        let img = mono_sign(&inner, AuthType::Sha384);
        let reg = registry(&[&img[..]]);
        let hit = reg.locate_component_entry(BOOT, CMPB).unwrap();
        assert_eq!(hit.payload, b"two");
        assert!(hit.covered_by_container());
        assert_eq!(hit.effective_auth(), Ok(AuthType::None));
    }

    #[test]
    fn enumeration_in_table_order() {
        let img = ContainerBuilder::new(BOOT)
            .component(CMPA, b"a", AuthType::Sha256)
            .component(CMPB, b"b", AuthType::None)
            .component(CMPC, b"c", AuthType::Sha384)
            .build();
        let reg = registry(&[&img[..]]);

        let mut seen = Vec::new();
        let mut name = COMPONENT_NAME_START;
        while reg.get_next_available_component(BOOT, Some(&mut name)).is_ok() {
            seen.push(name);
        }
        assert_eq!(seen, [CMPA, CMPB, CMPC]);
        assert_eq!(
            reg.get_next_available_component(BOOT, Some(&mut name)),
            Err(ContainerError::NotFound)
        );
        assert_eq!(reg.components(BOOT).unwrap().collect::<Vec<_>>(), seen);
    }

    #[test]
    fn enumeration_argument_checks() {
        let img = ContainerBuilder::new(BOOT).component(CMPA, b"a", AuthType::None).build();
        let reg = registry(&[&img[..]]);
        assert_eq!(reg.get_next_available_component(BOOT, None), Err(ContainerError::InvalidArgument));
        let mut unknown = CMPC;
        assert_eq!(
            reg.get_next_available_component(BOOT, Some(&mut unknown)),
            Err(ContainerError::NotFound)
        );
        assert_eq!(unknown, CMPC);
    }
}
