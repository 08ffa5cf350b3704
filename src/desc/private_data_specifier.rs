// desc/private_data_specifier.rs
//! Private data specifier descriptor (tag 0x5F, DVB).
//!
//! Position-sensitive: it changes the classification of every private
//! descriptor that follows it in the same list.

use super::{DTAG_PRIVATE_DATA_SPECIFIER, Descriptor, DescriptorContext, DescriptorFactory};
use crate::context::Standard;
use crate::error::{Error, Result};
use crate::xml::Element;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrivateDataSpecifierDescriptor {
    pub pds: u32,
}

impl PrivateDataSpecifierDescriptor {
    pub fn from_descriptor(desc: &Descriptor) -> Result<Self> {
        if desc.tag() != DTAG_PRIVATE_DATA_SPECIFIER {
            return Err(Error::InvalidStructure("not a private_data_specifier descriptor"));
        }
        match desc.payload() {
            [a, b, c, d] => Ok(Self { pds: u32::from_be_bytes([*a, *b, *c, *d]) }),
            _ => Err(Error::InvalidLength),
        }
    }

    pub fn to_descriptor(&self) -> Result<Descriptor> {
        Descriptor::new(DTAG_PRIVATE_DATA_SPECIFIER, self.pds.to_be_bytes().to_vec())
    }

    pub fn to_element(&self) -> Element {
        let mut elem = Element::new(FACTORY.name);
        elem.set_attr_hex("private_data_specifier", self.pds as u64, 8);
        elem
    }

    pub fn from_element(elem: &Element) -> Result<Self> {
        Ok(Self { pds: elem.req_int_attr("private_data_specifier")? as u32 })
    }
}

fn from_xml(elem: &Element, _ctx: &DescriptorContext) -> Result<Descriptor> {
    PrivateDataSpecifierDescriptor::from_element(elem)?.to_descriptor()
}

fn to_xml(desc: &Descriptor, _ctx: &DescriptorContext) -> Result<Element> {
    Ok(PrivateDataSpecifierDescriptor::from_descriptor(desc)?.to_element())
}

pub(crate) const FACTORY: DescriptorFactory = DescriptorFactory {
    name: "private_data_specifier_descriptor",
    tag: DTAG_PRIVATE_DATA_SPECIFIER,
    standard: Standard::Dvb,
    pds: None,
    from_xml,
    to_xml,
};
