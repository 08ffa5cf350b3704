// desc/stream_identifier.rs
//! Stream identifier descriptor (tag 0x52, DVB): one component tag.

use super::{DTAG_STREAM_IDENTIFIER, Descriptor, DescriptorContext, DescriptorFactory};
use crate::context::Standard;
use crate::error::{Error, Result};
use crate::xml::Element;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamIdentifierDescriptor {
    pub component_tag: u8,
}

impl StreamIdentifierDescriptor {
    pub fn from_descriptor(desc: &Descriptor) -> Result<Self> {
        if desc.tag() != DTAG_STREAM_IDENTIFIER {
            return Err(Error::InvalidStructure("not a stream_identifier descriptor"));
        }
        match desc.payload() {
            [component_tag] => Ok(Self { component_tag: *component_tag }),
            _ => Err(Error::InvalidLength),
        }
    }

    pub fn to_descriptor(&self) -> Result<Descriptor> {
        Descriptor::new(DTAG_STREAM_IDENTIFIER, vec![self.component_tag])
    }

    pub fn to_element(&self) -> Element {
        let mut elem = Element::new(FACTORY.name);
        elem.set_attr_hex("component_tag", self.component_tag as u64, 2);
        elem
    }

    pub fn from_element(elem: &Element) -> Result<Self> {
        Ok(Self { component_tag: elem.req_int_attr("component_tag")? as u8 })
    }
}

fn from_xml(elem: &Element, _ctx: &DescriptorContext) -> Result<Descriptor> {
    StreamIdentifierDescriptor::from_element(elem)?.to_descriptor()
}

fn to_xml(desc: &Descriptor, _ctx: &DescriptorContext) -> Result<Element> {
    Ok(StreamIdentifierDescriptor::from_descriptor(desc)?.to_element())
}

pub(crate) const FACTORY: DescriptorFactory = DescriptorFactory {
    name: "stream_identifier_descriptor",
    tag: DTAG_STREAM_IDENTIFIER,
    standard: Standard::Dvb,
    pds: None,
    from_xml,
    to_xml,
};
