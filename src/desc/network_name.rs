// desc/network_name.rs
//! Network name descriptor (tag 0x40, DVB).

use super::{DTAG_NETWORK_NAME, Descriptor, DescriptorContext, DescriptorFactory};
use crate::context::Standard;
use crate::error::{Error, Result};
use crate::text::{decode_dvb_text, encode_dvb_text};
use crate::xml::Element;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkNameDescriptor {
    pub name: String,
}

impl NetworkNameDescriptor {
    pub fn from_descriptor(desc: &Descriptor) -> Result<Self> {
        if desc.tag() != DTAG_NETWORK_NAME {
            return Err(Error::InvalidStructure("not a network_name descriptor"));
        }
        let name = decode_dvb_text(desc.payload())
            .ok_or(Error::InvalidStructure("undecodable network name"))?;
        Ok(Self { name })
    }

    pub fn to_descriptor(&self) -> Result<Descriptor> {
        Descriptor::new(DTAG_NETWORK_NAME, encode_dvb_text(&self.name))
    }

    pub fn to_element(&self) -> Element {
        let mut elem = Element::new(FACTORY.name);
        elem.set_attr("network_name", self.name.as_str());
        elem
    }

    pub fn from_element(elem: &Element) -> Result<Self> {
        let name = elem
            .attr("network_name")
            .ok_or(Error::InvalidStructure("missing network_name"))?
            .to_string();
        Ok(Self { name })
    }
}

fn from_xml(elem: &Element, _ctx: &DescriptorContext) -> Result<Descriptor> {
    NetworkNameDescriptor::from_element(elem)?.to_descriptor()
}

fn to_xml(desc: &Descriptor, _ctx: &DescriptorContext) -> Result<Element> {
    Ok(NetworkNameDescriptor::from_descriptor(desc)?.to_element())
}

pub(crate) const FACTORY: DescriptorFactory = DescriptorFactory {
    name: "network_name_descriptor",
    tag: DTAG_NETWORK_NAME,
    standard: Standard::Dvb,
    pds: None,
    from_xml,
    to_xml,
};
