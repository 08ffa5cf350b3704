// desc/service.rs
//! Service descriptor (tag 0x48, DVB): service type plus provider and
//! service names.

use super::{DTAG_SERVICE, Descriptor, DescriptorContext, DescriptorFactory};
use crate::buffer::ByteBuffer;
use crate::context::Standard;
use crate::error::{Error, Result};
use crate::text::{decode_dvb_text, encode_dvb_text};
use crate::xml::Element;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub service_type: u8,
    pub provider_name: String,
    pub service_name: String,
}

impl ServiceDescriptor {
    pub fn from_descriptor(desc: &Descriptor) -> Result<Self> {
        if desc.tag() != DTAG_SERVICE {
            return Err(Error::InvalidStructure("not a service descriptor"));
        }
        let mut buf = ByteBuffer::from_bytes(desc.payload());
        let service_type = buf.get_u8();
        let provider = buf.get_len8_bytes();
        let name = buf.get_len8_bytes();
        if buf.error() {
            return Err(Error::InvalidLength);
        }
        Ok(Self {
            service_type,
            provider_name: decode_dvb_text(&provider)
                .ok_or(Error::InvalidStructure("undecodable provider name"))?,
            service_name: decode_dvb_text(&name)
                .ok_or(Error::InvalidStructure("undecodable service name"))?,
        })
    }

    pub fn to_descriptor(&self) -> Result<Descriptor> {
        let mut buf = ByteBuffer::new();
        buf.put_u8(self.service_type);
        buf.put_len8_bytes(&encode_dvb_text(&self.provider_name));
        buf.put_len8_bytes(&encode_dvb_text(&self.service_name));
        if buf.error() {
            return Err(Error::InvalidLength);
        }
        Descriptor::new(DTAG_SERVICE, buf.into_vec())
    }

    pub fn to_element(&self) -> Element {
        let mut elem = Element::new(FACTORY.name);
        elem.set_attr_hex("service_type", self.service_type as u64, 2);
        elem.set_attr("provider_name", self.provider_name.as_str());
        elem.set_attr("service_name", self.service_name.as_str());
        elem
    }

    pub fn from_element(elem: &Element) -> Result<Self> {
        Ok(Self {
            service_type: elem.req_int_attr("service_type")? as u8,
            provider_name: elem.attr("provider_name").unwrap_or_default().to_string(),
            service_name: elem.attr("service_name").unwrap_or_default().to_string(),
        })
    }
}

fn from_xml(elem: &Element, _ctx: &DescriptorContext) -> Result<Descriptor> {
    ServiceDescriptor::from_element(elem)?.to_descriptor()
}

fn to_xml(desc: &Descriptor, _ctx: &DescriptorContext) -> Result<Element> {
    Ok(ServiceDescriptor::from_descriptor(desc)?.to_element())
}

pub(crate) const FACTORY: DescriptorFactory = DescriptorFactory {
    name: "service_descriptor",
    tag: DTAG_SERVICE,
    standard: Standard::Dvb,
    pds: None,
    from_xml,
    to_xml,
};
