// desc/logical_channel_number.rs
//! EACEM logical channel number descriptor (tag 0x83).
//!
//! Lives in the private range: only classified when the list's private
//! data specifier is the EACEM value, otherwise it stays generic.

use super::{DTAG_LOGICAL_CHANNEL_NUMBER, Descriptor, DescriptorContext, DescriptorFactory, PDS_EACEM};
use crate::buffer::ByteBuffer;
use crate::context::Standard;
use crate::error::{Error, Result};
use crate::xml::Element;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LcnEntry {
    pub service_id: u16,
    pub visible: bool,
    pub lcn: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogicalChannelNumberDescriptor {
    pub entries: Vec<LcnEntry>,
}

impl LogicalChannelNumberDescriptor {
    pub fn from_descriptor(desc: &Descriptor) -> Result<Self> {
        if desc.tag() != DTAG_LOGICAL_CHANNEL_NUMBER {
            return Err(Error::InvalidStructure("not a logical_channel_number descriptor"));
        }
        if desc.payload().len() % 4 != 0 {
            return Err(Error::InvalidLength);
        }
        let mut buf = ByteBuffer::from_bytes(desc.payload());
        let mut entries = Vec::with_capacity(desc.payload().len() / 4);
        while buf.remaining() > 0 {
            let service_id = buf.get_u16();
            let visible = buf.get_bits(1) != 0;
            buf.get_bits(5);
            let lcn = buf.get_bits(10) as u16;
            entries.push(LcnEntry { service_id, visible, lcn });
        }
        if buf.error() {
            return Err(Error::InvalidLength);
        }
        Ok(Self { entries })
    }

    pub fn to_descriptor(&self) -> Result<Descriptor> {
        let mut buf = ByteBuffer::with_capacity(self.entries.len() * 4);
        for e in &self.entries {
            buf.put_u16(e.service_id);
            buf.put_bits(e.visible as u64, 1);
            buf.put_bits(0b11111, 5);
            buf.put_bits(e.lcn as u64, 10);
        }
        if buf.error() {
            return Err(Error::InvalidLength);
        }
        Descriptor::new(DTAG_LOGICAL_CHANNEL_NUMBER, buf.into_vec())
    }

    pub fn to_element(&self) -> Element {
        let mut elem = Element::new(FACTORY.name);
        for e in &self.entries {
            let mut svc = Element::new("service");
            svc.set_attr_dec("service_id", e.service_id as u64);
            svc.set_attr_dec("logical_channel_number", e.lcn as u64);
            svc.set_attr_bool("visible", e.visible);
            elem.add_child(svc);
        }
        elem
    }

    pub fn from_element(elem: &Element) -> Result<Self> {
        let mut entries = Vec::new();
        for svc in elem.child_elements().filter(|e| e.is_named("service")) {
            entries.push(LcnEntry {
                service_id: svc.req_int_attr("service_id")? as u16,
                lcn: svc.req_int_attr("logical_channel_number")? as u16 & 0x03FF,
                visible: svc.bool_attr("visible", true)?,
            });
        }
        Ok(Self { entries })
    }
}

fn from_xml(elem: &Element, _ctx: &DescriptorContext) -> Result<Descriptor> {
    LogicalChannelNumberDescriptor::from_element(elem)?.to_descriptor()
}

fn to_xml(desc: &Descriptor, _ctx: &DescriptorContext) -> Result<Element> {
    Ok(LogicalChannelNumberDescriptor::from_descriptor(desc)?.to_element())
}

pub(crate) const FACTORY: DescriptorFactory = DescriptorFactory {
    name: "logical_channel_number_descriptor",
    tag: DTAG_LOGICAL_CHANNEL_NUMBER,
    standard: Standard::Dvb,
    pds: Some(PDS_EACEM),
    from_xml,
    to_xml,
};
