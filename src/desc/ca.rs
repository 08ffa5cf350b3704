// desc/ca.rs
//! CA descriptor (tag 0x09, MPEG) linking a CA system to its EMM/ECM PID.

use super::{DTAG_CA, Descriptor, DescriptorContext, DescriptorFactory};
use crate::buffer::ByteBuffer;
use crate::context::Standard;
use crate::error::{Error, Result};
use crate::xml::Element;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaDescriptor {
    pub ca_system_id: u16,
    pub ca_pid: u16,
    pub private_data: Vec<u8>,
}

impl CaDescriptor {
    pub fn from_descriptor(desc: &Descriptor) -> Result<Self> {
        if desc.tag() != DTAG_CA {
            return Err(Error::InvalidStructure("not a CA descriptor"));
        }
        let mut buf = ByteBuffer::from_bytes(desc.payload());
        let ca_system_id = buf.get_u16();
        buf.get_bits(3);
        let ca_pid = buf.get_bits(13) as u16;
        let private_data = buf.get_bytes(buf.remaining());
        if buf.error() {
            return Err(Error::InvalidLength);
        }
        Ok(Self { ca_system_id, ca_pid, private_data })
    }

    pub fn to_descriptor(&self) -> Result<Descriptor> {
        let mut buf = ByteBuffer::with_capacity(4 + self.private_data.len());
        buf.put_u16(self.ca_system_id);
        buf.put_bits(0b111, 3);
        buf.put_bits(self.ca_pid as u64, 13);
        buf.put_bytes(&self.private_data);
        Descriptor::new(DTAG_CA, buf.into_vec())
    }

    pub fn to_element(&self) -> Element {
        let mut elem = Element::new(FACTORY.name);
        elem.set_attr_hex("ca_system_id", self.ca_system_id as u64, 4);
        elem.set_attr_hex("ca_pid", self.ca_pid as u64, 4);
        if !self.private_data.is_empty() {
            let mut private = Element::new("private_data");
            private.set_hex_text(&self.private_data);
            elem.add_child(private);
        }
        elem
    }

    pub fn from_element(elem: &Element) -> Result<Self> {
        let private_data = match elem.first_child("private_data") {
            Some(child) => child.hex_text()?,
            None => Vec::new(),
        };
        Ok(Self {
            ca_system_id: elem.req_int_attr("ca_system_id")? as u16,
            ca_pid: elem.req_int_attr("ca_pid")? as u16 & 0x1FFF,
            private_data,
        })
    }
}

fn from_xml(elem: &Element, _ctx: &DescriptorContext) -> Result<Descriptor> {
    CaDescriptor::from_element(elem)?.to_descriptor()
}

fn to_xml(desc: &Descriptor, _ctx: &DescriptorContext) -> Result<Element> {
    Ok(CaDescriptor::from_descriptor(desc)?.to_element())
}

pub(crate) const FACTORY: DescriptorFactory = DescriptorFactory {
    name: "ca_descriptor",
    tag: DTAG_CA,
    standard: Standard::Mpeg,
    pds: None,
    from_xml,
    to_xml,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip() {
        let d = CaDescriptor { ca_system_id: 0x0500, ca_pid: 0x1001, private_data: vec![1, 2] };
        let wire = d.to_descriptor().unwrap();
        assert_eq!(wire.payload(), &[0x05, 0x00, 0xF0, 0x01, 1, 2]);
        assert_eq!(CaDescriptor::from_descriptor(&wire).unwrap(), d);
    }

    #[test]
    fn xml_round_trip() {
        let d = CaDescriptor { ca_system_id: 0x0604, ca_pid: 0x00CA, private_data: vec![] };
        assert_eq!(CaDescriptor::from_element(&d.to_element()).unwrap(), d);
    }
}
