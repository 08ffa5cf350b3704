// desc/short_event.rs
//! Short event descriptor (tag 0x4D, DVB): event name and text in one
//! language.

use super::{DTAG_SHORT_EVENT, Descriptor, DescriptorContext, DescriptorFactory};
use crate::buffer::ByteBuffer;
use crate::context::Standard;
use crate::error::{Error, Result};
use crate::text::{decode_dvb_text, encode_dvb_text};
use crate::xml::Element;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortEventDescriptor {
    /// ISO 639-2 language code, three characters.
    pub language: String,
    pub event_name: String,
    pub text: String,
}

impl ShortEventDescriptor {
    pub fn from_descriptor(desc: &Descriptor) -> Result<Self> {
        if desc.tag() != DTAG_SHORT_EVENT {
            return Err(Error::InvalidStructure("not a short_event descriptor"));
        }
        let mut buf = ByteBuffer::from_bytes(desc.payload());
        let lang = buf.get_bytes(3);
        let name = buf.get_len8_bytes();
        let text = buf.get_len8_bytes();
        if buf.error() {
            return Err(Error::InvalidLength);
        }
        Ok(Self {
            language: lang.iter().map(|&b| b as char).collect(),
            event_name: decode_dvb_text(&name)
                .ok_or(Error::InvalidStructure("undecodable event name"))?,
            text: decode_dvb_text(&text).ok_or(Error::InvalidStructure("undecodable event text"))?,
        })
    }

    pub fn to_descriptor(&self) -> Result<Descriptor> {
        if self.language.len() != 3 || !self.language.is_ascii() {
            return Err(Error::InvalidStructure("language code must be three characters"));
        }
        let mut buf = ByteBuffer::new();
        buf.put_bytes(self.language.as_bytes());
        buf.put_len8_bytes(&encode_dvb_text(&self.event_name));
        buf.put_len8_bytes(&encode_dvb_text(&self.text));
        if buf.error() {
            return Err(Error::InvalidLength);
        }
        Descriptor::new(DTAG_SHORT_EVENT, buf.into_vec())
    }

    pub fn to_element(&self) -> Element {
        let mut elem = Element::new(FACTORY.name);
        elem.set_attr("language", self.language.as_str());
        elem.set_attr("event_name", self.event_name.as_str());
        elem.set_attr("text", self.text.as_str());
        elem
    }

    pub fn from_element(elem: &Element) -> Result<Self> {
        Ok(Self {
            language: elem
                .attr("language")
                .ok_or(Error::InvalidStructure("missing language"))?
                .to_string(),
            event_name: elem.attr("event_name").unwrap_or_default().to_string(),
            text: elem.attr("text").unwrap_or_default().to_string(),
        })
    }
}

fn from_xml(elem: &Element, _ctx: &DescriptorContext) -> Result<Descriptor> {
    ShortEventDescriptor::from_element(elem)?.to_descriptor()
}

fn to_xml(desc: &Descriptor, _ctx: &DescriptorContext) -> Result<Element> {
    Ok(ShortEventDescriptor::from_descriptor(desc)?.to_element())
}

pub(crate) const FACTORY: DescriptorFactory = DescriptorFactory {
    name: "short_event_descriptor",
    tag: DTAG_SHORT_EVENT,
    standard: Standard::Dvb,
    pds: None,
    from_xml,
    to_xml,
};
