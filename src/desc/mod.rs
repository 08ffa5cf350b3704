// desc/mod.rs
//! Descriptor model: tag+length+payload records, ordered lists, and the
//! registry mapping (tag, standard, private data specifier) to typed
//! variants with XML names.

pub mod ca;
pub mod local_time_offset;
pub mod logical_channel_number;
pub mod network_name;
pub mod private_data_specifier;
pub mod service;
pub mod short_event;
pub mod stream_identifier;

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::buffer::ByteBuffer;
use crate::context::{SiContext, Standard};
use crate::error::{Error, Result};
use crate::xml::Element;

pub const DTAG_CA: u8 = 0x09;
pub const DTAG_NETWORK_NAME: u8 = 0x40;
pub const DTAG_SERVICE: u8 = 0x48;
pub const DTAG_SHORT_EVENT: u8 = 0x4D;
pub const DTAG_STREAM_IDENTIFIER: u8 = 0x52;
pub const DTAG_LOCAL_TIME_OFFSET: u8 = 0x58;
pub const DTAG_PRIVATE_DATA_SPECIFIER: u8 = 0x5F;
pub const DTAG_EXTENSION: u8 = 0x7F;
pub const DTAG_LOGICAL_CHANNEL_NUMBER: u8 = 0x83;

/// EACEM/E-Book private data specifier, context for tag 0x83.
pub const PDS_EACEM: u32 = 0x0000_0028;

const GENERIC_DESCRIPTOR: &str = "generic_descriptor";
const METADATA_ELEMENT: &str = "metadata";

/// A raw descriptor: 8-bit tag, up to 255 payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    tag: u8,
    payload: Vec<u8>,
}

impl Descriptor {
    pub fn new(tag: u8, payload: Vec<u8>) -> Result<Self> {
        if payload.len() > 0xFF {
            return Err(Error::InvalidLength);
        }
        Ok(Self { tag, payload })
    }

    /// Parse one descriptor from the head of `data`; returns it and the
    /// number of bytes consumed.
    pub fn from_wire(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < 2 {
            return Err(Error::InvalidLength);
        }
        let len = data[1] as usize;
        if data.len() < 2 + len {
            return Err(Error::InvalidLength);
        }
        Ok((Self { tag: data[0], payload: data[2..2 + len].to_vec() }, 2 + len))
    }

    pub fn tag(&self) -> u8 {
        self.tag
    }

    /// For extension descriptors (tag 0x7F) the first payload byte is the
    /// sub-tag.
    pub fn extension_tag(&self) -> Option<u8> {
        if self.tag == DTAG_EXTENSION { self.payload.first().copied() } else { None }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Encoded size: 2 + payload length.
    pub fn size(&self) -> usize {
        2 + self.payload.len()
    }

    pub fn write_to(&self, buf: &mut ByteBuffer) {
        buf.put_u8(self.tag);
        buf.put_len8_bytes(&self.payload);
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::with_capacity(self.size());
        self.write_to(&mut buf);
        buf.into_vec()
    }
}

/// Ambient interpretation context for a descriptor list: the registration
/// standard, the table the list lives in, and the private data specifier
/// in force. The specifier evolves while the list is walked.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorContext {
    pub standard: Standard,
    pub table_id: u8,
    pub pds: u32,
}

impl DescriptorContext {
    pub fn new(ctx: &SiContext, table_id: u8) -> Self {
        Self { standard: ctx.standard, table_id, pds: ctx.default_pds }
    }

    /// Apply the context side effect of one descriptor in sequence.
    fn advance(&mut self, desc: &Descriptor) {
        if desc.tag == DTAG_PRIVATE_DATA_SPECIFIER && desc.payload.len() >= 4 {
            self.pds = u32::from_be_bytes([
                desc.payload[0],
                desc.payload[1],
                desc.payload[2],
                desc.payload[3],
            ]);
        }
    }
}

/// Ordered descriptor list with its accumulated encoded size.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DescriptorList {
    items: Vec<Descriptor>,
    size: usize,
}

impl DescriptorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, desc: Descriptor) {
        self.size += desc.size();
        self.items.push(desc);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total encoded size of all descriptors.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Descriptor> {
        self.items.iter()
    }

    /// Parse a full descriptor loop. A descriptor extending past the end
    /// of `data` is an error.
    pub fn from_wire(data: &[u8]) -> Result<Self> {
        let mut list = Self::new();
        let mut pos = 0;
        while pos < data.len() {
            let (desc, used) = Descriptor::from_wire(&data[pos..])?;
            list.push(desc);
            pos += used;
        }
        Ok(list)
    }

    pub fn write_to(&self, buf: &mut ByteBuffer) {
        for d in &self.items {
            d.write_to(buf);
        }
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::with_capacity(self.size);
        self.write_to(&mut buf);
        buf.into_vec()
    }

    /// Emit descriptor children onto `parent`, updating the private data
    /// specifier context in sequence. A typed variant whose payload turns
    /// out malformed falls back to the generic form.
    pub fn to_xml(&self, parent: &mut Element, ctx: DescriptorContext) {
        let mut ctx = ctx;
        for d in &self.items {
            ctx.advance(d);
            let elem = match classify(d.tag, &ctx) {
                Some(f) => (f.to_xml)(d, &ctx).unwrap_or_else(|_| generic_to_xml(d)),
                None => generic_to_xml(d),
            };
            parent.add_child(elem);
        }
    }

    /// Build a list from the descriptor children of `elem`. Children named
    /// in `skip` (the table's own structural elements) and `<metadata>` are
    /// ignored; any other unrecognized name is an error.
    pub fn from_xml(elem: &Element, ctx: DescriptorContext, skip: &[&str]) -> Result<Self> {
        let mut ctx = ctx;
        let mut list = Self::new();
        for child in elem.child_elements() {
            let name = child.name().to_ascii_lowercase();
            if name == METADATA_ELEMENT || skip.contains(&name.as_str()) {
                continue;
            }
            let desc = if name == GENERIC_DESCRIPTOR {
                generic_from_xml(child)?
            } else if let Some(f) = factory_by_name(&name) {
                (f.from_xml)(child, &ctx)?
            } else {
                return Err(Error::UnknownElement(child.name().to_string()));
            };
            ctx.advance(&desc);
            list.push(desc);
        }
        Ok(list)
    }
}

impl<'a> IntoIterator for &'a DescriptorList {
    type Item = &'a Descriptor;
    type IntoIter = std::slice::Iter<'a, Descriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl FromIterator<Descriptor> for DescriptorList {
    fn from_iter<T: IntoIterator<Item = Descriptor>>(iter: T) -> Self {
        let mut list = Self::new();
        for d in iter {
            list.push(d);
        }
        list
    }
}

/* ── registry ── */

/// One typed descriptor variant known to the registry.
pub struct DescriptorFactory {
    /// Lowercase XML element name.
    pub name: &'static str,
    pub tag: u8,
    /// Standard this variant belongs to; MPEG variants apply everywhere.
    pub standard: Standard,
    /// Required private data specifier, for tags in the private range.
    pub pds: Option<u32>,
    pub from_xml: fn(&Element, &DescriptorContext) -> Result<Descriptor>,
    pub to_xml: fn(&Descriptor, &DescriptorContext) -> Result<Element>,
}

static FACTORIES: &[&DescriptorFactory] = &[
    &ca::FACTORY,
    &network_name::FACTORY,
    &service::FACTORY,
    &short_event::FACTORY,
    &stream_identifier::FACTORY,
    &local_time_offset::FACTORY,
    &private_data_specifier::FACTORY,
    &logical_channel_number::FACTORY,
];

static BY_NAME: LazyLock<HashMap<&'static str, &'static DescriptorFactory>> =
    LazyLock::new(|| FACTORIES.iter().map(|f| (f.name, *f)).collect());

pub fn factory_by_name(lowercase_name: &str) -> Option<&'static DescriptorFactory> {
    BY_NAME.get(lowercase_name).copied()
}

/// Resolve a tag to its typed variant under the ambient context, or None
/// for the generic fallback.
pub fn classify(tag: u8, ctx: &DescriptorContext) -> Option<&'static DescriptorFactory> {
    FACTORIES.iter().copied().find(|f| {
        f.tag == tag
            && (f.standard == Standard::Mpeg || f.standard == ctx.standard)
            && f.pds.is_none_or(|pds| pds == ctx.pds)
    })
}

fn generic_to_xml(desc: &Descriptor) -> Element {
    let mut elem = Element::new(GENERIC_DESCRIPTOR);
    elem.set_attr_hex("tag", desc.tag as u64, 2);
    if !desc.payload.is_empty() {
        elem.set_hex_text(&desc.payload);
    }
    elem
}

fn generic_from_xml(elem: &Element) -> Result<Descriptor> {
    let tag = elem.req_int_attr("tag")? as u8;
    Descriptor::new(tag, elem.hex_text()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn dvb_ctx() -> DescriptorContext {
        DescriptorContext::new(&SiContext::default(), 0x40)
    }

    #[test]
    fn wire_round_trip() {
        let d = Descriptor::new(0x72, vec![1, 2, 3, 4, 5, 6, 7]).unwrap();
        assert_eq!(d.size(), 9);
        let wire = d.to_wire();
        assert_eq!(wire, [0x72, 7, 1, 2, 3, 4, 5, 6, 7]);
        let (back, used) = Descriptor::from_wire(&wire).unwrap();
        assert_eq!(used, 9);
        assert_eq!(back, d);
    }

    #[test]
    fn truncated_descriptor_rejected() {
        assert_matches!(Descriptor::from_wire(&[0x48, 5, 1, 2]), Err(Error::InvalidLength));
    }

    #[test]
    fn list_size_accumulates() {
        let mut list = DescriptorList::new();
        list.push(Descriptor::new(0x01, vec![0; 8]).unwrap());
        list.push(Descriptor::new(0x02, vec![0; 8]).unwrap());
        assert_eq!(list.size(), 20);
        let back = DescriptorList::from_wire(&list.to_wire()).unwrap();
        assert_eq!(back, list);
    }

    #[test]
    fn generic_descriptor_xml_round_trip() {
        let d = Descriptor::new(0x72, vec![1, 2, 3, 4, 5, 6, 7]).unwrap();
        let mut list = DescriptorList::new();
        list.push(d.clone());
        let mut parent = Element::new("cat");
        list.to_xml(&mut parent, dvb_ctx());

        let child = parent.child_elements().next().unwrap();
        assert_eq!(child.name(), "generic_descriptor");
        assert_eq!(child.attr("tag"), Some("0x72"));
        assert_eq!(child.text(), "01 02 03 04 05 06 07");

        let back = DescriptorList::from_xml(&parent, dvb_ctx(), &[]).unwrap();
        assert_eq!(back, list);
    }

    #[test]
    fn unknown_element_reported() {
        let mut parent = Element::new("cat");
        parent.add_child(Element::new("no_such_descriptor"));
        assert_matches!(
            DescriptorList::from_xml(&parent, dvb_ctx(), &[]),
            Err(Error::UnknownElement(name)) if name == "no_such_descriptor"
        );
    }

    #[test]
    fn pds_reclassifies_later_descriptors() {
        let ctx = dvb_ctx();
        // Without a preceding specifier, tag 0x83 is generic.
        assert!(classify(DTAG_LOGICAL_CHANNEL_NUMBER, &ctx).is_none());

        let mut list = DescriptorList::new();
        list.push(
            private_data_specifier::PrivateDataSpecifierDescriptor { pds: PDS_EACEM }
                .to_descriptor()
                .unwrap(),
        );
        list.push(Descriptor::new(DTAG_LOGICAL_CHANNEL_NUMBER, vec![0x00, 0x01, 0xFC, 0x0A]).unwrap());

        let mut parent = Element::new("nit");
        list.to_xml(&mut parent, ctx);
        let names: Vec<&str> = parent.child_elements().map(|e| e.name()).collect();
        assert_eq!(names, ["private_data_specifier_descriptor", "logical_channel_number_descriptor"]);
    }
}
