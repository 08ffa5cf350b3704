// psi/transport_list.rs
//! Shared body layout of NIT and BAT: a top-level descriptor loop
//! followed by a transport stream loop, both with 12-bit length fields
//! rewritten per section.

use crate::buffer::ByteBuffer;
use crate::desc::{DescriptorContext, DescriptorList};
use crate::error::{Error, Result};
use crate::section::MAX_LONG_SECTION_PAYLOAD;
use crate::segment::SectionChain;
use crate::table::BinaryTable;
use crate::xml::Element;

/// Both length fields are present in every section even when empty.
const SECTION_OVERHEAD: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEntry {
    pub ts_id: u16,
    pub onid: u16,
    pub descs: DescriptorList,
}

impl TransportEntry {
    pub fn new(ts_id: u16, onid: u16) -> Self {
        Self { ts_id, onid, descs: DescriptorList::new() }
    }

    fn to_wire(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::with_capacity(6 + self.descs.size());
        buf.put_u16(self.ts_id);
        buf.put_u16(self.onid);
        buf.put_bits(0b1111, 4);
        buf.put_bits(self.descs.size() as u64, 12);
        self.descs.write_to(&mut buf);
        buf.into_vec()
    }
}

fn push_len12_placeholder(cur: &mut Vec<u8>) -> usize {
    cur.push(0xF0);
    cur.push(0x00);
    cur.len() - 2
}

fn patch_len12(cur: &mut [u8], pos: usize, len: usize) {
    cur[pos] = 0xF0 | (len >> 8) as u8;
    cur[pos + 1] = len as u8;
}

/// Split the logical body across section payloads. The top-level
/// descriptor loop fills from section 0 and may break at descriptor
/// boundaries; each transport entry is atomic.
pub(crate) fn serialize_body(
    top_descs: &DescriptorList,
    transports: &[TransportEntry],
) -> Result<Vec<Vec<u8>>> {
    let mut chain = SectionChain::new();
    let mut top_len_pos = push_len12_placeholder(chain.current());
    let mut top_placed = 0usize;

    for d in top_descs {
        let wire = d.to_wire();
        if wire.len() > MAX_LONG_SECTION_PAYLOAD - SECTION_OVERHEAD {
            return Err(Error::Overflow);
        }
        // Keep room for the transport loop length field of this section.
        if chain.used() + wire.len() + 2 > MAX_LONG_SECTION_PAYLOAD {
            patch_len12(chain.current(), top_len_pos, top_placed);
            push_len12_placeholder(chain.current()); // empty transport loop
            chain.close();
            top_len_pos = push_len12_placeholder(chain.current());
            top_placed = 0;
        }
        chain.current().extend_from_slice(&wire);
        top_placed += wire.len();
    }
    patch_len12(chain.current(), top_len_pos, top_placed);

    let mut loop_len_pos = push_len12_placeholder(chain.current());
    let mut loop_placed = 0usize;
    for t in transports {
        let entry = t.to_wire();
        if entry.len() > MAX_LONG_SECTION_PAYLOAD - SECTION_OVERHEAD {
            return Err(Error::Overflow);
        }
        if !chain.fits(entry.len()) {
            patch_len12(chain.current(), loop_len_pos, loop_placed);
            chain.close();
            push_len12_placeholder(chain.current()); // empty top loop
            loop_len_pos = push_len12_placeholder(chain.current());
            loop_placed = 0;
        }
        chain.current().extend_from_slice(&entry);
        loop_placed += entry.len();
    }
    patch_len12(chain.current(), loop_len_pos, loop_placed);

    Ok(chain.into_payloads())
}

/// Parse every section of the table back into the logical body.
pub(crate) fn deserialize_body(table: &BinaryTable) -> Result<(DescriptorList, Vec<TransportEntry>)> {
    let mut top_descs = DescriptorList::new();
    let mut transports = Vec::new();
    for sec in table.sections() {
        let mut buf = ByteBuffer::from_bytes(sec.payload());
        buf.get_bits(4);
        let top_len = buf.get_bits(12) as usize;
        let top_bytes = buf.get_bytes(top_len);
        buf.get_bits(4);
        let loop_len = buf.get_bits(12) as usize;
        let loop_bytes = buf.get_bytes(loop_len);
        if buf.error() || buf.remaining() != 0 {
            return Err(Error::InvalidStructure("malformed transport list body"));
        }
        for d in &DescriptorList::from_wire(&top_bytes)? {
            top_descs.push(d.clone());
        }

        let mut cursor = ByteBuffer::from_bytes(&loop_bytes);
        while cursor.remaining() > 0 {
            let ts_id = cursor.get_u16();
            let onid = cursor.get_u16();
            cursor.get_bits(4);
            let desc_len = cursor.get_bits(12) as usize;
            let desc_bytes = cursor.get_bytes(desc_len);
            if cursor.error() {
                return Err(Error::InvalidStructure("truncated transport entry"));
            }
            let mut entry = TransportEntry::new(ts_id, onid);
            entry.descs = DescriptorList::from_wire(&desc_bytes)?;
            transports.push(entry);
        }
    }
    Ok((top_descs, transports))
}

pub(crate) fn transports_to_xml(
    parent: &mut Element,
    transports: &[TransportEntry],
    ctx: DescriptorContext,
) {
    for t in transports {
        let mut child = Element::new("transport_stream");
        child.set_attr_hex("transport_stream_id", t.ts_id as u64, 4);
        child.set_attr_hex("original_network_id", t.onid as u64, 4);
        t.descs.to_xml(&mut child, ctx);
        parent.add_child(child);
    }
}

pub(crate) fn transports_from_xml(
    elem: &Element,
    ctx: DescriptorContext,
) -> Result<Vec<TransportEntry>> {
    let mut transports = Vec::new();
    for child in elem.child_elements().filter(|e| e.is_named("transport_stream")) {
        let mut entry = TransportEntry::new(
            child.req_int_attr("transport_stream_id")? as u16,
            child.req_int_attr("original_network_id")? as u16,
        );
        entry.descs = DescriptorList::from_xml(child, ctx, &[])?;
        transports.push(entry);
    }
    Ok(transports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desc::Descriptor;
    use crate::segment::build_long_table;

    #[test]
    fn body_round_trip_across_sections() {
        let mut top = DescriptorList::new();
        for i in 0..120u8 {
            top.push(Descriptor::new(0x40, vec![i; 10]).unwrap());
        }
        let mut transports = Vec::new();
        for i in 0..60u16 {
            let mut t = TransportEntry::new(i, 0x2000 + i);
            t.descs.push(Descriptor::new(0x41, vec![i as u8; 20]).unwrap());
            transports.push(t);
        }

        let payloads = serialize_body(&top, &transports).unwrap();
        assert!(payloads.len() > 1);
        let table = build_long_table(0x40, true, 0x1111, 0, true, payloads).unwrap();
        let (top2, transports2) = deserialize_body(&table).unwrap();
        assert_eq!(top2, top);
        assert_eq!(transports2, transports);
    }

    #[test]
    fn every_section_carries_both_length_fields() {
        let payloads = serialize_body(&DescriptorList::new(), &[]).unwrap();
        assert_eq!(payloads, vec![vec![0xF0, 0x00, 0xF0, 0x00]]);
    }
}
