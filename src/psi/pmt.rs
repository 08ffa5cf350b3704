// psi/pmt.rs
//! Program Map Table (table_id 0x02): PCR PID, program-level descriptors
//! and the elementary stream loop.

use super::{TID_PMT, Table};
use crate::buffer::ByteBuffer;
use crate::context::SiContext;
use crate::desc::{DescriptorContext, DescriptorList};
use crate::error::{Error, Result};
use crate::section::MAX_LONG_SECTION_PAYLOAD;
use crate::segment::{SectionChain, build_long_table};
use crate::table::BinaryTable;
use crate::xml::Element;

/// Fixed header repeated at the start of every PMT section: PCR PID and
/// the program_info_length of the descriptors placed in that section.
const PMT_PREAMBLE: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PmtStream {
    pub elementary_pid: u16,
    pub stream_type: u8,
    pub descs: DescriptorList,
}

impl PmtStream {
    pub fn new(elementary_pid: u16, stream_type: u8) -> Self {
        Self { elementary_pid, stream_type, descs: DescriptorList::new() }
    }

    fn to_wire(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::with_capacity(5 + self.descs.size());
        buf.put_u8(self.stream_type);
        buf.put_bits(0b111, 3);
        buf.put_bits(self.elementary_pid as u64, 13);
        buf.put_bits(0b1111, 4);
        buf.put_bits(self.descs.size() as u64, 12);
        self.descs.write_to(&mut buf);
        buf.into_vec()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pmt {
    pub version: u8,
    pub is_current: bool,
    pub service_id: u16,
    pub pcr_pid: u16,
    pub descs: DescriptorList,
    /// Elementary streams, insertion order preserved on the wire.
    pub streams: Vec<PmtStream>,
}

impl Pmt {
    pub fn new(version: u8, is_current: bool, service_id: u16, pcr_pid: u16) -> Self {
        Self {
            version,
            is_current,
            service_id,
            pcr_pid,
            descs: DescriptorList::new(),
            streams: Vec::new(),
        }
    }
}

fn write_preamble(cur: &mut Vec<u8>, pcr_pid: u16) {
    cur.push(0xE0 | (pcr_pid >> 8) as u8);
    cur.push(pcr_pid as u8);
    cur.push(0xF0);
    cur.push(0x00);
}

fn patch_program_info_length(cur: &mut [u8], len: usize) {
    cur[2] = 0xF0 | (len >> 8) as u8;
    cur[3] = len as u8;
}

impl Table for Pmt {
    const XML_NAME: &'static str = "pmt";

    fn table_id(&self) -> u8 {
        TID_PMT
    }

    fn serialize(&self, _ctx: &SiContext) -> Result<BinaryTable> {
        let mut chain = SectionChain::new();
        write_preamble(chain.current(), self.pcr_pid);

        // Program-level descriptors fill from section 0; each section's
        // program_info_length covers only the descriptors it carries.
        let mut placed = 0usize;
        for d in &self.descs {
            let wire = d.to_wire();
            if !chain.fits(wire.len()) {
                patch_program_info_length(chain.current(), placed);
                chain.close();
                write_preamble(chain.current(), self.pcr_pid);
                placed = 0;
            }
            chain.current().extend_from_slice(&wire);
            placed += wire.len();
        }
        patch_program_info_length(chain.current(), placed);

        // Stream entries are atomic: header plus descriptor loop never
        // split between sections.
        for stream in &self.streams {
            let entry = stream.to_wire();
            if entry.len() > MAX_LONG_SECTION_PAYLOAD - PMT_PREAMBLE {
                return Err(Error::Overflow);
            }
            if !chain.fits(entry.len()) {
                chain.close();
                write_preamble(chain.current(), self.pcr_pid);
            }
            chain.current().extend_from_slice(&entry);
        }

        build_long_table(
            TID_PMT,
            false,
            self.service_id,
            self.version,
            self.is_current,
            chain.into_payloads(),
        )
    }

    fn deserialize(_ctx: &SiContext, table: &BinaryTable) -> Result<Self> {
        if !table.is_complete() {
            return Err(Error::IncompleteTable);
        }
        if table.table_id() != TID_PMT {
            return Err(Error::WrongTableId { got: table.table_id() });
        }
        if !table.is_long_section() {
            return Err(Error::InvalidStructure("PMT must use long sections"));
        }
        let mut pmt = Pmt::new(table.version(), table.is_current(), table.table_id_extension(), 0x1FFF);
        for sec in table.sections() {
            let mut buf = ByteBuffer::from_bytes(sec.payload());
            buf.get_bits(3);
            let pcr_pid = buf.get_bits(13) as u16;
            buf.get_bits(4);
            let prog_info_len = buf.get_bits(12) as usize;
            let prog_info = buf.get_bytes(prog_info_len);
            if buf.error() {
                return Err(Error::InvalidLength);
            }
            if sec.section_number() == 0 {
                pmt.pcr_pid = pcr_pid;
            }
            for d in &DescriptorList::from_wire(&prog_info)? {
                pmt.descs.push(d.clone());
            }
            while buf.remaining() > 0 {
                let stream_type = buf.get_u8();
                buf.get_bits(3);
                let pid = buf.get_bits(13) as u16;
                buf.get_bits(4);
                let es_info_len = buf.get_bits(12) as usize;
                let es_info = buf.get_bytes(es_info_len);
                if buf.error() {
                    return Err(Error::InvalidStructure("truncated PMT stream entry"));
                }
                let mut stream = PmtStream::new(pid, stream_type);
                stream.descs = DescriptorList::from_wire(&es_info)?;
                pmt.streams.push(stream);
            }
        }
        Ok(pmt)
    }

    fn to_xml(&self, ctx: &SiContext) -> Element {
        let dctx = DescriptorContext::new(ctx, TID_PMT);
        let mut elem = Element::new(Self::XML_NAME);
        elem.set_attr_dec("version", self.version as u64);
        elem.set_attr_bool("current", self.is_current);
        elem.set_attr_dec("service_id", self.service_id as u64);
        elem.set_attr_hex("pcr_pid", self.pcr_pid as u64, 4);
        self.descs.to_xml(&mut elem, dctx);
        for stream in &self.streams {
            let mut child = Element::new("stream");
            child.set_attr_hex("stream_type", stream.stream_type as u64, 2);
            child.set_attr_hex("elementary_pid", stream.elementary_pid as u64, 4);
            stream.descs.to_xml(&mut child, dctx);
            elem.add_child(child);
        }
        elem
    }

    fn from_xml(ctx: &SiContext, elem: &Element) -> Result<Self> {
        let dctx = DescriptorContext::new(ctx, TID_PMT);
        let mut pmt = Pmt::new(
            elem.int_attr("version")?.unwrap_or(0) as u8,
            elem.bool_attr("current", true)?,
            elem.req_int_attr("service_id")? as u16,
            elem.req_int_attr("pcr_pid")? as u16 & 0x1FFF,
        );
        pmt.descs = DescriptorList::from_xml(elem, dctx, &["stream"])?;
        for child in elem.child_elements().filter(|e| e.is_named("stream")) {
            let mut stream = PmtStream::new(
                child.req_int_attr("elementary_pid")? as u16 & 0x1FFF,
                child.req_int_attr("stream_type")? as u8,
            );
            stream.descs = DescriptorList::from_xml(child, dctx, &[])?;
            pmt.streams.push(stream);
        }
        Ok(pmt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desc::Descriptor;

    fn ten_byte_desc(seed: u8) -> Descriptor {
        Descriptor::new(0xC0, vec![seed; 8]).unwrap()
    }

    #[test]
    fn single_section_round_trip() {
        let mut pmt = Pmt::new(2, true, 0x0065, 0x07D0);
        pmt.descs.push(ten_byte_desc(1));
        let mut video = PmtStream::new(0x07D1, 0x1B);
        video.descs.push(ten_byte_desc(2));
        pmt.streams.push(video);
        pmt.streams.push(PmtStream::new(0x07D2, 0x03));

        let bin = pmt.serialize(&SiContext::default()).unwrap();
        assert_eq!(bin.section_count(), 1);
        let back = Pmt::deserialize(&SiContext::default(), &bin).unwrap();
        assert_eq!(back, pmt);
    }

    #[test]
    fn program_descriptors_split_then_streams() {
        // 202 ten-byte program descriptors and one stream with a ten-byte
        // descriptor loop: payloads 1004, 1004, 39.
        let mut pmt = Pmt::new(0, true, 1, 0x0100);
        for i in 0..202u32 {
            pmt.descs.push(ten_byte_desc(i as u8));
        }
        let mut stream = PmtStream::new(0x0101, 0x1B);
        stream.descs.push(ten_byte_desc(0xAA));
        pmt.streams.push(stream);

        let bin = pmt.serialize(&SiContext::default()).unwrap();
        let sizes: Vec<usize> = bin.sections().map(|s| s.payload().len()).collect();
        assert_eq!(sizes, [1004, 1004, 39]);

        let back = Pmt::deserialize(&SiContext::default(), &bin).unwrap();
        assert_eq!(back, pmt);
    }

    #[test]
    fn stream_entries_are_atomic() {
        // 3 program descriptors and 90 twenty-five-byte stream entries:
        // payloads 1009, 1004, 279.
        let mut pmt = Pmt::new(0, true, 1, 0x0100);
        for i in 0..3u8 {
            pmt.descs.push(ten_byte_desc(i));
        }
        for i in 0..90u16 {
            let mut stream = PmtStream::new(0x0200 + i, 0x06);
            stream.descs.push(Descriptor::new(0xC1, vec![0; 8]).unwrap());
            stream.descs.push(Descriptor::new(0xC2, vec![0; 8]).unwrap());
            pmt.streams.push(stream);
        }

        let bin = pmt.serialize(&SiContext::default()).unwrap();
        let sizes: Vec<usize> = bin.sections().map(|s| s.payload().len()).collect();
        assert_eq!(sizes, [1009, 1004, 279]);

        let back = Pmt::deserialize(&SiContext::default(), &bin).unwrap();
        assert_eq!(back, pmt);
    }

    #[test]
    fn oversized_stream_entry_is_overflow() {
        let mut pmt = Pmt::new(0, true, 1, 0x0100);
        let mut stream = PmtStream::new(0x0200, 0x06);
        for _ in 0..5 {
            stream.descs.push(Descriptor::new(0xC0, vec![0; 250]).unwrap());
        }
        pmt.streams.push(stream);
        assert!(matches!(pmt.serialize(&SiContext::default()), Err(Error::Overflow)));
    }
}
