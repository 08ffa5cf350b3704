// psi/pat.rs
//! Program Association Table (table_id 0x00).

use std::collections::BTreeMap;

use super::{PID_NIT, TID_PAT, Table};
use crate::buffer::ByteBuffer;
use crate::context::SiContext;
use crate::error::{Error, Result};
use crate::segment::{SectionChain, build_long_table};
use crate::table::BinaryTable;
use crate::xml::Element;

/// Each program association is a fixed 4-byte record; a PAT can carry at
/// most one PMT PID per possible program, 8191 of them.
const MAX_PROGRAMS: usize = 8191;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pat {
    pub version: u8,
    pub is_current: bool,
    pub ts_id: u16,
    /// PID announced for program_number 0.
    pub nit_pid: Option<u16>,
    /// program_number → PMT PID, ordered by program_number.
    pub programs: BTreeMap<u16, u16>,
}

impl Pat {
    pub fn new(version: u8, is_current: bool, ts_id: u16) -> Self {
        Self { version, is_current, ts_id, nit_pid: Some(PID_NIT), programs: BTreeMap::new() }
    }
}

impl Table for Pat {
    const XML_NAME: &'static str = "pat";

    fn table_id(&self) -> u8 {
        TID_PAT
    }

    fn serialize(&self, _ctx: &SiContext) -> Result<BinaryTable> {
        if self.programs.len() > MAX_PROGRAMS {
            return Err(Error::InvalidStructure("too many programs in PAT"));
        }
        let mut records: Vec<(u16, u16)> = Vec::with_capacity(self.programs.len() + 1);
        if let Some(pid) = self.nit_pid {
            records.push((0, pid));
        }
        records.extend(self.programs.iter().map(|(pn, pid)| (*pn, *pid)));

        let mut chain = SectionChain::new();
        for (pn, pid) in records {
            let mut rec = ByteBuffer::with_capacity(4);
            rec.put_u16(pn);
            rec.put_bits(0b111, 3);
            rec.put_bits(pid as u64, 13);
            chain.push_atomic(rec.as_slice())?;
        }
        build_long_table(TID_PAT, false, self.ts_id, self.version, self.is_current, chain.into_payloads())
    }

    fn deserialize(_ctx: &SiContext, table: &BinaryTable) -> Result<Self> {
        if !table.is_complete() {
            return Err(Error::IncompleteTable);
        }
        if table.table_id() != TID_PAT {
            return Err(Error::WrongTableId { got: table.table_id() });
        }
        if !table.is_long_section() {
            return Err(Error::InvalidStructure("PAT must use long sections"));
        }
        let mut pat = Pat {
            version: table.version(),
            is_current: table.is_current(),
            ts_id: table.table_id_extension(),
            nit_pid: None,
            programs: BTreeMap::new(),
        };
        for sec in table.sections() {
            if sec.payload().len() % 4 != 0 {
                return Err(Error::InvalidStructure("truncated PAT record"));
            }
            let mut buf = ByteBuffer::from_bytes(sec.payload());
            while buf.remaining() > 0 {
                let pn = buf.get_u16();
                buf.get_bits(3);
                let pid = buf.get_bits(13) as u16;
                if pn == 0 {
                    pat.nit_pid = Some(pid);
                } else {
                    pat.programs.insert(pn, pid);
                }
            }
        }
        Ok(pat)
    }

    fn to_xml(&self, _ctx: &SiContext) -> Element {
        let mut elem = Element::new(Self::XML_NAME);
        elem.set_attr_dec("version", self.version as u64);
        elem.set_attr_bool("current", self.is_current);
        elem.set_attr_hex("transport_stream_id", self.ts_id as u64, 4);
        if let Some(pid) = self.nit_pid {
            elem.set_attr_hex("network_pid", pid as u64, 4);
        }
        for (pn, pid) in &self.programs {
            let mut svc = Element::new("service");
            svc.set_attr_dec("service_id", *pn as u64);
            svc.set_attr_hex("program_map_pid", *pid as u64, 4);
            elem.add_child(svc);
        }
        elem
    }

    fn from_xml(_ctx: &SiContext, elem: &Element) -> Result<Self> {
        let mut pat = Pat {
            version: elem.int_attr("version")?.unwrap_or(0) as u8,
            is_current: elem.bool_attr("current", true)?,
            ts_id: elem.req_int_attr("transport_stream_id")? as u16,
            nit_pid: elem.int_attr("network_pid")?.map(|pid| pid as u16 & 0x1FFF),
            programs: BTreeMap::new(),
        };
        for child in elem.child_elements() {
            if child.is_named("metadata") {
                continue;
            }
            if !child.is_named("service") {
                return Err(Error::UnknownElement(child.name().to_string()));
            }
            let pn = child.req_int_attr("service_id")? as u16;
            let pid = child.req_int_attr("program_map_pid")? as u16 & 0x1FFF;
            pat.programs.insert(pn, pid);
        }
        Ok(pat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_pat_round_trip() {
        let mut pat = Pat::new(7, true, 0x1234);
        pat.programs.insert(1, 0x0101);
        pat.programs.insert(2, 0x0102);

        let bin = pat.serialize(&SiContext::default()).unwrap();
        assert_eq!(bin.section_count(), 1);
        // 3 records: NIT + 2 programs.
        assert_eq!(bin.section_at(0).unwrap().payload().len(), 12);

        let back = Pat::deserialize(&SiContext::default(), &bin).unwrap();
        assert_eq!(back, pat);
        assert_eq!(back.nit_pid, Some(PID_NIT));
    }

    #[test]
    fn segmentation_at_253_records_per_section() {
        // 305 programs and no NIT entry: 253 records in the first
        // section (1012 bytes), 52 in the second.
        let mut pat = Pat::new(0, true, 1);
        pat.nit_pid = None;
        for pn in 1..=305u16 {
            pat.programs.insert(pn, 0x100 + pn);
        }
        let bin = pat.serialize(&SiContext::default()).unwrap();
        assert_eq!(bin.section_count(), 2);
        assert_eq!(bin.section_at(0).unwrap().payload().len(), 1012);
        assert_eq!(bin.section_at(1).unwrap().payload().len(), 208);

        let back = Pat::deserialize(&SiContext::default(), &bin).unwrap();
        assert_eq!(back, pat);
    }

    #[test]
    fn xml_round_trip() {
        let ctx = SiContext::default();
        let mut pat = Pat::new(3, false, 0xBEEF);
        pat.programs.insert(100, 0x0200);
        let back = Pat::from_xml(&ctx, &pat.to_xml(&ctx)).unwrap();
        assert_eq!(back, pat);
    }
}
