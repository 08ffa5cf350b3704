// psi/sdt.rs
//! Service Description Table (table_id 0x42 actual / 0x46 other-TS).

use super::{TID_SDT_ACTUAL, TID_SDT_OTHER, Table};
use crate::buffer::ByteBuffer;
use crate::context::SiContext;
use crate::desc::{DescriptorContext, DescriptorList};
use crate::error::{Error, Result};
use crate::section::MAX_LONG_SECTION_PAYLOAD;
use crate::segment::{SectionChain, build_long_table};
use crate::table::BinaryTable;
use crate::xml::Element;

/// Repeated in every section: original_network_id plus one reserved byte.
const SDT_PREAMBLE: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdtService {
    pub service_id: u16,
    pub eit_schedule: bool,
    pub eit_present_following: bool,
    pub running_status: u8,
    pub ca_mode: bool,
    pub descs: DescriptorList,
}

impl SdtService {
    pub fn new(service_id: u16) -> Self {
        Self {
            service_id,
            eit_schedule: false,
            eit_present_following: false,
            running_status: 0,
            ca_mode: false,
            descs: DescriptorList::new(),
        }
    }

    fn to_wire(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::with_capacity(5 + self.descs.size());
        buf.put_u16(self.service_id);
        buf.put_bits(0b111111, 6);
        buf.put_bits(self.eit_schedule as u64, 1);
        buf.put_bits(self.eit_present_following as u64, 1);
        buf.put_bits(self.running_status as u64, 3);
        buf.put_bits(self.ca_mode as u64, 1);
        buf.put_bits(self.descs.size() as u64, 12);
        self.descs.write_to(&mut buf);
        buf.into_vec()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sdt {
    /// Actual TS (0x42) or other TS (0x46).
    pub is_actual: bool,
    pub version: u8,
    pub is_current: bool,
    pub ts_id: u16,
    pub onid: u16,
    pub services: Vec<SdtService>,
}

impl Sdt {
    pub fn new(version: u8, is_current: bool, ts_id: u16, onid: u16) -> Self {
        Self { is_actual: true, version, is_current, ts_id, onid, services: Vec::new() }
    }
}

fn write_preamble(cur: &mut Vec<u8>, onid: u16) {
    cur.push((onid >> 8) as u8);
    cur.push(onid as u8);
    cur.push(0xFF);
}

impl Table for Sdt {
    const XML_NAME: &'static str = "sdt";

    fn table_id(&self) -> u8 {
        if self.is_actual { TID_SDT_ACTUAL } else { TID_SDT_OTHER }
    }

    fn serialize(&self, _ctx: &SiContext) -> Result<BinaryTable> {
        let mut chain = SectionChain::new();
        write_preamble(chain.current(), self.onid);
        // Service entries are atomic, descriptor loop included.
        for svc in &self.services {
            let entry = svc.to_wire();
            if entry.len() > MAX_LONG_SECTION_PAYLOAD - SDT_PREAMBLE {
                return Err(Error::Overflow);
            }
            if !chain.fits(entry.len()) {
                chain.close();
                write_preamble(chain.current(), self.onid);
            }
            chain.current().extend_from_slice(&entry);
        }
        build_long_table(
            self.table_id(),
            true,
            self.ts_id,
            self.version,
            self.is_current,
            chain.into_payloads(),
        )
    }

    fn deserialize(_ctx: &SiContext, table: &BinaryTable) -> Result<Self> {
        if !table.is_complete() {
            return Err(Error::IncompleteTable);
        }
        if table.table_id() != TID_SDT_ACTUAL && table.table_id() != TID_SDT_OTHER {
            return Err(Error::WrongTableId { got: table.table_id() });
        }
        let mut sdt = Sdt::new(table.version(), table.is_current(), table.table_id_extension(), 0);
        sdt.is_actual = table.table_id() == TID_SDT_ACTUAL;
        for sec in table.sections() {
            let mut buf = ByteBuffer::from_bytes(sec.payload());
            let onid = buf.get_u16();
            buf.get_u8();
            if sec.section_number() == 0 {
                sdt.onid = onid;
            }
            while buf.remaining() > 0 {
                let service_id = buf.get_u16();
                buf.get_bits(6);
                let eit_schedule = buf.get_bits(1) != 0;
                let eit_present_following = buf.get_bits(1) != 0;
                let running_status = buf.get_bits(3) as u8;
                let ca_mode = buf.get_bits(1) != 0;
                let desc_len = buf.get_bits(12) as usize;
                let desc_bytes = buf.get_bytes(desc_len);
                if buf.error() {
                    return Err(Error::InvalidStructure("truncated SDT service entry"));
                }
                sdt.services.push(SdtService {
                    service_id,
                    eit_schedule,
                    eit_present_following,
                    running_status,
                    ca_mode,
                    descs: DescriptorList::from_wire(&desc_bytes)?,
                });
            }
        }
        Ok(sdt)
    }

    fn to_xml(&self, ctx: &SiContext) -> Element {
        let dctx = DescriptorContext::new(ctx, self.table_id());
        let mut elem = Element::new(Self::XML_NAME);
        elem.set_attr_dec("version", self.version as u64);
        elem.set_attr_bool("current", self.is_current);
        elem.set_attr_hex("transport_stream_id", self.ts_id as u64, 4);
        elem.set_attr_hex("original_network_id", self.onid as u64, 4);
        elem.set_attr_bool("actual", self.is_actual);
        for svc in &self.services {
            let mut child = Element::new("service");
            child.set_attr_dec("service_id", svc.service_id as u64);
            child.set_attr_bool("eit_schedule", svc.eit_schedule);
            child.set_attr_bool("eit_present_following", svc.eit_present_following);
            child.set_attr_dec("running_status", svc.running_status as u64);
            child.set_attr_bool("ca_mode", svc.ca_mode);
            svc.descs.to_xml(&mut child, dctx);
            elem.add_child(child);
        }
        elem
    }

    fn from_xml(ctx: &SiContext, elem: &Element) -> Result<Self> {
        let mut sdt = Sdt::new(
            elem.int_attr("version")?.unwrap_or(0) as u8,
            elem.bool_attr("current", true)?,
            elem.req_int_attr("transport_stream_id")? as u16,
            elem.req_int_attr("original_network_id")? as u16,
        );
        sdt.is_actual = elem.bool_attr("actual", true)?;
        let dctx = DescriptorContext::new(ctx, sdt.table_id());
        for child in elem.child_elements() {
            if child.is_named("metadata") {
                continue;
            }
            if !child.is_named("service") {
                return Err(Error::UnknownElement(child.name().to_string()));
            }
            let mut svc = SdtService::new(child.req_int_attr("service_id")? as u16);
            svc.eit_schedule = child.bool_attr("eit_schedule", false)?;
            svc.eit_present_following = child.bool_attr("eit_present_following", false)?;
            svc.running_status = child.int_attr("running_status")?.unwrap_or(0) as u8 & 0x07;
            svc.ca_mode = child.bool_attr("ca_mode", false)?;
            svc.descs = DescriptorList::from_xml(child, dctx, &[])?;
            sdt.services.push(svc);
        }
        Ok(sdt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desc::service::ServiceDescriptor;

    fn sample() -> Sdt {
        let mut sdt = Sdt::new(9, true, 0x0044, 0x20FA);
        let mut svc = SdtService::new(0x0321);
        svc.eit_present_following = true;
        svc.running_status = 4;
        svc.descs.push(
            ServiceDescriptor {
                service_type: 0x01,
                provider_name: "Prov".into(),
                service_name: "Chan 1".into(),
            }
            .to_descriptor()
            .unwrap(),
        );
        sdt.services.push(svc);
        sdt.services.push(SdtService::new(0x0322));
        sdt
    }

    #[test]
    fn binary_round_trip() {
        let ctx = SiContext::default();
        let sdt = sample();
        let bin = sdt.serialize(&ctx).unwrap();
        assert_eq!(bin.table_id(), TID_SDT_ACTUAL);
        assert_eq!(Sdt::deserialize(&ctx, &bin).unwrap(), sdt);
    }

    #[test]
    fn xml_round_trip() {
        let ctx = SiContext::default();
        let sdt = sample();
        assert_eq!(Sdt::from_xml(&ctx, &sdt.to_xml(&ctx)).unwrap(), sdt);
    }

    #[test]
    fn service_entries_are_atomic_across_sections() {
        let ctx = SiContext::default();
        let mut sdt = Sdt::new(0, true, 1, 2);
        for i in 0..40u16 {
            let mut svc = SdtService::new(i);
            svc.descs.push(crate::desc::Descriptor::new(0xC3, vec![0; 48]).unwrap());
            sdt.services.push(svc);
        }
        // 55-byte entries, 3-byte preamble: 18 per section.
        let bin = sdt.serialize(&ctx).unwrap();
        assert_eq!(bin.section_count(), 3);
        assert_eq!(bin.section_at(0).unwrap().payload().len(), 3 + 18 * 55);
        assert_eq!(Sdt::deserialize(&ctx, &bin).unwrap(), sdt);
    }
}
