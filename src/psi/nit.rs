// psi/nit.rs
//! Network Information Table (table_id 0x40 actual / 0x41 other).

use super::transport_list::{
    TransportEntry, deserialize_body, serialize_body, transports_from_xml, transports_to_xml,
};
use super::{TID_NIT_ACTUAL, TID_NIT_OTHER, Table};
use crate::context::SiContext;
use crate::desc::{DescriptorContext, DescriptorList};
use crate::error::{Error, Result};
use crate::segment::build_long_table;
use crate::table::BinaryTable;
use crate::xml::Element;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nit {
    /// Actual network (0x40) or other network (0x41).
    pub is_actual: bool,
    pub version: u8,
    pub is_current: bool,
    pub network_id: u16,
    pub descs: DescriptorList,
    pub transports: Vec<TransportEntry>,
}

impl Nit {
    pub fn new(version: u8, is_current: bool, network_id: u16) -> Self {
        Self {
            is_actual: true,
            version,
            is_current,
            network_id,
            descs: DescriptorList::new(),
            transports: Vec::new(),
        }
    }
}

impl Table for Nit {
    const XML_NAME: &'static str = "nit";

    fn table_id(&self) -> u8 {
        if self.is_actual { TID_NIT_ACTUAL } else { TID_NIT_OTHER }
    }

    fn serialize(&self, _ctx: &SiContext) -> Result<BinaryTable> {
        let payloads = serialize_body(&self.descs, &self.transports)?;
        build_long_table(self.table_id(), true, self.network_id, self.version, self.is_current, payloads)
    }

    fn deserialize(_ctx: &SiContext, table: &BinaryTable) -> Result<Self> {
        if !table.is_complete() {
            return Err(Error::IncompleteTable);
        }
        if table.table_id() != TID_NIT_ACTUAL && table.table_id() != TID_NIT_OTHER {
            return Err(Error::WrongTableId { got: table.table_id() });
        }
        let (descs, transports) = deserialize_body(table)?;
        Ok(Self {
            is_actual: table.table_id() == TID_NIT_ACTUAL,
            version: table.version(),
            is_current: table.is_current(),
            network_id: table.table_id_extension(),
            descs,
            transports,
        })
    }

    fn to_xml(&self, ctx: &SiContext) -> Element {
        let dctx = DescriptorContext::new(ctx, self.table_id());
        let mut elem = Element::new(Self::XML_NAME);
        elem.set_attr_dec("version", self.version as u64);
        elem.set_attr_bool("current", self.is_current);
        elem.set_attr_hex("network_id", self.network_id as u64, 4);
        elem.set_attr_bool("actual", self.is_actual);
        self.descs.to_xml(&mut elem, dctx);
        transports_to_xml(&mut elem, &self.transports, dctx);
        elem
    }

    fn from_xml(ctx: &SiContext, elem: &Element) -> Result<Self> {
        let mut nit = Nit::new(
            elem.int_attr("version")?.unwrap_or(0) as u8,
            elem.bool_attr("current", true)?,
            elem.req_int_attr("network_id")? as u16,
        );
        nit.is_actual = elem.bool_attr("actual", true)?;
        let dctx = DescriptorContext::new(ctx, nit.table_id());
        nit.descs = DescriptorList::from_xml(elem, dctx, &["transport_stream"])?;
        nit.transports = transports_from_xml(elem, dctx)?;
        Ok(nit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desc::network_name::NetworkNameDescriptor;

    #[test]
    fn nit_round_trips_both_ways() {
        let ctx = SiContext::default();
        let mut nit = Nit::new(4, true, 0x3001);
        nit.descs.push(NetworkNameDescriptor { name: "Test Net".into() }.to_descriptor().unwrap());
        let mut t = TransportEntry::new(0x0044, 0x20FA);
        t.descs.push(NetworkNameDescriptor { name: "T".into() }.to_descriptor().unwrap());
        nit.transports.push(t);

        let bin = nit.serialize(&ctx).unwrap();
        assert_eq!(bin.table_id(), TID_NIT_ACTUAL);
        assert_eq!(Nit::deserialize(&ctx, &bin).unwrap(), nit);

        let back = Nit::from_xml(&ctx, &nit.to_xml(&ctx)).unwrap();
        assert_eq!(back, nit);
    }
}
