// psi/bat.rs
//! Bouquet Association Table (table_id 0x4A). Same body layout as the
//! NIT: bouquet descriptors, then a transport stream loop.

use super::transport_list::{
    TransportEntry, deserialize_body, serialize_body, transports_from_xml, transports_to_xml,
};
use super::{TID_BAT, Table};
use crate::context::SiContext;
use crate::desc::{DescriptorContext, DescriptorList};
use crate::error::{Error, Result};
use crate::segment::build_long_table;
use crate::table::BinaryTable;
use crate::xml::Element;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bat {
    pub version: u8,
    pub is_current: bool,
    pub bouquet_id: u16,
    pub descs: DescriptorList,
    pub transports: Vec<TransportEntry>,
}

impl Bat {
    pub fn new(version: u8, is_current: bool, bouquet_id: u16) -> Self {
        Self {
            version,
            is_current,
            bouquet_id,
            descs: DescriptorList::new(),
            transports: Vec::new(),
        }
    }
}

impl Table for Bat {
    const XML_NAME: &'static str = "bat";

    fn table_id(&self) -> u8 {
        TID_BAT
    }

    fn serialize(&self, _ctx: &SiContext) -> Result<BinaryTable> {
        let payloads = serialize_body(&self.descs, &self.transports)?;
        build_long_table(TID_BAT, true, self.bouquet_id, self.version, self.is_current, payloads)
    }

    fn deserialize(_ctx: &SiContext, table: &BinaryTable) -> Result<Self> {
        if !table.is_complete() {
            return Err(Error::IncompleteTable);
        }
        if table.table_id() != TID_BAT {
            return Err(Error::WrongTableId { got: table.table_id() });
        }
        let (descs, transports) = deserialize_body(table)?;
        Ok(Self {
            version: table.version(),
            is_current: table.is_current(),
            bouquet_id: table.table_id_extension(),
            descs,
            transports,
        })
    }

    fn to_xml(&self, ctx: &SiContext) -> Element {
        let dctx = DescriptorContext::new(ctx, TID_BAT);
        let mut elem = Element::new(Self::XML_NAME);
        elem.set_attr_dec("version", self.version as u64);
        elem.set_attr_bool("current", self.is_current);
        elem.set_attr_hex("bouquet_id", self.bouquet_id as u64, 4);
        self.descs.to_xml(&mut elem, dctx);
        transports_to_xml(&mut elem, &self.transports, dctx);
        elem
    }

    fn from_xml(ctx: &SiContext, elem: &Element) -> Result<Self> {
        let dctx = DescriptorContext::new(ctx, TID_BAT);
        let mut bat = Bat::new(
            elem.int_attr("version")?.unwrap_or(0) as u8,
            elem.bool_attr("current", true)?,
            elem.req_int_attr("bouquet_id")? as u16,
        );
        bat.descs = DescriptorList::from_xml(elem, dctx, &["transport_stream"])?;
        bat.transports = transports_from_xml(elem, dctx)?;
        Ok(bat)
    }
}
