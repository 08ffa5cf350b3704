// psi/cat.rs
//! Conditional Access Table (table_id 0x01): one descriptor loop, no
//! fixed body.

use super::{TID_CAT, Table};
use crate::context::SiContext;
use crate::desc::{DescriptorContext, DescriptorList};
use crate::error::{Error, Result};
use crate::segment::{SectionChain, build_long_table};
use crate::table::BinaryTable;
use crate::xml::Element;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cat {
    pub version: u8,
    pub is_current: bool,
    pub descs: DescriptorList,
}

impl Cat {
    pub fn new(version: u8, is_current: bool) -> Self {
        Self { version, is_current, descs: DescriptorList::new() }
    }
}

impl Table for Cat {
    const XML_NAME: &'static str = "cat";

    fn table_id(&self) -> u8 {
        TID_CAT
    }

    fn serialize(&self, _ctx: &SiContext) -> Result<BinaryTable> {
        // Descriptors are atomic; the loop may split between sections.
        let mut chain = SectionChain::new();
        for d in &self.descs {
            chain.push_atomic(&d.to_wire())?;
        }
        build_long_table(TID_CAT, false, 0xFFFF, self.version, self.is_current, chain.into_payloads())
    }

    fn deserialize(_ctx: &SiContext, table: &BinaryTable) -> Result<Self> {
        if !table.is_complete() {
            return Err(Error::IncompleteTable);
        }
        if table.table_id() != TID_CAT {
            return Err(Error::WrongTableId { got: table.table_id() });
        }
        if !table.is_long_section() {
            return Err(Error::InvalidStructure("CAT must use long sections"));
        }
        let mut cat = Cat::new(table.version(), table.is_current());
        for sec in table.sections() {
            for d in &DescriptorList::from_wire(sec.payload())? {
                cat.descs.push(d.clone());
            }
        }
        Ok(cat)
    }

    fn to_xml(&self, ctx: &SiContext) -> Element {
        let mut elem = Element::new(Self::XML_NAME);
        elem.set_attr_dec("version", self.version as u64);
        elem.set_attr_bool("current", self.is_current);
        self.descs.to_xml(&mut elem, DescriptorContext::new(ctx, TID_CAT));
        elem
    }

    fn from_xml(ctx: &SiContext, elem: &Element) -> Result<Self> {
        Ok(Self {
            version: elem.int_attr("version")?.unwrap_or(0) as u8,
            is_current: elem.bool_attr("current", true)?,
            descs: DescriptorList::from_xml(elem, DescriptorContext::new(ctx, TID_CAT), &[])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desc::Descriptor;

    #[test]
    fn descriptor_loop_splits_at_descriptor_boundaries() {
        // 300 ten-byte descriptors: 101 + 101 + 98.
        let mut cat = Cat::new(1, true);
        for i in 0..300u32 {
            cat.descs.push(Descriptor::new(0x09, vec![i as u8; 8]).unwrap());
        }
        let bin = cat.serialize(&SiContext::default()).unwrap();
        assert_eq!(bin.section_count(), 3);
        let sizes: Vec<usize> = bin.sections().map(|s| s.payload().len()).collect();
        assert_eq!(sizes, [1010, 1010, 980]);

        let back = Cat::deserialize(&SiContext::default(), &bin).unwrap();
        assert_eq!(back, cat);
    }

    #[test]
    fn tid_extension_is_conventional() {
        let bin = Cat::new(0, true).serialize(&SiContext::default()).unwrap();
        assert_eq!(bin.table_id_extension(), 0xFFFF);
    }
}
