// psi/mod.rs
//! Typed PSI/SI tables, one file per family, plus the factory registry
//! connecting table ids and XML element names to the concrete types.

pub mod bat;
pub mod cat;
pub mod eit;
pub mod nit;
pub mod pat;
pub mod pmt;
pub mod sdt;
pub mod tdt;
pub mod tot;
mod transport_list;

pub use bat::Bat;
pub use cat::Cat;
pub use eit::{Eit, EitEvent};
pub use nit::Nit;
pub use pat::Pat;
pub use pmt::{Pmt, PmtStream};
pub use sdt::{Sdt, SdtService};
pub use tdt::Tdt;
pub use tot::Tot;
pub use transport_list::TransportEntry;

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::context::SiContext;
use crate::error::Result;
use crate::table::BinaryTable;
use crate::xml::Element;

pub const TID_PAT: u8 = 0x00;
pub const TID_CAT: u8 = 0x01;
pub const TID_PMT: u8 = 0x02;
pub const TID_NIT_ACTUAL: u8 = 0x40;
pub const TID_NIT_OTHER: u8 = 0x41;
pub const TID_SDT_ACTUAL: u8 = 0x42;
pub const TID_SDT_OTHER: u8 = 0x46;
pub const TID_BAT: u8 = 0x4A;
pub const TID_EIT_PF_ACTUAL: u8 = 0x4E;
pub const TID_EIT_PF_OTHER: u8 = 0x4F;
pub const TID_EIT_SCHED_ACTUAL_MIN: u8 = 0x50;
pub const TID_EIT_SCHED_ACTUAL_MAX: u8 = 0x5F;
pub const TID_EIT_SCHED_OTHER_MIN: u8 = 0x60;
pub const TID_EIT_SCHED_OTHER_MAX: u8 = 0x6F;
pub const TID_TDT: u8 = 0x70;
pub const TID_TOT: u8 = 0x73;

/// The conventional NIT PID, used as the PAT default.
pub const PID_NIT: u16 = 0x0010;

/// Capability set of every concrete table: wire both ways via a
/// [`BinaryTable`], XML both ways via an [`Element`].
pub trait Table: Sized {
    /// Lowercase XML element name.
    const XML_NAME: &'static str;

    fn table_id(&self) -> u8;

    /// Emit the canonical multi-section encoding.
    fn serialize(&self, ctx: &SiContext) -> Result<BinaryTable>;

    /// Populate from a complete binary table.
    fn deserialize(ctx: &SiContext, table: &BinaryTable) -> Result<Self>;

    fn to_xml(&self, ctx: &SiContext) -> Element;

    fn from_xml(ctx: &SiContext, elem: &Element) -> Result<Self>;
}

/// One registered table type.
pub struct TableFactory {
    pub name: &'static str,
    pub handles_id: fn(u8) -> bool,
    pub binary_from_xml: fn(&SiContext, &Element) -> Result<BinaryTable>,
    pub xml_from_binary: fn(&SiContext, &BinaryTable) -> Result<Element>,
}

fn binary_from_xml<T: Table>(ctx: &SiContext, elem: &Element) -> Result<BinaryTable> {
    T::from_xml(ctx, elem)?.serialize(ctx)
}

fn xml_from_binary<T: Table>(ctx: &SiContext, table: &BinaryTable) -> Result<Element> {
    Ok(T::deserialize(ctx, table)?.to_xml(ctx))
}

const fn factory<T: Table>(handles_id: fn(u8) -> bool) -> TableFactory {
    TableFactory {
        name: T::XML_NAME,
        handles_id,
        binary_from_xml: binary_from_xml::<T>,
        xml_from_binary: xml_from_binary::<T>,
    }
}

/// Registration site: each typed table contributes one entry, keyed by
/// element name and by the table ids it claims.
static TABLE_FACTORIES: &[TableFactory] = &[
    factory::<Pat>(|id| id == TID_PAT),
    factory::<Cat>(|id| id == TID_CAT),
    factory::<Pmt>(|id| id == TID_PMT),
    factory::<Nit>(|id| id == TID_NIT_ACTUAL || id == TID_NIT_OTHER),
    factory::<Sdt>(|id| id == TID_SDT_ACTUAL || id == TID_SDT_OTHER),
    factory::<Bat>(|id| id == TID_BAT),
    factory::<Eit>(eit::is_eit_table_id),
    factory::<Tdt>(|id| id == TID_TDT),
    factory::<Tot>(|id| id == TID_TOT),
];

static BY_NAME: LazyLock<HashMap<&'static str, &'static TableFactory>> =
    LazyLock::new(|| TABLE_FACTORIES.iter().map(|f| (f.name, f)).collect());

pub fn factory_by_name(lowercase_name: &str) -> Option<&'static TableFactory> {
    BY_NAME.get(lowercase_name).copied()
}

pub fn factory_by_id(table_id: u8) -> Option<&'static TableFactory> {
    TABLE_FACTORIES.iter().find(|f| (f.handles_id)(table_id))
}
