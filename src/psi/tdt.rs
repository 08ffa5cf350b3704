// psi/tdt.rs
//! Time and Date Table (table_id 0x70): a short section carrying one
//! 40-bit MJD+BCD UTC instant, no CRC.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use super::{TID_TDT, Table};
use crate::buffer::ByteBuffer;
use crate::context::SiContext;
use crate::error::{Error, Result};
use crate::segment::build_short_table;
use crate::table::BinaryTable;
use crate::time::{get_mjd_utc, put_mjd_utc};
use crate::xml::Element;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tdt {
    pub utc_time: DateTime<Utc>,
}

impl Tdt {
    pub fn new(utc_time: DateTime<Utc>) -> Self {
        Self { utc_time }
    }
}

impl Table for Tdt {
    const XML_NAME: &'static str = "tdt";

    fn table_id(&self) -> u8 {
        TID_TDT
    }

    fn serialize(&self, _ctx: &SiContext) -> Result<BinaryTable> {
        let mut buf = ByteBuffer::with_capacity(5);
        put_mjd_utc(&mut buf, &self.utc_time);
        if buf.error() {
            return Err(Error::InvalidStructure("unencodable UTC time"));
        }
        build_short_table(TID_TDT, true, buf.as_slice())
    }

    fn deserialize(_ctx: &SiContext, table: &BinaryTable) -> Result<Self> {
        if !table.is_complete() {
            return Err(Error::IncompleteTable);
        }
        if table.table_id() != TID_TDT {
            return Err(Error::WrongTableId { got: table.table_id() });
        }
        let sec = table.section_at(0).ok_or(Error::IncompleteTable)?;
        if !sec.is_short_section() {
            return Err(Error::InvalidStructure("TDT must use a short section"));
        }
        let mut buf = ByteBuffer::from_bytes(sec.payload());
        Ok(Self { utc_time: get_mjd_utc(&mut buf)? })
    }

    fn to_xml(&self, _ctx: &SiContext) -> Element {
        let mut elem = Element::new(Self::XML_NAME);
        elem.set_attr("utc_time", self.utc_time.format(TIME_FORMAT).to_string());
        elem
    }

    fn from_xml(_ctx: &SiContext, elem: &Element) -> Result<Self> {
        let text = elem.attr("utc_time").ok_or(Error::InvalidStructure("missing utc_time"))?;
        let time = NaiveDateTime::parse_from_str(text, TIME_FORMAT)
            .map_err(|_| Error::InvalidStructure("unparseable utc_time"))?;
        Ok(Self { utc_time: Utc.from_utc_datetime(&time) })
    }
}
