// psi/tot.rs
//! Time Offset Table (table_id 0x73): a short section carrying the UTC
//! time, a descriptor loop, and its own trailing CRC-32. The CRC lives
//! inside the section payload, unlike long sections.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use super::{TID_TOT, Table};
use crate::buffer::{ByteBuffer, crc32_mpeg};
use crate::context::{CrcPolicy, SiContext};
use crate::desc::{DescriptorContext, DescriptorList};
use crate::error::{Error, Result};
use crate::section::Section;
use crate::table::BinaryTable;
use crate::time::{get_mjd_utc, put_mjd_utc};
use crate::xml::Element;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Time (5) + descriptor loop length (2) + CRC (4).
const TOT_OVERHEAD: usize = 11;
const MAX_DESC_LOOP: usize = crate::section::MAX_SHORT_SECTION_PAYLOAD - TOT_OVERHEAD;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tot {
    pub utc_time: DateTime<Utc>,
    pub descs: DescriptorList,
}

impl Tot {
    pub fn new(utc_time: DateTime<Utc>) -> Self {
        Self { utc_time, descs: DescriptorList::new() }
    }
}

impl Table for Tot {
    const XML_NAME: &'static str = "tot";

    fn table_id(&self) -> u8 {
        TID_TOT
    }

    fn serialize(&self, _ctx: &SiContext) -> Result<BinaryTable> {
        if self.descs.size() > MAX_DESC_LOOP {
            return Err(Error::Overflow);
        }
        let mut buf = ByteBuffer::with_capacity(TOT_OVERHEAD + self.descs.size());
        put_mjd_utc(&mut buf, &self.utc_time);
        buf.put_bits(0b1111, 4);
        buf.put_bits(self.descs.size() as u64, 12);
        self.descs.write_to(&mut buf);
        buf.put_u32(0); // CRC placeholder
        if buf.error() {
            return Err(Error::InvalidStructure("unencodable UTC time"));
        }

        // The CRC covers the whole section from table_id on, so seal a
        // draft first, then rebuild the payload with the real value.
        let draft = Section::new_short(TID_TOT, true, buf.as_slice())?;
        let crc = crc32_mpeg(&draft.as_bytes()[..draft.size() - 4]);
        let mut payload = buf.into_vec();
        let at = payload.len() - 4;
        payload[at..].copy_from_slice(&crc.to_be_bytes());
        let mut table = BinaryTable::new();
        table.add_section(Section::new_short(TID_TOT, true, &payload)?);
        Ok(table)
    }

    fn deserialize(ctx: &SiContext, table: &BinaryTable) -> Result<Self> {
        if !table.is_complete() {
            return Err(Error::IncompleteTable);
        }
        if table.table_id() != TID_TOT {
            return Err(Error::WrongTableId { got: table.table_id() });
        }
        let sec = table.section_at(0).ok_or(Error::IncompleteTable)?;
        if !sec.is_short_section() || sec.payload().len() < TOT_OVERHEAD {
            return Err(Error::InvalidStructure("malformed TOT section"));
        }
        if ctx.crc_policy == CrcPolicy::Check {
            let bytes = sec.as_bytes();
            let stored = u32::from_be_bytes([
                bytes[bytes.len() - 4],
                bytes[bytes.len() - 3],
                bytes[bytes.len() - 2],
                bytes[bytes.len() - 1],
            ]);
            if crc32_mpeg(&bytes[..bytes.len() - 4]) != stored {
                return Err(Error::BadCrc);
            }
        }

        let mut buf = ByteBuffer::from_bytes(sec.payload());
        let utc_time = get_mjd_utc(&mut buf)?;
        buf.get_bits(4);
        let loop_len = buf.get_bits(12) as usize;
        let loop_bytes = buf.get_bytes(loop_len);
        if buf.error() || buf.remaining() != 4 {
            return Err(Error::InvalidStructure("malformed TOT descriptor loop"));
        }
        Ok(Self { utc_time, descs: DescriptorList::from_wire(&loop_bytes)? })
    }

    fn to_xml(&self, ctx: &SiContext) -> Element {
        let mut elem = Element::new(Self::XML_NAME);
        elem.set_attr("utc_time", self.utc_time.format(TIME_FORMAT).to_string());
        self.descs.to_xml(&mut elem, DescriptorContext::new(ctx, TID_TOT));
        elem
    }

    fn from_xml(ctx: &SiContext, elem: &Element) -> Result<Self> {
        let text = elem.attr("utc_time").ok_or(Error::InvalidStructure("missing utc_time"))?;
        let time = NaiveDateTime::parse_from_str(text, TIME_FORMAT)
            .map_err(|_| Error::InvalidStructure("unparseable utc_time"))?;
        Ok(Self {
            utc_time: Utc.from_utc_datetime(&time),
            descs: DescriptorList::from_xml(elem, DescriptorContext::new(ctx, TID_TOT), &[])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desc::local_time_offset::{LocalTimeOffsetDescriptor, LocalTimeOffsetEntry};

    fn sample() -> Tot {
        let mut tot = Tot::new(Utc.with_ymd_and_hms(2017, 10, 1, 12, 0, 0).unwrap());
        tot.descs.push(
            LocalTimeOffsetDescriptor {
                entries: vec![LocalTimeOffsetEntry {
                    country: "GBR".into(),
                    region_id: 0,
                    negative: false,
                    offset_minutes: 60,
                    time_of_change: Utc.with_ymd_and_hms(2017, 10, 29, 1, 0, 0).unwrap(),
                    next_offset_minutes: 0,
                }],
            }
            .to_descriptor()
            .unwrap(),
        );
        tot
    }

    #[test]
    fn round_trip_with_crc() {
        let ctx = SiContext::default();
        let tot = sample();
        let bin = tot.serialize(&ctx).unwrap();
        assert!(bin.is_short_section());
        assert_eq!(Tot::deserialize(&ctx, &bin).unwrap(), tot);
    }

    #[test]
    fn corrupted_crc_is_rejected() {
        let ctx = SiContext::default();
        let bin = sample().serialize(&ctx).unwrap();
        let mut bytes = bin.section_at(0).unwrap().as_bytes().to_vec();
        let len = bytes.len();
        bytes[len - 1] ^= 0x01;
        let (sec, _) = Section::parse(&bytes, CrcPolicy::Ignore).unwrap();
        let mut corrupt = BinaryTable::new();
        corrupt.add_section(sec);
        assert!(matches!(Tot::deserialize(&ctx, &corrupt), Err(Error::BadCrc)));

        let lenient = SiContext { crc_policy: CrcPolicy::Ignore, ..SiContext::default() };
        assert!(Tot::deserialize(&lenient, &corrupt).is_ok());
    }
}
