// desc/local_time_offset.rs
//! Local time offset descriptor (tag 0x58, DVB), carried by the TOT.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use super::{DTAG_LOCAL_TIME_OFFSET, Descriptor, DescriptorContext, DescriptorFactory};
use crate::buffer::ByteBuffer;
use crate::context::Standard;
use crate::error::{Error, Result};
use crate::time::{get_mjd_utc, put_mjd_utc};
use crate::xml::Element;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One country/region entry; both offsets share the polarity bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTimeOffsetEntry {
    /// ISO 3166 alpha-3 country code.
    pub country: String,
    pub region_id: u8,
    pub negative: bool,
    pub offset_minutes: u32,
    pub time_of_change: DateTime<Utc>,
    pub next_offset_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocalTimeOffsetDescriptor {
    pub entries: Vec<LocalTimeOffsetEntry>,
}

impl LocalTimeOffsetDescriptor {
    pub fn from_descriptor(desc: &Descriptor) -> Result<Self> {
        if desc.tag() != DTAG_LOCAL_TIME_OFFSET {
            return Err(Error::InvalidStructure("not a local_time_offset descriptor"));
        }
        let mut buf = ByteBuffer::from_bytes(desc.payload());
        let mut entries = Vec::new();
        while buf.remaining() >= 13 {
            let country = buf.get_bytes(3).iter().map(|&b| b as char).collect();
            let region_id = buf.get_bits(6) as u8;
            buf.get_bits(1);
            let negative = buf.get_bits(1) != 0;
            let offset_minutes = buf.get_bcd(2) * 60 + buf.get_bcd(2);
            let time_of_change = get_mjd_utc(&mut buf)?;
            let next_offset_minutes = buf.get_bcd(2) * 60 + buf.get_bcd(2);
            if buf.error() {
                return Err(Error::InvalidLength);
            }
            entries.push(LocalTimeOffsetEntry {
                country,
                region_id,
                negative,
                offset_minutes,
                time_of_change,
                next_offset_minutes,
            });
        }
        if buf.remaining() != 0 {
            return Err(Error::InvalidLength);
        }
        Ok(Self { entries })
    }

    pub fn to_descriptor(&self) -> Result<Descriptor> {
        let mut buf = ByteBuffer::with_capacity(self.entries.len() * 13);
        for e in &self.entries {
            if e.country.len() != 3 || !e.country.is_ascii() {
                return Err(Error::InvalidStructure("country code must be three characters"));
            }
            buf.put_bytes(e.country.as_bytes());
            buf.put_bits(e.region_id as u64, 6);
            buf.put_bits(0b1, 1);
            buf.put_bits(e.negative as u64, 1);
            buf.put_bcd(e.offset_minutes / 60, 2);
            buf.put_bcd(e.offset_minutes % 60, 2);
            put_mjd_utc(&mut buf, &e.time_of_change);
            buf.put_bcd(e.next_offset_minutes / 60, 2);
            buf.put_bcd(e.next_offset_minutes % 60, 2);
        }
        if buf.error() {
            return Err(Error::InvalidStructure("unencodable local time offset"));
        }
        Descriptor::new(DTAG_LOCAL_TIME_OFFSET, buf.into_vec())
    }

    pub fn to_element(&self) -> Element {
        let mut elem = Element::new(FACTORY.name);
        for e in &self.entries {
            let mut region = Element::new("region");
            region.set_attr("country", e.country.as_str());
            region.set_attr_dec("region_id", e.region_id as u64);
            region.set_attr_bool("negative", e.negative);
            region.set_attr_dec("local_time_offset", e.offset_minutes as u64);
            region.set_attr("time_of_change", e.time_of_change.format(TIME_FORMAT).to_string());
            region.set_attr_dec("next_time_offset", e.next_offset_minutes as u64);
            elem.add_child(region);
        }
        elem
    }

    pub fn from_element(elem: &Element) -> Result<Self> {
        let mut entries = Vec::new();
        for region in elem.child_elements().filter(|e| e.is_named("region")) {
            let time = region
                .attr("time_of_change")
                .ok_or(Error::InvalidStructure("missing time_of_change"))?;
            let time = NaiveDateTime::parse_from_str(time, TIME_FORMAT)
                .map_err(|_| Error::InvalidStructure("unparseable time_of_change"))?;
            entries.push(LocalTimeOffsetEntry {
                country: region
                    .attr("country")
                    .ok_or(Error::InvalidStructure("missing country"))?
                    .to_string(),
                region_id: region.req_int_attr("region_id")? as u8 & 0x3F,
                negative: region.bool_attr("negative", false)?,
                offset_minutes: region.req_int_attr("local_time_offset")? as u32,
                time_of_change: Utc.from_utc_datetime(&time),
                next_offset_minutes: region.req_int_attr("next_time_offset")? as u32,
            });
        }
        Ok(Self { entries })
    }
}

fn from_xml(elem: &Element, _ctx: &DescriptorContext) -> Result<Descriptor> {
    LocalTimeOffsetDescriptor::from_element(elem)?.to_descriptor()
}

fn to_xml(desc: &Descriptor, _ctx: &DescriptorContext) -> Result<Element> {
    Ok(LocalTimeOffsetDescriptor::from_descriptor(desc)?.to_element())
}

pub(crate) const FACTORY: DescriptorFactory = DescriptorFactory {
    name: "local_time_offset_descriptor",
    tag: DTAG_LOCAL_TIME_OFFSET,
    standard: Standard::Dvb,
    pds: None,
    from_xml,
    to_xml,
};
