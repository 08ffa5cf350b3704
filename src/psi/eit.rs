// psi/eit.rs
//! Event Information Table: present/following (0x4E/0x4F) and schedule
//! (0x50-0x5F actual, 0x60-0x6F other).
//!
//! Schedule tables are laid out in segments: each segment covers a
//! 3-hour slot and holds at most 8 sections; every section carries the
//! segment_last_section_number of its own segment.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Timelike, Utc};

use super::{
    TID_EIT_PF_ACTUAL, TID_EIT_PF_OTHER, TID_EIT_SCHED_ACTUAL_MIN, TID_EIT_SCHED_OTHER_MAX,
    TID_EIT_SCHED_OTHER_MIN, Table,
};
use crate::buffer::ByteBuffer;
use crate::context::SiContext;
use crate::desc::{DescriptorContext, DescriptorList};
use crate::error::{Error, Result};
use crate::section::MAX_LONG_SECTION_PAYLOAD;
use crate::segment::build_long_table;
use crate::table::BinaryTable;
use crate::time::{get_bcd_duration, get_mjd_utc, put_bcd_duration, put_mjd_utc};
use crate::xml::Element;

/// Repeated in every section: transport_stream_id, original_network_id,
/// segment_last_section_number, last_table_id.
const EIT_PREAMBLE: usize = 6;
const EVENT_BUDGET: usize = MAX_LONG_SECTION_PAYLOAD - EIT_PREAMBLE;
const SECTIONS_PER_SEGMENT: usize = 8;
/// A schedule table covers 4 days in 3-hour slots.
const SEGMENTS_PER_TABLE: usize = 32;
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn is_eit_table_id(id: u8) -> bool {
    (TID_EIT_PF_ACTUAL..=TID_EIT_SCHED_OTHER_MAX).contains(&id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EitEvent {
    pub event_id: u16,
    pub start_time: DateTime<Utc>,
    /// Duration in seconds, BCD hh:mm:ss on the wire.
    pub duration: u32,
    pub running_status: u8,
    pub ca_mode: bool,
    pub descs: DescriptorList,
}

impl EitEvent {
    pub fn new(event_id: u16, start_time: DateTime<Utc>, duration: u32) -> Self {
        Self { event_id, start_time, duration, running_status: 0, ca_mode: false, descs: DescriptorList::new() }
    }

    fn to_wire(&self) -> Result<Vec<u8>> {
        let mut buf = ByteBuffer::with_capacity(12 + self.descs.size());
        buf.put_u16(self.event_id);
        put_mjd_utc(&mut buf, &self.start_time);
        put_bcd_duration(&mut buf, self.duration);
        buf.put_bits(self.running_status as u64, 3);
        buf.put_bits(self.ca_mode as u64, 1);
        buf.put_bits(self.descs.size() as u64, 12);
        self.descs.write_to(&mut buf);
        if buf.error() {
            return Err(Error::InvalidStructure("unencodable event time"));
        }
        Ok(buf.into_vec())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eit {
    pub table_id: u8,
    pub version: u8,
    pub is_current: bool,
    pub service_id: u16,
    pub ts_id: u16,
    pub onid: u16,
    pub last_table_id: u8,
    pub events: Vec<EitEvent>,
}

impl Eit {
    pub fn new_pf(actual: bool, version: u8, service_id: u16, ts_id: u16, onid: u16) -> Self {
        let table_id = if actual { TID_EIT_PF_ACTUAL } else { TID_EIT_PF_OTHER };
        Self {
            table_id,
            version,
            is_current: true,
            service_id,
            ts_id,
            onid,
            last_table_id: table_id,
            events: Vec::new(),
        }
    }

    /// Schedule table number `index` (0..=15) of this service.
    pub fn new_schedule(actual: bool, index: u8, version: u8, service_id: u16, ts_id: u16, onid: u16) -> Self {
        let base = if actual { TID_EIT_SCHED_ACTUAL_MIN } else { TID_EIT_SCHED_OTHER_MIN };
        let table_id = base + (index & 0x0F);
        Self {
            table_id,
            version,
            is_current: true,
            service_id,
            ts_id,
            onid,
            last_table_id: table_id,
            events: Vec::new(),
        }
    }

    pub fn is_present_following(&self) -> bool {
        self.table_id == TID_EIT_PF_ACTUAL || self.table_id == TID_EIT_PF_OTHER
    }

    pub fn is_actual(&self) -> bool {
        self.table_id == TID_EIT_PF_ACTUAL
            || (TID_EIT_SCHED_ACTUAL_MIN..TID_EIT_SCHED_OTHER_MIN).contains(&self.table_id)
    }

    fn preamble(&self, segment_last: u8) -> Vec<u8> {
        let mut buf = ByteBuffer::with_capacity(EIT_PREAMBLE);
        buf.put_u16(self.ts_id);
        buf.put_u16(self.onid);
        buf.put_u8(segment_last);
        buf.put_u8(self.last_table_id);
        buf.into_vec()
    }

    /// Present/following: always two sections, the present event in
    /// section 0 and the following event in section 1.
    fn serialize_pf(&self) -> Result<Vec<Vec<u8>>> {
        if self.events.len() > 2 {
            return Err(Error::InvalidStructure("present/following holds at most two events"));
        }
        let mut payloads = Vec::with_capacity(2);
        for slot in 0..2 {
            let mut payload = self.preamble(1);
            if let Some(event) = self.events.get(slot) {
                payload.extend_from_slice(&event.to_wire()?);
            }
            payloads.push(payload);
        }
        Ok(payloads)
    }

    /// Schedule: events sorted by start time, partitioned into 3-hour
    /// slots counted from the midnight preceding the first event.
    fn serialize_schedule(&self) -> Result<Vec<Vec<u8>>> {
        let mut events: Vec<&EitEvent> = self.events.iter().collect();
        events.sort_by_key(|e| (e.start_time, e.event_id));

        let Some(first) = events.first() else {
            return Ok(vec![self.preamble(0)]);
        };
        let origin = first
            .start_time
            .with_hour(0)
            .and_then(|t| t.with_minute(0))
            .and_then(|t| t.with_second(0))
            .ok_or(Error::InvalidStructure("unrepresentable event time"))?;

        // slot index → packed section bodies for that segment
        let mut slots: BTreeMap<usize, Vec<Vec<u8>>> = BTreeMap::new();
        for event in events {
            let hours = (event.start_time - origin).num_hours();
            let slot = (hours / 3) as usize;
            if slot >= SEGMENTS_PER_TABLE {
                return Err(Error::InvalidStructure("schedule events span more than four days"));
            }
            let wire = event.to_wire()?;
            if wire.len() > EVENT_BUDGET {
                return Err(Error::Overflow);
            }
            let segment = slots.entry(slot).or_default();
            match segment.last_mut() {
                Some(cur) if cur.len() + wire.len() <= EVENT_BUDGET => cur.extend_from_slice(&wire),
                _ => {
                    if segment.len() == SECTIONS_PER_SEGMENT {
                        return Err(Error::Overflow);
                    }
                    segment.push(wire);
                }
            }
        }

        let last_slot = slots.keys().last().copied().unwrap_or(0);
        let mut payloads = Vec::new();
        for slot in 0..=last_slot {
            let bodies = slots.remove(&slot).unwrap_or_else(|| vec![Vec::new()]);
            let segment_last = (payloads.len() + bodies.len() - 1) as u8;
            for body in bodies {
                let mut payload = self.preamble(segment_last);
                payload.extend_from_slice(&body);
                payloads.push(payload);
            }
        }
        Ok(payloads)
    }
}

impl Table for Eit {
    const XML_NAME: &'static str = "eit";

    fn table_id(&self) -> u8 {
        self.table_id
    }

    fn serialize(&self, _ctx: &SiContext) -> Result<BinaryTable> {
        if !is_eit_table_id(self.table_id) {
            return Err(Error::WrongTableId { got: self.table_id });
        }
        let payloads =
            if self.is_present_following() { self.serialize_pf()? } else { self.serialize_schedule()? };
        build_long_table(self.table_id, true, self.service_id, self.version, self.is_current, payloads)
    }

    fn deserialize(_ctx: &SiContext, table: &BinaryTable) -> Result<Self> {
        if !table.is_complete() {
            return Err(Error::IncompleteTable);
        }
        if !is_eit_table_id(table.table_id()) {
            return Err(Error::WrongTableId { got: table.table_id() });
        }
        let mut eit = Eit {
            table_id: table.table_id(),
            version: table.version(),
            is_current: table.is_current(),
            service_id: table.table_id_extension(),
            ts_id: 0,
            onid: 0,
            last_table_id: table.table_id(),
            events: Vec::new(),
        };
        for sec in table.sections() {
            let mut buf = ByteBuffer::from_bytes(sec.payload());
            let ts_id = buf.get_u16();
            let onid = buf.get_u16();
            buf.get_u8(); // segment_last_section_number, recomputed on emission
            let last_table_id = buf.get_u8();
            if buf.error() {
                return Err(Error::InvalidLength);
            }
            if sec.section_number() == 0 {
                eit.ts_id = ts_id;
                eit.onid = onid;
                eit.last_table_id = last_table_id;
            }
            while buf.remaining() > 0 {
                let event_id = buf.get_u16();
                let start_time = get_mjd_utc(&mut buf)?;
                let duration = get_bcd_duration(&mut buf)?;
                let running_status = buf.get_bits(3) as u8;
                let ca_mode = buf.get_bits(1) != 0;
                let desc_len = buf.get_bits(12) as usize;
                let desc_bytes = buf.get_bytes(desc_len);
                if buf.error() {
                    return Err(Error::InvalidStructure("truncated EIT event"));
                }
                eit.events.push(EitEvent {
                    event_id,
                    start_time,
                    duration,
                    running_status,
                    ca_mode,
                    descs: DescriptorList::from_wire(&desc_bytes)?,
                });
            }
        }
        Ok(eit)
    }

    fn to_xml(&self, ctx: &SiContext) -> Element {
        let dctx = DescriptorContext::new(ctx, self.table_id);
        let mut elem = Element::new(Self::XML_NAME);
        if self.is_present_following() {
            elem.set_attr("type", "pf");
        } else {
            let base = if self.is_actual() { TID_EIT_SCHED_ACTUAL_MIN } else { TID_EIT_SCHED_OTHER_MIN };
            elem.set_attr_dec("type", (self.table_id - base) as u64);
        }
        elem.set_attr_bool("actual", self.is_actual());
        elem.set_attr_dec("version", self.version as u64);
        elem.set_attr_bool("current", self.is_current);
        elem.set_attr_dec("service_id", self.service_id as u64);
        elem.set_attr_hex("transport_stream_id", self.ts_id as u64, 4);
        elem.set_attr_hex("original_network_id", self.onid as u64, 4);
        elem.set_attr_hex("last_table_id", self.last_table_id as u64, 2);
        for event in &self.events {
            let mut child = Element::new("event");
            child.set_attr_dec("event_id", event.event_id as u64);
            child.set_attr("start_time", event.start_time.format(TIME_FORMAT).to_string());
            child.set_attr_dec("duration", event.duration as u64);
            child.set_attr_dec("running_status", event.running_status as u64);
            child.set_attr_bool("ca_mode", event.ca_mode);
            event.descs.to_xml(&mut child, dctx);
            elem.add_child(child);
        }
        elem
    }

    fn from_xml(ctx: &SiContext, elem: &Element) -> Result<Self> {
        let actual = elem.bool_attr("actual", true)?;
        let type_attr = elem.attr("type").unwrap_or("pf");
        let mut eit = if type_attr.eq_ignore_ascii_case("pf") {
            Eit::new_pf(actual, 0, 0, 0, 0)
        } else {
            let index = type_attr
                .parse::<u8>()
                .map_err(|_| Error::InvalidStructure("invalid EIT type"))?;
            if index > 15 {
                return Err(Error::InvalidStructure("invalid EIT type"));
            }
            Eit::new_schedule(actual, index, 0, 0, 0, 0)
        };
        eit.version = elem.int_attr("version")?.unwrap_or(0) as u8;
        eit.is_current = elem.bool_attr("current", true)?;
        eit.service_id = elem.req_int_attr("service_id")? as u16;
        eit.ts_id = elem.req_int_attr("transport_stream_id")? as u16;
        eit.onid = elem.req_int_attr("original_network_id")? as u16;
        eit.last_table_id =
            elem.int_attr("last_table_id")?.map(|v| v as u8).unwrap_or(eit.table_id);

        let dctx = DescriptorContext::new(ctx, eit.table_id);
        for child in elem.child_elements() {
            if child.is_named("metadata") {
                continue;
            }
            if !child.is_named("event") {
                return Err(Error::UnknownElement(child.name().to_string()));
            }
            let start = child
                .attr("start_time")
                .ok_or(Error::InvalidStructure("missing start_time"))?;
            let start = NaiveDateTime::parse_from_str(start, TIME_FORMAT)
                .map_err(|_| Error::InvalidStructure("unparseable start_time"))?;
            let mut event = EitEvent::new(
                child.req_int_attr("event_id")? as u16,
                Utc.from_utc_datetime(&start),
                child.req_int_attr("duration")? as u32,
            );
            event.running_status = child.int_attr("running_status")?.unwrap_or(0) as u8 & 0x07;
            event.ca_mode = child.bool_attr("ca_mode", false)?;
            event.descs = DescriptorList::from_xml(child, dctx, &[])?;
            eit.events.push(event);
        }
        Ok(eit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desc::short_event::ShortEventDescriptor;

    fn utc(s: &str) -> DateTime<Utc> {
        Utc.from_utc_datetime(&NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap())
    }

    fn titled(event_id: u16, start: &str, duration: u32, title: &str) -> EitEvent {
        let mut e = EitEvent::new(event_id, utc(start), duration);
        e.running_status = 4;
        e.descs.push(
            ShortEventDescriptor { language: "eng".into(), event_name: title.into(), text: String::new() }
                .to_descriptor()
                .unwrap(),
        );
        e
    }

    #[test]
    fn present_following_uses_two_sections() {
        let ctx = SiContext::default();
        let mut eit = Eit::new_pf(true, 1, 0x0321, 0x0044, 0x20FA);
        eit.events.push(titled(1, "2026-03-01 20:00:00", 3600, "Now"));
        eit.events.push(titled(2, "2026-03-01 21:00:00", 1800, "Next"));

        let bin = eit.serialize(&ctx).unwrap();
        assert_eq!(bin.section_count(), 2);
        let back = Eit::deserialize(&ctx, &bin).unwrap();
        assert_eq!(back, eit);
    }

    #[test]
    fn schedule_segments_follow_three_hour_slots() {
        let ctx = SiContext::default();
        let mut eit = Eit::new_schedule(true, 0, 2, 0x0321, 0x0044, 0x20FA);
        // Slot 6 (18:00..21:00) and slot 7 (21:00..24:00).
        eit.events.push(titled(1, "2026-03-01 18:15:00", 3600, "Evening A"));
        eit.events.push(titled(2, "2026-03-01 19:15:00", 3600, "Evening B"));
        eit.events.push(titled(3, "2026-03-01 21:30:00", 5400, "Late"));

        let bin = eit.serialize(&ctx).unwrap();
        // Slots 0..=5 are empty single sections, then one per busy slot.
        assert_eq!(bin.section_count(), 8);
        let busy = bin.section_at(6).unwrap();
        assert_eq!(busy.payload()[4], 6); // segment_last_section_number
        assert!(busy.payload().len() > EIT_PREAMBLE);

        let back = Eit::deserialize(&ctx, &bin).unwrap();
        assert_eq!(back.events.len(), 3);
        assert_eq!(back.serialize(&ctx).unwrap().section_at(6).unwrap(), busy);
    }

    #[test]
    fn xml_round_trip() {
        let ctx = SiContext::default();
        let mut eit = Eit::new_pf(false, 3, 0x0400, 0x0045, 0x20FB);
        eit.events.push(titled(9, "2026-05-02 08:00:00", 900, "Morning"));
        let back = Eit::from_xml(&ctx, &eit.to_xml(&ctx)).unwrap();
        assert_eq!(back, eit);
    }
}
