// time.rs
//! Modified Julian Date + BCD time format used by TDT/TOT/EIT (EN 300 468
//! annex C): 16-bit MJD followed by six BCD digits of UTC hh:mm:ss.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};

use crate::buffer::ByteBuffer;
use crate::error::{Error, Result};

fn mjd_epoch() -> NaiveDate {
    // Day zero of the Modified Julian Date scale.
    NaiveDate::from_ymd_opt(1858, 11, 17).unwrap()
}

/// Write a UTC instant as the 40-bit MJD+BCD form.
pub fn put_mjd_utc(buf: &mut ByteBuffer, t: &DateTime<Utc>) {
    let days = t.date_naive().signed_duration_since(mjd_epoch()).num_days();
    if !(0..=0xFFFF).contains(&days) {
        buf.set_error();
        return;
    }
    buf.put_u16(days as u16);
    buf.put_bcd(t.hour(), 2);
    buf.put_bcd(t.minute(), 2);
    buf.put_bcd(t.second(), 2);
}

/// Read a 40-bit MJD+BCD UTC instant.
pub fn get_mjd_utc(buf: &mut ByteBuffer) -> Result<DateTime<Utc>> {
    let mjd = buf.get_u16() as i64;
    let hour = buf.get_bcd(2);
    let minute = buf.get_bcd(2);
    let second = buf.get_bcd(2);
    if buf.error() {
        return Err(Error::InvalidLength);
    }
    let date = mjd_epoch()
        .checked_add_signed(chrono::Duration::days(mjd))
        .ok_or(Error::InvalidStructure("MJD out of range"))?;
    let time = NaiveTime::from_hms_opt(hour, minute, second)
        .ok_or(Error::InvalidStructure("invalid BCD time"))?;
    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}

/// Write a duration as six BCD digits hh:mm:ss (EIT event duration).
pub fn put_bcd_duration(buf: &mut ByteBuffer, seconds: u32) {
    if seconds >= 100 * 3600 {
        buf.set_error();
        return;
    }
    buf.put_bcd(seconds / 3600, 2);
    buf.put_bcd(seconds % 3600 / 60, 2);
    buf.put_bcd(seconds % 60, 2);
}

/// Read a six-digit BCD hh:mm:ss duration, in seconds.
pub fn get_bcd_duration(buf: &mut ByteBuffer) -> Result<u32> {
    let h = buf.get_bcd(2);
    let m = buf.get_bcd(2);
    let s = buf.get_bcd(2);
    if buf.error() || m > 59 || s > 59 {
        return Err(Error::InvalidStructure("invalid BCD duration"));
    }
    Ok(h * 3600 + m * 60 + s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn utc(s: &str) -> DateTime<Utc> {
        Utc.from_utc_datetime(&NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap())
    }

    #[test]
    fn known_mjd_encoding() {
        // EN 300 468 annex C example: 93-10-13 12:45:00 is MJD 0xC079.
        let mut b = ByteBuffer::new();
        put_mjd_utc(&mut b, &utc("1993-10-13 12:45:00"));
        assert_eq!(b.as_slice(), &[0xC0, 0x79, 0x12, 0x45, 0x00]);
    }

    #[test]
    fn mjd_round_trip() {
        let t = utc("2017-12-25 14:55:27");
        let mut b = ByteBuffer::new();
        put_mjd_utc(&mut b, &t);
        assert_eq!(b.len(), 5);
        assert_eq!(get_mjd_utc(&mut b).unwrap(), t);
    }

    #[test]
    fn duration_round_trip() {
        let mut b = ByteBuffer::new();
        put_bcd_duration(&mut b, 2 * 3600 + 45 * 60 + 30);
        assert_eq!(b.as_slice(), &[0x02, 0x45, 0x30]);
        assert_eq!(get_bcd_duration(&mut b).unwrap(), 2 * 3600 + 45 * 60 + 30);
    }
}
