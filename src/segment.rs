// segment.rs
//! Helpers for splitting a logical table body across long sections.
//!
//! Every family keeps its own atomicity rules (which records may never be
//! split); this module owns the shared mechanics: the 1012-byte payload
//! budget per section, section numbering, and sealing with CRC.

use crate::error::{Error, Result};
use crate::section::{MAX_LONG_SECTION_PAYLOAD, Section};
use crate::table::BinaryTable;

/// Accumulates consecutive section payloads under the per-section budget.
///
/// Families with a repeating preamble write it into `current()` when a
/// fresh section starts and patch their loop-length fields before
/// closing; record-per-record families just call [`push_atomic`].
///
/// [`push_atomic`]: SectionChain::push_atomic
pub struct SectionChain {
    payloads: Vec<Vec<u8>>,
    cur: Vec<u8>,
}

impl SectionChain {
    pub fn new() -> Self {
        Self { payloads: Vec::new(), cur: Vec::with_capacity(MAX_LONG_SECTION_PAYLOAD) }
    }

    /// Payload of the section being filled.
    pub fn current(&mut self) -> &mut Vec<u8> {
        &mut self.cur
    }

    pub fn used(&self) -> usize {
        self.cur.len()
    }

    pub fn remaining(&self) -> usize {
        MAX_LONG_SECTION_PAYLOAD - self.cur.len()
    }

    pub fn fits(&self, bytes: usize) -> bool {
        bytes <= self.remaining()
    }

    /// Close the current section and start a fresh one.
    pub fn close(&mut self) {
        let done = std::mem::replace(&mut self.cur, Vec::with_capacity(MAX_LONG_SECTION_PAYLOAD));
        self.payloads.push(done);
    }

    /// Append a record that must never straddle a section boundary,
    /// closing the current section first when it would not fit.
    pub fn push_atomic(&mut self, record: &[u8]) -> Result<()> {
        if record.len() > MAX_LONG_SECTION_PAYLOAD {
            return Err(Error::Overflow);
        }
        if !self.fits(record.len()) {
            self.close();
        }
        self.cur.extend_from_slice(record);
        Ok(())
    }

    /// Finish, yielding at least one payload (a table with an empty body
    /// still occupies one section).
    pub fn into_payloads(mut self) -> Vec<Vec<u8>> {
        if !self.cur.is_empty() || self.payloads.is_empty() {
            self.payloads.push(self.cur);
        }
        self.payloads
    }
}

impl Default for SectionChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Seal payloads into a complete long table: section_number 0..N-1,
/// last_section_number N-1, CRC-32 per section.
pub fn build_long_table(
    table_id: u8,
    private: bool,
    table_id_extension: u16,
    version: u8,
    is_current: bool,
    payloads: Vec<Vec<u8>>,
) -> Result<BinaryTable> {
    if payloads.is_empty() || payloads.len() > 256 {
        return Err(Error::Overflow);
    }
    let last = (payloads.len() - 1) as u8;
    let mut sections = Vec::with_capacity(payloads.len());
    for (i, payload) in payloads.iter().enumerate() {
        sections.push(Section::new_long(
            table_id,
            private,
            table_id_extension,
            version,
            is_current,
            i as u8,
            last,
            payload,
        )?);
    }
    BinaryTable::from_sections(sections)
}

/// Seal a one-section short table.
pub fn build_short_table(table_id: u8, private: bool, payload: &[u8]) -> Result<BinaryTable> {
    BinaryTable::from_sections(vec![Section::new_short(table_id, private, payload)?])
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn atomic_records_never_split() {
        let mut chain = SectionChain::new();
        let record = [0u8; 10];
        for _ in 0..300 {
            chain.push_atomic(&record).unwrap();
        }
        let payloads = chain.into_payloads();
        let sizes: Vec<usize> = payloads.iter().map(|p| p.len()).collect();
        assert_eq!(sizes, [1010, 1010, 980]);
    }

    #[test]
    fn oversized_record_is_overflow() {
        let mut chain = SectionChain::new();
        assert_matches!(chain.push_atomic(&[0u8; MAX_LONG_SECTION_PAYLOAD + 1]), Err(Error::Overflow));
    }

    #[test]
    fn empty_body_still_yields_one_section() {
        let payloads = SectionChain::new().into_payloads();
        assert_eq!(payloads.len(), 1);
        assert!(payloads[0].is_empty());

        let table = build_long_table(0x42, true, 0, 0, true, payloads).unwrap();
        assert!(table.is_valid());
        assert_eq!(table.section_count(), 1);
    }

    #[test]
    fn sealed_table_numbering() {
        let table =
            build_long_table(0x42, true, 0x99, 3, true, vec![vec![1], vec![2], vec![3]]).unwrap();
        assert_eq!(table.section_count(), 3);
        for i in 0..3 {
            let s = table.section_at(i).unwrap();
            assert_eq!(s.section_number(), i as u8);
            assert_eq!(s.last_section_number(), 2);
            assert_eq!(s.version(), 3);
        }
    }
}
