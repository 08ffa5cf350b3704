// section_file.rs
//! User-facing aggregate: complete tables plus still-assembling orphan
//! sections, loadable and savable in binary, XML and JSON form.

use std::io::{Read, Write};
use std::path::Path;

use crate::context::{CrcPolicy, SiContext};
use crate::error::{Error, Result};
use crate::section::Section;
use crate::table::{AddResult, BinaryTable};
use crate::xml::bridge::{table_from_xml, table_to_xml};
use crate::xml::json::{element_from_json, element_to_json};
use crate::xml::{Element, ROOT_ELEMENT, document_to_string, parse_document};

/// An ordered collection of PSI/SI tables and loose sections.
///
/// Long sections fed one by one accumulate per (table_id, extension);
/// a table instance is promoted out of the orphan set when its last
/// missing section arrives. Instances share no state; none of this is
/// safe for concurrent mutation.
pub struct SectionFile {
    ctx: SiContext,
    tables: Vec<BinaryTable>,
    partials: Vec<BinaryTable>,
    crc_override: Option<CrcPolicy>,
    stop_on_padding: bool,
    rejected_sections: usize,
}

impl SectionFile {
    pub fn new() -> Self {
        Self::with_context(SiContext::default())
    }

    pub fn with_context(ctx: SiContext) -> Self {
        Self {
            ctx,
            tables: Vec::new(),
            partials: Vec::new(),
            crc_override: None,
            stop_on_padding: true,
            rejected_sections: 0,
        }
    }

    pub fn context(&self) -> &SiContext {
        &self.ctx
    }

    /// Force one CRC policy for every subsequent load, overriding the
    /// per-source defaults (CHECK for files, IGNORE for memory buffers).
    pub fn set_crc_validation(&mut self, policy: CrcPolicy) {
        self.crc_override = Some(policy);
    }

    /// Whether a 0xFF byte at a section boundary ends a binary stream
    /// (0xFF is not a valid table_id, only stuffing).
    pub fn set_stop_on_padding(&mut self, stop: bool) {
        self.stop_on_padding = stop;
    }

    pub fn clear(&mut self) {
        self.tables.clear();
        self.partials.clear();
        self.rejected_sections = 0;
    }

    /* ── building ── */

    /// Append a complete table.
    pub fn add_table(&mut self, table: BinaryTable) -> Result<()> {
        if !table.is_complete() {
            return Err(Error::IncompleteTable);
        }
        self.tables.push(table);
        Ok(())
    }

    /// Route one section to the table instance it belongs to, starting a
    /// new accumulator or completing one as needed.
    pub fn add_section(&mut self, section: Section) {
        if section.is_short_section() {
            let mut table = BinaryTable::new();
            table.add_section(section);
            self.tables.push(table);
            return;
        }

        let Some(idx) = self.partials.iter().position(|t| t.is_same_table(&section)) else {
            let mut table = BinaryTable::new();
            match table.add_section(section) {
                AddResult::Completed => self.tables.push(table),
                _ => self.partials.push(table),
            }
            return;
        };

        let partial = &mut self.partials[idx];
        if partial.version() != section.version() || partial.is_current() != section.is_current()
        {
            // Version rollover: the accumulator is stale, start over.
            log::debug!(
                "table 0x{:02X}/{:#06X}: version {} -> {}, dropping partial",
                section.table_id(),
                section.table_id_extension(),
                partial.version(),
                section.version()
            );
            let mut fresh = BinaryTable::new();
            match fresh.add_section(section) {
                AddResult::Completed => {
                    self.partials.remove(idx);
                    self.tables.push(fresh);
                }
                _ => self.partials[idx] = fresh,
            }
            return;
        }

        match partial.add_section(section) {
            AddResult::Completed => {
                let table = self.partials.remove(idx);
                self.tables.push(table);
            }
            AddResult::Added => {}
            AddResult::DuplicatedSlot => {
                log::warn!("dropping conflicting duplicate section");
                self.rejected_sections += 1;
            }
            AddResult::Conflict => {
                log::warn!("dropping section inconsistent with its table");
                self.rejected_sections += 1;
            }
        }
    }

    /// Fails while any table is still missing sections.
    pub fn finalize(&self) -> Result<()> {
        if self.partials.is_empty() { Ok(()) } else { Err(Error::IncompleteTable) }
    }

    /* ── views ── */

    /// Complete tables, insertion order.
    pub fn tables(&self) -> &[BinaryTable] {
        &self.tables
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Tables still assembling.
    pub fn incomplete_table_count(&self) -> usize {
        self.partials.len()
    }

    /// Long-section fragments not yet forming a complete table.
    pub fn orphan_sections(&self) -> Vec<&Section> {
        self.partials.iter().flat_map(|t| t.sections()).collect()
    }

    /// Every section of every table, then the orphans.
    pub fn sections(&self) -> Vec<&Section> {
        self.tables
            .iter()
            .flat_map(|t| t.sections())
            .chain(self.partials.iter().flat_map(|t| t.sections()))
            .collect()
    }

    /// Sections dropped during loads and feeds (bad CRC, conflicts).
    pub fn rejected_section_count(&self) -> usize {
        self.rejected_sections
    }

    /* ── binary form ── */

    /// Parse back-to-back sections from a memory buffer. Default CRC
    /// policy for in-memory data is IGNORE.
    pub fn load_buffer(&mut self, data: &[u8]) -> Result<()> {
        self.load_sections(data, self.crc_override.unwrap_or(CrcPolicy::Ignore))
    }

    pub fn load_binary_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let data = std::fs::read(path)?;
        self.load_sections(&data, self.crc_override.unwrap_or(CrcPolicy::Check))
    }

    pub fn load_binary_read<R: Read>(&mut self, mut reader: R) -> Result<()> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        self.load_sections(&data, self.crc_override.unwrap_or(CrcPolicy::Check))
    }

    fn load_sections(&mut self, data: &[u8], policy: CrcPolicy) -> Result<()> {
        let mut pos = 0;
        while pos < data.len() {
            if self.stop_on_padding && data[pos] == 0xFF {
                break;
            }
            if pos + 3 > data.len() {
                return Err(Error::InvalidLength);
            }
            let total = 3 + (((data[pos + 1] & 0x0F) as usize) << 8 | data[pos + 2] as usize);
            match Section::parse(&data[pos..], policy) {
                Ok((section, used)) => {
                    self.add_section(section);
                    pos += used;
                }
                Err(Error::BadCrc) => {
                    // Rejected but recoverable: the length field still
                    // frames the stream.
                    log::warn!("section at offset {pos} has a bad CRC, skipped");
                    self.rejected_sections += 1;
                    pos += total;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Append every section (tables first, then orphans) to `out`,
    /// after whatever the caller already placed there. Returns the
    /// number of bytes written.
    pub fn save_buffer(&self, out: &mut Vec<u8>) -> usize {
        let start = out.len();
        for sec in self.sections() {
            out.extend_from_slice(sec.as_bytes());
        }
        out.len() - start
    }

    pub fn save_binary_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut data = Vec::new();
        self.save_buffer(&mut data);
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn save_binary_write<W: Write>(&self, mut writer: W) -> Result<()> {
        for sec in self.sections() {
            writer.write_all(sec.as_bytes())?;
        }
        Ok(())
    }

    /* ── XML form ── */

    fn root_element(&self, force_generic: bool) -> Result<Element> {
        let mut root = Element::new(ROOT_ELEMENT);
        for table in &self.tables {
            root.add_child(table_to_xml(&self.ctx, table, force_generic)?);
        }
        Ok(root)
    }

    fn load_root(&mut self, root: &Element) -> Result<()> {
        if !root.is_named(ROOT_ELEMENT) {
            return Err(Error::UnknownElement(root.name().to_string()));
        }
        let mut first_error = None;
        for child in root.child_elements() {
            match table_from_xml(&self.ctx, child) {
                Ok(table) => self.tables.push(table),
                Err(e) => {
                    log::warn!("cannot build table from <{}>: {e}", child.name());
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn save_xml(&self) -> Result<String> {
        Ok(document_to_string(&self.root_element(false)?))
    }

    pub fn save_xml_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.save_xml()?)?;
        Ok(())
    }

    pub fn load_xml(&mut self, text: &str) -> Result<()> {
        let root = parse_document(text)?;
        self.load_root(&root)
    }

    pub fn load_xml_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let text = std::fs::read_to_string(path)?;
        self.load_xml(&text)
    }

    /* ── JSON form ── */

    pub fn save_json(&self) -> Result<String> {
        let root = self.root_element(false)?;
        let mut text = serde_json::to_string_pretty(&element_to_json(&root))?;
        text.push('\n');
        Ok(text)
    }

    pub fn save_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.save_json()?)?;
        Ok(())
    }

    pub fn load_json(&mut self, text: &str) -> Result<()> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let root = element_from_json(&value)?;
        self.load_root(&root)
    }

    pub fn load_json_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let text = std::fs::read_to_string(path)?;
        self.load_json(&text)
    }
}

impl Default for SectionFile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn long(num: u8, last: u8) -> Section {
        Section::new_long(0x42, true, 0x0001, 5, true, num, last, &[num, 0xAA]).unwrap()
    }

    #[test]
    fn orphan_promotion() {
        let mut file = SectionFile::new();
        file.add_section(long(0, 1));
        assert_eq!(file.table_count(), 0);
        assert_eq!(file.incomplete_table_count(), 1);
        assert_eq!(file.orphan_sections().len(), 1);

        file.add_section(long(1, 1));
        assert_eq!(file.table_count(), 1);
        assert_eq!(file.incomplete_table_count(), 0);
        assert!(file.orphan_sections().is_empty());
        assert_matches!(file.finalize(), Ok(()));
    }

    #[test]
    fn lone_section_stays_orphan() {
        let mut file = SectionFile::new();
        file.add_section(long(0, 1));
        assert_eq!(file.orphan_sections().len(), 1);
        assert_eq!(file.incomplete_table_count(), 1);
        assert_matches!(file.finalize(), Err(Error::IncompleteTable));
        // Orphans still appear in the flat section view and binary save.
        assert_eq!(file.sections().len(), 1);
        let mut out = Vec::new();
        assert_eq!(file.save_buffer(&mut out), long(0, 1).size());
    }

    #[test]
    fn version_rollover_restarts_accumulator() {
        let mut file = SectionFile::new();
        file.add_section(long(0, 1));
        let next_version = Section::new_long(0x42, true, 0x0001, 6, true, 0, 1, &[9]).unwrap();
        file.add_section(next_version);
        assert_eq!(file.incomplete_table_count(), 1);
        assert_eq!(file.orphan_sections()[0].version(), 6);
    }

    #[test]
    fn buffer_round_trip_with_reserved_prefix() {
        let mut file = SectionFile::new();
        file.add_section(long(0, 1));
        file.add_section(long(1, 1));
        file.add_section(Section::new_short(0x70, true, &[1, 2, 3, 4, 5]).unwrap());

        let mut out = vec![0xAA, 0xBB, 0xCC]; // caller-reserved prefix
        let written = file.save_buffer(&mut out);
        assert_eq!(out.len(), 3 + written);
        assert_eq!(&out[..3], &[0xAA, 0xBB, 0xCC]);

        let mut reloaded = SectionFile::new();
        reloaded.load_buffer(&out[3..]).unwrap();
        let mut again = Vec::new();
        reloaded.save_buffer(&mut again);
        assert_eq!(again, &out[3..]);
    }

    #[test]
    fn padding_byte_ends_stream() {
        let mut data = Vec::new();
        data.extend_from_slice(Section::new_short(0x70, true, &[1]).unwrap().as_bytes());
        data.extend_from_slice(&[0xFF, 0xFF, 0xFF]);
        let mut file = SectionFile::new();
        file.load_buffer(&data).unwrap();
        assert_eq!(file.table_count(), 1);
    }

    #[test]
    fn bad_crc_skipped_under_check_kept_under_ignore() {
        let good = long(0, 0);
        let mut corrupted = good.as_bytes().to_vec();
        corrupted[9] ^= 0x40;

        let mut checked = SectionFile::new();
        checked.set_crc_validation(CrcPolicy::Check);
        checked.load_buffer(&corrupted).unwrap();
        assert_eq!(checked.table_count(), 0);
        assert_eq!(checked.rejected_section_count(), 1);

        let mut lenient = SectionFile::new();
        lenient.set_crc_validation(CrcPolicy::Ignore);
        lenient.load_buffer(&corrupted).unwrap();
        assert_eq!(lenient.table_count(), 1);
        assert!(!lenient.tables()[0].is_valid());
        assert!(lenient.tables()[0].is_complete());
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let sec = long(0, 0);
        let bytes = sec.as_bytes();
        let mut file = SectionFile::new();
        assert_matches!(file.load_buffer(&bytes[..bytes.len() - 2]), Err(Error::InvalidLength));
    }
}
