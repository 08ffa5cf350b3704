// xml/mod.rs
//! XML document model for the editable table form.
//!
//! Parsing goes through quick-xml; emission is a small deterministic
//! writer because the textual layout (two-space indent, hex payloads as
//! uppercase byte pairs, 16 per line) is part of the canonical form.

pub mod bridge;
pub mod json;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{Error, Result};

/// Name of the document root element.
pub const ROOT_ELEMENT: &str = "tsduck";

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";
/// Hex blobs longer than this many bytes are reflowed 16 per line.
const HEX_INLINE_LIMIT: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// One XML element: ordered attributes, ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Self::default() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Case-insensitive element name comparison.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /* ── attributes ── */

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        self.attrs.push((name.to_string(), value.into()));
    }

    pub fn set_attr_bool(&mut self, name: &str, value: bool) {
        self.set_attr(name, if value { "true" } else { "false" });
    }

    pub fn set_attr_dec(&mut self, name: &str, value: u64) {
        self.set_attr(name, value.to_string());
    }

    /// Hexadecimal attribute, `digits` wide (the per-field radix form for
    /// PIDs and identifiers).
    pub fn set_attr_hex(&mut self, name: &str, value: u64, digits: usize) {
        self.set_attr(name, format!("0x{value:0digits$X}"));
    }

    /// Integer attribute, decimal or 0x-prefixed hexadecimal.
    pub fn int_attr(&self, name: &str) -> Result<Option<u64>> {
        match self.attr(name) {
            None => Ok(None),
            Some(text) => parse_int(text)
                .map(Some)
                .ok_or(Error::InvalidStructure("invalid integer attribute")),
        }
    }

    pub fn req_int_attr(&self, name: &str) -> Result<u64> {
        self.int_attr(name)?.ok_or_else(|| {
            log::warn!("<{}> is missing attribute {}", self.name, name);
            Error::InvalidStructure("missing required attribute")
        })
    }

    pub fn bool_attr(&self, name: &str, default: bool) -> Result<bool> {
        match self.attr(name) {
            None => Ok(default),
            Some(text) => match text.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                _ => Err(Error::InvalidStructure("invalid boolean attribute")),
            },
        }
    }

    /* ── children ── */

    pub fn add_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Insert a child ahead of the existing ones (used for `<metadata>`,
    /// which is conventionally the first child).
    pub fn insert_child_first(&mut self, child: Element) {
        self.children.insert(0, Node::Element(child));
    }

    pub fn add_text(&mut self, text: impl Into<String>) {
        self.children.push(Node::Text(text.into()));
    }

    pub fn nodes(&self) -> &[Node] {
        &self.children
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn first_child(&self, name: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.is_named(name))
    }

    /// Concatenated text content of this element.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for n in &self.children {
            if let Node::Text(t) = n {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(t);
            }
        }
        out
    }

    /// Text content as a hex byte blob; whitespace is ignored.
    pub fn hex_text(&self) -> Result<Vec<u8>> {
        let compact: String = self.text().chars().filter(|c| !c.is_whitespace()).collect();
        hex::decode(&compact).map_err(|_| Error::InvalidStructure("invalid hexadecimal text"))
    }

    /// Store a byte blob as uppercase space-separated hex pairs.
    pub fn set_hex_text(&mut self, bytes: &[u8]) {
        let mut text = String::with_capacity(bytes.len() * 3);
        for (i, b) in bytes.iter().enumerate() {
            if i > 0 {
                text.push(' ');
            }
            text.push_str(&format!("{b:02X}"));
        }
        self.add_text(text);
    }
}

fn parse_int(text: &str) -> Option<u64> {
    let text = text.trim();
    if let Some(hexa) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hexa, 16).ok()
    } else {
        text.parse().ok()
    }
}

/* ── parsing ── */

/// Parse a document and return its root element.
pub fn parse_document(input: &str) -> Result<Element> {
    let mut reader = Reader::from_str(input);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let mut elem = Element::new(str_of(start.name().as_ref())?);
                for attr in start.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    let value = attr.unescape_value()?;
                    elem.set_attr(str_of(attr.key.as_ref())?, value.into_owned());
                }
                stack.push(elem);
            }
            Event::Empty(start) => {
                let mut elem = Element::new(str_of(start.name().as_ref())?);
                for attr in start.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    let value = attr.unescape_value()?;
                    elem.set_attr(str_of(attr.key.as_ref())?, value.into_owned());
                }
                attach(&mut stack, &mut root, elem)?;
            }
            Event::End(_) => {
                let done = stack.pop().ok_or(Error::InvalidStructure("unbalanced XML"))?;
                attach(&mut stack, &mut root, done)?;
            }
            Event::Text(t) => {
                let text = t.unescape()?;
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    match stack.last_mut() {
                        Some(parent) => parent.add_text(trimmed),
                        None => return Err(Error::InvalidStructure("text outside root element")),
                    }
                }
            }
            Event::CData(t) => {
                let text = String::from_utf8_lossy(&t).trim().to_string();
                if !text.is_empty() {
                    match stack.last_mut() {
                        Some(parent) => parent.add_text(text),
                        None => return Err(Error::InvalidStructure("text outside root element")),
                    }
                }
            }
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }
    if !stack.is_empty() {
        return Err(Error::InvalidStructure("unbalanced XML"));
    }
    root.ok_or(Error::InvalidStructure("empty XML document"))
}

fn str_of(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| Error::InvalidStructure("non-UTF-8 XML name"))
}

fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, elem: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.add_child(elem),
        None => {
            if root.is_some() {
                return Err(Error::InvalidStructure("multiple root elements"));
            }
            *root = Some(elem);
        }
    }
    Ok(())
}

/* ── emission ── */

/// Serialize a document: declaration, then the tree with two-space indent.
pub fn document_to_string(root: &Element) -> String {
    let mut out = String::new();
    out.push_str(XML_DECLARATION);
    out.push('\n');
    write_element(&mut out, root, 0);
    out
}

fn write_element(out: &mut String, elem: &Element, depth: usize) {
    let pad = "  ".repeat(depth);
    out.push_str(&pad);
    out.push('<');
    out.push_str(&elem.name);
    for (k, v) in &elem.attrs {
        out.push(' ');
        out.push_str(k);
        out.push_str("=\"");
        out.push_str(&escape(v));
        out.push('"');
    }

    if elem.children.is_empty() {
        out.push_str("/>\n");
        return;
    }
    out.push('>');

    let only_text = elem.children.iter().all(|n| matches!(n, Node::Text(_)));
    if only_text {
        let text = elem.text();
        let pairs: Vec<&str> = text.split_whitespace().collect();
        let is_hex_blob = pairs.len() > HEX_INLINE_LIMIT && pairs.iter().all(|p| p.len() == 2);
        if is_hex_blob {
            // 16 byte pairs per line, indented one level deeper.
            out.push('\n');
            for line in pairs.chunks(16) {
                out.push_str(&pad);
                out.push_str("  ");
                out.push_str(&line.join(" "));
                out.push('\n');
            }
            out.push_str(&pad);
        } else {
            out.push_str(&escape(&text));
        }
    } else {
        out.push('\n');
        for node in &elem.children {
            match node {
                Node::Element(child) => write_element(out, child, depth + 1),
                Node::Text(text) => {
                    out.push_str(&pad);
                    out.push_str("  ");
                    out.push_str(&escape(text));
                    out.push('\n');
                }
            }
        }
        out.push_str(&pad);
    }
    out.push_str("</");
    out.push_str(&elem.name);
    out.push_str(">\n");
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_query() {
        let doc = r#"<?xml version="1.0" encoding="UTF-8"?>
<tsduck>
  <pat version="7" current="true" transport_stream_id="0x1234">
    <service service_id="3" program_map_pid="0x0005"/>
  </pat>
</tsduck>"#;
        let root = parse_document(doc).unwrap();
        assert!(root.is_named("tsduck"));
        let pat = root.child_elements().next().unwrap();
        assert_eq!(pat.req_int_attr("version").unwrap(), 7);
        assert_eq!(pat.req_int_attr("transport_stream_id").unwrap(), 0x1234);
        assert!(pat.bool_attr("current", false).unwrap());
        let svc = pat.child_elements().next().unwrap();
        assert_eq!(svc.req_int_attr("program_map_pid").unwrap(), 5);
    }

    #[test]
    fn emit_is_stable() {
        let mut root = Element::new(ROOT_ELEMENT);
        let mut child = Element::new("generic_short_table");
        child.set_attr_hex("table_id", 0xAB, 2);
        child.set_attr_bool("private", false);
        child.set_hex_text(&[1, 2, 3]);
        root.add_child(child);

        let text = document_to_string(&root);
        assert_eq!(
            text,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <tsduck>\n\
             \x20\x20<generic_short_table table_id=\"0xAB\" private=\"false\">01 02 03</generic_short_table>\n\
             </tsduck>\n"
        );
        // Reparse equals the original tree.
        assert_eq!(parse_document(&text).unwrap(), root);
    }

    #[test]
    fn long_hex_blob_is_reflowed() {
        let mut elem = Element::new("section");
        elem.set_hex_text(&(0u8..40).collect::<Vec<u8>>());
        let mut out = String::new();
        write_element(&mut out, &elem, 1);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 5); // open, 3 hex lines, close
        assert!(lines[1].starts_with("    00 01"));
        assert_eq!(lines[3].split_whitespace().count(), 8);

        // Whitespace-separated pairs parse back to the same bytes.
        let parsed = parse_document(&format!("<x>{}</x>", &elem.text())).unwrap();
        assert_eq!(parsed.hex_text().unwrap(), (0u8..40).collect::<Vec<u8>>());
    }

    #[test]
    fn case_insensitive_lookup() {
        let root = parse_document("<TSDuck><PAT Version=\"3\"/></TSDuck>").unwrap();
        assert!(root.is_named("tsduck"));
        let pat = root.first_child("pat").unwrap();
        assert_eq!(pat.req_int_attr("version").unwrap(), 3);
    }

    #[test]
    fn escaping_round_trip() {
        let mut root = Element::new("tsduck");
        let mut m = Element::new("metadata");
        m.set_attr("attribute", "a<b>&\"c\"");
        root.add_child(m);
        let text = document_to_string(&root);
        let back = parse_document(&text).unwrap();
        assert_eq!(back.first_child("metadata").unwrap().attr("attribute"), Some("a<b>&\"c\""));
    }
}
