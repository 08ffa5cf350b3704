// text.rs
//! DVB text coding (EN 300 468 annex A).
//!
//! Decoding supports ISO 6937 (the DVB default), UTF-8 (0x15 prefix) and
//! basic ISO 8859 code pages. Encoding is deterministic: plain ASCII is
//! written bare, anything else as UTF-8 behind the 0x15 prefix.

#[derive(Debug)]
enum Encoding {
    Iso6937,
    Utf8,
    Iso8859(u8),
}

/// Decode a DVB-coded character string.
pub fn decode_dvb_text(data: &[u8]) -> Option<String> {
    if data.is_empty() {
        return Some(String::new());
    }

    // Check for encoding prefix
    let (encoding, text_data) = if data[0] < 0x20 {
        match data[0] {
            0x15 => (Encoding::Utf8, &data[1..]),
            0x10 => {
                // ISO 8859 with code page in next 2 bytes
                if data.len() >= 3 {
                    (Encoding::Iso8859(data[2]), &data[3..])
                } else {
                    return None;
                }
            }
            _ => (Encoding::Iso6937, &data[1..]),
        }
    } else {
        (Encoding::Iso6937, data) // No prefix = ISO 6937 (DVB default)
    };

    match encoding {
        Encoding::Utf8 => String::from_utf8(text_data.to_vec()).ok(),
        Encoding::Iso8859(1) | Encoding::Iso6937 => {
            // ISO 8859-1 (Latin-1) and the ISO 6937 base set map byte-for-byte
            Some(text_data.iter().map(|&b| b as char).collect())
        }
        _ => String::from_utf8(text_data.to_vec())
            .ok()
            .or_else(|| Some(text_data.iter().map(|&b| b as char).collect())),
    }
}

/// Encode a string into DVB character-string bytes.
pub fn encode_dvb_text(text: &str) -> Vec<u8> {
    if text.is_empty() {
        return Vec::new();
    }
    if text.is_ascii() && text.bytes().all(|b| b >= 0x20) {
        text.as_bytes().to_vec()
    } else {
        let mut out = Vec::with_capacity(text.len() + 1);
        out.push(0x15);
        out.extend_from_slice(text.as_bytes());
        out
    }
}
