// context.rs
//! Ambient defaults shared by parse and serialize paths.

/// Registration standard governing descriptor and table interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standard {
    Mpeg,
    Dvb,
    Atsc,
    Isdb,
}

/// What to do with the CRC-32 of incoming long sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrcPolicy {
    /// Parse unconditionally; sections with a bad CRC are kept but flagged.
    Ignore,
    /// Reject sections whose CRC does not match.
    #[default]
    Check,
    /// Replace the incoming CRC with a recomputed one, then accept.
    Compute,
}

/// Carries the defaults every parse/serialize call needs: standards
/// flavor, CRC policy and the initial private data specifier.
///
/// One context is attached to a [`SectionFile`](crate::SectionFile);
/// distinct instances share nothing.
#[derive(Debug, Clone)]
pub struct SiContext {
    pub standard: Standard,
    pub crc_policy: CrcPolicy,
    pub default_pds: u32,
}

impl Default for SiContext {
    fn default() -> Self {
        Self { standard: Standard::Dvb, crc_policy: CrcPolicy::default(), default_pds: 0 }
    }
}
