use thiserror::Error;

pub type Result<A, E = Error> = std::result::Result<A, E>;

/// Errors surfaced by the section/table core.
#[derive(Debug, Error)]
pub enum Error {
    #[error("buffer ends inside a declared field")]
    InvalidLength,
    #[error("CRC-32 mismatch")]
    BadCrc,
    #[error("wrong table_id 0x{got:02X}")]
    WrongTableId { got: u8 },
    #[error("invalid structure: {0}")]
    InvalidStructure(&'static str),
    #[error("atomic record does not fit in one section")]
    Overflow,
    #[error("unknown element <{0}>")]
    UnknownElement(String),
    #[error("table is missing sections")]
    IncompleteTable,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
