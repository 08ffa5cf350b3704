// src/lib.rs
//! MPEG-2 / DVB PSI-SI section and table toolkit.
//!
//! Tables move between three interchangeable representations: typed
//! table structs ([`psi`]), binary sections ([`Section`] grouped into
//! [`BinaryTable`]), and XML/JSON documents ([`xml`]). [`SectionFile`]
//! aggregates tables and loose sections and owns the load/save paths.

pub mod buffer;
pub mod context;
pub mod desc;
pub mod error;
pub mod psi;
pub mod section;
pub mod section_file;
pub mod segment;
pub mod table;
pub mod text;
pub mod time;
pub mod xml;

pub use context::{CrcPolicy, SiContext, Standard};
pub use error::{Error, Result};
pub use psi::Table;
pub use section::Section;
pub use section_file::SectionFile;
pub use table::{AddResult, BinaryTable};
