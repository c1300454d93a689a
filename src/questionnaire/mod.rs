//! Questionnaire Layer (spec §4.10): period resolution, primitive queries,
//! pre-defined packs, and export rendering, composed so the HTTP/CLI
//! surfaces only need to call `packs::assemble` or `export::export`.

pub mod export;
pub mod packs;
pub mod period;
pub mod primitives;

pub use export::{export, ExportFormat, ExportResult};
pub use packs::{assemble, Pack, PackItem};
pub use period::{resolve as resolve_period, Period};
