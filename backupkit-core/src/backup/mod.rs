//! Import and export of a store through a backup stream.
//!
//! Export walks the store kind by kind in [`EntityKind::EXPORT_ORDER`], so
//! every frame only references ids that appeared earlier in the stream.
//! Import relies on that order: it resolves each reference against what it
//! has already imported, rewrites it to the store's local id, and aborts the
//! whole unit of work on the first problem.
//!
//! [`EntityKind::EXPORT_ORDER`]: crate::store::EntityKind::EXPORT_ORDER

mod export;
mod import;
mod options;

pub use export::{export_to_path, ExportStats, Exporter};
pub use import::{import_from_path, ImportStats, ImportSummary, Importer};
pub use options::{ExportOptions, ImportOptions};
