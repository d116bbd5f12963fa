//! Export module
//!
//! Writes finalized recordings and preview snapshots to disk.

pub mod exporter;
pub mod snapshot;
pub mod types;

pub use exporter::FileExporter;
pub use snapshot::{encode_png, write_png};
pub use types::{validate_name, ExportError, ExportResult, FailedExport, DEFAULT_EXPORT_NAME};
