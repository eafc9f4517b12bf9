//! export and import operations over content sessions

mod export;
mod import;

pub use export::{export_to_stream, ExportReport, NodePredicate};
pub use import::{import_from_stream, ImportReport, ImportWarning};
