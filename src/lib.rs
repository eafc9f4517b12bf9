//! treepack - portable content-tree packages
//!
//! exports selected subtrees of a hierarchical content repository into a
//! self-describing package stream, and replays such packages into a target
//! repository. built for replicating content between distributed nodes.
//!
//! # Core concepts
//!
//! - **Package**: a stream of node records plus binary segments, framed as
//!   zstd-compressed CBOR, opened by a manifest
//! - **Selection**: absolute root paths with ordered include/exclude filter
//!   rules (glob patterns over node and property paths)
//! - **Session**: a narrow capability trait over the repository; the crate
//!   ships an in-memory implementation for testing and small trees
//! - **Import settings**: replace/merge/update mode, acl handling, id
//!   conflict policy and auto-save batching
//!
//! # Stream format
//!
//! magic `TPKG` | version byte | frames. each frame is a u32-LE length
//! followed by zstd(CBOR(record)). binary properties above the configured
//! threshold travel as raw segment payloads after their header frame,
//! integrity-checked with SHA-256.
//!
//! # Example usage
//!
//! ```
//! use treepack::{
//!     export_to_stream, import_from_stream, ContentSelection, ContentSession,
//!     ExportConfig, ImportSettings, MemoryRepository, NodeData, PropertyValue,
//! };
//!
//! let mut source = MemoryRepository::new();
//! source
//!     .add_node(
//!         "/libs",
//!         NodeData::new("nt:folder").with_property("prop", PropertyValue::string("value")),
//!     )
//!     .unwrap();
//!
//! let config = ExportConfig::builder(ContentSelection::new().root("/libs"))
//!     .build()
//!     .unwrap();
//! let mut package = Vec::new();
//! export_to_stream(&source, &config, None, &mut package).unwrap();
//!
//! let mut target = treepack::MemoryRepository::new();
//! import_from_stream(&mut target, &ImportSettings::default(), &package[..]).unwrap();
//! assert!(target.read_node("/libs").unwrap().is_some());
//! ```

mod config;
mod error;
mod filter;
mod options;
mod settings;

pub mod package;
pub mod path;
pub mod types;

mod ops;
mod session;

pub use config::SerializerConfig;
pub use error::{Error, IoResultExt, Result};
pub use filter::{AppliesTo, Effect, FilterRule, PathFilter};
pub use ops::{
    export_to_stream, import_from_stream, ExportReport, ImportReport, ImportWarning,
    NodePredicate,
};
pub use options::{
    ContentSelection, ExportConfig, ExportConfigBuilder, DEFAULT_BINARY_THRESHOLD,
};
pub use package::{PackageReader, PackageWriter, Record};
pub use session::{ContentSession, MemoryRepository};
pub use settings::{AclHandling, IdConflictPolicy, ImportMode, ImportSettings};
pub use types::{
    AclEntry, NodeData, NodeId, NodeRecord, PackageManifest, Property, PropertyValue,
    RootFilters, FORMAT_VERSION,
};
