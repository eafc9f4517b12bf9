mod manifest;
mod node;

pub use manifest::{PackageManifest, RootFilters, FORMAT_VERSION};
pub use node::{AclEntry, NodeData, NodeId, NodeRecord, Property, PropertyValue};
