use serde::{Deserialize, Serialize};

/// current package format version
pub const FORMAT_VERSION: u8 = 1;

/// package manifest, the first record in every package stream
///
/// describes what the package covers so a receiver can decide how to replay
/// it without scanning the node records first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackageManifest {
    /// package format version
    pub version: u8,
    /// unix timestamp (seconds since epoch) of package creation
    pub created: i64,
    /// root paths covered by this package
    pub roots: Vec<String>,
    /// filter rule strings applied during export, per root
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<RootFilters>,
    /// whether reference-typed properties were followed outside the roots
    pub follow_references: bool,
    /// binary inline threshold in bytes (inclusive on the inline side)
    pub binary_threshold: u64,
}

/// filter rule strings recorded for one root
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RootFilters {
    pub root: String,
    pub rules: Vec<String>,
}

impl PackageManifest {
    /// create a manifest stamped with the current time
    pub fn new(
        roots: Vec<String>,
        filters: Vec<RootFilters>,
        follow_references: bool,
        binary_threshold: u64,
    ) -> Self {
        Self {
            version: FORMAT_VERSION,
            created: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0),
            roots,
            filters,
            follow_references,
            binary_threshold,
        }
    }
}
