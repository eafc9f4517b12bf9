use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// how incoming nodes combine with existing target content
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// overwrite existing nodes wholesale
    Replace,
    /// add missing properties and children, leave existing ones untouched
    Merge,
    /// like merge, but also remove properties absent from the package
    Update,
}

impl ImportMode {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "replace" => Ok(Self::Replace),
            "merge" => Ok(Self::Merge),
            "update" => Ok(Self::Update),
            other => Err(Error::InvalidSettings(format!(
                "unrecognized import mode: {}",
                other
            ))),
        }
    }
}

/// how access-control entries in the package are applied
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AclHandling {
    /// leave target acls alone, drop packaged ones
    Ignore,
    /// replace target acls with packaged ones
    Overwrite,
    /// add packaged entries whose principal is not already present
    Merge,
    /// remove target acls, write nothing
    Clear,
}

impl AclHandling {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "ignore" => Ok(Self::Ignore),
            "overwrite" => Ok(Self::Overwrite),
            "merge" => Ok(Self::Merge),
            "clear" => Ok(Self::Clear),
            other => Err(Error::InvalidSettings(format!(
                "unrecognized acl handling: {}",
                other
            ))),
        }
    }
}

/// how a stable-id collision with a node elsewhere in the target is resolved
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdConflictPolicy {
    /// remove the stale path and write the node at the packaged path
    Legacy,
    /// keep the existing node, mint a fresh id for the incoming one
    CreateNewId,
    /// refuse to resolve, fail the import
    Fail,
}

impl IdConflictPolicy {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "legacy" => Ok(Self::Legacy),
            "create_new_id" => Ok(Self::CreateNewId),
            "fail" => Ok(Self::Fail),
            other => Err(Error::InvalidSettings(format!(
                "unrecognized id conflict policy: {}",
                other
            ))),
        }
    }
}

/// immutable import policy bundle
///
/// validated at construction, pure value afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImportSettings {
    pub mode: ImportMode,
    /// acl handling for nodes the import creates
    pub acl_on_create: AclHandling,
    /// acl handling for nodes that already existed
    pub acl_on_existing: AclHandling,
    /// node-change count after which an intermediate commit happens
    pub autosave_threshold: u32,
    /// promote property-level errors to fatal
    pub strict: bool,
    /// check out versioned, checked-in targets instead of failing
    pub auto_checkout: bool,
    pub id_conflict_policy: IdConflictPolicy,
}

impl ImportSettings {
    pub fn new(
        mode: ImportMode,
        acl_on_create: AclHandling,
        acl_on_existing: AclHandling,
        autosave_threshold: u32,
        strict: bool,
        auto_checkout: bool,
        id_conflict_policy: IdConflictPolicy,
    ) -> Result<Self> {
        if autosave_threshold == 0 {
            return Err(Error::InvalidSettings(
                "autosave threshold must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            mode,
            acl_on_create,
            acl_on_existing,
            autosave_threshold,
            strict,
            auto_checkout,
            id_conflict_policy,
        })
    }
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            mode: ImportMode::Replace,
            acl_on_create: AclHandling::Ignore,
            acl_on_existing: AclHandling::Ignore,
            autosave_threshold: 1024,
            strict: false,
            auto_checkout: false,
            id_conflict_policy: IdConflictPolicy::Legacy,
        }
    }
}
