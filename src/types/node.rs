use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// stable node identity, preserved across export/import
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    /// mint a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// parse from the hyphenated string form
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full = self.0.to_string();
        write!(f, "NodeId({})", &full[..8])
    }
}

/// value of a single node property
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyValue {
    /// string value
    String { value: String },

    /// 64-bit integer
    Long { value: i64 },

    /// 64-bit float
    Double { value: f64 },

    /// boolean
    Boolean { value: bool },

    /// binary content small enough to carry inline
    Binary { bytes: Vec<u8> },

    /// binary content stored in a package segment
    BinaryRef { segment: u64, size: u64 },

    /// reference to another node by stable id
    Reference { target: NodeId },
}

impl PropertyValue {
    /// get the type name for messages
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::String { .. } => "string",
            PropertyValue::Long { .. } => "long",
            PropertyValue::Double { .. } => "double",
            PropertyValue::Boolean { .. } => "boolean",
            PropertyValue::Binary { .. } => "binary",
            PropertyValue::BinaryRef { .. } => "binary_ref",
            PropertyValue::Reference { .. } => "reference",
        }
    }

    /// is this a binary value (inline or by segment reference)
    pub fn is_binary(&self) -> bool {
        matches!(
            self,
            PropertyValue::Binary { .. } | PropertyValue::BinaryRef { .. }
        )
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::String {
            value: value.into(),
        }
    }

    pub fn long(value: i64) -> Self {
        Self::Long { value }
    }

    pub fn boolean(value: bool) -> Self {
        Self::Boolean { value }
    }

    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Binary {
            bytes: bytes.into(),
        }
    }

    pub fn reference(target: NodeId) -> Self {
        Self::Reference { target }
    }
}

/// a named node property
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: PropertyValue,
}

impl Property {
    pub fn new(name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// a single access-control entry on a node
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    pub principal: String,
    pub privileges: Vec<String>,
    pub allow: bool,
}

impl AclEntry {
    pub fn allow(principal: impl Into<String>, privileges: Vec<String>) -> Self {
        Self {
            principal: principal.into(),
            privileges,
            allow: true,
        }
    }

    pub fn deny(principal: impl Into<String>, privileges: Vec<String>) -> Self {
        Self {
            principal: principal.into(),
            privileges,
            allow: false,
        }
    }
}

/// node content as read from or written to a repository
///
/// property order and acl order are significant and preserved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub id: NodeId,
    pub primary_type: String,
    pub properties: Vec<Property>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acl: Vec<AclEntry>,
}

impl NodeData {
    pub fn new(primary_type: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            primary_type: primary_type.into(),
            properties: Vec::new(),
            acl: Vec::new(),
        }
    }

    /// builder-style property append
    pub fn with_property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.push(Property::new(name, value));
        self
    }

    /// look up a property by name
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// replace or append a property, keeping existing order on replace
    pub fn set_property(&mut self, name: &str, value: PropertyValue) {
        match self.properties.iter_mut().find(|p| p.name == name) {
            Some(prop) => prop.value = value,
            None => self.properties.push(Property::new(name, value)),
        }
    }

    /// remove a property by name, returning whether it existed
    pub fn remove_property(&mut self, name: &str) -> bool {
        let before = self.properties.len();
        self.properties.retain(|p| p.name != name);
        self.properties.len() != before
    }
}

/// a node record as it appears in the package stream
///
/// `path` is the packaged (possibly aliased) absolute path. records appear in
/// depth-first order, parents strictly before children, siblings in source
/// order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub path: String,
    pub node: NodeData,
}
