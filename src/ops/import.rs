use std::collections::HashMap;
use std::io::Read;

use crate::error::{Error, Result};
use crate::package::frame::Record;
use crate::package::reader::PackageReader;
use crate::path;
use crate::session::ContentSession;
use crate::settings::{AclHandling, IdConflictPolicy, ImportMode, ImportSettings};
use crate::types::{AclEntry, NodeData, NodeId, NodeRecord, PropertyValue};

/// a recoverable per-property problem recorded during a non-strict import
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportWarning {
    pub path: String,
    pub property: String,
    pub message: String,
}

/// outcome of one import call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub nodes_created: u64,
    pub nodes_updated: u64,
    pub nodes_skipped: u64,
    /// commits performed, including the final one
    pub commits: u64,
    pub warnings: Vec<ImportWarning>,
}

struct ImportState {
    report: ImportReport,
    pending_changes: u32,
}

impl ImportState {
    fn record_change<S: ContentSession>(
        &mut self,
        session: &mut S,
        settings: &ImportSettings,
    ) -> Result<()> {
        self.pending_changes += 1;
        if self.pending_changes >= settings.autosave_threshold {
            session.commit()?;
            self.report.commits += 1;
            self.pending_changes = 0;
        }
        Ok(())
    }
}

/// replay a package stream into the target repository
///
/// nodes are applied in stream order under the configured import mode,
/// committed in auto-save batches. a structural failure aborts the import
/// but leaves earlier checkpoints committed; the target is then partially
/// updated, not rolled back.
pub fn import_from_stream<S: ContentSession, R: Read>(
    session: &mut S,
    settings: &ImportSettings,
    input: R,
) -> Result<ImportReport> {
    let mut reader = PackageReader::new(input)?;
    let mut state = ImportState {
        report: ImportReport::default(),
        pending_changes: 0,
    };

    while let Some(record) = reader.next_record()? {
        match record {
            Record::Node(node_record) => {
                let segments = collect_segments(&mut reader, &node_record)?;
                apply_record(session, settings, &mut state, node_record, segments)?;
            }
            Record::Segment { segment, .. } => {
                return Err(Error::ImportStructural(format!(
                    "segment {} not preceded by a node that references it",
                    segment
                )));
            }
            Record::Manifest(_) | Record::End => unreachable!("handled by the reader"),
        }
    }

    if state.pending_changes > 0 {
        session.commit()?;
        state.report.commits += 1;
    }
    Ok(state.report)
}

/// read the binary segments belonging to one node record
///
/// a node's over-threshold binaries directly follow its record, one segment
/// frame each, in property order.
fn collect_segments<R: Read>(
    reader: &mut PackageReader<R>,
    node_record: &NodeRecord,
) -> Result<HashMap<u64, Vec<u8>>> {
    let expected = node_record
        .node
        .properties
        .iter()
        .filter(|p| matches!(p.value, PropertyValue::BinaryRef { .. }))
        .count();

    let mut segments = HashMap::with_capacity(expected);
    for _ in 0..expected {
        match reader.next_record()? {
            Some(Record::Segment {
                segment, checksum, ..
            }) => {
                let payload = reader.read_segment(segment, &checksum)?;
                segments.insert(segment, payload);
            }
            other => {
                return Err(Error::ImportStructural(format!(
                    "node {} references {} binary segments but the stream has {:?} instead",
                    node_record.path, expected, other
                )));
            }
        }
    }
    Ok(segments)
}

fn apply_record<S: ContentSession>(
    session: &mut S,
    settings: &ImportSettings,
    state: &mut ImportState,
    record: NodeRecord,
    segments: HashMap<u64, Vec<u8>>,
) -> Result<()> {
    let node_path = path::normalize(&record.path)
        .map_err(|e| Error::ImportStructural(format!("bad record path: {}", e)))?;

    let mut incoming = record.node;
    resolve_binaries(settings, state, &node_path, &mut incoming, segments)?;

    // stable-id collision with a node somewhere else in the target
    if let Some(existing_path) = session.path_by_id(&incoming.id)? {
        if existing_path != node_path {
            match settings.id_conflict_policy {
                IdConflictPolicy::Legacy => {
                    session.remove_node(&existing_path)?;
                    state.record_change(session, settings)?;
                }
                IdConflictPolicy::CreateNewId => {
                    incoming.id = NodeId::new();
                }
                IdConflictPolicy::Fail => {
                    return Err(Error::IdConflict {
                        id: incoming.id.to_string(),
                        existing_path,
                        incoming_path: node_path,
                    });
                }
            }
        }
    }

    ensure_ancestors(session, settings, state, &node_path)?;
    ensure_writable(session, settings, &node_path)?;

    let existing = session.read_node(&node_path)?;
    match existing {
        None => {
            incoming.acl = apply_acl(settings.acl_on_create, &[], &incoming.acl);
            session.write_node(&node_path, incoming)?;
            state.report.nodes_created += 1;
            state.record_change(session, settings)?;
        }
        Some(current) => match settings.mode {
            ImportMode::Replace => {
                incoming.acl = apply_acl(settings.acl_on_existing, &current.acl, &incoming.acl);
                // wholesale: drop the existing subtree, later records in the
                // package re-create the children it covers
                session.remove_node(&node_path)?;
                session.write_node(&node_path, incoming)?;
                state.report.nodes_updated += 1;
                state.record_change(session, settings)?;
            }
            ImportMode::Merge => {
                let mut merged = merge_node(&current, &incoming, false);
                merged.acl = apply_acl(settings.acl_on_existing, &current.acl, &incoming.acl);
                if merged == current {
                    state.report.nodes_skipped += 1;
                } else {
                    session.write_node(&node_path, merged)?;
                    state.report.nodes_updated += 1;
                    state.record_change(session, settings)?;
                }
            }
            ImportMode::Update => {
                let mut merged = merge_node(&current, &incoming, true);
                merged.acl = apply_acl(settings.acl_on_existing, &current.acl, &incoming.acl);
                if merged == current {
                    state.report.nodes_skipped += 1;
                } else {
                    session.write_node(&node_path, merged)?;
                    state.report.nodes_updated += 1;
                    state.record_change(session, settings)?;
                }
            }
        },
    }
    Ok(())
}

/// swap segment references back to inline binaries
///
/// a reference without a matching segment is a property-level problem:
/// skipped with a warning, fatal under strict.
fn resolve_binaries(
    settings: &ImportSettings,
    state: &mut ImportState,
    node_path: &str,
    node: &mut NodeData,
    mut segments: HashMap<u64, Vec<u8>>,
) -> Result<()> {
    let mut dropped = Vec::new();
    for prop in &mut node.properties {
        let (segment, size) = match prop.value {
            PropertyValue::BinaryRef { segment, size } => (segment, size),
            _ => continue,
        };
        match segments.remove(&segment) {
            Some(payload) if payload.len() as u64 == size => {
                prop.value = PropertyValue::Binary { bytes: payload };
            }
            Some(payload) => {
                return Err(Error::ImportStructural(format!(
                    "segment {} carries {} bytes, property {} expects {}",
                    segment,
                    payload.len(),
                    prop.name,
                    size
                )));
            }
            None => {
                let err = Error::ImportProperty {
                    path: node_path.to_string(),
                    name: prop.name.clone(),
                    message: format!("missing binary segment {}", segment),
                };
                if settings.strict {
                    return Err(err);
                }
                eprintln!("warning: {}, skipping property", err);
                state.report.warnings.push(ImportWarning {
                    path: node_path.to_string(),
                    property: prop.name.clone(),
                    message: err.to_string(),
                });
                dropped.push(prop.name.clone());
            }
        }
    }
    for name in dropped {
        node.remove_property(&name);
    }
    Ok(())
}

/// create placeholder nodes for missing ancestors of an incoming path
fn ensure_ancestors<S: ContentSession>(
    session: &mut S,
    settings: &ImportSettings,
    state: &mut ImportState,
    node_path: &str,
) -> Result<()> {
    for ancestor in path::ancestors(node_path) {
        if ancestor == "/" {
            continue;
        }
        if session.read_node(&ancestor)?.is_none() {
            session.write_node(&ancestor, NodeData::new("nt:unstructured"))?;
            state.report.nodes_created += 1;
            state.record_change(session, settings)?;
        }
    }
    Ok(())
}

/// fail or check out a versioned, checked-in target before writing it
fn ensure_writable<S: ContentSession>(
    session: &mut S,
    settings: &ImportSettings,
    node_path: &str,
) -> Result<()> {
    if session.is_checked_in(node_path)? {
        if !settings.auto_checkout {
            return Err(Error::CheckedIn(node_path.to_string()));
        }
        session.checkout(node_path)?;
    }
    Ok(())
}

/// merge incoming properties into the current node
///
/// existing property values win; `remove_absent` additionally drops current
/// properties the package no longer carries (update mode).
fn merge_node(current: &NodeData, incoming: &NodeData, remove_absent: bool) -> NodeData {
    let mut merged = current.clone();
    for prop in &incoming.properties {
        if merged.property(&prop.name).is_none() {
            merged.properties.push(prop.clone());
        }
    }
    if remove_absent {
        merged
            .properties
            .retain(|p| incoming.property(&p.name).is_some());
    }
    merged
}

fn apply_acl(
    handling: AclHandling,
    current: &[AclEntry],
    incoming: &[AclEntry],
) -> Vec<AclEntry> {
    match handling {
        AclHandling::Ignore => current.to_vec(),
        AclHandling::Overwrite => incoming.to_vec(),
        AclHandling::Merge => {
            let mut merged = current.to_vec();
            for entry in incoming {
                if !merged.iter().any(|e| e.principal == entry.principal) {
                    merged.push(entry.clone());
                }
            }
            merged
        }
        AclHandling::Clear => Vec::new(),
    }
}
