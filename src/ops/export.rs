use std::collections::HashSet;
use std::io::Write;

use crate::error::{Error, Result};
use crate::options::ExportConfig;
use crate::package::writer::PackageWriter;
use crate::path;
use crate::session::ContentSession;
use crate::types::{
    NodeData, NodeId, NodeRecord, PackageManifest, PropertyValue, RootFilters,
};

/// caller-supplied veto over individual nodes at traversal time
pub trait NodePredicate {
    fn accept(&self, path: &str, node: &NodeData) -> bool;
}

/// counters describing one assembled package
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// node records written
    pub nodes: u64,
    /// binary properties carried inline
    pub inline_binaries: u64,
    /// binary properties stored as segments
    pub segments: u64,
    /// nodes included by reference-following outside the selected roots
    pub referenced_nodes: u64,
}

struct ExportState<'a, W: Write> {
    writer: PackageWriter<&'a mut W>,
    visited: HashSet<NodeId>,
    ref_queue: Vec<NodeId>,
    report: ExportReport,
}

/// assemble a package from the selected roots onto `out`
///
/// streams node records in depth-first order, parents before children,
/// siblings in repository order. on failure the bytes already written are
/// invalid and the caller must discard them. the sink stays open; the caller
/// closes it.
pub fn export_to_stream<S: ContentSession, W: Write>(
    session: &S,
    config: &ExportConfig,
    predicate: Option<&dyn NodePredicate>,
    out: &mut W,
) -> Result<ExportReport> {
    let filter = config.filter();
    let filters = filter
        .roots()
        .map(|root| RootFilters {
            root: root.to_string(),
            rules: filter
                .rules(root)
                .iter()
                .map(|r| r.to_rule_string())
                .collect(),
        })
        .filter(|f| !f.rules.is_empty())
        .collect();
    let manifest = PackageManifest::new(
        config.roots().to_vec(),
        filters,
        config.follow_references(),
        config.binary_threshold(),
    );

    let mut state = ExportState {
        writer: PackageWriter::new(out, &manifest)?,
        visited: HashSet::new(),
        ref_queue: Vec::new(),
        report: ExportReport::default(),
    };

    for root in config.roots() {
        if session.read_node(root)?.is_none() {
            return Err(Error::Export {
                path: root.clone(),
                message: "selected root cannot be read".to_string(),
            });
        }
        export_tree(session, config, predicate, &mut state, root)?;
    }

    if config.follow_references() {
        export_referenced(session, config, predicate, &mut state)?;
    }

    state.writer.finish()?;
    Ok(state.report)
}

/// depth-first walk below one path
fn export_tree<S: ContentSession, W: Write>(
    session: &S,
    config: &ExportConfig,
    predicate: Option<&dyn NodePredicate>,
    state: &mut ExportState<'_, W>,
    node_path: &str,
) -> Result<()> {
    let filter = config.filter();
    if filter.subtree_excluded(node_path) {
        return Ok(());
    }

    if filter.matches_node(node_path) {
        if let Some(node) = session.read_node(node_path)? {
            let vetoed = predicate.map_or(false, |p| !p.accept(node_path, &node));
            if !vetoed {
                emit_node(config, state, node_path, node)?;
            }
        }
    }

    // exclusion of the node body does not prune its descendants
    for child in session.child_names(node_path)? {
        export_tree(session, config, predicate, state, &path::join(node_path, child.as_str()))?;
    }
    Ok(())
}

/// write one node record plus its over-threshold binary segments
fn emit_node<W: Write>(
    config: &ExportConfig,
    state: &mut ExportState<'_, W>,
    node_path: &str,
    mut node: NodeData,
) -> Result<()> {
    let filter = config.filter();
    state.visited.insert(node.id);

    node.properties
        .retain(|p| filter.matches_property(node_path, &p.name));

    // over-threshold binaries move to segments written right after the
    // record; segment ids are assigned before the record is framed so the
    // properties can point at them
    let mut pending_segments: Vec<Vec<u8>> = Vec::new();
    for prop in &mut node.properties {
        match &mut prop.value {
            PropertyValue::Binary { bytes } if bytes.len() as u64 > config.binary_threshold() => {
                let segment = state.writer.segments_written() + pending_segments.len() as u64;
                let size = bytes.len() as u64;
                let payload = std::mem::take(bytes);
                prop.value = PropertyValue::BinaryRef { segment, size };
                pending_segments.push(payload);
                state.report.segments += 1;
            }
            PropertyValue::Binary { .. } => {
                state.report.inline_binaries += 1;
            }
            PropertyValue::Reference { target } if config.follow_references() => {
                state.ref_queue.push(*target);
            }
            _ => {}
        }
    }

    state.writer.write_node(&NodeRecord {
        path: config.alias(node_path),
        node,
    })?;
    for payload in pending_segments {
        state.writer.write_segment(&payload)?;
    }
    state.report.nodes += 1;
    Ok(())
}

/// drain the reference queue, exporting referenced nodes outside the roots
///
/// each referenced node is emitted once; its own reference properties feed
/// the queue, the visited set breaks cycles.
fn export_referenced<S: ContentSession, W: Write>(
    session: &S,
    config: &ExportConfig,
    predicate: Option<&dyn NodePredicate>,
    state: &mut ExportState<'_, W>,
) -> Result<()> {
    while let Some(target) = state.ref_queue.pop() {
        if state.visited.contains(&target) {
            continue;
        }
        let Some(target_path) = session.path_by_id(&target)? else {
            // dangling reference, the property still round-trips as an id
            state.visited.insert(target);
            continue;
        };
        let Some(node) = session.read_node(&target_path)? else {
            state.visited.insert(target);
            continue;
        };
        if predicate.map_or(false, |p| !p.accept(&target_path, &node)) {
            state.visited.insert(target);
            continue;
        }
        emit_node(config, state, &target_path, node)?;
        state.report.referenced_nodes += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterRule;
    use crate::options::ContentSelection;
    use crate::package::frame::Record;
    use crate::package::reader::PackageReader;
    use crate::session::MemoryRepository;

    fn sample_repo() -> MemoryRepository {
        let mut repo = MemoryRepository::new();
        repo.add_node(
            "/libs",
            NodeData::new("nt:folder").with_property("prop", PropertyValue::string("value")),
        )
        .unwrap();
        repo.add_node(
            "/libs/sub",
            NodeData::new("nt:unstructured").with_property("sub", PropertyValue::string("hello")),
        )
        .unwrap();
        repo.add_node("/libs/.sameLevel", NodeData::new("nt:unstructured"))
            .unwrap();
        repo
    }

    fn config(selection: ContentSelection) -> ExportConfig {
        ExportConfig::builder(selection).build().unwrap()
    }

    fn exported_paths(buf: &[u8]) -> Vec<String> {
        let mut reader = PackageReader::new(buf).unwrap();
        let mut paths = Vec::new();
        while let Some(record) = reader.next_record().unwrap() {
            if let Record::Node(n) = record {
                paths.push(n.path);
            }
        }
        paths
    }

    #[test]
    fn test_exports_selected_tree_in_order() {
        let repo = sample_repo();
        let cfg = config(ContentSelection::new().root("/libs"));

        let mut buf = Vec::new();
        let report = export_to_stream(&repo, &cfg, None, &mut buf).unwrap();

        assert_eq!(report.nodes, 3);
        assert_eq!(
            exported_paths(&buf),
            vec!["/libs", "/libs/sub", "/libs/.sameLevel"]
        );
    }

    #[test]
    fn test_missing_root_fails() {
        let repo = sample_repo();
        let cfg = config(ContentSelection::new().root("/missing"));

        let mut buf = Vec::new();
        let result = export_to_stream(&repo, &cfg, None, &mut buf);
        assert!(matches!(result, Err(Error::Export { .. })));
    }

    #[test]
    fn test_excluded_node_still_descends() {
        let repo = sample_repo();
        let mut extra = repo.clone();
        extra
            .add_node("/libs/sub/deep", NodeData::new("nt:unstructured"))
            .unwrap();
        let cfg = ExportConfig::builder(ContentSelection::new().root_with_rules(
            "/libs",
            vec![FilterRule::exclude("/libs/sub").unwrap()],
        ))
        .build()
        .unwrap();

        let mut buf = Vec::new();
        export_to_stream(&extra, &cfg, None, &mut buf).unwrap();

        let paths = exported_paths(&buf);
        assert!(!paths.contains(&"/libs/sub".to_string()));
        assert!(paths.contains(&"/libs/sub/deep".to_string()));
    }

    #[test]
    fn test_exclude_subtree_prunes() {
        let mut repo = sample_repo();
        repo.add_node("/libs/sub/deep", NodeData::new("nt:unstructured"))
            .unwrap();
        let cfg = ExportConfig::builder(ContentSelection::new().root_with_rules(
            "/libs",
            vec![FilterRule::exclude_subtree("/libs/sub").unwrap()],
        ))
        .build()
        .unwrap();

        let mut buf = Vec::new();
        export_to_stream(&repo, &cfg, None, &mut buf).unwrap();

        let paths = exported_paths(&buf);
        assert!(!paths.contains(&"/libs/sub".to_string()));
        assert!(!paths.contains(&"/libs/sub/deep".to_string()));
    }

    #[test]
    fn test_property_filter_drops_property() {
        let repo = sample_repo();
        let cfg = ExportConfig::builder(ContentSelection::new().root_with_rules(
            "/libs",
            vec![FilterRule::new(
                "/libs/prop",
                crate::filter::Effect::Exclude,
                crate::filter::AppliesTo::Property,
            )
            .unwrap()],
        ))
        .build()
        .unwrap();

        let mut buf = Vec::new();
        export_to_stream(&repo, &cfg, None, &mut buf).unwrap();

        let mut reader = PackageReader::new(&buf[..]).unwrap();
        let first = match reader.next_record().unwrap().unwrap() {
            Record::Node(n) => n,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(first.path, "/libs");
        assert!(first.node.property("prop").is_none());
    }

    #[test]
    fn test_threshold_boundary_inclusive_inline() {
        let mut repo = MemoryRepository::new();
        repo.add_node(
            "/libs",
            NodeData::new("nt:folder")
                .with_property("at", PropertyValue::binary(vec![0u8; 8]))
                .with_property("over", PropertyValue::binary(vec![0u8; 9])),
        )
        .unwrap();
        let cfg = ExportConfig::builder(ContentSelection::new().root("/libs"))
            .binary_threshold(8)
            .build()
            .unwrap();

        let mut buf = Vec::new();
        let report = export_to_stream(&repo, &cfg, None, &mut buf).unwrap();
        assert_eq!(report.inline_binaries, 1);
        assert_eq!(report.segments, 1);

        let mut reader = PackageReader::new(&buf[..]).unwrap();
        let node = match reader.next_record().unwrap().unwrap() {
            Record::Node(n) => n.node,
            other => panic!("unexpected {:?}", other),
        };
        assert!(matches!(
            node.property("at").unwrap().value,
            PropertyValue::Binary { .. }
        ));
        assert!(matches!(
            node.property("over").unwrap().value,
            PropertyValue::BinaryRef { size: 9, .. }
        ));
    }

    #[test]
    fn test_predicate_vetoes_node() {
        struct DropSub;
        impl NodePredicate for DropSub {
            fn accept(&self, path: &str, _node: &NodeData) -> bool {
                path != "/libs/sub"
            }
        }

        let repo = sample_repo();
        let cfg = config(ContentSelection::new().root("/libs"));

        let mut buf = Vec::new();
        export_to_stream(&repo, &cfg, Some(&DropSub), &mut buf).unwrap();

        let paths = exported_paths(&buf);
        assert!(!paths.contains(&"/libs/sub".to_string()));
        assert!(paths.contains(&"/libs".to_string()));
    }

    #[test]
    fn test_follow_references_exports_targets() {
        let mut repo = sample_repo();
        repo.add_node(
            "/apps",
            NodeData::new("nt:folder").with_property("foo", PropertyValue::string("baa")),
        )
        .unwrap();
        let target_id = repo.read_node("/apps").unwrap().unwrap().id;
        let mut libs = repo.read_node("/libs").unwrap().unwrap();
        libs.set_property("ref", PropertyValue::reference(target_id));
        repo.write_node("/libs", libs).unwrap();

        let cfg = ExportConfig::builder(ContentSelection::new().root("/libs"))
            .follow_references(true)
            .build()
            .unwrap();

        let mut buf = Vec::new();
        let report = export_to_stream(&repo, &cfg, None, &mut buf).unwrap();
        assert_eq!(report.referenced_nodes, 1);
        assert!(exported_paths(&buf).contains(&"/apps".to_string()));
    }

    #[test]
    fn test_reference_cycle_terminates() {
        let mut repo = MemoryRepository::new();
        repo.add_node("/a", NodeData::new("nt:unstructured")).unwrap();
        repo.add_node("/b", NodeData::new("nt:unstructured")).unwrap();
        let a_id = repo.read_node("/a").unwrap().unwrap().id;
        let b_id = repo.read_node("/b").unwrap().unwrap().id;

        let mut a = repo.read_node("/a").unwrap().unwrap();
        a.set_property("next", PropertyValue::reference(b_id));
        repo.write_node("/a", a).unwrap();
        let mut b = repo.read_node("/b").unwrap().unwrap();
        b.set_property("next", PropertyValue::reference(a_id));
        repo.write_node("/b", b).unwrap();

        let cfg = ExportConfig::builder(ContentSelection::new().root("/a"))
            .follow_references(true)
            .build()
            .unwrap();

        let mut buf = Vec::new();
        let report = export_to_stream(&repo, &cfg, None, &mut buf).unwrap();
        // /a from the selection, /b by reference; the back-reference stops
        assert_eq!(report.nodes, 2);
    }

    #[test]
    fn test_path_alias_rewrites_record_paths() {
        let repo = sample_repo();
        let cfg = ExportConfig::builder(ContentSelection::new().root("/libs"))
            .path_alias("/libs", "/content/libs")
            .build()
            .unwrap();

        let mut buf = Vec::new();
        export_to_stream(&repo, &cfg, None, &mut buf).unwrap();

        assert_eq!(
            exported_paths(&buf),
            vec!["/content/libs", "/content/libs/sub", "/content/libs/.sameLevel"]
        );
    }

    #[test]
    fn test_manifest_records_filters() {
        let repo = sample_repo();
        let cfg = ExportConfig::builder(ContentSelection::new().root_with_rules(
            "/libs",
            vec![FilterRule::parse("-/libs/private").unwrap()],
        ))
        .build()
        .unwrap();

        let mut buf = Vec::new();
        export_to_stream(&repo, &cfg, None, &mut buf).unwrap();

        let reader = PackageReader::new(&buf[..]).unwrap();
        let manifest = reader.manifest();
        assert_eq!(manifest.roots, vec!["/libs".to_string()]);
        assert_eq!(manifest.filters.len(), 1);
        assert_eq!(manifest.filters[0].rules, vec!["-/libs/private".to_string()]);
    }
}
