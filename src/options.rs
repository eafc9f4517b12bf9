use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::filter::{FilterRule, PathFilter};
use crate::path;

/// a content selection: root paths with their ordered filter rules
///
/// roots keep their declaration order; duplicates are rejected when the
/// selection is turned into an [`ExportConfig`].
#[derive(Debug, Default)]
pub struct ContentSelection {
    roots: Vec<(String, Vec<FilterRule>)>,
}

impl ContentSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// add a root with no filter rules (include everything under it)
    pub fn root(mut self, path: impl Into<String>) -> Self {
        self.roots.push((path.into(), Vec::new()));
        self
    }

    /// add a root with ordered filter rules
    pub fn root_with_rules(mut self, path: impl Into<String>, rules: Vec<FilterRule>) -> Self {
        self.roots.push((path.into(), rules));
        self
    }

    /// selected root paths in declaration order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.roots.iter().map(|(p, _)| p.as_str())
    }

    fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// immutable export configuration, created once per export call
#[derive(Debug)]
pub struct ExportConfig {
    roots: Vec<String>,
    filter: PathFilter,
    follow_references: bool,
    binary_threshold: u64,
    path_aliases: HashMap<String, String>,
}

impl ExportConfig {
    /// start building a configuration from a selection
    pub fn builder(selection: ContentSelection) -> ExportConfigBuilder {
        ExportConfigBuilder {
            selection,
            overrides: Vec::new(),
            allowed_roots: Vec::new(),
            follow_references: false,
            binary_threshold: DEFAULT_BINARY_THRESHOLD,
            path_aliases: HashMap::new(),
        }
    }

    /// selected roots, normalized, in declaration order
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn filter(&self) -> &PathFilter {
        &self.filter
    }

    pub fn follow_references(&self) -> bool {
        self.follow_references
    }

    /// binary inline threshold in bytes, inclusive on the inline side
    pub fn binary_threshold(&self) -> u64 {
        self.binary_threshold
    }

    /// rewrite a source path through the alias table (longest prefix wins)
    pub fn alias(&self, source_path: &str) -> String {
        let mut best: Option<(&str, &str)> = None;
        for (from, to) in &self.path_aliases {
            if path::is_under(source_path, from)
                && best.map_or(true, |(prev, _)| from.len() > prev.len())
            {
                best = Some((from, to));
            }
        }
        match best {
            Some((from, to)) if source_path == from => to.to_string(),
            Some((from, to)) => format!("{}{}", to, &source_path[from.len()..]),
            None => source_path.to_string(),
        }
    }
}

/// default binary inline threshold (16 KiB)
pub const DEFAULT_BINARY_THRESHOLD: u64 = 16 * 1024;

/// builds an [`ExportConfig`], validating the selection against the
/// package-root allowlist
pub struct ExportConfigBuilder {
    selection: ContentSelection,
    overrides: Vec<(String, Vec<FilterRule>)>,
    allowed_roots: Vec<String>,
    follow_references: bool,
    binary_threshold: u64,
    path_aliases: HashMap<String, String>,
}

impl ExportConfigBuilder {
    /// restrict selectable paths to these roots; empty means unrestricted
    pub fn allowed_roots(mut self, roots: impl IntoIterator<Item = String>) -> Self {
        self.allowed_roots = roots.into_iter().collect();
        self
    }

    /// extra filter rules merged after a root's own rules
    ///
    /// the root must be part of the selection.
    pub fn filter_override(mut self, root: impl Into<String>, rules: Vec<FilterRule>) -> Self {
        self.overrides.push((root.into(), rules));
        self
    }

    pub fn follow_references(mut self, follow: bool) -> Self {
        self.follow_references = follow;
        self
    }

    pub fn binary_threshold(mut self, bytes: u64) -> Self {
        self.binary_threshold = bytes;
        self
    }

    /// alias a source path prefix to a different packaged prefix
    pub fn path_alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.path_aliases.insert(from.into(), to.into());
        self
    }

    pub fn build(self) -> Result<ExportConfig> {
        if self.selection.is_empty() {
            return Err(Error::InvalidSelection("no root paths selected".to_string()));
        }

        let mut allowed = Vec::with_capacity(self.allowed_roots.len());
        for root in &self.allowed_roots {
            allowed.push(path::normalize(root)?);
        }

        let mut roots = Vec::with_capacity(self.selection.roots.len());
        let mut filter_input = Vec::with_capacity(self.selection.roots.len());
        for (root, rules) in self.selection.roots {
            let root = path::normalize(&root)?;
            if !allowed.is_empty() && !allowed.iter().any(|a| path::is_under(&root, a)) {
                return Err(Error::InvalidSelection(format!(
                    "path {} is outside the configured package roots",
                    root
                )));
            }
            if roots.contains(&root) {
                return Err(Error::InvalidSelection(format!("duplicate root: {}", root)));
            }
            roots.push(root.clone());
            filter_input.push((root, rules));
        }

        for (root, rules) in self.overrides {
            let root = path::normalize(&root)?;
            let slot = filter_input
                .iter_mut()
                .find(|(r, _)| *r == root)
                .ok_or_else(|| {
                    Error::InvalidSelection(format!(
                        "filter override references root {} not present in the selection",
                        root
                    ))
                })?;
            slot.1.extend(rules);
        }

        let mut aliases = HashMap::with_capacity(self.path_aliases.len());
        for (from, to) in self.path_aliases {
            aliases.insert(path::normalize(&from)?, path::normalize(&to)?);
        }

        Ok(ExportConfig {
            roots,
            filter: PathFilter::new(filter_input)?,
            follow_references: self.follow_references,
            binary_threshold: self.binary_threshold,
            path_aliases: aliases,
        })
    }
}
