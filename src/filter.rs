use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::path;

/// what a filter rule applies to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppliesTo {
    Node,
    Property,
}

/// rule outcome
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    Include,
    /// drop the node record but keep walking its descendants
    Exclude,
    /// drop the node record and prune the walk below it
    ExcludeSubtree,
}

/// a single include/exclude pattern scoped to a root
///
/// the pattern is a glob matched against the full node path, or against
/// `node_path/property_name` for property rules.
#[derive(Clone, Debug)]
pub struct FilterRule {
    pattern: glob::Pattern,
    effect: Effect,
    applies_to: AppliesTo,
    source: String,
}

impl FilterRule {
    pub fn new(pattern: &str, effect: Effect, applies_to: AppliesTo) -> Result<Self> {
        let compiled = glob::Pattern::new(pattern).map_err(|e| Error::InvalidFilter {
            rule: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            pattern: compiled,
            effect,
            applies_to,
            source: pattern.to_string(),
        })
    }

    pub fn include(pattern: &str) -> Result<Self> {
        Self::new(pattern, Effect::Include, AppliesTo::Node)
    }

    pub fn exclude(pattern: &str) -> Result<Self> {
        Self::new(pattern, Effect::Exclude, AppliesTo::Node)
    }

    pub fn exclude_subtree(pattern: &str) -> Result<Self> {
        Self::new(pattern, Effect::ExcludeSubtree, AppliesTo::Node)
    }

    /// parse the textual rule form used in configuration
    ///
    /// leading `+` includes, `-` excludes, `!` excludes the whole subtree.
    /// a `prop:` prefix before the sign marks a property rule.
    pub fn parse(rule: &str) -> Result<Self> {
        let (applies_to, rest) = match rule.strip_prefix("prop:") {
            Some(rest) => (AppliesTo::Property, rest),
            None => (AppliesTo::Node, rule),
        };

        let (effect, pattern) = match rest.as_bytes().first() {
            Some(b'+') => (Effect::Include, &rest[1..]),
            Some(b'-') => (Effect::Exclude, &rest[1..]),
            Some(b'!') => (Effect::ExcludeSubtree, &rest[1..]),
            _ => {
                return Err(Error::InvalidFilter {
                    rule: rule.to_string(),
                    message: "rule must start with '+', '-' or '!'".to_string(),
                })
            }
        };

        if pattern.is_empty() {
            return Err(Error::InvalidFilter {
                rule: rule.to_string(),
                message: "empty pattern".to_string(),
            });
        }

        Self::new(pattern, effect, applies_to)
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn applies_to(&self) -> AppliesTo {
        self.applies_to
    }

    /// textual form with sign and prefix, suitable for the manifest
    pub fn to_rule_string(&self) -> String {
        let sign = match self.effect {
            Effect::Include => '+',
            Effect::Exclude => '-',
            Effect::ExcludeSubtree => '!',
        };
        match self.applies_to {
            AppliesTo::Node => format!("{}{}", sign, self.source),
            AppliesTo::Property => format!("prop:{}{}", sign, self.source),
        }
    }

    fn matches(&self, candidate: &str) -> bool {
        self.pattern.matches(candidate)
    }
}

/// evaluates node and property paths against ordered per-root rule lists
///
/// pure over its configuration: a candidate must sit at or below one of the
/// configured roots, then that root's rules decide in declaration order,
/// first match wins. no match means include; root scope alone is the
/// implicit include.
#[derive(Clone, Debug, Default)]
pub struct PathFilter {
    roots: BTreeMap<String, Vec<FilterRule>>,
}

impl PathFilter {
    /// build a filter from normalized roots and their ordered rules
    pub fn new(roots: impl IntoIterator<Item = (String, Vec<FilterRule>)>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for (root, rules) in roots {
            let root = path::normalize(&root)?;
            if map.insert(root.clone(), rules).is_some() {
                return Err(Error::InvalidSelection(format!("duplicate root: {}", root)));
            }
        }
        Ok(Self { roots: map })
    }

    /// configured roots, sorted
    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.roots.keys().map(|s| s.as_str())
    }

    /// rules configured for one root
    pub fn rules(&self, root: &str) -> &[FilterRule] {
        self.roots.get(root).map(Vec::as_slice).unwrap_or(&[])
    }

    /// is the path at or below any configured root
    pub fn is_under_any_root(&self, candidate: &str) -> bool {
        self.roots.keys().any(|root| path::is_under(candidate, root))
    }

    /// the most specific (longest) root covering the path
    fn covering_root(&self, candidate: &str) -> Option<&str> {
        self.roots
            .keys()
            .filter(|root| path::is_under(candidate, root))
            .max_by_key(|root| root.len())
            .map(|s| s.as_str())
    }

    fn evaluate(&self, candidate: &str, kind: AppliesTo) -> Effect {
        let Some(root) = self.covering_root(candidate) else {
            return Effect::Exclude;
        };
        for rule in &self.roots[root] {
            if rule.applies_to() == kind && rule.matches(candidate) {
                return rule.effect();
            }
        }
        Effect::Include
    }

    /// include/exclude outcome for a node or property path
    pub fn matches(&self, candidate: &str, kind: AppliesTo) -> bool {
        self.evaluate(candidate, kind) == Effect::Include
    }

    /// should a node at this path be included in the package body
    pub fn matches_node(&self, candidate: &str) -> bool {
        self.matches(candidate, AppliesTo::Node)
    }

    /// should a property be included, matched against `node_path/name`
    pub fn matches_property(&self, node_path: &str, name: &str) -> bool {
        self.matches(&path::join(node_path, name), AppliesTo::Property)
    }

    /// did an exclude-subtree rule match, meaning the walk stops here
    pub fn subtree_excluded(&self, candidate: &str) -> bool {
        self.evaluate(candidate, AppliesTo::Node) == Effect::ExcludeSubtree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(root: &str, rules: &[&str]) -> PathFilter {
        let rules = rules.iter().map(|r| FilterRule::parse(r).unwrap()).collect();
        PathFilter::new([(root.to_string(), rules)]).unwrap()
    }

    #[test]
    fn test_root_scope_is_implicit_include() {
        let f = filter("/libs", &[]);
        assert!(f.matches_node("/libs"));
        assert!(f.matches_node("/libs/sub"));
        assert!(!f.matches_node("/apps"));
    }

    #[test]
    fn test_first_match_wins() {
        // include beats the later exclude for the same path
        let f = filter("/libs", &["+/libs/keep", "-/libs/*"]);
        assert!(f.matches_node("/libs/keep"));
        assert!(!f.matches_node("/libs/drop"));
        // the root itself has no matching rule, so it stays included
        assert!(f.matches_node("/libs"));
    }

    #[test]
    fn test_exclude_does_not_prune() {
        let f = filter("/libs", &["-/libs/sub"]);
        assert!(!f.matches_node("/libs/sub"));
        assert!(!f.subtree_excluded("/libs/sub"));
        // descendants are evaluated independently
        assert!(f.matches_node("/libs/sub/child"));
    }

    #[test]
    fn test_exclude_subtree_prunes() {
        let f = filter("/libs", &["!/libs/private"]);
        assert!(!f.matches_node("/libs/private"));
        assert!(f.subtree_excluded("/libs/private"));
    }

    #[test]
    fn test_property_rules_are_separate() {
        let f = filter("/libs", &["prop:-/libs/*/secret"]);
        assert!(f.matches_node("/libs/sub"));
        assert!(!f.matches_property("/libs/sub", "secret"));
        assert!(f.matches_property("/libs/sub", "public"));
    }

    #[test]
    fn test_hidden_nodes_are_ordinary() {
        let f = filter("/libs", &[]);
        assert!(f.matches_node("/libs/.sameLevel"));

        let f = filter("/libs", &["-/libs/.sameLevel"]);
        assert!(!f.matches_node("/libs/.sameLevel"));
    }

    #[test]
    fn test_longest_root_rules_apply() {
        let rules_outer = vec![FilterRule::parse("-/libs/sub/*").unwrap()];
        let f = PathFilter::new([
            ("/libs".to_string(), rules_outer),
            ("/libs/sub".to_string(), vec![]),
        ])
        .unwrap();
        // /libs/sub is covered by the more specific root, whose empty rule
        // list includes everything
        assert!(f.matches_node("/libs/sub/child"));
    }

    #[test]
    fn test_duplicate_root_rejected() {
        let result = PathFilter::new([
            ("/libs".to_string(), vec![]),
            ("/libs/".to_string(), vec![]),
        ]);
        assert!(matches!(result, Err(Error::InvalidSelection(_))));
    }

    #[test]
    fn test_parse_rule_forms() {
        assert_eq!(FilterRule::parse("+/a").unwrap().effect(), Effect::Include);
        assert_eq!(FilterRule::parse("-/a").unwrap().effect(), Effect::Exclude);
        assert_eq!(
            FilterRule::parse("!/a").unwrap().effect(),
            Effect::ExcludeSubtree
        );
        assert_eq!(
            FilterRule::parse("prop:-/a/b").unwrap().applies_to(),
            AppliesTo::Property
        );
        assert!(FilterRule::parse("/a").is_err());
        assert!(FilterRule::parse("-").is_err());
    }

    #[test]
    fn test_rule_string_roundtrip() {
        for rule in ["+/libs/**", "-/libs/private", "!/libs/tmp", "prop:-/a/b"] {
            let parsed = FilterRule::parse(rule).unwrap();
            assert_eq!(parsed.to_rule_string(), rule);
        }
    }
}
