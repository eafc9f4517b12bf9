use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IoResultExt, Result};
use crate::filter::FilterRule;
use crate::options::{ContentSelection, ExportConfig, ExportConfigBuilder, DEFAULT_BINARY_THRESHOLD};
use crate::settings::ImportSettings;

/// serializer configuration consumed from collaborators, stored as TOML
///
/// bundles the package-root allowlist, default filter rules, export knobs
/// and the import policy so callers can wire a serializer from one file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SerializerConfig {
    /// paths under which export/import is permitted; empty = unrestricted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub package_roots: Vec<String>,
    /// node filter rule strings applied to every selected root
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub node_filters: Vec<String>,
    /// property filter rule strings applied to every selected root
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub property_filters: Vec<String>,
    /// follow reference-typed properties outside the selected roots
    #[serde(default)]
    pub follow_references: bool,
    /// binary inline threshold in bytes
    #[serde(default = "default_threshold")]
    pub binary_threshold: u64,
    /// import policy bundle
    #[serde(default)]
    pub import: ImportSettings,
}

fn default_threshold() -> u64 {
    DEFAULT_BINARY_THRESHOLD
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            package_roots: vec![],
            node_filters: vec![],
            property_filters: vec![],
            follow_references: false,
            binary_threshold: DEFAULT_BINARY_THRESHOLD,
            import: ImportSettings::default(),
        }
    }
}

impl SerializerConfig {
    /// load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let config: SerializerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }

    /// configured default rules, node filters before property filters
    pub fn default_rules(&self) -> Result<Vec<FilterRule>> {
        let mut rules = Vec::with_capacity(self.node_filters.len() + self.property_filters.len());
        for rule in &self.node_filters {
            rules.push(FilterRule::parse(rule)?);
        }
        for rule in &self.property_filters {
            let rule = if rule.starts_with("prop:") {
                rule.clone()
            } else {
                format!("prop:{}", rule)
            };
            rules.push(FilterRule::parse(&rule)?);
        }
        Ok(rules)
    }

    /// start an export configuration for a selection, carrying the allowlist
    /// and knobs from this config
    ///
    /// the configured default rules are appended to every selected root.
    pub fn export_builder(&self, selection: ContentSelection) -> Result<ExportConfigBuilder> {
        let rules = self.default_rules()?;
        let selected: Vec<String> = selection.paths().map(str::to_string).collect();

        let mut builder = ExportConfig::builder(selection)
            .allowed_roots(self.package_roots.iter().cloned())
            .follow_references(self.follow_references)
            .binary_threshold(self.binary_threshold);

        if !rules.is_empty() {
            for root in selected {
                builder = builder.filter_override(root, rules.clone());
            }
        }
        Ok(builder)
    }

    pub fn import_settings(&self) -> &ImportSettings {
        &self.import
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ImportMode;

    #[test]
    fn test_config_toml_roundtrip() {
        let config = SerializerConfig {
            package_roots: vec!["/libs".to_string(), "/apps".to_string()],
            node_filters: vec!["-/libs/private".to_string()],
            property_filters: vec!["-/libs/*/secret".to_string()],
            follow_references: true,
            binary_threshold: 4096,
            import: ImportSettings::default(),
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: SerializerConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: SerializerConfig = toml::from_str("").unwrap();
        assert!(config.package_roots.is_empty());
        assert_eq!(config.binary_threshold, DEFAULT_BINARY_THRESHOLD);
        assert_eq!(config.import.mode, ImportMode::Replace);
    }

    #[test]
    fn test_default_rules_prefix_property_filters() {
        let config = SerializerConfig {
            node_filters: vec!["-/a".to_string()],
            property_filters: vec!["-/a/b".to_string()],
            ..SerializerConfig::default()
        };
        let rules = config.default_rules().unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].to_rule_string(), "-/a");
        assert_eq!(rules[1].to_rule_string(), "prop:-/a/b");
    }

    #[test]
    fn test_export_builder_applies_allowlist_and_rules() {
        let config = SerializerConfig {
            package_roots: vec!["/libs".to_string()],
            node_filters: vec!["-/libs/private".to_string()],
            ..SerializerConfig::default()
        };

        let built = config
            .export_builder(ContentSelection::new().root("/libs"))
            .unwrap()
            .build()
            .unwrap();
        assert!(!built.filter().matches_node("/libs/private"));
        assert!(built.filter().matches_node("/libs/public"));

        // selection outside the allowlist is rejected at build time
        let result = config
            .export_builder(ContentSelection::new().root("/var"))
            .unwrap()
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("serializer.toml");

        let config = SerializerConfig {
            package_roots: vec!["/etc/packages".to_string()],
            ..SerializerConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = SerializerConfig::load(&path).unwrap();
        assert_eq!(config, loaded);
    }
}
