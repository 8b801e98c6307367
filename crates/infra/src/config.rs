//! Authorization configuration: precedence policy and seed rules.
//!
//! Seed rules may be declared as a list:
//!
//! ```json
//! { "rules": [ { "spec": "model.read", "role": "reader", "positive": true } ] }
//! ```
//!
//! or keyed by specifier, one declaration or several per key:
//!
//! ```json
//! { "rules": { "model.read": [ { "role": "reader", "positive": true } ] } }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use warden_auth::{Precedence, PrincipalId, Role, RuleDraft};

/// Environment variable overriding [`AuthConfig::prioritise_positive_rules`].
pub const PRIORITISE_POSITIVE_RULES_ENV: &str = "WARDEN_PRIORITISE_POSITIVE_RULES";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value '{value}' for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

/// A seed declaration that cannot become a rule draft.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeedError {
    #[error("seed rule #{index} has no spec")]
    MissingSpec { index: usize },
    #[error("seed rule for '{spec}' has no `positive` flag")]
    MissingPolarity { spec: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// Positive matches win over negative ones at the deciding node.
    #[serde(default)]
    pub prioritise_positive_rules: bool,
    #[serde(default)]
    pub rules: SeedRules,
}

impl AuthConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|var| std::env::var(var).ok())
    }

    /// Apply overrides from `lookup` (an environment stand-in).
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(PRIORITISE_POSITIVE_RULES_ENV) {
            self.prioritise_positive_rules = parse_flag(&value).ok_or(ConfigError::InvalidEnv {
                var: PRIORITISE_POSITIVE_RULES_ENV,
                value,
            })?;
        }
        Ok(self)
    }

    pub fn with_prioritise_positive_rules(mut self, prioritise: bool) -> Self {
        self.prioritise_positive_rules = prioritise;
        self
    }

    pub fn with_rules(mut self, rules: SeedRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn precedence(&self) -> Precedence {
        Precedence::from_prioritise_positive(self.prioritise_positive_rules)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// One seed rule declaration. Every field is optional at parse time so a
/// single malformed entry is skipped rather than failing the whole file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<PrincipalId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub propagates: Option<bool>,
}

impl SeedRule {
    fn into_draft(self, spec: String) -> Result<RuleDraft, SeedError> {
        let positive = self.positive.ok_or(SeedError::MissingPolarity { spec: spec.clone() })?;
        Ok(RuleDraft {
            specifier_id: None,
            specifier: Some(spec),
            role: self.role,
            principal_id: self.principal_id,
            positive,
            propagates: self.propagates,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeedEntry {
    One(SeedRule),
    Many(Vec<SeedRule>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeedRules {
    List(Vec<SeedRule>),
    BySpec(SpecEntries),
}

/// Keyed seed declarations in document order. Keys may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecEntries(pub Vec<(String, SeedEntry)>);

impl SpecEntries {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for SpecEntries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (spec, entry) in &self.0 {
            map.serialize_entry(spec, entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SpecEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = SpecEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from specifier to seed rules")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry()? {
                    entries.push(entry);
                }
                Ok(SpecEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

impl Default for SeedRules {
    fn default() -> Self {
        SeedRules::List(Vec::new())
    }
}

impl SeedRules {
    pub fn is_empty(&self) -> bool {
        match self {
            SeedRules::List(rules) => rules.is_empty(),
            SeedRules::BySpec(entries) => entries.is_empty(),
        }
    }

    /// Flatten declarations into rule drafts, in declaration order. A
    /// declaration under a key takes the key as its spec.
    pub fn normalize(&self) -> Vec<Result<RuleDraft, SeedError>> {
        match self {
            SeedRules::List(rules) => rules
                .iter()
                .enumerate()
                .map(|(index, rule)| {
                    let spec = rule.spec.clone().ok_or(SeedError::MissingSpec { index })?;
                    rule.clone().into_draft(spec)
                })
                .collect(),
            SeedRules::BySpec(entries) => entries
                .0
                .iter()
                .flat_map(|(spec, entry)| {
                    let rules = match entry {
                        SeedEntry::One(rule) => std::slice::from_ref(rule),
                        SeedEntry::Many(rules) => rules.as_slice(),
                    };
                    rules.iter().map(move |rule| rule.clone().into_draft(spec.clone()))
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn parses_list_form() {
        let config = AuthConfig::from_json_str(
            r#"{
                "prioritisePositiveRules": true,
                "rules": [
                    { "spec": "model.read", "role": "reader", "positive": true },
                    { "spec": "model", "role": "guest", "positive": false, "propagates": true }
                ]
            }"#,
        )
        .unwrap();

        assert!(config.prioritise_positive_rules);
        assert_eq!(config.precedence(), Precedence::PositiveFirst);

        let drafts: Vec<_> = config.rules.normalize().into_iter().map(Result::unwrap).collect();
        assert_eq!(
            drafts,
            vec![
                RuleDraft::for_spec("model.read", true).with_role("reader"),
                RuleDraft::for_spec("model", false)
                    .with_role("guest")
                    .with_propagates(true),
            ]
        );
    }

    #[test]
    fn parses_keyed_form_with_single_and_multiple_entries() {
        let config = AuthConfig::from_json_str(
            r#"{
                "rules": {
                    "model.write": { "role": "editor", "positive": true },
                    "model.read": [
                        { "role": "reader", "positive": true },
                        { "role": "guest", "positive": false }
                    ]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.precedence(), Precedence::NegativeFirst);
        let drafts: Vec<_> = config.rules.normalize().into_iter().map(Result::unwrap).collect();
        assert_eq!(
            drafts,
            vec![
                RuleDraft::for_spec("model.write", true).with_role("editor"),
                RuleDraft::for_spec("model.read", true).with_role("reader"),
                RuleDraft::for_spec("model.read", false).with_role("guest"),
            ]
        );
    }

    #[test]
    fn keyed_form_keeps_document_order_and_round_trips() {
        let json = r#"{
            "rules": {
                "zeta": { "role": "a", "positive": true },
                "alpha": { "role": "b", "positive": false },
                "mid": [{ "role": "c", "positive": true }]
            }
        }"#;
        let config = AuthConfig::from_json_str(json).unwrap();

        let specs: Vec<_> = config
            .rules
            .normalize()
            .into_iter()
            .map(|draft| draft.unwrap().specifier.unwrap())
            .collect();
        assert_eq!(specs, ["zeta", "alpha", "mid"]);

        let encoded = serde_json::to_string(&config).unwrap();
        assert_eq!(AuthConfig::from_json_str(&encoded).unwrap(), config);
    }

    #[test]
    fn malformed_declarations_are_reported_individually() {
        let config = AuthConfig::from_json_str(
            r#"{ "rules": [
                { "role": "reader", "positive": true },
                { "spec": "a", "role": "reader" },
                { "spec": "b", "role": "reader", "positive": true }
            ] }"#,
        )
        .unwrap();

        let normalized = config.rules.normalize();
        assert_eq!(normalized[0], Err(SeedError::MissingSpec { index: 0 }));
        assert_eq!(
            normalized[1],
            Err(SeedError::MissingPolarity { spec: "a".to_string() })
        );
        assert!(normalized[2].is_ok());
    }

    #[test]
    fn empty_config_has_defaults() {
        let config = AuthConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AuthConfig::default());
        assert!(config.rules.is_empty());
    }

    #[test]
    fn env_override_flips_precedence() {
        let config = AuthConfig::default()
            .with_overrides_from(|var| (var == PRIORITISE_POSITIVE_RULES_ENV).then(|| "true".to_string()))
            .unwrap();
        assert!(config.prioritise_positive_rules);

        let err = AuthConfig::default()
            .with_overrides_from(|_| Some("maybe".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "rules": [ {{ "spec": "a.b", "role": "user", "positive": false }} ] }}"#
        )
        .unwrap();

        let config = AuthConfig::from_path(file.path()).unwrap();
        assert_eq!(config.rules.normalize().len(), 1);

        let missing = AuthConfig::from_path(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
