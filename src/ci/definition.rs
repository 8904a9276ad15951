//! Pipeline definitions in Travis-style YAML

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DatastoreError, Result};

/// Ordered step groups of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    BeforeInstall,
    Install,
    BeforeScript,
    Script,
}

impl Stage {
    pub const ORDER: [Stage; 4] = [Stage::BeforeInstall, Stage::Install, Stage::BeforeScript, Stage::Script];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::BeforeInstall => "before_install",
            Stage::Install => "install",
            Stage::BeforeScript => "before_script",
            Stage::Script => "script",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Travis accepts either a single command or a list for every step group
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(step)) => vec![step],
        Some(OneOrMany::Many(steps)) => steps,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Addons {
    pub postgresql: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PipelineDefinition {
    #[serde(default)]
    pub language: Option<String>,
    /// Runtime versions, one pipeline run each
    #[serde(rename = "python", deserialize_with = "one_or_many")]
    pub versions: Vec<String>,
    #[serde(default)]
    pub addons: Addons,
    #[serde(default, deserialize_with = "one_or_many")]
    pub services: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub before_install: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub install: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub before_script: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub script: Vec<String>,
}

impl PipelineDefinition {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let definition: PipelineDefinition = serde_yaml::from_str(yaml)
            .map_err(|e| DatastoreError::Pipeline(format!("invalid pipeline definition: {e}")))?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| DatastoreError::io(path, e))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        if self.versions.is_empty() {
            return Err(DatastoreError::Pipeline("no runtime versions declared".to_string()));
        }
        if self.script.is_empty() {
            return Err(DatastoreError::Pipeline("script must contain at least one step".to_string()));
        }
        Ok(())
    }

    pub fn steps(&self, stage: Stage) -> &[String] {
        match stage {
            Stage::BeforeInstall => &self.before_install,
            Stage::Install => &self.install,
            Stage::BeforeScript => &self.before_script,
            Stage::Script => &self.script,
        }
    }

    /// Step groups in execution order
    pub fn stages(&self) -> Vec<(Stage, &[String])> {
        Stage::ORDER.iter().map(|stage| (*stage, self.steps(*stage))).collect()
    }

    /// Databases created by `create database <name>` in `before_script`
    pub fn databases_created(&self) -> Vec<String> {
        self.before_script
            .iter()
            .filter_map(|step| {
                let lower = step.to_ascii_lowercase();
                let at = lower.find("create database")?;
                let rest = &step[at + "create database".len()..];
                let name: String = rest
                    .trim_start()
                    .chars()
                    .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                    .collect();
                (!name.is_empty()).then_some(name)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHIPPED: &str = include_str!("../../ci/travis.yml");

    #[test]
    fn test_shipped_pipeline() {
        let definition = PipelineDefinition::from_yaml_str(SHIPPED).unwrap();
        assert_eq!(definition.versions, vec!["2.7", "3.4", "3.5"]);
        assert_eq!(definition.addons.postgresql.as_deref(), Some("9.4"));
        assert_eq!(definition.services, vec!["postgresql"]);
        assert!(definition.install.last().unwrap().starts_with("cargo fetch"));
        assert_eq!(definition.before_script.len(), 1);
        assert_eq!(definition.script.len(), 1);
        assert_eq!(definition.databases_created(), vec!["travis_ci_test"]);
    }

    #[test]
    fn test_stages_in_order() {
        let definition = PipelineDefinition::from_yaml_str(SHIPPED).unwrap();
        let names: Vec<&str> = definition.stages().iter().map(|(stage, _)| stage.name()).collect();
        assert_eq!(names, vec!["before_install", "install", "before_script", "script"]);
    }

    #[test]
    fn test_requires_script() {
        let err = PipelineDefinition::from_yaml_str("python: \"3.5\"\ninstall: make\n").unwrap_err();
        assert!(err.to_string().contains("script"));

        let err = PipelineDefinition::from_yaml_str("python: []\nscript: make test\n").unwrap_err();
        assert!(err.to_string().contains("versions"));
    }
}
