use crate::{error::RelsyncError, properties::Predicate};
use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};

pub const DEFAULT_PREDICATE: &str =
    "http://doms.statsbiblioteket.dk/relations/default/0/1/#isPartOfNewspaper";
pub const DEFAULT_CONFIG_FILE: &str = "relsync.toml";

/// The relation being reconciled and the comments recorded with every repository change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationConfig {
    pub predicate: Predicate,
    pub uri_prefix: String,
    pub link_comment: String,
    pub unlink_comment: String,
    pub unpublish_comment: String,
    pub republish_comment: String,
}

impl Default for RelationConfig {
    fn default() -> Self {
        RelationConfig {
            predicate: Predicate::from(DEFAULT_PREDICATE),
            uri_prefix: crate::properties::DEFAULT_URI_PREFIX.to_string(),
            link_comment: "linking to".to_string(),
            unlink_comment: "unlinking from".to_string(),
            unpublish_comment: "Relation maintainer sets this object inactive to update relations"
                .to_string(),
            republish_comment:
                "Relation maintainer sets this object active after updating relations".to_string(),
        }
    }
}

impl RelationConfig {
    pub fn with_predicate<P: Into<Predicate>>(predicate: P) -> Self {
        RelationConfig {
            predicate: predicate.into(),
            ..Default::default()
        }
    }
}

/// Where the matching rule lives in a parent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub datastream: String,
    pub identifier_type: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        MetadataConfig {
            datastream: "MODS".to_string(),
            identifier_type: "title_family".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: PathBuf::from("relsync.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintainerConfig {
    /// Number of parent records reconciled at the same time.
    pub concurrency: usize,
    pub relation: RelationConfig,
    pub metadata: MetadataConfig,
    pub database: DatabaseConfig,
}

impl Default for MaintainerConfig {
    fn default() -> Self {
        MaintainerConfig {
            concurrency: 4,
            relation: RelationConfig::default(),
            metadata: MetadataConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl MaintainerConfig {
    pub fn validate(&self) -> Result<(), RelsyncError> {
        if self.relation.predicate.as_str().trim().is_empty() {
            return Err(RelsyncError::Config(
                "relation.predicate must not be empty".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(RelsyncError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.metadata.datastream.trim().is_empty() {
            return Err(RelsyncError::Config(
                "metadata.datastream must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read a [MaintainerConfig] from a TOML file. A missing file yields the defaults.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<MaintainerConfig, RelsyncError> {
    let path = path.as_ref();
    tracing::debug!("Attempting to read config from: {:?}", path);
    if !path.exists() {
        tracing::debug!("Config file not found, using defaults.");
        return Ok(MaintainerConfig::default());
    }
    let content = read_to_string(path)?;
    let config: MaintainerConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

pub fn write_config<P: AsRef<Path>>(path: P, config: &MaintainerConfig) -> Result<(), RelsyncError> {
    tracing::debug!("Attempting to write config to: {:?}", path.as_ref());
    let toml_string = toml::to_string(config)?;
    write(path, toml_string)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use test_log::test;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_config(temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, MaintainerConfig::default());
        assert_eq!(config.relation.predicate.as_str(), DEFAULT_PREDICATE);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(
            &path,
            r#"
concurrency = 2

[relation]
predicate = "info:relations#isPartOf"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.relation.predicate, Predicate::from("info:relations#isPartOf"));
        assert_eq!(config.relation.uri_prefix, "info:fedora/");
        assert_eq!(config.metadata, MetadataConfig::default());
    }

    #[test]
    fn test_write_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_CONFIG_FILE);
        let mut config = MaintainerConfig::default();
        config.database.path = temp_dir.path().join("repo.db");
        write_config(&path, &config).unwrap();
        assert_eq!(load_config(&path).unwrap(), config);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "concurrency = 0\n").unwrap();
        assert!(matches!(load_config(&path), Err(RelsyncError::Config(_))));
    }
}
