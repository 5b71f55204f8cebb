//! Query construction settings, optionally loaded from TOML.
//!
//! ```toml
//! group_prefix = "varg"
//! projection_prefix = "varp"
//!
//! [templates]
//! matches = "{0}.like({1})"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::query::ast::Operator;
use crate::query::constants::LabelScheme;
use crate::query::patterns::Patterns;

/// Default label prefix for grouping constants.
pub const DEFAULT_GROUP_PREFIX: &str = "varg";
/// Default label prefix for projection constants.
pub const DEFAULT_PROJECTION_PREFIX: &str = "varp";

/// Settings consulted while assembling queries.
#[derive(Clone, Debug)]
pub struct QueryConfig {
    patterns: Patterns,
    group_prefix: String,
    projection_prefix: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            patterns: Patterns::default(),
            group_prefix: DEFAULT_GROUP_PREFIX.to_owned(),
            projection_prefix: DEFAULT_PROJECTION_PREFIX.to_owned(),
        }
    }
}

impl QueryConfig {
    /// Reads and validates a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })?;
        raw.into_config()
    }

    /// Parses and validates TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(contents).map_err(|source| ConfigError::Parse { path: None, source })?;
        raw.into_config()
    }

    /// Operator table.
    pub fn patterns(&self) -> &Patterns {
        &self.patterns
    }

    /// Replaces the template of `op`.
    pub fn with_template(mut self, op: Operator, template: &str) -> Result<Self, ConfigError> {
        self.patterns
            .set_template(op, template)
            .map_err(|reason| ConfigError::InvalidTemplate {
                operator: op.name().to_owned(),
                reason,
            })?;
        Ok(self)
    }

    /// Replaces the grouping and projection label prefixes.
    pub fn with_prefixes(
        mut self,
        group: impl Into<String>,
        projection: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        self.group_prefix = group.into();
        self.projection_prefix = projection.into();
        self.validate()?;
        Ok(self)
    }

    /// Labels for filter constants.
    pub fn filter_labels(&self) -> LabelScheme {
        LabelScheme::Alphabetic
    }

    /// Labels for grouping constants.
    pub fn group_labels(&self) -> LabelScheme {
        LabelScheme::Prefixed(self.group_prefix.clone())
    }

    /// Labels for projection constants.
    pub fn projection_labels(&self) -> LabelScheme {
        LabelScheme::Prefixed(self.projection_prefix.clone())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for prefix in [&self.group_prefix, &self.projection_prefix] {
            let valid = prefix.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                && prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(ConfigError::Invalid(format!(
                    "label prefix '{prefix}' must be an identifier"
                )));
            }
        }
        if self.group_prefix == self.projection_prefix {
            return Err(ConfigError::Invalid(format!(
                "group and projection prefixes must differ (both '{}')",
                self.group_prefix
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    group_prefix: Option<String>,
    #[serde(default)]
    projection_prefix: Option<String>,
    #[serde(default)]
    templates: BTreeMap<String, String>,
}

impl RawConfig {
    fn into_config(self) -> Result<QueryConfig, ConfigError> {
        let mut config = QueryConfig::default();
        if let Some(prefix) = self.group_prefix {
            config.group_prefix = prefix;
        }
        if let Some(prefix) = self.projection_prefix {
            config.projection_prefix = prefix;
        }
        config.validate()?;
        for (name, template) in &self.templates {
            let op = Operator::from_name(name)
                .ok_or_else(|| ConfigError::UnknownOperator { name: name.clone() })?;
            config = config.with_template(op, template)?;
        }
        Ok(config)
    }
}

/// Failures loading or validating a [`QueryConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read query config {}: {source}", .path.display())]
    Read {
        /// File that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Config text is not valid TOML for this schema.
    #[error("failed to parse query config{}: {source}", display_path(.path))]
    Parse {
        /// File being parsed, when loaded from disk.
        path: Option<PathBuf>,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// Template override names an operator that does not exist.
    #[error("unknown operator '{name}' in templates")]
    UnknownOperator {
        /// Name as written in the config.
        name: String,
    },
    /// Template override does not parse or exceeds the operator's arity.
    #[error("invalid template for '{operator}': {reason}")]
    InvalidTemplate {
        /// Operator name.
        operator: String,
        /// Why the template was rejected.
        reason: String,
    },
    /// Settings are inconsistent.
    #[error("invalid query config: {0}")]
    Invalid(String),
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" {}", path.display()),
        None => String::new(),
    }
}
