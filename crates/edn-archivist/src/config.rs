use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{ArchivistError, ArchivistResult};

/// Configuration for the [`Archivist`](crate::Archivist).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchivistConfig {
    /// Deepest contained-child nesting the clone protocol will copy.
    pub max_clone_depth: usize,
    /// Comment stamped when the caller supplies none.
    pub default_comment: String,
}

impl Default for ArchivistConfig {
    fn default() -> Self {
        Self {
            max_clone_depth: 64,
            default_comment: String::new(),
        }
    }
}

impl ArchivistConfig {
    /// A tighter configuration for hosts that archive untrusted object graphs.
    pub fn strict() -> Self {
        Self {
            max_clone_depth: 16,
            ..Default::default()
        }
    }

    /// Parse from TOML. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> ArchivistResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| ArchivistError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ArchivistResult<()> {
        if self.max_clone_depth == 0 {
            return Err(ArchivistError::Config(
                "max_clone_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the [`StandardModifier`](crate::StandardModifier).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModifierConfig {
    /// Attribute names stored by reference instead of inside the clone.
    pub referenced_attributes: BTreeSet<String>,
    /// Attribute names dropped from every clone.
    pub volatile_attributes: BTreeSet<String>,
    /// Object types whose contained instances are stored as references to
    /// their own histories rather than copied into the parent's clone.
    pub reference_types: BTreeSet<String>,
}

impl ModifierConfig {
    pub fn from_toml_str(source: &str) -> ArchivistResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| ArchivistError::Config(e.to_string()))?;
        if let Some(name) = config
            .referenced_attributes
            .intersection(&config.volatile_attributes)
            .next()
        {
            return Err(ArchivistError::Config(format!(
                "attribute '{name}' cannot be both referenced and volatile"
            )));
        }
        Ok(config)
    }

    pub fn with_referenced<S: Into<String>>(mut self, name: S) -> Self {
        self.referenced_attributes.insert(name.into());
        self
    }

    pub fn with_volatile<S: Into<String>>(mut self, name: S) -> Self {
        self.volatile_attributes.insert(name.into());
        self
    }

    pub fn with_reference_type<S: Into<String>>(mut self, object_type: S) -> Self {
        self.reference_types.insert(object_type.into());
        self
    }
}
