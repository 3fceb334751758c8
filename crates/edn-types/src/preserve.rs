use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Which parts of the current working state survive a retrieval.
///
/// When an old version is retrieved, the attribute hooks report back the
/// values listed here from the *working* object so the caller can keep them
/// instead of overwriting them with history.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreserveSpec {
    /// Take everything from history.
    #[default]
    Nothing,
    /// Keep the named top-level attributes of the working object.
    Attributes(BTreeSet<String>),
    /// Keep every attribute the hooks store by reference.
    Referenced,
}

impl PreserveSpec {
    /// Preserve the given attribute names.
    pub fn attributes<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Attributes(names.into_iter().map(Into::into).collect())
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, Self::Nothing)
    }
}
