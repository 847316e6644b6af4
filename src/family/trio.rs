use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// A trio as configured, by sample name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrioDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mother: Option<String>,
    pub child: String,
}

impl TrioDefinition {
    #[must_use]
    pub fn new(father: Option<&str>, mother: Option<&str>, child: &str) -> Self {
        Self {
            father: father.map(str::to_string),
            mother: mother.map(str::to_string),
            child: child.to_string(),
        }
    }
}

/// A resolved trio
///
/// A parent that is not genotyped in the study is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trio {
    pub father: Option<u32>,
    pub mother: Option<u32>,
    pub child: u32,
    /// A parent is not covered by the same files as the child, so a parent
    /// without a call cannot be assumed homozygous reference
    pub has_unknown_parent_genotypes: bool,
}

impl Trio {
    #[must_use]
    pub fn new(father: Option<u32>, mother: Option<u32>, child: u32) -> Self {
        Self {
            father,
            mother,
            child,
            has_unknown_parent_genotypes: false,
        }
    }

    #[must_use]
    pub fn with_unknown_parent_genotypes(mut self, unknown: bool) -> Self {
        self.has_unknown_parent_genotypes = unknown;
        self
    }
}

/// Sample names, ids and the files covering each sample
#[derive(Debug, Clone, Default)]
pub struct SampleRegistry {
    ids: HashMap<String, u32>,
    files: HashMap<u32, BTreeSet<u32>>,
}

impl SampleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a sample and the files it was sequenced in
    pub fn register(&mut self, name: impl Into<String>, id: u32, files: &[u32]) {
        self.ids.insert(name.into(), id);
        self.files.insert(id, files.iter().copied().collect());
    }

    #[must_use]
    pub fn id(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    #[must_use]
    pub fn files(&self, id: u32) -> Option<&BTreeSet<u32>> {
        self.files.get(&id)
    }

    fn resolve_name(&self, name: &str) -> Result<u32> {
        self.id(name)
            .ok_or_else(|| ConfigError::UnknownSample(name.to_string()).into())
    }

    /// Resolves the sample names of a trio
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownSample`] if any named member is not registered.
    pub fn resolve(&self, definition: &TrioDefinition) -> Result<Trio> {
        let child = self.resolve_name(&definition.child)?;
        let father = definition
            .father
            .as_deref()
            .map(|name| self.resolve_name(name))
            .transpose()?;
        let mother = definition
            .mother
            .as_deref()
            .map(|name| self.resolve_name(name))
            .transpose()?;

        let child_files = self.files(child);
        let has_unknown_parent_genotypes = [father, mother]
            .into_iter()
            .flatten()
            .any(|parent| self.files(parent) != child_files);

        Ok(Trio {
            father,
            mother,
            child,
            has_unknown_parent_genotypes,
        })
    }
}
