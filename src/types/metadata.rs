use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Extracted metadata for one changeset revision.
///
/// Sections are optional and their *presence*, not their emptiness, drives
/// the `includes_*` install flags, so absent and empty sections stay
/// distinct across storage round trips.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataBlob {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_dependencies: Option<ToolDependencyMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_dependencies: Option<DeclaredRepositoryDependencies>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl MetadataBlob {
    #[must_use]
    pub fn includes_tools(&self) -> bool {
        self.tools.is_some()
    }

    #[must_use]
    pub fn includes_tool_dependencies(&self) -> bool {
        self.tool_dependencies.is_some()
    }

    #[must_use]
    pub fn declared_repository_dependencies(&self) -> &[RepositoryDependencyEntry] {
        self.repository_dependencies
            .as_ref()
            .map(|section| section.repository_dependencies.as_slice())
            .unwrap_or(&[])
    }
}

/// The `repository_dependencies` section of a metadata snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclaredRepositoryDependencies {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub repository_dependencies: Vec<RepositoryDependencyEntry>,
}

/// One declared dependency edge. The target repository lives on `tool_shed`
/// and is pinned to `changeset_revision`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepositoryDependencyEntry {
    pub tool_shed: String,
    pub name: String,
    pub owner: String,
    pub changeset_revision: String,
    #[serde(default)]
    pub prior_installation_required: bool,
    #[serde(default)]
    pub only_if_compiling_contained_td: bool,
}

pub type ToolDependencyMap = BTreeMap<String, ToolDependencyDef>;

/// A value in the `tool_dependencies` section. Most keys map to a single
/// requirement; the `set_environment` key collects a list of them. Distinct
/// records under that key are appended by the metadata service, never
/// merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolDependencyDef {
    Requirement(ToolDependencyRequirement),
    SetEnvironment(Vec<ToolDependencyRequirement>),
}

impl ToolDependencyDef {
    /// Stamp provenance onto every requirement held by this definition.
    pub fn stamp(
        &mut self,
        repository_name: &str,
        repository_owner: &str,
        changeset_revision: &str,
    ) {
        match self {
            ToolDependencyDef::Requirement(req) => {
                req.stamp(repository_name, repository_owner, changeset_revision);
            }
            ToolDependencyDef::SetEnvironment(reqs) => {
                for req in reqs {
                    req.stamp(repository_name, repository_owner, changeset_revision);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolDependencyKind {
    Package,
    SetEnvironment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDependencyRequirement {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "type")]
    pub kind: ToolDependencyKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changeset_revision: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ToolDependencyRequirement {
    /// Record which repository and changeset revision this requirement was
    /// aggregated from. Restamping overwrites the same three fields, so the
    /// operation is idempotent.
    pub fn stamp(
        &mut self,
        repository_name: &str,
        repository_owner: &str,
        changeset_revision: &str,
    ) {
        self.repository_name = Some(repository_name.to_string());
        self.repository_owner = Some(repository_owner.to_string());
        self.changeset_revision = Some(changeset_revision.to_string());
    }
}

/// Stamp provenance onto every definition in a tool-dependency map.
pub fn stamp_tool_dependencies(
    map: &mut ToolDependencyMap,
    repository_name: &str,
    repository_owner: &str,
    changeset_revision: &str,
) {
    for def in map.values_mut() {
        def.stamp(repository_name, repository_owner, changeset_revision);
    }
}
