use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::config::ShedConfig;
use crate::error::Result;
use crate::store::Store;
use crate::types::{
    Repository, RepositoryDependencyEntry, RepositoryMetadata, ToolDependencyMap, User,
    stamp_tool_dependencies,
};
use crate::vcs;

use super::{clone_url, require_owner, require_repository};

/// Resolves the metadata snapshot for a changeset revision.
///
/// When the exact revision has no metadata (it was superseded, typically by
/// a dependency-definition-only commit), the next downloadable revision
/// strictly after it is tried instead. `None` means the caller must treat
/// every metadata-derived flag as false.
pub fn resolve_metadata(
    store: &dyn Store,
    config: &ShedConfig,
    repository: &Repository,
    changeset_revision: &str,
) -> Result<Option<RepositoryMetadata>> {
    if let Some(metadata) = store.get_repository_metadata(repository.id, changeset_revision)? {
        return Ok(Some(metadata));
    }
    let Some(next) = next_downloadable_revision(store, config, repository, changeset_revision)?
    else {
        return Ok(None);
    };
    if next == changeset_revision {
        return Ok(None);
    }
    store.get_repository_metadata(repository.id, &next)
}

/// Returns the first downloadable changeset revision strictly after the
/// given one in the repository's history, if any.
///
/// Downloadable revisions no longer present in the history are skipped with
/// a warning; a revision unknown to the history has no successor.
pub fn next_downloadable_revision(
    store: &dyn Store,
    config: &ShedConfig,
    repository: &Repository,
    after: &str,
) -> Result<Option<String>> {
    let repo = vcs::open_repository(&config.repository_path(repository.id))?;
    let changesets = vcs::list_changesets(&repo)?;
    let downloadable: HashSet<String> = store
        .list_downloadable_revisions(repository.id)?
        .into_iter()
        .collect();

    for revision in &downloadable {
        if !changesets.contains(revision) {
            tracing::warn!(
                "Downloadable revision {revision} of repository {} is not in its history",
                repository.name
            );
        }
    }

    let Ok(after_oid) = vcs::resolve_changeset(&repo, after) else {
        return Ok(None);
    };
    let after_full = after_oid.to_string();
    let Some(position) = changesets.iter().position(|c| *c == after_full) else {
        return Ok(None);
    };

    Ok(changesets[position + 1..]
        .iter()
        .find(|c| downloadable.contains(*c))
        .cloned())
}

/// The transitive closure of a repository's declared dependencies, flattened
/// and deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpandedRepositoryDependencies {
    pub description: Option<String>,
    pub entries: Vec<RepositoryDependencyEntry>,
}

/// Expands declared repository dependencies transitively.
///
/// Dependencies hosted on this shed are followed breadth-first; a visited
/// set keeps cycles and repeated declarations from producing duplicate
/// entries. Dependencies on other sheds are recorded but not followed, and
/// declarations that do not resolve here are logged and dropped rather than
/// failing the expansion.
pub struct RelationBuilder<'a> {
    store: &'a dyn Store,
    config: &'a ShedConfig,
}

impl<'a> RelationBuilder<'a> {
    pub fn new(store: &'a dyn Store, config: &'a ShedConfig) -> Self {
        Self { store, config }
    }

    pub fn expand(
        &self,
        repository: &Repository,
        metadata: &RepositoryMetadata,
    ) -> Result<ExpandedRepositoryDependencies> {
        let owner = require_owner(self.store, repository)?;
        let description = metadata
            .metadata
            .repository_dependencies
            .as_ref()
            .and_then(|section| section.description.clone());

        let mut expanded = ExpandedRepositoryDependencies {
            description,
            entries: Vec::new(),
        };

        let mut visited: HashSet<(String, String, String)> = HashSet::new();
        visited.insert((
            repository.name.clone(),
            owner.username.clone(),
            metadata.changeset_revision.clone(),
        ));

        let mut queue: VecDeque<RepositoryDependencyEntry> = metadata
            .metadata
            .declared_repository_dependencies()
            .iter()
            .cloned()
            .collect();

        while let Some(entry) = queue.pop_front() {
            let key = (
                entry.name.clone(),
                entry.owner.clone(),
                entry.changeset_revision.clone(),
            );
            if !visited.insert(key) {
                continue;
            }
            if self.is_same_shed(&entry.tool_shed) {
                queue.extend(self.declared_dependencies_of(&entry)?);
            }
            expanded.entries.push(entry);
        }

        Ok(expanded)
    }

    fn is_same_shed(&self, tool_shed: &str) -> bool {
        normalize_shed(&self.config.base_url) == normalize_shed(tool_shed)
    }

    fn declared_dependencies_of(
        &self,
        entry: &RepositoryDependencyEntry,
    ) -> Result<Vec<RepositoryDependencyEntry>> {
        let Some(repository) = self
            .store
            .get_repository_by_name_and_owner(&entry.name, &entry.owner)?
        else {
            tracing::warn!(
                "Dependency repository {}/{} not found in this shed",
                entry.owner,
                entry.name
            );
            return Ok(Vec::new());
        };
        let Some(metadata) = resolve_metadata(
            self.store,
            self.config,
            &repository,
            &entry.changeset_revision,
        )?
        else {
            tracing::warn!(
                "No installable metadata for dependency {}/{} at {}",
                entry.owner,
                entry.name,
                entry.changeset_revision
            );
            return Ok(Vec::new());
        };
        Ok(metadata.metadata.declared_repository_dependencies().to_vec())
    }
}

fn normalize_shed(url: &str) -> &str {
    let url = url.split_once("://").map_or(url, |(_, rest)| rest);
    url.trim_end_matches('/')
}

/// Where the aggregator's dependency data comes from: derived from a
/// resolved metadata snapshot (registry side), or supplied by a client that
/// fetched it earlier and is reinstalling without contacting the registry.
pub enum DependencySource<'a> {
    Metadata(Option<&'a RepositoryMetadata>),
    Supplied {
        repository_dependencies: Option<&'a ExpandedRepositoryDependencies>,
        tool_dependencies: Option<&'a ToolDependencyMap>,
    },
}

/// Everything an installer needs for one repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub description: Option<String>,
    pub clone_url: String,
    /// The revision the installer asked for, even when metadata resolution
    /// fell forward to a later one.
    pub changeset_revision: String,
    pub ctx_rev: u64,
    pub owner: String,
    pub repository_dependencies: Option<ExpandedRepositoryDependencies>,
    pub tool_dependencies: Option<ToolDependencyMap>,
}

/// Install manifest, keyed by repository name.
pub type InstallManifest = BTreeMap<String, RepoInfo>;

/// Builds the install record for one repository. Tool dependency
/// requirements are stamped with the repository's name, owner, and
/// changeset revision so installers can report provenance after manifests
/// from several repositories are combined; stamping is idempotent.
pub fn create_repo_info(
    store: &dyn Store,
    config: &ShedConfig,
    repository: &Repository,
    owner: &str,
    repository_clone_url: &str,
    changeset_revision: &str,
    ctx_rev: u64,
    source: DependencySource<'_>,
) -> Result<RepoInfo> {
    let (repository_dependencies, tool_dependencies) = match source {
        DependencySource::Metadata(Some(metadata)) => {
            let expanded = RelationBuilder::new(store, config).expand(repository, metadata)?;
            let has_content = expanded.description.is_some() || !expanded.entries.is_empty();
            (
                has_content.then_some(expanded),
                metadata.metadata.tool_dependencies.clone(),
            )
        }
        DependencySource::Metadata(None) => (None, None),
        DependencySource::Supplied {
            repository_dependencies,
            tool_dependencies,
        } => (
            repository_dependencies.cloned(),
            tool_dependencies.cloned(),
        ),
    };

    let tool_dependencies = tool_dependencies.map(|mut map| {
        stamp_tool_dependencies(&mut map, &repository.name, owner, changeset_revision);
        map
    });

    Ok(RepoInfo {
        description: repository.description.clone(),
        clone_url: repository_clone_url.to_string(),
        changeset_revision: changeset_revision.to_string(),
        ctx_rev,
        owner: owner.to_string(),
        repository_dependencies,
        tool_dependencies,
    })
}

/// The response to an install query: the manifest plus the flags derived
/// from the resolved metadata snapshot.
#[derive(Debug, Serialize)]
pub struct InstallInfo {
    pub includes_tools: bool,
    pub includes_tool_dependencies: bool,
    pub includes_tools_for_display_in_tool_panel: bool,
    pub has_repository_dependencies: bool,
    pub has_repository_dependencies_only_if_compiling_contained_td: bool,
    pub manifest: InstallManifest,
}

/// Collects everything a client instance needs to install a repository at a
/// changeset revision.
///
/// Metadata resolution may fall forward to a later downloadable revision;
/// the derived flags then reflect that revision's metadata, while the
/// manifest keeps the requested revision. Without any resolvable metadata
/// every flag reads false and the manifest carries no dependency data.
pub fn install_info(
    store: &dyn Store,
    config: &ShedConfig,
    requesting_user: Option<&User>,
    repository_id: i64,
    changeset_revision: &str,
) -> Result<InstallInfo> {
    let repository = require_repository(store, repository_id)?;
    let owner = require_owner(store, &repository)?;
    let repository_clone_url = clone_url(
        config,
        requesting_user.map(|user| user.username.as_str()),
        &owner.username,
        &repository.name,
    );

    let metadata = resolve_metadata(store, config, &repository, changeset_revision)?;

    let (
        includes_tools,
        includes_tool_dependencies,
        includes_tools_for_display_in_tool_panel,
        has_repository_dependencies,
        has_repository_dependencies_only_if_compiling_contained_td,
    ) = match &metadata {
        Some(metadata) => {
            let (direct, compiling_only) =
                repository_dependency_types(metadata.metadata.declared_repository_dependencies());
            (
                metadata.metadata.includes_tools(),
                metadata.metadata.includes_tool_dependencies(),
                metadata.includes_tools_for_display_in_tool_panel,
                direct,
                compiling_only,
            )
        }
        None => (false, false, false, false, false),
    };

    let repo = vcs::open_repository(&config.repository_path(repository.id))?;
    let ctx_rev = vcs::changeset_rev(&repo, changeset_revision)?;

    let repo_info = create_repo_info(
        store,
        config,
        &repository,
        &owner.username,
        &repository_clone_url,
        changeset_revision,
        ctx_rev,
        DependencySource::Metadata(metadata.as_ref()),
    )?;

    let mut manifest = InstallManifest::new();
    manifest.insert(repository.name.clone(), repo_info);

    Ok(InstallInfo {
        includes_tools,
        includes_tool_dependencies,
        includes_tools_for_display_in_tool_panel,
        has_repository_dependencies,
        has_repository_dependencies_only_if_compiling_contained_td,
        manifest,
    })
}

/// Splits declared dependencies into the two flag dimensions: any direct
/// dependency, and any needed only when compiling contained tool
/// dependencies.
#[must_use]
pub fn repository_dependency_types(entries: &[RepositoryDependencyEntry]) -> (bool, bool) {
    let has_direct = entries
        .iter()
        .any(|entry| !entry.only_if_compiling_contained_td);
    let has_compiling_only = entries
        .iter()
        .any(|entry| entry.only_if_compiling_contained_td);
    (has_direct, has_compiling_only)
}
