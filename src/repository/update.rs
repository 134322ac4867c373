use crate::config::ShedConfig;
use crate::error::{Error, Result};
use crate::security;
use crate::store::Store;
use crate::types::{Repository, RepositoryType, User};
use crate::vcs::{self, PathRegistry};

use super::{
    admin_role_name, published_path_key, require_owner, require_repository,
    validate_repository_name,
};

/// A sparse set of candidate field changes. `None` means "leave the field
/// alone"; a supplied value is applied only when it differs from the current
/// one. A supplied category list fully replaces the existing associations,
/// so `Some(vec![])` clears them.
#[derive(Debug, Clone, Default)]
pub struct RepositoryUpdate {
    pub name: Option<String>,
    pub kind: Option<RepositoryType>,
    pub description: Option<String>,
    pub long_description: Option<String>,
    pub remote_repository_url: Option<String>,
    pub homepage_url: Option<String>,
    pub category_ids: Option<Vec<i64>>,
}

#[derive(Debug)]
pub enum UpdateOutcome {
    Updated(Repository),
    /// Nothing in the update differed from the current state.
    Unchanged(Repository),
}

impl UpdateOutcome {
    #[must_use]
    pub fn repository(&self) -> &Repository {
        match self {
            UpdateOutcome::Updated(repository) | UpdateOutcome::Unchanged(repository) => {
                repository
            }
        }
    }
}

/// Applies a sparse update to a repository.
///
/// The acting user must be a site administrator or hold the repository's
/// admin role. A name change is refused once the repository has been cloned,
/// is re-validated against the repository owner, and carries the admin role
/// rename, the published path rename, and the repository config rewrite with
/// it. Everything lands in a single transaction, so a rejected name change
/// leaves simultaneously submitted fields unpersisted.
pub fn update_repository(
    store: &dyn Store,
    registry: &dyn PathRegistry,
    config: &ShedConfig,
    acting_user: &User,
    repository_id: i64,
    update: &RepositoryUpdate,
) -> Result<UpdateOutcome> {
    let repository = require_repository(store, repository_id)?;
    security::ensure_can_administer(store, acting_user, &repository)?;

    let mut changed = repository.clone();
    let mut flush_needed = false;

    if let Some(kind) = update.kind {
        if kind != changed.kind {
            changed.kind = kind;
            flush_needed = true;
        }
    }
    if let Some(description) = &update.description {
        if changed.description.as_deref() != Some(description) {
            changed.description = Some(description.clone());
            flush_needed = true;
        }
    }
    if let Some(long_description) = &update.long_description {
        if changed.long_description.as_deref() != Some(long_description) {
            changed.long_description = Some(long_description.clone());
            flush_needed = true;
        }
    }
    if let Some(remote_repository_url) = &update.remote_repository_url {
        if changed.remote_repository_url.as_deref() != Some(remote_repository_url) {
            changed.remote_repository_url = Some(remote_repository_url.clone());
            flush_needed = true;
        }
    }
    if let Some(homepage_url) = &update.homepage_url {
        if changed.homepage_url.as_deref() != Some(homepage_url) {
            changed.homepage_url = Some(homepage_url.clone());
            flush_needed = true;
        }
    }

    let category_ids = match &update.category_ids {
        Some(ids) => {
            let mut resolved = Vec::with_capacity(ids.len());
            for category_id in ids {
                match store.get_category(*category_id)? {
                    Some(category) => resolved.push(category.id),
                    None => tracing::debug!("Skipping unknown category id {category_id}"),
                }
            }
            flush_needed = true;
            Some(resolved)
        }
        None => None,
    };

    let mut role_rename = None;
    let mut path_rename = None;
    if let Some(new_name) = &update.name {
        if *new_name != repository.name {
            if repository.times_downloaded != 0 {
                return Err(Error::NameFrozen);
            }
            let owner = require_owner(store, &repository)?;
            validate_repository_name(store, new_name, &owner)?;

            role_rename = Some((
                admin_role_name(&repository.name, &owner.username),
                admin_role_name(new_name, &owner.username),
            ));
            path_rename = Some((
                published_path_key(&owner.username, &repository.name),
                published_path_key(&owner.username, new_name),
            ));
            changed.name = new_name.clone();
            flush_needed = true;
        }
    }

    if !flush_needed {
        return Ok(UpdateOutcome::Unchanged(repository));
    }

    // On a rename, the published path entry and the repository's own config
    // move before the database commit, in the same order the registry state
    // was created.
    if let Some((old_key, new_key)) = &path_rename {
        registry.rename(old_key, new_key)?;
        let repo = vcs::open_repository(&config.repository_path(repository.id))?;
        vcs::rename_in_repo_config(&repo, &changed.name)?;
    }

    store.commit_repository_update(
        &changed,
        category_ids.as_deref(),
        role_rename
            .as_ref()
            .map(|(old, new)| (old.as_str(), new.as_str())),
    )?;

    let repository = require_repository(store, repository_id)?;
    tracing::info!("Updated repository {}", repository.name);
    Ok(UpdateOutcome::Updated(repository))
}
