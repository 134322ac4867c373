//! Repository management: creation, update, name validation, role
//! associations, category listings, and the dependency aggregation that
//! produces install manifests for client instances.

mod create;
mod info;
mod links;
mod list;
mod roles;
mod update;
mod validate;

pub use create::{CreateRepository, create_repository};
pub use info::{
    DependencySource, ExpandedRepositoryDependencies, InstallInfo, InstallManifest,
    RelationBuilder, RepoInfo, create_repo_info, install_info, next_downloadable_revision,
    resolve_metadata,
};
pub use links::{clone_url, owner_from_clone_url, sharable_url, shed_from_clone_url};
pub use list::{CategoryListing, ListOptions, RepositoryListItem, repositories_by_category};
pub use roles::{
    AssociationStatus, RoleAssociationUpdate, RoleAssociationView, manage_role_associations,
};
pub use update::{RepositoryUpdate, UpdateOutcome, update_repository};
pub use validate::validate_repository_name;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Repository, User};

pub const ADMIN_ROLE_DESCRIPTION: &str =
    "A user or group member with this role can administer this repository.";

/// Derives the name of a repository's admin role from its name and its
/// owner's username. Namespacing by both keeps role names unique, and the
/// rename path relies on being able to re-derive the current role name.
#[must_use]
pub fn admin_role_name(name: &str, owner: &str) -> String {
    format!("{name}_{owner}_admin")
}

/// The key under which a repository is published in the path registry.
#[must_use]
pub fn published_path_key(owner: &str, name: &str) -> String {
    format!("repos/{owner}/{name}")
}

/// Loud locator for mutation paths: a missing repository is an error here,
/// not an empty result.
pub fn require_repository(store: &dyn Store, id: i64) -> Result<Repository> {
    store.get_repository(id)?.ok_or(Error::RepositoryNotFound)
}

pub fn require_repository_by_name_and_owner(
    store: &dyn Store,
    name: &str,
    owner: &str,
) -> Result<Repository> {
    store
        .get_repository_by_name_and_owner(name, owner)?
        .ok_or(Error::RepositoryNotFound)
}

/// Resolves a repository's owning user.
pub fn require_owner(store: &dyn Store, repository: &Repository) -> Result<User> {
    store
        .get_user(repository.user_id)?
        .ok_or(Error::UserNotFound)
}
