use std::fs;

use crate::config::ShedConfig;
use crate::error::Result;
use crate::store::Store;
use crate::types::{NewRepository, Repository, RepositoryType, User};
use crate::vcs::{self, PathRegistry};

use super::{ADMIN_ROLE_DESCRIPTION, admin_role_name, published_path_key, validate_repository_name};

#[derive(Debug, Clone)]
pub struct CreateRepository {
    pub name: String,
    pub kind: RepositoryType,
    pub description: Option<String>,
    pub long_description: Option<String>,
    pub remote_repository_url: Option<String>,
    pub homepage_url: Option<String>,
    pub category_ids: Vec<i64>,
}

/// Creates a repository: validates the name, commits the repository row, its
/// admin role, the owner's role membership, and the category associations in
/// one transaction, then initializes the on-disk repository and publishes it
/// under `repos/<owner>/<name>`.
pub fn create_repository(
    store: &dyn Store,
    registry: &dyn PathRegistry,
    config: &ShedConfig,
    owner: &User,
    request: &CreateRepository,
) -> Result<Repository> {
    validate_repository_name(store, &request.name, owner)?;

    let mut category_ids = Vec::with_capacity(request.category_ids.len());
    for category_id in &request.category_ids {
        match store.get_category(*category_id)? {
            Some(category) => category_ids.push(category.id),
            None => tracing::debug!("Skipping unknown category id {category_id}"),
        }
    }

    let role_name = admin_role_name(&request.name, &owner.username);
    let (repository, _role) = store.create_repository(
        &NewRepository {
            name: request.name.clone(),
            kind: request.kind,
            description: request.description.clone(),
            long_description: request.long_description.clone(),
            remote_repository_url: request.remote_repository_url.clone(),
            homepage_url: request.homepage_url.clone(),
            user_id: owner.id,
        },
        &role_name,
        ADMIN_ROLE_DESCRIPTION,
        &category_ids,
    )?;

    let repository_path = config.repository_path(repository.id);
    fs::create_dir_all(&repository_path)?;
    let repo = vcs::init_repository(&repository_path)?;
    vcs::write_repo_config(&repo, &repository.name, &owner.username)?;

    registry.add(
        &published_path_key(&owner.username, &repository.name),
        &repository_path,
    )?;

    tracing::info!(
        "Created repository {}/{} at {}",
        owner.username,
        repository.name,
        repository_path.display()
    );
    Ok(repository)
}
