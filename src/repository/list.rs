use serde::Serialize;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Category, Repository, SortKey, SortOrder};

#[derive(Debug, Clone)]
pub struct ListOptions {
    /// Only repositories with at least one downloadable metadata revision.
    pub installable_only: bool,
    pub sort_key: SortKey,
    pub sort_order: SortOrder,
    /// 1-based page; `None` returns everything.
    pub page: Option<u32>,
    pub per_page: u32,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            installable_only: false,
            sort_key: SortKey::Name,
            sort_order: SortOrder::Asc,
            page: None,
            per_page: 25,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RepositoryListItem {
    #[serde(flatten)]
    pub repository: Repository,
    pub owner: String,
    pub downloadable_revisions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CategoryListing {
    pub category: Category,
    pub repositories: Vec<RepositoryListItem>,
}

/// Lists the repositories associated with a category, with their owners and
/// the downloadable changeset revisions known for each.
pub fn repositories_by_category(
    store: &dyn Store,
    category_id: i64,
    options: &ListOptions,
) -> Result<CategoryListing> {
    let category = store
        .get_category(category_id)?
        .ok_or(Error::CategoryNotFound)?;

    let rows = store.list_repositories_by_category(
        category_id,
        options.installable_only,
        options.sort_key,
        options.sort_order,
        options.page,
        options.per_page,
    )?;

    let mut repositories = Vec::with_capacity(rows.len());
    for row in rows {
        let downloadable_revisions = store.list_downloadable_revisions(row.repository.id)?;
        repositories.push(RepositoryListItem {
            repository: row.repository,
            owner: row.owner,
            downloadable_revisions,
        });
    }

    Ok(CategoryListing {
        category,
        repositories,
    })
}
