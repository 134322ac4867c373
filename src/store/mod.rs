mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &NewUser) -> Result<User>;
    fn get_user(&self, id: i64) -> Result<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    /// Non-deleted users ordered by email.
    fn list_users(&self) -> Result<Vec<User>>;
    fn has_admin_user(&self) -> Result<bool>;

    // Group operations
    fn create_group(&self, name: &str) -> Result<Group>;
    fn get_group(&self, id: i64) -> Result<Option<Group>>;
    fn get_group_by_name(&self, name: &str) -> Result<Option<Group>>;
    /// Non-deleted groups ordered by name.
    fn list_groups(&self) -> Result<Vec<Group>>;
    fn add_group_member(&self, user_id: i64, group_id: i64) -> Result<()>;

    // Category operations
    fn create_category(&self, category: &NewCategory) -> Result<Category>;
    fn get_category(&self, id: i64) -> Result<Option<Category>>;
    fn get_category_by_name(&self, name: &str) -> Result<Option<Category>>;
    fn list_categories(&self) -> Result<Vec<Category>>;

    // Repository operations
    //
    // Creation writes the repository row, its admin role, the owner's
    // user-role association, the repository-role association and the
    // category associations in one transaction.
    fn create_repository(
        &self,
        repository: &NewRepository,
        role_name: &str,
        role_description: &str,
        category_ids: &[i64],
    ) -> Result<(Repository, Role)>;
    fn get_repository(&self, id: i64) -> Result<Option<Repository>>;
    fn get_repository_by_name_and_owner(&self, name: &str, owner: &str)
    -> Result<Option<Repository>>;
    fn list_repositories_by_category(
        &self,
        category_id: i64,
        installable_only: bool,
        sort_key: SortKey,
        sort_order: SortOrder,
        page: Option<u32>,
        per_page: u32,
    ) -> Result<Vec<RepositoryWithOwner>>;
    /// Apply a prepared update in one transaction: scalar columns, an
    /// optional full category replacement and an optional admin-role
    /// rename tied to a name change.
    fn commit_repository_update(
        &self,
        repository: &Repository,
        category_ids: Option<&[i64]>,
        role_rename: Option<(&str, &str)>,
    ) -> Result<()>;
    fn list_repository_categories(&self, repository_id: i64) -> Result<Vec<Category>>;
    fn increment_times_downloaded(&self, repository_id: i64) -> Result<()>;
    fn set_repository_deleted(&self, repository_id: i64, deleted: bool) -> Result<()>;

    // Role operations
    fn get_role(&self, id: i64) -> Result<Option<Role>>;
    fn get_role_by_name(&self, name: &str) -> Result<Option<Role>>;
    /// Reset the role's user, group and repository associations to exactly
    /// the given sets, in one transaction.
    fn set_role_associations(
        &self,
        role_id: i64,
        user_ids: &[i64],
        group_ids: &[i64],
        repository_ids: &[i64],
    ) -> Result<()>;
    fn list_role_users(&self, role_id: i64) -> Result<Vec<User>>;
    fn list_role_groups(&self, role_id: i64) -> Result<Vec<Group>>;
    /// True when the user holds a role associated with the repository,
    /// directly or through group membership.
    fn user_has_repository_role(&self, user_id: i64, repository_id: i64) -> Result<bool>;

    // Metadata operations
    fn create_repository_metadata(
        &self,
        metadata: &NewRepositoryMetadata,
    ) -> Result<RepositoryMetadata>;
    fn get_repository_metadata(
        &self,
        repository_id: i64,
        changeset_revision: &str,
    ) -> Result<Option<RepositoryMetadata>>;
    fn list_downloadable_revisions(&self, repository_id: i64) -> Result<Vec<String>>;
}
