//! Authorization predicates for repository administration.

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Repository, User};

/// Returns whether a user may administer a repository. Site administrators
/// always may; everyone else needs the repository's admin role, held either
/// directly or through a group.
pub fn can_administer_repository(
    store: &dyn Store,
    user: &User,
    repository: &Repository,
) -> Result<bool> {
    if user.is_admin {
        return Ok(true);
    }
    store.user_has_repository_role(user.id, repository.id)
}

/// Fails with [`Error::NotAuthorized`] when the user may not administer the
/// repository. Mutation paths call this before touching any state.
pub fn ensure_can_administer(
    store: &dyn Store,
    user: &User,
    repository: &Repository,
) -> Result<()> {
    if can_administer_repository(store, user, repository)? {
        Ok(())
    } else {
        Err(Error::NotAuthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::{NewRepository, NewUser, RepositoryType};
    use tempfile::TempDir;

    fn user(store: &SqliteStore, username: &str, is_admin: bool) -> User {
        store
            .create_user(&NewUser {
                username: username.to_string(),
                email: format!("{username}@example.org"),
                is_admin,
            })
            .unwrap()
    }

    #[test]
    fn test_owner_and_site_admin_can_administer() {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();

        let alice = user(&store, "alice", false);
        let bob = user(&store, "bob", false);
        let root = user(&store, "root", true);

        let (repository, _role) = store
            .create_repository(
                &NewRepository {
                    name: "my_tool".to_string(),
                    kind: RepositoryType::Unrestricted,
                    description: None,
                    long_description: None,
                    remote_repository_url: None,
                    homepage_url: None,
                    user_id: alice.id,
                },
                "my_tool_alice_admin",
                "admins",
                &[],
            )
            .unwrap();

        assert!(can_administer_repository(&store, &alice, &repository).unwrap());
        assert!(can_administer_repository(&store, &root, &repository).unwrap());
        assert!(!can_administer_repository(&store, &bob, &repository).unwrap());

        assert!(ensure_can_administer(&store, &alice, &repository).is_ok());
        assert!(matches!(
            ensure_can_administer(&store, &bob, &repository),
            Err(Error::NotAuthorized)
        ));
    }
}
