use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::User;

const RESERVED_NAMES: &[&str] = &["repos"];

/// Validates a candidate repository name for an owner. Names must be unique
/// per owner, at least two characters long, and contain only lower-case
/// letters, numbers, and the `_` character.
///
/// Checks run in a fixed order and the first failing rule wins; the error
/// carries the user-facing reason.
pub fn validate_repository_name(store: &dyn Store, name: &str, owner: &User) -> Result<()> {
    if name.is_empty() || name == "None" {
        return Err(Error::InvalidName(
            "Enter the required repository name.".to_string(),
        ));
    }
    if RESERVED_NAMES.contains(&name) {
        return Err(Error::InvalidName(format!(
            "The term '{name}' is a reserved word in the Tool Shed, so it cannot be used as a repository name."
        )));
    }
    if let Some(existing) = store.get_repository_by_name_and_owner(name, &owner.username)? {
        if existing.deleted {
            return Err(Error::InvalidName(format!(
                "You own a deleted repository named {name}, please choose a different name."
            )));
        }
        return Err(Error::InvalidName(format!(
            "You already own a repository named {name}, please choose a different name."
        )));
    }
    // Length rules count characters, not bytes, and run before the charset
    // rule.
    let length = name.chars().count();
    if length < 2 {
        return Err(Error::InvalidName(
            "Repository names must be at least 2 characters in length.".to_string(),
        ));
    }
    if length > 80 {
        return Err(Error::InvalidName(
            "Repository names cannot be more than 80 characters in length.".to_string(),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(Error::InvalidName(
            "Repository names must contain only lower-case letters, numbers and underscore."
                .to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::{NewRepository, NewUser, RepositoryType};
    use tempfile::TempDir;

    fn fixture() -> (TempDir, SqliteStore, User) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        let alice = store
            .create_user(&NewUser {
                username: "alice".to_string(),
                email: "alice@example.org".to_string(),
                is_admin: false,
            })
            .unwrap();
        (temp, store, alice)
    }

    fn reason(result: Result<()>) -> String {
        match result {
            Err(Error::InvalidName(reason)) => reason,
            other => panic!("expected InvalidName, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_names_pass() {
        let (_temp, store, alice) = fixture();
        assert!(validate_repository_name(&store, "my_tool", &alice).is_ok());
        assert!(validate_repository_name(&store, "tool2", &alice).is_ok());
        assert!(validate_repository_name(&store, "ab", &alice).is_ok());
    }

    #[test]
    fn test_first_failing_rule_wins() {
        let (_temp, store, alice) = fixture();

        // "" fails the empty rule and the length rule; the empty rule is
        // reported because it runs first.
        assert_eq!(
            reason(validate_repository_name(&store, "", &alice)),
            "Enter the required repository name."
        );
        assert_eq!(
            reason(validate_repository_name(&store, "None", &alice)),
            "Enter the required repository name."
        );

        // "a" is both too short and charset-valid; length is reported.
        assert_eq!(
            reason(validate_repository_name(&store, "a", &alice)),
            "Repository names must be at least 2 characters in length."
        );
    }

    #[test]
    fn test_reserved_word() {
        let (_temp, store, alice) = fixture();
        assert_eq!(
            reason(validate_repository_name(&store, "repos", &alice)),
            "The term 'repos' is a reserved word in the Tool Shed, so it cannot be used as a repository name."
        );
    }

    #[test]
    fn test_existing_names_are_rejected_per_owner() {
        let (_temp, store, alice) = fixture();
        let bob = store
            .create_user(&NewUser {
                username: "bob".to_string(),
                email: "bob@example.org".to_string(),
                is_admin: false,
            })
            .unwrap();

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

        assert_eq!(
            reason(validate_repository_name(&store, "my_tool", &alice)),
            "You already own a repository named my_tool, please choose a different name."
        );
        // Uniqueness is per owner.
        assert!(validate_repository_name(&store, "my_tool", &bob).is_ok());

        // A soft-deleted repository still reserves its name, with its own message.
        store.set_repository_deleted(repository.id, true).unwrap();
        assert_eq!(
            reason(validate_repository_name(&store, "my_tool", &alice)),
            "You own a deleted repository named my_tool, please choose a different name."
        );
    }

    #[test]
    fn test_length_and_charset() {
        let (_temp, store, alice) = fixture();

        let long = "a".repeat(81);
        assert_eq!(
            reason(validate_repository_name(&store, &long, &alice)),
            "Repository names cannot be more than 80 characters in length."
        );
        assert!(validate_repository_name(&store, &"a".repeat(80), &alice).is_ok());

        for bad in ["My_Tool", "my-tool", "my tool", "outil_été"] {
            assert_eq!(
                reason(validate_repository_name(&store, bad, &alice)),
                "Repository names must contain only lower-case letters, numbers and underscore."
            );
        }
    }
}
