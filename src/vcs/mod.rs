//! Thin wrappers around the version control backing each repository.
//!
//! Repositories are stored as bare git repositories on disk. Everything the
//! rest of the crate needs from version control goes through this module:
//! initializing a repository, ordering changesets, resolving a changeset to
//! its numeric revision, and maintaining the published path registry that
//! maps `repos/<owner>/<name>` keys to filesystem locations.

mod ops;
mod paths;

pub use ops::{
    VcsError, changeset_rev, init_repository, list_changesets, open_repository,
    rename_in_repo_config, resolve_changeset, tip, write_repo_config,
};
pub use paths::{PathRegistry, TomlPathRegistry};
