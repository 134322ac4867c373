use std::path::Path;

use git2::{Oid, Repository, Sort};

#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    #[error("repository not initialized")]
    RepoNotFound,
    #[error("changeset not found: {0}")]
    ChangesetNotFound(String),
    #[error("{0}")]
    Internal(String),
}

pub fn init_repository(path: &Path) -> Result<Repository, VcsError> {
    Repository::init_bare(path)
        .map_err(|e| VcsError::Internal(format!("Failed to initialize repository: {e}")))
}

pub fn open_repository(path: &Path) -> Result<Repository, VcsError> {
    Repository::open_bare(path).map_err(|_| VcsError::RepoNotFound)
}

/// Resolves a changeset string (a full or abbreviated commit id) to the
/// commit it names.
pub fn resolve_changeset(repo: &Repository, changeset: &str) -> Result<Oid, VcsError> {
    let object = repo
        .revparse_single(changeset)
        .map_err(|_| VcsError::ChangesetNotFound(changeset.to_string()))?;
    let commit = object
        .peel_to_commit()
        .map_err(|_| VcsError::ChangesetNotFound(changeset.to_string()))?;
    Ok(commit.id())
}

/// Returns the numeric revision of a changeset: the number of changesets
/// that precede it in history. The first changeset is revision 0.
pub fn changeset_rev(repo: &Repository, changeset: &str) -> Result<u64, VcsError> {
    let oid = resolve_changeset(repo, changeset)?;

    let mut walk = repo
        .revwalk()
        .map_err(|e| VcsError::Internal(format!("Failed to walk history: {e}")))?;
    walk.push(oid)
        .map_err(|e| VcsError::Internal(format!("Failed to walk history: {e}")))?;

    let mut ancestors: u64 = 0;
    for entry in walk {
        entry.map_err(|e| VcsError::Internal(format!("Failed to walk history: {e}")))?;
        ancestors += 1;
    }
    // The walk includes the changeset itself.
    Ok(ancestors - 1)
}

/// Returns every changeset in the repository, oldest first.
pub fn list_changesets(repo: &Repository) -> Result<Vec<String>, VcsError> {
    let empty = repo
        .is_empty()
        .map_err(|e| VcsError::Internal(format!("Failed to inspect repository: {e}")))?;
    if empty {
        return Ok(Vec::new());
    }

    let mut walk = repo
        .revwalk()
        .map_err(|e| VcsError::Internal(format!("Failed to walk history: {e}")))?;
    walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)
        .map_err(|e| VcsError::Internal(format!("Failed to walk history: {e}")))?;
    walk.push_head()
        .map_err(|e| VcsError::Internal(format!("Failed to walk history: {e}")))?;

    let mut changesets = Vec::new();
    for entry in walk {
        let oid = entry.map_err(|e| VcsError::Internal(format!("Failed to walk history: {e}")))?;
        changesets.push(oid.to_string());
    }
    Ok(changesets)
}

/// Returns the latest changeset, or `None` for a repository with no commits.
pub fn tip(repo: &Repository) -> Result<Option<String>, VcsError> {
    let empty = repo
        .is_empty()
        .map_err(|e| VcsError::Internal(format!("Failed to inspect repository: {e}")))?;
    if empty {
        return Ok(None);
    }

    let head = repo
        .head()
        .map_err(|e| VcsError::Internal(format!("Failed to read HEAD: {e}")))?;
    Ok(head.target().map(|oid| oid.to_string()))
}

/// Records the repository's name and owner in its local config, and marks
/// the owner as allowed to push.
pub fn write_repo_config(repo: &Repository, name: &str, owner: &str) -> Result<(), VcsError> {
    let mut config = repo
        .config()
        .map_err(|e| VcsError::Internal(format!("Failed to open repository config: {e}")))?;

    config
        .set_str("shed.name", name)
        .map_err(|e| VcsError::Internal(format!("Failed to write repository config: {e}")))?;
    config
        .set_str("shed.owner", owner)
        .map_err(|e| VcsError::Internal(format!("Failed to write repository config: {e}")))?;
    config
        .set_str("shed.allowpush", owner)
        .map_err(|e| VcsError::Internal(format!("Failed to write repository config: {e}")))?;
    Ok(())
}

/// Rewrites the recorded name after a repository rename. The owner and push
/// entries are left alone.
pub fn rename_in_repo_config(repo: &Repository, new_name: &str) -> Result<(), VcsError> {
    let mut config = repo
        .config()
        .map_err(|e| VcsError::Internal(format!("Failed to open repository config: {e}")))?;

    config
        .set_str("shed.name", new_name)
        .map_err(|e| VcsError::Internal(format!("Failed to write repository config: {e}")))?;
    Ok(())
}
