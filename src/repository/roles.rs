use std::collections::HashSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Group, Repository, User};

use super::{admin_role_name, require_owner};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssociationStatus {
    Done,
    Error,
}

/// A submitted membership set for a repository's admin role. Ids that do not
/// resolve are skipped.
#[derive(Debug, Clone, Default)]
pub struct RoleAssociationUpdate {
    pub user_ids: Vec<i64>,
    pub group_ids: Vec<i64>,
}

/// The state of a repository admin role's associations: every non-deleted
/// user (ordered by email) and group (ordered by name), partitioned into
/// members and non-members.
#[derive(Debug, Serialize)]
pub struct RoleAssociationView {
    pub in_users: Vec<User>,
    pub out_users: Vec<User>,
    pub in_groups: Vec<Group>,
    pub out_groups: Vec<Group>,
    pub message: String,
    pub status: AssociationStatus,
}

/// Manages the admin role of a repository. With an update, the submitted
/// users and groups replace the role's associations; without one, the
/// current state is returned unchanged.
///
/// The repository owner must always be associated with the admin role: an
/// update that omits the owner still goes through, but with the owner
/// re-added and the result flagged as an error.
pub fn manage_role_associations(
    store: &dyn Store,
    repository: &Repository,
    update: Option<&RoleAssociationUpdate>,
) -> Result<RoleAssociationView> {
    let owner = require_owner(store, repository)?;
    let role_name = admin_role_name(&repository.name, &owner.username);
    let role = store
        .get_role_by_name(&role_name)?
        .ok_or(Error::RoleNotFound)?;

    let mut message = String::new();
    let mut status = AssociationStatus::Done;

    if let Some(update) = update {
        let mut users = Vec::with_capacity(update.user_ids.len());
        for user_id in &update.user_ids {
            match store.get_user(*user_id)? {
                Some(user) => users.push(user),
                None => tracing::debug!("Skipping unknown user id {user_id}"),
            }
        }
        if !users.iter().any(|user| user.id == owner.id) {
            users.push(owner.clone());
            message.push_str(
                "The repository owner must always be associated with the repository's administrator role. ",
            );
            status = AssociationStatus::Error;
        }

        let mut groups = Vec::with_capacity(update.group_ids.len());
        for group_id in &update.group_ids {
            match store.get_group(*group_id)? {
                Some(group) => groups.push(group),
                None => tracing::debug!("Skipping unknown group id {group_id}"),
            }
        }

        let user_ids: Vec<i64> = users.iter().map(|user| user.id).collect();
        let group_ids: Vec<i64> = groups.iter().map(|group| group.id).collect();
        store.set_role_associations(role.id, &user_ids, &group_ids, &[repository.id])?;

        let _ = write!(
            message,
            "Role {} has been associated with {} users, {} groups and 1 repositories.",
            role.name,
            user_ids.len(),
            group_ids.len()
        );
    }

    let members: HashSet<i64> = store
        .list_role_users(role.id)?
        .iter()
        .map(|user| user.id)
        .collect();
    let mut in_users = Vec::new();
    let mut out_users = Vec::new();
    for user in store.list_users()? {
        if members.contains(&user.id) {
            in_users.push(user);
        } else {
            out_users.push(user);
        }
    }

    let member_groups: HashSet<i64> = store
        .list_role_groups(role.id)?
        .iter()
        .map(|group| group.id)
        .collect();
    let mut in_groups = Vec::new();
    let mut out_groups = Vec::new();
    for group in store.list_groups()? {
        if member_groups.contains(&group.id) {
            in_groups.push(group);
        } else {
            out_groups.push(group);
        }
    }

    Ok(RoleAssociationView {
        in_users,
        out_users,
        in_groups,
        out_groups,
        message,
        status,
    })
}
