use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MetadataBlob;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
}

/// Repository content class. Suite and tool-dependency definition
/// repositories hold a single definition file; unrestricted repositories
/// hold arbitrary tool sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryType {
    Unrestricted,
    RepositorySuiteDefinition,
    ToolDependencyDefinition,
}

impl RepositoryType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryType::Unrestricted => "unrestricted",
            RepositoryType::RepositorySuiteDefinition => "repository_suite_definition",
            RepositoryType::ToolDependencyDefinition => "tool_dependency_definition",
        }
    }
}

impl std::str::FromStr for RepositoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unrestricted" => Ok(RepositoryType::Unrestricted),
            "repository_suite_definition" => Ok(RepositoryType::RepositorySuiteDefinition),
            "tool_dependency_definition" => Ok(RepositoryType::ToolDependencyDefinition),
            other => Err(format!("unknown repository type: {other}")),
        }
    }
}

impl std::fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RepositoryType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_repository_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage_url: Option<String>,
    pub user_id: i64,
    pub deleted: bool,
    pub times_downloaded: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRepository {
    pub name: String,
    pub kind: RepositoryType,
    pub description: Option<String>,
    pub long_description: Option<String>,
    pub remote_repository_url: Option<String>,
    pub homepage_url: Option<String>,
    pub user_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleType {
    System,
    User,
}

impl RoleType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleType::System => "system",
            RoleType::User => "user",
        }
    }
}

impl std::str::FromStr for RoleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(RoleType::System),
            "user" => Ok(RoleType::User),
            other => Err(format!("unknown role type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub role_type: RoleType,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One extracted-metadata snapshot for a repository at a changeset revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    pub id: i64,
    pub repository_id: i64,
    pub changeset_revision: String,
    pub downloadable: bool,
    pub includes_tools_for_display_in_tool_panel: bool,
    pub metadata: MetadataBlob,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRepositoryMetadata {
    pub repository_id: i64,
    pub changeset_revision: String,
    pub downloadable: bool,
    pub includes_tools_for_display_in_tool_panel: bool,
    pub metadata: MetadataBlob,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Name,
    Owner,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryWithOwner {
    #[serde(flatten)]
    pub repository: Repository,
    pub owner: String,
}
