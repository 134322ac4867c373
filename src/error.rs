use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("repository not found")]
    RepositoryNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("role not found")]
    RoleNotFound,

    #[error("category not found")]
    CategoryNotFound,

    #[error("{0}")]
    InvalidName(String),

    #[error("repository names cannot be changed if the repository has been cloned")]
    NameFrozen,

    #[error("you are not the owner of this repository, so you cannot administer it")]
    NotAuthorized,

    #[error("version control error: {0}")]
    Vcs(#[from] crate::vcs::VcsError),

    #[error("metadata encoding error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
