use std::fs;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use toolshed::config::ShedConfig;
use toolshed::repository::{
    self, CreateRepository, ListOptions, RepositoryUpdate, UpdateOutcome,
};
use toolshed::store::{SqliteStore, Store};
use toolshed::types::{NewCategory, NewUser, RepositoryType, SortKey, SortOrder, User};
use toolshed::vcs::TomlPathRegistry;

#[derive(Parser)]
#[command(name = "toolshed")]
#[command(about = "A registry for versioned tool repositories", long_about = None)]
struct Cli {
    /// Data directory for the database and repositories
    #[arg(long, global = true, default_value = "./data")]
    data_dir: String,

    /// Public base URL of this shed, used in clone and sharable links
    #[arg(long, global = true, default_value = "http://localhost:9009")]
    base_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// User management
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Category management
    Category {
        #[command(subcommand)]
        command: CategoryCommands,
    },

    /// Repository management
    Repo {
        #[command(subcommand)]
        command: RepoCommands,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the shed (create database and admin user)
    Init {
        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a user
    Create {
        username: String,
        email: String,

        /// Grant site-wide administration
        #[arg(long)]
        admin: bool,
    },
}

#[derive(Subcommand)]
enum CategoryCommands {
    /// Create a category
    Create {
        name: String,

        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
enum RepoCommands {
    /// Create a repository owned by a user
    Create {
        name: String,

        /// Username of the owner
        #[arg(long)]
        owner: String,

        /// Repository type
        #[arg(long = "type", value_name = "TYPE", default_value = "unrestricted")]
        kind: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        long_description: Option<String>,

        #[arg(long)]
        remote_repository_url: Option<String>,

        #[arg(long)]
        homepage_url: Option<String>,

        /// Category id, repeatable
        #[arg(long = "category")]
        categories: Vec<i64>,
    },

    /// Update repository fields; omitted flags are left unchanged
    Update {
        /// Repository id
        #[arg(long)]
        id: i64,

        /// Username performing the update
        #[arg(long)]
        user: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long = "type", value_name = "TYPE")]
        kind: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        long_description: Option<String>,

        #[arg(long)]
        remote_repository_url: Option<String>,

        #[arg(long)]
        homepage_url: Option<String>,

        /// Replacement category id, repeatable
        #[arg(long = "category")]
        categories: Option<Vec<i64>>,

        /// Remove all category associations
        #[arg(long)]
        clear_categories: bool,
    },

    /// List the repositories in a category
    List {
        /// Category name
        #[arg(long)]
        category: String,

        /// Only repositories with an installable revision
        #[arg(long)]
        installable: bool,

        /// Sort by "name" or "owner"
        #[arg(long, default_value = "name")]
        sort_key: String,

        /// "asc" or "desc"
        #[arg(long, default_value = "asc")]
        sort_order: String,

        /// Page number, starting at 1; omit to list everything
        #[arg(long)]
        page: Option<u32>,

        #[arg(long, default_value = "25")]
        per_page: u32,
    },

    /// Print the install manifest for a repository revision as JSON
    Info {
        name: String,

        /// Username of the owner
        owner: String,

        /// Changeset revision to install
        changeset_revision: String,

        /// Username to embed in the clone URL
        #[arg(long)]
        user: Option<String>,
    },
}

fn open_store(config: &ShedConfig) -> anyhow::Result<SqliteStore> {
    if !config.db_path().exists() {
        bail!("Shed not initialized. Run 'toolshed admin init' first to create the database.");
    }
    Ok(SqliteStore::new(config.db_path())?)
}

fn run_init(config: &ShedConfig, non_interactive: bool) -> anyhow::Result<()> {
    fs::create_dir_all(&config.data_dir)?;

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;

    if store.has_admin_user()? {
        bail!(
            "Shed already initialized. Database exists at: {}",
            config.db_path().display()
        );
    }

    println!();
    println!("========================================");
    println!("Tool shed initialized.");
    println!();
    println!("  Database: {}", config.db_path().display());
    println!("========================================");
    println!();

    if !non_interactive {
        create_admin_user_prompt(&store)?;
    }

    Ok(())
}

fn create_admin_user_prompt(store: &SqliteStore) -> anyhow::Result<()> {
    let create_user = inquire::Confirm::new("Would you like to create an admin user?")
        .with_default(true)
        .prompt()?;

    if !create_user {
        return Ok(());
    }

    let username = inquire::Text::new("Username:")
        .with_validator(|input: &str| {
            if input.trim().is_empty() {
                Err("Username cannot be empty".into())
            } else if input.contains(char::is_whitespace) {
                Err("Username cannot contain whitespace".into())
            } else {
                Ok(inquire::validator::Validation::Valid)
            }
        })
        .prompt()?;

    let email = inquire::Text::new("Email:")
        .with_validator(|input: &str| {
            if input.trim().is_empty() || !input.contains('@') {
                Err("Enter a valid email address".into())
            } else {
                Ok(inquire::validator::Validation::Valid)
            }
        })
        .prompt()?;

    let user = store.create_user(&NewUser {
        username,
        email,
        is_admin: true,
    })?;

    println!();
    println!("========================================");
    println!("Created admin user '{}'.", user.username);
    println!("========================================");
    println!();

    Ok(())
}

fn run_user_create(
    config: &ShedConfig,
    username: String,
    email: String,
    admin: bool,
) -> anyhow::Result<()> {
    let store = open_store(config)?;

    if store.get_user_by_username(&username)?.is_some() {
        bail!("User '{username}' already exists.");
    }

    let user = store.create_user(&NewUser {
        username,
        email,
        is_admin: admin,
    })?;

    println!("Created user '{}' (id {}).", user.username, user.id);
    Ok(())
}

fn run_category_create(
    config: &ShedConfig,
    name: String,
    description: Option<String>,
) -> anyhow::Result<()> {
    let store = open_store(config)?;

    if store.get_category_by_name(&name)?.is_some() {
        bail!("Category '{name}' already exists.");
    }

    let category = store.create_category(&NewCategory { name, description })?;

    println!("Created category '{}' (id {}).", category.name, category.id);
    Ok(())
}

fn parse_repository_type(value: &str) -> anyhow::Result<RepositoryType> {
    value.parse::<RepositoryType>().map_err(|e| anyhow::anyhow!(e))
}

fn require_user(store: &SqliteStore, username: &str) -> anyhow::Result<User> {
    match store.get_user_by_username(username)? {
        Some(user) => Ok(user),
        None => bail!("No such user: {username}"),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_repo_create(
    config: &ShedConfig,
    name: String,
    owner: String,
    kind: String,
    description: Option<String>,
    long_description: Option<String>,
    remote_repository_url: Option<String>,
    homepage_url: Option<String>,
    categories: Vec<i64>,
) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let registry = TomlPathRegistry::new(config.paths_file());
    let owner = require_user(&store, &owner)?;

    let request = CreateRepository {
        name,
        kind: parse_repository_type(&kind)?,
        description,
        long_description,
        remote_repository_url,
        homepage_url,
        category_ids: categories,
    };

    let repository = repository::create_repository(&store, &registry, config, &owner, &request)?;

    println!("Repository {} has been created.", repository.name);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_repo_update(
    config: &ShedConfig,
    id: i64,
    user: String,
    name: Option<String>,
    kind: Option<String>,
    description: Option<String>,
    long_description: Option<String>,
    remote_repository_url: Option<String>,
    homepage_url: Option<String>,
    categories: Option<Vec<i64>>,
    clear_categories: bool,
) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let registry = TomlPathRegistry::new(config.paths_file());
    let acting_user = require_user(&store, &user)?;

    let kind = match kind {
        Some(value) => Some(parse_repository_type(&value)?),
        None => None,
    };
    let category_ids = if clear_categories {
        Some(Vec::new())
    } else {
        categories
    };

    let update = RepositoryUpdate {
        name,
        kind,
        description,
        long_description,
        remote_repository_url,
        homepage_url,
        category_ids,
    };

    match repository::update_repository(&store, &registry, config, &acting_user, id, &update)? {
        UpdateOutcome::Updated(repository) => {
            println!(
                "The repository '{}' has been updated.",
                repository.name
            );
        }
        UpdateOutcome::Unchanged(repository) => {
            println!("No changes to repository '{}'.", repository.name);
        }
    }
    Ok(())
}

fn parse_sort_key(value: &str) -> anyhow::Result<SortKey> {
    match value {
        "name" => Ok(SortKey::Name),
        "owner" => Ok(SortKey::Owner),
        other => bail!("Unknown sort key '{other}', expected 'name' or 'owner'."),
    }
}

fn parse_sort_order(value: &str) -> anyhow::Result<SortOrder> {
    match value {
        "asc" => Ok(SortOrder::Asc),
        "desc" => Ok(SortOrder::Desc),
        other => bail!("Unknown sort order '{other}', expected 'asc' or 'desc'."),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_repo_list(
    config: &ShedConfig,
    category: String,
    installable: bool,
    sort_key: String,
    sort_order: String,
    page: Option<u32>,
    per_page: u32,
) -> anyhow::Result<()> {
    let store = open_store(config)?;

    let Some(category) = store.get_category_by_name(&category)? else {
        bail!("No such category: {category}");
    };

    let options = ListOptions {
        installable_only: installable,
        sort_key: parse_sort_key(&sort_key)?,
        sort_order: parse_sort_order(&sort_order)?,
        page,
        per_page,
    };

    let listing = repository::repositories_by_category(&store, category.id, &options)?;

    println!("Repositories in category '{}':", listing.category.name);
    for item in &listing.repositories {
        let description = item.repository.description.as_deref().unwrap_or("");
        println!(
            "  {}/{} ({} installable revisions) {}",
            item.owner,
            item.repository.name,
            item.downloadable_revisions.len(),
            description
        );
    }
    Ok(())
}

fn run_repo_info(
    config: &ShedConfig,
    name: String,
    owner: String,
    changeset_revision: String,
    user: Option<String>,
) -> anyhow::Result<()> {
    let store = open_store(config)?;

    let repository = repository::require_repository_by_name_and_owner(&store, &name, &owner)?;
    let requesting_user = match user {
        Some(username) => Some(require_user(&store, &username)?),
        None => None,
    };

    let info = repository::install_info(
        &store,
        config,
        requesting_user.as_ref(),
        repository.id,
        &changeset_revision,
    )?;

    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("toolshed=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = ShedConfig::new(cli.data_dir, cli.base_url);

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init { non_interactive } => {
                run_init(&config, non_interactive)?;
            }
        },
        Commands::User { command } => match command {
            UserCommands::Create {
                username,
                email,
                admin,
            } => {
                run_user_create(&config, username, email, admin)?;
            }
        },
        Commands::Category { command } => match command {
            CategoryCommands::Create { name, description } => {
                run_category_create(&config, name, description)?;
            }
        },
        Commands::Repo { command } => match command {
            RepoCommands::Create {
                name,
                owner,
                kind,
                description,
                long_description,
                remote_repository_url,
                homepage_url,
                categories,
            } => {
                run_repo_create(
                    &config,
                    name,
                    owner,
                    kind,
                    description,
                    long_description,
                    remote_repository_url,
                    homepage_url,
                    categories,
                )?;
            }
            RepoCommands::Update {
                id,
                user,
                name,
                kind,
                description,
                long_description,
                remote_repository_url,
                homepage_url,
                categories,
                clear_categories,
            } => {
                run_repo_update(
                    &config,
                    id,
                    user,
                    name,
                    kind,
                    description,
                    long_description,
                    remote_repository_url,
                    homepage_url,
                    categories,
                    clear_categories,
                )?;
            }
            RepoCommands::List {
                category,
                installable,
                sort_key,
                sort_order,
                page,
                per_page,
            } => {
                run_repo_list(
                    &config,
                    category,
                    installable,
                    sort_key,
                    sort_order,
                    page,
                    per_page,
                )?;
            }
            RepoCommands::Info {
                name,
                owner,
                changeset_revision,
                user,
            } => {
                run_repo_info(&config, name, owner, changeset_revision, user)?;
            }
        },
    }

    Ok(())
}
