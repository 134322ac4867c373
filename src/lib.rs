//! # Toolshed
//!
//! A registry for versioned tool repositories, usable both as a standalone
//! admin binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! toolshed = { version = "0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::path::PathBuf;
//! use toolshed::config::ShedConfig;
//! use toolshed::store::{SqliteStore, Store};
//!
//! let config = ShedConfig::new(PathBuf::from("./data"), "https://shed.example.org");
//! let store = SqliteStore::new(&config.db_path()).unwrap();
//! store.initialize().unwrap();
//! // Drive creates, updates and install-info queries through toolshed::repository.
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Pulls in the admin binary's dependencies. Disable with
//!   `default-features = false` for library use.

pub mod config;
pub mod error;
pub mod repository;
pub mod security;
pub mod store;
pub mod types;
pub mod vcs;
