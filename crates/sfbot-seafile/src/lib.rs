//! Seafile adapter.
//!
//! Talks to the Seafile Web API (`/api2`): token login, library lookup,
//! directory listing and upload links. [`SeafileStorage`] implements the core
//! `StorageGateway` port over one resolved folder.

mod client;
mod repo;
mod storage;

pub use client::SeafileClient;
pub use repo::{DirEntry, Repo, RepoInfo, Repos, SeafDir};
pub use storage::SeafileStorage;
