pub mod backup;
pub mod db;
pub mod draft;
pub mod error;
pub mod local_cache;
pub mod models;
pub mod photo;
pub mod selection;
pub mod service;
pub mod store;

pub use error::{CookbookError, Result};
pub use local_cache::LocalCache;
pub use models::{Recipe, RecipeFields};
pub use service::Cookbook;
pub use store::{RecipeStore, SqliteStore};
