use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::db::Database;
use crate::error::Result;
use crate::models::Recipe;

/// Durable single-table mapping from record id to record.
///
/// Every call suspends the caller until the write (or read) completes or fails
/// with a storage error.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Every stored record, in no particular order.
    async fn get_all(&self) -> Result<Vec<Recipe>>;
    /// Insert or fully replace the record at `recipe.id`.
    async fn put(&self, recipe: &Recipe) -> Result<()>;
    /// Upsert a batch atomically: on error nothing from `recipes` was written.
    async fn put_many(&self, recipes: &[Recipe]) -> Result<()>;
    /// Remove the record if present. Absent ids succeed.
    async fn delete(&self, id: &str) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

#[derive(Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

/// SQLite-backed store. The database is opened (and migrated) on first access,
/// and every statement runs on the blocking pool.
pub struct SqliteStore {
    location: Location,
    db: OnceCell<Arc<Mutex<Database>>>,
}

impl SqliteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::File(path.into()),
            db: OnceCell::new(),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            db: OnceCell::new(),
        }
    }

    async fn database(&self) -> Result<Arc<Mutex<Database>>> {
        let db = self
            .db
            .get_or_try_init(|| async {
                let location = self.location.clone();
                let db = tokio::task::spawn_blocking(move || match location {
                    Location::File(path) => Database::open(&path),
                    Location::Memory => Database::open_in_memory(),
                })
                .await??;
                tracing::debug!("recipe store opened");
                Ok::<_, crate::error::CookbookError>(Arc::new(Mutex::new(db)))
            })
            .await?;
        Ok(Arc::clone(db))
    }

    async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = self.database().await?;
        tokio::task::spawn_blocking(move || {
            let db = db.lock().unwrap_or_else(PoisonError::into_inner);
            f(&db)
        })
        .await?
    }
}

#[async_trait]
impl RecipeStore for SqliteStore {
    async fn get_all(&self) -> Result<Vec<Recipe>> {
        self.with_db(Database::get_all_recipes).await
    }

    async fn put(&self, recipe: &Recipe) -> Result<()> {
        let recipe = recipe.clone();
        self.with_db(move |db| db.put_recipe(&recipe)).await
    }

    async fn put_many(&self, recipes: &[Recipe]) -> Result<()> {
        let recipes = recipes.to_vec();
        self.with_db(move |db| db.put_recipes(&recipes)).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.with_db(move |db| db.delete_recipe(&id).map(|_| ())).await
    }

    async fn clear(&self) -> Result<()> {
        self.with_db(|db| db.clear_recipes().map(|_| ())).await
    }
}
