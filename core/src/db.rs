use std::path::Path;

use rusqlite::{Connection, params};

use crate::error::{CookbookError, Result};
use crate::models::Recipe;

/// Current schema version recorded in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| {
            CookbookError::Storage(format!(
                "Failed to open database {}: {e}",
                path.display()
            ))
        })?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version = self.schema_version()?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS recipes (
                    id TEXT PRIMARY KEY NOT NULL,
                    name TEXT NOT NULL DEFAULT '',
                    time TEXT NOT NULL DEFAULT '',
                    ingredients TEXT NOT NULL DEFAULT '',
                    instructions TEXT NOT NULL DEFAULT '',
                    nutrition TEXT NOT NULL DEFAULT '',
                    photo TEXT,
                    section TEXT NOT NULL DEFAULT 'all',
                    updated INTEGER NOT NULL DEFAULT 0
                );

                CREATE INDEX IF NOT EXISTS idx_recipes_updated ON recipes(updated);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    pub fn schema_version(&self) -> Result<i64> {
        Ok(self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?)
    }

    fn recipe_from_row(row: &rusqlite::Row) -> rusqlite::Result<Recipe> {
        Ok(Recipe {
            id: row.get(0)?,
            name: row.get(1)?,
            time: row.get(2)?,
            ingredients: row.get(3)?,
            instructions: row.get(4)?,
            nutrition: row.get(5)?,
            photo: row.get(6)?,
            section: row.get(7)?,
            updated: row.get(8)?,
        })
    }

    // --- Recipes ---

    pub fn get_all_recipes(&self) -> Result<Vec<Recipe>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, time, ingredients, instructions, nutrition, photo, section, updated
             FROM recipes",
        )?;
        let recipes = stmt
            .query_map([], Self::recipe_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(recipes)
    }

    /// Insert or fully replace the record stored under `recipe.id`.
    pub fn put_recipe(&self, recipe: &Recipe) -> Result<()> {
        Self::upsert(&self.conn, recipe)
    }

    /// Upsert a batch in one transaction. Either every record lands or none do.
    pub fn put_recipes(&self, recipes: &[Recipe]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for recipe in recipes {
            Self::upsert(&tx, recipe)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn upsert(conn: &Connection, recipe: &Recipe) -> Result<()> {
        conn.execute(
            "INSERT INTO recipes (id, name, time, ingredients, instructions, nutrition, photo, section, updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                time = excluded.time,
                ingredients = excluded.ingredients,
                instructions = excluded.instructions,
                nutrition = excluded.nutrition,
                photo = excluded.photo,
                section = excluded.section,
                updated = excluded.updated",
            params![
                recipe.id,
                recipe.name,
                recipe.time,
                recipe.ingredients,
                recipe.instructions,
                recipe.nutrition,
                recipe.photo,
                recipe.section,
                recipe.updated,
            ],
        )?;
        Ok(())
    }

    /// Returns whether a row was removed. Deleting an absent id is not an error.
    pub fn delete_recipe(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM recipes WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    pub fn clear_recipes(&self) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let rows = tx.execute("DELETE FROM recipes", [])?;
        tx.commit()?;
        Ok(rows)
    }
}
