use chrono::Utc;

use crate::backup;
use crate::draft;
use crate::error::{CookbookError, Result};
use crate::local_cache::LocalCache;
use crate::models::{Recipe, RecipeFields, new_recipe_id, validate_recipe};
use crate::photo;
use crate::selection::{self, SectionFilter, Selection, SortKey, View};
use crate::store::RecipeStore;

/// Application state: the store, its in-memory mirror, the local cache and
/// the current list selection.
///
/// The mirror only changes after the matching store call has succeeded.
pub struct Cookbook<S: RecipeStore> {
    store: S,
    cache: LocalCache,
    recipes: Vec<Recipe>,
    selection: Selection,
    read_only: bool,
}

impl<S: RecipeStore> Cookbook<S> {
    /// Hydrate from the store. If the store cannot be read, fall back to the
    /// last mirrored snapshot and refuse further writes.
    pub async fn open(store: S, cache: LocalCache) -> Self {
        let (recipes, read_only) = match store.get_all().await {
            Ok(recipes) => (recipes, false),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "failed to load recipes from store, using local snapshot"
                );
                (cache.read_snapshot().unwrap_or_default(), true)
            }
        };
        Self {
            store,
            cache,
            recipes,
            selection: Selection::default(),
            read_only,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn get(&self, id: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.id == id)
    }

    /// Like [`Cookbook::get`], but a missing id is a `NotFound` error.
    pub fn require(&self, id: &str) -> Result<&Recipe> {
        self.get(id).ok_or_else(|| CookbookError::NotFound(id.to_string()))
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(CookbookError::Storage(
                "store unavailable; recipes were loaded read-only from the local snapshot"
                    .to_string(),
            ));
        }
        Ok(())
    }

    fn mirror(&self) {
        self.cache.mirror_snapshot(&self.recipes);
    }

    // --- Selection ---

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_section(&mut self, section: &str) {
        self.selection.section = SectionFilter::parse(section);
    }

    pub fn set_query(&mut self, query: &str) {
        self.selection.query = query.to_string();
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.selection.sort = sort;
    }

    pub fn view(&self) -> View<'_> {
        selection::render(&self.recipes, &self.selection)
    }

    // --- Draft ---

    /// Prefill for the "new recipe" form.
    pub fn draft(&self) -> Option<RecipeFields> {
        draft::load_draft(&self.cache)
    }

    pub fn update_draft(&self, fields: &RecipeFields) {
        draft::save_draft(&self.cache, fields);
    }

    pub fn clear_draft(&self) {
        draft::clear_draft(&self.cache);
    }

    // --- Mutations ---

    /// Save a new (`editing_id = None`) or existing record from form values.
    ///
    /// Photo bytes that fail to decode are logged and dropped; the save goes
    /// ahead without a new photo.
    pub async fn save(
        &mut self,
        editing_id: Option<&str>,
        fields: RecipeFields,
        photo_bytes: Option<Vec<u8>>,
    ) -> Result<Recipe> {
        self.ensure_writable()?;
        let photo = match photo_bytes {
            Some(bytes) => match photo::compress_photo_async(bytes).await {
                Ok(data_url) => Some(data_url),
                Err(e) => {
                    tracing::warn!(error = %e, "photo resize failed, saving without it");
                    None
                }
            },
            None => None,
        };
        self.save_record(editing_id, fields, photo).await
    }

    /// Save with an already-encoded photo. `None` keeps the existing photo.
    pub async fn save_record(
        &mut self,
        editing_id: Option<&str>,
        fields: RecipeFields,
        photo: Option<String>,
    ) -> Result<Recipe> {
        self.ensure_writable()?;
        let id = editing_id
            .filter(|id| !id.trim().is_empty())
            .map_or_else(new_recipe_id, str::to_string);
        let existing = self.get(&id);

        let photo = photo.or_else(|| existing.and_then(|r| r.photo.clone()));
        let now = Utc::now().timestamp_millis();
        let updated = existing.map_or(now, |r| now.max(r.updated.saturating_add(1)));

        let recipe = fields.into_recipe(id, photo, updated);
        validate_recipe(&recipe)?;
        self.store.put(&recipe).await?;

        if let Some(idx) = self.recipes.iter().position(|r| r.id == recipe.id) {
            self.recipes[idx] = recipe.clone();
        } else {
            self.recipes.insert(0, recipe.clone());
        }
        self.mirror();
        self.clear_draft();
        tracing::debug!(id = %recipe.id, "recipe saved");
        Ok(recipe)
    }

    /// Remove one record. Succeeds whether or not it existed.
    pub async fn delete(&mut self, id: &str) -> Result<()> {
        self.ensure_writable()?;
        self.store.delete(id).await?;
        self.recipes.retain(|r| r.id != id);
        self.mirror();
        Ok(())
    }

    pub async fn clear(&mut self) -> Result<()> {
        self.ensure_writable()?;
        self.store.clear().await?;
        self.recipes.clear();
        self.mirror();
        Ok(())
    }

    /// Re-read the collection from the store.
    pub async fn reload(&mut self) -> Result<()> {
        self.recipes = self.store.get_all().await?;
        self.read_only = false;
        self.mirror();
        Ok(())
    }

    // --- Backup ---

    /// Upsert every record in a JSON backup, then re-hydrate from the store.
    /// Nothing is written when the payload is rejected.
    pub async fn import_json(&mut self, text: &str) -> Result<usize> {
        self.ensure_writable()?;
        let records = backup::parse_import(text)?;
        if let Err(e) = self.store.put_many(&records).await {
            // Resync in case the store kept part of the batch.
            if let Err(reload_err) = self.reload().await {
                tracing::warn!(error = %reload_err, "reload after failed import failed");
            }
            return Err(e);
        }
        self.reload().await?;
        tracing::info!(count = records.len(), "recipes imported");
        Ok(records.len())
    }

    /// Indented JSON of everything in the store.
    pub async fn export_json(&self) -> Result<String> {
        let records = self.store.get_all().await?;
        backup::export_records(&records)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat, RgbImage};

    use super::*;
    use crate::store::SqliteStore;

    /// Store that can be switched to fail every call, or to fail once a number
    /// of single-record puts have gone through. Its batch put is not atomic.
    struct FlakyStore {
        inner: SqliteStore,
        failing: Mutex<bool>,
        puts_left: Mutex<Option<usize>>,
    }

    impl FlakyStore {
        fn new(failing: bool) -> Self {
            Self {
                inner: SqliteStore::in_memory(),
                failing: Mutex::new(failing),
                puts_left: Mutex::new(None),
            }
        }

        fn fail_after_puts(&self, puts: usize) {
            *self.puts_left.lock().unwrap() = Some(puts);
        }

        fn take_put(&self) -> Result<()> {
            let mut left = self.puts_left.lock().unwrap();
            match *left {
                Some(0) => Err(CookbookError::Storage("quota exceeded".to_string())),
                Some(n) => {
                    *left = Some(n - 1);
                    Ok(())
                }
                None => Ok(()),
            }
        }

        fn set_failing(&self, failing: bool) {
            *self.failing.lock().unwrap() = failing;
        }

        fn check(&self) -> Result<()> {
            if *self.failing.lock().unwrap() {
                Err(CookbookError::Storage("disk on fire".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl RecipeStore for FlakyStore {
        async fn get_all(&self) -> Result<Vec<Recipe>> {
            self.check()?;
            self.inner.get_all().await
        }
        async fn put(&self, recipe: &Recipe) -> Result<()> {
            self.check()?;
            self.take_put()?;
            self.inner.put(recipe).await
        }
        async fn put_many(&self, recipes: &[Recipe]) -> Result<()> {
            for recipe in recipes {
                self.put(recipe).await?;
            }
            Ok(())
        }
        async fn delete(&self, id: &str) -> Result<()> {
            self.check()?;
            self.inner.delete(id).await
        }
        async fn clear(&self) -> Result<()> {
            self.check()?;
            self.inner.clear().await
        }
    }

    fn fields(name: &str) -> RecipeFields {
        RecipeFields {
            name: name.to_string(),
            ..RecipeFields::default()
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    async fn open_memory(dir: &tempfile::TempDir) -> Cookbook<SqliteStore> {
        Cookbook::open(SqliteStore::in_memory(), LocalCache::new(dir.path())).await
    }

    #[tokio::test]
    async fn test_save_new_recipe_updates_store_and_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = open_memory(&dir).await;

        let saved = book.save(None, fields("Soup"), None).await.unwrap();
        assert!(!saved.id.is_empty());
        assert_eq!(book.recipes(), std::slice::from_ref(&saved));
        assert_eq!(book.store.get_all().await.unwrap(), vec![saved.clone()]);
        assert_eq!(book.cache().read_snapshot().unwrap(), vec![saved]);
    }

    #[tokio::test]
    async fn test_new_recipes_go_to_front() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = open_memory(&dir).await;
        book.save(None, fields("First"), None).await.unwrap();
        book.save(None, fields("Second"), None).await.unwrap();
        assert_eq!(book.recipes()[0].name, "Second");
        assert_eq!(book.recipes()[1].name, "First");
    }

    #[tokio::test]
    async fn test_sequential_saves_same_id_replace_and_advance_updated() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = open_memory(&dir).await;

        let first = book.save(None, fields("Soup"), None).await.unwrap();
        let second = book
            .save(Some(&first.id), fields("Better Soup"), None)
            .await
            .unwrap();

        assert_eq!(second.id, first.id);
        assert!(second.updated > first.updated);

        let all = book.store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Better Soup");
        assert_eq!(book.recipes().len(), 1);
    }

    #[tokio::test]
    async fn test_save_with_photo_embeds_compressed_image() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = open_memory(&dir).await;

        let saved = book
            .save(None, fields("Pie"), Some(png_bytes(2000, 1000)))
            .await
            .unwrap();
        let photo = saved.photo.unwrap();
        assert_eq!(photo::data_url_dimensions(&photo).unwrap(), (1200, 600));
    }

    #[tokio::test]
    async fn test_bad_photo_does_not_abort_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = open_memory(&dir).await;

        let saved = book
            .save(None, fields("Pie"), Some(b"garbage".to_vec()))
            .await
            .unwrap();
        assert!(saved.photo.is_none());
        assert_eq!(book.recipes().len(), 1);
    }

    #[tokio::test]
    async fn test_edit_without_photo_keeps_existing_photo() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = open_memory(&dir).await;

        let saved = book
            .save(None, fields("Pie"), Some(png_bytes(10, 10)))
            .await
            .unwrap();
        let edited = book
            .save(Some(&saved.id), fields("Apple Pie"), None)
            .await
            .unwrap();
        assert_eq!(edited.photo, saved.photo);
        assert!(edited.photo.is_some());
    }

    #[tokio::test]
    async fn test_save_clears_draft() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = open_memory(&dir).await;
        book.update_draft(&fields("unsaved"));
        assert_eq!(book.draft().unwrap().name, "unsaved");

        book.save(None, fields("Soup"), None).await.unwrap();
        assert_eq!(book.draft().unwrap(), RecipeFields::default());
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = open_memory(&dir).await;
        let a = book.save(None, fields("A"), None).await.unwrap();
        book.save(None, fields("B"), None).await.unwrap();

        book.delete(&a.id).await.unwrap();
        book.delete(&a.id).await.unwrap();
        assert!(book.get(&a.id).is_none());
        assert!(book.store.get_all().await.unwrap().iter().all(|r| r.id != a.id));

        book.clear().await.unwrap();
        assert!(book.recipes().is_empty());
        assert!(book.store.get_all().await.unwrap().is_empty());
        assert!(book.cache().read_snapshot().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_mirror_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = Cookbook::open(FlakyStore::new(false), LocalCache::new(dir.path())).await;
        let saved = book.save(None, fields("Soup"), None).await.unwrap();

        book.store.set_failing(true);
        let err = book
            .save(Some(&saved.id), fields("Changed"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CookbookError::Storage(_)));
        assert_eq!(book.get(&saved.id).unwrap().name, "Soup");

        assert!(book.delete(&saved.id).await.is_err());
        assert!(book.get(&saved.id).is_some());

        assert!(book.clear().await.is_err());
        assert_eq!(book.recipes().len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_store_falls_back_to_snapshot_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path());
        let snapshot = vec![fields("Cached").into_recipe("c".to_string(), None, 3)];
        cache.mirror_snapshot(&snapshot);

        let mut book = Cookbook::open(FlakyStore::new(true), cache).await;
        assert!(book.is_read_only());
        assert_eq!(book.recipes(), snapshot.as_slice());

        book.store.set_failing(false);
        let err = book.save(None, fields("New"), None).await.unwrap_err();
        assert!(matches!(err, CookbookError::Storage(_)));
        assert!(book.store.get_all().await.unwrap().is_empty());
        assert_eq!(book.cache().read_snapshot().unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_unavailable_store_without_snapshot_is_empty() {
        let mut book = Cookbook::open(FlakyStore::new(true), LocalCache::disabled()).await;
        assert!(book.is_read_only());
        assert!(book.recipes().is_empty());
        assert!(book.import_json("[]").await.is_err());
    }

    #[tokio::test]
    async fn test_import_without_id_generates_one() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = open_memory(&dir).await;

        let count = book.import_json(r#"[{"name":"X"}]"#).await.unwrap();
        assert_eq!(count, 1);
        let all = book.store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].id.is_empty());
        assert_eq!(all[0].name, "X");
        assert_eq!(book.recipes(), all.as_slice());
    }

    #[tokio::test]
    async fn test_import_non_array_leaves_store_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = open_memory(&dir).await;
        book.save(None, fields("Existing"), None).await.unwrap();

        let err = book
            .import_json(r#"{"not":"an array"}"#)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid JSON");
        assert_eq!(book.store.get_all().await.unwrap().len(), 1);
        assert_eq!(book.recipes().len(), 1);
    }

    #[tokio::test]
    async fn test_import_upserts_existing_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = open_memory(&dir).await;
        let saved = book.save(None, fields("Old"), None).await.unwrap();

        let payload = format!(r#"[{{"id":"{}","name":"New"}},{{"name":"Other"}}]"#, saved.id);
        assert_eq!(book.import_json(&payload).await.unwrap(), 2);
        assert_eq!(book.recipes().len(), 2);
        assert_eq!(book.get(&saved.id).unwrap().name, "New");
    }

    #[tokio::test]
    async fn test_import_keeps_older_updated_on_existing_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = open_memory(&dir).await;
        let saved = book.save(None, fields("Fresh"), None).await.unwrap();

        let payload = format!(r#"[{{"id":"{}","name":"Stale","updated":1}}]"#, saved.id);
        book.import_json(&payload).await.unwrap();
        let imported = book.get(&saved.id).unwrap();
        assert_eq!(imported.name, "Stale");
        assert_eq!(imported.updated, 1);

        let edited = book.save(Some(&saved.id), fields("Edited"), None).await.unwrap();
        assert!(edited.updated > 1);
    }

    #[tokio::test]
    async fn test_edit_after_import_with_max_updated_does_not_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = open_memory(&dir).await;
        book.import_json(r#"[{"id":"a","name":"Far future","updated":9223372036854775807}]"#)
            .await
            .unwrap();

        let edited = book.save(Some("a"), fields("Edited"), None).await.unwrap();
        assert_eq!(edited.updated, i64::MAX);
        assert_eq!(book.store.get_all().await.unwrap()[0].updated, i64::MAX);
    }

    #[tokio::test]
    async fn test_import_with_invalid_record_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = open_memory(&dir).await;
        book.save(None, fields("Existing"), None).await.unwrap();

        let err = book
            .import_json(r#"[{"id":"x","name":"Ok"},{"id":"y","photo":"https://nope"}]"#)
            .await
            .unwrap_err();
        assert!(matches!(err, CookbookError::Validation(_)));
        assert_eq!(book.store.get_all().await.unwrap().len(), 1);
        assert_eq!(book.recipes().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_import_resyncs_mirror_with_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = Cookbook::open(FlakyStore::new(false), LocalCache::new(dir.path())).await;
        book.store.fail_after_puts(1);

        let err = book
            .import_json(r#"[{"id":"a","name":"One"},{"id":"b","name":"Two"}]"#)
            .await
            .unwrap_err();
        assert!(matches!(err, CookbookError::Storage(_)));

        let stored = book.store.get_all().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(book.recipes(), stored.as_slice());
        assert_eq!(book.cache().read_snapshot().unwrap(), stored);
    }

    #[tokio::test]
    async fn test_require_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = open_memory(&dir).await;
        let saved = book.save(None, fields("Soup"), None).await.unwrap();

        assert_eq!(book.require(&saved.id).unwrap().name, "Soup");
        let err = book.require("ghost").unwrap_err();
        assert!(matches!(err, CookbookError::NotFound(ref id) if id == "ghost"));
        assert_eq!(err.to_string(), "Recipe 'ghost' not found");
    }

    #[tokio::test]
    async fn test_export_reads_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = open_memory(&dir).await;
        book.save(None, fields("Soup"), None).await.unwrap();

        let text = book.export_json().await.unwrap();
        let parsed: Vec<Recipe> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "Soup");
    }

    #[tokio::test]
    async fn test_view_follows_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = open_memory(&dir).await;
        book.save(
            None,
            RecipeFields {
                section: "desserts".to_string(),
                ..fields("Pie")
            },
            None,
        )
        .await
        .unwrap();
        book.save(None, fields("Soup"), None).await.unwrap();

        book.set_section("desserts");
        let View::Cards(cards) = book.view() else {
            panic!("expected cards");
        };
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].name, "Pie");

        book.set_query("zzz");
        assert!(matches!(book.view(), View::Empty(_)));

        book.set_section("all");
        book.set_query("");
        book.set_sort(SortKey::Name);
        let View::Cards(cards) = book.view() else {
            panic!("expected cards");
        };
        assert_eq!(cards[0].name, "Pie");
        assert_eq!(cards[1].name, "Soup");
    }
}
