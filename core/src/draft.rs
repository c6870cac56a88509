//! Single-slot autosave of the "new recipe" form.
//!
//! There is exactly one draft, stored under a fixed name rather than per
//! record: it models one in-progress form at a time. Edits of existing records
//! never read it.

use crate::local_cache::LocalCache;
use crate::models::RecipeFields;

pub const DRAFT_SLOT: &str = "cookbook_draft";

/// Overwrite the draft with the current field values. Never fails.
pub fn save_draft(cache: &LocalCache, fields: &RecipeFields) {
    cache.set_json(DRAFT_SLOT, fields);
}

/// The saved draft, if one exists and parses.
pub fn load_draft(cache: &LocalCache) -> Option<RecipeFields> {
    cache.get_json(DRAFT_SLOT)
}

/// Reset the draft to empty values, as after a successful save.
pub fn clear_draft(cache: &LocalCache) {
    save_draft(cache, &RecipeFields::default());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> RecipeFields {
        RecipeFields {
            name: "Half-written soup".to_string(),
            time: "15 min".to_string(),
            ingredients: "leeks".to_string(),
            instructions: String::new(),
            nutrition: String::new(),
            section: "soups".to_string(),
        }
    }

    #[test]
    fn test_save_and_load_draft() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path());
        assert!(load_draft(&cache).is_none());

        save_draft(&cache, &sample_fields());
        assert_eq!(load_draft(&cache).unwrap(), sample_fields());
    }

    #[test]
    fn test_clear_draft_overwrites_with_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path());
        save_draft(&cache, &sample_fields());

        clear_draft(&cache);
        assert_eq!(load_draft(&cache).unwrap(), RecipeFields::default());
    }

    #[test]
    fn test_malformed_draft_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path());
        cache.set(DRAFT_SLOT, "[1, 2");
        assert!(load_draft(&cache).is_none());
    }

    #[test]
    fn test_partial_draft_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path());
        cache.set(DRAFT_SLOT, r#"{"name":"Pie"}"#);
        let draft = load_draft(&cache).unwrap();
        assert_eq!(draft.name, "Pie");
        assert_eq!(draft.section, "all");
    }

    #[test]
    fn test_save_draft_without_storage_is_silent() {
        let cache = LocalCache::disabled();
        save_draft(&cache, &sample_fields());
        assert!(load_draft(&cache).is_none());
    }
}
