use serde_json::Value;

use crate::error::{CookbookError, Result};
use crate::models::{Recipe, new_recipe_id, validate_recipe};

/// Default file name for `export`.
pub const EXPORT_FILE_NAME: &str = "cookbook-recipes.json";
/// Default file name for `backup`.
pub const BACKUP_FILE_NAME: &str = "cookbook-backup.json";

/// Notice shown when the payload parses but is not an array of records.
pub const INVALID_JSON_NOTICE: &str = "Invalid JSON";

/// Serialize records as an indented JSON array.
pub fn export_records(recipes: &[Recipe]) -> Result<String> {
    serde_json::to_string_pretty(recipes)
        .map_err(|e| CookbookError::Decode(format!("Could not serialize backup: {e}")))
}

/// Parse an import payload into records ready to upsert.
///
/// Records without an `id` get a fresh one; every other missing field takes its
/// default. Records keep the `updated` value they were exported with.
pub fn parse_import(text: &str) -> Result<Vec<Recipe>> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| CookbookError::Decode(format!("Import failed: {e}")))?;

    let Value::Array(items) = value else {
        return Err(CookbookError::Validation(INVALID_JSON_NOTICE.to_string()));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            let mut recipe: Recipe = serde_json::from_value(item).map_err(|e| {
                CookbookError::Decode(format!("Import failed: record {}: {e}", idx + 1))
            })?;
            if recipe.id.trim().is_empty() {
                recipe.id = new_recipe_id();
            }
            validate_recipe(&recipe)?;
            Ok(recipe)
        })
        .collect()
}
