use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CookbookError, Result};

/// Section value that acts as the wildcard filter. Records saved without a
/// section carry it too.
pub const ALL_SECTIONS: &str = "all";

/// Display name for records saved without one.
pub const UNTITLED: &str = "Untitled";

/// One recipe, in the shape persisted to the store and written to backups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub time: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ingredients: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub instructions: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub nutrition: String,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default = "default_section", deserialize_with = "section_or_default")]
    pub section: String,
    /// Milliseconds since the Unix epoch of the last write.
    #[serde(default)]
    pub updated: i64,
}

impl Recipe {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            UNTITLED
        } else {
            &self.name
        }
    }

    pub fn fields(&self) -> RecipeFields {
        RecipeFields {
            name: self.name.clone(),
            time: self.time.clone(),
            ingredients: self.ingredients.clone(),
            instructions: self.instructions.clone(),
            nutrition: self.nutrition.clone(),
            section: self.section.clone(),
        }
    }
}

/// The editable text fields of a recipe. Doubles as the draft snapshot, which
/// never carries `id`, `photo` or `updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeFields {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub time: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ingredients: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub instructions: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub nutrition: String,
    #[serde(default = "default_section", deserialize_with = "section_or_default")]
    pub section: String,
}

impl Default for RecipeFields {
    fn default() -> Self {
        Self {
            name: String::new(),
            time: String::new(),
            ingredients: String::new(),
            instructions: String::new(),
            nutrition: String::new(),
            section: default_section(),
        }
    }
}

impl RecipeFields {
    /// Build the full record written to the store.
    pub fn into_recipe(self, id: String, photo: Option<String>, updated: i64) -> Recipe {
        Recipe {
            id,
            name: self.name,
            time: self.time,
            ingredients: self.ingredients,
            instructions: self.instructions,
            nutrition: self.nutrition,
            photo,
            section: normalize_section(&self.section),
            updated,
        }
    }
}

/// Partial field overrides, e.g. from command line flags. `None` keeps the
/// base value.
#[derive(Debug, Clone, Default)]
pub struct FieldOverrides {
    pub name: Option<String>,
    pub time: Option<String>,
    pub ingredients: Option<String>,
    pub instructions: Option<String>,
    pub nutrition: Option<String>,
    pub section: Option<String>,
}

impl FieldOverrides {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.time.is_none()
            && self.ingredients.is_none()
            && self.instructions.is_none()
            && self.nutrition.is_none()
            && self.section.is_none()
    }

    #[must_use]
    pub fn apply(self, mut base: RecipeFields) -> RecipeFields {
        if let Some(v) = self.name {
            base.name = v;
        }
        if let Some(v) = self.time {
            base.time = v;
        }
        if let Some(v) = self.ingredients {
            base.ingredients = v;
        }
        if let Some(v) = self.instructions {
            base.instructions = v;
        }
        if let Some(v) = self.nutrition {
            base.nutrition = v;
        }
        if let Some(v) = self.section {
            base.section = normalize_section(&v);
        }
        base
    }
}

fn default_section() -> String {
    ALL_SECTIONS.to_string()
}

/// Blank sections collapse to the wildcard tag.
pub fn normalize_section(section: &str) -> String {
    let trimmed = section.trim();
    if trimmed.is_empty() {
        default_section()
    } else {
        trimmed.to_string()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn section_or_default<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().map_or_else(default_section, normalize_section))
}

/// Fresh opaque record identifier.
pub fn new_recipe_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Check a record is fit to be written to the store.
pub fn validate_recipe(recipe: &Recipe) -> Result<()> {
    if recipe.id.trim().is_empty() {
        return Err(CookbookError::Validation(
            "Recipe id must not be empty".to_string(),
        ));
    }
    if let Some(photo) = &recipe.photo {
        if !photo.starts_with("data:") {
            return Err(CookbookError::Validation(format!(
                "Photo for recipe '{}' must be an embedded data URL",
                recipe.id
            )));
        }
    }
    Ok(())
}
