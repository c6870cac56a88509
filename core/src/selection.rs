use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::models::{ALL_SECTIONS, Recipe};

/// Placeholder shown in place of an empty card list.
pub const EMPTY_PLACEHOLDER: &str = "No recipes yet. Add one with `cookbook add`.";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SectionFilter {
    #[default]
    All,
    Only(String),
}

impl SectionFilter {
    pub fn parse(section: &str) -> Self {
        if section == ALL_SECTIONS || section.is_empty() {
            Self::All
        } else {
            Self::Only(section.to_string())
        }
    }

    pub fn matches(&self, recipe: &Recipe) -> bool {
        match self {
            Self::All => true,
            Self::Only(section) => recipe.section == *section,
        }
    }
}

impl fmt::Display for SectionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(ALL_SECTIONS),
            Self::Only(section) => f.write_str(section),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Most recently written first.
    #[default]
    Updated,
    /// Ascending by name.
    Name,
}

impl FromStr for SortKey {
    type Err = std::convert::Infallible;

    /// Anything other than `name` selects the default ordering.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s.eq_ignore_ascii_case("name") {
            Self::Name
        } else {
            Self::Updated
        })
    }
}

/// Current filter, search and sort choices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub section: SectionFilter,
    pub query: String,
    pub sort: SortKey,
}

impl Selection {
    pub fn new(section: &str, query: &str, sort: SortKey) -> Self {
        Self {
            section: SectionFilter::parse(section),
            query: query.to_string(),
            sort,
        }
    }
}

/// Comparison and search key for a name: NFKD with combining marks dropped,
/// then Unicode lowercase. `Éclair` and `Eclair` fold to the same key.
pub fn fold_name(name: &str) -> String {
    name.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Name ordering used for `SortKey::Name`: folded names first, then the
/// NFC-normalized text. Canonically equivalent names compare equal.
pub fn collate(a: &str, b: &str) -> Ordering {
    fold_name(a)
        .cmp(&fold_name(b))
        .then_with(|| a.nfc().cmp(b.nfc()))
}

/// Filter and sort `recipes`. Recomputed from scratch on every call; ties keep
/// their input order.
pub fn select<'a>(recipes: &'a [Recipe], selection: &Selection) -> Vec<&'a Recipe> {
    let query = fold_name(&selection.query);
    let mut items: Vec<&Recipe> = recipes
        .iter()
        .filter(|r| selection.section.matches(r))
        .filter(|r| query.is_empty() || fold_name(&r.name).contains(&query))
        .collect();

    match selection.sort {
        SortKey::Name => {
            items.sort_by_cached_key(|r| (fold_name(&r.name), r.name.nfc().collect::<String>()));
        }
        SortKey::Updated => items.sort_by(|a, b| b.updated.cmp(&a.updated)),
    }
    items
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub section: &'a str,
    pub photo: Option<&'a str>,
    pub updated: i64,
}

impl<'a> From<&'a Recipe> for Card<'a> {
    fn from(recipe: &'a Recipe) -> Self {
        Card {
            id: &recipe.id,
            name: recipe.display_name(),
            section: &recipe.section,
            photo: recipe.photo.as_deref(),
            updated: recipe.updated,
        }
    }
}

/// What the list shows: cards, or a single placeholder message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View<'a> {
    Cards(Vec<Card<'a>>),
    Empty(&'static str),
}

pub fn render<'a>(recipes: &'a [Recipe], selection: &Selection) -> View<'a> {
    let items = select(recipes, selection);
    if items.is_empty() {
        View::Empty(EMPTY_PLACEHOLDER)
    } else {
        View::Cards(items.into_iter().map(Card::from).collect())
    }
}
