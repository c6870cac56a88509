use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Result, bail};

use cookbook_core::models::FieldOverrides;
use cookbook_core::photo::{data_url_dimensions, decode_data_url};
use cookbook_core::selection::{self, SortKey, View};
use cookbook_core::{Cookbook, CookbookError, Recipe, SqliteStore};

use super::helpers::{format_updated, json_error, print_card_table, prompt_confirm, read_photo};

type Book = Cookbook<SqliteStore>;

fn not_found(err: &CookbookError, json: bool) -> ! {
    if json {
        println!("{}", json_error(&err.to_string()));
    } else {
        eprintln!("{err}");
    }
    process::exit(2);
}

pub(crate) fn cmd_list(
    book: &mut Book,
    section: &str,
    search: &str,
    sort: SortKey,
    json: bool,
) -> Result<()> {
    book.set_section(section);
    book.set_query(search);
    book.set_sort(sort);

    if json {
        let items = selection::select(book.recipes(), book.selection());
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    match book.view() {
        View::Empty(placeholder) => println!("{placeholder}"),
        View::Cards(cards) => print_card_table(&cards),
    }
    Ok(())
}

pub(crate) fn cmd_show(
    book: &Book,
    id: &str,
    photo_out: Option<&Path>,
    json: bool,
) -> Result<()> {
    let recipe = match book.require(id) {
        Ok(recipe) => recipe,
        Err(e) => not_found(&e, json),
    };

    if let Some(path) = photo_out {
        let Some(photo) = &recipe.photo else {
            bail!("Recipe '{id}' has no photo");
        };
        std::fs::write(path, decode_data_url(photo)?)?;
        eprintln!("Wrote photo to {}", path.display());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(recipe)?);
        return Ok(());
    }

    print_recipe(recipe);
    Ok(())
}

fn print_recipe(recipe: &Recipe) {
    let name = recipe.display_name();
    let section = &recipe.section;
    let time = if recipe.time.is_empty() {
        "-"
    } else {
        recipe.time.as_str()
    };
    let updated = format_updated(recipe.updated);
    println!("=== {name} ===");
    println!("  Section: {section}  |  Time: {time}  |  Updated: {updated}");

    match recipe.photo.as_deref().map(data_url_dimensions) {
        Some(Ok((w, h))) => println!("  Photo: {w}x{h} JPEG"),
        Some(Err(_)) => println!("  Photo: unreadable"),
        None => {}
    }

    for (title, body) in [
        ("INGREDIENTS", &recipe.ingredients),
        ("INSTRUCTIONS", &recipe.instructions),
        ("NUTRITION", &recipe.nutrition),
    ] {
        if body.trim().is_empty() {
            continue;
        }
        println!("\n  {title}:");
        for line in body.lines() {
            println!("    {line}");
        }
    }
}

fn print_saved(recipe: &Recipe, photo_dropped: bool, json: bool) -> Result<()> {
    if photo_dropped {
        eprintln!("Warning: photo could not be processed; saved without a new photo");
    }
    if json {
        println!("{}", serde_json::to_string_pretty(recipe)?);
    } else {
        let name = recipe.display_name();
        let id = &recipe.id;
        println!("Saved: {name} (id: {id})");
    }
    Ok(())
}

/// Create a recipe. Fields not given on the command line come from the draft.
pub(crate) async fn cmd_add(
    book: &mut Book,
    overrides: FieldOverrides,
    photo: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let base = book.draft().unwrap_or_default();
    let fields = overrides.apply(base);
    let photo_bytes = photo.as_deref().map(read_photo).transpose()?;
    let had_photo = photo_bytes.is_some();

    let recipe = book.save(None, fields, photo_bytes).await?;
    print_saved(&recipe, had_photo && recipe.photo.is_none(), json)
}

/// Replace an existing recipe, starting from its current values.
pub(crate) async fn cmd_edit(
    book: &mut Book,
    id: &str,
    overrides: FieldOverrides,
    photo: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    if overrides.is_empty() && photo.is_none() {
        bail!("Nothing to update. Provide at least one field flag or --photo");
    }
    let existing = match book.require(id) {
        Ok(recipe) => recipe,
        Err(e) => not_found(&e, json),
    };
    let previous_photo = existing.photo.clone();
    let fields = overrides.apply(existing.fields());
    let photo_bytes = photo.as_deref().map(read_photo).transpose()?;
    let had_photo = photo_bytes.is_some();

    let recipe = book.save(Some(id), fields, photo_bytes).await?;
    print_saved(&recipe, had_photo && recipe.photo == previous_photo, json)
}

pub(crate) async fn cmd_delete(book: &mut Book, id: &str, yes: bool, json: bool) -> Result<()> {
    if let Err(e) = book.require(id) {
        not_found(&e, json);
    }
    if !yes && !prompt_confirm("Delete this recipe? This cannot be undone.")? {
        eprintln!("Cancelled");
        return Ok(());
    }
    book.delete(id).await?;
    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Recipe deleted");
    }
    Ok(())
}

pub(crate) async fn cmd_clear(book: &mut Book, yes: bool, json: bool) -> Result<()> {
    if !yes && !prompt_confirm("Clear all recipes? This will delete everything locally.")? {
        eprintln!("Cancelled");
        return Ok(());
    }
    let count = book.recipes().len();
    book.clear().await?;
    if json {
        println!("{}", serde_json::json!({ "cleared": count }));
    } else {
        println!("Cleared");
    }
    Ok(())
}
