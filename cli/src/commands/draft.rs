use anyhow::Result;

use cookbook_core::models::FieldOverrides;
use cookbook_core::{Cookbook, RecipeFields, SqliteStore};

fn print_draft(fields: &RecipeFields, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(fields)?);
        return Ok(());
    }
    for (label, value) in [
        ("Name", &fields.name),
        ("Time", &fields.time),
        ("Section", &fields.section),
        ("Ingredients", &fields.ingredients),
        ("Instructions", &fields.instructions),
        ("Nutrition", &fields.nutrition),
    ] {
        println!("{label:>12}: {value}");
    }
    Ok(())
}

pub(crate) fn cmd_draft_show(book: &Cookbook<SqliteStore>, json: bool) -> Result<()> {
    match book.draft() {
        Some(fields) => print_draft(&fields, json),
        None => {
            if json {
                println!("null");
            } else {
                eprintln!("No draft saved");
            }
            Ok(())
        }
    }
}

/// Merge the given fields into the draft. Storage problems are ignored.
pub(crate) fn cmd_draft_set(
    book: &Cookbook<SqliteStore>,
    overrides: FieldOverrides,
    json: bool,
) -> Result<()> {
    let fields = overrides.apply(book.draft().unwrap_or_default());
    book.update_draft(&fields);
    print_draft(&fields, json)
}

pub(crate) fn cmd_draft_clear(book: &Cookbook<SqliteStore>, json: bool) -> Result<()> {
    book.clear_draft();
    if json {
        println!("{}", serde_json::json!({ "cleared": true }));
    } else {
        println!("Draft cleared");
    }
    Ok(())
}
