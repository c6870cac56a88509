use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};

use cookbook_core::{Cookbook, CookbookError, SqliteStore};

use super::helpers::{json_error, write_output};

pub(crate) async fn cmd_export(
    book: &Cookbook<SqliteStore>,
    output: Option<PathBuf>,
    default_name: &str,
) -> Result<()> {
    let text = book.export_json().await?;
    let path = output.unwrap_or_else(|| PathBuf::from(default_name));
    if write_output(&path, &text)? {
        let count = book.recipes().len();
        eprintln!("Exported {count} recipes to {}", path.display());
    }
    Ok(())
}

pub(crate) async fn cmd_import(
    book: &mut Cookbook<SqliteStore>,
    file: &Path,
    json: bool,
) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;

    match book.import_json(&text).await {
        Ok(count) => {
            if json {
                println!("{}", serde_json::json!({ "imported": count }));
            } else {
                println!("Imported {count} recipes");
            }
            Ok(())
        }
        Err(e @ (CookbookError::Validation(_) | CookbookError::Decode(_))) => {
            if json {
                println!("{}", json_error(&e.to_string()));
            } else {
                eprintln!("{e}");
            }
            process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}
