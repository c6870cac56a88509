use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::Path;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use cookbook_core::selection::Card;

pub(crate) fn prompt_confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N]: ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let Some(line) = stdin.lock().lines().next() else {
        return Ok(false);
    };
    Ok(is_yes(&line?))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

pub(crate) fn read_photo(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read photo: {}", path.display()))
}

/// Write `text` to `path`, or to stdout when the path is `-`.
pub(crate) fn write_output(path: &Path, text: &str) -> Result<bool> {
    if path.as_os_str() == "-" {
        println!("{text}");
        return Ok(false);
    }
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

pub(crate) fn format_updated(updated_ms: i64) -> String {
    if updated_ms <= 0 {
        return "-".to_string();
    }
    DateTime::from_timestamp_millis(updated_ms).map_or_else(
        || "-".to_string(),
        |dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
    )
}

pub(crate) fn print_card_table(cards: &[Card<'_>]) {
    #[derive(Tabled)]
    struct CardRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Section")]
        section: String,
        #[tabled(rename = "Photo")]
        photo: String,
        #[tabled(rename = "Updated")]
        updated: String,
    }

    let rows: Vec<CardRow> = cards
        .iter()
        .enumerate()
        .map(|(i, c)| CardRow {
            idx: i + 1,
            id: c.id.to_string(),
            name: truncate(c.name, 35),
            section: truncate(c.section, 15),
            photo: if c.photo.is_some() { "yes" } else { "-" }.to_string(),
            updated: format_updated(c.updated),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(0)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
