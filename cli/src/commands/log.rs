use anyhow::{Context, Result};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use intake_core::db::Database;
use intake_core::models::NewLogEntry;

use super::helpers::{parse_date, parse_date_range, resolve_library, truncate};

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_log_add(
    db: &Database,
    subject: &str,
    food: &str,
    grams: f64,
    library: Option<&str>,
    date: Option<String>,
    meal: Option<String>,
    json: bool,
) -> Result<()> {
    let library = resolve_library(db, library)?;
    let date = parse_date(date)?;

    let food = if let Ok(id) = food.trim().parse::<i64>() {
        db.get_food_by_id(id)?
    } else {
        db.find_food_by_name(library.id, food)?
            .with_context(|| format!("Food '{food}' not found in library '{}'", library.name))?
    };

    let entry = db.insert_log_entry(&NewLogEntry {
        subject: subject.trim().to_string(),
        date,
        meal: meal.map(|m| m.trim().to_string()).filter(|m| !m.is_empty()),
        food_id: food.id,
        library_id: library.id,
        grams,
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!(
            "Logged [{}] {} — {:.0} g of {} on {}",
            entry.id, entry.subject, entry.grams, food.name, entry.date
        );
    }
    Ok(())
}

pub(crate) fn cmd_log_list(
    db: &Database,
    subject: &str,
    from: Option<String>,
    to: Option<String>,
    library: Option<&str>,
    json: bool,
) -> Result<()> {
    let (start, end) = parse_date_range(from, to)?;
    let library_id = match library {
        Some(spec) => Some(resolve_library(db, Some(spec))?.id),
        None => None,
    };
    let entries = db.list_log_entries(subject, start, end, library_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        eprintln!("No entries for {subject} between {start} and {end}");
        std::process::exit(2);
    }

    #[derive(Tabled)]
    struct EntryRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Meal")]
        meal: String,
        #[tabled(rename = "Food")]
        food: String,
        #[tabled(rename = "Library")]
        library: String,
        #[tabled(rename = "Grams")]
        grams: String,
    }

    let rows: Vec<EntryRow> = entries
        .iter()
        .map(|e| EntryRow {
            id: e.id,
            date: e.date.clone(),
            meal: e.meal.clone().unwrap_or_default(),
            food: truncate(e.food_name.as_deref().unwrap_or("?"), 35),
            library: e.library_name.clone().unwrap_or_default(),
            grams: format!("{:.0}", e.grams),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(5..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_log_update(db: &Database, entry_id: i64, grams: f64, json: bool) -> Result<()> {
    let entry = db.update_log_entry_grams(entry_id, grams)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!("Updated [{}] to {:.0} g", entry.id, entry.grams);
    }
    Ok(())
}

pub(crate) fn cmd_log_delete(db: &Database, entry_id: i64, json: bool) -> Result<()> {
    let deleted = db.delete_log_entry(entry_id)?;

    if json {
        println!("{}", serde_json::json!({ "deleted": deleted, "id": entry_id }));
    } else if deleted {
        println!("Deleted entry [{entry_id}]");
    } else {
        eprintln!("Entry [{entry_id}] not found");
    }
    Ok(())
}
