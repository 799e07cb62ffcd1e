use anyhow::{Result, bail};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use intake_core::db::Database;
use intake_core::models::IntakeQuery;

use super::helpers::{parse_date_range, resolve_library};

pub(crate) fn cmd_intake(
    db: &Database,
    subject: &str,
    from: Option<String>,
    to: Option<String>,
    library: Option<&str>,
    json: bool,
) -> Result<()> {
    let (start, end) = parse_date_range(from, to)?;
    let library = resolve_library(db, library)?;
    let query = IntakeQuery {
        subject: subject.trim().to_string(),
        start,
        end,
        library_id: library.id,
    };

    let totals = db.intake_totals(&query)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&totals)?);
        return Ok(());
    }

    if totals.entry_count == 0 {
        eprintln!("No entries for {subject} between {start} and {end}");
        std::process::exit(2);
    }

    println!(
        "=== {subject} — {start} to {end} ({} entries, library: {}) ===\n",
        totals.entry_count, library.name
    );

    #[derive(Tabled)]
    struct TotalRow {
        #[tabled(rename = "Nutrient")]
        nutrient: &'static str,
        #[tabled(rename = "Total")]
        value: String,
        #[tabled(rename = "Unit")]
        unit: &'static str,
    }

    let rows: Vec<TotalRow> = totals
        .totals
        .iter()
        .map(|t| TotalRow {
            nutrient: t.label,
            value: format!("{:.2}", t.value),
            unit: t.unit,
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..2)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    if totals.unresolved_entries > 0 {
        eprintln!(
            "Warning: {} entries reference a food with no composition row in {} and were skipped",
            totals.unresolved_entries, library.name
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_breakdown(
    db: &Database,
    subject: &str,
    nutrient: &str,
    by: &str,
    from: Option<String>,
    to: Option<String>,
    library: Option<&str>,
    json: bool,
) -> Result<()> {
    let (start, end) = parse_date_range(from, to)?;
    let library = resolve_library(db, library)?;
    let query = IntakeQuery {
        subject: subject.trim().to_string(),
        start,
        end,
        library_id: library.id,
    };

    let rows: Vec<(String, f64)> = match by {
        "day" => db
            .daily_breakdown(nutrient, &[query.subject.clone()], start, end, library.id)?
            .into_iter()
            .map(|d| (d.date, d.value))
            .collect(),
        "food" => db
            .food_breakdown(nutrient, &query)?
            .into_iter()
            .map(|c| (c.label, c.value))
            .collect(),
        "meal" => db
            .meal_breakdown(nutrient, &query)?
            .into_iter()
            .map(|c| (c.label, c.value))
            .collect(),
        other => bail!("Unknown grouping '{other}'. Use day, food, or meal"),
    };

    if json {
        let objects: Vec<_> = rows
            .iter()
            .map(|(label, value)| serde_json::json!({ "label": label, "value": value }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&objects)?);
        return Ok(());
    }

    if rows.is_empty() {
        eprintln!("No entries for {subject} between {start} and {end}");
        std::process::exit(2);
    }

    #[derive(Tabled)]
    struct BreakdownRow {
        #[tabled(rename = "Group")]
        label: String,
        #[tabled(rename = "Total")]
        value: String,
    }

    let table_rows: Vec<BreakdownRow> = rows
        .into_iter()
        .map(|(label, value)| BreakdownRow {
            label,
            value: format!("{value:.2}"),
        })
        .collect();

    println!("=== {subject} — {nutrient} by {by} ===\n");
    let table = Table::new(&table_rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}
