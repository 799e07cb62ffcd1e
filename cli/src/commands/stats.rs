use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use intake_core::db::Database;
use intake_core::models::parse_subjects;
use intake_core::nutrients::validate_nutrient;
use intake_core::stats::{describe, subject_daily_averages};

use super::helpers::{parse_date_range, resolve_library};

pub(crate) fn cmd_stats(
    db: &Database,
    subjects: &str,
    nutrient: &str,
    from: Option<String>,
    to: Option<String>,
    library: Option<&str>,
    json: bool,
) -> Result<()> {
    let subjects = parse_subjects(subjects)?;
    let nutrient = validate_nutrient(nutrient)?;
    let (start, end) = parse_date_range(from, to)?;
    let library = resolve_library(db, library)?;

    let breakdown = db.daily_breakdown(nutrient.column, &subjects, start, end, library.id)?;
    let averages = subject_daily_averages(&breakdown);
    let values: Vec<f64> = averages.iter().map(|a| a.average).collect();
    let descriptives = describe(&values)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "nutrient": nutrient.column,
                "unit": nutrient.unit,
                "subject_averages": averages,
                "statistics": descriptives,
            })
        );
        return Ok(());
    }

    println!(
        "=== {} per day, {start} to {end} (library: {}) ===\n",
        nutrient.label, library.name
    );

    #[derive(Tabled)]
    struct AverageRow {
        #[tabled(rename = "Subject")]
        subject: String,
        #[tabled(rename = "Days")]
        days: usize,
        #[tabled(rename = "Daily avg")]
        average: String,
    }

    let rows: Vec<AverageRow> = averages
        .iter()
        .map(|a| AverageRow {
            subject: a.subject.clone(),
            days: a.days,
            average: format!("{:.2}", a.average),
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}\n");

    let unit = nutrient.unit;
    println!("  n:        {}", descriptives.count);
    println!("  mean:     {:.2} {unit}", descriptives.mean);
    println!("  median:   {:.2} {unit}", descriptives.median);
    println!("  std dev:  {:.2} {unit}", descriptives.std_dev);
    println!("  variance: {:.2}", descriptives.variance);
    println!("  min:      {:.2} {unit}", descriptives.min);
    println!("  max:      {:.2} {unit}", descriptives.max);
    println!("  q1:       {:.2} {unit}", descriptives.q1);
    println!("  q3:       {:.2} {unit}", descriptives.q3);
    Ok(())
}
