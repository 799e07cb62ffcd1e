use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use intake_core::db::Database;
use intake_core::models::{FoodRecord, Library};
use intake_core::nutrients::validate_nutrient;

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday")),
        },
    }
}

/// Resolve `--from`/`--to` into an inclusive range, both defaulting to today.
pub(crate) fn parse_date_range(
    from: Option<String>,
    to: Option<String>,
) -> Result<(NaiveDate, NaiveDate)> {
    let start = parse_date(from)?;
    let end = parse_date(to)?;
    if end < start {
        bail!("End date {end} is before start date {start}");
    }
    Ok((start, end))
}

/// Resolve a `--library` argument: a numeric string is an id, anything else
/// a name; absent means the default library.
pub(crate) fn resolve_library(db: &Database, spec: Option<&str>) -> Result<Library> {
    match spec {
        None => db.get_library(intake_core::models::DEFAULT_LIBRARY_ID),
        Some(s) => {
            if let Ok(id) = s.trim().parse::<i64>() {
                db.get_library(id)
            } else {
                db.find_library_by_name(s)?
                    .with_context(|| format!("Library '{s}' not found"))
            }
        }
    }
}

/// Parse repeated `--set COLUMN=VALUE` pairs against the nutrient registry.
pub(crate) fn parse_nutrient_assignments(pairs: &[String]) -> Result<Vec<(&'static str, f64)>> {
    let mut assignments = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let (column, value) = pair
            .split_once('=')
            .with_context(|| format!("Invalid assignment '{pair}'. Use COLUMN=VALUE"))?;
        let nutrient = validate_nutrient(column)?;
        let value: f64 = value
            .trim()
            .parse()
            .with_context(|| format!("Invalid value in '{pair}'"))?;
        assignments.push((nutrient.column, value));
    }
    Ok(assignments)
}

pub(crate) fn print_food_table(foods: &[FoodRecord]) {
    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "kcal/100g")]
        energy: String,
        #[tabled(rename = "P/100g")]
        protein: String,
        #[tabled(rename = "C/100g")]
        carbs: String,
        #[tabled(rename = "F/100g")]
        fat: String,
    }

    let fmt = |v: Option<f64>| v.map_or("-".into(), |v| format!("{v:.1}"));
    let rows: Vec<FoodRow> = foods
        .iter()
        .map(|f| FoodRow {
            id: f.id,
            name: truncate(&f.name, 40),
            energy: fmt(f.nutrient("energy_kcal")),
            protein: fmt(f.nutrient("protein_g")),
            carbs: fmt(f.nutrient("carbohydrates_g")),
            fat: fmt(f.nutrient("fat_g")),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_none_is_today() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(None).unwrap(), today);
    }

    #[test]
    fn test_parse_date_keywords() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(Some("today".to_string())).unwrap(), today);
        assert_eq!(
            parse_date(Some("yesterday".to_string())).unwrap(),
            today - chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_parse_date_iso() {
        let date = parse_date(Some("2024-01-15".to_string())).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date(Some("nope".to_string())).is_err());
    }

    #[test]
    fn test_parse_date_range_order() {
        let range = parse_date_range(
            Some("2024-01-01".to_string()),
            Some("2024-01-31".to_string()),
        )
        .unwrap();
        assert!(range.0 < range.1);
        assert!(
            parse_date_range(Some("2024-02-01".to_string()), Some("2024-01-01".to_string()))
                .is_err()
        );
    }

    #[test]
    fn test_parse_nutrient_assignments() {
        let pairs = vec!["energy_kcal=370".to_string(), "protein_g=13.5".to_string()];
        let parsed = parse_nutrient_assignments(&pairs).unwrap();
        assert_eq!(parsed[0], ("energy_kcal", 370.0));
        assert_eq!(parsed[1], ("protein_g", 13.5));
    }

    #[test]
    fn test_parse_nutrient_assignments_rejects_unknown() {
        assert!(parse_nutrient_assignments(&["bogus=1".to_string()]).is_err());
        assert!(parse_nutrient_assignments(&["energy_kcal".to_string()]).is_err());
        assert!(parse_nutrient_assignments(&["energy_kcal=abc".to_string()]).is_err());
    }

    #[test]
    fn test_resolve_library_by_id_name_and_default() {
        let db = Database::open_in_memory().unwrap();
        let lib = db.create_library("Fineli").unwrap();
        let id = lib.id.to_string();
        assert_eq!(resolve_library(&db, None).unwrap().id, 1);
        assert_eq!(resolve_library(&db, Some(id.as_str())).unwrap().id, lib.id);
        assert_eq!(resolve_library(&db, Some("fineli")).unwrap().id, lib.id);
        assert!(resolve_library(&db, Some("missing")).is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
    }
}
