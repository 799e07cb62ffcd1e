use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use intake_core::db::Database;
use intake_core::models::{NewFoodRecord, validate_food_name};
use intake_core::nutrients::NUTRIENT_COLUMNS;

use super::helpers::{parse_nutrient_assignments, print_food_table, resolve_library};

fn build_record(library_id: i64, name: &str, set: &[String]) -> Result<NewFoodRecord> {
    let name = validate_food_name(name)?;
    let mut food = NewFoodRecord::new(library_id, name);
    for (column, value) in parse_nutrient_assignments(set)? {
        food = food.with(column, value);
    }
    Ok(food)
}

pub(crate) fn cmd_food_add(
    db: &Database,
    name: &str,
    library: Option<&str>,
    set: &[String],
    json: bool,
) -> Result<()> {
    let library = resolve_library(db, library)?;
    let food = db.insert_food(&build_record(library.id, name, set)?)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&food)?);
    } else {
        println!("Added [{}] {} to {}", food.id, food.name, library.name);
    }
    Ok(())
}

pub(crate) fn cmd_food_list(
    db: &Database,
    library: Option<&str>,
    search: Option<&str>,
    json: bool,
) -> Result<()> {
    let library = resolve_library(db, library)?;
    let foods = match search {
        Some(query) => db.search_foods(library.id, query)?,
        None => db.list_foods(library.id)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&foods)?);
        return Ok(());
    }

    if foods.is_empty() {
        eprintln!("No foods in library {}", library.name);
        std::process::exit(2);
    }
    print_food_table(&foods);
    Ok(())
}

pub(crate) fn cmd_food_show(db: &Database, food_id: i64, json: bool) -> Result<()> {
    let food = db.get_food_by_id(food_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&food)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct NutrientRow {
        #[tabled(rename = "Nutrient")]
        nutrient: &'static str,
        #[tabled(rename = "Per 100g")]
        value: String,
        #[tabled(rename = "Unit")]
        unit: &'static str,
    }

    println!("[{}] {}\n", food.id, food.name);
    let rows: Vec<NutrientRow> = NUTRIENT_COLUMNS
        .iter()
        .map(|n| NutrientRow {
            nutrient: n.label,
            value: food
                .nutrient(n.column)
                .map_or("-".into(), |v| format!("{v:.2}")),
            unit: n.unit,
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..2)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_food_update(
    db: &Database,
    food_id: i64,
    name: &str,
    set: &[String],
    json: bool,
) -> Result<()> {
    let existing = db.get_food_by_id(food_id)?;
    let food = db.update_food(food_id, &build_record(existing.library_id, name, set)?)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&food)?);
    } else {
        println!("Replaced [{}] {}", food.id, food.name);
    }
    Ok(())
}

pub(crate) fn cmd_food_delete(db: &Database, food_id: i64, json: bool) -> Result<()> {
    let deleted = db.delete_food(food_id)?;

    if json {
        println!("{}", serde_json::json!({ "deleted": deleted, "id": food_id }));
    } else if deleted {
        println!("Deleted food [{food_id}] and its log entries");
    } else {
        eprintln!("Food [{food_id}] not found");
    }
    Ok(())
}
