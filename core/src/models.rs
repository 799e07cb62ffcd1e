use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::Serialize;

use crate::nutrients::{NUTRIENT_COLUMNS, nutrient_index};

/// The library every database starts with. It cannot be deleted.
pub const DEFAULT_LIBRARY_ID: i64 = 1;
pub const DEFAULT_LIBRARY_NAME: &str = "Default";

/// Group label for log entries without a meal category.
pub const UNSPECIFIED_MEAL: &str = "unspecified";

/// A named partition of the food-composition catalog.
#[derive(Debug, Clone, Serialize)]
pub struct Library {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

/// One food's nutrient composition, scoped to a library.
///
/// `values` holds the per-100g composition values in
/// [`NUTRIENT_COLUMNS`](crate::nutrients::NUTRIENT_COLUMNS) order; a None
/// cell means the source had no value for that column.
#[derive(Debug, Clone, Serialize)]
pub struct FoodRecord {
    pub id: i64,
    pub library_id: i64,
    pub name: String,
    pub values: Vec<Option<f64>>,
    pub created_at: String,
}

impl FoodRecord {
    /// Composition value for a nutrient column, if present.
    #[must_use]
    pub fn nutrient(&self, column: &str) -> Option<f64> {
        nutrient_index(column).and_then(|i| self.values.get(i).copied().flatten())
    }
}

#[derive(Debug, Clone)]
pub struct NewFoodRecord {
    pub library_id: i64,
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl NewFoodRecord {
    #[must_use]
    pub fn new(library_id: i64, name: impl Into<String>) -> Self {
        Self {
            library_id,
            name: name.into(),
            values: vec![None; NUTRIENT_COLUMNS.len()],
        }
    }

    /// Set one nutrient value by column name. Unknown columns are ignored.
    #[must_use]
    pub fn with(mut self, column: &str, value: f64) -> Self {
        if let Some(i) = nutrient_index(column) {
            self.values[i] = Some(value);
        }
        self
    }
}

/// One dated, quantified consumption event for a subject.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub id: i64,
    pub subject: String,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal: Option<String>,
    pub food_id: i64,
    pub library_id: i64,
    pub grams: f64,
    pub created_at: String,
    // Joined fields for display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub food_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub subject: String,
    pub date: NaiveDate,
    pub meal: Option<String>,
    pub food_id: i64,
    pub library_id: i64,
    pub grams: f64,
}

/// Filter for the aggregation queries: one subject, an inclusive date
/// range, and the library the composition values are read from.
#[derive(Debug, Clone)]
pub struct IntakeQuery {
    pub subject: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub library_id: i64,
}

/// Scaled sum for one nutrient column.
#[derive(Debug, Clone, Serialize)]
pub struct NutrientTotal {
    pub column: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    pub value: f64,
}

/// Result of the total-intake contract: one entry per nutrient column, in
/// registry order, plus how many log entries matched and how many of those
/// could not be joined to a composition row.
#[derive(Debug, Clone, Serialize)]
pub struct IntakeTotals {
    pub totals: Vec<NutrientTotal>,
    pub entry_count: i64,
    pub unresolved_entries: i64,
}

/// One (subject, date) sub-total from the per-day breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct DailyIntake {
    pub subject: String,
    pub date: String,
    pub value: f64,
}

/// One row of a by-food or by-meal contribution breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct ContributionRow {
    pub label: String,
    pub value: f64,
}

pub fn validate_grams(grams: f64) -> Result<()> {
    if !grams.is_finite() || grams <= 0.0 {
        bail!("grams must be greater than 0");
    }
    Ok(())
}

pub fn validate_library_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        bail!("Library name must not be empty");
    }
    Ok(trimmed.to_string())
}

pub fn validate_food_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        bail!("Food name must not be empty");
    }
    Ok(trimmed.to_string())
}

/// Split a comma-separated subject list, trimming each entry and dropping
/// empties. Bails when nothing remains.
pub fn parse_subjects(input: &str) -> Result<Vec<String>> {
    let subjects: Vec<String> = input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect();
    if subjects.is_empty() {
        bail!("No subjects given");
    }
    Ok(subjects)
}

/// Normalize a meal category for grouping: lowercased, with empty or
/// missing categories folded into [`UNSPECIFIED_MEAL`].
#[must_use]
pub fn meal_group_label(meal: Option<&str>) -> String {
    match meal.map(str::trim) {
        Some(m) if !m.is_empty() => m.to_lowercase(),
        _ => UNSPECIFIED_MEAL.to_string(),
    }
}
