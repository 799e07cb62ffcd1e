use chrono::NaiveDate;

use crate::nutrients::NUTRIENT_COLUMNS;

/// What a source column maps to in a food-library import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// The food display name. Trimmed; empty after trim invalidates the row.
    Name,
    /// A nutrient value destined for the named `foods` column. Parsed with
    /// [`parse_decimal`]; a bad cell becomes NULL, never a rejected row.
    Nutrient(&'static str),
    /// Present in the source but not stored.
    Skip,
}

/// Ordered column mapping for one food-library source format.
#[derive(Debug, Clone)]
pub struct FoodColumnMap {
    /// Rows to discard before the first data row.
    pub header_rows: usize,
    pub columns: Vec<ColumnRole>,
}

impl FoodColumnMap {
    /// Layout of the food-library spreadsheet format: two header rows
    /// (title + units), then name in column 0 followed by the nutrient
    /// columns in registry order.
    #[must_use]
    pub fn spreadsheet() -> Self {
        Self {
            header_rows: 2,
            columns: standard_food_columns(),
        }
    }

    /// Layout of the semicolon-delimited food-library text format. Same
    /// column order as the spreadsheet, same two header rows.
    #[must_use]
    pub fn delimited() -> Self {
        Self {
            header_rows: 2,
            columns: standard_food_columns(),
        }
    }
}

fn standard_food_columns() -> Vec<ColumnRole> {
    let mut columns = Vec::with_capacity(1 + NUTRIENT_COLUMNS.len());
    columns.push(ColumnRole::Name);
    columns.extend(NUTRIENT_COLUMNS.iter().map(|n| ColumnRole::Nutrient(n.column)));
    columns
}

/// Named columns of the comma-delimited consumption-log format.
///
/// The log format has one header row; columns are located by name,
/// case-insensitively, so column order in the file does not matter.
#[derive(Debug, Clone, Copy)]
pub struct LogColumnIndexes {
    pub subject: usize,
    pub date: usize,
    pub meal: Option<usize>,
    pub food: usize,
    pub library: usize,
    pub grams: usize,
}

impl LogColumnIndexes {
    /// Resolve the required log columns from a header row. Returns an error
    /// message naming the first missing column.
    pub fn from_header(header: &[String]) -> Result<Self, String> {
        let col = |name: &str| header.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
        let require = |name: &str| col(name).ok_or_else(|| format!("missing column '{name}'"));
        Ok(Self {
            subject: require("subject")?,
            date: require("date")?,
            meal: col("meal"),
            food: require("food")?,
            library: require("library")?,
            grams: require("grams")?,
        })
    }
}

/// Parse a numeric cell: trimmed, decimal commas replaced with decimal
/// points. Empty cells and unparseable cells both map to None.
#[must_use]
pub fn parse_decimal(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    cell.replace(',', ".").parse::<f64>().ok()
}

/// Validate a calendar date by exact `YYYY-MM-DD` pattern match, then check
/// it names a real date. Rejects unpadded or reordered forms that a lenient
/// date parser would accept.
#[must_use]
pub fn parse_strict_date(s: &str) -> Option<NaiveDate> {
    let bytes = s.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let digits_at = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);
    if !digits_at(0..4) || !digits_at(5..7) || !digits_at(8..10) {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}
