use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use calamine::{Data, Reader, open_workbook_auto};
use log::info;

use crate::db::Database;
use crate::mapping::{
    ColumnRole, FoodColumnMap, LogColumnIndexes, parse_decimal, parse_strict_date,
};
use crate::models::{NewFoodRecord, NewLogEntry};

/// At most this many example error messages are kept in a report. Every
/// bad row is still counted.
pub const ERROR_SAMPLE_CAP: usize = 10;

/// One recorded row failure: the 1-based source row number and a
/// human-readable cause.
#[derive(Debug, Clone)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

/// Outcome of one import run.
///
/// `imported` counts rows actually written (duplicates ignored by unique
/// key affect zero rows and do not count); `skipped` counts every row that
/// failed validation or resolution. A run commits whenever no store-level
/// failure occurred, even if every single row was skipped — the message
/// text, not the commit decision, is what distinguishes those outcomes.
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<RowError>,
    pub committed: bool,
}

impl ImportReport {
    fn new() -> Self {
        Self {
            imported: 0,
            skipped: 0,
            errors: Vec::new(),
            committed: false,
        }
    }

    fn record(&mut self, row: usize, message: String) {
        self.skipped += 1;
        if self.errors.len() < ERROR_SAMPLE_CAP {
            self.errors.push(RowError { row, message });
        }
    }

    /// One-line outcome for display. The three shapes are load-bearing:
    /// callers key off "Imported"/"failed" to present the result.
    #[must_use]
    pub fn summary(&self) -> String {
        if !self.committed {
            "Import failed, no changes saved.".to_string()
        } else if self.skipped == 0 {
            format!("Imported {} rows.", self.imported)
        } else {
            format!(
                "Imported {} rows with {} warnings.",
                self.imported, self.skipped
            )
        }
    }
}

/// Rows read from a source file, header rows and all, with 1-based row
/// numbers preserved for error messages.
///
/// Both constructors read the source eagerly, so an unreadable file or a
/// workbook without a worksheet fails here — before any transaction is
/// opened, with no store side effects.
pub struct RowSource {
    rows: Vec<Vec<String>>,
}

impl RowSource {
    /// Read the first worksheet of a spreadsheet workbook.
    pub fn spreadsheet(path: &Path) -> Result<Self> {
        let mut workbook = open_workbook_auto(path)
            .with_context(|| format!("Failed to open workbook: {}", path.display()))?;
        let range = workbook
            .worksheet_range_at(0)
            .context("The workbook has no worksheets")?
            .context("Failed to read the first worksheet")?;
        let rows = range
            .rows()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect();
        Ok(Self { rows })
    }

    /// Read a delimited text file with the given delimiter byte.
    pub fn delimited(path: &Path, delimiter: u8) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;
        Self::delimited_from_reader(file, delimiter)
    }

    pub fn delimited_from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut rows = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let record = record.with_context(|| format!("Failed to read row {}", i + 1))?;
            rows.push(record.iter().map(|cell| cell.to_string()).collect());
        }
        Ok(Self { rows })
    }

    /// All rows with their 1-based source row numbers.
    pub fn rows(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| (i + 1, row.as_slice()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                format!("{f:.0}")
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Name→identifier maps snapshotted at the start of a log-import run.
///
/// Built once before any row is processed and never refreshed mid-run, so
/// rows referencing entities created by the same run do not resolve.
pub struct Lookups {
    libraries: HashMap<String, i64>,
    foods: HashMap<(String, i64), i64>,
}

impl Lookups {
    pub fn snapshot(db: &Database) -> Result<Self> {
        let mut libraries = HashMap::new();
        let mut foods = HashMap::new();
        for library in db.list_libraries()? {
            libraries.insert(normalize_key(&library.name), library.id);
            for food in db.list_foods(library.id)? {
                foods.insert((normalize_key(&food.name), library.id), food.id);
            }
        }
        Ok(Self { libraries, foods })
    }

    #[must_use]
    pub fn library(&self, name: &str) -> Option<i64> {
        self.libraries.get(&normalize_key(name)).copied()
    }

    #[must_use]
    pub fn food(&self, name: &str, library_id: i64) -> Option<i64> {
        self.foods.get(&(normalize_key(name), library_id)).copied()
    }
}

fn normalize_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Bulk-import food composition rows into one library.
///
/// All inserts happen inside a single transaction. Rows with validation
/// problems are skipped and counted; only an actual store failure (or a
/// source-file failure, which prevents the run from starting) discards the
/// run.
pub fn import_foods(
    db: &Database,
    source: &RowSource,
    library_id: i64,
    map: &FoodColumnMap,
) -> Result<ImportReport> {
    let tx = db.import_transaction()?;
    let mut report = ImportReport::new();
    let mut store_failed = false;

    for (row_number, row) in source.rows().skip(map.header_rows) {
        let Some(food) = build_food(row, library_id, map, row_number, &mut report) else {
            continue;
        };
        match tx.insert_food_ignoring_duplicate(&food) {
            Ok(rows) => report.imported += rows,
            Err(e) => {
                store_failed = true;
                report.record(row_number, format!("database error: {e}"));
            }
        }
    }

    finalize(tx, store_failed, &mut report)?;
    info!(
        "food import: {} imported, {} skipped, committed: {}",
        report.imported, report.skipped, report.committed
    );
    Ok(report)
}

fn build_food(
    row: &[String],
    library_id: i64,
    map: &FoodColumnMap,
    row_number: usize,
    report: &mut ImportReport,
) -> Option<NewFoodRecord> {
    let mut food = NewFoodRecord::new(library_id, "");
    for (i, role) in map.columns.iter().enumerate() {
        let cell = row.get(i).map_or("", String::as_str);
        match role {
            ColumnRole::Name => {
                let name = cell.trim();
                if name.is_empty() {
                    report.record(row_number, "missing food name".to_string());
                    return None;
                }
                food.name = name.to_string();
            }
            // A cell that fails to parse becomes NULL; it never rejects the row.
            ColumnRole::Nutrient(column) => {
                if let Some(value) = parse_decimal(cell) {
                    food = food.with(column, value);
                }
            }
            ColumnRole::Skip => {}
        }
    }
    Some(food)
}

/// Bulk-import consumption-log rows. The destination library is resolved
/// per row from its `library` column via the snapshot maps.
pub fn import_log(db: &Database, source: &RowSource) -> Result<ImportReport> {
    let mut rows = source.rows();
    let (_, header) = rows
        .next()
        .context("The log file is empty — expected a header row")?;
    let indexes = LogColumnIndexes::from_header(header)
        .map_err(|e| anyhow::anyhow!("Invalid log header: {e}"))?;

    let lookups = Lookups::snapshot(db)?;
    let tx = db.import_transaction()?;
    let mut report = ImportReport::new();
    let mut store_failed = false;

    for (row_number, row) in rows {
        let Some(entry) = build_log_entry(row, &indexes, &lookups, row_number, &mut report) else {
            continue;
        };
        match tx.insert_log_entry(&entry) {
            Ok(rows) => report.imported += rows,
            Err(e) => {
                store_failed = true;
                report.record(row_number, format!("database error: {e}"));
            }
        }
    }

    finalize(tx, store_failed, &mut report)?;
    info!(
        "log import: {} imported, {} skipped, committed: {}",
        report.imported, report.skipped, report.committed
    );
    Ok(report)
}

fn build_log_entry(
    row: &[String],
    indexes: &LogColumnIndexes,
    lookups: &Lookups,
    row_number: usize,
    report: &mut ImportReport,
) -> Option<NewLogEntry> {
    let cell = |i: usize| row.get(i).map_or("", String::as_str).trim();

    let subject = cell(indexes.subject);
    if subject.is_empty() {
        report.record(row_number, "missing subject".to_string());
        return None;
    }

    let date_cell = cell(indexes.date);
    let Some(date) = parse_strict_date(date_cell) else {
        report.record(
            row_number,
            format!("invalid date '{date_cell}' (expected YYYY-MM-DD)"),
        );
        return None;
    };

    let food_name = cell(indexes.food);
    if food_name.is_empty() {
        report.record(row_number, "missing food name".to_string());
        return None;
    }

    let library_name = cell(indexes.library);
    if library_name.is_empty() {
        report.record(row_number, "missing library name".to_string());
        return None;
    }

    let grams_cell = cell(indexes.grams);
    let grams = match parse_decimal(grams_cell) {
        Some(g) if g > 0.0 => g,
        _ => {
            report.record(
                row_number,
                format!("invalid grams '{grams_cell}' (expected a positive number)"),
            );
            return None;
        }
    };

    let Some(library_id) = lookups.library(library_name) else {
        report.record(row_number, format!("library '{library_name}' not found"));
        return None;
    };
    let Some(food_id) = lookups.food(food_name, library_id) else {
        report.record(
            row_number,
            format!("food '{food_name}' not found in library '{library_name}'"),
        );
        return None;
    };

    let meal = indexes.meal.map(cell).filter(|m| !m.is_empty());

    Some(NewLogEntry {
        subject: subject.to_string(),
        date,
        meal: meal.map(ToString::to_string),
        food_id,
        library_id,
        grams,
    })
}

fn finalize(
    tx: crate::db::ImportTransaction<'_>,
    store_failed: bool,
    report: &mut ImportReport,
) -> Result<()> {
    if store_failed {
        tx.rollback()?;
        report.committed = false;
    } else {
        tx.commit()?;
        report.committed = true;
    }
    Ok(())
}
