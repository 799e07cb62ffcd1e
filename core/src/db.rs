use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};

use crate::models::{
    ContributionRow, DEFAULT_LIBRARY_ID, DEFAULT_LIBRARY_NAME, DailyIntake, FoodRecord,
    IntakeQuery, IntakeTotals, Library, LogEntry, NewFoodRecord, NewLogEntry, NutrientTotal,
    UNSPECIFIED_MEAL, validate_grams,
};
use crate::nutrients::{NUTRIENT_COLUMNS, validate_nutrient};

pub struct Database {
    conn: Connection,
}

/// `"energy_kcal, protein_g, ..."` in registry order, for SELECT lists.
fn nutrient_select_list() -> String {
    NUTRIENT_COLUMNS
        .iter()
        .map(|n| n.column)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.configure()?;
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.configure()?;
        db.migrate()?;
        Ok(db)
    }

    fn configure(&self) -> Result<()> {
        // Cascading deletes rely on this; SQLite leaves it off per connection.
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            let nutrient_columns = NUTRIENT_COLUMNS
                .iter()
                .map(|n| format!("{} REAL", n.column))
                .collect::<Vec<_>>()
                .join(",\n                    ");

            self.conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS libraries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS foods (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    library_id INTEGER NOT NULL REFERENCES libraries(id) ON DELETE CASCADE,
                    name TEXT NOT NULL COLLATE NOCASE,
                    {nutrient_columns},
                    created_at TEXT NOT NULL,
                    UNIQUE(library_id, name)
                );

                CREATE TABLE IF NOT EXISTS log_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    subject TEXT NOT NULL,
                    date TEXT NOT NULL,
                    meal TEXT,
                    food_id INTEGER NOT NULL REFERENCES foods(id) ON DELETE CASCADE,
                    library_id INTEGER NOT NULL REFERENCES libraries(id) ON DELETE CASCADE,
                    grams REAL NOT NULL CHECK (grams > 0),
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_foods_library_name ON foods(library_id, name);
                CREATE INDEX IF NOT EXISTS idx_log_entries_subject_date ON log_entries(subject, date);
                CREATE INDEX IF NOT EXISTS idx_log_entries_library ON log_entries(library_id);

                PRAGMA user_version = 1;"
            ))?;
        }

        // The default library exists from first run and is recreated if a
        // migration ever finds it missing.
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR IGNORE INTO libraries (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![DEFAULT_LIBRARY_ID, DEFAULT_LIBRARY_NAME, now],
        )?;

        Ok(())
    }

    // --- Row mapping helpers ---

    fn library_from_row(row: &rusqlite::Row) -> rusqlite::Result<Library> {
        Ok(Library {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
        })
    }

    // Expects columns: 0: id, 1: library_id, 2: name,
    // 3..3+N: nutrient values in registry order, 3+N: created_at
    fn food_from_row(row: &rusqlite::Row) -> rusqlite::Result<FoodRecord> {
        let mut values = Vec::with_capacity(NUTRIENT_COLUMNS.len());
        for i in 0..NUTRIENT_COLUMNS.len() {
            values.push(row.get::<_, Option<f64>>(3 + i)?);
        }
        Ok(FoodRecord {
            id: row.get(0)?,
            library_id: row.get(1)?,
            name: row.get(2)?,
            values,
            created_at: row.get(3 + NUTRIENT_COLUMNS.len())?,
        })
    }

    // Expects columns: 0: e.id, 1: e.subject, 2: e.date, 3: e.meal,
    // 4: e.food_id, 5: e.library_id, 6: e.grams, 7: e.created_at,
    // 8: f.name, 9: l.name
    fn log_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<LogEntry> {
        Ok(LogEntry {
            id: row.get(0)?,
            subject: row.get(1)?,
            date: row.get(2)?,
            meal: row.get(3)?,
            food_id: row.get(4)?,
            library_id: row.get(5)?,
            grams: row.get(6)?,
            created_at: row.get(7)?,
            food_name: row.get(8)?,
            library_name: row.get(9)?,
        })
    }

    // --- Libraries ---

    pub fn create_library(&self, name: &str) -> Result<Library> {
        let now = Local::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO libraries (name, created_at) VALUES (?1, ?2)",
                params![name, now],
            )
            .with_context(|| format!("Failed to create library '{name}'"))?;
        self.get_library(self.conn.last_insert_rowid())
    }

    pub fn get_library(&self, id: i64) -> Result<Library> {
        self.conn
            .query_row(
                "SELECT id, name, created_at FROM libraries WHERE id = ?1",
                params![id],
                Self::library_from_row,
            )
            .context("Library not found")
    }

    pub fn find_library_by_name(&self, name: &str) -> Result<Option<Library>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, created_at FROM libraries WHERE name = ?1 COLLATE NOCASE",
        )?;
        let mut rows = stmt.query(params![name.trim()])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::library_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn list_libraries(&self) -> Result<Vec<Library>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created_at FROM libraries ORDER BY id")?;
        let libraries = stmt
            .query_map([], Self::library_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(libraries)
    }

    /// Delete a library, cascading to its foods and to every log entry that
    /// references it. The default library is protected.
    pub fn delete_library(&self, id: i64) -> Result<bool> {
        if id == DEFAULT_LIBRARY_ID {
            bail!("The '{DEFAULT_LIBRARY_NAME}' library cannot be deleted");
        }
        let rows = self
            .conn
            .execute("DELETE FROM libraries WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // --- Foods ---

    fn food_insert_params(food: &NewFoodRecord, now: &str) -> Vec<Value> {
        let mut values: Vec<Value> = Vec::with_capacity(NUTRIENT_COLUMNS.len() + 3);
        values.push(Value::Integer(food.library_id));
        values.push(Value::Text(food.name.clone()));
        for v in &food.values {
            values.push(v.map_or(Value::Null, Value::Real));
        }
        values.push(Value::Text(now.to_string()));
        values
    }

    fn food_insert_sql(or_ignore: bool) -> String {
        let placeholders = (1..=NUTRIENT_COLUMNS.len() + 3)
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT {}INTO foods (library_id, name, {}, created_at) VALUES ({placeholders})",
            if or_ignore { "OR IGNORE " } else { "" },
            nutrient_select_list(),
        )
    }

    pub fn insert_food(&self, food: &NewFoodRecord) -> Result<FoodRecord> {
        let now = Local::now().to_rfc3339();
        self.conn
            .execute(
                &Self::food_insert_sql(false),
                params_from_iter(Self::food_insert_params(food, &now)),
            )
            .with_context(|| format!("Failed to insert food '{}'", food.name))?;
        self.get_food_by_id(self.conn.last_insert_rowid())
    }

    pub fn get_food_by_id(&self, id: i64) -> Result<FoodRecord> {
        self.conn
            .query_row(
                &format!(
                    "SELECT id, library_id, name, {}, created_at FROM foods WHERE id = ?1",
                    nutrient_select_list()
                ),
                params![id],
                Self::food_from_row,
            )
            .context("Food not found")
    }

    pub fn find_food_by_name(&self, library_id: i64, name: &str) -> Result<Option<FoodRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, library_id, name, {}, created_at FROM foods
             WHERE library_id = ?1 AND name = ?2 COLLATE NOCASE",
            nutrient_select_list()
        ))?;
        let mut rows = stmt.query(params![library_id, name.trim()])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::food_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn list_foods(&self, library_id: i64) -> Result<Vec<FoodRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, library_id, name, {}, created_at FROM foods
             WHERE library_id = ?1 ORDER BY name",
            nutrient_select_list()
        ))?;
        let foods = stmt
            .query_map(params![library_id], Self::food_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    pub fn search_foods(&self, library_id: i64, query: &str) -> Result<Vec<FoodRecord>> {
        let escaped = query
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{escaped}%");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, library_id, name, {}, created_at FROM foods
             WHERE library_id = ?1 AND name LIKE ?2 ESCAPE '\\' ORDER BY name LIMIT 50",
            nutrient_select_list()
        ))?;
        let foods = stmt
            .query_map(params![library_id, pattern], Self::food_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    /// Full-record replace: name and every nutrient value are overwritten.
    pub fn update_food(&self, id: i64, food: &NewFoodRecord) -> Result<FoodRecord> {
        let assignments = NUTRIENT_COLUMNS
            .iter()
            .enumerate()
            .map(|(i, n)| format!("{} = ?{}", n.column, i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let id_placeholder = NUTRIENT_COLUMNS.len() + 2;

        let mut values: Vec<Value> = Vec::with_capacity(NUTRIENT_COLUMNS.len() + 2);
        values.push(Value::Text(food.name.clone()));
        for v in &food.values {
            values.push(v.map_or(Value::Null, Value::Real));
        }
        values.push(Value::Integer(id));

        let rows = self.conn.execute(
            &format!("UPDATE foods SET name = ?1, {assignments} WHERE id = ?{id_placeholder}"),
            params_from_iter(values),
        )?;
        if rows == 0 {
            bail!("Food {id} not found");
        }
        self.get_food_by_id(id)
    }

    /// Delete a food, cascading to its log entries.
    pub fn delete_food(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM foods WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    pub fn count_foods(&self, library_id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM foods WHERE library_id = ?1",
            params![library_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // --- Log entries ---

    pub fn insert_log_entry(&self, entry: &NewLogEntry) -> Result<LogEntry> {
        validate_grams(entry.grams)?;
        let now = Local::now().to_rfc3339();
        let date_str = entry.date.format("%Y-%m-%d").to_string();
        self.conn
            .execute(
                "INSERT INTO log_entries (subject, date, meal, food_id, library_id, grams, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    entry.subject,
                    date_str,
                    entry.meal,
                    entry.food_id,
                    entry.library_id,
                    entry.grams,
                    now,
                ],
            )
            .context("Failed to insert log entry")?;
        self.get_log_entry(self.conn.last_insert_rowid())
    }

    pub fn get_log_entry(&self, id: i64) -> Result<LogEntry> {
        self.conn
            .query_row(
                "SELECT e.id, e.subject, e.date, e.meal, e.food_id, e.library_id, e.grams,
                        e.created_at, f.name, l.name
                 FROM log_entries e
                 LEFT JOIN foods f ON f.id = e.food_id
                 LEFT JOIN libraries l ON l.id = e.library_id
                 WHERE e.id = ?1",
                params![id],
                Self::log_entry_from_row,
            )
            .context("Log entry not found")
    }

    pub fn list_log_entries(
        &self,
        subject: &str,
        start: NaiveDate,
        end: NaiveDate,
        library_id: Option<i64>,
    ) -> Result<Vec<LogEntry>> {
        let start = start.format("%Y-%m-%d").to_string();
        let end = end.format("%Y-%m-%d").to_string();
        let mut sql = String::from(
            "SELECT e.id, e.subject, e.date, e.meal, e.food_id, e.library_id, e.grams,
                    e.created_at, f.name, l.name
             FROM log_entries e
             LEFT JOIN foods f ON f.id = e.food_id
             LEFT JOIN libraries l ON l.id = e.library_id
             WHERE e.subject = ?1 AND e.date >= ?2 AND e.date <= ?3",
        );
        let mut values: Vec<Value> = vec![
            Value::Text(subject.to_string()),
            Value::Text(start),
            Value::Text(end),
        ];
        if let Some(library_id) = library_id {
            sql.push_str(" AND e.library_id = ?4");
            values.push(Value::Integer(library_id));
        }
        sql.push_str(" ORDER BY e.date, e.id");

        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params_from_iter(values), Self::log_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Edit the grams of an existing entry. The only mutable field.
    pub fn update_log_entry_grams(&self, id: i64, grams: f64) -> Result<LogEntry> {
        validate_grams(grams)?;
        let rows = self.conn.execute(
            "UPDATE log_entries SET grams = ?1 WHERE id = ?2",
            params![grams, id],
        )?;
        if rows == 0 {
            bail!("Log entry {id} not found");
        }
        self.get_log_entry(id)
    }

    pub fn delete_log_entry(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM log_entries WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // --- Import transaction ---

    /// Open the single write transaction an import run lives in. Dropping
    /// the value without calling [`ImportTransaction::commit`] rolls back.
    pub fn import_transaction(&self) -> Result<ImportTransaction<'_>> {
        let tx = self.conn.unchecked_transaction()?;
        Ok(ImportTransaction { tx })
    }

    // --- Aggregation engine ---

    /// Scaled sums for every nutrient column: subject, inclusive date range,
    /// one reference library.
    ///
    /// Composition values are per 100 g, so each entry contributes
    /// `value * grams / 100`. Entries whose (`food_id`, `library_id`) pair
    /// does not join to a food row contribute nothing and are reported in
    /// `unresolved_entries`. NULL composition cells are skipped by SUM and
    /// never affect other columns.
    pub fn intake_totals(&self, query: &IntakeQuery) -> Result<IntakeTotals> {
        let start = query.start.format("%Y-%m-%d").to_string();
        let end = query.end.format("%Y-%m-%d").to_string();

        let entry_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM log_entries
             WHERE subject = ?1 AND date >= ?2 AND date <= ?3 AND library_id = ?4",
            params![query.subject, start, end, query.library_id],
            |row| row.get(0),
        )?;

        // No matching entries: all-zero totals, composition rows untouched.
        if entry_count == 0 {
            return Ok(IntakeTotals {
                totals: zero_totals(),
                entry_count: 0,
                unresolved_entries: 0,
            });
        }

        let unresolved_entries: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM log_entries e
             LEFT JOIN foods f ON f.id = e.food_id AND f.library_id = e.library_id
             WHERE e.subject = ?1 AND e.date >= ?2 AND e.date <= ?3 AND e.library_id = ?4
               AND f.id IS NULL",
            params![query.subject, start, end, query.library_id],
            |row| row.get(0),
        )?;

        let sums = NUTRIENT_COLUMNS
            .iter()
            .map(|n| format!("COALESCE(SUM(f.{} * e.grams / 100.0), 0)", n.column))
            .collect::<Vec<_>>()
            .join(",\n                    ");

        let sql = format!(
            "SELECT {sums}
             FROM log_entries e
             LEFT JOIN foods f ON f.id = e.food_id AND f.library_id = e.library_id
             WHERE e.subject = ?1 AND e.date >= ?2 AND e.date <= ?3 AND e.library_id = ?4"
        );

        let totals = self.conn.query_row(
            &sql,
            params![query.subject, start, end, query.library_id],
            |row| {
                let mut totals = Vec::with_capacity(NUTRIENT_COLUMNS.len());
                for (i, n) in NUTRIENT_COLUMNS.iter().enumerate() {
                    totals.push(NutrientTotal {
                        column: n.column,
                        label: n.label,
                        unit: n.unit,
                        value: row.get(i)?,
                    });
                }
                Ok(totals)
            },
        )?;

        Ok(IntakeTotals {
            totals,
            entry_count,
            unresolved_entries,
        })
    }

    /// Per-(subject, date) sub-totals for one nutrient, the feed for
    /// statistics and time-series views. Days whose entries all fail to
    /// join still appear, with a 0.0 value.
    pub fn daily_breakdown(
        &self,
        nutrient: &str,
        subjects: &[String],
        start: NaiveDate,
        end: NaiveDate,
        library_id: i64,
    ) -> Result<Vec<DailyIntake>> {
        let nutrient = validate_nutrient(nutrient)?;
        if subjects.is_empty() {
            return Ok(Vec::new());
        }

        let subject_placeholders = (1..=subjects.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let base = subjects.len();
        let sql = format!(
            "SELECT e.subject, e.date, COALESCE(SUM(f.{} * e.grams / 100.0), 0)
             FROM log_entries e
             LEFT JOIN foods f ON f.id = e.food_id AND f.library_id = e.library_id
             WHERE e.subject IN ({subject_placeholders})
               AND e.date >= ?{} AND e.date <= ?{} AND e.library_id = ?{}
             GROUP BY e.subject, e.date
             ORDER BY e.subject, e.date",
            nutrient.column,
            base + 1,
            base + 2,
            base + 3,
        );

        let mut values: Vec<Value> = subjects
            .iter()
            .map(|s| Value::Text(s.clone()))
            .collect();
        values.push(Value::Text(start.format("%Y-%m-%d").to_string()));
        values.push(Value::Text(end.format("%Y-%m-%d").to_string()));
        values.push(Value::Integer(library_id));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok(DailyIntake {
                    subject: row.get(0)?,
                    date: row.get(1)?,
                    value: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Scaled sums for one nutrient grouped by food name, strictly positive
    /// sums only, largest first.
    pub fn food_breakdown(&self, nutrient: &str, query: &IntakeQuery) -> Result<Vec<ContributionRow>> {
        let nutrient = validate_nutrient(nutrient)?;
        let sql = format!(
            "SELECT f.name, SUM(f.{} * e.grams / 100.0) AS total
             FROM log_entries e
             JOIN foods f ON f.id = e.food_id AND f.library_id = e.library_id
             WHERE e.subject = ?1 AND e.date >= ?2 AND e.date <= ?3 AND e.library_id = ?4
             GROUP BY f.name
             HAVING total > 0
             ORDER BY total DESC",
            nutrient.column
        );
        self.contribution_rows(&sql, query)
    }

    /// Scaled sums for one nutrient grouped by lowercased meal category;
    /// entries without a category group under the fallback label.
    pub fn meal_breakdown(&self, nutrient: &str, query: &IntakeQuery) -> Result<Vec<ContributionRow>> {
        let nutrient = validate_nutrient(nutrient)?;
        let sql = format!(
            "SELECT LOWER(COALESCE(NULLIF(TRIM(e.meal), ''), ?5)) AS meal_label,
                    SUM(f.{} * e.grams / 100.0) AS total
             FROM log_entries e
             JOIN foods f ON f.id = e.food_id AND f.library_id = e.library_id
             WHERE e.subject = ?1 AND e.date >= ?2 AND e.date <= ?3 AND e.library_id = ?4
             GROUP BY meal_label
             HAVING total > 0
             ORDER BY total DESC",
            nutrient.column
        );
        let start = query.start.format("%Y-%m-%d").to_string();
        let end = query.end.format("%Y-%m-%d").to_string();
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![query.subject, start, end, query.library_id, UNSPECIFIED_MEAL],
                |row| {
                    Ok(ContributionRow {
                        label: row.get(0)?,
                        value: row.get(1)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn contribution_rows(&self, sql: &str, query: &IntakeQuery) -> Result<Vec<ContributionRow>> {
        let start = query.start.format("%Y-%m-%d").to_string();
        let end = query.end.format("%Y-%m-%d").to_string();
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(
                params![query.subject, start, end, query.library_id],
                |row| {
                    Ok(ContributionRow {
                        label: row.get(0)?,
                        value: row.get(1)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn zero_totals() -> Vec<NutrientTotal> {
    NUTRIENT_COLUMNS
        .iter()
        .map(|n| NutrientTotal {
            column: n.column,
            label: n.label,
            unit: n.unit,
            value: 0.0,
        })
        .collect()
}

/// The one write transaction an import run lives in. Inserts either all
/// become visible together on [`commit`](Self::commit) or none do.
pub struct ImportTransaction<'conn> {
    tx: rusqlite::Transaction<'conn>,
}

impl ImportTransaction<'_> {
    /// Insert a food under the ignore-on-uniqueness-conflict policy: a
    /// duplicate (library, name) affects zero rows and is not an error.
    pub fn insert_food_ignoring_duplicate(&self, food: &NewFoodRecord) -> Result<usize> {
        let now = Local::now().to_rfc3339();
        let rows = self.tx.execute(
            &Database::food_insert_sql(true),
            params_from_iter(Database::food_insert_params(food, &now)),
        )?;
        Ok(rows)
    }

    pub fn insert_log_entry(&self, entry: &NewLogEntry) -> Result<usize> {
        let now = Local::now().to_rfc3339();
        let date_str = entry.date.format("%Y-%m-%d").to_string();
        let rows = self.tx.execute(
            "INSERT INTO log_entries (subject, date, meal, food_id, library_id, grams, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.subject,
                date_str,
                entry.meal,
                entry.food_id,
                entry.library_id,
                entry.grams,
                now,
            ],
        )?;
        Ok(rows)
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }

    pub fn rollback(self) -> Result<()> {
        self.tx.rollback()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewFoodRecord, NewLogEntry};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample_food(library_id: i64, name: &str, kcal: f64) -> NewFoodRecord {
        NewFoodRecord::new(library_id, name)
            .with("energy_kcal", kcal)
            .with("protein_g", 10.0)
            .with("fat_g", 5.0)
    }

    fn log(subject: &str, day: &str, food_id: i64, library_id: i64, grams: f64) -> NewLogEntry {
        NewLogEntry {
            subject: subject.to_string(),
            date: date(day),
            meal: None,
            food_id,
            library_id,
            grams,
        }
    }

    #[test]
    fn test_default_library_seeded() {
        let db = Database::open_in_memory().unwrap();
        let lib = db.get_library(DEFAULT_LIBRARY_ID).unwrap();
        assert_eq!(lib.name, DEFAULT_LIBRARY_NAME);
    }

    #[test]
    fn test_default_library_protected() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.delete_library(DEFAULT_LIBRARY_ID).is_err());
        assert!(db.get_library(DEFAULT_LIBRARY_ID).is_ok());
    }

    #[test]
    fn test_create_and_find_library_case_insensitive() {
        let db = Database::open_in_memory().unwrap();
        let lib = db.create_library("Fineli 2024").unwrap();
        let found = db.find_library_by_name("  fineli 2024 ").unwrap().unwrap();
        assert_eq!(found.id, lib.id);
    }

    #[test]
    fn test_duplicate_library_name_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.create_library("USDA").unwrap();
        assert!(db.create_library("usda").is_err());
    }

    #[test]
    fn test_insert_and_get_food() {
        let db = Database::open_in_memory().unwrap();
        let food = db
            .insert_food(&sample_food(DEFAULT_LIBRARY_ID, "Oatmeal", 370.0))
            .unwrap();
        let fetched = db.get_food_by_id(food.id).unwrap();
        assert_eq!(fetched.name, "Oatmeal");
        assert_eq!(fetched.nutrient("energy_kcal"), Some(370.0));
        assert_eq!(fetched.nutrient("vitamin_c_mg"), None);
    }

    #[test]
    fn test_food_unique_per_library() {
        let db = Database::open_in_memory().unwrap();
        db.insert_food(&sample_food(DEFAULT_LIBRARY_ID, "Oatmeal", 370.0))
            .unwrap();
        assert!(
            db.insert_food(&sample_food(DEFAULT_LIBRARY_ID, "Oatmeal", 370.0))
                .is_err()
        );
        // Same name in another library is fine.
        let other = db.create_library("Other").unwrap();
        assert!(db.insert_food(&sample_food(other.id, "Oatmeal", 350.0)).is_ok());
    }

    #[test]
    fn test_update_food_full_replace() {
        let db = Database::open_in_memory().unwrap();
        let food = db
            .insert_food(&sample_food(DEFAULT_LIBRARY_ID, "Oatmeal", 370.0))
            .unwrap();
        let replacement =
            NewFoodRecord::new(DEFAULT_LIBRARY_ID, "Oatmeal (rolled)").with("energy_kcal", 360.0);
        let updated = db.update_food(food.id, &replacement).unwrap();
        assert_eq!(updated.name, "Oatmeal (rolled)");
        assert_eq!(updated.nutrient("energy_kcal"), Some(360.0));
        // protein_g was set before the replace and is gone after it.
        assert_eq!(updated.nutrient("protein_g"), None);
    }

    #[test]
    fn test_search_foods_escapes_like() {
        let db = Database::open_in_memory().unwrap();
        db.insert_food(&sample_food(DEFAULT_LIBRARY_ID, "100% Juice", 45.0))
            .unwrap();
        db.insert_food(&sample_food(DEFAULT_LIBRARY_ID, "Juice drink", 30.0))
            .unwrap();
        let hits = db.search_foods(DEFAULT_LIBRARY_ID, "100%").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "100% Juice");
    }

    #[test]
    fn test_log_entry_roundtrip_with_joined_names() {
        let db = Database::open_in_memory().unwrap();
        let food = db
            .insert_food(&sample_food(DEFAULT_LIBRARY_ID, "Oatmeal", 370.0))
            .unwrap();
        let entry = db
            .insert_log_entry(&log("p1", "2024-03-01", food.id, DEFAULT_LIBRARY_ID, 150.0))
            .unwrap();
        assert_eq!(entry.food_name.as_deref(), Some("Oatmeal"));
        assert_eq!(entry.library_name.as_deref(), Some(DEFAULT_LIBRARY_NAME));
        assert!((entry.grams - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_log_entry_rejects_nonpositive_grams() {
        let db = Database::open_in_memory().unwrap();
        let food = db
            .insert_food(&sample_food(DEFAULT_LIBRARY_ID, "Oatmeal", 370.0))
            .unwrap();
        assert!(
            db.insert_log_entry(&log("p1", "2024-03-01", food.id, DEFAULT_LIBRARY_ID, 0.0))
                .is_err()
        );
    }

    #[test]
    fn test_log_entry_requires_existing_food() {
        let db = Database::open_in_memory().unwrap();
        assert!(
            db.insert_log_entry(&log("p1", "2024-03-01", 999, DEFAULT_LIBRARY_ID, 100.0))
                .is_err()
        );
    }

    #[test]
    fn test_update_log_entry_grams() {
        let db = Database::open_in_memory().unwrap();
        let food = db
            .insert_food(&sample_food(DEFAULT_LIBRARY_ID, "Oatmeal", 370.0))
            .unwrap();
        let entry = db
            .insert_log_entry(&log("p1", "2024-03-01", food.id, DEFAULT_LIBRARY_ID, 150.0))
            .unwrap();
        let updated = db.update_log_entry_grams(entry.id, 200.0).unwrap();
        assert!((updated.grams - 200.0).abs() < f64::EPSILON);
        assert!(db.update_log_entry_grams(999, 100.0).is_err());
    }

    #[test]
    fn test_delete_food_cascades_to_entries() {
        let db = Database::open_in_memory().unwrap();
        let food = db
            .insert_food(&sample_food(DEFAULT_LIBRARY_ID, "Oatmeal", 370.0))
            .unwrap();
        let entry = db
            .insert_log_entry(&log("p1", "2024-03-01", food.id, DEFAULT_LIBRARY_ID, 150.0))
            .unwrap();
        assert!(db.delete_food(food.id).unwrap());
        assert!(db.get_log_entry(entry.id).is_err());
    }

    #[test]
    fn test_delete_library_cascades() {
        let db = Database::open_in_memory().unwrap();
        let lib = db.create_library("Temp").unwrap();
        let food = db.insert_food(&sample_food(lib.id, "Oatmeal", 370.0)).unwrap();
        db.insert_log_entry(&log("p1", "2024-03-01", food.id, lib.id, 150.0))
            .unwrap();
        assert!(db.delete_library(lib.id).unwrap());
        assert!(db.get_food_by_id(food.id).is_err());
        let entries = db
            .list_log_entries("p1", date("2024-03-01"), date("2024-03-01"), None)
            .unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_intake_totals_scaling() {
        let db = Database::open_in_memory().unwrap();
        let food = db
            .insert_food(
                &NewFoodRecord::new(DEFAULT_LIBRARY_ID, "Bread").with("energy_kcal", 200.0),
            )
            .unwrap();
        db.insert_log_entry(&log("p1", "2024-03-01", food.id, DEFAULT_LIBRARY_ID, 150.0))
            .unwrap();

        let totals = db
            .intake_totals(&IntakeQuery {
                subject: "p1".to_string(),
                start: date("2024-03-01"),
                end: date("2024-03-01"),
                library_id: DEFAULT_LIBRARY_ID,
            })
            .unwrap();

        // 200 kcal/100g * 150 g = 300 kcal
        let energy = totals
            .totals
            .iter()
            .find(|t| t.column == "energy_kcal")
            .unwrap();
        assert!((energy.value - 300.0).abs() < 1e-9);
        assert_eq!(totals.entry_count, 1);
        assert_eq!(totals.unresolved_entries, 0);
    }

    #[test]
    fn test_intake_totals_zero_entries_all_zero() {
        let db = Database::open_in_memory().unwrap();
        let totals = db
            .intake_totals(&IntakeQuery {
                subject: "nobody".to_string(),
                start: date("2024-01-01"),
                end: date("2024-12-31"),
                library_id: DEFAULT_LIBRARY_ID,
            })
            .unwrap();
        assert_eq!(totals.entry_count, 0);
        assert_eq!(totals.totals.len(), NUTRIENT_COLUMNS.len());
        assert!(totals.totals.iter().all(|t| t.value == 0.0));
    }

    #[test]
    fn test_intake_totals_null_cells_do_not_corrupt_other_columns() {
        let db = Database::open_in_memory().unwrap();
        // Energy present, protein absent for one food; both present for another.
        let bread = db
            .insert_food(
                &NewFoodRecord::new(DEFAULT_LIBRARY_ID, "Bread").with("energy_kcal", 200.0),
            )
            .unwrap();
        let cheese = db
            .insert_food(
                &NewFoodRecord::new(DEFAULT_LIBRARY_ID, "Cheese")
                    .with("energy_kcal", 400.0)
                    .with("protein_g", 25.0),
            )
            .unwrap();
        db.insert_log_entry(&log("p1", "2024-03-01", bread.id, DEFAULT_LIBRARY_ID, 100.0))
            .unwrap();
        db.insert_log_entry(&log("p1", "2024-03-01", cheese.id, DEFAULT_LIBRARY_ID, 100.0))
            .unwrap();

        let totals = db
            .intake_totals(&IntakeQuery {
                subject: "p1".to_string(),
                start: date("2024-03-01"),
                end: date("2024-03-01"),
                library_id: DEFAULT_LIBRARY_ID,
            })
            .unwrap();
        let by_column = |c: &str| totals.totals.iter().find(|t| t.column == c).unwrap().value;
        assert!((by_column("energy_kcal") - 600.0).abs() < 1e-9);
        // Bread's missing protein cell contributes nothing, not zero-corruption.
        assert!((by_column("protein_g") - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_intake_totals_unresolved_pair_counted_not_fatal() {
        let db = Database::open_in_memory().unwrap();
        let other = db.create_library("Other").unwrap();
        // Food owned by Other, but the entry reads compositions from Default:
        // the (food, library) pair has no composition row.
        let food = db.insert_food(&sample_food(other.id, "Mystery", 100.0)).unwrap();
        db.insert_log_entry(&log("p1", "2024-03-01", food.id, DEFAULT_LIBRARY_ID, 100.0))
            .unwrap();

        let totals = db
            .intake_totals(&IntakeQuery {
                subject: "p1".to_string(),
                start: date("2024-03-01"),
                end: date("2024-03-01"),
                library_id: DEFAULT_LIBRARY_ID,
            })
            .unwrap();
        assert_eq!(totals.entry_count, 1);
        assert_eq!(totals.unresolved_entries, 1);
        assert!(totals.totals.iter().all(|t| t.value == 0.0));
    }

    #[test]
    fn test_daily_breakdown_sums_match_grand_total() {
        let db = Database::open_in_memory().unwrap();
        let food = db
            .insert_food(
                &NewFoodRecord::new(DEFAULT_LIBRARY_ID, "Bread").with("energy_kcal", 217.0),
            )
            .unwrap();
        for (day, grams) in [
            ("2024-03-01", 80.0),
            ("2024-03-01", 120.0),
            ("2024-03-02", 65.0),
            ("2024-03-04", 90.0),
        ] {
            db.insert_log_entry(&log("p1", day, food.id, DEFAULT_LIBRARY_ID, grams))
                .unwrap();
        }

        let query = IntakeQuery {
            subject: "p1".to_string(),
            start: date("2024-03-01"),
            end: date("2024-03-31"),
            library_id: DEFAULT_LIBRARY_ID,
        };
        let totals = db.intake_totals(&query).unwrap();
        let grand = totals
            .totals
            .iter()
            .find(|t| t.column == "energy_kcal")
            .unwrap()
            .value;

        let days = db
            .daily_breakdown(
                "energy_kcal",
                &["p1".to_string()],
                query.start,
                query.end,
                query.library_id,
            )
            .unwrap();
        assert_eq!(days.len(), 3);
        let day_sum: f64 = days.iter().map(|d| d.value).sum();
        assert!((day_sum - grand).abs() <= 1e-9 * grand.abs().max(1.0));
    }

    #[test]
    fn test_daily_breakdown_rejects_unknown_nutrient() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .daily_breakdown(
                "DROP TABLE",
                &["p1".to_string()],
                date("2024-01-01"),
                date("2024-01-31"),
                DEFAULT_LIBRARY_ID,
            )
            .unwrap_err();
        assert!(err.to_string().contains("Unknown nutrient"));
    }

    #[test]
    fn test_food_breakdown_sorted_positive_only() {
        let db = Database::open_in_memory().unwrap();
        let bread = db
            .insert_food(
                &NewFoodRecord::new(DEFAULT_LIBRARY_ID, "Bread").with("energy_kcal", 200.0),
            )
            .unwrap();
        let butter = db
            .insert_food(
                &NewFoodRecord::new(DEFAULT_LIBRARY_ID, "Butter").with("energy_kcal", 700.0),
            )
            .unwrap();
        // No energy value at all: never shows up in the breakdown.
        let water = db
            .insert_food(&NewFoodRecord::new(DEFAULT_LIBRARY_ID, "Water"))
            .unwrap();
        db.insert_log_entry(&log("p1", "2024-03-01", bread.id, DEFAULT_LIBRARY_ID, 100.0))
            .unwrap();
        db.insert_log_entry(&log("p1", "2024-03-01", butter.id, DEFAULT_LIBRARY_ID, 50.0))
            .unwrap();
        db.insert_log_entry(&log("p1", "2024-03-01", water.id, DEFAULT_LIBRARY_ID, 250.0))
            .unwrap();

        let rows = db
            .food_breakdown(
                "energy_kcal",
                &IntakeQuery {
                    subject: "p1".to_string(),
                    start: date("2024-03-01"),
                    end: date("2024-03-01"),
                    library_id: DEFAULT_LIBRARY_ID,
                },
            )
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, "Butter");
        assert!((rows[0].value - 350.0).abs() < 1e-9);
        assert_eq!(rows[1].label, "Bread");
    }

    #[test]
    fn test_meal_breakdown_groups_and_fallback() {
        let db = Database::open_in_memory().unwrap();
        let bread = db
            .insert_food(
                &NewFoodRecord::new(DEFAULT_LIBRARY_ID, "Bread").with("energy_kcal", 200.0),
            )
            .unwrap();
        let mut with_meal = log("p1", "2024-03-01", bread.id, DEFAULT_LIBRARY_ID, 100.0);
        with_meal.meal = Some("Breakfast".to_string());
        db.insert_log_entry(&with_meal).unwrap();
        let mut upper = log("p1", "2024-03-01", bread.id, DEFAULT_LIBRARY_ID, 50.0);
        upper.meal = Some("BREAKFAST".to_string());
        db.insert_log_entry(&upper).unwrap();
        db.insert_log_entry(&log("p1", "2024-03-02", bread.id, DEFAULT_LIBRARY_ID, 100.0))
            .unwrap();

        let rows = db
            .meal_breakdown(
                "energy_kcal",
                &IntakeQuery {
                    subject: "p1".to_string(),
                    start: date("2024-03-01"),
                    end: date("2024-03-31"),
                    library_id: DEFAULT_LIBRARY_ID,
                },
            )
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, "breakfast");
        assert!((rows[0].value - 300.0).abs() < 1e-9);
        assert_eq!(rows[1].label, UNSPECIFIED_MEAL);
    }

    #[test]
    fn test_import_transaction_rollback_discards_inserts() {
        let db = Database::open_in_memory().unwrap();
        {
            let tx = db.import_transaction().unwrap();
            tx.insert_food_ignoring_duplicate(&sample_food(DEFAULT_LIBRARY_ID, "Oats", 370.0))
                .unwrap();
            tx.rollback().unwrap();
        }
        assert_eq!(db.count_foods(DEFAULT_LIBRARY_ID).unwrap(), 0);
    }

    #[test]
    fn test_import_transaction_duplicate_ignored() {
        let db = Database::open_in_memory().unwrap();
        let tx = db.import_transaction().unwrap();
        let first = tx
            .insert_food_ignoring_duplicate(&sample_food(DEFAULT_LIBRARY_ID, "Oats", 370.0))
            .unwrap();
        let second = tx
            .insert_food_ignoring_duplicate(&sample_food(DEFAULT_LIBRARY_ID, "Oats", 370.0))
            .unwrap();
        tx.commit().unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 0);
        assert_eq!(db.count_foods(DEFAULT_LIBRARY_ID).unwrap(), 1);
    }
}
