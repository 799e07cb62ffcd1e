use std::path::Path;

use anyhow::{Context, Result, bail};

use intake_core::db::Database;
use intake_core::export::{write_totals_csv, write_totals_xlsx};
use intake_core::models::IntakeQuery;

use super::helpers::{parse_date_range, resolve_library};

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_export(
    db: &Database,
    subject: &str,
    out: &Path,
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

    let extension = out
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    match extension.as_deref() {
        Some("csv") => {
            let file = std::fs::File::create(out)
                .with_context(|| format!("Failed to create {}", out.display()))?;
            write_totals_csv(file, &totals.totals)?;
        }
        Some("xlsx") => {
            let title = format!("Intake for {subject}, {start} to {end}");
            write_totals_xlsx(out, &title, &totals.totals)?;
        }
        _ => bail!("Unsupported output format: use a .csv or .xlsx path"),
    }

    if json {
        println!(
            "{}",
            serde_json::json!({
                "path": out.display().to_string(),
                "entries": totals.entry_count,
                "unresolved": totals.unresolved_entries,
            })
        );
    } else {
        println!(
            "Wrote {} ({} entries between {start} and {end})",
            out.display(),
            totals.entry_count
        );
        if totals.unresolved_entries > 0 {
            eprintln!(
                "Warning: {} entries had no composition row in {} and contributed nothing",
                totals.unresolved_entries, library.name
            );
        }
    }
    Ok(())
}
