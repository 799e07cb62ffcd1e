use std::path::Path;

use anyhow::{Result, bail};

use intake_core::db::Database;
use intake_core::import::{ImportReport, RowSource, import_foods, import_log};
use intake_core::mapping::FoodColumnMap;

use super::helpers::resolve_library;

enum SourceFormat {
    Spreadsheet,
    Delimited,
}

fn detect_format(path: &Path, forced: Option<&str>) -> Result<SourceFormat> {
    if let Some(forced) = forced {
        return match forced {
            "spreadsheet" => Ok(SourceFormat::Spreadsheet),
            "delimited" => Ok(SourceFormat::Delimited),
            other => bail!("Unknown format '{other}'. Use 'spreadsheet' or 'delimited'"),
        };
    }
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    match extension.as_deref() {
        Some("xlsx" | "xls" | "ods") => Ok(SourceFormat::Spreadsheet),
        _ => Ok(SourceFormat::Delimited),
    }
}

fn print_report(report: &ImportReport, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "imported": report.imported,
                "skipped": report.skipped,
                "committed": report.committed,
                "message": report.summary(),
                "errors": report.errors.iter()
                    .map(|e| serde_json::json!({ "row": e.row, "message": e.message }))
                    .collect::<Vec<_>>(),
            })
        );
        return;
    }

    println!("{}", report.summary());
    for error in &report.errors {
        eprintln!("  row {}: {}", error.row, error.message);
    }
    if report.skipped > report.errors.len() {
        let unshown = report.skipped - report.errors.len();
        eprintln!("  ... and {unshown} more");
    }
}

pub(crate) fn cmd_import_foods(
    db: &Database,
    path: &Path,
    library: Option<&str>,
    format: Option<&str>,
    json: bool,
) -> Result<()> {
    let library = resolve_library(db, library)?;

    let (source, map) = match detect_format(path, format)? {
        SourceFormat::Spreadsheet => {
            (RowSource::spreadsheet(path)?, FoodColumnMap::spreadsheet())
        }
        SourceFormat::Delimited => (
            RowSource::delimited(path, b';')?,
            FoodColumnMap::delimited(),
        ),
    };

    let report = import_foods(db, &source, library.id, &map)?;
    print_report(&report, json);
    if !report.committed {
        std::process::exit(1);
    }
    Ok(())
}

pub(crate) fn cmd_import_log(db: &Database, path: &Path, json: bool) -> Result<()> {
    let source = RowSource::delimited(path, b',')?;
    let report = import_log(db, &source)?;
    print_report(&report, json);
    if !report.committed {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format_by_extension() {
        assert!(matches!(
            detect_format(Path::new("lib.xlsx"), None).unwrap(),
            SourceFormat::Spreadsheet
        ));
        assert!(matches!(
            detect_format(Path::new("lib.XLSX"), None).unwrap(),
            SourceFormat::Spreadsheet
        ));
        assert!(matches!(
            detect_format(Path::new("lib.csv"), None).unwrap(),
            SourceFormat::Delimited
        ));
        assert!(matches!(
            detect_format(Path::new("noext"), None).unwrap(),
            SourceFormat::Delimited
        ));
    }

    #[test]
    fn test_detect_format_forced() {
        assert!(matches!(
            detect_format(Path::new("lib.csv"), Some("spreadsheet")).unwrap(),
            SourceFormat::Spreadsheet
        ));
        assert!(detect_format(Path::new("lib.csv"), Some("nope")).is_err());
    }
}
