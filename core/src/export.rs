use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, Workbook};

use crate::models::NutrientTotal;

/// Write an intake report as semicolon-delimited text: a header row, then
/// one row per nutrient with its name, value, and unit.
pub fn write_totals_csv<W: Write>(writer: W, totals: &[NutrientTotal]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().delimiter(b';').from_writer(writer);
    wtr.write_record(["nutrient", "value", "unit"])?;
    for total in totals {
        wtr.write_record([total.label, &total.value.to_string(), total.unit])?;
    }
    wtr.flush().context("Failed to write report")?;
    Ok(())
}

/// Write an intake report as a spreadsheet: a title cell, a bold header
/// row, and one row per nutrient with the value formatted to two decimals.
pub fn write_totals_xlsx(path: &Path, title: &str, totals: &[NutrientTotal]) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    let title_format = Format::new().set_bold().set_font_size(14);
    let header_format = Format::new().set_bold();
    let value_format = Format::new().set_num_format("0.00");

    sheet.write_with_format(0, 0, title, &title_format)?;
    sheet.write_with_format(2, 0, "Nutrient", &header_format)?;
    sheet.write_with_format(2, 1, "Value", &header_format)?;
    sheet.write_with_format(2, 2, "Unit", &header_format)?;

    for (i, total) in totals.iter().enumerate() {
        let row = 3 + i as u32;
        sheet.write(row, 0, total.label)?;
        sheet.write_with_format(row, 1, total.value, &value_format)?;
        sheet.write(row, 2, total.unit)?;
    }

    sheet.set_column_width(0, 24)?;
    workbook
        .save(path)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_totals() -> Vec<NutrientTotal> {
        vec![
            NutrientTotal {
                column: "energy_kcal",
                label: "Energy",
                unit: "kcal",
                value: 1845.5,
            },
            NutrientTotal {
                column: "protein_g",
                label: "Protein",
                unit: "g",
                value: 82.25,
            },
        ]
    }

    #[test]
    fn test_write_totals_csv() {
        let mut buf = Vec::new();
        write_totals_csv(&mut buf, &sample_totals()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "nutrient;value;unit");
        assert_eq!(lines[1], "Energy;1845.5;kcal");
        assert_eq!(lines[2], "Protein;82.25;g");
    }

    #[test]
    fn test_write_totals_csv_empty() {
        let mut buf = Vec::new();
        write_totals_csv(&mut buf, &[]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn test_write_totals_xlsx_produces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        write_totals_xlsx(&path, "Intake for p1", &sample_totals()).unwrap();
        let metadata = std::fs::metadata(&path).unwrap();
        assert!(metadata.len() > 0);
    }
}
