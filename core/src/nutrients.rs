use anyhow::{Result, bail};

/// One of the fixed nutrient composition columns.
///
/// `column` is the SQL column name on the `foods` table; `label` is the
/// human-readable name used in tables and report files; `unit` is the unit
/// the per-100g composition value is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NutrientColumn {
    pub column: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
}

/// The fixed set of nutrient columns, in storage and report order.
///
/// This list is the only place nutrient column names exist. Every query that
/// interpolates a column name into SQL goes through [`validate_nutrient`]
/// first, so nothing outside this whitelist ever reaches the database.
pub const NUTRIENT_COLUMNS: &[NutrientColumn] = &[
    NutrientColumn { column: "energy_kcal", label: "Energy", unit: "kcal" },
    NutrientColumn { column: "protein_g", label: "Protein", unit: "g" },
    NutrientColumn { column: "fat_g", label: "Fat", unit: "g" },
    NutrientColumn { column: "saturated_fat_g", label: "Saturated fat", unit: "g" },
    NutrientColumn { column: "monounsaturated_fat_g", label: "Monounsaturated fat", unit: "g" },
    NutrientColumn { column: "polyunsaturated_fat_g", label: "Polyunsaturated fat", unit: "g" },
    NutrientColumn { column: "cholesterol_mg", label: "Cholesterol", unit: "mg" },
    NutrientColumn { column: "carbohydrates_g", label: "Carbohydrates", unit: "g" },
    NutrientColumn { column: "sugars_g", label: "Sugars", unit: "g" },
    NutrientColumn { column: "fiber_g", label: "Fiber", unit: "g" },
    NutrientColumn { column: "salt_g", label: "Salt", unit: "g" },
    NutrientColumn { column: "sodium_mg", label: "Sodium", unit: "mg" },
    NutrientColumn { column: "potassium_mg", label: "Potassium", unit: "mg" },
    NutrientColumn { column: "calcium_mg", label: "Calcium", unit: "mg" },
    NutrientColumn { column: "magnesium_mg", label: "Magnesium", unit: "mg" },
    NutrientColumn { column: "phosphorus_mg", label: "Phosphorus", unit: "mg" },
    NutrientColumn { column: "iron_mg", label: "Iron", unit: "mg" },
    NutrientColumn { column: "zinc_mg", label: "Zinc", unit: "mg" },
    NutrientColumn { column: "iodine_ug", label: "Iodine", unit: "µg" },
    NutrientColumn { column: "selenium_ug", label: "Selenium", unit: "µg" },
    NutrientColumn { column: "vitamin_a_ug", label: "Vitamin A", unit: "µg" },
    NutrientColumn { column: "vitamin_d_ug", label: "Vitamin D", unit: "µg" },
    NutrientColumn { column: "vitamin_e_mg", label: "Vitamin E", unit: "mg" },
    NutrientColumn { column: "thiamin_mg", label: "Thiamin (B1)", unit: "mg" },
    NutrientColumn { column: "riboflavin_mg", label: "Riboflavin (B2)", unit: "mg" },
    NutrientColumn { column: "vitamin_b6_mg", label: "Vitamin B6", unit: "mg" },
    NutrientColumn { column: "vitamin_b12_ug", label: "Vitamin B12", unit: "µg" },
    NutrientColumn { column: "vitamin_c_mg", label: "Vitamin C", unit: "mg" },
    NutrientColumn { column: "folate_ug", label: "Folate", unit: "µg" },
];

/// Look up a nutrient by column name or display label, case-insensitively.
#[must_use]
pub fn find_nutrient(name: &str) -> Option<&'static NutrientColumn> {
    let name = name.trim();
    NUTRIENT_COLUMNS.iter().find(|n| {
        n.column.eq_ignore_ascii_case(name) || n.label.eq_ignore_ascii_case(name)
    })
}

/// Resolve a nutrient name or fail. Aggregation queries interpolate the
/// resolved `column` into SQL, so this check must run before any query text
/// is built.
pub fn validate_nutrient(name: &str) -> Result<&'static NutrientColumn> {
    match find_nutrient(name) {
        Some(n) => Ok(n),
        None => bail!(
            "Unknown nutrient '{name}'. Use one of the known column names, e.g. {}",
            NUTRIENT_COLUMNS
                .iter()
                .take(5)
                .map(|n| n.column)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// Index of a column within [`NUTRIENT_COLUMNS`].
#[must_use]
pub fn nutrient_index(column: &str) -> Option<usize> {
    NUTRIENT_COLUMNS.iter().position(|n| n.column == column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_29_columns() {
        assert_eq!(NUTRIENT_COLUMNS.len(), 29);
    }

    #[test]
    fn test_column_names_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for n in NUTRIENT_COLUMNS {
            assert!(seen.insert(n.column), "duplicate column {}", n.column);
        }
    }

    #[test]
    fn test_find_nutrient_by_column() {
        let n = find_nutrient("energy_kcal").unwrap();
        assert_eq!(n.label, "Energy");
        assert_eq!(n.unit, "kcal");
    }

    #[test]
    fn test_find_nutrient_by_label_case_insensitive() {
        assert_eq!(find_nutrient("vitamin c").unwrap().column, "vitamin_c_mg");
        assert_eq!(find_nutrient("PROTEIN_G").unwrap().column, "protein_g");
    }

    #[test]
    fn test_validate_nutrient_rejects_unknown() {
        assert!(validate_nutrient("DROP TABLE").is_err());
        assert!(validate_nutrient("energy_kcal; --").is_err());
        assert!(validate_nutrient("").is_err());
    }

    #[test]
    fn test_nutrient_index_matches_order() {
        assert_eq!(nutrient_index("energy_kcal"), Some(0));
        assert_eq!(nutrient_index("folate_ug"), Some(28));
        assert_eq!(nutrient_index("nope"), None);
    }
}
