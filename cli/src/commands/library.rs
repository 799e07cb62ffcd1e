use anyhow::Result;
use tabled::{Table, Tabled, settings::Style};

use intake_core::db::Database;
use intake_core::models::validate_library_name;

use super::helpers::resolve_library;

pub(crate) fn cmd_library_list(db: &Database, json: bool) -> Result<()> {
    let libraries = db.list_libraries()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&libraries)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct LibraryRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Foods")]
        foods: i64,
    }

    let mut rows = Vec::new();
    for library in &libraries {
        rows.push(LibraryRow {
            id: library.id,
            name: library.name.clone(),
            foods: db.count_foods(library.id)?,
        });
    }

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_library_add(db: &Database, name: &str, json: bool) -> Result<()> {
    let name = validate_library_name(name)?;
    let library = db.create_library(&name)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&library)?);
    } else {
        println!("Created library [{}] {}", library.id, library.name);
    }
    Ok(())
}

pub(crate) fn cmd_library_delete(db: &Database, spec: &str, json: bool) -> Result<()> {
    let library = resolve_library(db, Some(spec))?;
    let deleted = db.delete_library(library.id)?;

    if json {
        println!("{}", serde_json::json!({ "deleted": deleted, "id": library.id }));
    } else if deleted {
        println!(
            "Deleted library [{}] {} and everything that referenced it",
            library.id, library.name
        );
    } else {
        eprintln!("Library [{}] not found", library.id);
    }
    Ok(())
}
