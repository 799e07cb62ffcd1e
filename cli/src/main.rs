mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use crate::commands::{
    cmd_breakdown, cmd_export, cmd_food_add, cmd_food_delete, cmd_food_list, cmd_food_show,
    cmd_food_update, cmd_import_foods, cmd_import_log, cmd_intake, cmd_library_add,
    cmd_library_delete, cmd_library_list, cmd_log_add, cmd_log_delete, cmd_log_list,
    cmd_log_update, cmd_stats,
};
use crate::config::Config;
use intake_core::db::Database;

#[derive(Parser)]
#[command(
    name = "intake",
    version,
    about = "Track per-subject food consumption against a nutrient composition library"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage food composition libraries
    Library {
        #[command(subcommand)]
        command: LibraryCommands,
    },
    /// Manage food composition records
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
    /// Manage consumption log entries
    Log {
        #[command(subcommand)]
        command: LogCommands,
    },
    /// Bulk-import foods or log entries from a file
    Import {
        #[command(subcommand)]
        command: ImportCommands,
    },
    /// Show total nutrient intake for a subject over a date range
    Intake {
        /// Subject identifier
        subject: String,
        /// Start date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        from: Option<String>,
        /// End date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        to: Option<String>,
        /// Library to read composition values from (id or name, default: Default)
        #[arg(short, long)]
        library: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Break one nutrient down by day, food, or meal
    Breakdown {
        /// Subject identifier
        subject: String,
        /// Nutrient column or label (e.g. energy_kcal, "Vitamin C")
        #[arg(short, long)]
        nutrient: String,
        /// Grouping: day, food, or meal
        #[arg(short, long, default_value = "day")]
        by: String,
        /// Start date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        from: Option<String>,
        /// End date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        to: Option<String>,
        /// Library to read composition values from (id or name, default: Default)
        #[arg(short, long)]
        library: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Descriptive statistics over per-subject daily averages
    Stats {
        /// Comma-separated subject identifiers
        subjects: String,
        /// Nutrient column or label
        #[arg(short, long)]
        nutrient: String,
        /// Start date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        from: Option<String>,
        /// End date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        to: Option<String>,
        /// Library to read composition values from (id or name, default: Default)
        #[arg(short, long)]
        library: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export an intake report to a .csv or .xlsx file
    Export {
        /// Subject identifier
        subject: String,
        /// Output path; the extension picks the format
        #[arg(short, long)]
        out: PathBuf,
        /// Start date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        from: Option<String>,
        /// End date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        to: Option<String>,
        /// Library to read composition values from (id or name, default: Default)
        #[arg(short, long)]
        library: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum LibraryCommands {
    /// List libraries
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a library
    Add {
        /// Library name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a library (cascades to its foods and log entries)
    Delete {
        /// Library id or name
        library: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FoodCommands {
    /// Add a food record
    Add {
        /// Food name
        name: String,
        /// Library to add it to (id or name, default: Default)
        #[arg(short, long)]
        library: Option<String>,
        /// Nutrient value per 100 g, e.g. --set energy_kcal=370 (repeatable)
        #[arg(long = "set", value_name = "COLUMN=VALUE")]
        set: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List or search foods in a library
    List {
        /// Library (id or name, default: Default)
        #[arg(short, long)]
        library: Option<String>,
        /// Search query to filter foods
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one food's full composition
    Show {
        /// Food ID
        food_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace a food record (name and all nutrient values)
    Update {
        /// Food ID
        food_id: i64,
        /// New food name
        name: String,
        /// Nutrient value per 100 g, e.g. --set energy_kcal=370 (repeatable)
        #[arg(long = "set", value_name = "COLUMN=VALUE")]
        set: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a food (cascades to its log entries)
    Delete {
        /// Food ID
        food_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum LogCommands {
    /// Log a consumption entry
    Add {
        /// Subject identifier
        subject: String,
        /// Food name or ID
        food: String,
        /// Grams consumed
        grams: f64,
        /// Library the food belongs to (id or name, default: Default)
        #[arg(short, long)]
        library: Option<String>,
        /// Date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Meal category (free text, optional)
        #[arg(short, long)]
        meal: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List a subject's entries over a date range
    List {
        /// Subject identifier
        subject: String,
        /// Start date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        from: Option<String>,
        /// End date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        to: Option<String>,
        /// Restrict to one library (id or name)
        #[arg(short, long)]
        library: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change the grams of an entry
    Update {
        /// Entry ID
        entry_id: i64,
        /// New grams value
        grams: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an entry
    Delete {
        /// Entry ID
        entry_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ImportCommands {
    /// Import food composition rows into one library
    Foods {
        /// Path to a spreadsheet (.xlsx/.ods) or semicolon-delimited text file
        file: PathBuf,
        /// Destination library (id or name, default: Default)
        #[arg(short, long)]
        library: Option<String>,
        /// Force the source format: spreadsheet or delimited
        #[arg(long)]
        format: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import consumption-log rows from a comma-delimited file
    Log {
        /// Path to the log CSV file
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::open(&config.db_path)?;

    match cli.command {
        Commands::Library { command } => match command {
            LibraryCommands::List { json } => cmd_library_list(&db, json),
            LibraryCommands::Add { name, json } => cmd_library_add(&db, &name, json),
            LibraryCommands::Delete { library, json } => cmd_library_delete(&db, &library, json),
        },
        Commands::Food { command } => match command {
            FoodCommands::Add {
                name,
                library,
                set,
                json,
            } => cmd_food_add(&db, &name, library.as_deref(), &set, json),
            FoodCommands::List {
                library,
                search,
                json,
            } => cmd_food_list(&db, library.as_deref(), search.as_deref(), json),
            FoodCommands::Show { food_id, json } => cmd_food_show(&db, food_id, json),
            FoodCommands::Update {
                food_id,
                name,
                set,
                json,
            } => cmd_food_update(&db, food_id, &name, &set, json),
            FoodCommands::Delete { food_id, json } => cmd_food_delete(&db, food_id, json),
        },
        Commands::Log { command } => match command {
            LogCommands::Add {
                subject,
                food,
                grams,
                library,
                date,
                meal,
                json,
            } => cmd_log_add(&db, &subject, &food, grams, library.as_deref(), date, meal, json),
            LogCommands::List {
                subject,
                from,
                to,
                library,
                json,
            } => cmd_log_list(&db, &subject, from, to, library.as_deref(), json),
            LogCommands::Update {
                entry_id,
                grams,
                json,
            } => cmd_log_update(&db, entry_id, grams, json),
            LogCommands::Delete { entry_id, json } => cmd_log_delete(&db, entry_id, json),
        },
        Commands::Import { command } => match command {
            ImportCommands::Foods {
                file,
                library,
                format,
                json,
            } => cmd_import_foods(&db, &file, library.as_deref(), format.as_deref(), json),
            ImportCommands::Log { file, json } => cmd_import_log(&db, &file, json),
        },
        Commands::Intake {
            subject,
            from,
            to,
            library,
            json,
        } => cmd_intake(&db, &subject, from, to, library.as_deref(), json),
        Commands::Breakdown {
            subject,
            nutrient,
            by,
            from,
            to,
            library,
            json,
        } => cmd_breakdown(&db, &subject, &nutrient, &by, from, to, library.as_deref(), json),
        Commands::Stats {
            subjects,
            nutrient,
            from,
            to,
            library,
            json,
        } => cmd_stats(&db, &subjects, &nutrient, from, to, library.as_deref(), json),
        Commands::Export {
            subject,
            out,
            from,
            to,
            library,
            json,
        } => cmd_export(&db, &subject, &out, from, to, library.as_deref(), json),
    }
}
