// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Result};
use rusqlite::Connection;
use std::env;
use std::path::Path;

use finance_dashboard::{
    insert_spending, load_csv, seed_categories, setup_database, verify_count, Config,
};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("init") => run_init()?,
        Some("import") => {
            let Some(csv_path) = args.get(2) else {
                eprintln!("Usage: finance-dashboard import <csv-file>");
                std::process::exit(2);
            };
            run_import(Path::new(csv_path))?;
        }
        Some("export") => {
            let Some(csv_path) = args.get(2) else {
                eprintln!("Usage: finance-dashboard export <csv-file>");
                std::process::exit(2);
            };
            run_export(Path::new(csv_path))?;
        }
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            eprintln!("Commands: init | import <csv> | export <csv>");
            eprintln!("Run with no arguments to open the register.");
            std::process::exit(2);
        }
        None => run_ui_mode()?,
    }

    Ok(())
}

fn open_database(config: &Config) -> Result<Connection> {
    if !config.db_path.exists() {
        bail!(
            "Database not found at {:?}. Run: finance-dashboard init",
            config.db_path
        );
    }
    Ok(Connection::open(&config.db_path)?)
}

fn run_init() -> Result<()> {
    let config = Config::load()?;

    println!("🗄️  Creating spending database...");

    config.ensure_data_dir()?;
    let conn = Connection::open(&config.db_path)?;
    setup_database(&conn)?;
    println!("✓ Database initialized with WAL mode: {:?}", config.db_path);

    let seeded = seed_categories(&conn)?;
    if seeded > 0 {
        println!("✓ Seeded {} starter categories", seeded);
    }

    println!("\n🎉 Ready! Record spending from the dashboard:");
    println!("   cargo run --bin dashboard-server --features server");

    Ok(())
}

fn run_import(csv_path: &Path) -> Result<()> {
    let config = Config::load()?;

    // 1. Load CSV
    println!("📂 Loading CSV...");
    let entries = load_csv(csv_path)?;
    println!("✓ Loaded {} entries from {:?}", entries.len(), csv_path);

    // 2. Open database
    let conn = open_database(&config)?;

    // 3. Insert entries (idempotent - re-imports skip duplicates)
    println!("\n💾 Inserting entries...");
    let stats = insert_spending(&conn, &entries)?;
    println!("✓ Inserted: {} entries", stats.inserted);
    println!("✓ Skipped duplicates: {}", stats.duplicates);

    // 4. Verify count
    let count = verify_count(&conn)?;
    println!("\n🔍 Database contains {} entries", count);

    Ok(())
}

fn run_export(csv_path: &Path) -> Result<()> {
    let config = Config::load()?;
    let conn = open_database(&config)?;

    let written = finance_dashboard::export_csv(&conn, csv_path)?;
    println!("✓ Exported {} entries to {:?}", written, csv_path);

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode() -> Result<()> {
    let config = Config::load()?;

    if !config.db_path.exists() {
        eprintln!("❌ Database not found!");
        eprintln!("   Run: finance-dashboard init");
        eprintln!("   then record spending or import a CSV.");
        std::process::exit(1);
    }

    let conn = Connection::open(&config.db_path)?;

    println!("📊 Loading spending register...");
    let entries = finance_dashboard::get_all_spending(&conn)?;
    let categories = finance_dashboard::get_categories(&conn)?;
    let total_count = verify_count(&conn)?;

    println!("✓ Loaded {} entries\n", entries.len());
    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(entries, categories, total_count);
    ui::run_ui(&mut app)?;

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode() -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the web dashboard: cargo run --bin dashboard-server --features server");
    std::process::exit(1);
}
