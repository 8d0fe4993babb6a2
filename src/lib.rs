// Personal Finance Dashboard - Core Library
// Exposes all modules for use in the CLI, dashboard server, and tests

pub mod config;
pub mod db;
pub mod trends;
pub mod validate;

// Re-export commonly used types
pub use config::Config;
pub use db::{
    add_category, category_summaries, export_csv, get_all_spending, get_categories,
    get_spending_by_category, insert_spending, load_csv, record_spending, seed_categories,
    setup_database, verify_count, CategorySummary, ImportStats, RecordOutcome, SpendingEntry,
};
pub use trends::{
    bucket_start, trend_for_category, trends_for_categories, TrendFrequency, TrendPoint,
    TrendSeries,
};
pub use validate::{
    validate_amount, validate_category_name, validate_entry, ValidationError, ValidationResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
