use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// A single spending record in the register.
///
/// Identity (`id`, a UUID) is separate from deduplication (the idempotency
/// hash): the hash is derived from the entry's values so that re-importing
/// the same CSV never creates duplicate rows, while the UUID stays stable
/// for API consumers.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SpendingEntry {
    /// Stable identity (UUID), assigned when the entry is created
    #[serde(default)]
    pub id: String,

    /// Amount spent (positive numbers are money going out)
    pub amount: f64,

    /// Category name this entry is filed under
    pub category: String,

    /// Free-form note
    #[serde(default)]
    pub note: String,

    /// When the spending occurred
    pub timestamp: DateTime<Utc>,
}

impl SpendingEntry {
    pub fn new(amount: f64, category: &str, note: &str, timestamp: DateTime<Utc>) -> Self {
        SpendingEntry {
            id: uuid::Uuid::new_v4().to_string(),
            amount,
            category: category.to_string(),
            note: note.to_string(),
            timestamp,
        }
    }

    /// Compute idempotency hash for duplicate detection.
    /// NOTE: this is for DEDUPLICATION, not IDENTITY - identity is `id`.
    pub fn compute_idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}{}{}",
            self.amount,
            self.category,
            self.timestamp.to_rfc3339()
        ));
        format!("{:x}", hasher.finalize())
    }

    /// Calendar date of the spending (UTC)
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Outcome of inserting a single entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Inserted,
    Duplicate,
}

/// Counters returned by a bulk import
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportStats {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Per-category aggregate for the overview page and reports
#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub category: String,
    pub entry_count: i64,
    pub total_spent: f64,
    pub date_range: String,
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Spending Register Table
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS spending (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_uuid TEXT UNIQUE NOT NULL,
            idempotency_hash TEXT UNIQUE NOT NULL,
            amount REAL NOT NULL,
            category TEXT NOT NULL,
            note TEXT,
            timestamp TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Categories Table
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category_name TEXT UNIQUE NOT NULL COLLATE NOCASE,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_spending_hash ON spending(idempotency_hash)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_spending_category ON spending(category)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_spending_timestamp ON spending(timestamp)",
        [],
    )?;

    Ok(())
}

/// Categories every fresh database starts with
pub const STARTER_CATEGORIES: &[&str] = &[
    "Groceries",
    "Restaurants",
    "Transportation",
    "Shopping",
    "Utilities",
    "Entertainment",
];

/// Seed the starter category set (idempotent)
pub fn seed_categories(conn: &Connection) -> Result<usize> {
    let mut added = 0;
    for name in STARTER_CATEGORIES {
        let changed = conn.execute(
            "INSERT OR IGNORE INTO categories (category_name) VALUES (?1)",
            params![name],
        )?;
        added += changed;
    }
    Ok(added)
}

/// All category names, ordered alphabetically
pub fn get_categories(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT category_name FROM categories ORDER BY category_name COLLATE NOCASE")?;

    let categories = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    Ok(categories)
}

/// Add a new category.
///
/// Name validation happens at the edges (CLI / HTTP handlers) via the
/// `validate` module; here a case-insensitive duplicate is the only failure.
pub fn add_category(conn: &Connection, name: &str) -> Result<()> {
    let result = conn.execute(
        "INSERT INTO categories (category_name) VALUES (?1)",
        params![name],
    );

    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            bail!("category already exists: {}", name)
        }
        Err(e) => Err(e).context("failed to insert category"),
    }
}

/// Record a single spending entry (the web form path).
///
/// Unlike the bulk import, a duplicate here is reported to the caller so the
/// form can tell the user instead of silently dropping the submission.
pub fn record_spending(conn: &Connection, entry: &SpendingEntry) -> Result<RecordOutcome> {
    let hash = entry.compute_idempotency_hash();

    // Deserialized entries may arrive without a UUID
    let entry_id = if entry.id.is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        entry.id.clone()
    };

    // Auto-register the category so the register and dropdowns stay in sync
    conn.execute(
        "INSERT OR IGNORE INTO categories (category_name) VALUES (?1)",
        params![entry.category],
    )?;

    let result = conn.execute(
        "INSERT INTO spending (entry_uuid, idempotency_hash, amount, category, note, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry_id,
            hash,
            entry.amount,
            entry.category,
            entry.note,
            entry.timestamp.to_rfc3339(),
        ],
    );

    match result {
        Ok(_) => Ok(RecordOutcome::Inserted),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Ok(RecordOutcome::Duplicate)
        }
        Err(e) => Err(e).context("failed to insert spending entry"),
    }
}

/// Bulk insert (the CSV import path). Duplicate hashes are skipped and counted.
pub fn insert_spending(conn: &Connection, entries: &[SpendingEntry]) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    for entry in entries {
        match record_spending(conn, entry)? {
            RecordOutcome::Inserted => stats.inserted += 1,
            RecordOutcome::Duplicate => stats.duplicates += 1,
        }
    }

    Ok(stats)
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<SpendingEntry> {
    let timestamp_str: String = row.get(4)?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
        .map_err(|_| rusqlite::Error::InvalidQuery)?
        .with_timezone(&Utc);

    Ok(SpendingEntry {
        id: row.get(0)?,
        amount: row.get(1)?,
        category: row.get(2)?,
        note: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        timestamp,
    })
}

/// Full register, newest first
pub fn get_all_spending(conn: &Connection) -> Result<Vec<SpendingEntry>> {
    let mut stmt = conn.prepare(
        "SELECT entry_uuid, amount, category, note, timestamp
         FROM spending
         ORDER BY timestamp DESC",
    )?;

    let entries = stmt
        .query_map([], row_to_entry)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

/// Register entries for one category, newest first
pub fn get_spending_by_category(conn: &Connection, category: &str) -> Result<Vec<SpendingEntry>> {
    let mut stmt = conn.prepare(
        "SELECT entry_uuid, amount, category, note, timestamp
         FROM spending
         WHERE category = ?1
         ORDER BY timestamp DESC",
    )?;

    let entries = stmt
        .query_map([category], row_to_entry)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM spending", [], |row| row.get(0))?;

    Ok(count)
}

/// Per-category aggregates via SQL grouping
pub fn category_summaries(conn: &Connection) -> Result<Vec<CategorySummary>> {
    let mut stmt = conn.prepare(
        "SELECT
            category,
            COUNT(*) as count,
            SUM(amount) as total,
            substr(MIN(timestamp), 1, 10) || ' - ' || substr(MAX(timestamp), 1, 10) as date_range
         FROM spending
         GROUP BY category
         ORDER BY total DESC",
    )?;

    let summaries = stmt
        .query_map([], |row| {
            Ok(CategorySummary {
                category: row.get(0)?,
                entry_count: row.get(1)?,
                total_spent: row.get(2)?,
                date_range: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(summaries)
}

// ============================================================================
// CSV Import / Export
// ============================================================================

/// One line of an import file, before timestamp parsing
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(rename = "Amount")]
    amount: f64,

    #[serde(rename = "Category")]
    category: String,

    #[serde(rename = "Note", default)]
    note: String,

    #[serde(rename = "Timestamp")]
    timestamp: String,
}

/// Parse an import timestamp: RFC 3339, or a bare `YYYY-MM-DD` date
/// (interpreted as midnight UTC)
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("unrecognized timestamp: {}", raw))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .context("invalid midnight timestamp")?;

    Ok(midnight.and_utc())
}

pub fn load_csv(csv_path: &Path) -> Result<Vec<SpendingEntry>> {
    let mut rdr = csv::Reader::from_path(csv_path).context("Failed to open CSV file")?;

    let mut entries = Vec::new();

    for (line, result) in rdr.deserialize().enumerate() {
        let record: CsvRecord =
            result.with_context(|| format!("Failed to parse CSV record {}", line + 1))?;

        let timestamp = parse_timestamp(&record.timestamp)
            .with_context(|| format!("Bad timestamp on CSV record {}", line + 1))?;

        entries.push(SpendingEntry::new(
            record.amount,
            &record.category,
            &record.note,
            timestamp,
        ));
    }

    Ok(entries)
}

/// Write the full register out as CSV (headers match the import format)
pub fn export_csv(conn: &Connection, csv_path: &Path) -> Result<usize> {
    let entries = get_all_spending(conn)?;

    let mut wtr = csv::Writer::from_path(csv_path).context("Failed to create CSV file")?;
    wtr.write_record(["Amount", "Category", "Note", "Timestamp"])?;

    for entry in &entries {
        wtr.write_record([
            entry.amount.to_string(),
            entry.category.clone(),
            entry.note.clone(),
            entry.timestamp.to_rfc3339(),
        ])?;
    }

    wtr.flush()?;
    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_entry(amount: f64, category: &str, timestamp: &str) -> SpendingEntry {
        SpendingEntry::new(
            amount,
            category,
            "",
            DateTime::parse_from_rfc3339(timestamp)
                .unwrap()
                .with_timezone(&Utc),
        )
    }

    #[test]
    fn test_idempotency_import_twice() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let entries = vec![
            test_entry(45.99, "Restaurants", "2024-12-31T12:00:00Z"),
            test_entry(120.50, "Shopping", "2024-12-30T09:30:00Z"),
            test_entry(18.25, "Groceries", "2024-12-29T17:45:00Z"),
        ];

        let first = insert_spending(&conn, &entries).unwrap();
        assert_eq!(first.inserted, 3);
        assert_eq!(first.duplicates, 0);
        assert_eq!(verify_count(&conn).unwrap(), 3);

        // Second import (same entries) inserts nothing
        let second = insert_spending(&conn, &entries).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 3);
        assert_eq!(verify_count(&conn).unwrap(), 3);

        println!("✅ Idempotency test PASSED: 0 duplicates inserted on second import");
    }

    #[test]
    fn test_record_spending_reports_duplicate() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let entry = test_entry(10.0, "Groceries", "2024-06-01T08:00:00Z");

        assert_eq!(
            record_spending(&conn, &entry).unwrap(),
            RecordOutcome::Inserted
        );
        assert_eq!(
            record_spending(&conn, &entry).unwrap(),
            RecordOutcome::Duplicate
        );
        assert_eq!(verify_count(&conn).unwrap(), 1);
    }

    #[test]
    fn test_compute_idempotency_hash() {
        let entry = test_entry(50.0, "Groceries", "2024-12-31T12:00:00Z");

        let hash1 = entry.compute_idempotency_hash();
        let hash2 = entry.compute_idempotency_hash();

        assert_eq!(hash1, hash2, "Same entry should produce same hash");
        assert_eq!(hash1.len(), 64, "SHA-256 hash should be 64 hex characters");

        // Hash follows values, not identity
        let mut other = entry.clone();
        other.id = uuid::Uuid::new_v4().to_string();
        assert_eq!(other.compute_idempotency_hash(), hash1);

        let different = test_entry(50.01, "Groceries", "2024-12-31T12:00:00Z");
        assert_ne!(different.compute_idempotency_hash(), hash1);
    }

    #[test]
    fn test_categories_add_and_list() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        add_category(&conn, "Groceries").unwrap();
        add_category(&conn, "Entertainment").unwrap();

        let categories = get_categories(&conn).unwrap();
        assert_eq!(categories, vec!["Entertainment", "Groceries"]);

        // Case-insensitive duplicate is rejected
        let err = add_category(&conn, "groceries").unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_import_auto_registers_categories() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let entries = vec![test_entry(9.99, "Coffee", "2024-05-05T10:00:00Z")];
        insert_spending(&conn, &entries).unwrap();

        let categories = get_categories(&conn).unwrap();
        assert!(categories.contains(&"Coffee".to_string()));
    }

    #[test]
    fn test_seed_categories_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let added = seed_categories(&conn).unwrap();
        assert_eq!(added, STARTER_CATEGORIES.len());

        let again = seed_categories(&conn).unwrap();
        assert_eq!(again, 0);
    }

    #[test]
    fn test_category_summaries() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let entries = vec![
            test_entry(10.0, "Groceries", "2024-01-01T08:00:00Z"),
            test_entry(20.0, "Groceries", "2024-01-15T08:00:00Z"),
            test_entry(5.0, "Coffee", "2024-01-10T08:00:00Z"),
        ];
        insert_spending(&conn, &entries).unwrap();

        let summaries = category_summaries(&conn).unwrap();
        assert_eq!(summaries.len(), 2);

        // Ordered by total, descending
        assert_eq!(summaries[0].category, "Groceries");
        assert_eq!(summaries[0].entry_count, 2);
        assert!((summaries[0].total_spent - 30.0).abs() < f64::EPSILON);
        assert_eq!(summaries[0].date_range, "2024-01-01 - 2024-01-15");

        assert_eq!(summaries[1].category, "Coffee");
    }

    #[test]
    fn test_spending_ordered_newest_first() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let entries = vec![
            test_entry(1.0, "Groceries", "2024-01-01T08:00:00Z"),
            test_entry(2.0, "Groceries", "2024-03-01T08:00:00Z"),
            test_entry(3.0, "Groceries", "2024-02-01T08:00:00Z"),
        ];
        insert_spending(&conn, &entries).unwrap();

        let all = get_all_spending(&conn).unwrap();
        assert_eq!(all[0].amount, 2.0);
        assert_eq!(all[1].amount, 3.0);
        assert_eq!(all[2].amount, 1.0);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = parse_timestamp("2024-06-01T08:30:00Z").unwrap();
        assert_eq!(rfc, Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap());

        let bare = parse_timestamp("2024-06-01").unwrap();
        assert_eq!(bare, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());

        assert!(parse_timestamp("06/01/2024").is_err());
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("spending.csv");

        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let entries = vec![
            test_entry(12.34, "Groceries", "2024-04-01T10:00:00Z"),
            test_entry(56.78, "Shopping", "2024-04-02T11:00:00Z"),
        ];
        insert_spending(&conn, &entries).unwrap();

        let exported = export_csv(&conn, &csv_path).unwrap();
        assert_eq!(exported, 2);

        let reloaded = load_csv(&csv_path).unwrap();
        assert_eq!(reloaded.len(), 2);

        // Re-importing the export into the same database is a no-op
        let stats = insert_spending(&conn, &reloaded).unwrap();
        assert_eq!(stats.inserted, 0);
        assert_eq!(stats.duplicates, 2);
    }
}
