// Input validation shared by the CLI, the importer, and the HTTP handlers

use crate::db::SpendingEntry;

pub const MAX_CATEGORY_NAME_LEN: usize = 64;
pub const MAX_AMOUNT: f64 = 1_000_000_000.0;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Category names: non-empty, bounded length, alphanumeric plus a small set
/// of separators so names like "Food & Dining" are accepted.
pub fn validate_category_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::new("category", "name must not be empty"));
    }

    if trimmed.chars().count() > MAX_CATEGORY_NAME_LEN {
        return Err(ValidationError::new(
            "category",
            format!("name must be at most {} characters", MAX_CATEGORY_NAME_LEN),
        ));
    }

    if !trimmed
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '&'))
    {
        return Err(ValidationError::new(
            "category",
            "name may only contain letters, digits, spaces, '-', '_' and '&'",
        ));
    }

    // At least one real character, not just separators
    if !trimmed.chars().any(|c| c.is_alphanumeric()) {
        return Err(ValidationError::new(
            "category",
            "name must contain at least one letter or digit",
        ));
    }

    Ok(())
}

/// Amounts: finite, non-zero, bounded
pub fn validate_amount(amount: f64) -> Result<(), ValidationError> {
    if !amount.is_finite() {
        return Err(ValidationError::new("amount", "must be a finite number"));
    }

    if amount == 0.0 {
        return Err(ValidationError::new("amount", "must not be zero"));
    }

    if amount.abs() >= MAX_AMOUNT {
        return Err(ValidationError::new(
            "amount",
            format!("magnitude must be below {}", MAX_AMOUNT),
        ));
    }

    Ok(())
}

/// Validate a full entry, collecting every failure
pub fn validate_entry(entry: &SpendingEntry) -> ValidationResult {
    let mut errors = Vec::new();

    if let Err(e) = validate_amount(entry.amount) {
        errors.push(e);
    }

    if let Err(e) = validate_category_name(&entry.category) {
        errors.push(e);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_category_names() {
        assert!(validate_category_name("Groceries").is_ok());
        assert!(validate_category_name("Food & Dining").is_ok());
        assert!(validate_category_name("gas-fuel_2024").is_ok());
        assert!(validate_category_name("Café").is_ok());

        assert!(validate_category_name("").is_err());
        assert!(validate_category_name("   ").is_err());
        assert!(validate_category_name("&&&").is_err());
        assert!(validate_category_name("rm -rf; DROP TABLE").is_err());
        assert!(validate_category_name(&"x".repeat(65)).is_err());
        assert!(validate_category_name(&"x".repeat(64)).is_ok());
    }

    #[test]
    fn test_amounts() {
        assert!(validate_amount(12.50).is_ok());
        assert!(validate_amount(-3.0).is_ok());

        assert!(validate_amount(0.0).is_err());
        assert!(validate_amount(f64::NAN).is_err());
        assert!(validate_amount(f64::INFINITY).is_err());
        assert!(validate_amount(1_000_000_000.0).is_err());
    }

    #[test]
    fn test_validate_entry_collects_all_errors() {
        let entry = SpendingEntry::new(0.0, "", "", Utc::now());

        let errors = validate_entry(&entry).unwrap_err();
        assert_eq!(errors.len(), 2);

        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"amount"));
        assert!(fields.contains(&"category"));
    }

    #[test]
    fn test_validate_entry_ok() {
        let entry = SpendingEntry::new(19.99, "Groceries", "weekly shop", Utc::now());
        assert!(validate_entry(&entry).is_ok());
    }
}
