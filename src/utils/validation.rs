//! Validation utilities

use crate::traits::*;
use crate::types::*;
use bigdecimal::BigDecimal;

/// Validate that an amount is positive
pub fn validate_positive_amount(amount: &BigDecimal) -> LedgerResult<()> {
    if *amount <= BigDecimal::from(0) {
        Err(LedgerError::Validation(
            "Amount must be positive".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Validate that an account code is well formed
pub fn validate_account_code(code: &str) -> LedgerResult<()> {
    if code.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Account code cannot be empty".to_string(),
        ));
    }

    if code.len() > 20 {
        return Err(LedgerError::Validation(
            "Account code cannot exceed 20 characters".to_string(),
        ));
    }

    // Alphanumeric plus dashes and dots covers common numbering schemes
    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '.')
    {
        return Err(LedgerError::Validation(
            "Account code can only contain alphanumeric characters, dashes, and dots".to_string(),
        ));
    }

    Ok(())
}

/// Validate that an account name is valid
pub fn validate_account_name(name: &str) -> LedgerResult<()> {
    if name.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Account name cannot be empty".to_string(),
        ));
    }

    if name.len() > 100 {
        return Err(LedgerError::Validation(
            "Account name cannot exceed 100 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate that an entry narration is valid
pub fn validate_narration(narration: &str) -> LedgerResult<()> {
    if narration.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Entry narration cannot be empty".to_string(),
        ));
    }

    if narration.len() > 500 {
        return Err(LedgerError::Validation(
            "Entry narration cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}

/// Enhanced entry validator with detailed checks
pub struct EnhancedEntryValidator;

impl EntryValidator for EnhancedEntryValidator {
    fn validate_entry(&self, entry: &JournalEntry) -> LedgerResult<()> {
        // Basic validation
        entry.validate()?;

        // Enhanced validations
        validate_narration(&entry.narration)?;

        // Check for duplicate accounts (same account cannot appear twice on the same side)
        let mut seen = std::collections::HashSet::new();
        for line in &entry.lines {
            let side = line.side()?;
            if !seen.insert((&line.account_id, side)) {
                return Err(LedgerError::Validation(format!(
                    "Account '{}' appears multiple times on the same side of the entry",
                    line.account_id
                )));
            }
        }

        Ok(())
    }
}

/// Enhanced account validator with detailed checks
pub struct EnhancedAccountValidator;

impl AccountValidator for EnhancedAccountValidator {
    fn validate_account(&self, account: &Account) -> LedgerResult<()> {
        validate_account_code(&account.code)?;
        validate_account_name(&account.name)?;

        // Additional validations can be added here
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_amounts_only() {
        assert!(validate_positive_amount(&BigDecimal::from(1)).is_ok());
        assert!(validate_positive_amount(&BigDecimal::from(0)).is_err());
        assert!(validate_positive_amount(&BigDecimal::from(-5)).is_err());
    }

    #[test]
    fn account_code_shape() {
        assert!(validate_account_code("1001").is_ok());
        assert!(validate_account_code("1001.2-A").is_ok());
        assert!(validate_account_code("").is_err());
        assert!(validate_account_code("code with spaces").is_err());
    }

    #[test]
    fn narration_length_limits() {
        assert!(validate_narration("Monthly rent").is_ok());
        assert!(validate_narration("   ").is_err());
        assert!(validate_narration(&"x".repeat(501)).is_err());
    }
}
