//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::recurring::RecurringTemplate;
use crate::types::*;

/// Filter for journal-entry queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryFilter {
    /// Inclusive lower bound on `entry_date`
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on `entry_date`
    pub to: Option<NaiveDate>,
    /// Restrict to a lifecycle state
    pub status: Option<EntryStatus>,
    /// Restrict to entries touching one account
    pub account_id: Option<String>,
    /// Restrict to one fiscal year
    pub fiscal_year_id: Option<String>,
}

/// Storage abstraction for the ledger system.
///
/// This trait allows the engine to work with any backend (PostgreSQL, SQLite,
/// in-memory, etc.). Implementations must scope every record by company.
///
/// Contract for writers: `next_entry_number` must hand out monotonically
/// increasing numbers per company + fiscal year, and `save_entry` must reject
/// a duplicate `(company, fiscal_year, entry_number)` with
/// [`LedgerError::Concurrency`] so the posting engine can retry allocation.
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    // Chart of accounts
    async fn save_account(&mut self, account: &Account) -> LedgerResult<()>;
    async fn get_account(&self, company_id: &str, account_id: &str)
        -> LedgerResult<Option<Account>>;
    async fn get_account_by_code(
        &self,
        company_id: &str,
        code: &str,
    ) -> LedgerResult<Option<Account>>;
    async fn list_accounts(
        &self,
        company_id: &str,
        account_type: Option<AccountType>,
    ) -> LedgerResult<Vec<Account>>;
    async fn update_account(&mut self, account: &Account) -> LedgerResult<()>;

    // Journal entries
    async fn save_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()>;
    async fn get_entry(&self, company_id: &str, entry_id: Uuid)
        -> LedgerResult<Option<JournalEntry>>;
    async fn list_entries(
        &self,
        company_id: &str,
        filter: &EntryFilter,
    ) -> LedgerResult<Vec<JournalEntry>>;
    async fn update_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()>;

    /// Allocate the next sequential entry number for a company + fiscal year.
    /// Must be atomic with respect to concurrent allocations.
    async fn next_entry_number(
        &mut self,
        company_id: &str,
        fiscal_year_id: &str,
    ) -> LedgerResult<u32>;

    // Fiscal years
    async fn save_fiscal_year(&mut self, fiscal_year: &FiscalYear) -> LedgerResult<()>;
    async fn get_fiscal_year(
        &self,
        company_id: &str,
        fiscal_year_id: &str,
    ) -> LedgerResult<Option<FiscalYear>>;
    /// The fiscal year whose range covers `date`, if any.
    async fn fiscal_year_for_date(
        &self,
        company_id: &str,
        date: NaiveDate,
    ) -> LedgerResult<Option<FiscalYear>>;
    async fn list_fiscal_years(&self, company_id: &str) -> LedgerResult<Vec<FiscalYear>>;

    // Recurring templates
    async fn save_template(&mut self, template: &RecurringTemplate) -> LedgerResult<()>;
    async fn get_template(
        &self,
        company_id: &str,
        template_id: &str,
    ) -> LedgerResult<Option<RecurringTemplate>>;
    async fn list_templates(&self, company_id: &str) -> LedgerResult<Vec<RecurringTemplate>>;
    async fn update_template(&mut self, template: &RecurringTemplate) -> LedgerResult<()>;
}

/// Trait for implementing custom account validation rules
pub trait AccountValidator: Send + Sync {
    /// Validate an account before saving
    fn validate_account(&self, account: &Account) -> LedgerResult<()>;
}

/// Trait for implementing custom entry validation rules
pub trait EntryValidator: Send + Sync {
    /// Validate an entry's structure before it is stored or posted
    fn validate_entry(&self, entry: &JournalEntry) -> LedgerResult<()>;
}

/// Default account validator with basic rules
pub struct DefaultAccountValidator;

impl AccountValidator for DefaultAccountValidator {
    fn validate_account(&self, account: &Account) -> LedgerResult<()> {
        if account.id.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account ID cannot be empty".to_string(),
            ));
        }
        if account.code.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account code cannot be empty".to_string(),
            ));
        }
        if account.name.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default entry validator enforcing the double-entry rules
pub struct DefaultEntryValidator;

impl EntryValidator for DefaultEntryValidator {
    fn validate_entry(&self, entry: &JournalEntry) -> LedgerResult<()> {
        entry.validate()
    }
}
