//! In-memory storage implementation for testing

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

use crate::recurring::RecurringTemplate;
use crate::traits::*;
use crate::types::*;

/// In-memory storage implementation for testing and development.
///
/// Clones share the underlying maps, so a ledger and its components built
/// from clones of one instance all observe the same data. Every record is
/// keyed by company so cross-company reads come back empty.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    accounts: Arc<RwLock<HashMap<(CompanyId, String), Account>>>,
    entries: Arc<RwLock<HashMap<(CompanyId, Uuid), JournalEntry>>>,
    fiscal_years: Arc<RwLock<HashMap<(CompanyId, String), FiscalYear>>>,
    templates: Arc<RwLock<HashMap<(CompanyId, String), RecurringTemplate>>>,
    /// Number sequences per (company, fiscal year); Mutex keeps allocation atomic
    sequences: Arc<Mutex<HashMap<(CompanyId, String), u32>>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            entries: Arc::new(RwLock::new(HashMap::new())),
            fiscal_years: Arc::new(RwLock::new(HashMap::new())),
            templates: Arc::new(RwLock::new(HashMap::new())),
            sequences: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        self.accounts.write().unwrap().clear();
        self.entries.write().unwrap().clear();
        self.fiscal_years.write().unwrap().clear();
        self.templates.write().unwrap().clear();
        self.sequences.lock().unwrap().clear();
    }

    fn matches(entry: &JournalEntry, filter: &EntryFilter) -> bool {
        if filter.from.is_some_and(|from| entry.entry_date < from) {
            return false;
        }
        if filter.to.is_some_and(|to| entry.entry_date > to) {
            return false;
        }
        if filter.status.is_some_and(|status| entry.status != status) {
            return false;
        }
        if filter
            .account_id
            .as_ref()
            .is_some_and(|id| !entry.lines.iter().any(|l| &l.account_id == id))
        {
            return false;
        }
        if filter
            .fiscal_year_id
            .as_ref()
            .is_some_and(|fy| &entry.fiscal_year_id != fy)
        {
            return false;
        }
        true
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStorage for MemoryStorage {
    async fn save_account(&mut self, account: &Account) -> LedgerResult<()> {
        self.accounts.write().unwrap().insert(
            (account.company_id.clone(), account.id.clone()),
            account.clone(),
        );
        Ok(())
    }

    async fn get_account(
        &self,
        company_id: &str,
        account_id: &str,
    ) -> LedgerResult<Option<Account>> {
        Ok(self
            .accounts
            .read()
            .unwrap()
            .get(&(company_id.to_string(), account_id.to_string()))
            .cloned())
    }

    async fn get_account_by_code(
        &self,
        company_id: &str,
        code: &str,
    ) -> LedgerResult<Option<Account>> {
        Ok(self
            .accounts
            .read()
            .unwrap()
            .values()
            .find(|a| a.company_id == company_id && a.code == code)
            .cloned())
    }

    async fn list_accounts(
        &self,
        company_id: &str,
        account_type: Option<AccountType>,
    ) -> LedgerResult<Vec<Account>> {
        let accounts = self.accounts.read().unwrap();
        let filtered: Vec<Account> = accounts
            .values()
            .filter(|account| account.company_id == company_id)
            .filter(|account| {
                account_type
                    .as_ref()
                    .is_none_or(|t| &account.account_type == t)
            })
            .cloned()
            .collect();
        Ok(filtered)
    }

    async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
        let key = (account.company_id.clone(), account.id.clone());
        let mut accounts = self.accounts.write().unwrap();
        if accounts.contains_key(&key) {
            accounts.insert(key, account.clone());
            Ok(())
        } else {
            Err(LedgerError::NotFound(format!("Account '{}'", account.id)))
        }
    }

    async fn save_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()> {
        let mut entries = self.entries.write().unwrap();
        let duplicate_number = entries.values().any(|existing| {
            existing.company_id == entry.company_id
                && existing.fiscal_year_id == entry.fiscal_year_id
                && existing.entry_number == entry.entry_number
                && existing.id != entry.id
        });
        if duplicate_number {
            return Err(LedgerError::Concurrency(format!(
                "Entry number {} is already taken in fiscal year '{}'",
                entry.entry_number, entry.fiscal_year_id
            )));
        }
        entries.insert((entry.company_id.clone(), entry.id), entry.clone());
        Ok(())
    }

    async fn get_entry(
        &self,
        company_id: &str,
        entry_id: Uuid,
    ) -> LedgerResult<Option<JournalEntry>> {
        Ok(self
            .entries
            .read()
            .unwrap()
            .get(&(company_id.to_string(), entry_id))
            .cloned())
    }

    async fn list_entries(
        &self,
        company_id: &str,
        filter: &EntryFilter,
    ) -> LedgerResult<Vec<JournalEntry>> {
        let entries = self.entries.read().unwrap();
        let mut filtered: Vec<JournalEntry> = entries
            .values()
            .filter(|entry| entry.company_id == company_id)
            .filter(|entry| Self::matches(entry, filter))
            .cloned()
            .collect();
        filtered.sort_by(|a, b| {
            (a.entry_date, a.entry_number).cmp(&(b.entry_date, b.entry_number))
        });
        Ok(filtered)
    }

    async fn update_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()> {
        let key = (entry.company_id.clone(), entry.id);
        let mut entries = self.entries.write().unwrap();
        if entries.contains_key(&key) {
            entries.insert(key, entry.clone());
            Ok(())
        } else {
            Err(LedgerError::NotFound(format!("Entry '{}'", entry.id)))
        }
    }

    async fn next_entry_number(
        &mut self,
        company_id: &str,
        fiscal_year_id: &str,
    ) -> LedgerResult<u32> {
        let mut sequences = self.sequences.lock().unwrap();
        let counter = sequences
            .entry((company_id.to_string(), fiscal_year_id.to_string()))
            .or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn save_fiscal_year(&mut self, fiscal_year: &FiscalYear) -> LedgerResult<()> {
        self.fiscal_years.write().unwrap().insert(
            (fiscal_year.company_id.clone(), fiscal_year.id.clone()),
            fiscal_year.clone(),
        );
        Ok(())
    }

    async fn get_fiscal_year(
        &self,
        company_id: &str,
        fiscal_year_id: &str,
    ) -> LedgerResult<Option<FiscalYear>> {
        Ok(self
            .fiscal_years
            .read()
            .unwrap()
            .get(&(company_id.to_string(), fiscal_year_id.to_string()))
            .cloned())
    }

    async fn fiscal_year_for_date(
        &self,
        company_id: &str,
        date: NaiveDate,
    ) -> LedgerResult<Option<FiscalYear>> {
        Ok(self
            .fiscal_years
            .read()
            .unwrap()
            .values()
            .find(|fy| fy.company_id == company_id && fy.contains(date))
            .cloned())
    }

    async fn list_fiscal_years(&self, company_id: &str) -> LedgerResult<Vec<FiscalYear>> {
        let fiscal_years = self.fiscal_years.read().unwrap();
        let mut listed: Vec<FiscalYear> = fiscal_years
            .values()
            .filter(|fy| fy.company_id == company_id)
            .cloned()
            .collect();
        listed.sort_by_key(|fy| fy.start_date);
        Ok(listed)
    }

    async fn save_template(&mut self, template: &RecurringTemplate) -> LedgerResult<()> {
        self.templates.write().unwrap().insert(
            (template.company_id.clone(), template.id.clone()),
            template.clone(),
        );
        Ok(())
    }

    async fn get_template(
        &self,
        company_id: &str,
        template_id: &str,
    ) -> LedgerResult<Option<RecurringTemplate>> {
        Ok(self
            .templates
            .read()
            .unwrap()
            .get(&(company_id.to_string(), template_id.to_string()))
            .cloned())
    }

    async fn list_templates(&self, company_id: &str) -> LedgerResult<Vec<RecurringTemplate>> {
        let templates = self.templates.read().unwrap();
        let mut listed: Vec<RecurringTemplate> = templates
            .values()
            .filter(|t| t.company_id == company_id)
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(listed)
    }

    async fn update_template(&mut self, template: &RecurringTemplate) -> LedgerResult<()> {
        let key = (template.company_id.clone(), template.id.clone());
        let mut templates = self.templates.write().unwrap();
        if templates.contains_key(&key) {
            templates.insert(key, template.clone());
            Ok(())
        } else {
            Err(LedgerError::NotFound(format!(
                "Template '{}'",
                template.id
            )))
        }
    }
}
