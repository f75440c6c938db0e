//! Ledger facade that coordinates the registry, posting engine, reports,
//! and the recurring scheduler for the surrounding application

use std::collections::HashMap;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::posting::{NewEntry, PostingEngine};
use crate::ledger::registry::{seed, AccountRegistry, NewAccount};
use crate::recurring::{BatchSummary, RecurringScheduler, RecurringTemplate};
use crate::reporting::balances::{BalanceAggregator, TrialBalance};
use crate::reporting::cache::{CachedReport, ReportCache, ReportKey, StatementKind};
use crate::reporting::statements::{
    BalanceSheet, CashFlowStatement, ProfitAndLoss, StatementEngine, StatementRules,
};
use crate::traits::*;
use crate::types::*;

/// The ledger system: one handle wiring every component to a shared storage
/// backend. Writes invalidate exactly the cached reports they staledate.
pub struct Ledger<S: LedgerStorage + Clone> {
    storage: S,
    registry: AccountRegistry<S>,
    engine: PostingEngine<S>,
    scheduler: RecurringScheduler<S>,
    statements: StatementEngine<S>,
    aggregator: BalanceAggregator<S>,
    cache: ReportCache,
    rules: StatementRules,
}

impl<S: LedgerStorage + Clone> Ledger<S> {
    pub fn new(storage: S) -> Self {
        Self::with_rules(storage, StatementRules::standard_chart())
    }

    /// Build a ledger with custom cash-flow classification rules.
    pub fn with_rules(storage: S, rules: StatementRules) -> Self {
        Self {
            registry: AccountRegistry::new(storage.clone()),
            engine: PostingEngine::new(storage.clone()),
            scheduler: RecurringScheduler::new(storage.clone()),
            statements: StatementEngine::new(storage.clone()),
            aggregator: BalanceAggregator::new(storage.clone()),
            storage,
            cache: ReportCache::new(),
            rules,
        }
    }

    /// Build a ledger with custom validators on the account and entry paths.
    pub fn with_validators(
        storage: S,
        account_validator: Box<dyn AccountValidator>,
        entry_validator: Box<dyn EntryValidator>,
    ) -> Self {
        let mut ledger = Self::new(storage.clone());
        ledger.registry = AccountRegistry::with_validator(storage.clone(), account_validator);
        ledger.engine = PostingEngine::with_validator(storage, entry_validator);
        ledger
    }

    // Fiscal years

    /// Register a fiscal year. Ranges may not overlap an existing year.
    pub async fn create_fiscal_year(&mut self, fiscal_year: FiscalYear) -> LedgerResult<FiscalYear> {
        if fiscal_year.start_date > fiscal_year.end_date {
            return Err(LedgerError::Validation(format!(
                "Fiscal year '{}' starts after it ends",
                fiscal_year.id
            )));
        }
        for existing in self
            .storage
            .list_fiscal_years(&fiscal_year.company_id)
            .await?
        {
            let intersects = fiscal_year.start_date <= existing.end_date
                && existing.start_date <= fiscal_year.end_date;
            if intersects {
                return Err(LedgerError::Validation(format!(
                    "Fiscal year '{}' overlaps existing fiscal year '{}'",
                    fiscal_year.id, existing.id
                )));
            }
        }
        self.storage.save_fiscal_year(&fiscal_year).await?;
        Ok(fiscal_year)
    }

    /// Close a fiscal year to further postings and reversals.
    pub async fn lock_fiscal_year(
        &mut self,
        company_id: &str,
        fiscal_year_id: &str,
    ) -> LedgerResult<FiscalYear> {
        let mut fiscal_year = self
            .storage
            .get_fiscal_year(company_id, fiscal_year_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Fiscal year '{}'", fiscal_year_id)))?;
        fiscal_year.is_locked = true;
        self.storage.save_fiscal_year(&fiscal_year).await?;
        Ok(fiscal_year)
    }

    /// Reopen a locked fiscal year.
    pub async fn unlock_fiscal_year(
        &mut self,
        company_id: &str,
        fiscal_year_id: &str,
    ) -> LedgerResult<FiscalYear> {
        let mut fiscal_year = self
            .storage
            .get_fiscal_year(company_id, fiscal_year_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Fiscal year '{}'", fiscal_year_id)))?;
        fiscal_year.is_locked = false;
        self.storage.save_fiscal_year(&fiscal_year).await?;
        Ok(fiscal_year)
    }

    // Chart of accounts

    pub async fn create_account(&mut self, params: NewAccount) -> LedgerResult<Account> {
        self.registry.create_account(params).await
    }

    pub async fn get_account(&self, company_id: &str, account_id: &str) -> LedgerResult<Account> {
        self.registry.resolve(company_id, account_id).await
    }

    pub async fn list_accounts(&self, company_id: &str) -> LedgerResult<Vec<Account>> {
        self.registry.list_accounts(company_id).await
    }

    pub async fn deactivate_account(
        &mut self,
        company_id: &str,
        account_id: &str,
    ) -> LedgerResult<()> {
        self.registry.deactivate(company_id, account_id).await
    }

    /// Seed the standard small-business chart including GST/TDS control
    /// accounts; returns the accounts keyed by short name.
    pub async fn setup_standard_chart(
        &mut self,
        company_id: &str,
    ) -> LedgerResult<HashMap<&'static str, Account>> {
        seed::standard_chart(&mut self.registry, company_id).await
    }

    // Journal entries

    pub async fn create_entry(&mut self, request: NewEntry) -> LedgerResult<JournalEntry> {
        let entry = self.engine.create_entry(request).await?;
        if entry.status == EntryStatus::Posted {
            self.cache.invalidate_from(&entry.company_id, entry.entry_date);
        }
        Ok(entry)
    }

    pub async fn post_entry(&mut self, company_id: &str, entry_id: Uuid) -> LedgerResult<JournalEntry> {
        let entry = self.engine.post_entry(company_id, entry_id).await?;
        self.cache.invalidate_from(company_id, entry.entry_date);
        Ok(entry)
    }

    pub async fn submit_for_approval(
        &mut self,
        company_id: &str,
        entry_id: Uuid,
    ) -> LedgerResult<JournalEntry> {
        self.engine.submit_for_approval(company_id, entry_id).await
    }

    pub async fn reverse_entry(
        &mut self,
        company_id: &str,
        entry_id: Uuid,
        reversal_date: Option<NaiveDate>,
    ) -> LedgerResult<JournalEntry> {
        let reversal = self
            .engine
            .reverse_entry(company_id, entry_id, reversal_date)
            .await?;
        self.cache.invalidate_from(company_id, reversal.entry_date);
        Ok(reversal)
    }

    pub async fn update_entry(&mut self, entry: &JournalEntry) -> LedgerResult<JournalEntry> {
        self.engine.update_entry(entry).await
    }

    pub async fn get_entry(
        &self,
        company_id: &str,
        entry_id: Uuid,
    ) -> LedgerResult<Option<JournalEntry>> {
        self.engine.get_entry(company_id, entry_id).await
    }

    pub async fn list_entries(
        &self,
        company_id: &str,
        filter: &EntryFilter,
    ) -> LedgerResult<Vec<JournalEntry>> {
        self.engine.list_entries(company_id, filter).await
    }

    // Balances and reports

    /// Net balance of one account on its normal side, as of a date.
    pub async fn account_balance(
        &self,
        company_id: &str,
        account_id: &str,
        as_of: NaiveDate,
    ) -> LedgerResult<BigDecimal> {
        let account = self.registry.resolve(company_id, account_id).await?;
        let totals = self.aggregator.account_totals(company_id, as_of, None).await?;
        Ok(totals
            .get(account_id)
            .map(|t| t.net(account.account_type))
            .unwrap_or_else(|| BigDecimal::from(0)))
    }

    pub async fn trial_balance(
        &self,
        company_id: &str,
        as_of: NaiveDate,
        fiscal_year_id: Option<&str>,
    ) -> LedgerResult<TrialBalance> {
        let key = ReportKey {
            company_id: company_id.to_string(),
            kind: StatementKind::TrialBalance,
            from: None,
            to: as_of,
        };
        // Fiscal-year-scoped runs bypass the cache; the key space is dated.
        if fiscal_year_id.is_none() {
            if let Some(CachedReport::TrialBalance(cached)) = self.cache.get(&key) {
                return Ok(cached);
            }
        }
        let report = self
            .aggregator
            .trial_balance(company_id, as_of, fiscal_year_id)
            .await?;
        if fiscal_year_id.is_none() {
            self.cache.put(key, CachedReport::TrialBalance(report.clone()));
        }
        Ok(report)
    }

    pub async fn balance_sheet(
        &self,
        company_id: &str,
        as_of: NaiveDate,
    ) -> LedgerResult<BalanceSheet> {
        let key = ReportKey {
            company_id: company_id.to_string(),
            kind: StatementKind::BalanceSheet,
            from: None,
            to: as_of,
        };
        if let Some(CachedReport::BalanceSheet(cached)) = self.cache.get(&key) {
            return Ok(cached);
        }
        let report = self.statements.balance_sheet(company_id, as_of).await?;
        self.cache.put(key, CachedReport::BalanceSheet(report.clone()));
        Ok(report)
    }

    pub async fn profit_and_loss(
        &self,
        company_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> LedgerResult<ProfitAndLoss> {
        let key = ReportKey {
            company_id: company_id.to_string(),
            kind: StatementKind::ProfitAndLoss,
            from: Some(from),
            to,
        };
        if let Some(CachedReport::ProfitAndLoss(cached)) = self.cache.get(&key) {
            return Ok(cached);
        }
        let report = self.statements.profit_and_loss(company_id, from, to).await?;
        self.cache
            .put(key, CachedReport::ProfitAndLoss(report.clone()));
        Ok(report)
    }

    pub async fn cash_flow(
        &self,
        company_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> LedgerResult<CashFlowStatement> {
        let key = ReportKey {
            company_id: company_id.to_string(),
            kind: StatementKind::CashFlow,
            from: Some(from),
            to,
        };
        if let Some(CachedReport::CashFlow(cached)) = self.cache.get(&key) {
            return Ok(cached);
        }
        let report = self
            .statements
            .cash_flow(company_id, from, to, &self.rules)
            .await?;
        self.cache.put(key, CachedReport::CashFlow(report.clone()));
        Ok(report)
    }

    // Recurring entries

    /// Save a recurring template after checking its line shape.
    pub async fn create_template(
        &mut self,
        template: RecurringTemplate,
    ) -> LedgerResult<RecurringTemplate> {
        if template.lines.len() < 2 {
            return Err(LedgerError::Validation(
                "Template must have at least two lines for double-entry bookkeeping".to_string(),
            ));
        }
        let debits: BigDecimal = template.lines.iter().map(|l| &l.debit).sum();
        let credits: BigDecimal = template.lines.iter().map(|l| &l.credit).sum();
        if (debits.clone() - credits.clone()).abs() > balance_epsilon() {
            return Err(LedgerError::Validation(format!(
                "Template is not balanced: debits = {}, credits = {}",
                debits, credits
            )));
        }
        for line in &template.lines {
            line.side()?;
        }
        self.storage.save_template(&template).await?;
        Ok(template)
    }

    pub async fn due_templates(
        &self,
        company_id: &str,
        as_of: NaiveDate,
    ) -> LedgerResult<Vec<RecurringTemplate>> {
        self.scheduler.due_templates(company_id, as_of).await
    }

    /// Generate entries for every due template, then drop the company's
    /// cached reports if anything was posted.
    pub async fn generate_due_entries(
        &mut self,
        company_id: &str,
        as_of: NaiveDate,
    ) -> LedgerResult<BatchSummary> {
        let summary = self.scheduler.process_due(company_id, as_of).await?;
        if summary.processed > 0 {
            self.cache.invalidate_company(company_id);
        }
        Ok(summary)
    }

    // Integrity

    /// Cross-check the derived reports against the ledger invariants.
    pub async fn validate_integrity(
        &self,
        company_id: &str,
        as_of: NaiveDate,
    ) -> LedgerResult<LedgerIntegrityReport> {
        let trial_balance = self.trial_balance(company_id, as_of, None).await?;
        let balance_sheet = self.balance_sheet(company_id, as_of).await?;

        let mut issues = Vec::new();
        if !trial_balance.is_balanced {
            issues.push(format!(
                "Trial balance is not balanced: debits = {}, credits = {}",
                trial_balance.total_debits, trial_balance.total_credits
            ));
        }
        let liabilities_and_equity =
            &balance_sheet.total_liabilities + &balance_sheet.total_equity;
        if !balance_sheet.is_balanced {
            issues.push(format!(
                "Balance sheet is not balanced: assets = {}, liabilities + equity = {}",
                balance_sheet.total_assets, liabilities_and_equity
            ));
        }

        // Cash flow is checked over the fiscal year containing the as-of date.
        if let Some(fiscal_year) = self.storage.fiscal_year_for_date(company_id, as_of).await? {
            let cash_flow = self
                .cash_flow(company_id, fiscal_year.start_date, as_of)
                .await?;
            if !cash_flow.reconciled {
                issues.push(format!(
                    "Cash flow does not reconcile: opening = {}, closing = {}, derived net increase = {}",
                    cash_flow.opening_cash, cash_flow.closing_cash, cash_flow.net_increase
                ));
            }
        }

        Ok(LedgerIntegrityReport {
            as_of_date: as_of,
            is_valid: issues.is_empty(),
            issues,
            trial_balance_total_debits: trial_balance.total_debits,
            trial_balance_total_credits: trial_balance.total_credits,
            balance_sheet_total_assets: balance_sheet.total_assets,
            balance_sheet_total_liabilities_equity: liabilities_and_equity,
        })
    }
}

/// Report on ledger integrity and validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerIntegrityReport {
    pub as_of_date: NaiveDate,
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub trial_balance_total_debits: BigDecimal,
    pub trial_balance_total_credits: BigDecimal,
    pub balance_sheet_total_assets: BigDecimal,
    pub balance_sheet_total_liabilities_equity: BigDecimal,
}
