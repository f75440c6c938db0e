//! Chart-of-accounts registry: hierarchy, classification, postability

use std::collections::HashMap;

use crate::traits::*;
use crate::types::*;

/// Parameters for creating an account.
pub struct NewAccount {
    pub id: String,
    pub company_id: CompanyId,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub is_group: bool,
    pub parent_id: Option<String>,
}

/// Registry owning the chart-of-accounts structure for every company.
///
/// Enforces the hierarchy rules: children may only hang under group accounts,
/// levels are computed on insert, and group accounts never receive postings.
pub struct AccountRegistry<S: LedgerStorage> {
    pub(crate) storage: S,
    validator: Box<dyn AccountValidator>,
}

impl<S: LedgerStorage> AccountRegistry<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultAccountValidator),
        }
    }

    pub fn with_validator(storage: S, validator: Box<dyn AccountValidator>) -> Self {
        Self { storage, validator }
    }

    /// Create a new account, computing its depth from the parent.
    pub async fn create_account(&mut self, params: NewAccount) -> LedgerResult<Account> {
        let mut account = Account::new(
            params.id,
            params.company_id,
            params.code,
            params.name,
            params.account_type,
        );
        account.is_group = params.is_group;
        account.parent_id = params.parent_id;

        self.validator.validate_account(&account)?;

        if self
            .storage
            .get_account(&account.company_id, &account.id)
            .await?
            .is_some()
        {
            return Err(LedgerError::Validation(format!(
                "Account with ID '{}' already exists",
                account.id
            )));
        }
        if self
            .storage
            .get_account_by_code(&account.company_id, &account.code)
            .await?
            .is_some()
        {
            return Err(LedgerError::Validation(format!(
                "Account code '{}' already exists for this company",
                account.code
            )));
        }

        if let Some(ref parent_id) = account.parent_id {
            let parent = self
                .storage
                .get_account(&account.company_id, parent_id)
                .await?
                .ok_or_else(|| {
                    LedgerError::Validation(format!("Parent account '{}' does not exist", parent_id))
                })?;
            if !parent.is_group {
                return Err(LedgerError::Validation(format!(
                    "Parent account '{}' is a ledger account; children may only be added under group accounts",
                    parent_id
                )));
            }
            account.level = parent.level + 1;
        }

        self.storage.save_account(&account).await?;
        Ok(account)
    }

    /// Get an account, erroring when it does not exist.
    pub async fn resolve(&self, company_id: &str, account_id: &str) -> LedgerResult<Account> {
        self.storage
            .get_account(company_id, account_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Account '{}'", account_id)))
    }

    /// Look an account up by its code.
    pub async fn resolve_by_code(&self, company_id: &str, code: &str) -> LedgerResult<Account> {
        self.storage
            .get_account_by_code(company_id, code)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Account with code '{}'", code)))
    }

    pub async fn list_accounts(&self, company_id: &str) -> LedgerResult<Vec<Account>> {
        self.storage.list_accounts(company_id, None).await
    }

    pub async fn list_accounts_by_type(
        &self,
        company_id: &str,
        account_type: AccountType,
    ) -> LedgerResult<Vec<Account>> {
        self.storage
            .list_accounts(company_id, Some(account_type))
            .await
    }

    /// Direct children of a group account.
    pub async fn children(&self, company_id: &str, parent_id: &str) -> LedgerResult<Vec<Account>> {
        let all = self.list_accounts(company_id).await?;
        Ok(all
            .into_iter()
            .filter(|a| a.parent_id.as_deref() == Some(parent_id))
            .collect())
    }

    /// Root-to-leaf path for hierarchical display.
    pub async fn account_path(
        &self,
        company_id: &str,
        account_id: &str,
    ) -> LedgerResult<Vec<Account>> {
        let mut path = Vec::new();
        let mut current = Some(account_id.to_string());
        while let Some(id) = current {
            let account = self.resolve(company_id, &id).await?;
            current = account.parent_id.clone();
            path.insert(0, account);
        }
        Ok(path)
    }

    /// Soft-deactivate an account. Its posted history stays intact; new
    /// postings against it are rejected.
    pub async fn deactivate(&mut self, company_id: &str, account_id: &str) -> LedgerResult<()> {
        let mut account = self.resolve(company_id, account_id).await?;
        account.is_active = false;
        account.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_account(&account).await
    }
}

/// Seeding helpers for a standard small-business chart of accounts.
pub mod seed {
    use super::*;

    async fn leaf<S: LedgerStorage>(
        registry: &mut AccountRegistry<S>,
        company_id: &str,
        code: &str,
        name: &str,
        account_type: AccountType,
        parent_id: Option<&str>,
    ) -> LedgerResult<Account> {
        registry
            .create_account(NewAccount {
                id: code.to_string(),
                company_id: company_id.to_string(),
                code: code.to_string(),
                name: name.to_string(),
                account_type,
                is_group: false,
                parent_id: parent_id.map(str::to_string),
            })
            .await
    }

    async fn group<S: LedgerStorage>(
        registry: &mut AccountRegistry<S>,
        company_id: &str,
        code: &str,
        name: &str,
        account_type: AccountType,
    ) -> LedgerResult<Account> {
        registry
            .create_account(NewAccount {
                id: code.to_string(),
                company_id: company_id.to_string(),
                code: code.to_string(),
                name: name.to_string(),
                account_type,
                is_group: true,
                parent_id: None,
            })
            .await
    }

    /// Create a standard chart for an Indian small business, including the
    /// GST and TDS control accounts the auto-entry patterns post to.
    /// Returns the created accounts keyed by a stable short name.
    pub async fn standard_chart<S: LedgerStorage>(
        registry: &mut AccountRegistry<S>,
        company_id: &str,
    ) -> LedgerResult<HashMap<&'static str, Account>> {
        let mut accounts = HashMap::new();

        let current_assets = group(
            registry,
            company_id,
            "1000",
            "Current Assets",
            AccountType::Asset,
        )
        .await?;

        for (key, code, name) in [
            ("cash", "1001", "Cash"),
            ("bank", "1050", "Bank"),
            ("accounts_receivable", "1200", "Accounts Receivable"),
            ("inventory", "1300", "Inventory"),
            ("gst_receivable", "1400", "GST Input Credit"),
            ("tds_recoverable", "1450", "TDS Recoverable"),
        ] {
            let account = leaf(
                registry,
                company_id,
                code,
                name,
                AccountType::Asset,
                Some(&current_assets.id),
            )
            .await?;
            accounts.insert(key, account);
        }
        accounts.insert("current_assets", current_assets);

        for (key, code, name) in [
            ("accounts_payable", "2000", "Accounts Payable"),
            ("loans_payable", "2100", "Loans Payable"),
            ("gst_payable", "2200", "GST Payable"),
            ("tds_payable", "2300", "TDS Payable"),
        ] {
            let account = leaf(registry, company_id, code, name, AccountType::Liability, None).await?;
            accounts.insert(key, account);
        }

        for (key, code, name) in [
            ("owners_capital", "3000", "Owner's Capital"),
            ("retained_earnings", "3200", "Retained Earnings"),
        ] {
            let account = leaf(registry, company_id, code, name, AccountType::Equity, None).await?;
            accounts.insert(key, account);
        }

        for (key, code, name) in [
            ("sales_revenue", "4000", "Sales Revenue"),
            ("service_revenue", "4100", "Service Revenue"),
        ] {
            let account = leaf(registry, company_id, code, name, AccountType::Income, None).await?;
            accounts.insert(key, account);
        }

        for (key, code, name) in [
            ("cost_of_goods_sold", "5000", "Cost of Goods Sold"),
            ("rent_expense", "6000", "Rent Expense"),
            ("utilities_expense", "6100", "Utilities Expense"),
            ("professional_fees", "6200", "Professional Fees"),
            ("contractor_charges", "6300", "Contractor Charges"),
        ] {
            let account = leaf(registry, company_id, code, name, AccountType::Expense, None).await?;
            accounts.insert(key, account);
        }

        Ok(accounts)
    }
}
