//! Core domain types and the error taxonomy for the ledger engine

use bigdecimal::num_bigint::BigInt;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of the tenant (company) that owns a record.
pub type CompanyId = String;

/// Tolerance used when checking that debits equal credits: 0.01 currency units.
///
/// Amounts are `BigDecimal` throughout, so rounding drift can only come from
/// caller-supplied values (e.g. tax splits of odd amounts), never from the
/// engine's own arithmetic.
pub fn balance_epsilon() -> BigDecimal {
    BigDecimal::new(BigInt::from(1), 2)
}

/// Account types following standard accounting principles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    /// Assets - what the business owns (Cash, Receivables, Equipment, etc.)
    Asset,
    /// Liabilities - what the business owes (Loans, Payables, GST payable, etc.)
    Liability,
    /// Equity - owner's interest in the business
    Equity,
    /// Income/Revenue - money earned by the business
    Income,
    /// Expenses - costs incurred by the business
    Expense,
}

impl AccountType {
    /// Returns the normal balance side for this account type.
    /// Assets and Expenses normally carry debit balances; Liabilities,
    /// Equity, and Income normally carry credit balances.
    pub fn normal_balance(&self) -> Side {
        match self {
            AccountType::Asset | AccountType::Expense => Side::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Income => Side::Credit,
        }
    }

}

/// The two sides of double-entry bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Debit,
    Credit,
}

impl Side {
    /// The opposite side, used when reversing entries.
    pub fn opposite(&self) -> Side {
        match self {
            Side::Debit => Side::Credit,
            Side::Credit => Side::Debit,
        }
    }
}

/// A node in the chart of accounts.
///
/// Group accounts exist only for hierarchy and report rollup; postings land
/// exclusively on non-group ("ledger") accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier for the account
    pub id: String,
    /// Owning company
    pub company_id: CompanyId,
    /// Account code, unique per company (e.g. "1000")
    pub code: String,
    /// Human-readable account name
    pub name: String,
    /// Type of account (Asset, Liability, etc.)
    pub account_type: AccountType,
    /// Group accounts aggregate children and never receive postings
    pub is_group: bool,
    /// Optional parent account for hierarchical chart of accounts
    pub parent_id: Option<String>,
    /// Depth in the hierarchy; roots are level 0
    pub level: u32,
    /// Deactivated accounts reject new postings but keep their history
    pub is_active: bool,
    /// When the account was created
    pub created_at: NaiveDateTime,
    /// When the account was last updated
    pub updated_at: NaiveDateTime,
}

impl Account {
    /// Create a new root-level ledger account. Hierarchy placement (parent,
    /// level) is assigned by the account registry on insert.
    pub fn new(
        id: String,
        company_id: CompanyId,
        code: String,
        name: String,
        account_type: AccountType,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id,
            company_id,
            code,
            name,
            account_type,
            is_group: false,
            parent_id: None,
            level: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// True iff the account may appear on a journal line.
    pub fn is_postable(&self) -> bool {
        !self.is_group && self.is_active
    }
}

/// Origin of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Hand-keyed by a user; starts in Draft
    Manual,
    /// Generated from a sales invoice
    AutoInvoice,
    /// Generated from a payment receipt
    AutoPayment,
    /// Generated from a purchase bill / expense
    AutoExpense,
    /// Emitted by the recurring-entry scheduler
    Recurring,
    /// Additive reversal of a posted entry
    Reversal,
    /// Imported from a bank statement
    BankImport,
    /// Opening balances at books takeover
    Opening,
}

impl EntryKind {
    /// System-generated entries commit directly to Posted; manual entries
    /// start life as Draft and go through the approval transitions.
    pub fn posts_immediately(&self) -> bool {
        !matches!(self, EntryKind::Manual)
    }
}

/// Lifecycle state of a journal entry.
///
/// The legal transitions are a closed table (see [`EntryStatus::can_transition`]);
/// the posting engine is the only component that performs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Draft,
    PendingApproval,
    Posted,
    Reversed,
}

impl EntryStatus {
    /// The closed transition table:
    /// `Draft -> PendingApproval -> Posted`, `Draft -> Posted`,
    /// `Posted -> Reversed`. Everything else is illegal.
    pub fn can_transition(self, next: EntryStatus) -> bool {
        matches!(
            (self, next),
            (EntryStatus::Draft, EntryStatus::PendingApproval)
                | (EntryStatus::Draft, EntryStatus::Posted)
                | (EntryStatus::PendingApproval, EntryStatus::Posted)
                | (EntryStatus::Posted, EntryStatus::Reversed)
        )
    }

    /// Only Draft and PendingApproval entries may have their lines edited.
    pub fn is_mutable(self) -> bool {
        matches!(self, EntryStatus::Draft | EntryStatus::PendingApproval)
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntryStatus::Draft => "draft",
            EntryStatus::PendingApproval => "pending_approval",
            EntryStatus::Posted => "posted",
            EntryStatus::Reversed => "reversed",
        };
        f.write_str(s)
    }
}

/// A single debit or credit within a journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalLine {
    /// Ledger account being affected
    pub account_id: String,
    /// Debit amount; zero when the line is a credit
    pub debit: BigDecimal,
    /// Credit amount; zero when the line is a debit
    pub credit: BigDecimal,
    /// Optional description for this specific line
    pub description: Option<String>,
}

impl JournalLine {
    /// Create a debit line
    pub fn debit(account_id: String, amount: BigDecimal, description: Option<String>) -> Self {
        Self {
            account_id,
            debit: amount,
            credit: BigDecimal::from(0),
            description,
        }
    }

    /// Create a credit line
    pub fn credit(account_id: String, amount: BigDecimal, description: Option<String>) -> Self {
        Self {
            account_id,
            debit: BigDecimal::from(0),
            credit: amount,
            description,
        }
    }

    /// Which side this line sits on, or an error when it is malformed.
    ///
    /// Exactly one of debit/credit must be positive; a line carrying both,
    /// neither, or a negative amount is rejected.
    pub fn side(&self) -> LedgerResult<Side> {
        let zero = BigDecimal::from(0);
        if self.debit < zero || self.credit < zero {
            return Err(LedgerError::Validation(format!(
                "Line on account '{}' has a negative amount (debit {}, credit {})",
                self.account_id, self.debit, self.credit
            )));
        }
        match (self.debit > zero, self.credit > zero) {
            (true, false) => Ok(Side::Debit),
            (false, true) => Ok(Side::Credit),
            (true, true) => Err(LedgerError::Validation(format!(
                "Line on account '{}' carries both a debit ({}) and a credit ({})",
                self.account_id, self.debit, self.credit
            ))),
            (false, false) => Err(LedgerError::Validation(format!(
                "Line on account '{}' carries neither a debit nor a credit",
                self.account_id
            ))),
        }
    }

    /// The line with its debit and credit swapped, for reversal entries.
    pub fn swapped(&self) -> JournalLine {
        JournalLine {
            account_id: self.account_id.clone(),
            debit: self.credit.clone(),
            credit: self.debit.clone(),
            description: self.description.clone(),
        }
    }
}

/// A journal entry: a dated, numbered set of balanced debit/credit lines.
///
/// Posted entries are append-only; corrections happen through reversal
/// entries, never by editing history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique identifier
    pub id: Uuid,
    /// Owning company
    pub company_id: CompanyId,
    /// Sequential number, unique per company + fiscal year
    pub entry_number: u32,
    /// Date the entry takes effect
    pub entry_date: NaiveDate,
    /// Fiscal year covering `entry_date`
    pub fiscal_year_id: String,
    /// Where the entry came from
    pub kind: EntryKind,
    /// Lifecycle state
    pub status: EntryStatus,
    /// Narration shown on vouchers and reports
    pub narration: String,
    /// The debit/credit lines
    pub lines: Vec<JournalLine>,
    /// For reversal entries, the entry being reversed
    pub reversal_of: Option<Uuid>,
    /// When the entry was created
    pub created_at: NaiveDateTime,
    /// When the entry was last updated
    pub updated_at: NaiveDateTime,
}

impl JournalEntry {
    /// Sum of all debit lines
    pub fn total_debits(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.debit).sum()
    }

    /// Sum of all credit lines
    pub fn total_credits(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.credit).sum()
    }

    /// Signed difference between debits and credits
    pub fn imbalance(&self) -> BigDecimal {
        self.total_debits() - self.total_credits()
    }

    /// Whether debits equal credits within [`balance_epsilon`]
    pub fn is_balanced(&self) -> bool {
        self.imbalance().abs() <= balance_epsilon()
    }

    /// Structural validation: line shape and the balance invariant.
    /// Account existence and period locks are checked by the posting engine,
    /// which has storage access.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.lines.len() < 2 {
            return Err(LedgerError::Validation(
                "Entry must have at least two lines for double-entry bookkeeping".to_string(),
            ));
        }
        for line in &self.lines {
            line.side()?;
        }
        if !self.is_balanced() {
            return Err(LedgerError::Validation(format!(
                "Entry is not balanced: debits = {}, credits = {}, difference = {}",
                self.total_debits(),
                self.total_credits(),
                self.imbalance()
            )));
        }
        Ok(())
    }
}

/// An accounting period; locked years reject postings and reversals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiscalYear {
    pub id: String,
    pub company_id: CompanyId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_locked: bool,
}

impl FiscalYear {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// Errors that can occur in the ledger system.
///
/// Validation and state errors are caller-correctable and surfaced verbatim;
/// concurrency errors are retried once inside the posting engine before
/// surfacing.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Locked period: {0}")]
    LockedPeriod(String),
    #[error("Concurrency conflict: {0}")]
    Concurrency(String),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with_lines(lines: Vec<JournalLine>) -> JournalEntry {
        let now = chrono::Utc::now().naive_utc();
        JournalEntry {
            id: Uuid::new_v4(),
            company_id: "co1".to_string(),
            entry_number: 1,
            entry_date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            fiscal_year_id: "fy24".to_string(),
            kind: EntryKind::Manual,
            status: EntryStatus::Draft,
            narration: "test".to_string(),
            lines,
            reversal_of: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn normal_balance_sides() {
        assert_eq!(AccountType::Asset.normal_balance(), Side::Debit);
        assert_eq!(AccountType::Expense.normal_balance(), Side::Debit);
        assert_eq!(AccountType::Liability.normal_balance(), Side::Credit);
        assert_eq!(AccountType::Equity.normal_balance(), Side::Credit);
        assert_eq!(AccountType::Income.normal_balance(), Side::Credit);
    }

    #[test]
    fn transition_table_is_closed() {
        use EntryStatus::*;
        assert!(Draft.can_transition(PendingApproval));
        assert!(Draft.can_transition(Posted));
        assert!(PendingApproval.can_transition(Posted));
        assert!(Posted.can_transition(Reversed));

        assert!(!Posted.can_transition(Draft));
        assert!(!Posted.can_transition(Posted));
        assert!(!Reversed.can_transition(Posted));
        assert!(!Reversed.can_transition(Reversed));
        assert!(!Draft.can_transition(Reversed));
    }

    #[test]
    fn line_must_sit_on_exactly_one_side() {
        let ok = JournalLine::debit("cash".to_string(), BigDecimal::from(100), None);
        assert_eq!(ok.side().unwrap(), Side::Debit);

        let both = JournalLine {
            account_id: "cash".to_string(),
            debit: BigDecimal::from(10),
            credit: BigDecimal::from(10),
            description: None,
        };
        assert!(both.side().is_err());

        let neither = JournalLine {
            account_id: "cash".to_string(),
            debit: BigDecimal::from(0),
            credit: BigDecimal::from(0),
            description: None,
        };
        assert!(neither.side().is_err());
    }

    #[test]
    fn entry_balance_validation() {
        let balanced = entry_with_lines(vec![
            JournalLine::debit("cash".to_string(), BigDecimal::from(500), None),
            JournalLine::credit("sales".to_string(), BigDecimal::from(500), None),
        ]);
        assert!(balanced.validate().is_ok());

        let imbalanced = entry_with_lines(vec![
            JournalLine::debit("cash".to_string(), BigDecimal::from(500), None),
            JournalLine::credit("sales".to_string(), BigDecimal::from(400), None),
        ]);
        let err = imbalanced.validate().unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert!(err.to_string().contains("difference = 100"));
    }

    #[test]
    fn imbalance_within_epsilon_is_accepted() {
        let entry = entry_with_lines(vec![
            JournalLine::debit("cash".to_string(), "100.00".parse().unwrap(), None),
            JournalLine::credit("sales".to_string(), "99.99".parse().unwrap(), None),
        ]);
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn only_active_ledger_accounts_are_postable() {
        let mut account = Account::new(
            "1001".to_string(),
            "co1".to_string(),
            "1001".to_string(),
            "Cash".to_string(),
            AccountType::Asset,
        );
        assert!(account.is_postable());

        account.is_group = true;
        assert!(!account.is_postable());

        account.is_group = false;
        account.is_active = false;
        assert!(!account.is_postable());
    }

    #[test]
    fn swapped_line_exchanges_sides() {
        let line = JournalLine::debit("cash".to_string(), BigDecimal::from(75), None);
        let swapped = line.swapped();
        assert_eq!(swapped.credit, BigDecimal::from(75));
        assert_eq!(swapped.debit, BigDecimal::from(0));
    }
}
