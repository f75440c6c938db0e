//! Balance aggregation: per-account totals and the trial balance

use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::traits::*;
use crate::types::*;

/// Accumulated debit and credit for one account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountTotals {
    pub debit: BigDecimal,
    pub credit: BigDecimal,
}

impl AccountTotals {
    /// Signed balance on the account's normal side: `debit - credit` for
    /// debit-normal accounts, `credit - debit` for credit-normal ones.
    /// Negative means the account sits on its abnormal side.
    pub fn net(&self, account_type: AccountType) -> BigDecimal {
        match account_type.normal_balance() {
            Side::Debit => &self.debit - &self.credit,
            Side::Credit => &self.credit - &self.debit,
        }
    }
}

/// One row of the trial balance. The net balance is shown on a single
/// column; an abnormal (negative) net flips to the opposite column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    pub account: Account,
    pub debit: BigDecimal,
    pub credit: BigDecimal,
}

/// Aggregate debit/credit balance per account at a point in time.
///
/// Derived data: recomputed from posted lines on every call, cacheable per
/// run id but never authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub as_of_date: NaiveDate,
    pub rows: Vec<TrialBalanceRow>,
    pub total_debits: BigDecimal,
    pub total_credits: BigDecimal,
    pub is_balanced: bool,
    pub run_id: Uuid,
}

/// Computes running and period balances from committed journal lines.
pub struct BalanceAggregator<S: LedgerStorage> {
    storage: S,
}

impl<S: LedgerStorage> BalanceAggregator<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Sum debits and credits per account over committed entries dated on or
    /// before `as_of`, optionally restricted to one fiscal year.
    ///
    /// Entries in status Reversed are included: they were committed, and
    /// their effect is cancelled by the posted reversal entry, not by
    /// excluding them. Draft and PendingApproval entries never count.
    pub async fn account_totals(
        &self,
        company_id: &str,
        as_of: NaiveDate,
        fiscal_year_id: Option<&str>,
    ) -> LedgerResult<BTreeMap<String, AccountTotals>> {
        let filter = EntryFilter {
            to: Some(as_of),
            fiscal_year_id: fiscal_year_id.map(str::to_string),
            ..EntryFilter::default()
        };
        let entries = self.storage.list_entries(company_id, &filter).await?;

        let mut totals: BTreeMap<String, AccountTotals> = BTreeMap::new();
        for entry in entries {
            if !matches!(entry.status, EntryStatus::Posted | EntryStatus::Reversed) {
                continue;
            }
            for line in &entry.lines {
                let slot = totals.entry(line.account_id.clone()).or_default();
                slot.debit += &line.debit;
                slot.credit += &line.credit;
            }
        }
        Ok(totals)
    }

    /// Activity between two dates (inclusive): totals at `to` minus totals
    /// strictly before `from`.
    pub async fn period_totals(
        &self,
        company_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> LedgerResult<BTreeMap<String, AccountTotals>> {
        let end = self.account_totals(company_id, to, None).await?;
        let before = match from.pred_opt() {
            Some(day_before) => self.account_totals(company_id, day_before, None).await?,
            None => BTreeMap::new(),
        };

        let mut period = BTreeMap::new();
        for (account_id, totals) in end {
            let prior = before.get(&account_id).cloned().unwrap_or_default();
            period.insert(
                account_id,
                AccountTotals {
                    debit: totals.debit - prior.debit,
                    credit: totals.credit - prior.credit,
                },
            );
        }
        Ok(period)
    }

    /// The trial balance over all ledger accounts, rows sorted by account
    /// code. For a fully committed ledger the debit and credit columns agree
    /// within [`balance_epsilon`]; a mismatch means corrupted data.
    pub async fn trial_balance(
        &self,
        company_id: &str,
        as_of: NaiveDate,
        fiscal_year_id: Option<&str>,
    ) -> LedgerResult<TrialBalance> {
        let totals = self
            .account_totals(company_id, as_of, fiscal_year_id)
            .await?;
        let mut accounts = self.storage.list_accounts(company_id, None).await?;
        accounts.sort_by(|a, b| a.code.cmp(&b.code));

        let zero = BigDecimal::from(0);
        let mut rows = Vec::new();
        let mut total_debits = BigDecimal::from(0);
        let mut total_credits = BigDecimal::from(0);

        for account in accounts {
            if account.is_group {
                continue;
            }
            let net = totals
                .get(&account.id)
                .map(|t| t.net(account.account_type))
                .unwrap_or_else(|| zero.clone());

            let normal = account.account_type.normal_balance();
            let side = if net >= zero { normal } else { normal.opposite() };
            let magnitude = net.abs();

            let (debit, credit) = match side {
                Side::Debit => (magnitude, zero.clone()),
                Side::Credit => (zero.clone(), magnitude),
            };
            total_debits += &debit;
            total_credits += &credit;
            rows.push(TrialBalanceRow {
                account,
                debit,
                credit,
            });
        }

        let is_balanced =
            (total_debits.clone() - total_credits.clone()).abs() <= balance_epsilon();

        Ok(TrialBalance {
            as_of_date: as_of,
            rows,
            total_debits,
            total_credits,
            is_balanced,
            run_id: Uuid::new_v4(),
        })
    }
}
