//! Cache for derived report runs
//!
//! Keys are explicit (company, statement kind, period); invalidation happens
//! only when a posting or reversal lands in a fiscal year the cached period
//! can see. Cached runs are export artifacts, never the source of truth.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::reporting::balances::TrialBalance;
use crate::reporting::statements::{BalanceSheet, CashFlowStatement, ProfitAndLoss};
use crate::types::CompanyId;

/// The report families the cache distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    TrialBalance,
    BalanceSheet,
    ProfitAndLoss,
    CashFlow,
}

/// Cache key: one report family over one period for one company.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportKey {
    pub company_id: CompanyId,
    pub kind: StatementKind,
    /// Period start; None for point-in-time reports
    pub from: Option<NaiveDate>,
    /// As-of / period end date
    pub to: NaiveDate,
}

/// A cached report run.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedReport {
    TrialBalance(TrialBalance),
    BalanceSheet(BalanceSheet),
    ProfitAndLoss(ProfitAndLoss),
    CashFlow(CashFlowStatement),
}

/// Thread-safe report cache shared across ledger handles.
#[derive(Debug, Clone, Default)]
pub struct ReportCache {
    inner: Arc<RwLock<HashMap<ReportKey, CachedReport>>>,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ReportKey) -> Option<CachedReport> {
        self.inner.read().ok()?.get(key).cloned()
    }

    pub fn put(&self, key: ReportKey, report: CachedReport) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(key, report);
        }
    }

    /// Drop every cached run for `company_id` whose period can observe a
    /// posting dated on or after `affected_from` (balance-style reports are
    /// cumulative, so anything ending on or after that date is stale).
    pub fn invalidate_from(&self, company_id: &str, affected_from: NaiveDate) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|key, _| key.company_id != company_id || key.to < affected_from);
        }
    }

    /// Drop every cached run for a company.
    pub fn invalidate_company(&self, company_id: &str) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|key, _| key.company_id != company_id);
        }
    }
}
