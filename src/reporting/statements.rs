//! Statement derivation: balance sheet, profit & loss, and cash flow
//!
//! Statements are built from aggregated balances through a typed rule table.
//! Section totals are computed over the lines actually emitted for the
//! section, so a misclassified account shows up as a broken total instead of
//! a silent omission.

use std::collections::{BTreeMap, BTreeSet};

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reporting::balances::{AccountTotals, BalanceAggregator};
use crate::traits::LedgerStorage;
use crate::types::*;

/// Sections a statement line can belong to. Closed enumeration; there is no
/// string-keyed dispatch anywhere in derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementSection {
    Assets,
    Liabilities,
    Equity,
    Income,
    Expenses,
    Operating,
    Investing,
    Financing,
}

impl StatementSection {
    pub fn label(&self) -> &'static str {
        match self {
            StatementSection::Assets => "Assets",
            StatementSection::Liabilities => "Liabilities",
            StatementSection::Equity => "Equity",
            StatementSection::Income => "Income",
            StatementSection::Expenses => "Expenses",
            StatementSection::Operating => "Cash Flow from Operating Activities",
            StatementSection::Investing => "Cash Flow from Investing Activities",
            StatementSection::Financing => "Cash Flow from Financing Activities",
        }
    }
}

/// Balance sheet sections, in derivation order.
const BALANCE_SHEET_ORDER: [StatementSection; 3] = [
    StatementSection::Assets,
    StatementSection::Liabilities,
    StatementSection::Equity,
];

/// Profit & loss sections, in derivation order.
const PROFIT_AND_LOSS_ORDER: [StatementSection; 2] =
    [StatementSection::Income, StatementSection::Expenses];

/// Cash flow sections, in derivation order (indirect method).
const CASH_FLOW_ORDER: [StatementSection; 3] = [
    StatementSection::Operating,
    StatementSection::Investing,
    StatementSection::Financing,
];

/// Role of a line within a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Header,
    Detail,
    Subtotal,
    Total,
    OpeningBalance,
    ClosingBalance,
}

/// A rendered statement line with its presentation attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementLine {
    pub kind: LineKind,
    pub section: Option<StatementSection>,
    pub label: String,
    pub amount: BigDecimal,
    pub indent: u8,
    pub is_bold: bool,
    pub is_total: bool,
}

impl StatementLine {
    fn header(section: StatementSection) -> Self {
        Self {
            kind: LineKind::Header,
            section: Some(section),
            label: section.label().to_string(),
            amount: BigDecimal::from(0),
            indent: 0,
            is_bold: true,
            is_total: false,
        }
    }

    fn detail(section: StatementSection, label: String, amount: BigDecimal) -> Self {
        Self {
            kind: LineKind::Detail,
            section: Some(section),
            label,
            amount,
            indent: 1,
            is_bold: false,
            is_total: false,
        }
    }

    fn subtotal(section: StatementSection, label: String, amount: BigDecimal) -> Self {
        Self {
            kind: LineKind::Subtotal,
            section: Some(section),
            label,
            amount,
            indent: 1,
            is_bold: true,
            is_total: true,
        }
    }

    fn total(label: String, amount: BigDecimal) -> Self {
        Self {
            kind: LineKind::Total,
            section: None,
            label,
            amount,
            indent: 0,
            is_bold: true,
            is_total: true,
        }
    }

    fn balance(kind: LineKind, label: String, amount: BigDecimal) -> Self {
        Self {
            kind,
            section: None,
            label,
            amount,
            indent: 0,
            is_bold: false,
            is_total: false,
        }
    }
}

/// Rule table for cash-flow classification, keyed by account code.
///
/// Cash-and-equivalent accounts define the statement's subject and are
/// excluded from the sections; equity is always financing; everything else
/// defaults to operating (working capital) unless listed as investing or
/// financing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementRules {
    cash_codes: BTreeSet<String>,
    investing_codes: BTreeSet<String>,
    financing_codes: BTreeSet<String>,
}

impl StatementRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules matching the seeded standard chart: cash/bank are cash
    /// equivalents, loans are financing.
    pub fn standard_chart() -> Self {
        Self::new()
            .with_cash_account("1001")
            .with_cash_account("1050")
            .with_financing_account("2100")
    }

    pub fn with_cash_account(mut self, code: &str) -> Self {
        self.cash_codes.insert(code.to_string());
        self
    }

    pub fn with_investing_account(mut self, code: &str) -> Self {
        self.investing_codes.insert(code.to_string());
        self
    }

    pub fn with_financing_account(mut self, code: &str) -> Self {
        self.financing_codes.insert(code.to_string());
        self
    }

    pub fn is_cash(&self, account: &Account) -> bool {
        self.cash_codes.contains(&account.code)
    }

    /// Cash-flow section for a balance-sheet account that is not itself cash.
    pub fn classify(&self, account: &Account) -> StatementSection {
        if account.account_type == AccountType::Equity
            || self.financing_codes.contains(&account.code)
        {
            StatementSection::Financing
        } else if self.investing_codes.contains(&account.code) {
            StatementSection::Investing
        } else {
            StatementSection::Operating
        }
    }
}

/// Balance sheet as of a date; re-verified against Assets = Liabilities + Equity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub as_of_date: NaiveDate,
    pub lines: Vec<StatementLine>,
    pub total_assets: BigDecimal,
    pub total_liabilities: BigDecimal,
    pub total_equity: BigDecimal,
    pub is_balanced: bool,
    pub run_id: Uuid,
}

/// Profit & loss over a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitAndLoss {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub lines: Vec<StatementLine>,
    pub total_income: BigDecimal,
    pub total_expenses: BigDecimal,
    pub net_income: BigDecimal,
    pub run_id: Uuid,
}

/// Cash flow statement (indirect method) over a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowStatement {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub lines: Vec<StatementLine>,
    pub operating_total: BigDecimal,
    pub investing_total: BigDecimal,
    pub financing_total: BigDecimal,
    pub net_increase: BigDecimal,
    pub opening_cash: BigDecimal,
    pub closing_cash: BigDecimal,
    /// Whether closing - opening equals the derived net increase
    pub reconciled: bool,
    pub run_id: Uuid,
}

/// Derives the three primary statements from aggregated balances.
pub struct StatementEngine<S: LedgerStorage> {
    storage: S,
    aggregator: BalanceAggregator<S>,
}

impl<S: LedgerStorage + Clone> StatementEngine<S> {
    pub fn new(storage: S) -> Self {
        Self {
            aggregator: BalanceAggregator::new(storage.clone()),
            storage,
        }
    }

    async fn ledger_accounts(&self, company_id: &str) -> LedgerResult<Vec<Account>> {
        let mut accounts = self.storage.list_accounts(company_id, None).await?;
        accounts.retain(|a| !a.is_group);
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(accounts)
    }

    /// Derive the balance sheet as of `as_of`. Net income to date is folded
    /// into equity so the sheet balances without closing entries.
    pub async fn balance_sheet(
        &self,
        company_id: &str,
        as_of: NaiveDate,
    ) -> LedgerResult<BalanceSheet> {
        let totals = self.aggregator.account_totals(company_id, as_of, None).await?;
        let accounts = self.ledger_accounts(company_id).await?;

        let zero = BigDecimal::from(0);
        let net_of = |account: &Account| -> BigDecimal {
            totals
                .get(&account.id)
                .map(|t| t.net(account.account_type))
                .unwrap_or_else(|| zero.clone())
        };

        let net_income: BigDecimal = accounts
            .iter()
            .filter(|a| a.account_type == AccountType::Income)
            .map(|a| net_of(a))
            .sum::<BigDecimal>()
            - accounts
                .iter()
                .filter(|a| a.account_type == AccountType::Expense)
                .map(|a| net_of(a))
                .sum::<BigDecimal>();

        let mut lines = Vec::new();
        let mut section_totals: BTreeMap<u8, BigDecimal> = BTreeMap::new();

        for (idx, section) in BALANCE_SHEET_ORDER.iter().enumerate() {
            let account_type = match section {
                StatementSection::Assets => AccountType::Asset,
                StatementSection::Liabilities => AccountType::Liability,
                _ => AccountType::Equity,
            };
            lines.push(StatementLine::header(*section));

            let mut section_total = BigDecimal::from(0);
            for account in accounts.iter().filter(|a| a.account_type == account_type) {
                let net = net_of(account);
                if net == zero {
                    continue;
                }
                section_total += &net;
                lines.push(StatementLine::detail(*section, account.name.clone(), net));
            }
            if *section == StatementSection::Equity && net_income != zero {
                section_total += &net_income;
                lines.push(StatementLine::detail(
                    *section,
                    "Net Income".to_string(),
                    net_income.clone(),
                ));
            }
            lines.push(StatementLine::subtotal(
                *section,
                format!("Total {}", section.label()),
                section_total.clone(),
            ));
            section_totals.insert(idx as u8, section_total);
        }

        let total_assets = section_totals.remove(&0).unwrap_or_else(|| zero.clone());
        let total_liabilities = section_totals.remove(&1).unwrap_or_else(|| zero.clone());
        let total_equity = section_totals.remove(&2).unwrap_or_else(|| zero.clone());

        let is_balanced = (total_assets.clone() - (&total_liabilities + &total_equity)).abs()
            <= balance_epsilon();

        Ok(BalanceSheet {
            as_of_date: as_of,
            lines,
            total_assets,
            total_liabilities,
            total_equity,
            is_balanced,
            run_id: Uuid::new_v4(),
        })
    }

    /// Derive the profit & loss statement for a period.
    pub async fn profit_and_loss(
        &self,
        company_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> LedgerResult<ProfitAndLoss> {
        let totals = self.aggregator.period_totals(company_id, from, to).await?;
        let accounts = self.ledger_accounts(company_id).await?;

        let zero = BigDecimal::from(0);
        let mut lines = Vec::new();
        let mut total_income = BigDecimal::from(0);
        let mut total_expenses = BigDecimal::from(0);

        for section in PROFIT_AND_LOSS_ORDER {
            let account_type = match section {
                StatementSection::Income => AccountType::Income,
                _ => AccountType::Expense,
            };
            lines.push(StatementLine::header(section));

            let mut section_total = BigDecimal::from(0);
            for account in accounts.iter().filter(|a| a.account_type == account_type) {
                let net = totals
                    .get(&account.id)
                    .map(|t| t.net(account.account_type))
                    .unwrap_or_else(|| zero.clone());
                if net == zero {
                    continue;
                }
                section_total += &net;
                lines.push(StatementLine::detail(section, account.name.clone(), net));
            }
            lines.push(StatementLine::subtotal(
                section,
                format!("Total {}", section.label()),
                section_total.clone(),
            ));
            match section {
                StatementSection::Income => total_income = section_total,
                _ => total_expenses = section_total,
            }
        }

        let net_income = &total_income - &total_expenses;
        lines.push(StatementLine::total("Net Income".to_string(), net_income.clone()));

        Ok(ProfitAndLoss {
            start_date: from,
            end_date: to,
            lines,
            total_income,
            total_expenses,
            net_income,
            run_id: Uuid::new_v4(),
        })
    }

    /// Derive the cash flow statement for a period using the indirect
    /// method: start from net income, then adjust for the change in every
    /// non-cash balance-sheet account, classified by the rule table.
    ///
    /// Outflows render as negative amounts. The derived net increase is
    /// re-verified against the cash accounts' actual delta over the period.
    pub async fn cash_flow(
        &self,
        company_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        rules: &StatementRules,
    ) -> LedgerResult<CashFlowStatement> {
        let end_totals = self.aggregator.account_totals(company_id, to, None).await?;
        let before_totals = match from.pred_opt() {
            Some(day_before) => {
                self.aggregator
                    .account_totals(company_id, day_before, None)
                    .await?
            }
            None => BTreeMap::new(),
        };
        let accounts = self.ledger_accounts(company_id).await?;

        let zero = BigDecimal::from(0);
        let net_at = |map: &BTreeMap<String, AccountTotals>, account: &Account| -> BigDecimal {
            map.get(&account.id)
                .map(|t| t.net(account.account_type))
                .unwrap_or_else(|| BigDecimal::from(0))
        };

        let mut opening_cash = BigDecimal::from(0);
        let mut closing_cash = BigDecimal::from(0);
        let mut net_income = BigDecimal::from(0);
        // (section, label, signed cash effect)
        let mut adjustments: Vec<(StatementSection, String, BigDecimal)> = Vec::new();

        for account in &accounts {
            let before = net_at(&before_totals, account);
            let end = net_at(&end_totals, account);
            let delta = &end - &before;

            if rules.is_cash(account) {
                opening_cash += before;
                closing_cash += end;
                continue;
            }
            match account.account_type {
                AccountType::Income => net_income += delta,
                AccountType::Expense => net_income -= delta,
                _ => {
                    if delta == zero {
                        continue;
                    }
                    // A growing non-cash asset consumes cash; a growing
                    // liability or equity balance provides it.
                    let effect = match account.account_type.normal_balance() {
                        Side::Debit => -delta,
                        Side::Credit => delta,
                    };
                    adjustments.push((
                        rules.classify(account),
                        format!("Change in {}", account.name),
                        effect,
                    ));
                }
            }
        }

        let mut lines = Vec::new();
        let mut totals_by_section: BTreeMap<u8, BigDecimal> = BTreeMap::new();

        for (idx, section) in CASH_FLOW_ORDER.iter().enumerate() {
            lines.push(StatementLine::header(*section));
            let mut section_total = BigDecimal::from(0);

            if *section == StatementSection::Operating {
                section_total += &net_income;
                lines.push(StatementLine::detail(
                    *section,
                    "Net Income".to_string(),
                    net_income.clone(),
                ));
            }
            for (adj_section, label, effect) in &adjustments {
                if adj_section == section {
                    section_total += effect;
                    lines.push(StatementLine::detail(*section, label.clone(), effect.clone()));
                }
            }
            lines.push(StatementLine::subtotal(
                *section,
                format!("Net {}", section.label()),
                section_total.clone(),
            ));
            totals_by_section.insert(idx as u8, section_total);
        }

        let operating_total = totals_by_section.remove(&0).unwrap_or_else(|| zero.clone());
        let investing_total = totals_by_section.remove(&1).unwrap_or_else(|| zero.clone());
        let financing_total = totals_by_section.remove(&2).unwrap_or_else(|| zero.clone());
        let net_increase = &operating_total + &investing_total + &financing_total;

        lines.push(StatementLine::total(
            "Net Increase in Cash".to_string(),
            net_increase.clone(),
        ));
        lines.push(StatementLine::balance(
            LineKind::OpeningBalance,
            "Opening Cash and Equivalents".to_string(),
            opening_cash.clone(),
        ));
        lines.push(StatementLine::balance(
            LineKind::ClosingBalance,
            "Closing Cash and Equivalents".to_string(),
            closing_cash.clone(),
        ));

        let reconciled = ((&closing_cash - &opening_cash) - &net_increase).abs()
            <= balance_epsilon();

        Ok(CashFlowStatement {
            start_date: from,
            end_date: to,
            lines,
            operating_total,
            investing_total,
            financing_total,
            net_increase,
            opening_cash,
            closing_cash,
            reconciled,
            run_id: Uuid::new_v4(),
        })
    }
}
