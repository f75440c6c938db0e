//! Integration tests for ledger-core

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use ledger_core::{
    patterns, split_gst, Account, AccountType, EntryBuilder, EntryFilter, EntryKind, EntryStatus,
    FiscalYear, Frequency, JournalEntry, Ledger, LedgerError, LedgerResult, LedgerStorage,
    MemoryStorage, RecurringTemplate, TdsSection,
};
use uuid::Uuid;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

const COMPANY: &str = "co1";

/// Ledger with fiscal year 2024-25 (April to March) and the standard chart.
async fn setup_ledger() -> (Ledger<MemoryStorage>, HashMap<&'static str, Account>) {
    let mut ledger = Ledger::new(MemoryStorage::new());
    ledger
        .create_fiscal_year(FiscalYear {
            id: "fy24".to_string(),
            company_id: COMPANY.to_string(),
            start_date: d(2024, 4, 1),
            end_date: d(2025, 3, 31),
            is_locked: false,
        })
        .await
        .unwrap();
    let accounts = ledger.setup_standard_chart(COMPANY).await.unwrap();
    (ledger, accounts)
}

async fn post_simple(
    ledger: &mut Ledger<MemoryStorage>,
    date: NaiveDate,
    narration: &str,
    debit_account: &str,
    credit_account: &str,
    amount: i64,
) -> ledger_core::JournalEntry {
    let request = EntryBuilder::new(COMPANY, date, narration)
        .kind(EntryKind::Opening)
        .debit(debit_account, BigDecimal::from(amount), None)
        .credit(credit_account, BigDecimal::from(amount), None)
        .build()
        .unwrap();
    ledger.create_entry(request).await.unwrap()
}

#[tokio::test]
async fn test_complete_bookkeeping_workflow() {
    let (mut ledger, accounts) = setup_ledger().await;

    assert!(accounts.contains_key("cash"));
    assert!(accounts.contains_key("sales_revenue"));
    assert!(accounts.contains_key("owners_capital"));

    // Owner invests capital
    let investment = post_simple(
        &mut ledger,
        d(2024, 4, 1),
        "Initial investment",
        &accounts["cash"].id,
        &accounts["owners_capital"].id,
        100_000,
    )
    .await;
    assert_eq!(investment.status, EntryStatus::Posted);
    assert_eq!(investment.entry_number, 1);

    let cash = ledger
        .account_balance(COMPANY, &accounts["cash"].id, d(2024, 4, 30))
        .await
        .unwrap();
    assert_eq!(cash, BigDecimal::from(100_000));

    // Manual entry goes through the draft lifecycle
    let request = EntryBuilder::new(COMPANY, d(2024, 4, 5), "Cash sale")
        .debit(&accounts["cash"].id, BigDecimal::from(15_000), None)
        .credit(&accounts["sales_revenue"].id, BigDecimal::from(15_000), None)
        .build()
        .unwrap();
    let draft = ledger.create_entry(request).await.unwrap();
    assert_eq!(draft.status, EntryStatus::Draft);
    assert_eq!(draft.entry_number, 2);

    // Draft entries do not affect balances
    let cash = ledger
        .account_balance(COMPANY, &accounts["cash"].id, d(2024, 4, 30))
        .await
        .unwrap();
    assert_eq!(cash, BigDecimal::from(100_000));

    let pending = ledger
        .submit_for_approval(COMPANY, draft.id)
        .await
        .unwrap();
    assert_eq!(pending.status, EntryStatus::PendingApproval);

    let posted = ledger.post_entry(COMPANY, draft.id).await.unwrap();
    assert_eq!(posted.status, EntryStatus::Posted);

    let cash = ledger
        .account_balance(COMPANY, &accounts["cash"].id, d(2024, 4, 30))
        .await
        .unwrap();
    assert_eq!(cash, BigDecimal::from(115_000));

    let trial_balance = ledger
        .trial_balance(COMPANY, d(2024, 4, 30), None)
        .await
        .unwrap();
    assert!(trial_balance.is_balanced);
    assert_eq!(trial_balance.total_debits, BigDecimal::from(115_000));

    let report = ledger
        .validate_integrity(COMPANY, d(2024, 4, 30))
        .await
        .unwrap();
    assert!(report.is_valid, "issues: {:?}", report.issues);
}

#[tokio::test]
async fn test_posted_entries_are_immutable() {
    let (mut ledger, accounts) = setup_ledger().await;
    let entry = post_simple(
        &mut ledger,
        d(2024, 4, 1),
        "Opening cash",
        &accounts["cash"].id,
        &accounts["owners_capital"].id,
        5_000,
    )
    .await;

    // Editing a posted entry is rejected
    let mut edited = entry.clone();
    edited.narration = "tampered".to_string();
    let err = ledger.update_entry(&edited).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));

    // Posting an already posted entry is rejected
    let err = ledger.post_entry(COMPANY, entry.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));
}

#[tokio::test]
async fn test_unbalanced_entry_is_rejected() {
    let (_ledger, accounts) = setup_ledger().await;
    let err = EntryBuilder::new(COMPANY, d(2024, 4, 1), "Broken")
        .debit(&accounts["cash"].id, BigDecimal::from(100), None)
        .credit(&accounts["sales_revenue"].id, BigDecimal::from(90), None)
        .build()
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn test_reversal_cancels_the_original() {
    let (mut ledger, accounts) = setup_ledger().await;
    post_simple(
        &mut ledger,
        d(2024, 4, 1),
        "Opening cash",
        &accounts["cash"].id,
        &accounts["owners_capital"].id,
        50_000,
    )
    .await;
    let sale = post_simple(
        &mut ledger,
        d(2024, 4, 10),
        "Mistaken sale",
        &accounts["accounts_receivable"].id,
        &accounts["sales_revenue"].id,
        9_000,
    )
    .await;

    let reversal = ledger
        .reverse_entry(COMPANY, sale.id, Some(d(2024, 4, 15)))
        .await
        .unwrap();
    assert_eq!(reversal.kind, EntryKind::Reversal);
    assert_eq!(reversal.status, EntryStatus::Posted);
    assert_eq!(reversal.reversal_of, Some(sale.id));
    assert_eq!(reversal.entry_date, d(2024, 4, 15));

    // Lines are swapped, not edited on the original
    assert_eq!(reversal.lines[0].credit, sale.lines[0].debit);
    let original = ledger.get_entry(COMPANY, sale.id).await.unwrap().unwrap();
    assert_eq!(original.status, EntryStatus::Reversed);
    assert_eq!(original.lines, sale.lines);

    // Net effect on the receivable is zero
    let receivable = ledger
        .account_balance(COMPANY, &accounts["accounts_receivable"].id, d(2024, 4, 30))
        .await
        .unwrap();
    assert_eq!(receivable, BigDecimal::from(0));

    // A reversed entry cannot be reversed again
    let err = ledger.reverse_entry(COMPANY, sale.id, None).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));

    // Backdating a reversal before the original is rejected
    let other = post_simple(
        &mut ledger,
        d(2024, 5, 10),
        "Another sale",
        &accounts["accounts_receivable"].id,
        &accounts["sales_revenue"].id,
        1_000,
    )
    .await;
    let err = ledger
        .reverse_entry(COMPANY, other.id, Some(d(2024, 5, 1)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn test_locked_fiscal_year_rejects_postings() {
    let (mut ledger, accounts) = setup_ledger().await;
    let entry = post_simple(
        &mut ledger,
        d(2024, 4, 1),
        "Opening cash",
        &accounts["cash"].id,
        &accounts["owners_capital"].id,
        10_000,
    )
    .await;

    ledger.lock_fiscal_year(COMPANY, "fy24").await.unwrap();

    let request = EntryBuilder::new(COMPANY, d(2024, 6, 1), "After lock")
        .debit(&accounts["cash"].id, BigDecimal::from(500), None)
        .credit(&accounts["sales_revenue"].id, BigDecimal::from(500), None)
        .build()
        .unwrap();
    let err = ledger.create_entry(request).await.unwrap_err();
    assert!(matches!(err, LedgerError::LockedPeriod(_)));

    // Reversals are postings too
    let err = ledger.reverse_entry(COMPANY, entry.id, None).await.unwrap_err();
    assert!(matches!(err, LedgerError::LockedPeriod(_)));

    // No partial state was written
    let entries = ledger
        .list_entries(COMPANY, &EntryFilter::default())
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);

    // Unlocking restores posting
    ledger.unlock_fiscal_year(COMPANY, "fy24").await.unwrap();
    let request = EntryBuilder::new(COMPANY, d(2024, 6, 1), "After unlock")
        .kind(EntryKind::Opening)
        .debit(&accounts["cash"].id, BigDecimal::from(500), None)
        .credit(&accounts["sales_revenue"].id, BigDecimal::from(500), None)
        .build()
        .unwrap();
    ledger.create_entry(request).await.unwrap();
}

#[tokio::test]
async fn test_entry_outside_any_fiscal_year() {
    let (mut ledger, accounts) = setup_ledger().await;
    let request = EntryBuilder::new(COMPANY, d(2023, 1, 1), "Too early")
        .debit(&accounts["cash"].id, BigDecimal::from(100), None)
        .credit(&accounts["sales_revenue"].id, BigDecimal::from(100), None)
        .build()
        .unwrap();
    let err = ledger.create_entry(request).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[tokio::test]
async fn test_group_accounts_reject_postings() {
    let (mut ledger, accounts) = setup_ledger().await;
    let request = EntryBuilder::new(COMPANY, d(2024, 4, 1), "To a group")
        .debit(&accounts["current_assets"].id, BigDecimal::from(100), None)
        .credit(&accounts["sales_revenue"].id, BigDecimal::from(100), None)
        .build()
        .unwrap();
    let err = ledger.create_entry(request).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn test_gst_invoice_entry() {
    let (mut ledger, accounts) = setup_ledger().await;

    // Intra-state: 18% on 10000 splits into CGST 900 + SGST 900
    let split = split_gst(&BigDecimal::from(10_000), &BigDecimal::from(18), false);
    assert_eq!(split.cgst, BigDecimal::from(900));
    assert_eq!(split.sgst, BigDecimal::from(900));
    assert_eq!(split.igst, BigDecimal::from(0));

    let request = patterns::invoice_entry(patterns::InvoiceEntryParams {
        company_id: COMPANY,
        entry_date: d(2024, 4, 10),
        narration: "Invoice INV-001",
        receivable_account_id: &accounts["accounts_receivable"].id,
        revenue_account_id: &accounts["sales_revenue"].id,
        gst_payable_account_id: &accounts["gst_payable"].id,
        taxable_amount: BigDecimal::from(10_000),
        gst: split,
    })
    .unwrap();
    let entry = ledger.create_entry(request).await.unwrap();
    assert_eq!(entry.status, EntryStatus::Posted);
    assert_eq!(entry.kind, EntryKind::AutoInvoice);

    let receivable = ledger
        .account_balance(COMPANY, &accounts["accounts_receivable"].id, d(2024, 4, 30))
        .await
        .unwrap();
    assert_eq!(receivable, BigDecimal::from(11_800));

    let gst_payable = ledger
        .account_balance(COMPANY, &accounts["gst_payable"].id, d(2024, 4, 30))
        .await
        .unwrap();
    assert_eq!(gst_payable, BigDecimal::from(1_800));

    // Inter-state keeps the full tax as IGST
    let inter = split_gst(&BigDecimal::from(10_000), &BigDecimal::from(18), true);
    assert_eq!(inter.igst, BigDecimal::from(1_800));
    assert_eq!(inter.cgst, BigDecimal::from(0));
}

#[tokio::test]
async fn test_tds_bill_entry() {
    let (mut ledger, accounts) = setup_ledger().await;

    // Below the threshold no TDS applies
    let below = TdsSection::ProfessionalFees.compute(BigDecimal::from(25_000)).unwrap();
    assert!(!below.is_applicable);
    assert_eq!(below.tds_amount, BigDecimal::from(0));
    assert_eq!(below.net_payable, BigDecimal::from(25_000));

    // At the threshold the full amount is subject to TDS
    let at = TdsSection::ProfessionalFees.compute(BigDecimal::from(30_000)).unwrap();
    assert!(at.is_applicable);
    assert_eq!(at.tds_amount, BigDecimal::from(3_000));
    assert_eq!(at.net_payable, BigDecimal::from(27_000));

    let request = patterns::bill_entry_with_tds(patterns::BillEntryParams {
        company_id: COMPANY,
        entry_date: d(2024, 4, 12),
        narration: "Audit fees",
        expense_account_id: &accounts["professional_fees"].id,
        payable_account_id: &accounts["accounts_payable"].id,
        tds_payable_account_id: &accounts["tds_payable"].id,
        tds: at,
    })
    .unwrap();
    let entry = ledger.create_entry(request).await.unwrap();
    assert!(entry.is_balanced());

    let tds_payable = ledger
        .account_balance(COMPANY, &accounts["tds_payable"].id, d(2024, 4, 30))
        .await
        .unwrap();
    assert_eq!(tds_payable, BigDecimal::from(3_000));
    let vendor = ledger
        .account_balance(COMPANY, &accounts["accounts_payable"].id, d(2024, 4, 30))
        .await
        .unwrap();
    assert_eq!(vendor, BigDecimal::from(27_000));
}

#[tokio::test]
async fn test_recurring_entries_catch_up_and_clamp() {
    let (mut ledger, accounts) = setup_ledger().await;
    post_simple(
        &mut ledger,
        d(2024, 4, 1),
        "Opening cash",
        &accounts["cash"].id,
        &accounts["owners_capital"].id,
        100_000,
    )
    .await;

    ledger
        .create_template(RecurringTemplate {
            id: "rent".to_string(),
            company_id: COMPANY.to_string(),
            name: "Office rent".to_string(),
            frequency: Frequency::Monthly,
            next_run_date: d(2024, 4, 30),
            end_date: None,
            narration: "Monthly office rent".to_string(),
            lines: vec![
                ledger_core::JournalLine::debit(
                    accounts["rent_expense"].id.clone(),
                    BigDecimal::from(20_000),
                    None,
                ),
                ledger_core::JournalLine::credit(
                    accounts["bank"].id.clone(),
                    BigDecimal::from(20_000),
                    None,
                ),
            ],
            is_active: true,
            last_run_at: None,
        })
        .await
        .unwrap();

    // Running three months late fires the template once per missed month
    let summary = ledger
        .generate_due_entries(COMPANY, d(2024, 7, 15))
        .await
        .unwrap();
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.failed, 0);

    let entries = ledger
        .list_entries(
            COMPANY,
            &EntryFilter {
                account_id: Some(accounts["rent_expense"].id.clone()),
                ..EntryFilter::default()
            },
        )
        .await
        .unwrap();
    let dates: Vec<NaiveDate> = entries.iter().map(|e| e.entry_date).collect();
    // April 30 clamps to May 30 and June 30, not the 31st
    assert_eq!(dates, vec![d(2024, 4, 30), d(2024, 5, 30), d(2024, 6, 30)]);
    assert!(entries.iter().all(|e| e.kind == EntryKind::Recurring));
    assert!(entries.iter().all(|e| e.status == EntryStatus::Posted));

    // Nothing further is due until the next schedule date
    let summary = ledger
        .generate_due_entries(COMPANY, d(2024, 7, 15))
        .await
        .unwrap();
    assert_eq!(summary.processed, 0);
}

#[tokio::test]
async fn test_recurring_template_deactivates_past_end_date() {
    let (mut ledger, accounts) = setup_ledger().await;
    post_simple(
        &mut ledger,
        d(2024, 4, 1),
        "Opening cash",
        &accounts["cash"].id,
        &accounts["owners_capital"].id,
        50_000,
    )
    .await;

    ledger
        .create_template(RecurringTemplate {
            id: "sub".to_string(),
            company_id: COMPANY.to_string(),
            name: "Subscription".to_string(),
            frequency: Frequency::Monthly,
            next_run_date: d(2024, 5, 1),
            end_date: Some(d(2024, 5, 31)),
            narration: "Software subscription".to_string(),
            lines: vec![
                ledger_core::JournalLine::debit(
                    accounts["utilities_expense"].id.clone(),
                    BigDecimal::from(1_000),
                    None,
                ),
                ledger_core::JournalLine::credit(
                    accounts["bank"].id.clone(),
                    BigDecimal::from(1_000),
                    None,
                ),
            ],
            is_active: true,
            last_run_at: None,
        })
        .await
        .unwrap();

    // Within the window the May occurrence fires
    let summary = ledger
        .generate_due_entries(COMPANY, d(2024, 5, 15))
        .await
        .unwrap();
    assert_eq!(summary.processed, 1);

    // The advanced schedule falls past the end date, deactivating the template
    let due = ledger.due_templates(COMPANY, d(2024, 12, 1)).await.unwrap();
    assert!(due.is_empty());

    // A batch run after the window generates nothing more
    let summary = ledger
        .generate_due_entries(COMPANY, d(2024, 8, 1))
        .await
        .unwrap();
    assert_eq!(summary.processed, 0);
}

#[tokio::test]
async fn test_financial_statements_tie_together() {
    let (mut ledger, accounts) = setup_ledger().await;
    post_simple(
        &mut ledger,
        d(2024, 4, 1),
        "Owner investment",
        &accounts["cash"].id,
        &accounts["owners_capital"].id,
        50_000,
    )
    .await;
    post_simple(
        &mut ledger,
        d(2024, 4, 10),
        "Credit sale",
        &accounts["accounts_receivable"].id,
        &accounts["sales_revenue"].id,
        10_000,
    )
    .await;
    post_simple(
        &mut ledger,
        d(2024, 4, 20),
        "Collection",
        &accounts["cash"].id,
        &accounts["accounts_receivable"].id,
        6_000,
    )
    .await;
    post_simple(
        &mut ledger,
        d(2024, 4, 25),
        "Rent paid",
        &accounts["rent_expense"].id,
        &accounts["cash"].id,
        2_000,
    )
    .await;

    let pnl = ledger
        .profit_and_loss(COMPANY, d(2024, 4, 1), d(2024, 4, 30))
        .await
        .unwrap();
    assert_eq!(pnl.total_income, BigDecimal::from(10_000));
    assert_eq!(pnl.total_expenses, BigDecimal::from(2_000));
    assert_eq!(pnl.net_income, BigDecimal::from(8_000));

    let balance_sheet = ledger.balance_sheet(COMPANY, d(2024, 4, 30)).await.unwrap();
    assert!(balance_sheet.is_balanced);
    // Cash 54000 + receivable 4000
    assert_eq!(balance_sheet.total_assets, BigDecimal::from(58_000));
    // Capital 50000 + net income 8000
    assert_eq!(balance_sheet.total_equity, BigDecimal::from(58_000));

    let cash_flow = ledger
        .cash_flow(COMPANY, d(2024, 4, 1), d(2024, 4, 30))
        .await
        .unwrap();
    assert!(cash_flow.reconciled);
    assert_eq!(cash_flow.opening_cash, BigDecimal::from(0));
    assert_eq!(cash_flow.closing_cash, BigDecimal::from(54_000));
    assert_eq!(cash_flow.net_increase, BigDecimal::from(54_000));
    // Net income 8000 less the 4000 still locked up in receivables
    assert_eq!(cash_flow.operating_total, BigDecimal::from(4_000));
    assert_eq!(cash_flow.financing_total, BigDecimal::from(50_000));

    let report = ledger
        .validate_integrity(COMPANY, d(2024, 4, 30))
        .await
        .unwrap();
    assert!(report.is_valid, "issues: {:?}", report.issues);
}

#[tokio::test]
async fn test_reports_refresh_after_new_postings() {
    let (mut ledger, accounts) = setup_ledger().await;
    post_simple(
        &mut ledger,
        d(2024, 4, 1),
        "Owner investment",
        &accounts["cash"].id,
        &accounts["owners_capital"].id,
        10_000,
    )
    .await;

    let first = ledger
        .trial_balance(COMPANY, d(2024, 4, 30), None)
        .await
        .unwrap();
    assert_eq!(first.total_debits, BigDecimal::from(10_000));

    // A cached run comes back unchanged
    let cached = ledger
        .trial_balance(COMPANY, d(2024, 4, 30), None)
        .await
        .unwrap();
    assert_eq!(cached.run_id, first.run_id);

    post_simple(
        &mut ledger,
        d(2024, 4, 15),
        "Cash sale",
        &accounts["cash"].id,
        &accounts["sales_revenue"].id,
        5_000,
    )
    .await;

    // The posting staledated the cached run
    let refreshed = ledger
        .trial_balance(COMPANY, d(2024, 4, 30), None)
        .await
        .unwrap();
    assert_ne!(refreshed.run_id, first.run_id);
    assert_eq!(refreshed.total_debits, BigDecimal::from(15_000));
}

#[tokio::test]
async fn test_entry_numbers_are_sequential_per_fiscal_year() {
    let (mut ledger, accounts) = setup_ledger().await;
    ledger
        .create_fiscal_year(FiscalYear {
            id: "fy25".to_string(),
            company_id: COMPANY.to_string(),
            start_date: d(2025, 4, 1),
            end_date: d(2026, 3, 31),
            is_locked: false,
        })
        .await
        .unwrap();

    for i in 1..=3u32 {
        let entry = post_simple(
            &mut ledger,
            d(2024, 4, i),
            "In fy24",
            &accounts["cash"].id,
            &accounts["owners_capital"].id,
            1_000,
        )
        .await;
        assert_eq!(entry.entry_number, i);
    }

    let next_year = post_simple(
        &mut ledger,
        d(2025, 4, 5),
        "In fy25",
        &accounts["cash"].id,
        &accounts["owners_capital"].id,
        1_000,
    )
    .await;
    assert_eq!(next_year.entry_number, 1);
    assert_eq!(next_year.fiscal_year_id, "fy25");
}

#[tokio::test]
async fn test_enhanced_validators_reject_sloppy_entries() {
    use ledger_core::utils::{EnhancedAccountValidator, EnhancedEntryValidator};

    let mut ledger = Ledger::with_validators(
        MemoryStorage::new(),
        Box::new(EnhancedAccountValidator),
        Box::new(EnhancedEntryValidator),
    );
    ledger
        .create_fiscal_year(FiscalYear {
            id: "fy24".to_string(),
            company_id: COMPANY.to_string(),
            start_date: d(2024, 4, 1),
            end_date: d(2025, 3, 31),
            is_locked: false,
        })
        .await
        .unwrap();
    let accounts = ledger.setup_standard_chart(COMPANY).await.unwrap();

    // Blank narration passes basic validation but not the enhanced one
    let request = EntryBuilder::new(COMPANY, d(2024, 4, 1), "   ")
        .debit(&accounts["cash"].id, BigDecimal::from(100), None)
        .credit(&accounts["sales_revenue"].id, BigDecimal::from(100), None)
        .build()
        .unwrap();
    let err = ledger.create_entry(request).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    // The same account twice on the same side is rejected
    let request = EntryBuilder::new(COMPANY, d(2024, 4, 1), "Split debit")
        .debit(&accounts["cash"].id, BigDecimal::from(60), None)
        .debit(&accounts["cash"].id, BigDecimal::from(40), None)
        .credit(&accounts["sales_revenue"].id, BigDecimal::from(100), None)
        .build()
        .unwrap();
    let err = ledger.create_entry(request).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn test_overlapping_fiscal_years_are_rejected() {
    let (mut ledger, _accounts) = setup_ledger().await;

    // Partial overlap at the tail of fy24
    let err = ledger
        .create_fiscal_year(FiscalYear {
            id: "fy24b".to_string(),
            company_id: COMPANY.to_string(),
            start_date: d(2025, 1, 1),
            end_date: d(2025, 12, 31),
            is_locked: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    // A range that fully contains fy24 intersects it just the same
    let err = ledger
        .create_fiscal_year(FiscalYear {
            id: "fy24-wide".to_string(),
            company_id: COMPANY.to_string(),
            start_date: d(2024, 1, 1),
            end_date: d(2026, 12, 31),
            is_locked: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    // A disjoint year is fine
    ledger
        .create_fiscal_year(FiscalYear {
            id: "fy25".to_string(),
            company_id: COMPANY.to_string(),
            start_date: d(2025, 4, 1),
            end_date: d(2026, 3, 31),
            is_locked: false,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_moving_a_draft_across_fiscal_years_renumbers_it() {
    let (mut ledger, accounts) = setup_ledger().await;
    ledger
        .create_fiscal_year(FiscalYear {
            id: "fy25".to_string(),
            company_id: COMPANY.to_string(),
            start_date: d(2025, 4, 1),
            end_date: d(2026, 3, 31),
            is_locked: false,
        })
        .await
        .unwrap();

    // fy25 already has entry #1
    let posted = post_simple(
        &mut ledger,
        d(2025, 4, 10),
        "In fy25",
        &accounts["cash"].id,
        &accounts["owners_capital"].id,
        1_000,
    )
    .await;
    assert_eq!((posted.fiscal_year_id.as_str(), posted.entry_number), ("fy25", 1));

    // Draft #1 in fy24
    let request = EntryBuilder::new(COMPANY, d(2024, 5, 1), "Draft in fy24")
        .debit(&accounts["cash"].id, BigDecimal::from(200), None)
        .credit(&accounts["sales_revenue"].id, BigDecimal::from(200), None)
        .build()
        .unwrap();
    let draft = ledger.create_entry(request).await.unwrap();
    assert_eq!((draft.fiscal_year_id.as_str(), draft.entry_number), ("fy24", 1));

    // Moving the draft's date into fy25 allocates a fresh number there
    let mut edited = draft.clone();
    edited.entry_date = d(2025, 4, 20);
    let moved = ledger.update_entry(&edited).await.unwrap();
    assert_eq!(moved.fiscal_year_id, "fy25");
    assert_eq!(moved.entry_number, 2);

    // A date change within the same year keeps the number
    let mut edited = moved.clone();
    edited.entry_date = d(2025, 5, 1);
    let same_year = ledger.update_entry(&edited).await.unwrap();
    assert_eq!(same_year.entry_number, 2);
}

/// Storage wrapper that simulates an entry-number allocation race by
/// rejecting one `save_entry` call with a concurrency conflict.
#[derive(Clone)]
struct RacingStorage {
    inner: MemoryStorage,
    fail_next_save: Arc<AtomicBool>,
}

impl RacingStorage {
    fn new() -> Self {
        Self {
            inner: MemoryStorage::new(),
            fail_next_save: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl LedgerStorage for RacingStorage {
    async fn save_account(&mut self, account: &Account) -> LedgerResult<()> {
        self.inner.save_account(account).await
    }

    async fn get_account(
        &self,
        company_id: &str,
        account_id: &str,
    ) -> LedgerResult<Option<Account>> {
        self.inner.get_account(company_id, account_id).await
    }

    async fn get_account_by_code(
        &self,
        company_id: &str,
        code: &str,
    ) -> LedgerResult<Option<Account>> {
        self.inner.get_account_by_code(company_id, code).await
    }

    async fn list_accounts(
        &self,
        company_id: &str,
        account_type: Option<AccountType>,
    ) -> LedgerResult<Vec<Account>> {
        self.inner.list_accounts(company_id, account_type).await
    }

    async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
        self.inner.update_account(account).await
    }

    async fn save_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()> {
        if self.fail_next_save.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::Concurrency(format!(
                "Entry number {} is already taken in fiscal year '{}'",
                entry.entry_number, entry.fiscal_year_id
            )));
        }
        self.inner.save_entry(entry).await
    }

    async fn get_entry(
        &self,
        company_id: &str,
        entry_id: Uuid,
    ) -> LedgerResult<Option<JournalEntry>> {
        self.inner.get_entry(company_id, entry_id).await
    }

    async fn list_entries(
        &self,
        company_id: &str,
        filter: &EntryFilter,
    ) -> LedgerResult<Vec<JournalEntry>> {
        self.inner.list_entries(company_id, filter).await
    }

    async fn update_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()> {
        self.inner.update_entry(entry).await
    }

    async fn next_entry_number(
        &mut self,
        company_id: &str,
        fiscal_year_id: &str,
    ) -> LedgerResult<u32> {
        self.inner.next_entry_number(company_id, fiscal_year_id).await
    }

    async fn save_fiscal_year(&mut self, fiscal_year: &FiscalYear) -> LedgerResult<()> {
        self.inner.save_fiscal_year(fiscal_year).await
    }

    async fn get_fiscal_year(
        &self,
        company_id: &str,
        fiscal_year_id: &str,
    ) -> LedgerResult<Option<FiscalYear>> {
        self.inner.get_fiscal_year(company_id, fiscal_year_id).await
    }

    async fn fiscal_year_for_date(
        &self,
        company_id: &str,
        date: NaiveDate,
    ) -> LedgerResult<Option<FiscalYear>> {
        self.inner.fiscal_year_for_date(company_id, date).await
    }

    async fn list_fiscal_years(&self, company_id: &str) -> LedgerResult<Vec<FiscalYear>> {
        self.inner.list_fiscal_years(company_id).await
    }

    async fn save_template(&mut self, template: &RecurringTemplate) -> LedgerResult<()> {
        self.inner.save_template(template).await
    }

    async fn get_template(
        &self,
        company_id: &str,
        template_id: &str,
    ) -> LedgerResult<Option<RecurringTemplate>> {
        self.inner.get_template(company_id, template_id).await
    }

    async fn list_templates(&self, company_id: &str) -> LedgerResult<Vec<RecurringTemplate>> {
        self.inner.list_templates(company_id).await
    }

    async fn update_template(&mut self, template: &RecurringTemplate) -> LedgerResult<()> {
        self.inner.update_template(template).await
    }
}

#[tokio::test]
async fn test_posting_retries_once_after_numbering_race() {
    let storage = RacingStorage::new();
    let race_flag = Arc::clone(&storage.fail_next_save);
    let mut ledger = Ledger::new(storage);
    ledger
        .create_fiscal_year(FiscalYear {
            id: "fy24".to_string(),
            company_id: COMPANY.to_string(),
            start_date: d(2024, 4, 1),
            end_date: d(2025, 3, 31),
            is_locked: false,
        })
        .await
        .unwrap();
    let accounts = ledger.setup_standard_chart(COMPANY).await.unwrap();

    // The next save collides as if another posting took the number first
    race_flag.store(true, Ordering::SeqCst);

    let request = EntryBuilder::new(COMPANY, d(2024, 4, 5), "Raced posting")
        .kind(EntryKind::Opening)
        .debit(&accounts["cash"].id, BigDecimal::from(700), None)
        .credit(&accounts["owners_capital"].id, BigDecimal::from(700), None)
        .build()
        .unwrap();
    let entry = ledger.create_entry(request).await.unwrap();

    // The first allocation was burned by the race; the retry landed with a fresh number
    assert_eq!(entry.entry_number, 2);
    assert_eq!(entry.status, EntryStatus::Posted);
    let stored = ledger.get_entry(COMPANY, entry.id).await.unwrap().unwrap();
    assert_eq!(stored.entry_number, 2);
}
