//! Basic ledger usage example

use ledger_core::utils::MemoryStorage;
use ledger_core::{EntryBuilder, FiscalYear, Frequency, JournalLine, Ledger, RecurringTemplate};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🧾 Ledger Core - Basic Ledger Example\n");

    // Create a new ledger with in-memory storage
    let storage = MemoryStorage::new();
    let mut ledger = Ledger::new(storage);
    let company = "demo-co";

    // 1. Open the books: fiscal year and chart of accounts
    println!("📅 Opening fiscal year 2024-25...");
    ledger
        .create_fiscal_year(FiscalYear {
            id: "fy2024".to_string(),
            company_id: company.to_string(),
            start_date: date(2024, 4, 1),
            end_date: date(2025, 3, 31),
            is_locked: false,
        })
        .await?;

    println!("📊 Setting up Chart of Accounts...");
    let accounts = ledger.setup_standard_chart(company).await?;
    for account in accounts.values() {
        println!(
            "  ✓ Created account: {} - {} ({:?})",
            account.code, account.name, account.account_type
        );
    }
    println!();

    // 2. Record some business activity
    println!("💰 Recording Journal Entries...\n");

    // Owner invests cash; opening entries post immediately
    let investment = EntryBuilder::new(company, date(2024, 4, 1), "Initial owner investment")
        .kind(ledger_core::EntryKind::Opening)
        .debit(&accounts["cash"].id, BigDecimal::from(50000), None)
        .credit(&accounts["owners_capital"].id, BigDecimal::from(50000), None)
        .build()?;
    let entry = ledger.create_entry(investment).await?;
    println!(
        "  ✓ Entry #{} posted: Owner investment of ₹50,000",
        entry.entry_number
    );

    // A manual entry starts as a draft and is posted explicitly
    let sale = EntryBuilder::new(company, date(2024, 4, 10), "Cash sale of goods")
        .debit(&accounts["cash"].id, BigDecimal::from(15000), None)
        .credit(&accounts["sales_revenue"].id, BigDecimal::from(15000), None)
        .build()?;
    let draft = ledger.create_entry(sale).await?;
    println!(
        "  ✓ Entry #{} created as {}: Cash sale of ₹15,000",
        draft.entry_number, draft.status
    );
    let posted = ledger.post_entry(company, draft.id).await?;
    println!("  ✓ Entry #{} is now {}", posted.entry_number, posted.status);

    // Rent paid from the bank account
    let rent = EntryBuilder::new(company, date(2024, 4, 15), "April office rent")
        .kind(ledger_core::EntryKind::AutoPayment)
        .debit(&accounts["rent_expense"].id, BigDecimal::from(8000), None)
        .credit(&accounts["cash"].id, BigDecimal::from(8000), None)
        .build()?;
    ledger.create_entry(rent).await?;
    println!("  ✓ Recorded: Rent payment of ₹8,000");

    // A mistaken entry gets reversed, never edited
    let mistake = EntryBuilder::new(company, date(2024, 4, 18), "Duplicate sale entered by mistake")
        .kind(ledger_core::EntryKind::Opening)
        .debit(&accounts["accounts_receivable"].id, BigDecimal::from(5000), None)
        .credit(&accounts["sales_revenue"].id, BigDecimal::from(5000), None)
        .build()?;
    let mistake = ledger.create_entry(mistake).await?;
    let reversal = ledger
        .reverse_entry(company, mistake.id, Some(date(2024, 4, 19)))
        .await?;
    println!(
        "  ✓ Entry #{} reversed by entry #{}",
        mistake.entry_number, reversal.entry_number
    );

    // 3. Recurring entries
    println!("\n🔁 Scheduling a recurring entry...");
    ledger
        .create_template(RecurringTemplate {
            id: "internet".to_string(),
            company_id: company.to_string(),
            name: "Internet subscription".to_string(),
            frequency: Frequency::Monthly,
            next_run_date: date(2024, 4, 30),
            end_date: None,
            narration: "Monthly internet subscription".to_string(),
            lines: vec![
                JournalLine::debit(
                    accounts["utilities_expense"].id.clone(),
                    BigDecimal::from(1200),
                    None,
                ),
                JournalLine::credit(accounts["cash"].id.clone(), BigDecimal::from(1200), None),
            ],
            is_active: true,
            last_run_at: None,
        })
        .await?;

    let summary = ledger.generate_due_entries(company, date(2024, 6, 15)).await?;
    println!(
        "  ✓ Batch generated {} entries ({} failed)",
        summary.processed, summary.failed
    );

    // 4. Financial reports
    println!("\n📈 Generating Financial Reports...\n");

    let trial_balance = ledger.trial_balance(company, date(2024, 6, 30), None).await?;
    println!("🔍 Trial Balance as of June 30, 2024:");
    for row in &trial_balance.rows {
        if row.debit != BigDecimal::from(0) || row.credit != BigDecimal::from(0) {
            println!(
                "  {:<6} {:<24} Dr ₹{:>10}  Cr ₹{:>10}",
                row.account.code, row.account.name, row.debit, row.credit
            );
        }
    }
    println!("  Total Debits:  ₹{}", trial_balance.total_debits);
    println!("  Total Credits: ₹{}", trial_balance.total_credits);
    println!(
        "  Balanced: {}",
        if trial_balance.is_balanced { "✅ Yes" } else { "❌ No" }
    );

    let balance_sheet = ledger.balance_sheet(company, date(2024, 6, 30)).await?;
    println!("\n📊 Balance Sheet as of June 30, 2024:");
    for line in &balance_sheet.lines {
        let pad = "  ".repeat(line.indent as usize + 1);
        println!("{}{}: ₹{}", pad, line.label, line.amount);
    }
    println!(
        "  Balanced: {}",
        if balance_sheet.is_balanced { "✅ Yes" } else { "❌ No" }
    );

    let pnl = ledger
        .profit_and_loss(company, date(2024, 4, 1), date(2024, 6, 30))
        .await?;
    println!("\n💹 Profit & Loss for April-June 2024:");
    println!("  Total Income:   ₹{}", pnl.total_income);
    println!("  Total Expenses: ₹{}", pnl.total_expenses);
    println!("  Net Income:     ₹{}", pnl.net_income);

    let cash_flow = ledger
        .cash_flow(company, date(2024, 4, 1), date(2024, 6, 30))
        .await?;
    println!("\n💵 Cash Flow for April-June 2024:");
    println!("  Operating: ₹{}", cash_flow.operating_total);
    println!("  Investing: ₹{}", cash_flow.investing_total);
    println!("  Financing: ₹{}", cash_flow.financing_total);
    println!("  Net Increase in Cash: ₹{}", cash_flow.net_increase);
    println!(
        "  Opening ₹{} -> Closing ₹{} ({})",
        cash_flow.opening_cash,
        cash_flow.closing_cash,
        if cash_flow.reconciled { "reconciled ✅" } else { "MISMATCH ❌" }
    );

    // 5. Validate ledger integrity
    println!("\n🔍 Validating Ledger Integrity...");
    let integrity_report = ledger.validate_integrity(company, date(2024, 6, 30)).await?;
    if integrity_report.is_valid {
        println!("  ✅ Ledger integrity check passed!");
    } else {
        println!("  ❌ Ledger integrity check failed:");
        for issue in &integrity_report.issues {
            println!("    - {}", issue);
        }
    }

    println!("\n🎉 Example completed successfully!");
    Ok(())
}
