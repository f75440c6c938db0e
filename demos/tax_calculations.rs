//! GST and TDS calculation examples with auto-generated journal entries

use ledger_core::utils::MemoryStorage;
use ledger_core::{patterns, FiscalYear, GstBreakup, Ledger, TdsSection};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🧾 Ledger Core - Tax Calculation Examples\n");

    // 1. GST splits
    println!("💰 GST Breakups:\n");

    let intra = GstBreakup::calculate(BigDecimal::from(10000), BigDecimal::from(18), false)?;
    println!("Intra-state sale of ₹{} at {}%:", intra.taxable_amount, intra.rate);
    println!("  CGST: ₹{}", intra.split.cgst);
    println!("  SGST: ₹{}", intra.split.sgst);
    println!("  Total GST: ₹{}", intra.total_tax);
    println!("  Invoice total: ₹{}\n", intra.gross_amount);

    let inter = GstBreakup::calculate(BigDecimal::from(10000), BigDecimal::from(18), true)?;
    println!("Inter-state sale of ₹{} at {}%:", inter.taxable_amount, inter.rate);
    println!("  IGST: ₹{}", inter.split.igst);
    println!("  Invoice total: ₹{}\n", inter.gross_amount);

    // Working backwards from a tax-inclusive price
    let from_gross = GstBreakup::from_gross(BigDecimal::from(1180), BigDecimal::from(18), false)?;
    println!(
        "₹{} inclusive of 18% GST breaks into ₹{} + ₹{} tax\n",
        from_gross.gross_amount, from_gross.taxable_amount, from_gross.total_tax
    );

    // 2. TDS withholding by section
    println!("✂️  TDS Withholding:\n");
    for (section, label, amount) in [
        (TdsSection::Contractor, "Contractor payment (194C)", 50000),
        (TdsSection::ProfessionalFees, "Audit fees (194J)", 30000),
        (TdsSection::ProfessionalFees, "Small consultation (194J)", 25000),
        (TdsSection::Rent, "Office rent (194I)", 50000),
        (TdsSection::Commission, "Sales commission (194H)", 20000),
    ] {
        let tds = section.compute(BigDecimal::from(amount))?;
        if tds.is_applicable {
            println!(
                "  {}: gross ₹{}, TDS ₹{} @ {}%, net payable ₹{}",
                label, tds.gross_amount, tds.tds_amount, tds.rate, tds.net_payable
            );
        } else {
            println!(
                "  {}: gross ₹{} is below the ₹{} threshold, no TDS",
                label, tds.gross_amount, tds.threshold
            );
        }
    }

    // 3. Tax-aware entries flowing into the ledger
    println!("\n📒 Posting tax entries to a ledger...\n");
    let mut ledger = Ledger::new(MemoryStorage::new());
    let company = "demo-co";
    ledger
        .create_fiscal_year(FiscalYear {
            id: "fy2024".to_string(),
            company_id: company.to_string(),
            start_date: date(2024, 4, 1),
            end_date: date(2025, 3, 31),
            is_locked: false,
        })
        .await?;
    let accounts = ledger.setup_standard_chart(company).await?;

    // Sales invoice: receivable gross, revenue net, GST payable split out
    let invoice = patterns::invoice_entry(patterns::InvoiceEntryParams {
        company_id: company,
        entry_date: date(2024, 4, 10),
        narration: "Invoice INV-001 to Acme Traders",
        receivable_account_id: &accounts["accounts_receivable"].id,
        revenue_account_id: &accounts["sales_revenue"].id,
        gst_payable_account_id: &accounts["gst_payable"].id,
        taxable_amount: BigDecimal::from(10000),
        gst: intra.split.clone(),
    })?;
    let entry = ledger.create_entry(invoice).await?;
    println!(
        "  ✓ Entry #{}: invoice for ₹{} posted with {} lines",
        entry.entry_number,
        entry.total_debits(),
        entry.lines.len()
    );

    // Purchase bill with TDS withheld from the vendor
    let tds = TdsSection::ProfessionalFees.compute(BigDecimal::from(30000))?;
    let bill = patterns::bill_entry_with_tds(patterns::BillEntryParams {
        company_id: company,
        entry_date: date(2024, 4, 12),
        narration: "Annual audit fees - Sharma & Associates",
        expense_account_id: &accounts["professional_fees"].id,
        payable_account_id: &accounts["accounts_payable"].id,
        tds_payable_account_id: &accounts["tds_payable"].id,
        tds,
    })?;
    let entry = ledger.create_entry(bill).await?;
    println!(
        "  ✓ Entry #{}: bill of ₹{} posted, TDS withheld",
        entry.entry_number,
        entry.total_debits()
    );

    let gst_payable = ledger
        .account_balance(company, &accounts["gst_payable"].id, date(2024, 4, 30))
        .await?;
    let tds_payable = ledger
        .account_balance(company, &accounts["tds_payable"].id, date(2024, 4, 30))
        .await?;
    println!("\n  GST payable balance: ₹{}", gst_payable);
    println!("  TDS payable balance: ₹{}", tds_payable);

    let trial_balance = ledger.trial_balance(company, date(2024, 4, 30), None).await?;
    println!(
        "  Trial balance: ₹{} / ₹{} ({})",
        trial_balance.total_debits,
        trial_balance.total_credits,
        if trial_balance.is_balanced { "balanced ✅" } else { "MISMATCH ❌" }
    );

    println!("\n🎉 Example completed successfully!");
    Ok(())
}
