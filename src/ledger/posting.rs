//! Journal posting engine: entry validation, numbering, and the status
//! state machine

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use crate::traits::*;
use crate::types::*;

/// A request to record a journal entry.
#[derive(Debug)]
pub struct NewEntry {
    pub company_id: CompanyId,
    pub entry_date: NaiveDate,
    pub kind: EntryKind,
    pub narration: String,
    pub lines: Vec<JournalLine>,
}

/// Engine that owns every status transition of journal entries.
///
/// All mutation of entries flows through here so that the transition table
/// in [`EntryStatus`] is enforced in exactly one place.
pub struct PostingEngine<S: LedgerStorage> {
    storage: S,
    validator: Box<dyn EntryValidator>,
}

impl<S: LedgerStorage> PostingEngine<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultEntryValidator),
        }
    }

    pub fn with_validator(storage: S, validator: Box<dyn EntryValidator>) -> Self {
        Self { storage, validator }
    }

    /// Validate and record an entry.
    ///
    /// Manual entries are stored as Draft; system-generated kinds (invoice,
    /// payment, recurring, reversal, ...) commit directly to Posted. The
    /// sequential entry number is scoped to company + fiscal year; an
    /// allocation race detected at save time is retried once with a fresh
    /// number before surfacing [`LedgerError::Concurrency`].
    pub async fn create_entry(&mut self, request: NewEntry) -> LedgerResult<JournalEntry> {
        let fiscal_year = self.unlocked_fiscal_year(&request.company_id, request.entry_date).await?;

        let now = chrono::Utc::now().naive_utc();
        let mut entry = JournalEntry {
            id: Uuid::new_v4(),
            company_id: request.company_id,
            entry_number: 0,
            entry_date: request.entry_date,
            fiscal_year_id: fiscal_year.id.clone(),
            kind: request.kind,
            status: if request.kind.posts_immediately() {
                EntryStatus::Posted
            } else {
                EntryStatus::Draft
            },
            narration: request.narration,
            lines: request.lines,
            reversal_of: None,
            created_at: now,
            updated_at: now,
        };

        self.validator.validate_entry(&entry)?;
        self.check_accounts(&entry).await?;

        // Two attempts: the second runs only after a numbering race.
        for attempt in 0..2 {
            entry.entry_number = self
                .storage
                .next_entry_number(&entry.company_id, &entry.fiscal_year_id)
                .await?;
            match self.storage.save_entry(&entry).await {
                Ok(()) => break,
                Err(LedgerError::Concurrency(_)) if attempt == 0 => continue,
                Err(err) => return Err(err),
            }
        }

        info!(
            entry_id = %entry.id,
            entry_number = entry.entry_number,
            status = %entry.status,
            kind = ?entry.kind,
            "journal entry created"
        );
        Ok(entry)
    }

    /// Transition a Draft or PendingApproval entry to Posted.
    ///
    /// Balance and period lock are re-validated at commit time; the checks
    /// performed at creation may be stale by now.
    pub async fn post_entry(&mut self, company_id: &str, entry_id: Uuid) -> LedgerResult<JournalEntry> {
        let mut entry = self.get_entry_required(company_id, entry_id).await?;

        if !entry.status.can_transition(EntryStatus::Posted) {
            return Err(LedgerError::InvalidState(format!(
                "Entry #{} cannot be posted from status '{}'",
                entry.entry_number, entry.status
            )));
        }

        self.validator.validate_entry(&entry)?;
        self.check_accounts(&entry).await?;
        self.unlocked_fiscal_year(company_id, entry.entry_date).await?;

        entry.status = EntryStatus::Posted;
        entry.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_entry(&entry).await?;

        info!(entry_id = %entry.id, entry_number = entry.entry_number, "journal entry posted");
        Ok(entry)
    }

    /// Move a Draft entry into the approval queue.
    pub async fn submit_for_approval(
        &mut self,
        company_id: &str,
        entry_id: Uuid,
    ) -> LedgerResult<JournalEntry> {
        let mut entry = self.get_entry_required(company_id, entry_id).await?;
        if !entry.status.can_transition(EntryStatus::PendingApproval) {
            return Err(LedgerError::InvalidState(format!(
                "Entry #{} cannot be submitted for approval from status '{}'",
                entry.entry_number, entry.status
            )));
        }
        entry.status = EntryStatus::PendingApproval;
        entry.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_entry(&entry).await?;
        Ok(entry)
    }

    /// Reverse a posted entry by creating an additive reversal entry with
    /// every line's debit and credit swapped, then marking the original
    /// Reversed. The original's lines are never touched.
    ///
    /// `reversal_date` defaults to the original entry date and must not
    /// precede it.
    pub async fn reverse_entry(
        &mut self,
        company_id: &str,
        entry_id: Uuid,
        reversal_date: Option<NaiveDate>,
    ) -> LedgerResult<JournalEntry> {
        let mut original = self.get_entry_required(company_id, entry_id).await?;

        if !original.status.can_transition(EntryStatus::Reversed) {
            return Err(LedgerError::InvalidState(format!(
                "Entry #{} cannot be reversed from status '{}'",
                original.entry_number, original.status
            )));
        }

        let date = reversal_date.unwrap_or(original.entry_date);
        if date < original.entry_date {
            return Err(LedgerError::Validation(format!(
                "Reversal date {} precedes the original entry date {}",
                date, original.entry_date
            )));
        }
        // The original's year must be open too: its status changes here.
        self.unlocked_fiscal_year(company_id, original.entry_date).await?;

        let mut reversal = self
            .create_entry(NewEntry {
                company_id: company_id.to_string(),
                entry_date: date,
                kind: EntryKind::Reversal,
                narration: format!("Reversal of entry #{}: {}", original.entry_number, original.narration),
                lines: original.lines.iter().map(JournalLine::swapped).collect(),
            })
            .await?;
        reversal.reversal_of = Some(original.id);
        self.storage.update_entry(&reversal).await?;

        original.status = EntryStatus::Reversed;
        original.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_entry(&original).await?;

        info!(
            original = %original.id,
            reversal = %reversal.id,
            "journal entry reversed"
        );
        Ok(reversal)
    }

    /// Replace the narration/date/lines of a Draft or PendingApproval entry.
    /// Posted and Reversed entries are immutable except for their status.
    pub async fn update_entry(&mut self, entry: &JournalEntry) -> LedgerResult<JournalEntry> {
        let existing = self.get_entry_required(&entry.company_id, entry.id).await?;
        if !existing.status.is_mutable() {
            return Err(LedgerError::InvalidState(format!(
                "Entry #{} is {} and immutable; record a reversal instead",
                existing.entry_number, existing.status
            )));
        }

        // Identity and ordering fields are not caller-editable.
        let mut updated = entry.clone();
        updated.entry_number = existing.entry_number;
        updated.status = existing.status;
        updated.kind = existing.kind;
        updated.updated_at = chrono::Utc::now().naive_utc();

        self.validator.validate_entry(&updated)?;
        self.check_accounts(&updated).await?;
        let fiscal_year = self
            .unlocked_fiscal_year(&updated.company_id, updated.entry_date)
            .await?;
        if fiscal_year.id != existing.fiscal_year_id {
            // Entry numbers are scoped to the fiscal year; a date moved
            // across years takes a fresh number in the target year.
            updated.entry_number = self
                .storage
                .next_entry_number(&updated.company_id, &fiscal_year.id)
                .await?;
        }
        updated.fiscal_year_id = fiscal_year.id;

        self.storage.update_entry(&updated).await?;
        Ok(updated)
    }

    pub async fn get_entry(
        &self,
        company_id: &str,
        entry_id: Uuid,
    ) -> LedgerResult<Option<JournalEntry>> {
        self.storage.get_entry(company_id, entry_id).await
    }

    pub async fn get_entry_required(
        &self,
        company_id: &str,
        entry_id: Uuid,
    ) -> LedgerResult<JournalEntry> {
        self.storage
            .get_entry(company_id, entry_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Entry '{}'", entry_id)))
    }

    pub async fn list_entries(
        &self,
        company_id: &str,
        filter: &EntryFilter,
    ) -> LedgerResult<Vec<JournalEntry>> {
        self.storage.list_entries(company_id, filter).await
    }

    /// Every line must reference an existing, active, non-group account of
    /// the entry's company.
    async fn check_accounts(&self, entry: &JournalEntry) -> LedgerResult<()> {
        for line in &entry.lines {
            let account = self
                .storage
                .get_account(&entry.company_id, &line.account_id)
                .await?
                .ok_or_else(|| LedgerError::NotFound(format!("Account '{}'", line.account_id)))?;
            if account.is_group {
                return Err(LedgerError::Validation(format!(
                    "Account '{}' is a group account and cannot receive postings",
                    account.code
                )));
            }
            if !account.is_active {
                return Err(LedgerError::Validation(format!(
                    "Account '{}' is deactivated",
                    account.code
                )));
            }
        }
        Ok(())
    }

    async fn unlocked_fiscal_year(
        &self,
        company_id: &str,
        date: NaiveDate,
    ) -> LedgerResult<FiscalYear> {
        let fiscal_year = self
            .storage
            .fiscal_year_for_date(company_id, date)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("No fiscal year covers {}", date)))?;
        if fiscal_year.is_locked {
            return Err(LedgerError::LockedPeriod(format!(
                "Fiscal year '{}' ({} to {}) is locked",
                fiscal_year.id, fiscal_year.start_date, fiscal_year.end_date
            )));
        }
        Ok(fiscal_year)
    }
}

/// Builder for assembling entry requests line by line.
#[derive(Debug)]
pub struct EntryBuilder {
    company_id: CompanyId,
    entry_date: NaiveDate,
    kind: EntryKind,
    narration: String,
    lines: Vec<JournalLine>,
}

impl EntryBuilder {
    pub fn new(company_id: &str, entry_date: NaiveDate, narration: &str) -> Self {
        Self {
            company_id: company_id.to_string(),
            entry_date,
            kind: EntryKind::Manual,
            narration: narration.to_string(),
            lines: Vec::new(),
        }
    }

    pub fn kind(mut self, kind: EntryKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn debit(mut self, account_id: &str, amount: BigDecimal, description: Option<String>) -> Self {
        self.lines
            .push(JournalLine::debit(account_id.to_string(), amount, description));
        self
    }

    pub fn credit(mut self, account_id: &str, amount: BigDecimal, description: Option<String>) -> Self {
        self.lines
            .push(JournalLine::credit(account_id.to_string(), amount, description));
        self
    }

    pub fn line(mut self, line: JournalLine) -> Self {
        self.lines.push(line);
        self
    }

    /// Check the request shape eagerly so callers fail before hitting storage.
    pub fn build(self) -> LedgerResult<NewEntry> {
        if self.lines.len() < 2 {
            return Err(LedgerError::Validation(
                "Entry must have at least two lines for double-entry bookkeeping".to_string(),
            ));
        }
        let debits: BigDecimal = self.lines.iter().map(|l| &l.debit).sum();
        let credits: BigDecimal = self.lines.iter().map(|l| &l.credit).sum();
        if (debits.clone() - credits.clone()).abs() > balance_epsilon() {
            return Err(LedgerError::Validation(format!(
                "Entry is not balanced: debits = {}, credits = {}",
                debits, credits
            )));
        }
        Ok(NewEntry {
            company_id: self.company_id,
            entry_date: self.entry_date,
            kind: self.kind,
            narration: self.narration,
            lines: self.lines,
        })
    }
}

/// Entry shapes for the invoice/bill/payment flows that feed the ledger.
pub mod patterns {
    use super::*;
    use crate::tax::gst::GstSplit;
    use crate::tax::tds::TdsComputation;

    /// Parameters for an entry generated from a sales invoice with GST.
    pub struct InvoiceEntryParams<'a> {
        pub company_id: &'a str,
        pub entry_date: NaiveDate,
        pub narration: &'a str,
        pub receivable_account_id: &'a str,
        pub revenue_account_id: &'a str,
        pub gst_payable_account_id: &'a str,
        pub taxable_amount: BigDecimal,
        pub gst: GstSplit,
    }

    /// Debit receivables for the gross amount; credit revenue for the taxable
    /// amount and GST payable per component of the split.
    pub fn invoice_entry(params: InvoiceEntryParams<'_>) -> LedgerResult<NewEntry> {
        let gross = &params.taxable_amount + params.gst.total();
        let mut builder = EntryBuilder::new(params.company_id, params.entry_date, params.narration)
            .kind(EntryKind::AutoInvoice)
            .debit(
                params.receivable_account_id,
                gross,
                Some("Invoice gross including GST".to_string()),
            )
            .credit(
                params.revenue_account_id,
                params.taxable_amount.clone(),
                Some("Taxable value".to_string()),
            );

        let zero = BigDecimal::from(0);
        for (label, amount) in [
            ("IGST payable", &params.gst.igst),
            ("CGST payable", &params.gst.cgst),
            ("SGST payable", &params.gst.sgst),
        ] {
            if *amount > zero {
                builder = builder.credit(
                    params.gst_payable_account_id,
                    amount.clone(),
                    Some(label.to_string()),
                );
            }
        }
        builder.build()
    }

    /// Parameters for an entry generated from a purchase bill with TDS
    /// withheld at source.
    pub struct BillEntryParams<'a> {
        pub company_id: &'a str,
        pub entry_date: NaiveDate,
        pub narration: &'a str,
        pub expense_account_id: &'a str,
        pub payable_account_id: &'a str,
        pub tds_payable_account_id: &'a str,
        pub tds: TdsComputation,
    }

    /// Debit the expense for the full bill amount; credit TDS payable for the
    /// withheld portion (when applicable) and the vendor for the net.
    pub fn bill_entry_with_tds(params: BillEntryParams<'_>) -> LedgerResult<NewEntry> {
        let mut builder = EntryBuilder::new(params.company_id, params.entry_date, params.narration)
            .kind(EntryKind::AutoExpense)
            .debit(
                params.expense_account_id,
                params.tds.gross_amount.clone(),
                Some("Bill amount".to_string()),
            );

        if params.tds.is_applicable {
            builder = builder.credit(
                params.tds_payable_account_id,
                params.tds.tds_amount.clone(),
                Some("TDS withheld at source".to_string()),
            );
        }
        builder
            .credit(
                params.payable_account_id,
                params.tds.net_payable.clone(),
                Some("Net payable to vendor".to_string()),
            )
            .build()
    }

    /// A simple cash expense payment (debit expense, credit cash/bank).
    pub fn expense_payment(
        company_id: &str,
        entry_date: NaiveDate,
        narration: &str,
        expense_account_id: &str,
        cash_account_id: &str,
        amount: BigDecimal,
    ) -> LedgerResult<NewEntry> {
        EntryBuilder::new(company_id, entry_date, narration)
            .kind(EntryKind::AutoPayment)
            .debit(expense_account_id, amount.clone(), None)
            .credit(cash_account_id, amount, None)
            .build()
    }
}
