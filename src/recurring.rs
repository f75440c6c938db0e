//! Recurring entry templates and the batch scheduler that materializes them

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{Days, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::ledger::posting::{NewEntry, PostingEngine};
use crate::traits::LedgerStorage;
use crate::types::*;

/// How often a recurring template fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    /// The next run date after `from`.
    ///
    /// Monthly/quarterly/yearly preserve the day-of-month and clamp to the
    /// end of shorter months (Jan 31 -> Feb 29 in a leap year); daily and
    /// weekly are fixed intervals.
    pub fn next_after(&self, from: NaiveDate) -> LedgerResult<NaiveDate> {
        let next = match self {
            Frequency::Daily => from.checked_add_days(Days::new(1)),
            Frequency::Weekly => from.checked_add_days(Days::new(7)),
            Frequency::Monthly => from.checked_add_months(Months::new(1)),
            Frequency::Quarterly => from.checked_add_months(Months::new(3)),
            Frequency::Yearly => from.checked_add_months(Months::new(12)),
        };
        next.ok_or_else(|| {
            LedgerError::Validation(format!("Cannot advance schedule past {}", from))
        })
    }
}

/// A saved entry shape that the scheduler turns into journal entries.
///
/// Templates are never deleted automatically; they are deactivated when
/// their end date passes or the user switches them off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringTemplate {
    pub id: String,
    pub company_id: CompanyId,
    pub name: String,
    pub frequency: Frequency,
    /// The date the template next fires; entries are dated on this day
    pub next_run_date: NaiveDate,
    /// After this date the template stops firing
    pub end_date: Option<NaiveDate>,
    /// Narration copied onto generated entries
    pub narration: String,
    /// Line shapes; same as journal lines, the scheduler attaches ids
    pub lines: Vec<JournalLine>,
    pub is_active: bool,
    pub last_run_at: Option<NaiveDateTime>,
}

impl RecurringTemplate {
    /// Whether the template should fire on or before `as_of`.
    pub fn is_due(&self, as_of: NaiveDate) -> bool {
        self.is_active
            && self.next_run_date <= as_of
            && self.end_date.is_none_or(|end| as_of <= end)
    }
}

/// Per-item failure inside a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchError {
    pub template_id: String,
    pub message: String,
}

/// Outcome of a `process_due` batch: individual failures never abort the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub processed: u32,
    pub failed: u32,
    pub errors: Vec<BatchError>,
    /// Entries generated in this batch, for report-cache invalidation
    pub entry_ids: Vec<Uuid>,
}

/// Scheduler that advances template schedules and emits journal entries
/// through the posting engine.
pub struct RecurringScheduler<S: LedgerStorage> {
    storage: S,
    engine: PostingEngine<S>,
    /// Companies with a batch currently running; prevents duplicate
    /// generation from overlapping batches.
    in_flight: Arc<Mutex<HashSet<CompanyId>>>,
}

impl<S: LedgerStorage + Clone> RecurringScheduler<S> {
    pub fn new(storage: S) -> Self {
        Self {
            engine: PostingEngine::new(storage.clone()),
            storage,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Templates that should fire on or before `as_of`.
    pub async fn due_templates(
        &self,
        company_id: &str,
        as_of: NaiveDate,
    ) -> LedgerResult<Vec<RecurringTemplate>> {
        let templates = self.storage.list_templates(company_id).await?;
        Ok(templates.into_iter().filter(|t| t.is_due(as_of)).collect())
    }

    /// Generate one entry from a template and advance its schedule.
    ///
    /// The entry is dated on the template's `next_run_date`, submitted through
    /// the posting engine (recurring entries post immediately), and only then
    /// is the schedule advanced; a failed posting leaves the template due.
    pub async fn generate(
        &mut self,
        company_id: &str,
        template_id: &str,
    ) -> LedgerResult<JournalEntry> {
        let mut template = self
            .storage
            .get_template(company_id, template_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Template '{}'", template_id)))?;

        if !template.is_active {
            return Err(LedgerError::InvalidState(format!(
                "Template '{}' is deactivated",
                template_id
            )));
        }

        let entry = self
            .engine
            .create_entry(NewEntry {
                company_id: company_id.to_string(),
                entry_date: template.next_run_date,
                kind: EntryKind::Recurring,
                narration: template.narration.clone(),
                lines: template.lines.clone(),
            })
            .await?;

        template.next_run_date = template.frequency.next_after(template.next_run_date)?;
        template.last_run_at = Some(chrono::Utc::now().naive_utc());
        if template.end_date.is_some_and(|end| template.next_run_date > end) {
            template.is_active = false;
        }
        self.storage.update_template(&template).await?;

        info!(
            template_id = %template.id,
            entry_number = entry.entry_number,
            next_run = %template.next_run_date,
            "recurring entry generated"
        );
        Ok(entry)
    }

    /// Run every due template for a company, isolating per-template failures.
    ///
    /// A per-company claim rejects overlapping batches with
    /// [`LedgerError::Concurrency`] rather than generating duplicates.
    pub async fn process_due(
        &mut self,
        company_id: &str,
        as_of: NaiveDate,
    ) -> LedgerResult<BatchSummary> {
        {
            let mut claimed = self
                .in_flight
                .lock()
                .map_err(|e| LedgerError::Storage(format!("Claim lock poisoned: {}", e)))?;
            if !claimed.insert(company_id.to_string()) {
                return Err(LedgerError::Concurrency(format!(
                    "A recurring batch is already running for company '{}'",
                    company_id
                )));
            }
        }

        let result = self.run_batch(company_id, as_of).await;

        if let Ok(mut claimed) = self.in_flight.lock() {
            claimed.remove(company_id);
        }
        result
    }

    async fn run_batch(&mut self, company_id: &str, as_of: NaiveDate) -> LedgerResult<BatchSummary> {
        let due = self.due_templates(company_id, as_of).await?;
        let mut summary = BatchSummary::default();

        for template in due {
            // A single template may be due several times if batches were
            // skipped; fire it until its schedule catches up.
            loop {
                let current = match self.storage.get_template(company_id, &template.id).await? {
                    Some(t) if t.is_due(as_of) => t,
                    _ => break,
                };
                match self.generate(company_id, &current.id).await {
                    Ok(entry) => {
                        summary.processed += 1;
                        summary.entry_ids.push(entry.id);
                    }
                    Err(err) => {
                        warn!(template_id = %current.id, error = %err, "recurring generation failed");
                        summary.failed += 1;
                        summary.errors.push(BatchError {
                            template_id: current.id.clone(),
                            message: err.to_string(),
                        });
                        break;
                    }
                }
            }
        }

        info!(
            company_id,
            processed = summary.processed,
            failed = summary.failed,
            "recurring batch finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn overlapping_batch_for_a_company_is_rejected() {
        let mut scheduler = RecurringScheduler::new(MemoryStorage::new());

        // Another batch holds the claim for co1
        scheduler
            .in_flight
            .lock()
            .unwrap()
            .insert("co1".to_string());

        let err = scheduler.process_due("co1", d(2024, 5, 1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Concurrency(_)));

        // Other companies are unaffected
        assert!(scheduler.process_due("co2", d(2024, 5, 1)).await.is_ok());

        // Once the claim is released the company can run again
        scheduler.in_flight.lock().unwrap().remove("co1");
        assert!(scheduler.process_due("co1", d(2024, 5, 1)).await.is_ok());
    }

    #[test]
    fn monthly_clamps_to_end_of_month() {
        assert_eq!(
            Frequency::Monthly.next_after(d(2024, 1, 31)).unwrap(),
            d(2024, 2, 29)
        );
        assert_eq!(
            Frequency::Monthly.next_after(d(2023, 1, 31)).unwrap(),
            d(2023, 2, 28)
        );
        assert_eq!(
            Frequency::Monthly.next_after(d(2024, 3, 15)).unwrap(),
            d(2024, 4, 15)
        );
    }

    #[test]
    fn quarterly_and_yearly_preserve_day() {
        assert_eq!(
            Frequency::Quarterly.next_after(d(2024, 11, 30)).unwrap(),
            d(2025, 2, 28)
        );
        assert_eq!(
            Frequency::Yearly.next_after(d(2024, 2, 29)).unwrap(),
            d(2025, 2, 28)
        );
    }

    #[test]
    fn daily_and_weekly_are_fixed_interval() {
        assert_eq!(
            Frequency::Daily.next_after(d(2024, 2, 28)).unwrap(),
            d(2024, 2, 29)
        );
        assert_eq!(
            Frequency::Weekly.next_after(d(2024, 12, 30)).unwrap(),
            d(2025, 1, 6)
        );
    }

    #[test]
    fn due_selection_respects_activation_and_end_date() {
        let mut template = RecurringTemplate {
            id: "t1".to_string(),
            company_id: "co1".to_string(),
            name: "Rent".to_string(),
            frequency: Frequency::Monthly,
            next_run_date: d(2024, 5, 1),
            end_date: None,
            narration: "Monthly rent".to_string(),
            lines: vec![],
            is_active: true,
            last_run_at: None,
        };

        assert!(template.is_due(d(2024, 5, 1)));
        assert!(template.is_due(d(2024, 5, 15)));
        assert!(!template.is_due(d(2024, 4, 30)));

        template.end_date = Some(d(2024, 5, 10));
        assert!(template.is_due(d(2024, 5, 10)));
        assert!(!template.is_due(d(2024, 5, 11)));

        template.is_active = false;
        assert!(!template.is_due(d(2024, 5, 10)));
    }
}
