//! # Ledger Core
//!
//! A double-entry ledger and financial reporting engine with journal entry
//! lifecycle management, recurring entries, and Indian GST/TDS support.
//!
//! ## Features
//!
//! - **Double-entry bookkeeping**: Balanced journal entries with a strict
//!   Draft -> PendingApproval -> Posted -> Reversed lifecycle
//! - **Chart of accounts**: Hierarchical accounts across Assets, Liabilities,
//!   Equity, Income, and Expense with group/ledger separation
//! - **Financial reporting**: Trial balance, balance sheet, profit & loss,
//!   and indirect-method cash flow, all derived from posted lines
//! - **Recurring entries**: Template scheduler with end-of-month clamping
//!   and catch-up batch generation
//! - **Tax calculations**: GST splits (CGST/SGST/IGST) and TDS withholding
//!   by statutory section
//! - **Storage abstraction**: Database-agnostic design with trait-based storage
//!
//! ## Quick Start
//!
//! ```rust
//! use ledger_core::{EntryBuilder, Ledger, MemoryStorage};
//! use bigdecimal::BigDecimal;
//! use chrono::NaiveDate;
//!
//! // let mut ledger = Ledger::new(MemoryStorage::new());
//! // ... create a fiscal year and accounts, then post entries:
//! // let request = EntryBuilder::new("co1", date, "Opening sale")
//! //     .debit("1001", BigDecimal::from(1000), None)
//! //     .credit("4000", BigDecimal::from(1000), None)
//! //     .build()?;
//! // let entry = ledger.create_entry(request).await?;
//! # Ok::<(), ledger_core::LedgerError>(())
//! ```

pub mod ledger;
pub mod recurring;
pub mod reporting;
pub mod tax;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use ledger::*;
pub use recurring::*;
pub use reporting::*;
pub use tax::*;
pub use traits::*;
pub use types::*;
pub use utils::memory_storage::MemoryStorage;

// Re-export entry patterns for convenience
pub use ledger::posting::patterns;
