//! Pure tax computations used when building auto-generated entries.
//!
//! Nothing in here touches ledger state; the posting engine calls these
//! functions when invoice/bill flows request entries with tax lines.

pub mod gst;
pub mod tds;

pub use gst::{split_gst, GstBreakup, GstSplit};
pub use tds::{compute_tds, TdsComputation, TdsSection};
