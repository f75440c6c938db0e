//! Balance aggregation, statement derivation, and the report-run cache

pub mod balances;
pub mod cache;
pub mod statements;

pub use balances::*;
pub use cache::*;
pub use statements::*;
