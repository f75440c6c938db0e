//! Ledger module: chart-of-accounts registry, posting engine, and the
//! orchestrating facade

pub mod core;
pub mod posting;
pub mod registry;

pub use self::core::*;
pub use self::posting::*;
pub use self::registry::*;
