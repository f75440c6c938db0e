//! TDS (tax deducted at source) computation: threshold-based withholding

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::types::{LedgerError, LedgerResult};

/// Result of a TDS computation on a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TdsComputation {
    /// The payment amount before withholding
    pub gross_amount: BigDecimal,
    /// Rate applied, percent
    pub rate: BigDecimal,
    /// Threshold below which no tax is withheld
    pub threshold: BigDecimal,
    /// Amount withheld; zero when not applicable
    pub tds_amount: BigDecimal,
    /// Amount payable to the vendor after withholding
    pub net_payable: BigDecimal,
    /// Whether the payment crossed the threshold
    pub is_applicable: bool,
}

/// Compute withholding on a payment.
///
/// TDS applies only when `amount >= threshold`; below it the full amount is
/// payable. `compute_tds(30000, 10, 30000)` withholds 3000 leaving 27000
/// payable; `compute_tds(25000, 10, 30000)` withholds nothing.
pub fn compute_tds(
    amount: BigDecimal,
    rate: BigDecimal,
    threshold: BigDecimal,
) -> LedgerResult<TdsComputation> {
    let zero = BigDecimal::from(0);
    if amount < zero {
        return Err(LedgerError::Validation(format!(
            "TDS payment amount cannot be negative: {}",
            amount
        )));
    }
    if rate < zero {
        return Err(LedgerError::Validation(format!(
            "TDS rate cannot be negative: {}",
            rate
        )));
    }
    if threshold < zero {
        return Err(LedgerError::Validation(format!(
            "TDS threshold cannot be negative: {}",
            threshold
        )));
    }
    let is_applicable = amount >= threshold;
    let tds_amount = if is_applicable {
        (&amount * &rate) / BigDecimal::from(100)
    } else {
        BigDecimal::from(0)
    };
    let net_payable = &amount - &tds_amount;
    Ok(TdsComputation {
        gross_amount: amount,
        rate,
        threshold,
        tds_amount,
        net_payable,
        is_applicable,
    })
}

/// Withholding sections of the Income Tax Act for common payment categories.
///
/// The caller picks the section from the payment's nature; this module only
/// supplies the default rate and per-payment threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TdsSection {
    /// 194C - payments to contractors
    Contractor,
    /// 194J - fees for professional or technical services
    ProfessionalFees,
    /// 194I - rent
    Rent,
    /// 194H - commission or brokerage
    Commission,
}

impl TdsSection {
    /// Default withholding rate, percent.
    pub fn rate(&self) -> BigDecimal {
        match self {
            TdsSection::Contractor => BigDecimal::from(2),
            TdsSection::ProfessionalFees => BigDecimal::from(10),
            TdsSection::Rent => BigDecimal::from(10),
            TdsSection::Commission => BigDecimal::from(5),
        }
    }

    /// Per-payment threshold below which nothing is withheld.
    pub fn threshold(&self) -> BigDecimal {
        match self {
            TdsSection::Contractor => BigDecimal::from(30000),
            TdsSection::ProfessionalFees => BigDecimal::from(30000),
            TdsSection::Rent => BigDecimal::from(240000),
            TdsSection::Commission => BigDecimal::from(15000),
        }
    }

    /// Compute withholding for a payment under this section.
    pub fn compute(&self, amount: BigDecimal) -> LedgerResult<TdsComputation> {
        compute_tds(amount, self.rate(), self.threshold())
    }
}
