//! GST (Goods and Services Tax) split computation for Indian tax compliance

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::types::{LedgerError, LedgerResult};

/// The CGST/SGST/IGST components of a GST charge.
///
/// Inter-state supplies charge the full rate as IGST; intra-state supplies
/// split the rate evenly between CGST (central) and SGST (state).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GstSplit {
    pub igst: BigDecimal,
    pub cgst: BigDecimal,
    pub sgst: BigDecimal,
}

impl GstSplit {
    /// Total GST across all components.
    pub fn total(&self) -> BigDecimal {
        &self.igst + &self.cgst + &self.sgst
    }
}

/// Split a GST charge on `taxable_amount` at `rate` percent.
///
/// `split_gst(10000, 18, true)` yields IGST 1800;
/// `split_gst(10000, 18, false)` yields CGST 900 + SGST 900.
pub fn split_gst(taxable_amount: &BigDecimal, rate: &BigDecimal, inter_state: bool) -> GstSplit {
    let zero = BigDecimal::from(0);
    let total = (taxable_amount * rate) / BigDecimal::from(100);
    if inter_state {
        GstSplit {
            igst: total,
            cgst: zero.clone(),
            sgst: zero,
        }
    } else {
        let half = &total / BigDecimal::from(2);
        GstSplit {
            igst: zero,
            cgst: half.clone(),
            sgst: half,
        }
    }
}

/// Full GST breakup of an invoice amount: taxable value, component split,
/// and gross total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GstBreakup {
    /// Base amount before GST
    pub taxable_amount: BigDecimal,
    /// Total GST rate percentage (e.g. 18 for 18%)
    pub rate: BigDecimal,
    /// Component split
    pub split: GstSplit,
    /// Total GST amount
    pub total_tax: BigDecimal,
    /// Taxable amount plus GST
    pub gross_amount: BigDecimal,
}

impl GstBreakup {
    /// Compute the breakup from a taxable (tax-exclusive) amount.
    pub fn calculate(
        taxable_amount: BigDecimal,
        rate: BigDecimal,
        inter_state: bool,
    ) -> LedgerResult<Self> {
        let zero = BigDecimal::from(0);
        if taxable_amount < zero {
            return Err(LedgerError::Validation(format!(
                "GST taxable amount cannot be negative: {}",
                taxable_amount
            )));
        }
        if rate < zero {
            return Err(LedgerError::Validation(format!(
                "GST rate cannot be negative: {}",
                rate
            )));
        }
        let split = split_gst(&taxable_amount, &rate, inter_state);
        let total_tax = split.total();
        let gross_amount = &taxable_amount + &total_tax;
        Ok(Self {
            taxable_amount,
            rate,
            split,
            total_tax,
            gross_amount,
        })
    }

    /// Compute the breakup from a gross (tax-inclusive) amount.
    pub fn from_gross(
        gross_amount: BigDecimal,
        rate: BigDecimal,
        inter_state: bool,
    ) -> LedgerResult<Self> {
        let zero = BigDecimal::from(0);
        if rate < zero {
            return Err(LedgerError::Validation(format!(
                "GST rate cannot be negative: {}",
                rate
            )));
        }
        let divisor = BigDecimal::from(100) + &rate;
        let taxable = (&gross_amount * BigDecimal::from(100)) / divisor;
        Self::calculate(taxable, rate, inter_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(v: i64) -> BigDecimal {
        BigDecimal::from(v)
    }

    #[test]
    fn inter_state_charges_full_rate_as_igst() {
        let split = split_gst(&dec(10000), &dec(18), true);
        assert_eq!(split.igst, dec(1800));
        assert_eq!(split.cgst, dec(0));
        assert_eq!(split.sgst, dec(0));
        assert_eq!(split.total(), dec(1800));
    }

    #[test]
    fn intra_state_splits_evenly_between_cgst_and_sgst() {
        let split = split_gst(&dec(10000), &dec(18), false);
        assert_eq!(split.igst, dec(0));
        assert_eq!(split.cgst, dec(900));
        assert_eq!(split.sgst, dec(900));
        assert_eq!(split.total(), dec(1800));
    }

    #[test]
    fn breakup_totals() {
        let breakup = GstBreakup::calculate(dec(1000), dec(18), false).unwrap();
        assert_eq!(breakup.total_tax, dec(180));
        assert_eq!(breakup.gross_amount, dec(1180));
        assert_eq!(breakup.split.cgst, dec(90));
    }

    #[test]
    fn reverse_breakup_recovers_taxable_amount() {
        let breakup = GstBreakup::from_gross(dec(1180), dec(18), false).unwrap();
        assert_eq!(breakup.taxable_amount, dec(1000));
        assert_eq!(breakup.total_tax, dec(180));
    }

    #[test]
    fn negative_inputs_are_rejected() {
        assert!(GstBreakup::calculate(dec(-1), dec(18), false).is_err());
        assert!(GstBreakup::calculate(dec(100), dec(-5), false).is_err());
    }
}
