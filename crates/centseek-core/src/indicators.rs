use crate::schema::{BillPaymentRatio, RawCustomerInput, SecondaryIndicators};
use crate::util::mean;

/// Model-free descriptive statistics over the raw statement history.
///
/// Callers validate `raw` first; on unvalidated input the arithmetic still
/// cannot fault, it just reports whatever the numbers give.
pub fn compute(raw: &RawCustomerInput) -> SecondaryIndicators {
    let avg_bill = mean(&raw.bill_amounts);
    let avg_payment = mean(&raw.payment_amounts);

    let bill_to_payment_ratio = if avg_payment > 0.0 {
        BillPaymentRatio::Finite(avg_bill / avg_payment)
    } else {
        BillPaymentRatio::NoPayments
    };

    let max_delay = raw.delays.iter().copied().max().unwrap_or(0);
    let delayed_months = raw.delays.iter().filter(|d| **d > 0).count() as u32;

    let utilization = if raw.credit_limit > 0.0 {
        avg_bill / raw.credit_limit
    } else {
        0.0
    };

    SecondaryIndicators {
        avg_bill,
        avg_payment,
        max_delay,
        bill_to_payment_ratio,
        delayed_months,
        utilization,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_history() {
        let raw = RawCustomerInput {
            credit_limit: 5000.0,
            delays: [0; 7],
            bill_amounts: [200.0; 6],
            payment_amounts: [200.0; 6],
        };
        let s = compute(&raw);
        assert_eq!(s.avg_bill, 200.0);
        assert_eq!(s.avg_payment, 200.0);
        assert_eq!(s.bill_to_payment_ratio, BillPaymentRatio::Finite(1.0));
        assert_eq!(s.max_delay, 0);
        assert_eq!(s.delayed_months, 0);
        assert!((s.utilization - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_zero_payments_give_sentinel() {
        let raw = RawCustomerInput {
            credit_limit: 1000.0,
            delays: [9, 9, 9, 9, 9, 9, 9],
            bill_amounts: [900.0; 6],
            payment_amounts: [0.0; 6],
        };
        let s = compute(&raw);
        assert_eq!(s.bill_to_payment_ratio, BillPaymentRatio::NoPayments);
        assert!(!s.bill_to_payment_ratio.is_defined());
        assert_eq!(s.bill_to_payment_ratio.as_f64(), f64::INFINITY);
        assert_eq!(s.max_delay, 9);
        assert_eq!(s.delayed_months, 7);
    }

    #[test]
    fn test_mixed_history() {
        let raw = RawCustomerInput {
            credit_limit: 2000.0,
            delays: [2, 0, 1, 0, 0, 0, 0],
            bill_amounts: [600.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            payment_amounts: [0.0, 0.0, 0.0, 0.0, 0.0, 60.0],
        };
        let s = compute(&raw);
        assert_eq!(s.bill_to_payment_ratio, BillPaymentRatio::Finite(10.0));
        assert_eq!(s.max_delay, 2);
        assert_eq!(s.delayed_months, 2);
    }
}
