//! Installment planning (échéancier) and early-payment discount rules.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kontor_core::{DomainError, DomainResult, Money, Rounding};

/// Settlement state of one installment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    Pending,
    Paid,
    Overdue,
}

/// One scheduled due date for partial settlement of an invoice.
///
/// Installments live and die with their invoice and are addressed by
/// `sequence_no`, never referenced independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    /// 1-based position in the schedule.
    pub sequence_no: u32,
    pub due_date: NaiveDate,
    pub amount: Money,
    /// Early-payment (escompte) rate, e.g. 0.02 for 2%. None disables the
    /// discount for this installment.
    pub discount_rate: Option<Decimal>,
    pub status: InstallmentStatus,
}

impl Installment {
    /// An escompte applies iff a rate is configured and the payment lands on
    /// or before `due_date - grace_days`.
    pub fn is_discount_eligible(&self, payment_date: NaiveDate, grace_days: u32) -> bool {
        if self.discount_rate.is_none() {
            return false;
        }
        match self.due_date.checked_sub_days(Days::new(u64::from(grace_days))) {
            Some(cutoff) => payment_date <= cutoff,
            None => false,
        }
    }

    /// Discount amount, rounded half-up to the currency's minor unit
    /// (or whatever rule the caller injected).
    pub fn discount_amount(&self, rounding: Rounding) -> DomainResult<Money> {
        match self.discount_rate {
            Some(rate) => self.amount.apply_rate(rate, rounding),
            None => Ok(Money::ZERO),
        }
    }
}

/// A planned schedule. Immutable once any installment has a recorded payment
/// (enforced by the invoice aggregate via `ScheduleLocked`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentSchedule {
    /// Escompte grace period in days before each due date.
    pub grace_days: u32,
    pub installments: Vec<Installment>,
}

impl InstallmentSchedule {
    pub fn installment(&self, sequence_no: u32) -> Option<&Installment> {
        self.installments
            .iter()
            .find(|i| i.sequence_no == sequence_no)
    }

    pub fn has_settled_installment(&self) -> bool {
        self.installments
            .iter()
            .any(|i| i.status == InstallmentStatus::Paid)
    }
}

/// Split `total` into `count` dated installments of equal minor-unit shares.
///
/// Integer-cent division; the non-divisible remainder is added to the last
/// installment so the schedule sums exactly to `total`.
pub fn plan_installments(
    total: Money,
    count: u32,
    first_due_date: NaiveDate,
    interval_days: u32,
    discount_rate: Option<Decimal>,
    rounding: Rounding,
) -> DomainResult<Vec<Installment>> {
    if count == 0 {
        return Err(DomainError::validation(
            "installment count must be at least 1",
        ));
    }
    if count > 1 && interval_days == 0 {
        return Err(DomainError::validation(
            "interval_days must be at least 1 for multi-installment schedules",
        ));
    }
    if !total.is_positive() {
        return Err(DomainError::validation(
            "cannot plan installments for a non-positive total",
        ));
    }
    if let Some(rate) = discount_rate {
        if rate <= Decimal::ZERO || rate >= Decimal::ONE {
            return Err(DomainError::validation(
                "discount rate must be strictly between 0 and 1",
            ));
        }
    }

    let shares = total.split_even(count, rounding)?;

    let mut installments = Vec::with_capacity(count as usize);
    for (idx, amount) in shares.into_iter().enumerate() {
        let offset = Days::new(u64::from(interval_days) * idx as u64);
        let due_date = first_due_date
            .checked_add_days(offset)
            .ok_or_else(|| DomainError::validation("installment due date out of range"))?;
        installments.push(Installment {
            sequence_no: idx as u32 + 1,
            due_date,
            amount,
            discount_rate,
            status: InstallmentStatus::Pending,
        });
    }
    Ok(installments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn eur() -> Rounding {
        Rounding::default()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn thousand_over_three_has_no_rounding_drift() {
        let total = Money::from_minor_units(100_000, 2); // 1000.00
        let plan = plan_installments(total, 3, d(2025, 4, 1), 30, None, eur()).unwrap();

        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0].amount, Money::from_minor_units(33_333, 2));
        assert_eq!(plan[1].amount, Money::from_minor_units(33_333, 2));
        assert_eq!(plan[2].amount, Money::from_minor_units(33_334, 2));

        assert_eq!(plan[0].due_date, d(2025, 4, 1));
        assert_eq!(plan[1].due_date, d(2025, 5, 1));
        assert_eq!(plan[2].due_date, d(2025, 5, 31));
    }

    #[test]
    fn discount_eligibility_honors_grace_period() {
        let inst = Installment {
            sequence_no: 1,
            due_date: d(2025, 4, 30),
            amount: Money::from_minor_units(50_000, 2),
            discount_rate: Some(Decimal::new(2, 2)), // 2%
            status: InstallmentStatus::Pending,
        };

        // grace of 10 days: cutoff is April 20
        assert!(inst.is_discount_eligible(d(2025, 4, 20), 10));
        assert!(!inst.is_discount_eligible(d(2025, 4, 21), 10));
        // no grace: due date itself is still eligible
        assert!(inst.is_discount_eligible(d(2025, 4, 30), 0));
        assert!(!inst.is_discount_eligible(d(2025, 5, 1), 0));
    }

    #[test]
    fn no_rate_means_never_eligible() {
        let inst = Installment {
            sequence_no: 1,
            due_date: d(2025, 4, 30),
            amount: Money::from_minor_units(50_000, 2),
            discount_rate: None,
            status: InstallmentStatus::Pending,
        };
        assert!(!inst.is_discount_eligible(d(2025, 1, 1), 0));
        assert_eq!(inst.discount_amount(eur()).unwrap(), Money::ZERO);
    }

    #[test]
    fn discount_amount_rounds_half_up() {
        let inst = Installment {
            sequence_no: 1,
            due_date: d(2025, 4, 30),
            amount: Money::from_minor_units(33_333, 2), // 333.33
            discount_rate: Some(Decimal::new(15, 3)),   // 1.5% -> 4.99995
            status: InstallmentStatus::Pending,
        };
        assert_eq!(
            inst.discount_amount(eur()).unwrap(),
            Money::from_minor_units(500, 2)
        );
    }

    #[test]
    fn invalid_plans_are_rejected() {
        let total = Money::from_minor_units(100_000, 2);
        assert!(plan_installments(total, 0, d(2025, 4, 1), 30, None, eur()).is_err());
        assert!(plan_installments(total, 2, d(2025, 4, 1), 0, None, eur()).is_err());
        assert!(plan_installments(Money::ZERO, 2, d(2025, 4, 1), 30, None, eur()).is_err());
        assert!(
            plan_installments(total, 2, d(2025, 4, 1), 30, Some(Decimal::ONE), eur()).is_err()
        );
    }

    proptest! {
        /// Invariant: sum(installment.amount) == invoice.total, always.
        #[test]
        fn schedule_always_sums_to_total(
            minor in 1i64..50_000_000i64,
            count in 1u32..36u32,
            interval in 1u32..90u32,
        ) {
            let total = Money::from_minor_units(minor, 2);
            let plan = plan_installments(total, count, d(2025, 1, 15), interval, None, eur()).unwrap();

            let mut sum = Money::ZERO;
            for inst in &plan {
                sum = sum.checked_add(inst.amount).unwrap();
            }
            prop_assert_eq!(sum, total);

            // due dates strictly increase for multi-installment schedules
            for pair in plan.windows(2) {
                prop_assert!(pair[0].due_date < pair[1].due_date);
            }
        }
    }
}
