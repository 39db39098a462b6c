//! # Reconciliation Rules
//!
//! Cash deposits against a closed session report.
//!
//! The operator always enters the new *cumulative* amount handed in, never
//! an increment. Re-submitting the same figure therefore changes nothing.
//!
//! ## Decision Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  new = proposed cumulative cash, cash = already submitted               │
//! │                                                                         │
//! │  new > total                         → InvalidDeposit                   │
//! │  settled && new ≤ total              → Unchanged                        │
//! │  new < cash                          → InvalidDeposit                   │
//! │  new == cash                         → Unchanged                        │
//! │  otherwise                           → Applied                          │
//! │      remaining ≤ 0 for the first time → settled_at = now               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::SessionReport;

/// What a deposit did to a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositOutcome {
    /// `cash_submitted` moved forward.
    Applied {
        /// True when this deposit settled the report.
        newly_settled: bool,
    },
    /// The report was left exactly as it was.
    Unchanged,
}

impl DepositOutcome {
    #[inline]
    pub fn is_applied(&self) -> bool {
        matches!(self, DepositOutcome::Applied { .. })
    }
}

/// Applies a cumulative deposit to `report`.
///
/// ## Arguments
/// * `report` - The report to update in place
/// * `new_total` - New cumulative cash handed in
/// * `now` - Settlement timestamp, used only if this deposit settles the report
///
/// ## Returns
/// * `Ok(DepositOutcome::Applied)` - `cash_submitted` was raised to `new_total`
/// * `Ok(DepositOutcome::Unchanged)` - Nothing to do
/// * `Err(CoreError::InvalidDeposit)` - `new_total` is outside `[cash_submitted, total_amount]`
///
/// ## Example
/// ```rust
/// use chrono::Utc;
/// use shopfloor_core::reconciliation::{apply_deposit, DepositOutcome};
/// use shopfloor_core::{Money, Session, SessionReport, SoldLine};
///
/// let lines = vec![SoldLine::new("p", "Pod", 1, Money::from_cents(2500))];
/// let mut report = SessionReport::from_session(Session::start("s", "Sam", "t"), lines, Utc::now());
///
/// let outcome = apply_deposit(&mut report, Money::from_cents(2500), Utc::now()).unwrap();
/// assert_eq!(outcome, DepositOutcome::Applied { newly_settled: true });
/// assert!(report.is_settled());
/// ```
pub fn apply_deposit(
    report: &mut SessionReport,
    new_total: Money,
    now: DateTime<Utc>,
) -> CoreResult<DepositOutcome> {
    if new_total > report.total_amount {
        return Err(rejected(report, new_total));
    }

    // Once settled the report is closed for business; re-entries are ignored.
    if report.is_settled() {
        return Ok(DepositOutcome::Unchanged);
    }

    if new_total < report.cash_submitted {
        return Err(rejected(report, new_total));
    }

    if new_total == report.cash_submitted {
        return Ok(DepositOutcome::Unchanged);
    }

    report.cash_submitted = new_total;

    let newly_settled = report.is_settled() && report.settled_at.is_none();
    if newly_settled {
        report.settled_at = Some(now);
    }

    Ok(DepositOutcome::Applied { newly_settled })
}

fn rejected(report: &SessionReport, new_total: Money) -> CoreError {
    CoreError::InvalidDeposit {
        report_id: report.id.clone(),
        rejected: new_total,
        min: report.cash_submitted,
        max: report.total_amount,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Session, SoldLine};
    use chrono::Duration;

    fn report_of(total_cents: i64) -> SessionReport {
        let lines = vec![SoldLine::new("p-1", "Pod", 1, Money::from_cents(total_cents))];
        SessionReport::from_session(Session::start("s-1", "Sam", "t-1"), lines, Utc::now())
    }

    #[test]
    fn test_partial_then_full_deposit() {
        let mut report = report_of(2500);
        let t1 = Utc::now();

        let outcome = apply_deposit(&mut report, Money::from_cents(1000), t1).unwrap();
        assert_eq!(outcome, DepositOutcome::Applied { newly_settled: false });
        assert_eq!(report.remaining_balance(), Money::from_cents(1500));
        assert!(report.settled_at.is_none());

        let t2 = t1 + Duration::minutes(5);
        let outcome = apply_deposit(&mut report, Money::from_cents(2500), t2).unwrap();
        assert_eq!(outcome, DepositOutcome::Applied { newly_settled: true });
        assert_eq!(report.remaining_balance(), Money::zero());
        assert_eq!(report.settled_at, Some(t2));
    }

    #[test]
    fn test_same_cumulative_twice_is_noop() {
        let mut report = report_of(2500);
        apply_deposit(&mut report, Money::from_cents(1000), Utc::now()).unwrap();
        let before = report.clone();

        let outcome = apply_deposit(&mut report, Money::from_cents(1000), Utc::now()).unwrap();
        assert_eq!(outcome, DepositOutcome::Unchanged);
        assert_eq!(report, before);
    }

    #[test]
    fn test_decreasing_deposit_rejected() {
        let mut report = report_of(2500);
        apply_deposit(&mut report, Money::from_cents(1500), Utc::now()).unwrap();

        let err = apply_deposit(&mut report, Money::from_cents(1000), Utc::now()).unwrap_err();
        match err {
            CoreError::InvalidDeposit { rejected, min, max, .. } => {
                assert_eq!(rejected, Money::from_cents(1000));
                assert_eq!(min, Money::from_cents(1500));
                assert_eq!(max, Money::from_cents(2500));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(report.cash_submitted, Money::from_cents(1500));
    }

    #[test]
    fn test_overpayment_rejected() {
        let mut report = report_of(2500);
        let err = apply_deposit(&mut report, Money::from_cents(2600), Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidDeposit { .. }));
        assert_eq!(report.cash_submitted, Money::zero());
    }

    #[test]
    fn test_overpayment_rejected_after_settlement() {
        let mut report = report_of(2500);
        apply_deposit(&mut report, Money::from_cents(2500), Utc::now()).unwrap();
        assert!(apply_deposit(&mut report, Money::from_cents(3000), Utc::now()).is_err());
    }

    #[test]
    fn test_lower_deposit_after_settlement_is_noop() {
        let mut report = report_of(2500);
        let settled = Utc::now();
        apply_deposit(&mut report, Money::from_cents(2500), settled).unwrap();

        let outcome = apply_deposit(&mut report, Money::from_cents(1000), Utc::now()).unwrap();
        assert_eq!(outcome, DepositOutcome::Unchanged);
        assert_eq!(report.cash_submitted, Money::from_cents(2500));
        assert_eq!(report.settled_at, Some(settled));
        assert!(report.is_settled());
    }

    #[test]
    fn test_zero_total_report_is_already_settled() {
        let mut report =
            SessionReport::from_session(Session::start("s", "Sam", "t"), Vec::new(), Utc::now());
        let outcome = apply_deposit(&mut report, Money::zero(), Utc::now()).unwrap();
        assert_eq!(outcome, DepositOutcome::Unchanged);
        assert!(report.is_settled());
    }

    #[test]
    fn test_deposit_sequence_keeps_cash_monotonic() {
        let mut report = report_of(10_000);
        let attempts = [500, 300, 2000, 2000, 9_999, 10_001, 10_000, 50];
        let mut last = Money::zero();
        let mut settled_at = None;

        for cents in attempts {
            let _ = apply_deposit(&mut report, Money::from_cents(cents), Utc::now());
            assert!(report.cash_submitted >= last);
            assert!(report.cash_submitted <= report.total_amount);
            assert_eq!(report.is_settled(), !report.remaining_balance().is_positive());
            if settled_at.is_some() {
                assert_eq!(report.settled_at, settled_at);
            }
            settled_at = report.settled_at;
            last = report.cash_submitted;
        }
        assert!(report.is_settled());
    }
}
