//! # Reconciliation Ledger
//!
//! Cash handed in against session reports.
//!
//! Deposits are cumulative: the caller sends the new total handed in so far,
//! not the increment. Sending the same total twice is therefore harmless.
//!
//! ```text
//! get report ──► apply_deposit (pure rules) ──► UPDATE ... WHERE cash = old
//!                      │                               │
//!                  Unchanged ──► report as is       0 rows ──► DepositConflict
//! ```

use chrono::Utc;
use tracing::{debug, info};

use shopfloor_core::reconciliation::{apply_deposit, DepositOutcome};
use shopfloor_core::{Money, SessionReport};
use shopfloor_db::{Database, DbError};

use crate::error::{ServiceError, ServiceResult};

pub use shopfloor_db::repository::report::DEFAULT_REPORT_LIMIT;

/// Records a cumulative cash deposit against a report.
///
/// ## Arguments
/// * `report_id` - The report (same id as the session it closed)
/// * `new_total` - Total cash handed in so far, including this deposit
///
/// ## Returns
/// * `Ok(report)` - The report after the deposit (unchanged if nothing to do)
/// * `Err(ServiceError::Core(CoreError::InvalidDeposit))` - Outside `[cash_submitted, total_amount]`
/// * `Err(ServiceError::DepositConflict)` - Someone else deposited meanwhile; retry
pub async fn deposit(db: &Database, report_id: &str, new_total: Money) -> ServiceResult<SessionReport> {
    let report = get(db, report_id).await?;
    commit_deposit(db, report, new_total).await
}

/// Applies `new_total` to a report snapshot and writes it back if the stored
/// cash figure still matches the snapshot.
pub(crate) async fn commit_deposit(
    db: &Database,
    mut report: SessionReport,
    new_total: Money,
) -> ServiceResult<SessionReport> {
    let before = report.cash_submitted;

    match apply_deposit(&mut report, new_total, Utc::now())? {
        DepositOutcome::Unchanged => {
            debug!(report_id = %report.id, amount = %new_total, "Deposit changes nothing");
            Ok(report)
        }
        DepositOutcome::Applied { newly_settled } => {
            let settled_at = if newly_settled { report.settled_at } else { None };
            let reports = db.reports();

            if !reports
                .update_cash(&report.id, before, new_total, settled_at)
                .await?
            {
                if reports.get(&report.id).await?.is_none() {
                    return Err(DbError::not_found("SessionReport", &report.id).into());
                }
                return Err(ServiceError::DepositConflict {
                    report_id: report.id.clone(),
                });
            }

            info!(
                report_id = %report.id,
                cash_submitted = %report.cash_submitted,
                remaining = %report.remaining_balance(),
                settled = newly_settled,
                "Deposit recorded"
            );
            Ok(report)
        }
    }
}

pub async fn get(db: &Database, report_id: &str) -> ServiceResult<SessionReport> {
    db.reports()
        .get(report_id)
        .await?
        .ok_or_else(|| DbError::not_found("SessionReport", report_id).into())
}

/// Permanently removes a report, settled or not.
pub async fn delete(db: &Database, report_id: &str) -> ServiceResult<()> {
    db.reports().delete(report_id).await?;
    Ok(())
}

/// Reports, newest first.
pub async fn list(db: &Database, limit: u32) -> ServiceResult<Vec<SessionReport>> {
    Ok(db.reports().list(limit).await?)
}

pub async fn list_for_staff(db: &Database, staff_id: &str, limit: u32) -> ServiceResult<Vec<SessionReport>> {
    Ok(db.reports().list_for_staff(staff_id, limit).await?)
}

/// Reports with cash still outstanding.
pub async fn list_unsettled(db: &Database, limit: u32) -> ServiceResult<Vec<SessionReport>> {
    Ok(db.reports().list_unsettled(limit).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopfloor_core::{CoreError, Session, SoldLine};
    use shopfloor_db::{ConnectionRouter, RouterConfig};

    async fn store() -> (ConnectionRouter, Database) {
        let router = ConnectionRouter::new(RouterConfig::in_memory());
        let db = router.connection_for("shop_a").await.unwrap();
        (router, db)
    }

    async fn report_of(db: &Database, staff_id: &str, prices: &[i64]) -> SessionReport {
        let lines = prices
            .iter()
            .map(|cents| SoldLine::new("p-1", "Pod", 1, Money::from_cents(*cents)))
            .collect();
        let session = Session::start(staff_id, "Ayesha", "tenant-1");
        let report = SessionReport::from_session(session, lines, Utc::now());
        db.reports().insert(&report).await.unwrap();
        report
    }

    #[tokio::test]
    async fn test_full_deposit_settles_and_later_entries_change_nothing() {
        let (_router, db) = store().await;
        let report = report_of(&db, "staff-1", &[1000, 1500]).await;
        assert_eq!(report.total_amount, Money::from_cents(2500));

        let settled = deposit(&db, &report.id, Money::from_cents(2500)).await.unwrap();
        assert!(settled.is_settled());
        assert!(settled.remaining_balance().is_zero());
        let settled_at = settled.settled_at;
        assert!(settled_at.is_some());

        let after = deposit(&db, &report.id, Money::from_cents(1000)).await.unwrap();
        assert_eq!(after.cash_submitted, Money::from_cents(2500));
        assert_eq!(after.settled_at, settled_at);

        let stored = get(&db, &report.id).await.unwrap();
        assert_eq!(stored.cash_submitted, Money::from_cents(2500));
        assert_eq!(stored.settled_at, settled_at);
    }

    #[tokio::test]
    async fn test_partial_deposits_accumulate() {
        let (_router, db) = store().await;
        let report = report_of(&db, "staff-1", &[1000, 1500]).await;

        let partial = deposit(&db, &report.id, Money::from_cents(1000)).await.unwrap();
        assert_eq!(partial.remaining_balance(), Money::from_cents(1500));
        assert!(!partial.is_settled());
        assert!(partial.settled_at.is_none());

        // Same cumulative figure again is a no-op.
        let repeat = deposit(&db, &report.id, Money::from_cents(1000)).await.unwrap();
        assert_eq!(repeat.cash_submitted, Money::from_cents(1000));

        let done = deposit(&db, &report.id, Money::from_cents(2500)).await.unwrap();
        assert!(done.is_settled());
        assert_eq!(list_unsettled(&db, 10).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_deposits_are_rejected() {
        let (_router, db) = store().await;
        let report = report_of(&db, "staff-1", &[2500]).await;
        deposit(&db, &report.id, Money::from_cents(1000)).await.unwrap();

        let over = deposit(&db, &report.id, Money::from_cents(3000)).await.unwrap_err();
        match over {
            ServiceError::Core(CoreError::InvalidDeposit { rejected, min, max, .. }) => {
                assert_eq!(rejected, Money::from_cents(3000));
                assert_eq!(min, Money::from_cents(1000));
                assert_eq!(max, Money::from_cents(2500));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let backwards = deposit(&db, &report.id, Money::from_cents(500)).await.unwrap_err();
        assert!(matches!(backwards, ServiceError::Core(CoreError::InvalidDeposit { .. })));

        assert_eq!(get(&db, &report.id).await.unwrap().cash_submitted, Money::from_cents(1000));
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_a_conflict() {
        let (_router, db) = store().await;
        let report = report_of(&db, "staff-1", &[2500]).await;

        let stale = get(&db, &report.id).await.unwrap();
        deposit(&db, &report.id, Money::from_cents(1000)).await.unwrap();

        let err = commit_deposit(&db, stale, Money::from_cents(2000)).await.unwrap_err();
        assert!(matches!(err, ServiceError::DepositConflict { .. }));
        assert!(err.is_retryable());

        let retried = deposit(&db, &report.id, Money::from_cents(2000)).await.unwrap();
        assert_eq!(retried.cash_submitted, Money::from_cents(2000));
    }

    #[tokio::test]
    async fn test_deposit_against_deleted_report() {
        let (_router, db) = store().await;
        let report = report_of(&db, "staff-1", &[2500]).await;
        let snapshot = get(&db, &report.id).await.unwrap();

        delete(&db, &report.id).await.unwrap();

        assert!(deposit(&db, &report.id, Money::from_cents(100)).await.unwrap_err().is_not_found());
        assert!(commit_deposit(&db, snapshot, Money::from_cents(100))
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_delete_ignores_settlement() {
        let (_router, db) = store().await;
        let open = report_of(&db, "staff-1", &[1000]).await;
        let settled = report_of(&db, "staff-1", &[1000]).await;
        deposit(&db, &settled.id, Money::from_cents(1000)).await.unwrap();

        delete(&db, &open.id).await.unwrap();
        delete(&db, &settled.id).await.unwrap();

        assert!(list(&db, DEFAULT_REPORT_LIMIT).await.unwrap().is_empty());
        assert!(delete(&db, &open.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_for_staff() {
        let (_router, db) = store().await;
        report_of(&db, "staff-1", &[1000]).await;
        report_of(&db, "staff-1", &[2000]).await;
        report_of(&db, "staff-2", &[3000]).await;

        assert_eq!(list_for_staff(&db, "staff-1", 10).await.unwrap().len(), 2);
        assert_eq!(list(&db, 10).await.unwrap().len(), 3);
    }
}
