//! # Session Tracker
//!
//! Opens sessions at login, counts sales while they run and turns them into
//! reports at logout.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use shopfloor_core::{Money, Session, SessionReport, SoldLine};

use super::store::{InMemorySessionStore, SessionStore};
use crate::error::{ServiceError, ServiceResult};

/// Live-session bookkeeping over a [`SessionStore`].
#[derive(Clone)]
pub struct SessionTracker {
    store: Arc<dyn SessionStore>,
}

impl std::fmt::Debug for SessionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTracker").finish_non_exhaustive()
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl SessionTracker {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        SessionTracker { store }
    }

    /// Tracker backed by a fresh [`InMemorySessionStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemorySessionStore::new()))
    }

    /// Starts a session for a staff member.
    pub async fn open(
        &self,
        staff_id: &str,
        staff_name: &str,
        tenant_id: &str,
    ) -> ServiceResult<Session> {
        let session = Session::start(staff_id, staff_name, tenant_id);
        self.store.insert(session.clone()).await?;

        info!(
            session_id = %session.id,
            staff_id = %staff_id,
            tenant_id = %tenant_id,
            "Session opened"
        );
        Ok(session)
    }

    /// Snapshot of a live session.
    pub async fn get(&self, session_id: &str) -> ServiceResult<Session> {
        self.store
            .get(session_id)
            .await?
            .ok_or_else(|| ServiceError::SessionNotFound(session_id.to_string()))
    }

    /// Counts one sale against a live session.
    ///
    /// Best effort: the sale itself is already recorded, so a missing session
    /// or a store failure is logged and otherwise ignored.
    pub async fn record_sale(&self, session_id: &str, amount: Money) {
        match self.store.add_sale(session_id, amount).await {
            Ok(true) => {
                debug!(session_id = %session_id, amount = %amount, "Sale counted");
            }
            Ok(false) => {
                debug!(session_id = %session_id, "Sale for unknown session ignored");
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to count sale");
            }
        }
    }

    /// Ends a session and builds its report from `lines`.
    ///
    /// The session leaves the live set before the report is built, so two
    /// racing closes yield one report and one `SessionNotFound`.
    pub async fn close(&self, session_id: &str, lines: Vec<SoldLine>) -> ServiceResult<SessionReport> {
        let session = self.take(session_id).await?;
        Ok(self.report_for(session, lines))
    }

    /// Removes a session from the live set and hands it to the caller.
    ///
    /// Sales counted after this are ignored. Pair with [`Self::restore`] if
    /// the report cannot be stored.
    pub async fn take(&self, session_id: &str) -> ServiceResult<Session> {
        self.store
            .remove(session_id)
            .await?
            .ok_or_else(|| ServiceError::SessionNotFound(session_id.to_string()))
    }

    /// Puts a taken session back so a failed logout can be retried.
    pub async fn restore(&self, session: Session) -> ServiceResult<()> {
        let session_id = session.id.clone();
        self.store.insert(session).await?;
        info!(session_id = %session_id, "Session restored after failed close");
        Ok(())
    }

    /// Builds the report of a session already taken out of the live set.
    pub fn report_for(&self, session: Session, lines: Vec<SoldLine>) -> SessionReport {
        let session_id = session.id.clone();
        let counted = session.sale_total;
        let report = SessionReport::from_session(session, lines, Utc::now());

        if counted != report.total_amount {
            debug!(
                session_id = %session_id,
                counted = %counted,
                total = %report.total_amount,
                "Session counter differs from report lines"
            );
        }

        info!(
            session_id = %session_id,
            lines = report.lines.len(),
            total = %report.total_amount,
            "Session closed"
        );
        report
    }

    /// Live sessions of one staff member.
    pub async fn active_sessions_for(&self, staff_id: &str) -> ServiceResult<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|s| s.staff_id == staff_id)
            .collect();
        sessions.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(sessions)
    }

    pub async fn active_count(&self) -> ServiceResult<usize> {
        Ok(self.store.list().await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price_cents: i64) -> SoldLine {
        SoldLine::new("p-1", "Pod", 1, Money::from_cents(price_cents))
    }

    #[tokio::test]
    async fn test_open_starts_empty() {
        let tracker = SessionTracker::in_memory();
        let session = tracker.open("staff-1", "Ayesha", "tenant-1").await.unwrap();

        assert_eq!(session.sale_count, 0);
        assert!(session.sale_total.is_zero());
        assert_eq!(tracker.get(&session.id).await.unwrap(), session);
        assert_eq!(tracker.active_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sales_accumulate() {
        let tracker = SessionTracker::in_memory();
        let session = tracker.open("staff-1", "Ayesha", "tenant-1").await.unwrap();

        tracker.record_sale(&session.id, Money::from_cents(1000)).await;
        tracker.record_sale(&session.id, Money::from_cents(1500)).await;

        let live = tracker.get(&session.id).await.unwrap();
        assert_eq!(live.sale_count, 2);
        assert_eq!(live.sale_total, Money::from_cents(2500));
    }

    #[tokio::test]
    async fn test_sale_for_missing_session_is_ignored() {
        let tracker = SessionTracker::in_memory();
        tracker.record_sale("ghost", Money::from_cents(1000)).await;

        assert!(matches!(
            tracker.get("ghost").await,
            Err(ServiceError::SessionNotFound(_))
        ));
        assert_eq!(tracker.active_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_close_builds_report_and_is_terminal() {
        let tracker = SessionTracker::in_memory();
        let session = tracker.open("staff-1", "Ayesha", "tenant-1").await.unwrap();

        let report = tracker
            .close(&session.id, vec![line(1000), line(1500)])
            .await
            .unwrap();

        assert_eq!(report.id, session.id);
        assert_eq!(report.staff_name, "Ayesha");
        assert_eq!(report.total_amount, Money::from_cents(2500));
        assert_eq!(report.lines.len(), 2);
        assert!(report.cash_submitted.is_zero());
        assert!(report.ended_at >= report.started_at);

        assert!(matches!(
            tracker.close(&session.id, vec![]).await,
            Err(ServiceError::SessionNotFound(_))
        ));

        // A late sale must not bring the session back.
        tracker.record_sale(&session.id, Money::from_cents(500)).await;
        assert!(tracker.get(&session.id).await.is_err());
    }

    #[tokio::test]
    async fn test_taken_session_can_be_restored() {
        let tracker = SessionTracker::in_memory();
        let session = tracker.open("staff-1", "Ayesha", "tenant-1").await.unwrap();
        tracker.record_sale(&session.id, Money::from_cents(700)).await;

        let taken = tracker.take(&session.id).await.unwrap();
        assert!(tracker.get(&session.id).await.is_err());
        assert!(tracker.take(&session.id).await.is_err());

        tracker.restore(taken).await.unwrap();
        let back = tracker.get(&session.id).await.unwrap();
        assert_eq!(back.sale_total, Money::from_cents(700));
        assert_eq!(back.sale_count, 1);

        let report = tracker.close(&session.id, vec![line(700)]).await.unwrap();
        assert_eq!(report.total_amount, Money::from_cents(700));
    }

    #[tokio::test]
    async fn test_empty_session_report_is_settled() {
        let tracker = SessionTracker::in_memory();
        let session = tracker.open("staff-1", "Ayesha", "tenant-1").await.unwrap();

        let report = tracker.close(&session.id, vec![]).await.unwrap();
        assert!(report.total_amount.is_zero());
        assert!(report.is_settled());
    }

    #[tokio::test]
    async fn test_active_sessions_for_staff() {
        let tracker = SessionTracker::in_memory();
        let first = tracker.open("staff-1", "Ayesha", "tenant-1").await.unwrap();
        tracker.open("staff-2", "Bilal", "tenant-1").await.unwrap();
        let second = tracker.open("staff-1", "Ayesha", "tenant-1").await.unwrap();

        let mine = tracker.active_sessions_for("staff-1").await.unwrap();
        let ids: Vec<_> = mine.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(mine.len(), 2);
        assert!(ids.contains(&first.id.as_str()));
        assert!(ids.contains(&second.id.as_str()));
        assert_eq!(tracker.active_count().await.unwrap(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_closes_yield_one_report() {
        let tracker = SessionTracker::in_memory();
        let session = tracker.open("staff-1", "Ayesha", "tenant-1").await.unwrap();

        let a = {
            let tracker = tracker.clone();
            let id = session.id.clone();
            tokio::spawn(async move { tracker.close(&id, vec![line(100)]).await })
        };
        let b = {
            let tracker = tracker.clone();
            let id = session.id.clone();
            tokio::spawn(async move { tracker.close(&id, vec![line(100)]).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    }
}
