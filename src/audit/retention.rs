use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{AuditLogger, AUDIT_TABLE};
use crate::database::{DatabaseError, Ident, Statement};
use crate::filter::{CompareOp, Condition};

/// Oldest timestamp that survives a prune at `now`. `None` when the window
/// reaches past the representable range, so nothing is old enough to prune.
pub fn cutoff(now: DateTime<Utc>, retention_days: i64) -> Option<DateTime<Utc>> {
    chrono::Duration::try_days(retention_days).and_then(|window| now.checked_sub_signed(window))
}

/// `DELETE FROM audit_logs WHERE timestamp < $1`
pub fn prune_statement(cutoff: DateTime<Utc>) -> Result<Statement, DatabaseError> {
    Statement::delete(
        Ident::new(AUDIT_TABLE)?,
        vec![Condition::new(Ident::new("timestamp")?, CompareOp::Lt, cutoff)],
    )
}

/// Prunes the audit table on a fixed interval until the runtime shuts down.
/// The first sweep runs immediately.
pub fn spawn_retention_sweeper(audit: Arc<AuditLogger>, every: Duration) -> JoinHandle<()> {
    info!(interval_secs = every.as_secs(), "Starting audit retention sweeper");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if !audit.is_enabled() {
                debug!("CORE_DB_URL not set, skipping audit retention sweep");
                continue;
            }
            match audit.prune().await {
                Ok(removed) => debug!(removed, "Audit retention sweep complete"),
                Err(e) => error!(error = %e, "Audit retention sweep failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn prune_deletes_strictly_older_rows() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let cutoff = cutoff(now, 7).unwrap();
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2026, 10, 9, 12, 0, 0).unwrap());

        let sql = prune_statement(cutoff).unwrap().to_sql();
        assert_eq!(sql.query, "DELETE FROM \"audit_logs\" WHERE \"timestamp\" < $1");
        assert_eq!(sql.params.len(), 1);
    }

    #[test]
    fn oversized_window_keeps_everything() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        assert_eq!(cutoff(now, 200_000_000_000_000), None);
        assert_eq!(cutoff(now, i64::MAX), None);
    }
}
