//! Housekeeper (C9): periodic expiry of unpaid invoices and pending orders,
//! and retention-based deletion of stored payloads. Grounded on
//! `original_source/server/daemon.py::cleanup_database` and
//! `order_helpers.py::expire_old_pending_orders` /
//! `cleanup_old_message_files`.

use crate::app_state::Engine;
use crate::db::orders;
use crate::error::AppError;
use crate::lifecycle;
use crate::settings::EXPIRE_PENDING_ORDERS_AFTER_DAYS;
use crate::settings::MESSAGE_FILE_RETENTION_DAYS;
use time::Duration;
use time::OffsetDateTime;
use tracing::error;
use tracing::info;
use tracing::instrument;

/// Runs one housekeeping pass. Errors on an individual row are logged and
/// do not stop the rest of the sweep (§7).
#[instrument(skip(engine))]
pub fn run(engine: &Engine) -> Result<(), AppError> {
    let mut conn = engine.pool.get()?;

    let (expired_invoices, expired_orders_from_invoices) =
        match lifecycle::expire_unpaid_invoices(&mut conn, &engine.message_store) {
            Ok(counts) => counts,
            Err(err) => {
                error!(error = ?err, "failed to expire unpaid invoices");
                (0, 0)
            }
        };

    let pending_cutoff = OffsetDateTime::now_utc() - Duration::days(EXPIRE_PENDING_ORDERS_AFTER_DAYS);
    let stale_pending = orders::pending_older_than(&mut conn, pending_cutoff)?;
    let mut expired_pending_orders = 0;
    for order in &stale_pending {
        match lifecycle::maybe_mark_order_as_expired(&mut conn, order.id, &engine.message_store) {
            Ok(true) => expired_pending_orders += 1,
            Ok(false) => {}
            Err(err) => error!(uuid = %order.uuid, error = ?err, "failed to expire pending order"),
        }
    }

    let retention_cutoff = OffsetDateTime::now_utc() - Duration::days(MESSAGE_FILE_RETENTION_DAYS);
    let ended_orders = orders::ended_before(&mut conn, retention_cutoff)?;
    let mut cleaned_up_files = 0;
    for order in &ended_orders {
        match engine.message_store.delete(&order.uuid) {
            Ok(()) => cleaned_up_files += 1,
            Err(err) => error!(uuid = %order.uuid, error = ?err, "failed to delete stored payload"),
        }
    }

    let total_expired_orders = expired_orders_from_invoices + expired_pending_orders;
    if expired_invoices > 0 || total_expired_orders > 0 || cleaned_up_files > 0 {
        info!(
            expired_invoices,
            total_expired_orders, cleaned_up_files, "database cleanup"
        );
    }
    Ok(())
}
