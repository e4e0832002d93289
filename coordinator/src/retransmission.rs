//! Retransmission controller (C8): periodically scans in-flight orders,
//! promotes timed-out transmissions to *confirming*, and upserts the
//! `TxRetry` rows the scheduler (C7) consumes. Grounded on
//! `original_source/server/order_helpers.py::refresh_retransmission_table`.

use crate::app_state::Engine;
use crate::db::confirmations;
use crate::db::confirmations::Kind;
use crate::db::orders;
use crate::db::orders::Order;
use crate::db::tx_retries;
use crate::db::OrderStatus;
use crate::error::AppError;
use crate::scheduler;
use queue_commons::channels;
use queue_commons::regions;
use time::Duration;
use time::OffsetDateTime;
use tracing::error;
use tracing::info;
use tracing::instrument;

/// Runs one sweep over every *transmitting*/*confirming* order, upserting a
/// `TxRetry` row for each one whose acknowledgements are overdue. Errors on
/// an individual order are logged and do not stop the sweep (§7).
#[instrument(skip(engine))]
pub fn sweep(engine: &Engine) -> Result<(), AppError> {
    let mut conn = engine.pool.get()?;
    let in_flight = orders::in_flight(&mut conn)?;
    engine.metrics.orders_in_flight.set(in_flight.len() as i64);
    let mut any_retry = false;

    for order in in_flight {
        match evaluate(&mut conn, &order) {
            Ok(true) => any_retry = true,
            Ok(false) => {}
            Err(err) => error!(uuid = %order.uuid, error = ?err, "retransmission sweep failed for order"),
        }
    }

    if any_retry || tx_retries::exists_any(&mut conn)? {
        drop(conn);
        for info in channels::all_channels() {
            scheduler::tx_start(engine, Some(info.id))?;
        }
    }
    Ok(())
}

/// Evaluates the three timeout rules (spec.md §4.8) for a single order.
/// Returns `true` if a `TxRetry` row was inserted or updated.
fn evaluate(conn: &mut diesel::PgConnection, order: &Order) -> Result<bool, AppError> {
    let channel = channels::channel_info(order.channel).ok_or(AppError::OrderChannelUnauthorizedOp {
        channel: order.channel,
    })?;
    let now = OffsetDateTime::now_utc();
    let ota = queue_commons::bidding::ota_len(order.message_size as u32);
    let tx_delay_secs = (ota as f64 / channel.tx_rate as f64).ceil() as i64;
    let total = Duration::seconds(tx_delay_secs + channel.tx_confirm_timeout_secs as i64);

    let last_tx_confirmation = confirmations::last_tx_confirmation_at(conn, order.id)?;
    let retry = tx_retries::for_order(conn, order.id)?;

    let should_retry = match (order.status, last_tx_confirmation, &retry) {
        // Rule 1: confirming with a stale last confirmation.
        (OrderStatus::Confirming, Some(last), _) => {
            now > last + Duration::seconds(channel.tx_confirm_timeout_secs as i64)
        }
        // Rule 2: a previous retransmission attempt is overdue.
        (_, _, Some(retry)) if retry.retry_count > 0 => match retry.last_attempt {
            Some(last_attempt) => now > last_attempt + total,
            None => false,
        },
        // Rule 3: never confirmed, never retried, overdue since transmission start.
        (OrderStatus::Transmitting, None, _) => match order.started_transmission_at {
            Some(started) => now > started + total,
            None => false,
        },
        _ => false,
    };

    if !should_retry {
        return Ok(false);
    }

    if order.status == OrderStatus::Transmitting {
        orders::set_confirming(conn, order.id)?;
    }

    let confirmed: std::collections::HashSet<i32> =
        confirmations::region_ids_for_order(conn, Kind::Tx, order.id)?
            .into_iter()
            .collect();
    let required: std::collections::HashSet<i32> =
        regions::code_to_region_ids(order.region_code as u32)
            .into_iter()
            .collect();
    let missing: Vec<i32> = required.difference(&confirmed).copied().collect();

    if missing.is_empty() {
        return Ok(false);
    }

    let missing_code = regions::region_ids_to_code(&missing) as i32;
    tx_retries::upsert_region_code(conn, order.id, missing_code)?;
    info!(uuid = %order.uuid, missing_code, "order upserted for retransmission");
    Ok(true)
}
