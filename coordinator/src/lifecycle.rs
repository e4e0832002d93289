//! Order lifecycle (C6): state transitions driven by payments, uploads,
//! confirmations and timers. Grounded on
//! `original_source/server/order_helpers.py`.

use crate::db::confirmations;
use crate::db::confirmations::Kind;
use crate::db::invoices;
use crate::db::invoices::Invoice;
use crate::db::orders;
use crate::db::orders::Order;
use crate::db::OrderStatus;
use crate::error::AppError;
use crate::message_store::MessageStore;
use diesel::PgConnection;
use queue_commons::bidding;
use queue_commons::regions;
use time::OffsetDateTime;
use tracing::info;
use tracing::warn;

/// Recomputes `bid`, `unpaid_bid` and `bid_per_byte` from the order's
/// invoice rows (invariant 3 in spec.md §3). Must be called after every
/// invoice status change.
pub fn adjust_bids(conn: &mut PgConnection, order: &Order) -> Result<(), AppError> {
    let bid = invoices::sum_amount_by_status(conn, order.id, crate::db::InvoiceStatus::Paid)?;
    let unpaid_bid =
        invoices::sum_amount_by_status(conn, order.id, crate::db::InvoiceStatus::Pending)?;
    let ota = bidding::ota_len(order.message_size as u32) as f64;
    let bid_per_byte = bid as f64 / ota;
    orders::update_bid_fields(conn, order.id, bid, unpaid_bid, bid_per_byte)?;
    Ok(())
}

/// Transitions a *pending* order to *paid* once its paid bid total clears
/// the minimum bid for its message size. No-op otherwise.
pub fn maybe_mark_order_as_paid(
    conn: &mut PgConnection,
    order: &Order,
    min_per_byte_bid: f64,
    min_bid_floor: u64,
) -> Result<bool, AppError> {
    if order.status != OrderStatus::Pending {
        return Ok(false);
    }
    let refreshed = orders::by_id(conn, order.id)?.ok_or(AppError::OrderNotFound {
        uuid: order.uuid.clone(),
    })?;
    let min_bid = bidding::min_bid(
        refreshed.message_size as u32,
        min_per_byte_bid,
        min_bid_floor,
    );
    if refreshed.bid as u64 >= min_bid {
        orders::set_status(conn, refreshed.id, OrderStatus::Paid)?;
        info!(uuid = %refreshed.uuid, "order marked as paid");
        return Ok(true);
    }
    Ok(false)
}

/// Expires a *pending* order with no remaining pending invoices. Deletes its
/// stored payload. No-op if the order is not pending or still has a pending
/// invoice.
pub fn maybe_mark_order_as_expired(
    conn: &mut PgConnection,
    order_id: i64,
    store: &MessageStore,
) -> Result<bool, AppError> {
    let order = match orders::by_id(conn, order_id)? {
        Some(order) if order.status == OrderStatus::Pending => order,
        _ => return Ok(false),
    };
    if invoices::has_pending(conn, order.id)? {
        return Ok(false);
    }
    expire_order(conn, &order, store)?;
    Ok(true)
}

fn expire_order(
    conn: &mut PgConnection,
    order: &Order,
    store: &MessageStore,
) -> Result<(), AppError> {
    orders::set_expired(conn, order.id)?;
    store.delete(&order.uuid)?;
    info!(uuid = %order.uuid, "order expired");
    Ok(())
}

/// Idempotent transition pending->paid for an invoice (C5).
pub fn pay_invoice(conn: &mut PgConnection, invoice: &Invoice) -> Result<(), AppError> {
    match invoice.status {
        crate::db::InvoiceStatus::Paid => return Err(AppError::InvoiceAlreadyPaid),
        crate::db::InvoiceStatus::Expired => return Err(AppError::InvoiceAlreadyExpired),
        crate::db::InvoiceStatus::Pending => {}
    }
    invoices::mark_paid(conn, invoice.id)?;
    Ok(())
}

/// Expires every invoice whose `expires_at` has elapsed, and attempts to
/// expire the owning order when it has no remaining pending invoices.
/// Returns the number of invoices and orders expired.
pub fn expire_unpaid_invoices(
    conn: &mut PgConnection,
    store: &MessageStore,
) -> Result<(usize, usize), AppError> {
    let now = OffsetDateTime::now_utc();
    let expiring = invoices::expired_pending(conn, now)?;
    let mut expired_orders = 0;
    for invoice in &expiring {
        invoices::mark_expired(conn, invoice.id)?;
        if maybe_mark_order_as_expired(conn, invoice.order_id, store)? {
            expired_orders += 1;
        }
    }
    Ok((expiring.len(), expired_orders))
}

/// Cancellation is only valid from *pending* or *paid*. Deletes the payload.
pub fn cancel_order(
    conn: &mut PgConnection,
    order: &Order,
    store: &MessageStore,
) -> Result<(), AppError> {
    if order.status != OrderStatus::Pending && order.status != OrderStatus::Paid {
        return Err(AppError::OrderCancellationError {
            status: format!("{:?}", order.status).to_lowercase(),
        });
    }
    store.delete(&order.uuid)?;
    orders::set_cancelled(conn, order.id)?;
    Ok(())
}

/// Bid-bump is only valid from *pending* or *paid*.
pub fn ensure_bumpable(order: &Order) -> Result<(), AppError> {
    if order.status != OrderStatus::Pending && order.status != OrderStatus::Paid {
        return Err(AppError::OrderBumpError);
    }
    Ok(())
}

/// Appends a Tx confirmation for each region in `region_numbers` (no-op for
/// regions already confirmed), moving *transmitting* straight to
/// *confirming* so the channel frees up even before all regions report in.
pub fn record_tx_confirmations(
    conn: &mut PgConnection,
    order: &Order,
    region_numbers: &[u8],
) -> Result<(), AppError> {
    if order.status == OrderStatus::Transmitting {
        orders::set_confirming(conn, order.id)?;
    }
    for &number in region_numbers {
        let Some(region) = regions::Region::from_region_number(number) else {
            continue;
        };
        confirmations::append_if_absent(conn, Kind::Tx, order.id, region.region_id(), false)?;
    }
    Ok(())
}

/// Appends a single Rx confirmation (no-op if already present).
pub fn record_rx_confirmation(
    conn: &mut PgConnection,
    order: &Order,
    region_number: i32,
) -> Result<(), AppError> {
    let Some(region) = regions::Region::from_region_number(region_number as u8) else {
        return Err(AppError::RegionNotFound {
            region: region_number as u32,
        });
    };
    confirmations::append_if_absent(conn, Kind::Rx, order.id, region.region_id(), false)?;
    Ok(())
}

/// *sent* is reached when every region in `order.region_code` has a Tx
/// confirmation. Idempotent: re-checking an order already *sent*/*received*
/// returns `true` without side effects.
fn sent_criteria_met(conn: &mut PgConnection, order: &Order) -> Result<bool, AppError> {
    if order.status == OrderStatus::Sent || order.status == OrderStatus::Received {
        return Ok(true);
    }
    if order.status != OrderStatus::Transmitting && order.status != OrderStatus::Confirming {
        return Ok(false);
    }
    let required: std::collections::HashSet<i32> =
        regions::code_to_region_ids(order.region_code as u32)
            .into_iter()
            .collect();
    let confirmed: std::collections::HashSet<i32> =
        confirmations::region_ids_for_order(conn, Kind::Tx, order.id)?
            .into_iter()
            .collect();
    if !required.is_subset(&confirmed) {
        return Ok(false);
    }
    if confirmed.len() > required.len() {
        let unexpected: Vec<_> = confirmed.difference(&required).collect();
        warn!(uuid = %order.uuid, ?unexpected, "unexpected Tx confirmations");
    }
    orders::set_sent(conn, order.id)?;
    info!(uuid = %order.uuid, "order sent");
    Ok(true)
}

/// *received* is reached when every monitored region in `order.region_code`
/// has an Rx confirmation; at that point `presumed` confirmations are
/// synthesized for the unmonitored regions in `order.region_code`.
fn received_criteria_met(conn: &mut PgConnection, order: &Order) -> Result<bool, AppError> {
    if order.status == OrderStatus::Received {
        return Ok(true);
    }
    if order.status != OrderStatus::Transmitting
        && order.status != OrderStatus::Confirming
        && order.status != OrderStatus::Sent
    {
        return Ok(false);
    }
    let order_regions: std::collections::HashSet<i32> =
        regions::code_to_region_ids(order.region_code as u32)
            .into_iter()
            .collect();
    let monitored: std::collections::HashSet<i32> =
        regions::monitored_rx_region_ids().into_iter().collect();
    let expected: std::collections::HashSet<i32> =
        order_regions.intersection(&monitored).copied().collect();
    let confirmed: std::collections::HashSet<i32> =
        confirmations::region_ids_for_order(conn, Kind::Rx, order.id)?
            .into_iter()
            .collect();
    if !expected.is_subset(&confirmed) {
        return Ok(false);
    }
    synthesize_presumed_rx_confirmations(conn, order, &order_regions)?;
    orders::set_received(conn, order.id)?;
    info!(uuid = %order.uuid, "order received");
    Ok(true)
}

/// Synthesizes `presumed=true` Rx confirmations for the regions in
/// `order_regions` that have no receiving station.
fn synthesize_presumed_rx_confirmations(
    conn: &mut PgConnection,
    order: &Order,
    order_regions: &std::collections::HashSet<i32>,
) -> Result<(), AppError> {
    for region in [regions::Region::T11nAfr, regions::Region::T11nEu] {
        if order_regions.contains(&region.region_id()) {
            confirmations::append_if_absent(conn, Kind::Rx, order.id, region.region_id(), true)?;
        }
    }
    Ok(())
}

/// Re-evaluates both the *sent* and *received* criteria for `order`, which
/// can be satisfied in either order. Returns `true` if the order reached a
/// terminal transmission state ending a channel's transmission slot.
pub fn sent_or_received_criteria_met(
    conn: &mut PgConnection,
    order: &Order,
) -> Result<bool, AppError> {
    let sent = sent_criteria_met(conn, order)?;
    let received = received_criteria_met(conn, order)?;
    Ok(sent || received)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_with_status(status: OrderStatus) -> Order {
        Order {
            id: 1,
            uuid: "test-order".to_string(),
            channel: 1,
            status,
            bid: 0,
            unpaid_bid: 0,
            bid_per_byte: 0.0,
            message_size: 100,
            message_digest: "digest".to_string(),
            region_code: 0,
            tx_seq_num: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
            cancelled_at: None,
            started_transmission_at: None,
            ended_transmission_at: None,
        }
    }

    #[test]
    fn ensure_bumpable_accepts_pending_and_paid_only() {
        for status in [OrderStatus::Pending, OrderStatus::Paid] {
            assert!(ensure_bumpable(&order_with_status(status)).is_ok());
        }
        for status in [
            OrderStatus::Transmitting,
            OrderStatus::Confirming,
            OrderStatus::Sent,
            OrderStatus::Received,
            OrderStatus::Cancelled,
            OrderStatus::Expired,
        ] {
            assert!(matches!(
                ensure_bumpable(&order_with_status(status)),
                Err(AppError::OrderBumpError)
            ));
        }
    }

    // State-machine coverage that needs confirmation rows and real
    // transitions (sent/received criteria, presumed Rx synthesis,
    // single-flight scheduling) lives in `coordinator/tests/` against a
    // real Postgres instance.
}
