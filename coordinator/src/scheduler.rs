//! Scheduler / Transmitter (C7): per-channel single-flight selection of the
//! next order to broadcast, and publication to the channel's pub/sub topic.
//! Grounded on `original_source/server/transmitter.py`.

use crate::app_state::Engine;
use crate::db::orders;
use crate::db::orders::Order;
use crate::db::tx_retries;
use crate::error::AppError;
use crate::requests::OrderView;
use diesel::Connection;
use queue_commons::channels;
use queue_commons::regions;
use serde_json::json;
use tracing::info;
use tracing::instrument;

/// Looks for a pending transmission on `channel` and serves it. Recurses
/// over every registered channel when `channel` is `None`.
///
/// An order is ready for transmission when already paid, or when pending
/// retransmission. A channel can only serve one transmission at a time
/// (invariant 1, spec.md §3): this function's precondition check and its
/// write both happen inside the same transaction so two concurrent callers
/// race safely — the loser observes the in-flight order and returns.
#[instrument(skip(engine))]
pub fn tx_start(engine: &Engine, channel: Option<i32>) -> Result<(), AppError> {
    let Some(channel) = channel else {
        for info in channels::all_channels() {
            tx_start(engine, Some(info.id))?;
        }
        return Ok(());
    };

    let mut conn = engine.pool.get()?;
    conn.build_transaction().serializable().run(|conn| {
        if orders::transmitting_on_channel(conn, channel)?.is_some() {
            return Ok::<(), AppError>(());
        }

        if let Some(order) = orders::next_paid_on_channel(conn, channel)? {
            let tx_seq_num = orders::next_tx_seq_num(conn)?;
            orders::start_transmission(conn, order.id, tx_seq_num)?;
            let order = orders::by_id(conn, order.id)?.expect("order just updated in this transaction");
            info!(uuid = %order.uuid, channel, tx_seq_num, "transmission start");
            engine.metrics.scheduler_picks.inc();
            publish(engine, channel, &order, None);
            return Ok(());
        }

        if let Some((retry, order)) = tx_retries::next_pending_on_channel(conn, channel)? {
            orders::resume_transmission(conn, order.id)?;
            tx_retries::mark_attempted(conn, order.id)?;
            let order = orders::by_id(conn, order.id)?.expect("order just updated in this transaction");
            info!(uuid = %order.uuid, channel, retry_count = retry.retry_count + 1, "retransmission start");
            engine.metrics.scheduler_picks.inc();
            engine.metrics.retransmissions.inc();
            publish(engine, channel, &order, Some(retry.region_code));
        }

        Ok(())
    })
}

/// Ends an order's transmission slot, frees its channel, and starts the
/// next queued transmission (or retransmission) on it. Idempotent: a
/// second call on an already-ended order is a no-op beyond freeing the
/// channel again, which is itself a no-op.
#[instrument(skip(engine))]
pub fn tx_end(engine: &Engine, order_id: i64) -> Result<(), AppError> {
    let mut conn = engine.pool.get()?;
    let order = orders::by_id(&mut conn, order_id)?.ok_or_else(|| AppError::OrderNotFound {
        uuid: order_id.to_string(),
    })?;

    if order.ended_transmission_at.is_none() {
        orders::mark_transmission_ended(&mut conn, order.id)?;
        tx_retries::delete_for_order(&mut conn, order.id)?;
        let order = orders::by_id(&mut conn, order.id)?.expect("order just updated above");
        info!(uuid = %order.uuid, channel = order.channel, "transmission end");
        if order.tx_seq_num.is_some() {
            publish(engine, order.channel, &order, None);
        }
    }
    tx_start(engine, Some(order.channel))
}

/// Publishes the order's public view (spec.md §6: "equal to the public
/// order view plus `regions`") on its channel's topic. If this is a
/// retransmission, `regions` is decoded from the retry's region code
/// instead of the order's, per spec.md §4.7.
fn publish(engine: &Engine, channel: i32, order: &Order, retry_region_code: Option<i32>) {
    let Some(info) = channels::channel_info(channel) else {
        return;
    };
    let region_code = retry_region_code.unwrap_or(order.region_code);
    let mut payload = json!(OrderView::from(order));
    payload["regions"] = json!(regions::code_to_region_ids(region_code as u32));
    engine.broker.publish(info.name, payload);
    engine.metrics.orders_published.inc();
}

#[cfg(test)]
mod tests {
    use queue_commons::channels;

    #[test]
    fn every_channel_has_a_publish_topic_name() {
        for info in channels::all_channels() {
            assert!(!info.name.is_empty());
        }
    }
}
