//! Persistence for [`Order`] rows: the core entity of the order lifecycle.

use crate::db::enums::OrderStatus;
use crate::schema::orders;
use diesel::prelude::*;
use diesel::PgConnection;
use diesel::QueryResult;
use time::OffsetDateTime;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = orders)]
pub struct Order {
    pub id: i64,
    pub uuid: String,
    pub channel: i32,
    pub status: OrderStatus,
    pub bid: i64,
    pub unpaid_bid: i64,
    pub bid_per_byte: f64,
    pub message_size: i32,
    pub message_digest: String,
    pub region_code: i32,
    pub tx_seq_num: Option<i64>,
    pub created_at: OffsetDateTime,
    pub cancelled_at: Option<OffsetDateTime>,
    pub started_transmission_at: Option<OffsetDateTime>,
    pub ended_transmission_at: Option<OffsetDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrder<'a> {
    pub uuid: &'a str,
    pub channel: i32,
    pub status: OrderStatus,
    pub message_size: i32,
    pub message_digest: &'a str,
    pub region_code: i32,
}

pub fn insert(conn: &mut PgConnection, new_order: NewOrder) -> QueryResult<Order> {
    diesel::insert_into(orders::table)
        .values(&new_order)
        .get_result(conn)
}

pub fn by_uuid(conn: &mut PgConnection, uuid: &str) -> QueryResult<Option<Order>> {
    orders::table
        .filter(orders::uuid.eq(uuid))
        .first(conn)
        .optional()
}

pub fn by_id(conn: &mut PgConnection, id: i64) -> QueryResult<Option<Order>> {
    orders::table.find(id).first(conn).optional()
}

pub fn by_tx_seq_num(conn: &mut PgConnection, tx_seq_num: i64) -> QueryResult<Option<Order>> {
    orders::table
        .filter(orders::tx_seq_num.eq(tx_seq_num))
        .first(conn)
        .optional()
}

/// Next value for `tx_seq_num`: one past the current maximum across all orders.
pub fn next_tx_seq_num(conn: &mut PgConnection) -> QueryResult<i64> {
    let max: Option<i64> = orders::table
        .select(diesel::dsl::max(orders::tx_seq_num))
        .first(conn)?;
    Ok(max.unwrap_or(0) + 1)
}

pub fn set_status(conn: &mut PgConnection, id: i64, status: OrderStatus) -> QueryResult<usize> {
    diesel::update(orders::table.find(id))
        .set(orders::status.eq(status))
        .execute(conn)
}

pub fn set_cancelled(conn: &mut PgConnection, id: i64) -> QueryResult<usize> {
    diesel::update(orders::table.find(id))
        .set((
            orders::status.eq(OrderStatus::Cancelled),
            orders::cancelled_at.eq(OffsetDateTime::now_utc()),
        ))
        .execute(conn)
}

pub fn set_expired(conn: &mut PgConnection, id: i64) -> QueryResult<usize> {
    diesel::update(orders::table.find(id))
        .set(orders::status.eq(OrderStatus::Expired))
        .execute(conn)
}

/// Assigns `tx_seq_num`, flips the order to *transmitting* and stamps
/// `started_transmission_at`. Must run inside the transaction that rereads
/// the order's status to preserve the per-channel single-flight invariant.
pub fn start_transmission(
    conn: &mut PgConnection,
    id: i64,
    tx_seq_num: i64,
) -> QueryResult<usize> {
    diesel::update(orders::table.find(id))
        .set((
            orders::status.eq(OrderStatus::Transmitting),
            orders::tx_seq_num.eq(tx_seq_num),
            orders::started_transmission_at.eq(OffsetDateTime::now_utc()),
        ))
        .execute(conn)
}

/// Re-enters *transmitting* for a retransmission: no new `tx_seq_num` is
/// assigned, the existing one is kept.
pub fn resume_transmission(conn: &mut PgConnection, id: i64) -> QueryResult<usize> {
    diesel::update(orders::table.find(id))
        .set(orders::status.eq(OrderStatus::Transmitting))
        .execute(conn)
}

pub fn set_confirming(conn: &mut PgConnection, id: i64) -> QueryResult<usize> {
    diesel::update(orders::table.find(id))
        .set(orders::status.eq(OrderStatus::Confirming))
        .execute(conn)
}

pub fn set_sent(conn: &mut PgConnection, id: i64) -> QueryResult<usize> {
    diesel::update(orders::table.find(id))
        .set(orders::status.eq(OrderStatus::Sent))
        .execute(conn)
}

pub fn set_received(conn: &mut PgConnection, id: i64) -> QueryResult<usize> {
    diesel::update(orders::table.find(id))
        .set(orders::status.eq(OrderStatus::Received))
        .execute(conn)
}

/// Stamps `ended_transmission_at` if it is not already set. Idempotent.
pub fn mark_transmission_ended(conn: &mut PgConnection, id: i64) -> QueryResult<usize> {
    diesel::update(
        orders::table
            .find(id)
            .filter(orders::ended_transmission_at.is_null()),
    )
    .set(orders::ended_transmission_at.eq(OffsetDateTime::now_utc()))
    .execute(conn)
}

pub fn update_bid_fields(
    conn: &mut PgConnection,
    id: i64,
    bid: i64,
    unpaid_bid: i64,
    bid_per_byte: f64,
) -> QueryResult<usize> {
    diesel::update(orders::table.find(id))
        .set((
            orders::bid.eq(bid),
            orders::unpaid_bid.eq(unpaid_bid),
            orders::bid_per_byte.eq(bid_per_byte),
        ))
        .execute(conn)
}

/// The order currently in *transmitting* on `channel`, if any.
pub fn transmitting_on_channel(conn: &mut PgConnection, channel: i32) -> QueryResult<Option<Order>> {
    orders::table
        .filter(orders::channel.eq(channel))
        .filter(orders::status.eq(OrderStatus::Transmitting))
        .first(conn)
        .optional()
}

/// The paid order on `channel` with the largest `bid_per_byte`.
pub fn next_paid_on_channel(conn: &mut PgConnection, channel: i32) -> QueryResult<Option<Order>> {
    orders::table
        .filter(orders::channel.eq(channel))
        .filter(orders::status.eq(OrderStatus::Paid))
        .order(orders::bid_per_byte.desc())
        .first(conn)
        .optional()
}

pub fn all_channels(conn: &mut PgConnection) -> QueryResult<Vec<i32>> {
    orders::table
        .select(orders::channel)
        .distinct()
        .load(conn)
}

/// Orders in *transmitting* or *confirming*, the retransmission controller's scan set.
pub fn in_flight(conn: &mut PgConnection) -> QueryResult<Vec<Order>> {
    orders::table
        .filter(
            orders::status
                .eq(OrderStatus::Transmitting)
                .or(orders::status.eq(OrderStatus::Confirming)),
        )
        .load(conn)
}

/// `pending`/`paid` queues: filtered and sorted by `created_at` (spec.md §6;
/// `before`/`after` bound the same time field they sort by).
pub fn by_status(
    conn: &mut PgConnection,
    status: OrderStatus,
    channel: Option<i32>,
    limit: i64,
    before: OffsetDateTime,
    after: OffsetDateTime,
) -> QueryResult<Vec<Order>> {
    let mut query = orders::table
        .filter(orders::status.eq(status))
        .filter(orders::created_at.lt(before))
        .filter(orders::created_at.gt(after))
        .into_boxed();
    if let Some(channel) = channel {
        query = query.filter(orders::channel.eq(channel));
    }
    query
        .order(orders::created_at.desc())
        .limit(limit)
        .load(conn)
}

/// `queued` = {paid, transmitting, confirming}, sorted by `bid_per_byte desc`
/// but windowed on `created_at` like the original queue.
pub fn queued(
    conn: &mut PgConnection,
    channel: Option<i32>,
    limit: i64,
    before: OffsetDateTime,
    after: OffsetDateTime,
) -> QueryResult<Vec<Order>> {
    let mut query = orders::table
        .filter(
            orders::status
                .eq(OrderStatus::Paid)
                .or(orders::status.eq(OrderStatus::Transmitting))
                .or(orders::status.eq(OrderStatus::Confirming)),
        )
        .filter(orders::created_at.lt(before))
        .filter(orders::created_at.gt(after))
        .into_boxed();
    if let Some(channel) = channel {
        query = query.filter(orders::channel.eq(channel));
    }
    query
        .order(orders::bid_per_byte.desc())
        .limit(limit)
        .load(conn)
}

/// Legacy `sent` queue: any order that has finished transmitting, i.e. both
/// *sent* and *received* orders, kept for backward compatibility.
pub fn sent_legacy(
    conn: &mut PgConnection,
    channel: Option<i32>,
    limit: i64,
    before: OffsetDateTime,
    after: OffsetDateTime,
) -> QueryResult<Vec<Order>> {
    let mut query = orders::table
        .filter(orders::ended_transmission_at.is_not_null())
        .filter(orders::ended_transmission_at.lt(before))
        .filter(orders::ended_transmission_at.gt(after))
        .into_boxed();
    if let Some(channel) = channel {
        query = query.filter(orders::channel.eq(channel));
    }
    query
        .order(orders::ended_transmission_at.desc())
        .limit(limit)
        .load(conn)
}

/// `rx-pending` = status=sent, windowed/sorted by `ended_transmission_at`
/// like `sent`/`received` rather than `by_status`'s `created_at`.
pub fn rx_pending(
    conn: &mut PgConnection,
    channel: Option<i32>,
    limit: i64,
    before: OffsetDateTime,
    after: OffsetDateTime,
) -> QueryResult<Vec<Order>> {
    let mut query = orders::table
        .filter(orders::status.eq(OrderStatus::Sent))
        .filter(orders::ended_transmission_at.lt(before))
        .filter(orders::ended_transmission_at.gt(after))
        .into_boxed();
    if let Some(channel) = channel {
        query = query.filter(orders::channel.eq(channel));
    }
    query
        .order(orders::ended_transmission_at.desc())
        .limit(limit)
        .load(conn)
}

/// Single-status fetch sorted by `started_transmission_at desc`, used for the
/// `transmitting`/`confirming`/`retransmitting` queues (spec.md §6).
pub fn by_status_started(
    conn: &mut PgConnection,
    status: OrderStatus,
    channel: Option<i32>,
    limit: i64,
    before: OffsetDateTime,
    after: OffsetDateTime,
) -> QueryResult<Vec<Order>> {
    let mut query = orders::table
        .filter(orders::status.eq(status))
        .filter(orders::started_transmission_at.lt(before))
        .filter(orders::started_transmission_at.gt(after))
        .into_boxed();
    if let Some(channel) = channel {
        query = query.filter(orders::channel.eq(channel));
    }
    query
        .order(orders::started_transmission_at.desc())
        .limit(limit)
        .load(conn)
}

/// `received`, sorted by `ended_transmission_at desc` like `sent`/`rx-pending`.
pub fn received(
    conn: &mut PgConnection,
    channel: Option<i32>,
    limit: i64,
    before: OffsetDateTime,
    after: OffsetDateTime,
) -> QueryResult<Vec<Order>> {
    let mut query = orders::table
        .filter(orders::status.eq(OrderStatus::Received))
        .filter(orders::ended_transmission_at.lt(before))
        .filter(orders::ended_transmission_at.gt(after))
        .into_boxed();
    if let Some(channel) = channel {
        query = query.filter(orders::channel.eq(channel));
    }
    query
        .order(orders::ended_transmission_at.desc())
        .limit(limit)
        .load(conn)
}

pub fn set_region_code(conn: &mut PgConnection, id: i64, region_code: i32) -> QueryResult<usize> {
    diesel::update(orders::table.find(id))
        .set(orders::region_code.eq(region_code))
        .execute(conn)
}

/// Orders with a pending `TxRetry`, i.e. the `retransmitting` queue.
pub fn retransmitting(
    conn: &mut PgConnection,
    channel: Option<i32>,
    limit: i64,
    before: OffsetDateTime,
    after: OffsetDateTime,
) -> QueryResult<Vec<Order>> {
    use crate::schema::tx_retries;

    let mut query = orders::table
        .inner_join(tx_retries::table.on(tx_retries::order_id.eq(orders::id)))
        .select(orders::all_columns)
        .filter(orders::started_transmission_at.lt(before))
        .filter(orders::started_transmission_at.gt(after))
        .into_boxed();
    if let Some(channel) = channel {
        query = query.filter(orders::channel.eq(channel));
    }
    query
        .order(orders::started_transmission_at.desc())
        .limit(limit)
        .load(conn)
}

/// Pending orders older than `max_age` (the housekeeper's expiry sweep).
pub fn pending_older_than(
    conn: &mut PgConnection,
    cutoff: OffsetDateTime,
) -> QueryResult<Vec<Order>> {
    orders::table
        .filter(orders::status.eq(OrderStatus::Pending))
        .filter(orders::created_at.lt(cutoff))
        .load(conn)
}

/// Orders whose payload retention window (based on `ended_transmission_at`) has elapsed.
pub fn ended_before(conn: &mut PgConnection, cutoff: OffsetDateTime) -> QueryResult<Vec<Order>> {
    orders::table
        .filter(orders::ended_transmission_at.lt(cutoff))
        .load(conn)
}
