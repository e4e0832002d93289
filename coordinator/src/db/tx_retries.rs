//! Persistence for `TxRetry` rows, the retransmission controller's bookkeeping.

use crate::schema::tx_retries;
use diesel::prelude::*;
use diesel::PgConnection;
use diesel::QueryResult;
use time::OffsetDateTime;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = tx_retries)]
pub struct TxRetry {
    pub id: i64,
    pub order_id: i64,
    pub region_code: i32,
    pub retry_count: i32,
    pub last_attempt: Option<OffsetDateTime>,
    pub pending: bool,
    pub created_at: OffsetDateTime,
}

pub fn for_order(conn: &mut PgConnection, order_id: i64) -> QueryResult<Option<TxRetry>> {
    tx_retries::table
        .filter(tx_retries::order_id.eq(order_id))
        .first(conn)
        .optional()
}

/// Inserts a `TxRetry` for `order_id`, or updates its `region_code` if one
/// already exists.
pub fn upsert_region_code(
    conn: &mut PgConnection,
    order_id: i64,
    region_code: i32,
) -> QueryResult<usize> {
    diesel::insert_into(tx_retries::table)
        .values((
            tx_retries::order_id.eq(order_id),
            tx_retries::region_code.eq(region_code),
            tx_retries::pending.eq(true),
        ))
        .on_conflict(tx_retries::order_id)
        .do_update()
        .set((
            tx_retries::region_code.eq(region_code),
            tx_retries::pending.eq(true),
        ))
        .execute(conn)
}

/// The pending `TxRetry` on `channel` whose order has the largest `bid_per_byte`.
pub fn next_pending_on_channel(
    conn: &mut PgConnection,
    channel: i32,
) -> QueryResult<Option<(TxRetry, crate::db::orders::Order)>> {
    use crate::schema::orders;

    tx_retries::table
        .inner_join(orders::table.on(orders::id.eq(tx_retries::order_id)))
        .filter(orders::channel.eq(channel))
        .filter(tx_retries::pending.eq(true))
        .order(orders::bid_per_byte.desc())
        .select((tx_retries::all_columns, orders::all_columns))
        .first(conn)
        .optional()
}

pub fn mark_attempted(conn: &mut PgConnection, order_id: i64) -> QueryResult<usize> {
    diesel::update(tx_retries::table.filter(tx_retries::order_id.eq(order_id)))
        .set((
            tx_retries::retry_count.eq(tx_retries::retry_count + 1),
            tx_retries::last_attempt.eq(OffsetDateTime::now_utc()),
            tx_retries::pending.eq(false),
        ))
        .execute(conn)
}

pub fn delete_for_order(conn: &mut PgConnection, order_id: i64) -> QueryResult<usize> {
    diesel::delete(tx_retries::table.filter(tx_retries::order_id.eq(order_id))).execute(conn)
}

pub fn exists_any(conn: &mut PgConnection) -> QueryResult<bool> {
    let count: i64 = tx_retries::table.count().get_result(conn)?;
    Ok(count > 0)
}
