//! Persistence for `TxConfirmation` and `RxConfirmation` rows.
//!
//! Both tables share the same `(order_id, region_id, presumed, created_at)`
//! shape; the confirmation kind is threaded through so call sites stay
//! explicit about which acknowledgement they are recording.

use crate::schema::rx_confirmations;
use crate::schema::tx_confirmations;
use diesel::prelude::*;
use diesel::PgConnection;
use diesel::QueryResult;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Tx,
    Rx,
}

#[derive(Debug, Clone, Queryable)]
pub struct Confirmation {
    pub id: i64,
    pub order_id: i64,
    pub region_id: i32,
    pub presumed: bool,
    pub created_at: OffsetDateTime,
}

/// Inserts a confirmation for `(order_id, region_id)` unless one already exists.
/// Returns `true` if a row was inserted.
pub fn append_if_absent(
    conn: &mut PgConnection,
    kind: Kind,
    order_id: i64,
    region_id: i32,
    presumed: bool,
) -> QueryResult<bool> {
    let inserted = match kind {
        Kind::Tx => diesel::insert_into(tx_confirmations::table)
            .values((
                tx_confirmations::order_id.eq(order_id),
                tx_confirmations::region_id.eq(region_id),
                tx_confirmations::presumed.eq(presumed),
            ))
            .on_conflict_do_nothing()
            .execute(conn)?,
        Kind::Rx => diesel::insert_into(rx_confirmations::table)
            .values((
                rx_confirmations::order_id.eq(order_id),
                rx_confirmations::region_id.eq(region_id),
                rx_confirmations::presumed.eq(presumed),
            ))
            .on_conflict_do_nothing()
            .execute(conn)?,
    };
    Ok(inserted > 0)
}

pub fn region_ids_for_order(
    conn: &mut PgConnection,
    kind: Kind,
    order_id: i64,
) -> QueryResult<Vec<i32>> {
    match kind {
        Kind::Tx => tx_confirmations::table
            .filter(tx_confirmations::order_id.eq(order_id))
            .select(tx_confirmations::region_id)
            .load(conn),
        Kind::Rx => rx_confirmations::table
            .filter(rx_confirmations::order_id.eq(order_id))
            .select(rx_confirmations::region_id)
            .load(conn),
    }
}

/// Most recent `created_at` among this order's Tx confirmations, if any.
pub fn last_tx_confirmation_at(
    conn: &mut PgConnection,
    order_id: i64,
) -> QueryResult<Option<OffsetDateTime>> {
    tx_confirmations::table
        .filter(tx_confirmations::order_id.eq(order_id))
        .select(diesel::dsl::max(tx_confirmations::created_at))
        .first(conn)
}
