//! Persistence for [`Invoice`] rows.

use crate::db::enums::InvoiceStatus;
use crate::schema::invoices;
use diesel::prelude::*;
use diesel::PgConnection;
use diesel::QueryResult;
use time::OffsetDateTime;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = invoices)]
pub struct Invoice {
    pub id: i64,
    pub order_id: i64,
    pub lid: String,
    pub invoice: String,
    pub amount: i64,
    pub status: InvoiceStatus,
    pub expires_at: OffsetDateTime,
    pub paid_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = invoices)]
pub struct NewInvoice<'a> {
    pub order_id: i64,
    pub lid: &'a str,
    pub invoice: &'a str,
    pub amount: i64,
    pub status: InvoiceStatus,
    pub expires_at: OffsetDateTime,
}

pub fn insert(conn: &mut PgConnection, new_invoice: NewInvoice) -> QueryResult<Invoice> {
    diesel::insert_into(invoices::table)
        .values(&new_invoice)
        .get_result(conn)
}

pub fn by_lid(conn: &mut PgConnection, lid: &str) -> QueryResult<Option<Invoice>> {
    invoices::table
        .filter(invoices::lid.eq(lid))
        .first(conn)
        .optional()
}

pub fn for_order(conn: &mut PgConnection, order_id: i64) -> QueryResult<Vec<Invoice>> {
    invoices::table
        .filter(invoices::order_id.eq(order_id))
        .load(conn)
}

pub fn mark_paid(conn: &mut PgConnection, id: i64) -> QueryResult<usize> {
    diesel::update(invoices::table.find(id))
        .set((
            invoices::status.eq(InvoiceStatus::Paid),
            invoices::paid_at.eq(OffsetDateTime::now_utc()),
        ))
        .execute(conn)
}

pub fn mark_expired(conn: &mut PgConnection, id: i64) -> QueryResult<usize> {
    diesel::update(invoices::table.find(id))
        .set(invoices::status.eq(InvoiceStatus::Expired))
        .execute(conn)
}

pub fn expired_pending(conn: &mut PgConnection, now: OffsetDateTime) -> QueryResult<Vec<Invoice>> {
    invoices::table
        .filter(invoices::status.eq(InvoiceStatus::Pending))
        .filter(invoices::expires_at.lt(now))
        .load(conn)
}

/// Sum of amounts for invoices in `status` belonging to `order_id`, in millisatoshis.
pub fn sum_amount_by_status(
    conn: &mut PgConnection,
    order_id: i64,
    status: InvoiceStatus,
) -> QueryResult<i64> {
    let sum: Option<i64> = invoices::table
        .filter(invoices::order_id.eq(order_id))
        .filter(invoices::status.eq(status))
        .select(diesel::dsl::sum(invoices::amount))
        .first(conn)?;
    Ok(sum.unwrap_or(0))
}

pub fn has_pending(conn: &mut PgConnection, order_id: i64) -> QueryResult<bool> {
    let count: i64 = invoices::table
        .filter(invoices::order_id.eq(order_id))
        .filter(invoices::status.eq(InvoiceStatus::Pending))
        .count()
        .get_result(conn)?;
    Ok(count > 0)
}
