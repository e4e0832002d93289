//! Rust-side mirrors of the `order_status` and `invoice_status` Postgres
//! enums declared in the baseline migration.

use crate::schema::sql_types::InvoiceStatusType;
use crate::schema::sql_types::OrderStatusType;
use diesel::deserialize::FromSql;
use diesel::deserialize::FromSqlRow;
use diesel::expression::AsExpression;
use diesel::pg::Pg;
use diesel::pg::PgValue;
use diesel::serialize::IsNull;
use diesel::serialize::Output;
use diesel::serialize::ToSql;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromSqlRow, AsExpression)]
#[diesel(sql_type = OrderStatusType)]
pub enum OrderStatus {
    Pending,
    Paid,
    Transmitting,
    Confirming,
    Sent,
    Received,
    Cancelled,
    Expired,
}

impl ToSql<OrderStatusType, Pg> for OrderStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> diesel::serialize::Result {
        let label: &str = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Transmitting => "transmitting",
            OrderStatus::Confirming => "confirming",
            OrderStatus::Sent => "sent",
            OrderStatus::Received => "received",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Expired => "expired",
        };
        out.write_all(label.as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<OrderStatusType, Pg> for OrderStatus {
    fn from_sql(bytes: PgValue<'_>) -> diesel::deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"pending" => Ok(OrderStatus::Pending),
            b"paid" => Ok(OrderStatus::Paid),
            b"transmitting" => Ok(OrderStatus::Transmitting),
            b"confirming" => Ok(OrderStatus::Confirming),
            b"sent" => Ok(OrderStatus::Sent),
            b"received" => Ok(OrderStatus::Received),
            b"cancelled" => Ok(OrderStatus::Cancelled),
            b"expired" => Ok(OrderStatus::Expired),
            other => Err(format!(
                "unrecognized order_status variant: {}",
                String::from_utf8_lossy(other)
            )
            .into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromSqlRow, AsExpression)]
#[diesel(sql_type = InvoiceStatusType)]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Expired,
}

impl ToSql<InvoiceStatusType, Pg> for InvoiceStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> diesel::serialize::Result {
        let label: &str = match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Expired => "expired",
        };
        out.write_all(label.as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<InvoiceStatusType, Pg> for InvoiceStatus {
    fn from_sql(bytes: PgValue<'_>) -> diesel::deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"pending" => Ok(InvoiceStatus::Pending),
            b"paid" => Ok(InvoiceStatus::Paid),
            b"expired" => Ok(InvoiceStatus::Expired),
            other => Err(format!(
                "unrecognized invoice_status variant: {}",
                String::from_utf8_lossy(other)
            )
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_variant_count_matches_migration() {
        let all = [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Transmitting,
            OrderStatus::Confirming,
            OrderStatus::Sent,
            OrderStatus::Received,
            OrderStatus::Cancelled,
            OrderStatus::Expired,
        ];
        assert_eq!(all.len(), 8);
    }
}
