//! Request/response DTOs for the HTTP surface (§6), validated per-endpoint
//! rather than through a generic parameter-coercion layer (spec.md §9
//! "Design Notes": "Dynamic parameter parsing → explicit request structs").

use crate::db::orders::Order;
use crate::error::AppError;
use queue_commons::regions;
use serde::Deserialize;
use serde::Serialize;
use time::serde::rfc3339;
use time::OffsetDateTime;

#[derive(Debug, Deserialize, Default)]
pub struct AuthParams {
    pub auth_token: Option<String>,
}

/// Finds the auth token in body, then query, then `X-Auth-Token` header, in
/// that order (spec.md §4.5).
pub fn extract_auth_token(
    body: &AuthParams,
    query: &AuthParams,
    header: Option<&str>,
) -> Result<String, AppError> {
    body.auth_token
        .clone()
        .or_else(|| query.auth_token.clone())
        .or_else(|| header.map(str::to_string))
        .ok_or(AppError::InvalidAuthToken)
}

#[derive(Debug, Deserialize)]
pub struct BumpForm {
    pub bid_increase: u64,
    #[serde(flatten)]
    pub auth: AuthParams,
}

#[derive(Debug, Deserialize)]
pub struct TxConfirmationForm {
    /// JSON-encoded array of region numbers.
    pub regions: String,
}

#[derive(Debug, Deserialize)]
pub struct RxConfirmationForm {
    pub region: i32,
}

/// `before`/`before_delta` and `after`/`after_delta` are mutually exclusive
/// per side (spec.md §9).
#[derive(Debug, Deserialize, Default)]
pub struct OrdersQuery {
    #[serde(default, with = "rfc3339::option")]
    pub before: Option<OffsetDateTime>,
    pub before_delta: Option<i64>,
    #[serde(default, with = "rfc3339::option")]
    pub after: Option<OffsetDateTime>,
    pub after_delta: Option<i64>,
    pub limit: Option<i64>,
    pub channel: Option<i32>,
}

pub struct ResolvedOrdersQuery {
    pub limit: i64,
    pub channel: Option<i32>,
    /// Exclusive upper bound on the state's time field. Defaults to a few
    /// seconds into the future, which effectively disables the filter.
    pub before: OffsetDateTime,
    /// Exclusive lower bound on the state's time field. Defaults to the
    /// lowest representable timestamp, which effectively disables the filter.
    pub after: OffsetDateTime,
}

impl OrdersQuery {
    pub fn resolve(&self) -> Result<ResolvedOrdersQuery, AppError> {
        if self.before.is_some() && self.before_delta.is_some() {
            return Err(AppError::InvalidDate);
        }
        if self.after.is_some() && self.after_delta.is_some() {
            return Err(AppError::InvalidDate);
        }
        let limit = self.limit.unwrap_or(crate::settings::DEFAULT_PAGE_LIMIT);
        if limit > crate::settings::MAX_PAGE_LIMIT {
            return Err(AppError::LimitTooLarge {
                max: crate::settings::MAX_PAGE_LIMIT as u32,
            });
        }

        let now = OffsetDateTime::now_utc();
        let before = match (self.before, self.before_delta) {
            (Some(before), _) => before,
            (None, Some(delta)) => now - time::Duration::seconds(delta),
            (None, None) => now + time::Duration::seconds(5),
        };
        let after = match (self.after, self.after_delta) {
            (Some(after), _) => after,
            (None, Some(delta)) => now - time::Duration::seconds(delta),
            (None, None) => OffsetDateTime::UNIX_EPOCH,
        };

        Ok(ResolvedOrdersQuery {
            limit,
            channel: self.channel,
            before,
            after,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    pub uuid: String,
    pub channel: i32,
    pub status: &'static str,
    pub bid: i64,
    pub unpaid_bid: i64,
    pub bid_per_byte: f64,
    pub message_size: i32,
    pub message_digest: String,
    pub regions: Vec<i32>,
    pub tx_seq_num: Option<i64>,
    #[serde(with = "rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "rfc3339::option")]
    pub cancelled_at: Option<OffsetDateTime>,
    #[serde(with = "rfc3339::option")]
    pub started_transmission_at: Option<OffsetDateTime>,
    #[serde(with = "rfc3339::option")]
    pub ended_transmission_at: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
pub struct AdminOrderView {
    pub id: i64,
    #[serde(flatten)]
    pub order: OrderView,
}

fn status_name(status: crate::db::OrderStatus) -> &'static str {
    use crate::db::OrderStatus::*;
    match status {
        Pending => "pending",
        Paid => "paid",
        Transmitting => "transmitting",
        Confirming => "confirming",
        Sent => "sent",
        Received => "received",
        Cancelled => "cancelled",
        Expired => "expired",
    }
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> OrderView {
        OrderView {
            uuid: order.uuid.clone(),
            channel: order.channel,
            status: status_name(order.status),
            bid: order.bid,
            unpaid_bid: order.unpaid_bid,
            bid_per_byte: order.bid_per_byte,
            message_size: order.message_size,
            message_digest: order.message_digest.clone(),
            regions: regions::code_to_region_ids(order.region_code as u32),
            tx_seq_num: order.tx_seq_num,
            created_at: order.created_at,
            cancelled_at: order.cancelled_at,
            started_transmission_at: order.started_transmission_at,
            ended_transmission_at: order.ended_transmission_at,
        }
    }
}

impl From<&Order> for AdminOrderView {
    fn from(order: &Order) -> AdminOrderView {
        AdminOrderView {
            id: order.id,
            order: OrderView::from(order),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub uuid: String,
    pub auth_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lightning_invoice: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct BumpResponse {
    pub auth_token: String,
    pub lightning_invoice: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn before_and_before_delta_together_are_rejected() {
        let query = OrdersQuery {
            before: Some(OffsetDateTime::now_utc()),
            before_delta: Some(60),
            ..Default::default()
        };
        assert!(matches!(query.resolve(), Err(AppError::InvalidDate)));
    }

    #[test]
    fn after_and_after_delta_together_are_rejected() {
        let query = OrdersQuery {
            after: Some(OffsetDateTime::now_utc()),
            after_delta: Some(60),
            ..Default::default()
        };
        assert!(matches!(query.resolve(), Err(AppError::InvalidDate)));
    }

    #[test]
    fn defaults_disable_the_time_window() {
        let resolved = OrdersQuery::default().resolve().unwrap();
        assert!(resolved.before > OffsetDateTime::now_utc());
        assert_eq!(resolved.after, OffsetDateTime::UNIX_EPOCH);
    }

    #[test]
    fn limit_over_the_maximum_is_rejected() {
        let query = OrdersQuery {
            limit: Some(crate::settings::MAX_PAGE_LIMIT + 1),
            ..Default::default()
        };
        assert!(matches!(query.resolve(), Err(AppError::LimitTooLarge { .. })));
    }
}
