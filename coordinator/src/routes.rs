//! HTTP request surface (spec.md §6): order upload/lookup/cancellation/bump,
//! the `/orders/<state>` listings, message retrieval, Tx/Rx confirmation
//! intake, and the Lightning invoice webhook callback. Request/response
//! shapes are explicit per-endpoint structs (`crate::requests`) rather than a
//! generic parameter-coercion layer, per spec.md §9 "Design Notes". Grounded
//! on `original_source/server/orders.py`, `invoices.py` and `schemas.py`; the
//! `Router`/`with_state` wiring follows the teacher's `coordinator/src/routes.rs`.

use crate::app_state::Engine;
use crate::db::orders;
use crate::db::orders::Order;
use crate::db::OrderStatus;
use crate::error::AppError;
use crate::invoice;
use crate::lifecycle;
use crate::requests::AdminOrderView;
use crate::requests::AuthParams;
use crate::requests::BumpForm;
use crate::requests::BumpResponse;
use crate::requests::MessageResponse;
use crate::requests::OrderView;
use crate::requests::OrdersQuery;
use crate::requests::RxConfirmationForm;
use crate::requests::TxConfirmationForm;
use crate::requests::UploadResponse;
use crate::scheduler;
use axum::extract::Form;
use axum::extract::Multipart;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use axum::Json;
use axum::Router;
use diesel::PgConnection;
use queue_commons::bidding;
use queue_commons::channels;
use queue_commons::channels::ChannelInfo;
use queue_commons::regions;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use tracing::instrument;

pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/order", post(upload_order))
        .route("/admin/order", post(upload_order_admin))
        .route("/order/:uuid", get(get_order).delete(delete_order))
        .route(
            "/admin/order/:uuid",
            get(get_order_admin).delete(delete_order_admin),
        )
        .route("/order/:uuid/bump", post(bump_order))
        .route("/admin/order/:uuid/bump", post(bump_order_admin))
        .route("/orders/:state", get(list_orders))
        .route("/admin/orders/:state", get(list_orders_admin))
        .route("/message/:tx_seq_num", get(get_message))
        .route("/admin/message/:tx_seq_num", get(get_message_admin))
        .route("/order/tx/:tx_seq_num", post(post_tx_confirmation))
        .route("/order/rx/:tx_seq_num", post(post_rx_confirmation))
        .route("/callback/:lid/:token", post(invoice_callback))
        .route("/metrics", get(get_metrics))
        .with_state(engine)
}

fn channel_of(order: &Order) -> Result<&'static ChannelInfo, AppError> {
    channels::channel_info(order.channel).ok_or(AppError::OrderChannelUnauthorizedOp {
        channel: order.channel,
    })
}

fn header_auth_token(headers: &HeaderMap) -> Option<&str> {
    headers.get("x-auth-token").and_then(|v| v.to_str().ok())
}

fn require_order_auth(engine: &Engine, order: &Order, token: &str) -> Result<(), AppError> {
    if invoice::verify_order_auth_token(&engine.settings.user_auth_key, &order.uuid, token) {
        Ok(())
    } else {
        Err(AppError::InvalidAuthToken)
    }
}

// --- POST /order, /admin/order -------------------------------------------------

#[instrument(skip(engine, multipart), err(Debug))]
pub async fn upload_order(
    State(engine): State<Arc<Engine>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    upload(&engine, multipart, false).await
}

#[instrument(skip(engine, multipart), err(Debug))]
pub async fn upload_order_admin(
    State(engine): State<Arc<Engine>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    upload(&engine, multipart, true).await
}

#[derive(Debug, Default)]
struct UploadFields {
    bid: Option<u64>,
    message: Option<String>,
    file: Option<Vec<u8>>,
    regions: Option<String>,
    channel: Option<i32>,
}

async fn parse_upload_multipart(mut multipart: Multipart) -> Result<UploadFields, AppError> {
    let mut fields = UploadFields::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "bid" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("invalid bid field: {e}")))?;
                let bid: u64 = text
                    .parse()
                    .map_err(|_| AppError::BadRequest("bid must be a non-negative integer".to_string()))?;
                fields.bid = Some(bid);
            }
            "message" => {
                fields.message = Some(field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("invalid message field: {e}"))
                })?);
            }
            "file" => {
                fields.file = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(format!("invalid file field: {e}")))?
                        .to_vec(),
                );
            }
            "regions" => {
                fields.regions = Some(field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("invalid regions field: {e}"))
                })?);
            }
            "channel" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("invalid channel field: {e}")))?;
                fields.channel = Some(
                    text.parse()
                        .map_err(|_| AppError::BadRequest("channel must be an integer".to_string()))?,
                );
            }
            _ => {}
        }
    }
    Ok(fields)
}

fn parse_region_code(regions_json: &str) -> Result<i32, AppError> {
    let numbers: Vec<u8> = serde_json::from_str(regions_json)
        .map_err(|_| AppError::BadRequest("regions must be a JSON array of integers".to_string()))?;
    Ok(regions::region_numbers_to_code(&numbers) as i32)
}

/// Shared implementation of the upload endpoint for both the user and admin
/// surfaces (spec.md §6, `original_source/server/orders.py::OrderUploadResource`).
async fn upload(
    engine: &Engine,
    multipart: Multipart,
    admin: bool,
) -> Result<Json<UploadResponse>, AppError> {
    let fields = parse_upload_multipart(multipart).await?;

    let channel_id = fields.channel.unwrap_or(channels::TRANSMISSIONS);
    let channel = channels::channel_info(channel_id).ok_or(AppError::OrderChannelUnauthorizedOp {
        channel: channel_id,
    })?;
    if !admin && !channel.user_permissions.post {
        return Err(AppError::OrderChannelUnauthorizedOp { channel: channel_id });
    }

    let has_message = fields.message.is_some();
    let has_file = fields.file.is_some();
    if has_message && has_file {
        return Err(AppError::BadRequest(
            "choose either message or file, not both".to_string(),
        ));
    }
    let payload: Vec<u8> = match (fields.message, fields.file) {
        (Some(message), None) => message.into_bytes(),
        (None, Some(file)) => file,
        _ => return Err(AppError::MessageMissing),
    };

    let uuid = uuid::Uuid::new_v4().to_string();
    engine.message_store.write(&uuid, &payload)?;

    let message_size = payload.len() as u32;
    if message_size < crate::settings::MIN_MESSAGE_SIZE {
        engine.message_store.delete(&uuid)?;
        return Err(AppError::MessageFileTooSmall {
            min_size: crate::settings::MIN_MESSAGE_SIZE,
        });
    }
    if message_size > channel.max_msg_size {
        engine.message_store.delete(&uuid)?;
        return Err(AppError::MessageFileTooLarge {
            max_size_mb: channel.max_msg_size / (1 << 20),
        });
    }

    let requires_payment = channel.requires_payment();
    let bid = if requires_payment { fields.bid.unwrap_or(0) } else { 0 };
    if requires_payment && !bidding::validate_bid(message_size, bid, engine.settings.min_per_byte_bid, engine.settings.min_bid)
    {
        engine.message_store.delete(&uuid)?;
        return Err(AppError::BidTooSmall {
            min_bid: bidding::min_bid(message_size, engine.settings.min_per_byte_bid, engine.settings.min_bid),
        });
    }

    let message_digest = engine.message_store.sha256_digest(&uuid)?;
    let starting_status = if requires_payment {
        OrderStatus::Pending
    } else {
        OrderStatus::Paid
    };

    let mut conn = engine.pool.get()?;
    let order = orders::insert(
        &mut conn,
        orders::NewOrder {
            uuid: &uuid,
            channel: channel_id,
            status: starting_status,
            message_size: message_size as i32,
            message_digest: &message_digest,
            region_code: 0,
        },
    )?;

    if let Some(regions_json) = &fields.regions {
        let region_code = parse_region_code(regions_json)?;
        orders::set_region_code(&mut conn, order.id, region_code)?;
    }

    let mut lightning_invoice: Option<Value> = None;
    if requires_payment {
        let invoice_row = invoice::new_invoice(
            &mut conn,
            engine.invoice_issuer.as_ref(),
            &engine.settings.callback_uri_root,
            &engine.settings.lightning_webhook_key,
            order.id,
            &order.uuid,
            &message_digest,
            bid as i64,
        )
        .await?;
        lifecycle::adjust_bids(&mut conn, &order)?;
        lightning_invoice = Some(
            serde_json::from_str(&invoice_row.invoice)
                .unwrap_or_else(|_| Value::String(invoice_row.invoice.clone())),
        );

        if engine.settings.force_payment {
            info!(uuid = %order.uuid, "force payment of the invoice");
            lifecycle::pay_invoice(&mut conn, &invoice_row)?;
            let refreshed = orders::by_id(&mut conn, order.id)?.expect("order just inserted");
            lifecycle::adjust_bids(&mut conn, &refreshed)?;
            lifecycle::maybe_mark_order_as_paid(
                &mut conn,
                &refreshed,
                engine.settings.min_per_byte_bid,
                engine.settings.min_bid,
            )?;
            drop(conn);
            scheduler::tx_start(engine, Some(channel_id))?;
        }
    } else {
        drop(conn);
        scheduler::tx_start(engine, Some(channel_id))?;
    }

    let auth_token = invoice::compute_order_auth_token(&engine.settings.user_auth_key, &order.uuid);
    Ok(Json(UploadResponse {
        uuid: order.uuid,
        auth_token,
        lightning_invoice,
    }))
}

// --- GET/DELETE /order/:uuid ----------------------------------------------------

pub async fn get_order(
    state: State<Arc<Engine>>,
    path: Path<String>,
    query: Query<AuthParams>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    get_order_impl(&state.0, path.0, query.0, &headers, false).await
}

pub async fn get_order_admin(
    state: State<Arc<Engine>>,
    path: Path<String>,
    query: Query<AuthParams>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    get_order_impl(&state.0, path.0, query.0, &headers, true).await
}

#[instrument(skip(engine, headers), err(Debug))]
async fn get_order_impl(
    engine: &Engine,
    uuid: String,
    query: AuthParams,
    headers: &HeaderMap,
    admin: bool,
) -> Result<Response, AppError> {
    let mut conn = engine.pool.get()?;
    let order = orders::by_uuid(&mut conn, &uuid)?.ok_or(AppError::OrderNotFound { uuid: uuid.clone() })?;
    let token = crate::requests::extract_auth_token(&AuthParams::default(), &query, header_auth_token(headers))?;
    require_order_auth(engine, &order, &token)?;

    if !admin {
        let channel = channel_of(&order)?;
        if !channel.user_permissions.get {
            return Err(AppError::OrderChannelUnauthorizedOp { channel: order.channel });
        }
    }

    if admin {
        Ok(Json(AdminOrderView::from(&order)).into_response())
    } else {
        Ok(Json(OrderView::from(&order)).into_response())
    }
}

pub async fn delete_order(
    state: State<Arc<Engine>>,
    path: Path<String>,
    query: Query<AuthParams>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, AppError> {
    delete_order_impl(&state.0, path.0, query.0, &headers, false).await
}

pub async fn delete_order_admin(
    state: State<Arc<Engine>>,
    path: Path<String>,
    query: Query<AuthParams>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, AppError> {
    delete_order_impl(&state.0, path.0, query.0, &headers, true).await
}

#[instrument(skip(engine, headers), err(Debug))]
async fn delete_order_impl(
    engine: &Engine,
    uuid: String,
    query: AuthParams,
    headers: &HeaderMap,
    admin: bool,
) -> Result<Json<MessageResponse>, AppError> {
    let mut conn = engine.pool.get()?;
    let order = orders::by_uuid(&mut conn, &uuid)?.ok_or(AppError::OrderNotFound { uuid: uuid.clone() })?;
    let token = crate::requests::extract_auth_token(&AuthParams::default(), &query, header_auth_token(headers))?;
    require_order_auth(engine, &order, &token)?;

    if !admin {
        let channel = channel_of(&order)?;
        if !channel.user_permissions.delete {
            return Err(AppError::OrderChannelUnauthorizedOp { channel: order.channel });
        }
    }

    lifecycle::cancel_order(&mut conn, &order, &engine.message_store)?;
    Ok(Json(MessageResponse {
        message: "order cancelled".to_string(),
    }))
}

// --- POST /order/:uuid/bump ------------------------------------------------------

pub async fn bump_order(
    state: State<Arc<Engine>>,
    path: Path<String>,
    query: Query<AuthParams>,
    form: Form<BumpForm>,
) -> Result<Json<BumpResponse>, AppError> {
    bump_order_impl(&state.0, path.0, query.0, form.0).await
}

pub async fn bump_order_admin(
    state: State<Arc<Engine>>,
    path: Path<String>,
    query: Query<AuthParams>,
    form: Form<BumpForm>,
) -> Result<Json<BumpResponse>, AppError> {
    bump_order_impl(&state.0, path.0, query.0, form.0).await
}

#[instrument(skip(engine, query, form), err(Debug))]
async fn bump_order_impl(
    engine: &Engine,
    uuid: String,
    query: AuthParams,
    form: BumpForm,
) -> Result<Json<BumpResponse>, AppError> {
    let mut conn = engine.pool.get()?;
    let order = orders::by_uuid(&mut conn, &uuid)?.ok_or(AppError::OrderNotFound { uuid: uuid.clone() })?;
    let token = crate::requests::extract_auth_token(&form.auth, &query, None)?;
    require_order_auth(engine, &order, &token)?;

    let channel = channel_of(&order)?;
    if !channel.requires_payment() {
        return Err(AppError::OrderChannelUnauthorizedOp { channel: order.channel });
    }
    lifecycle::ensure_bumpable(&order)?;

    let invoice_row = invoice::new_invoice(
        &mut conn,
        engine.invoice_issuer.as_ref(),
        &engine.settings.callback_uri_root,
        &engine.settings.lightning_webhook_key,
        order.id,
        &order.uuid,
        &order.message_digest,
        form.bid_increase as i64,
    )
    .await?;
    lifecycle::adjust_bids(&mut conn, &order)?;

    let auth_token = invoice::compute_order_auth_token(&engine.settings.user_auth_key, &order.uuid);
    let lightning_invoice = serde_json::from_str(&invoice_row.invoice)
        .unwrap_or_else(|_| Value::String(invoice_row.invoice.clone()));
    Ok(Json(BumpResponse {
        auth_token,
        lightning_invoice,
    }))
}

// --- GET /orders/:state -----------------------------------------------------------

pub async fn list_orders(
    state: State<Arc<Engine>>,
    path: Path<String>,
    query: Query<OrdersQuery>,
) -> Result<Json<Vec<OrderView>>, AppError> {
    list_orders_impl(&state.0, path.0, query.0, false).await
}

pub async fn list_orders_admin(
    state: State<Arc<Engine>>,
    path: Path<String>,
    query: Query<OrdersQuery>,
) -> Result<Json<Vec<OrderView>>, AppError> {
    list_orders_impl(&state.0, path.0, query.0, true).await
}

#[instrument(skip(engine, query), err(Debug))]
async fn list_orders_impl(
    engine: &Engine,
    state: String,
    query: OrdersQuery,
    admin: bool,
) -> Result<Json<Vec<OrderView>>, AppError> {
    let mut resolved = query.resolve()?;

    // A non-admin caller that omits `channel` must not see every channel's
    // queue merged together (some channels have `get: false`); default to
    // the transmissions channel, the same default `upload` uses.
    if !admin {
        let channel_id = resolved.channel.unwrap_or(channels::TRANSMISSIONS);
        let channel = channels::channel_info(channel_id)
            .ok_or(AppError::OrderChannelUnauthorizedOp { channel: channel_id })?;
        if !channel.user_permissions.get {
            return Err(AppError::OrderChannelUnauthorizedOp { channel: channel_id });
        }
        resolved.channel = Some(channel_id);
    }

    let mut conn = engine.pool.get()?;
    let (before, after) = (resolved.before, resolved.after);
    let orders = match state.as_str() {
        "pending" => orders::by_status(&mut conn, OrderStatus::Pending, resolved.channel, resolved.limit, before, after)?,
        "paid" => orders::by_status(&mut conn, OrderStatus::Paid, resolved.channel, resolved.limit, before, after)?,
        "transmitting" => orders::by_status_started(
            &mut conn,
            OrderStatus::Transmitting,
            resolved.channel,
            resolved.limit,
            before,
            after,
        )?,
        "confirming" => orders::by_status_started(
            &mut conn,
            OrderStatus::Confirming,
            resolved.channel,
            resolved.limit,
            before,
            after,
        )?,
        "queued" => orders::queued(&mut conn, resolved.channel, resolved.limit, before, after)?,
        // Legacy `sent` queue includes both sent and received orders for
        // backward compatibility (spec.md §6, Open Question (i)).
        "sent" => orders::sent_legacy(&mut conn, resolved.channel, resolved.limit, before, after)?,
        "rx-pending" => orders::rx_pending(&mut conn, resolved.channel, resolved.limit, before, after)?,
        "received" => orders::received(&mut conn, resolved.channel, resolved.limit, before, after)?,
        "retransmitting" => orders::retransmitting(&mut conn, resolved.channel, resolved.limit, before, after)?,
        other => {
            return Err(AppError::UnknownFetchState {
                state: other.to_string(),
            })
        }
    };

    Ok(Json(orders.iter().map(OrderView::from).collect()))
}

// --- GET /message/:tx_seq_num -------------------------------------------------------

pub async fn get_message(
    state: State<Arc<Engine>>,
    path: Path<i64>,
) -> Result<Response, AppError> {
    get_message_impl(&state.0, path.0, false).await
}

pub async fn get_message_admin(
    state: State<Arc<Engine>>,
    path: Path<i64>,
) -> Result<Response, AppError> {
    get_message_impl(&state.0, path.0, true).await
}

#[instrument(skip(engine), err(Debug))]
async fn get_message_impl(engine: &Engine, tx_seq_num: i64, admin: bool) -> Result<Response, AppError> {
    let mut conn = engine.pool.get()?;
    let order = orders::by_tx_seq_num(&mut conn, tx_seq_num)?
        .filter(|order| {
            matches!(
                order.status,
                OrderStatus::Sent | OrderStatus::Transmitting | OrderStatus::Confirming | OrderStatus::Received
            )
        })
        .ok_or(AppError::SequenceNumberNotFound { tx_seq_num })?;

    if !admin {
        let channel = channel_of(&order)?;
        if !channel.user_permissions.get {
            return Err(AppError::OrderChannelUnauthorizedOp { channel: order.channel });
        }
    }

    let payload = engine.message_store.read(&order.uuid)?;
    let filename = format!("attachment; filename=\"{}\"", order.uuid);
    Ok((
        StatusCode::OK,
        [
            ("content-type", "application/octet-stream"),
            ("content-disposition", filename.as_str()),
        ],
        payload,
    )
        .into_response())
}

// --- POST /order/tx/:tx_seq_num, /order/rx/:tx_seq_num ------------------------------

#[instrument(skip(engine, form), err(Debug))]
pub async fn post_tx_confirmation(
    State(engine): State<Arc<Engine>>,
    Path(tx_seq_num): Path<i64>,
    Form(form): Form<TxConfirmationForm>,
) -> Result<Json<MessageResponse>, AppError> {
    let region_numbers: Vec<u8> = serde_json::from_str(&form.regions)
        .map_err(|_| AppError::BadRequest("regions must be a JSON array of integers".to_string()))?;

    let mut conn = engine.pool.get()?;
    let order = orders::by_tx_seq_num(&mut conn, tx_seq_num)?
        .ok_or(AppError::SequenceNumberNotFound { tx_seq_num })?;
    let last_status = order.status;

    lifecycle::record_tx_confirmations(&mut conn, &order, &region_numbers)?;
    let refreshed = orders::by_id(&mut conn, order.id)?.expect("order just confirmed");

    finish_confirmation(&engine, &mut conn, &refreshed, last_status)?;

    Ok(Json(MessageResponse {
        message: format!("transmission confirmed for regions {}", form.regions),
    }))
}

#[instrument(skip(engine, form), err(Debug))]
pub async fn post_rx_confirmation(
    State(engine): State<Arc<Engine>>,
    Path(tx_seq_num): Path<i64>,
    Form(form): Form<RxConfirmationForm>,
) -> Result<Json<MessageResponse>, AppError> {
    let mut conn = engine.pool.get()?;
    let order = orders::by_tx_seq_num(&mut conn, tx_seq_num)?
        .ok_or(AppError::SequenceNumberNotFound { tx_seq_num })?;
    let last_status = order.status;

    lifecycle::record_rx_confirmation(&mut conn, &order, form.region)?;
    let refreshed = orders::by_id(&mut conn, order.id)?.expect("order just confirmed");

    finish_confirmation(&engine, &mut conn, &refreshed, last_status)?;

    Ok(Json(MessageResponse {
        message: format!("reception confirmed for region {}", form.region),
    }))
}

/// Shared tail of the Tx/Rx confirmation handlers: ends the transmission if
/// the order reached *sent*/*received*, otherwise unblocks the channel if
/// this confirmation is what first moved the order from *transmitting* to
/// *confirming* (`original_source/server/orders.py::TxConfirmationResource`).
fn finish_confirmation(
    engine: &Engine,
    conn: &mut PgConnection,
    order: &Order,
    last_status: OrderStatus,
) -> Result<(), AppError> {
    if lifecycle::sent_or_received_criteria_met(conn, order)? {
        scheduler::tx_end(engine, order.id)
    } else if order.status == OrderStatus::Confirming && last_status == OrderStatus::Transmitting {
        scheduler::tx_start(engine, Some(order.channel))
    } else {
        Ok(())
    }
}

// --- POST /callback/:lid/:token ---------------------------------------------------

#[instrument(skip(engine), err(Debug))]
pub async fn invoice_callback(
    State(engine): State<Arc<Engine>>,
    Path((lid, token)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, AppError> {
    let mut conn = engine.pool.get()?;
    let invoice_row = invoice::authenticate_webhook(&mut conn, &engine.settings.lightning_webhook_key, &lid, &token)?;

    lifecycle::pay_invoice(&mut conn, &invoice_row)?;
    let order = orders::by_id(&mut conn, invoice_row.order_id)?.ok_or(AppError::OrderNotFound {
        uuid: invoice_row.order_id.to_string(),
    })?;
    lifecycle::adjust_bids(&mut conn, &order)?;
    lifecycle::maybe_mark_order_as_paid(
        &mut conn,
        &order,
        engine.settings.min_per_byte_bid,
        engine.settings.min_bid,
    )?;
    drop(conn);
    scheduler::tx_start(&engine, Some(order.channel))?;

    Ok(Json(MessageResponse {
        message: format!("invoice {} paid", invoice_row.lid),
    }))
}

// --- GET /metrics ---------------------------------------------------------------

pub async fn get_metrics(State(engine): State<Arc<Engine>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        engine.metrics.encode(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_region_code_round_trips_region_numbers() {
        let code = parse_region_code("[0, 2]").unwrap();
        assert_eq!(code, 0b0000_0101);
    }

    #[test]
    fn parse_region_code_rejects_non_array_input() {
        assert!(parse_region_code("\"not an array\"").is_err());
    }
}
