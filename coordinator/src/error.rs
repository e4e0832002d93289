//! The satellite order-queue error catalog and its HTTP projection.
//!
//! Every client-facing failure carries a stable numeric `code` alongside the
//! `title`/`detail` pair rendered in the JSON body, mirroring the catalog the
//! Python coordinator this engine replaces has always shipped.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bid too small")]
    BidTooSmall { min_bid: u64 },
    #[error("message missing")]
    MessageMissing,
    #[error("message too small")]
    MessageFileTooSmall { min_size: u32 },
    #[error("message too large")]
    MessageFileTooLarge { max_size_mb: u32 },
    #[error("order not found")]
    OrderNotFound { uuid: String },
    #[error("invalid auth token")]
    InvalidAuthToken,
    #[error("unauthorized channel operation")]
    OrderChannelUnauthorizedOp { channel: i32 },
    #[error("order cancellation error")]
    OrderCancellationError { status: String },
    #[error("order bump error")]
    OrderBumpError,
    #[error("invoice already paid")]
    InvoiceAlreadyPaid,
    #[error("invoice already expired")]
    InvoiceAlreadyExpired,
    #[error("sequence number not found")]
    SequenceNumberNotFound { tx_seq_num: i64 },
    #[error("lightning charge invoice error")]
    LightningChargeInvoiceError,
    #[error("lightning charge webhook registration error")]
    LightningChargeWebhookRegistrationError,
    #[error("invoice id not found")]
    InvoiceIdNotFoundError { lid: String },
    #[error("orphaned invoice")]
    OrphanedInvoice,
    #[error("region not found")]
    RegionNotFound { region: u32 },
    #[error("invalid date")]
    InvalidDate,
    #[error("limit too large")]
    LimitTooLarge { max: u32 },
    #[error("unknown order fetch state")]
    UnknownFetchState { state: String },
    #[error("bad request")]
    BadRequest(String),
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
    #[error(transparent)]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

struct Catalog {
    code: u32,
    title: &'static str,
    status: StatusCode,
}

impl AppError {
    fn catalog(&self) -> Catalog {
        match self {
            AppError::BidTooSmall { .. } => Catalog {
                code: 102,
                title: "Bid too low",
                status: StatusCode::BAD_REQUEST,
            },
            AppError::MessageMissing => Catalog {
                code: 126,
                title: "Message upload problem",
                status: StatusCode::BAD_REQUEST,
            },
            AppError::MessageFileTooSmall { .. } => Catalog {
                code: 117,
                title: "Message too small",
                status: StatusCode::BAD_REQUEST,
            },
            AppError::MessageFileTooLarge { .. } => Catalog {
                code: 118,
                title: "Message too large",
                status: StatusCode::PAYLOAD_TOO_LARGE,
            },
            AppError::OrderNotFound { .. } => Catalog {
                code: 104,
                title: "Order not found",
                status: StatusCode::NOT_FOUND,
            },
            AppError::InvalidAuthToken => Catalog {
                code: 109,
                title: "Unauthorized",
                status: StatusCode::UNAUTHORIZED,
            },
            AppError::OrderChannelUnauthorizedOp { .. } => Catalog {
                code: 129,
                title: "Unauthorized operation",
                status: StatusCode::FORBIDDEN,
            },
            AppError::OrderCancellationError { .. } => Catalog {
                code: 120,
                title: "Cannot cancel order",
                status: StatusCode::BAD_REQUEST,
            },
            AppError::OrderBumpError => Catalog {
                code: 119,
                title: "Cannot bump order",
                status: StatusCode::BAD_REQUEST,
            },
            AppError::InvoiceAlreadyPaid => Catalog {
                code: 123,
                title: "Payment problem",
                status: StatusCode::BAD_REQUEST,
            },
            AppError::InvoiceAlreadyExpired => Catalog {
                code: 130,
                title: "Payment problem",
                status: StatusCode::BAD_REQUEST,
            },
            AppError::SequenceNumberNotFound { .. } => Catalog {
                code: 114,
                title: "Sequence number not found",
                status: StatusCode::NOT_FOUND,
            },
            AppError::LightningChargeInvoiceError => Catalog {
                code: 110,
                title: "Invoice Creation Error",
                status: StatusCode::BAD_REQUEST,
            },
            AppError::LightningChargeWebhookRegistrationError => Catalog {
                code: 111,
                title: "Invoice Creation Error",
                status: StatusCode::BAD_REQUEST,
            },
            AppError::InvoiceIdNotFoundError { .. } => Catalog {
                code: 112,
                title: "Not found",
                status: StatusCode::NOT_FOUND,
            },
            AppError::OrphanedInvoice => Catalog {
                code: 122,
                title: "Payment problem",
                status: StatusCode::NOT_FOUND,
            },
            AppError::RegionNotFound { .. } => Catalog {
                code: 127,
                title: "region not found",
                status: StatusCode::NOT_FOUND,
            },
            AppError::InvalidDate => Catalog {
                code: 113,
                title: "Invalid date",
                status: StatusCode::BAD_REQUEST,
            },
            AppError::LimitTooLarge { .. } => Catalog {
                code: 101,
                title: "limit too large",
                status: StatusCode::BAD_REQUEST,
            },
            AppError::UnknownFetchState { .. } => Catalog {
                code: 131,
                title: "Unknown order state",
                status: StatusCode::NOT_FOUND,
            },
            AppError::BadRequest(_) => Catalog {
                code: 1,
                title: "Bad request",
                status: StatusCode::BAD_REQUEST,
            },
            AppError::Database(_) | AppError::Pool(_) | AppError::Io(_) | AppError::Internal(_) => {
                Catalog {
                    code: 1,
                    title: "",
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                }
            }
        }
    }

    fn detail(&self) -> String {
        match self {
            AppError::BidTooSmall { min_bid } => {
                format!("The minimum bid for this message is {min_bid} millisatoshis.")
            }
            AppError::MessageMissing => {
                "Either a message file or a message parameter is required".to_string()
            }
            AppError::MessageFileTooSmall { min_size } => {
                format!("Minimum message size is {min_size} byte")
            }
            AppError::MessageFileTooLarge { max_size_mb } => {
                format!("Message size exceeds max size of {max_size_mb} MB")
            }
            AppError::OrderNotFound { uuid } => format!("UUID {uuid} not found"),
            AppError::InvalidAuthToken => "Invalid authentication token".to_string(),
            AppError::OrderChannelUnauthorizedOp { channel } => {
                format!("channel {channel} does not permit this operation")
            }
            AppError::OrderCancellationError { status } => format!("Order already {status}"),
            AppError::OrderBumpError => {
                "Order must be pending or paid to accept a bid increase".to_string()
            }
            AppError::InvoiceAlreadyPaid => "Invoice already paid".to_string(),
            AppError::InvoiceAlreadyExpired => "Invoice already expired".to_string(),
            AppError::SequenceNumberNotFound { tx_seq_num } => {
                format!("Sent order with sequence number {tx_seq_num} not found")
            }
            AppError::LightningChargeInvoiceError => {
                "Lightning Charge invoice creation error".to_string()
            }
            AppError::LightningChargeWebhookRegistrationError => {
                "Lightning Charge webhook registration error".to_string()
            }
            AppError::InvoiceIdNotFoundError { lid } => format!("Invoice id {lid} not found"),
            AppError::OrphanedInvoice => "Orphaned invoice".to_string(),
            AppError::RegionNotFound { region } => format!("region {region} not found"),
            AppError::InvalidDate => "Couldn't parse date given by before param".to_string(),
            AppError::LimitTooLarge { max } => format!("limit cannot be larger than {max}"),
            AppError::UnknownFetchState { state } => format!("unknown order state {state}"),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Database(e) => e.to_string(),
            AppError::Pool(e) => e.to_string(),
            AppError::Io(e) => e.to_string(),
            AppError::Internal(e) => e.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorDetail {
    title: &'static str,
    detail: String,
    code: u32,
}

#[derive(Serialize)]
struct ErrorBody {
    message: &'static str,
    errors: Vec<ErrorDetail>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let catalog = self.catalog();
        if catalog.status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "internal error");
        }
        let body = ErrorBody {
            message: catalog.title,
            errors: vec![ErrorDetail {
                title: catalog.title,
                detail: self.detail(),
                code: catalog.code,
            }],
        };
        (catalog.status, Json(body)).into_response()
    }
}
