//! The engine: the single long-lived object wired at start-up with the
//! store, broker client and channel registry, handed to every request
//! handler and periodic worker (spec.md §9 "Design Notes").

use crate::broker::Broker;
use crate::invoice::InvoiceIssuer;
use crate::message_store::MessageStore;
use crate::metrics::Metrics;
use crate::settings::Settings;
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use diesel::PgConnection;
use std::sync::Arc;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

pub struct Engine {
    pub pool: PgPool,
    pub settings: Settings,
    pub invoice_issuer: Arc<dyn InvoiceIssuer>,
    pub broker: Arc<dyn Broker>,
    pub message_store: MessageStore,
    pub metrics: Metrics,
}

impl Engine {
    pub fn new(
        pool: PgPool,
        settings: Settings,
        invoice_issuer: Arc<dyn InvoiceIssuer>,
        broker: Arc<dyn Broker>,
        message_store: MessageStore,
    ) -> Engine {
        Engine {
            pool,
            settings,
            invoice_issuer,
            broker,
            message_store,
            metrics: Metrics::new(),
        }
    }
}
