//! Library surface for the satellite broadcast order-queue coordinator.
//! `main.rs` is a thin binary wrapper around this crate; `coordinator/tests/`
//! integration tests exercise the engine through this same surface.

pub mod app_state;
pub mod broker;
pub mod db;
pub mod error;
pub mod housekeeper;
pub mod invoice;
pub mod lifecycle;
pub mod message_store;
pub mod metrics;
pub mod requests;
pub mod retransmission;
pub mod routes;
pub mod scheduler;
pub mod schema;
pub mod settings;

use diesel_migrations::embed_migrations;
use diesel_migrations::EmbeddedMigrations;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");
