//! Shared, side-effect-free domain logic for the satellite broadcast queue:
//! the region codec (C1), bidding (C2) and channel registry (C3), plus the
//! HMAC helpers used for order and webhook authentication. Kept dependency-
//! light and free of any database or HTTP concern so it can be reused by the
//! coordinator binary and by its tests without pulling in Diesel or axum.

pub mod auth;
pub mod bidding;
pub mod channels;
pub mod regions;
