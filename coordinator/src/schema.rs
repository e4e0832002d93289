// @generated automatically, then hand-extended with the two custom enum types.

pub mod sql_types {
    #[derive(diesel::sql_types::SqlType)]
    #[diesel(postgres_type(name = "order_status"))]
    pub struct OrderStatusType;

    #[derive(diesel::sql_types::SqlType)]
    #[diesel(postgres_type(name = "invoice_status"))]
    pub struct InvoiceStatusType;
}

diesel::table! {
    use diesel::sql_types::*;
    use super::sql_types::OrderStatusType;

    orders (id) {
        id -> Int8,
        uuid -> Text,
        channel -> Int4,
        status -> OrderStatusType,
        bid -> Int8,
        unpaid_bid -> Int8,
        bid_per_byte -> Float8,
        message_size -> Int4,
        message_digest -> Text,
        region_code -> Int4,
        tx_seq_num -> Nullable<Int8>,
        created_at -> Timestamptz,
        cancelled_at -> Nullable<Timestamptz>,
        started_transmission_at -> Nullable<Timestamptz>,
        ended_transmission_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    use diesel::sql_types::*;
    use super::sql_types::InvoiceStatusType;

    invoices (id) {
        id -> Int8,
        order_id -> Int8,
        lid -> Text,
        invoice -> Text,
        amount -> Int8,
        status -> InvoiceStatusType,
        expires_at -> Timestamptz,
        paid_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    tx_confirmations (id) {
        id -> Int8,
        order_id -> Int8,
        region_id -> Int4,
        presumed -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    rx_confirmations (id) {
        id -> Int8,
        order_id -> Int8,
        region_id -> Int4,
        presumed -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    tx_retries (id) {
        id -> Int8,
        order_id -> Int8,
        region_code -> Int4,
        retry_count -> Int4,
        last_attempt -> Nullable<Timestamptz>,
        pending -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(invoices -> orders (order_id));
diesel::joinable!(tx_confirmations -> orders (order_id));
diesel::joinable!(rx_confirmations -> orders (order_id));
diesel::joinable!(tx_retries -> orders (order_id));

diesel::allow_tables_to_appear_in_same_query!(
    orders,
    invoices,
    tx_confirmations,
    rx_confirmations,
    tx_retries,
);
