pub mod confirmations;
pub mod enums;
pub mod invoices;
pub mod orders;
pub mod tx_retries;

pub use enums::InvoiceStatus;
pub use enums::OrderStatus;
