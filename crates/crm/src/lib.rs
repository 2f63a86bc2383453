//! CRM gateway - the only path to the external order system.
//!
//! The rest of the workspace talks to the CRM exclusively through the
//! [`OrderSystem`] trait. Two implementations exist:
//! - [`CrmGateway`] - HTTP client against a RetailCRM-style v5 API with
//!   retry/backoff and error classification
//! - [`InMemoryOrderSystem`] - seedable double with call counters, used by
//!   resolver and façade tests in dependent crates

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use parcelbot_core::{Customer, Order};

pub mod gateway;
pub mod memory;

pub use gateway::{CrmGateway, RetryPolicy};
pub use memory::{InMemoryOrderSystem, RecordedEdit};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("crm responded with status {status}")]
    Http { status: u16, body: String },
    #[error("crm transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("crm payload could not be decoded: {0}")]
    Decode(String),
    #[error("order system unavailable: {0}")]
    Unavailable(String),
}

/// Narrow operations against the external order system. Reads are
/// idempotent; the single write is at-least-once.
#[async_trait]
pub trait OrderSystem: Send + Sync {
    /// Orders whose configured bot-code custom field equals `code` exactly.
    async fn find_orders_by_code(&self, code: &str) -> Result<Vec<Order>, GatewayError>;

    /// Customers matching a canonical phone number.
    async fn find_customers_by_phone(&self, phone: &str) -> Result<Vec<Customer>, GatewayError>;

    async fn find_orders_by_customer(&self, customer_id: i64) -> Result<Vec<Order>, GatewayError>;

    async fn get_order(&self, order_id: i64) -> Result<Option<Order>, GatewayError>;

    /// Writes custom-field values onto an order. When `site` is given and
    /// the edit fails, it is retried once without the partition qualifier.
    async fn set_order_custom_fields(
        &self,
        order_id: i64,
        fields: Map<String, Value>,
        site: Option<&str>,
    ) -> Result<(), GatewayError>;
}
