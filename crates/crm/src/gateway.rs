//! HTTP implementation of [`OrderSystem`] for RetailCRM-style v5 APIs.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{error, warn};

use parcelbot_core::config::CrmConfig;
use parcelbot_core::{Customer, Order};

use crate::{GatewayError, OrderSystem};

const LIST_LIMIT: &str = "20";

/// Retry behaviour for transient CRM failures: HTTP 429, 5xx, timeouts and
/// connection errors. Backoff is linear in the attempt index; a throttled
/// request additionally waits out at least one full throttle window.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub throttle_window: Duration,
}

impl RetryPolicy {
    pub fn backoff_delay(&self, attempt: u32, throttled: bool) -> Duration {
        let linear = self.base_delay.saturating_mul(attempt);
        if throttled {
            linear.max(self.throttle_window)
        } else {
            linear
        }
    }
}

impl From<&CrmConfig> for RetryPolicy {
    fn from(config: &CrmConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            throttle_window: Duration::from_millis(config.throttle_window_ms),
        }
    }
}

pub struct CrmGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    bot_code_field: String,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct OrdersEnvelope {
    #[serde(default)]
    orders: Vec<Order>,
}

#[derive(Debug, Deserialize)]
struct CustomersEnvelope {
    #[serde(default)]
    customers: Vec<Customer>,
}

#[derive(Debug, Deserialize)]
struct SingleOrderEnvelope {
    order: Option<Order>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct EditEnvelope {
    #[serde(default = "default_true")]
    success: bool,
}

impl CrmGateway {
    pub fn new(config: &CrmConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            bot_code_field: config.bot_code_field.clone(),
            retry: RetryPolicy::from(config),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/v5/{endpoint}", self.base_url)
    }

    /// Sends the request built by `make`, retrying transient failures per
    /// the configured policy. Non-transient HTTP statuses fail on the first
    /// attempt.
    async fn execute<F>(&self, make: F, endpoint: &str) -> Result<reqwest::Response, GatewayError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match make().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let throttled = status.as_u16() == 429;
                    let transient = throttled || status.is_server_error();
                    let body = response.text().await.unwrap_or_default();

                    if transient && attempt < self.retry.max_attempts {
                        let delay = self.retry.backoff_delay(attempt, throttled);
                        warn!(
                            endpoint,
                            status = status.as_u16(),
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "transient crm failure, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    error!(endpoint, status = status.as_u16(), body, "crm request failed");
                    return Err(GatewayError::Http { status: status.as_u16(), body });
                }
                Err(err) if (err.is_timeout() || err.is_connect())
                    && attempt < self.retry.max_attempts =>
                {
                    let delay = self.retry.backoff_delay(attempt, false);
                    warn!(endpoint, attempt, error = %err, "crm transport failure, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    error!(endpoint, error = %err, "crm request failed");
                    return Err(GatewayError::Transport(err));
                }
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<T, GatewayError> {
        let url = self.url(endpoint);
        let response = self
            .execute(
                || {
                    self.client
                        .get(&url)
                        .query(query)
                        .query(&[("apiKey", self.api_key.expose_secret())])
                },
                endpoint,
            )
            .await?;

        response.json::<T>().await.map_err(|err| GatewayError::Decode(err.to_string()))
    }

    async fn post_edit(
        &self,
        order_id: i64,
        body: &Value,
        site: Option<&str>,
    ) -> Result<(), GatewayError> {
        let endpoint = format!("orders/{order_id}/edit");
        let url = self.url(&endpoint);
        let mut query = vec![("by".to_string(), "id".to_string())];
        if let Some(site) = site {
            query.push(("site".to_string(), site.to_string()));
        }

        let response = self
            .execute(
                || {
                    self.client
                        .post(&url)
                        .query(&query)
                        .query(&[("apiKey", self.api_key.expose_secret())])
                        .json(body)
                },
                &endpoint,
            )
            .await?;

        let envelope: EditEnvelope =
            response.json().await.map_err(|err| GatewayError::Decode(err.to_string()))?;
        if envelope.success {
            Ok(())
        } else {
            Err(GatewayError::Unavailable("crm edit reported success=false".to_string()))
        }
    }
}

#[async_trait]
impl OrderSystem for CrmGateway {
    async fn find_orders_by_code(&self, code: &str) -> Result<Vec<Order>, GatewayError> {
        let field = self.bot_code_field.as_str();
        let query = vec![
            (format!("filter[customFields][{field}]"), code.to_string()),
            ("limit".to_string(), LIST_LIMIT.to_string()),
        ];
        let envelope: OrdersEnvelope = self.get_json("orders", &query).await?;

        // Some deployments match the filter loosely (substring or
        // case-insensitive); keep only exact matches.
        let wanted = code.trim();
        Ok(envelope
            .orders
            .into_iter()
            .filter(|order| order.custom_field_text(field).as_deref() == Some(wanted))
            .collect())
    }

    async fn find_customers_by_phone(&self, phone: &str) -> Result<Vec<Customer>, GatewayError> {
        let query = vec![
            ("filter[phone]".to_string(), phone.to_string()),
            ("limit".to_string(), LIST_LIMIT.to_string()),
        ];
        let envelope: CustomersEnvelope = self.get_json("customers", &query).await?;
        if !envelope.customers.is_empty() {
            return Ok(envelope.customers);
        }

        // Some deployments index the phone under the display-name field.
        let fallback = vec![
            ("filter[name]".to_string(), phone.to_string()),
            ("limit".to_string(), LIST_LIMIT.to_string()),
        ];
        let envelope: CustomersEnvelope = self.get_json("customers", &fallback).await?;
        Ok(envelope.customers)
    }

    async fn find_orders_by_customer(&self, customer_id: i64) -> Result<Vec<Order>, GatewayError> {
        let query = vec![
            ("filter[customerId]".to_string(), customer_id.to_string()),
            ("limit".to_string(), LIST_LIMIT.to_string()),
        ];
        let envelope: OrdersEnvelope = self.get_json("orders", &query).await?;
        Ok(envelope.orders)
    }

    async fn get_order(&self, order_id: i64) -> Result<Option<Order>, GatewayError> {
        let endpoint = format!("orders/{order_id}");
        let query = vec![("by".to_string(), "id".to_string())];
        match self.get_json::<SingleOrderEnvelope>(&endpoint, &query).await {
            Ok(envelope) => Ok(envelope.order),
            Err(GatewayError::Http { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn set_order_custom_fields(
        &self,
        order_id: i64,
        fields: Map<String, Value>,
        site: Option<&str>,
    ) -> Result<(), GatewayError> {
        let body = json!({ "order": { "customFields": fields } });
        match self.post_edit(order_id, &body, site).await {
            Ok(()) => Ok(()),
            Err(err) if site.is_some() => {
                // A wrong or stale partition key is the usual culprit here.
                warn!(
                    order_id,
                    error = %err,
                    "order edit failed with site qualifier, retrying without it"
                );
                self.post_edit(order_id, &body, None).await
            }
            Err(err) => Err(err),
        }
    }
}
