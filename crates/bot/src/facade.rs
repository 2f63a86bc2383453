//! `BotService` - composition of resolver, CRM gateway, session store and
//! order-list cache behind the narrow surface the chat transport calls.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{error, info, warn};

use parcelbot_core::config::AppConfig;
use parcelbot_core::{phone, sort_newest_first, Order};
use parcelbot_crm::{GatewayError, OrderSystem};
use parcelbot_session::{KeyValueBackend, OrderListCache, Sessions};

use crate::locks::UserLocks;
use crate::messages;
use crate::resolver::{self, ResolveError};

pub const ORDERS_PAGE_SIZE: usize = 5;

#[derive(Clone, Debug)]
pub struct ServiceOptions {
    pub chat_id_field: String,
    pub session_ttl_secs: u64,
    pub orders_cache_ttl_secs: u64,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            chat_id_field: "telegram_id".to_string(),
            session_ttl_secs: 86_400,
            orders_cache_ttl_secs: 60,
        }
    }
}

impl From<&AppConfig> for ServiceOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            chat_id_field: config.crm.chat_id_field.clone(),
            session_ttl_secs: config.session.session_ttl_secs,
            orders_cache_ttl_secs: config.session.orders_cache_ttl_secs,
        }
    }
}

/// Typed result of an authentication attempt. The transport maps each
/// variant to its own user-facing reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthOutcome {
    Authorized { order_id: i64, number: Option<String> },
    InvalidPhoneFormat,
    NotFound,
    CrmUnavailable,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrdersPage {
    pub text: String,
    /// Zero-based page index actually rendered (out-of-range requests are
    /// clamped to the last page).
    pub page: usize,
    pub total_pages: usize,
}

/// Diagnostic view of both resolution branches for one input. Operator
/// tooling only; never rendered to end users.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolveProbe {
    pub input: String,
    pub normalized_phone: Option<String>,
    pub orders_by_code: usize,
    pub customers_by_phone: usize,
    pub orders_by_customer: usize,
    pub picked: Option<String>,
}

pub struct BotService<C, B> {
    crm: Arc<C>,
    sessions: Sessions<B>,
    cache: OrderListCache<B>,
    locks: UserLocks,
    chat_id_field: String,
    cache_ttl_secs: u64,
}

impl<C, B> BotService<C, B>
where
    C: OrderSystem,
    B: KeyValueBackend,
{
    pub fn new(crm: Arc<C>, backend: Arc<B>, options: ServiceOptions) -> Self {
        Self {
            crm,
            sessions: Sessions::new(Arc::clone(&backend), options.session_ttl_secs),
            cache: OrderListCache::new(backend),
            locks: UserLocks::new(),
            chat_id_field: options.chat_id_field,
            cache_ttl_secs: options.orders_cache_ttl_secs,
        }
    }

    pub async fn is_authorized(&self, user_id: i64) -> bool {
        self.sessions.is_authorized(user_id).await
    }

    /// Resolves `raw_input` to an order, persists the session binding and
    /// best-effort stamps the chat id back onto the CRM order.
    pub async fn authenticate(&self, user_id: i64, raw_input: &str) -> AuthOutcome {
        let _guard = self.locks.acquire(user_id).await;

        let order = match resolver::resolve(self.crm.as_ref(), raw_input).await {
            Ok(Some(order)) => order,
            Ok(None) => return AuthOutcome::NotFound,
            Err(ResolveError::InvalidPhone) => return AuthOutcome::InvalidPhoneFormat,
            Err(ResolveError::Crm(err)) => {
                error!(user_id, error = %err, "authentication lookup failed");
                return AuthOutcome::CrmUnavailable;
            }
        };

        let trimmed = raw_input.trim();
        let (code, phone_number) = if phone::looks_like_phone(trimmed) {
            (None, phone::normalize(trimmed))
        } else {
            (Some(trimmed.to_string()), None)
        };

        if !self.sessions.authorize(user_id, order.id, code, phone_number).await {
            warn!(user_id, order_id = order.id, "session not persisted, user will be re-prompted");
        }

        self.stamp_chat_id(user_id, &order).await;

        info!(user_id, order_id = order.id, "user authenticated");
        AuthOutcome::Authorized { order_id: order.id, number: order.number }
    }

    /// Writes the chat-user id onto the order so the CRM side can find the
    /// conversation later. Non-critical: failures are logged and dropped.
    async fn stamp_chat_id(&self, user_id: i64, order: &Order) {
        let mut fields = Map::new();
        fields.insert(self.chat_id_field.clone(), Value::String(user_id.to_string()));

        if let Err(err) =
            self.crm.set_order_custom_fields(order.id, fields, order.site.as_deref()).await
        {
            warn!(user_id, order_id = order.id, error = %err, "failed to stamp chat id onto order");
        }
    }

    pub async fn status_text(&self, user_id: i64) -> String {
        let Some(order_id) = self.active_order_id(user_id).await else {
            return messages::AUTH_PROMPT.to_string();
        };

        match self.crm.get_order(order_id).await {
            Ok(Some(order)) => messages::status(&order),
            Ok(None) => messages::NO_ACTIVE_ORDERS.to_string(),
            Err(err) => {
                error!(user_id, order_id, error = %err, "status lookup failed");
                messages::SERVICE_UNAVAILABLE.to_string()
            }
        }
    }

    pub async fn tracking_text(&self, user_id: i64) -> String {
        let Some(order_id) = self.active_order_id(user_id).await else {
            return messages::AUTH_PROMPT.to_string();
        };

        match self.crm.get_order(order_id).await {
            Ok(Some(order)) => match order.tracking_number() {
                Some(tracking_number) => messages::tracking(&order, &tracking_number),
                None => messages::TRACKING_NOT_ASSIGNED.to_string(),
            },
            Ok(None) => messages::TRACKING_NOT_ASSIGNED.to_string(),
            Err(err) => {
                error!(user_id, order_id, error = %err, "tracking lookup failed");
                messages::SERVICE_UNAVAILABLE.to_string()
            }
        }
    }

    /// Full order listing, newest first, five entries per page. The list
    /// is served from the per-user cache while it is warm.
    pub async fn orders_text(&self, user_id: i64, page: usize) -> OrdersPage {
        let Some(order_id) = self.active_order_id(user_id).await else {
            return OrdersPage { text: messages::AUTH_PROMPT.to_string(), page: 0, total_pages: 0 };
        };

        let orders = match self.cache.get(user_id).await {
            Some(orders) => orders,
            None => match self.load_orders(user_id, order_id).await {
                Ok(orders) => orders,
                Err(err) => {
                    error!(user_id, order_id, error = %err, "order listing failed");
                    return OrdersPage {
                        text: messages::SERVICE_UNAVAILABLE.to_string(),
                        page: 0,
                        total_pages: 0,
                    };
                }
            },
        };

        if orders.is_empty() {
            return OrdersPage {
                text: messages::NO_ACTIVE_ORDERS.to_string(),
                page: 0,
                total_pages: 0,
            };
        }

        let total_pages = orders.len().div_ceil(ORDERS_PAGE_SIZE);
        let page = page.min(total_pages - 1);
        let start = page * ORDERS_PAGE_SIZE;
        let end = (start + ORDERS_PAGE_SIZE).min(orders.len());

        OrdersPage {
            text: messages::orders_page(&orders[start..end], page, total_pages),
            page,
            total_pages,
        }
    }

    async fn load_orders(&self, user_id: i64, order_id: i64) -> Result<Vec<Order>, GatewayError> {
        let Some(order) = self.crm.get_order(order_id).await? else {
            return Ok(Vec::new());
        };

        let mut orders = match order.customer.as_ref().and_then(|customer| customer.id) {
            Some(customer_id) => self.crm.find_orders_by_customer(customer_id).await?,
            // No customer reference to widen the listing with; show the
            // bound order alone.
            None => vec![order],
        };
        sort_newest_first(&mut orders);

        self.cache.set(user_id, &orders, self.cache_ttl_secs).await;
        Ok(orders)
    }

    /// Writes a star rating and comment onto the bound order. Returns
    /// `false` on any failure so the transport can offer a retry.
    pub async fn submit_review(&self, user_id: i64, stars: u8, comment: &str) -> bool {
        if !(1..=5).contains(&stars) {
            warn!(user_id, stars, "review rating out of range");
            return false;
        }

        let _guard = self.locks.acquire(user_id).await;

        let Some(order_id) = self.active_order_id(user_id).await else {
            return false;
        };

        // Read the order first for its site partition; if that read fails
        // the edit is attempted without the qualifier.
        let site = match self.crm.get_order(order_id).await {
            Ok(Some(order)) => order.site,
            Ok(None) => None,
            Err(err) => {
                warn!(user_id, order_id, error = %err, "order read before review failed");
                None
            }
        };

        let mut fields = Map::new();
        fields.insert("bot_rating".to_string(), Value::String(stars.to_string()));
        fields.insert("comments".to_string(), Value::String(comment.trim().to_string()));

        match self.crm.set_order_custom_fields(order_id, fields, site.as_deref()).await {
            Ok(()) => {
                info!(user_id, order_id, stars, "review saved");
                true
            }
            Err(err) => {
                error!(user_id, order_id, error = %err, "review write failed");
                false
            }
        }
    }

    pub async fn logout(&self, user_id: i64) {
        self.sessions.clear(user_id).await;
        self.cache.clear(user_id).await;
        info!(user_id, "user signed out");
    }

    /// Runs both resolution branches and reports what each found. For
    /// operator debugging of "my code does not work" reports.
    pub async fn probe(&self, input: &str) -> ResolveProbe {
        let trimmed = input.trim();

        let mut code_orders = match self.crm.find_orders_by_code(trimmed).await {
            Ok(orders) => orders,
            Err(err) => {
                warn!(error = %err, "probe code lookup failed");
                Vec::new()
            }
        };
        sort_newest_first(&mut code_orders);

        let normalized_phone = phone::normalize(trimmed);
        let mut customers_by_phone = 0;
        let mut orders_by_customer = 0;
        let mut phone_pick: Option<Order> = None;

        if let Some(canonical) = normalized_phone.as_deref() {
            match self.crm.find_customers_by_phone(canonical).await {
                Ok(customers) => {
                    customers_by_phone = customers.len();
                    if let Some(customer) = customers.into_iter().next() {
                        match self.crm.find_orders_by_customer(customer.id).await {
                            Ok(mut orders) => {
                                orders_by_customer = orders.len();
                                sort_newest_first(&mut orders);
                                phone_pick = orders.into_iter().find(|order| {
                                    order.customer.as_ref().and_then(|embedded| embedded.id)
                                        == Some(customer.id)
                                });
                            }
                            Err(err) => warn!(error = %err, "probe order lookup failed"),
                        }
                    }
                }
                Err(err) => warn!(error = %err, "probe customer lookup failed"),
            }
        }

        let picked = code_orders
            .first()
            .or(phone_pick.as_ref())
            .map(|order| format!("#{} (id={})", order.number.as_deref().unwrap_or("—"), order.id));

        ResolveProbe {
            input: input.to_string(),
            normalized_phone,
            orders_by_code: code_orders.len(),
            customers_by_phone,
            orders_by_customer,
            picked,
        }
    }

    async fn active_order_id(&self, user_id: i64) -> Option<i64> {
        self.sessions
            .session(user_id)
            .await
            .filter(|record| record.authorized)
            .and_then(|record| record.order_id)
    }
}
