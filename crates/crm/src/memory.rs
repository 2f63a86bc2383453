//! In-memory [`OrderSystem`] double for tests.
//!
//! Seedable with orders and customers, counts every call per operation, and
//! can be switched into a failing mode to exercise unavailable-CRM paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use parcelbot_core::{Customer, Order};

use crate::{GatewayError, OrderSystem};

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedEdit {
    pub order_id: i64,
    pub fields: Map<String, Value>,
    pub site: Option<String>,
}

#[derive(Default)]
struct State {
    orders: Vec<Order>,
    customers: Vec<Customer>,
    edits: Vec<RecordedEdit>,
    /// CRM-side customer index, which can disagree with the customer
    /// reference embedded in the order payload itself.
    owners: HashMap<i64, i64>,
}

#[derive(Default)]
struct CallLog {
    orders_by_code: AtomicUsize,
    customers_by_phone: AtomicUsize,
    orders_by_customer: AtomicUsize,
    get_order: AtomicUsize,
    edits: AtomicUsize,
}

pub struct InMemoryOrderSystem {
    state: RwLock<State>,
    calls: CallLog,
    failing: AtomicBool,
    bot_code_field: String,
}

impl Default for InMemoryOrderSystem {
    fn default() -> Self {
        Self {
            state: RwLock::default(),
            calls: CallLog::default(),
            failing: AtomicBool::new(false),
            bot_code_field: "bot_code".to_string(),
        }
    }
}

impl InMemoryOrderSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bot_code_field(mut self, field: impl Into<String>) -> Self {
        self.bot_code_field = field.into();
        self
    }

    pub async fn seed_order(&self, order: Order) {
        let mut state = self.state.write().await;
        if let Some(customer_id) = order.customer.as_ref().and_then(|customer| customer.id) {
            state.owners.insert(order.id, customer_id);
        }
        state.orders.push(order);
    }

    /// Seeds an order indexed under `customer_id` regardless of the
    /// customer reference embedded in its payload. Lets tests model stale
    /// embedded data.
    pub async fn seed_order_for_customer(&self, order: Order, customer_id: i64) {
        let mut state = self.state.write().await;
        state.owners.insert(order.id, customer_id);
        state.orders.push(order);
    }

    pub async fn seed_customer(&self, customer: Customer) {
        self.state.write().await.customers.push(customer);
    }

    /// When set, every operation fails with [`GatewayError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn orders_by_code_calls(&self) -> usize {
        self.calls.orders_by_code.load(Ordering::SeqCst)
    }

    pub fn customers_by_phone_calls(&self) -> usize {
        self.calls.customers_by_phone.load(Ordering::SeqCst)
    }

    pub fn orders_by_customer_calls(&self) -> usize {
        self.calls.orders_by_customer.load(Ordering::SeqCst)
    }

    pub fn get_order_calls(&self) -> usize {
        self.calls.get_order.load(Ordering::SeqCst)
    }

    pub fn edit_calls(&self) -> usize {
        self.calls.edits.load(Ordering::SeqCst)
    }

    pub async fn recorded_edits(&self) -> Vec<RecordedEdit> {
        self.state.read().await.edits.clone()
    }

    fn check_available(&self) -> Result<(), GatewayError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(GatewayError::Unavailable("order system forced offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl OrderSystem for InMemoryOrderSystem {
    async fn find_orders_by_code(&self, code: &str) -> Result<Vec<Order>, GatewayError> {
        self.calls.orders_by_code.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let wanted = code.trim();
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .filter(|order| {
                order.custom_field_text(&self.bot_code_field).as_deref() == Some(wanted)
            })
            .cloned()
            .collect())
    }

    async fn find_customers_by_phone(&self, phone: &str) -> Result<Vec<Customer>, GatewayError> {
        self.calls.customers_by_phone.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let state = self.state.read().await;
        Ok(state
            .customers
            .iter()
            .filter(|customer| customer.has_phone(phone))
            .cloned()
            .collect())
    }

    async fn find_orders_by_customer(&self, customer_id: i64) -> Result<Vec<Order>, GatewayError> {
        self.calls.orders_by_customer.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .filter(|order| state.owners.get(&order.id) == Some(&customer_id))
            .cloned()
            .collect())
    }

    async fn get_order(&self, order_id: i64) -> Result<Option<Order>, GatewayError> {
        self.calls.get_order.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let state = self.state.read().await;
        Ok(state.orders.iter().find(|order| order.id == order_id).cloned())
    }

    async fn set_order_custom_fields(
        &self,
        order_id: i64,
        fields: Map<String, Value>,
        site: Option<&str>,
    ) -> Result<(), GatewayError> {
        self.calls.edits.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut state = self.state.write().await;
        if let Some(order) = state.orders.iter_mut().find(|order| order.id == order_id) {
            if !order.custom_fields.is_object() {
                order.custom_fields = Value::Object(Map::new());
            }
            if let Some(existing) = order.custom_fields.as_object_mut() {
                for (key, value) in &fields {
                    existing.insert(key.clone(), value.clone());
                }
            }
        }
        state.edits.push(RecordedEdit {
            order_id,
            fields,
            site: site.map(str::to_string),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map};

    use parcelbot_core::{Customer, Order, PhoneRecord};

    use crate::{GatewayError, OrderSystem};

    use super::InMemoryOrderSystem;

    fn order_with_code(id: i64, code: &str) -> Order {
        Order { id, custom_fields: json!({ "bot_code": code }), ..Order::default() }
    }

    #[tokio::test]
    async fn code_lookup_matches_exactly_and_counts_calls() {
        let crm = InMemoryOrderSystem::new();
        crm.seed_order(order_with_code(1, "7488")).await;
        crm.seed_order(order_with_code(2, "74880")).await;

        let orders = crm.find_orders_by_code("7488").await.expect("lookup");
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, 1);
        assert_eq!(crm.orders_by_code_calls(), 1);
    }

    #[tokio::test]
    async fn phone_lookup_matches_seeded_customers() {
        let crm = InMemoryOrderSystem::new();
        crm.seed_customer(Customer {
            id: 7,
            phones: vec![PhoneRecord { number: Some("+79161234567".to_string()) }],
            ..Customer::default()
        })
        .await;

        let found = crm.find_customers_by_phone("+79161234567").await.expect("lookup");
        assert_eq!(found.len(), 1);
        assert!(crm.find_customers_by_phone("+70000000000").await.expect("lookup").is_empty());
    }

    #[tokio::test]
    async fn failing_mode_surfaces_unavailable() {
        let crm = InMemoryOrderSystem::new();
        crm.set_failing(true);
        let error = crm.find_orders_by_code("7488").await.expect_err("should fail");
        assert!(matches!(error, GatewayError::Unavailable(_)));
    }

    #[tokio::test]
    async fn edits_are_recorded_and_applied() {
        let crm = InMemoryOrderSystem::new();
        crm.seed_order(order_with_code(42, "7488")).await;

        let mut fields = Map::new();
        fields.insert("telegram_id".to_string(), "100".into());
        crm.set_order_custom_fields(42, fields, Some("main")).await.expect("edit");

        let edits = crm.recorded_edits().await;
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].order_id, 42);
        assert_eq!(edits[0].site.as_deref(), Some("main"));

        let order = crm.get_order(42).await.expect("get").expect("present");
        assert_eq!(order.custom_field_text("telegram_id").as_deref(), Some("100"));
        assert_eq!(order.custom_field_text("bot_code").as_deref(), Some("7488"));
    }
}
