//! HTTP-level gateway tests against a mock CRM server.

use serde_json::{json, Map};
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use parcelbot_core::config::CrmConfig;
use parcelbot_crm::{CrmGateway, GatewayError, OrderSystem};

fn test_config(base_url: String) -> CrmConfig {
    CrmConfig {
        base_url,
        api_key: "test-key".to_string().into(),
        bot_code_field: "bot_code".to_string(),
        chat_id_field: "telegram_id".to_string(),
        timeout_secs: 5,
        max_attempts: 3,
        retry_base_delay_ms: 1,
        throttle_window_ms: 1,
    }
}

fn gateway_for(server: &MockServer) -> CrmGateway {
    CrmGateway::new(&test_config(server.uri())).expect("gateway should build")
}

#[tokio::test]
async fn throttled_request_is_retried_and_succeeds_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v5/orders"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v5/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "orders": [
                {"id": 42, "number": "A-42", "customFields": {"bot_code": "7488"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let orders = gateway.find_orders_by_code("7488").await.expect("third attempt succeeds");

    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, 42);
}

#[tokio::test]
async fn server_errors_are_retried_until_exhaustion() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v5/orders"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let error = gateway.find_orders_by_customer(7).await.expect_err("retries exhausted");

    assert!(matches!(error, GatewayError::Http { status: 503, .. }));
}

#[tokio::test]
async fn non_retryable_status_fails_on_first_attempt() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v5/orders"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let error = gateway.find_orders_by_customer(7).await.expect_err("hard failure");

    assert!(matches!(error, GatewayError::Http { status: 404, .. }));
}

#[tokio::test]
async fn missing_order_reads_as_absent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v5/orders/42"))
        .and(query_param("by", "id"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let order = gateway.get_order(42).await.expect("absent order is not an error");

    assert!(order.is_none());
}

#[tokio::test]
async fn code_lookup_filters_loose_crm_matches_to_exact_ones() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v5/orders"))
        .and(query_param("filter[customFields][bot_code]", "7488"))
        .and(query_param("apiKey", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "orders": [
                {"id": 1, "customFields": {"bot_code": "7488"}},
                {"id": 2, "customFields": {"bot_code": "74880"}},
                {"id": 3, "customFields": {"bot_code": " 7488 "}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let orders = gateway.find_orders_by_code("7488").await.expect("lookup");

    let ids: Vec<i64> = orders.iter().map(|order| order.id).collect();
    assert_eq!(ids, vec![1, 3]);
}

#[tokio::test]
async fn phone_lookup_falls_back_to_name_filter() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v5/customers"))
        .and(query_param("filter[phone]", "+79161234567"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "customers": []})),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v5/customers"))
        .and(query_param("filter[name]", "+79161234567"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "customers": [{"id": 7, "firstName": "Anna"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let customers = gateway.find_customers_by_phone("+79161234567").await.expect("lookup");

    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0].id, 7);
}

#[tokio::test]
async fn edit_retries_without_site_qualifier() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v5/orders/42/edit"))
        .and(query_param("site", "main"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v5/orders/42/edit"))
        .and(query_param("by", "id"))
        .and(query_param_is_missing("site"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let mut fields = Map::new();
    fields.insert("telegram_id".to_string(), "100".into());

    gateway
        .set_order_custom_fields(42, fields, Some("main"))
        .await
        .expect("edit succeeds without the site qualifier");
}
