//! Integration tests for the cart service API.

use std::sync::{Arc, OnceLock};

use api::InMemoryAppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use broker::InMemoryBroker;
use common::{FULFILLMENT_QUEUE, FulfillmentOrder};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{GatewayOutcome, InMemoryPaymentGateway};
use serde_json::{Value, json};
use tower::ServiceExt;

const CARD: &str = "1234-5678-9012-3456";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestHarness {
    app: axum::Router,
    state: Arc<InMemoryAppState>,
    payment: InMemoryPaymentGateway,
    broker: InMemoryBroker,
}

impl TestHarness {
    fn new() -> Self {
        let (state, payment, broker) = api::create_default_state();
        let app = api::create_app(state.clone(), get_metrics_handle());
        Self {
            app,
            state,
            payment,
            broker,
        }
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let body = match body {
            Some(json) => Body::from(serde_json::to_vec(&json).unwrap()),
            None => Body::empty(),
        };
        self.send_raw(method, uri, body).await
    }

    async fn send_raw(&self, method: &str, uri: &str, body: Body) -> (StatusCode, Value) {
        let response = self
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(body)
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn create_cart(&self, customer_id: &str) -> String {
        let (status, json) = self
            .send("POST", "/create", Some(json!({"customer_id": customer_id})))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        json["cart_id"].as_str().unwrap().to_string()
    }

    async fn add_item(&self, cart_id: &str, product_id: &str, quantity: i64) -> (StatusCode, Value) {
        self.send(
            "POST",
            &format!("/cart/{cart_id}/items"),
            Some(json!({"product_id": product_id, "quantity": quantity})),
        )
        .await
    }

    async fn checkout(&self, cart_id: &str, body: Value) -> (StatusCode, Value) {
        self.send("POST", &format!("/cart/{cart_id}/checkout"), Some(body))
            .await
    }

    /// Cart for "C1" with P1 added as 2 then 3.
    async fn scenario_cart(&self) -> String {
        let cart_id = self.create_cart("C1").await;
        assert_eq!(self.add_item(&cart_id, "P1", 2).await.0, StatusCode::OK);
        assert_eq!(self.add_item(&cart_id, "P1", 3).await.0, StatusCode::OK);
        cart_id
    }

    fn published_orders(&self) -> Vec<FulfillmentOrder> {
        self.broker
            .ready_messages(FULFILLMENT_QUEUE)
            .unwrap()
            .iter()
            .map(|m| FulfillmentOrder::from_bytes(&m.body).unwrap())
            .collect()
    }
}

#[tokio::test]
async fn test_health_check_counts_carts() {
    let h = TestHarness::new();

    let (status, json) = h.send("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["broker"], "connected");
    assert_eq!(json["carts_count"], 0);

    h.create_cart("C1").await;
    let (_, json) = h.send("GET", "/health", None).await;
    assert_eq!(json["carts_count"], 1);
}

#[tokio::test]
async fn test_create_and_get_cart() {
    let h = TestHarness::new();
    let cart_id = h.create_cart("C1").await;

    let (status, json) = h.send("GET", &format!("/cart/{cart_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cart_id"], cart_id.as_str());
    assert_eq!(json["customer_id"], "C1");
    assert_eq!(json["items"], json!([]));
    assert!(json["created_at"].as_str().is_some());
}

#[tokio::test]
async fn test_create_cart_validation() {
    let h = TestHarness::new();

    let (status, json) = h.send("POST", "/create", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().is_some());

    let (status, _) = h
        .send("POST", "/create", Some(json!({"customer_id": "  "})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = h
        .send_raw("POST", "/create", Body::from("{not json"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().is_some());
}

#[tokio::test]
async fn test_get_unknown_and_malformed_ids() {
    let h = TestHarness::new();

    let (status, json) = h
        .send("GET", "/cart/6f1c1f8e-8d59-4f2c-9a55-1d0f6a4f3b21", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().is_some());

    let (status, json) = h.send("GET", "/cart/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Cart not found: not-a-uuid");
}

#[tokio::test]
async fn test_non_uuid_ids_are_not_found_on_every_cart_route() {
    let h = TestHarness::new();

    let (status, _) = h.add_item("cart-42", "P1", 1).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = h
        .checkout("cart-42", json!({"credit_card_number": CARD}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Cart not found: cart-42");
    assert_eq!(h.payment.call_count(), 0);
}

#[tokio::test]
async fn test_add_item_merges_lines() {
    let h = TestHarness::new();
    let cart_id = h.create_cart("C1").await;

    h.add_item(&cart_id, "P1", 2).await;
    h.add_item(&cart_id, "P2", 1).await;
    let (status, json) = h.add_item(&cart_id, "P1", 3).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["items"],
        json!([
            {"product_id": "P1", "quantity": 5},
            {"product_id": "P2", "quantity": 1}
        ])
    );
}

#[tokio::test]
async fn test_add_item_rejects_bad_quantities() {
    let h = TestHarness::new();
    let cart_id = h.create_cart("C1").await;

    for quantity in [0, -1, 10_001] {
        let (status, json) = h.add_item(&cart_id, "P1", quantity).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "quantity {quantity}");
        assert!(json["error"].as_str().is_some());
    }

    let (status, _) = h
        .send(
            "POST",
            &format!("/cart/{cart_id}/items"),
            Some(json!({"product_id": "P1", "quantity": "two"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, json) = h.send("GET", &format!("/cart/{cart_id}"), None).await;
    assert_eq!(json["items"], json!([]));
}

#[tokio::test]
async fn test_add_item_to_unknown_cart() {
    let h = TestHarness::new();
    let (status, _) = h
        .add_item("6f1c1f8e-8d59-4f2c-9a55-1d0f6a4f3b21", "P1", 1)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_checkout_success_publishes_and_deletes_cart() {
    let h = TestHarness::new();
    let cart_id = h.scenario_cart().await;

    let (status, json) = h
        .checkout(&cart_id, json!({"credit_card_number": CARD}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Authorized");
    assert_eq!(json["total"], 50.0);
    assert!(json["transaction_id"].as_str().is_some());
    let order_id = json["order_id"].as_str().unwrap().to_string();

    let (status, _) = h.send("GET", &format!("/cart/{cart_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let orders = h.published_orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_id.to_string(), order_id);
    assert_eq!(orders[0].cart_id.to_string(), cart_id);
    assert_eq!(orders[0].total_quantity(), 5);
    assert_eq!(h.state.coordinator.store().len().await, 0);
}

#[tokio::test]
async fn test_checkout_accepts_credential_alias() {
    let h = TestHarness::new();
    let cart_id = h.scenario_cart().await;

    let (status, _) = h.checkout(&cart_id, json!({"credential": CARD})).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_checkout_declined_keeps_cart() {
    let h = TestHarness::new();
    let cart_id = h.scenario_cart().await;
    h.payment.set_outcome(GatewayOutcome::Decline);

    let (status, json) = h
        .checkout(&cart_id, json!({"credit_card_number": CARD}))
        .await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(json["error"], "payment declined");
    assert!(json["message"].as_str().is_some());

    let (status, json) = h.send("GET", &format!("/cart/{cart_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["items"], json!([{"product_id": "P1", "quantity": 5}]));
    assert!(h.published_orders().is_empty());
}

#[tokio::test]
async fn test_checkout_empty_cart() {
    let h = TestHarness::new();
    let cart_id = h.create_cart("C1").await;

    let (status, json) = h
        .checkout(&cart_id, json!({"credit_card_number": CARD}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Cannot checkout empty cart");
    assert_eq!(h.payment.call_count(), 0);
}

#[tokio::test]
async fn test_checkout_invalid_credential() {
    let h = TestHarness::new();
    let cart_id = h.scenario_cart().await;

    let (status, json) = h
        .checkout(&cart_id, json!({"credit_card_number": "1234"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid payment credential");

    let (status, _) = h.checkout(&cart_id, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = h.send("GET", &format!("/cart/{cart_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_checkout_unknown_cart() {
    let h = TestHarness::new();
    let (status, _) = h
        .checkout(
            "6f1c1f8e-8d59-4f2c-9a55-1d0f6a4f3b21",
            json!({"credit_card_number": CARD}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_checkout_gateway_unavailable() {
    let h = TestHarness::new();
    let cart_id = h.scenario_cart().await;
    h.payment.set_outcome(GatewayOutcome::Unavailable);

    let (status, json) = h
        .checkout(&cart_id, json!({"credit_card_number": CARD}))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "payment authorization failed");
    let (status, _) = h.send("GET", &format!("/cart/{cart_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_checkout_broker_outage() {
    let h = TestHarness::new();
    let cart_id = h.scenario_cart().await;
    h.broker.set_fail_on_publish(true);

    let (status, json) = h
        .checkout(&cart_id, json!({"credit_card_number": CARD}))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "failed to send order to warehouse");
    assert_eq!(h.payment.call_count(), 1);

    let (_, json) = h.send("GET", &format!("/cart/{cart_id}"), None).await;
    assert_eq!(json["items"], json!([{"product_id": "P1", "quantity": 5}]));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let h = TestHarness::new();
    h.create_cart("C1").await;

    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("carts_active"));
}
